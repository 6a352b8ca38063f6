pub mod errors;
pub mod math;
pub mod random;
