use super::sparse_matrix::CsrMatrix;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CscMatrix<T> {
    pub num_rows: usize,
    pub num_columns: usize,
    pub col_ptr: Vec<u32>,
    pub row_idx: Vec<u32>,
    pub data: Vec<T>,
}

impl<T> CscMatrix<T> {
    pub fn column(&self, col: usize) -> &[T] {
        &self.data[self.col_ptr[col] as usize..self.col_ptr[col + 1] as usize]
    }
}

/// Where every CSR entry lands in column-major order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransposeIndices {
    pub col_ptr: Vec<u32>,
    pub row_idx: Vec<u32>,
    /// `source[k]` is the CSR position of the entry stored at CSC position `k`.
    pub source: Vec<u32>,
}

/// Counting-sort transpose over the index arrays alone (Wang et al.): count entries per
/// column, prefix-sum the counts, then scatter each entry into its column's next free slot.
/// Linear in `nnz + num_columns`.
pub fn transpose_indices(num_columns: usize, row_ptr: &[u32], col_idx: &[u32]) -> TransposeIndices {
    let nnz = col_idx.len();
    let mut col_ptr = vec![0u32; num_columns + 1];
    for &col in col_idx {
        col_ptr[col as usize + 1] += 1;
    }
    for col in 0..num_columns {
        col_ptr[col + 1] += col_ptr[col];
    }

    let mut next = col_ptr[..num_columns].to_vec();
    let mut row_idx = vec![0u32; nnz];
    let mut source = vec![0u32; nnz];
    for row in 0..row_ptr.len().saturating_sub(1) {
        for entry in row_ptr[row] as usize..row_ptr[row + 1] as usize {
            let col = col_idx[entry] as usize;
            let slot = next[col] as usize;
            next[col] += 1;
            row_idx[slot] = row as u32;
            source[slot] = entry as u32;
        }
    }
    TransposeIndices {
        col_ptr,
        row_idx,
        source,
    }
}

#[tracing::instrument(skip_all, fields(nnz = csr.nnz()))]
pub fn transpose<T: Clone>(csr: &CsrMatrix<T>) -> CscMatrix<T> {
    let TransposeIndices {
        col_ptr,
        row_idx,
        source,
    } = transpose_indices(csr.num_columns, &csr.row_ptr, &csr.col_idx);
    CscMatrix {
        num_rows: csr.num_rows,
        num_columns: csr.num_columns,
        data: source
            .iter()
            .map(|&k| csr.data[k as usize].clone())
            .collect(),
        col_ptr,
        row_idx,
    }
}
