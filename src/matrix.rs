//! Sparse user-item interaction matrix.
//!
//! Cell values are the COUNT of transaction records per (user, item) pair.
//! Quantity is deliberately not summed: occurrence count is the interaction
//! strength proxy the downstream factorization is trained on.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{RecsError, Result};
use crate::types::Transaction;

/// BM25 defaults matching the weighting the factorization expects.
pub const BM25_K1: f32 = 100.0;
pub const BM25_B: f32 = 0.8;

/// Lower bound for the BM25 idf term. The raw `ln(n_items / (1 + df))` hits
/// zero (or goes negative) for users who touched nearly every item, which
/// would zero out their cells and change the sparsity pattern.
const BM25_IDF_FLOOR: f32 = 1e-6;

/// Sparse user×item matrix with stable row/column labels.
///
/// Row labels are the distinct user ids sorted ascending, column labels the
/// distinct item ids sorted ascending. Both orderings are fixed at build
/// time and reused for all index translation afterwards.
#[derive(Debug, Clone)]
pub struct InteractionMatrix {
    user_labels: Vec<u64>,
    item_labels: Vec<u64>,
    // BTreeMap keeps entry iteration deterministic, so re-weighting and CSR
    // assembly produce identical output for identical input.
    entries: BTreeMap<(usize, usize), f32>,
}

impl InteractionMatrix {
    /// Aggregate raw transactions into a count matrix.
    pub fn from_transactions(transactions: &[Transaction]) -> Result<Self> {
        if transactions.is_empty() {
            return Err(RecsError::InvalidInput(
                "cannot build an interaction matrix from zero transactions".into(),
            ));
        }

        let user_labels: Vec<u64> = transactions
            .iter()
            .map(|t| t.user_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let item_labels: Vec<u64> = transactions
            .iter()
            .map(|t| t.item_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let user_index: BTreeMap<u64, usize> = user_labels
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i))
            .collect();
        let item_index: BTreeMap<u64, usize> = item_labels
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i))
            .collect();

        let mut entries: BTreeMap<(usize, usize), f32> = BTreeMap::new();
        for t in transactions {
            let u = user_index[&t.user_id];
            let i = item_index[&t.item_id];
            *entries.entry((u, i)).or_insert(0.0) += 1.0;
        }

        Ok(Self {
            user_labels,
            item_labels,
            entries,
        })
    }

    pub fn n_users(&self) -> usize {
        self.user_labels.len()
    }

    pub fn n_items(&self) -> usize {
        self.item_labels.len()
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, user_idx: usize, item_idx: usize) -> f32 {
        *self.entries.get(&(user_idx, item_idx)).unwrap_or(&0.0)
    }

    /// Distinct user ids in row order.
    pub fn user_labels(&self) -> &[u64] {
        &self.user_labels
    }

    /// Distinct item ids in column order.
    pub fn item_labels(&self) -> &[u64] {
        &self.item_labels
    }

    /// BM25 re-weighting, applied item-major: items play the document role,
    /// users the term role (the matrix is conceptually transposed for the
    /// transform and transposed back, which leaves storage untouched).
    ///
    /// Only nonzero cells are rewritten. Shape and sparsity pattern are
    /// preserved, so index mappings derived from this matrix stay valid.
    pub fn bm25_weight(&mut self, k1: f32, b: f32) {
        let n_docs = self.n_items() as f32;

        // Document length = total interaction mass per item.
        let mut item_sums = vec![0.0f32; self.n_items()];
        // Term document-frequency = number of items each user touched.
        let mut user_doc_freq = vec![0usize; self.n_users()];
        for (&(u, i), &v) in &self.entries {
            item_sums[i] += v;
            user_doc_freq[u] += 1;
        }
        let average_length = item_sums.iter().sum::<f32>() / n_docs;

        let idf: Vec<f32> = user_doc_freq
            .iter()
            .map(|&df| (n_docs / (1.0 + df as f32)).ln().max(BM25_IDF_FLOOR))
            .collect();

        for (&(u, i), v) in self.entries.iter_mut() {
            let length_norm = (1.0 - b) + b * item_sums[i] / average_length;
            *v = *v * (k1 + 1.0) / (k1 * length_norm + *v) * idf[u];
        }
    }

    /// Compressed sparse row form, user-major (rows = users).
    pub fn to_csr(&self) -> Csr {
        let mut indptr = Vec::with_capacity(self.n_users() + 1);
        let mut indices = Vec::with_capacity(self.nnz());
        let mut data = Vec::with_capacity(self.nnz());

        indptr.push(0);
        let mut row = 0usize;
        for (&(u, i), &v) in &self.entries {
            while row < u {
                indptr.push(indices.len());
                row += 1;
            }
            indices.push(i);
            data.push(v);
        }
        while row < self.n_users() {
            indptr.push(indices.len());
            row += 1;
        }

        Csr {
            n_rows: self.n_users(),
            n_cols: self.n_items(),
            indptr,
            indices,
            data,
        }
    }
}

/// Minimal CSR matrix for the factorization's row-sliced access pattern.
#[derive(Debug, Clone)]
pub struct Csr {
    pub n_rows: usize,
    pub n_cols: usize,
    pub indptr: Vec<usize>,
    pub indices: Vec<usize>,
    pub data: Vec<f32>,
}

impl Csr {
    /// Column indices and values of one row.
    pub fn row(&self, r: usize) -> (&[usize], &[f32]) {
        let start = self.indptr[r];
        let end = self.indptr[r + 1];
        (&self.indices[start..end], &self.data[start..end])
    }

    /// Counting-sort transpose preserving per-row column order.
    pub fn transpose(&self) -> Csr {
        let nnz = self.indices.len();
        let mut counts = vec![0usize; self.n_cols];
        for &c in &self.indices {
            counts[c] += 1;
        }

        let mut indptr = vec![0usize; self.n_cols + 1];
        for c in 0..self.n_cols {
            indptr[c + 1] = indptr[c] + counts[c];
        }

        let mut indices = vec![0usize; nnz];
        let mut data = vec![0.0f32; nnz];
        let mut pos = indptr[..self.n_cols].to_vec();
        for row in 0..self.n_rows {
            let start = self.indptr[row];
            let end = self.indptr[row + 1];
            for idx in start..end {
                let col = self.indices[idx];
                let p = pos[col];
                indices[p] = row;
                data[p] = self.data[idx];
                pos[col] += 1;
            }
        }

        Csr {
            n_rows: self.n_cols,
            n_cols: self.n_rows,
            indptr,
            indices,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(user: u64, item: u64) -> Transaction {
        Transaction::new(user, item, 1.0)
    }

    #[test]
    fn test_count_aggregation() {
        // u1 buys i1 three times, i2 once; u2 buys i1 twice.
        let transactions = vec![
            tx(1, 10),
            tx(1, 10),
            tx(1, 10),
            tx(1, 20),
            tx(2, 10),
            tx(2, 10),
        ];
        let m = InteractionMatrix::from_transactions(&transactions).unwrap();

        assert_eq!(m.n_users(), 2);
        assert_eq!(m.n_items(), 2);
        assert_eq!(m.get(0, 0), 3.0);
        assert_eq!(m.get(0, 1), 1.0);
        assert_eq!(m.get(1, 0), 2.0);
        assert_eq!(m.get(1, 1), 0.0);
    }

    #[test]
    fn test_empty_transactions_rejected() {
        let result = InteractionMatrix::from_transactions(&[]);
        assert!(matches!(result, Err(RecsError::InvalidInput(_))));
    }

    #[test]
    fn test_labels_sorted_and_stable() {
        let transactions = vec![tx(9, 300), tx(2, 100), tx(5, 200), tx(2, 300)];
        let m = InteractionMatrix::from_transactions(&transactions).unwrap();

        assert_eq!(m.user_labels(), &[2, 5, 9]);
        assert_eq!(m.item_labels(), &[100, 200, 300]);
    }

    #[test]
    fn test_bm25_preserves_sparsity_pattern() {
        let transactions = vec![
            tx(1, 10),
            tx(1, 10),
            tx(1, 20),
            tx(2, 10),
            tx(3, 30),
            tx(3, 40),
        ];
        let mut m = InteractionMatrix::from_transactions(&transactions).unwrap();
        let raw = m.clone();

        m.bm25_weight(BM25_K1, BM25_B);

        assert_eq!(m.n_users(), raw.n_users());
        assert_eq!(m.n_items(), raw.n_items());
        assert_eq!(m.nnz(), raw.nnz());
        for u in 0..m.n_users() {
            for i in 0..m.n_items() {
                let was_zero = raw.get(u, i) == 0.0;
                assert_eq!(m.get(u, i) == 0.0, was_zero, "cell ({u}, {i})");
            }
        }
    }

    #[test]
    fn test_bm25_keeps_near_universal_buyers_nonzero() {
        // User 1 touched 2 of 3 items, which puts the raw idf term at
        // exactly ln(3 / (1 + 2)) = 0; the floor keeps those cells nonzero.
        let transactions = vec![tx(1, 10), tx(1, 20), tx(2, 30)];
        let mut m = InteractionMatrix::from_transactions(&transactions).unwrap();
        m.bm25_weight(BM25_K1, BM25_B);

        assert_ne!(m.get(0, 0), 0.0);
        assert_ne!(m.get(0, 1), 0.0);
        assert!(m.get(0, 0) > 0.0);
    }

    #[test]
    fn test_bm25_downweights_heavy_users() {
        // User 1 touches every item, user 2 only one; the promiscuous
        // user's entries carry a lower idf.
        let transactions = vec![tx(1, 10), tx(1, 20), tx(1, 30), tx(2, 10)];
        let mut m = InteractionMatrix::from_transactions(&transactions).unwrap();
        m.bm25_weight(BM25_K1, BM25_B);

        assert!(m.get(0, 0) < m.get(1, 0));
    }

    #[test]
    fn test_csr_round_trip() {
        let transactions = vec![tx(1, 10), tx(1, 30), tx(2, 20), tx(3, 10), tx(3, 10)];
        let m = InteractionMatrix::from_transactions(&transactions).unwrap();
        let csr = m.to_csr();

        assert_eq!(csr.n_rows, 3);
        assert_eq!(csr.n_cols, 3);
        assert_eq!(csr.indptr, vec![0, 2, 3, 4]);

        let (cols, vals) = csr.row(0);
        assert_eq!(cols, &[0, 2]);
        assert_eq!(vals, &[1.0, 1.0]);

        let (cols, vals) = csr.row(2);
        assert_eq!(cols, &[0]);
        assert_eq!(vals, &[2.0]);
    }

    #[test]
    fn test_csr_transpose() {
        let transactions = vec![tx(1, 10), tx(1, 30), tx(2, 20), tx(3, 10), tx(3, 10)];
        let m = InteractionMatrix::from_transactions(&transactions).unwrap();
        let t = m.to_csr().transpose();

        assert_eq!(t.n_rows, 3); // items
        assert_eq!(t.n_cols, 3); // users

        // Item 10 (column 0) was bought by users 1 and 3.
        let (rows, vals) = t.row(0);
        assert_eq!(rows, &[0, 2]);
        assert_eq!(vals, &[1.0, 2.0]);
    }
}
