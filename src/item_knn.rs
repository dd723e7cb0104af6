//! Item-item nearest-neighbour model.
//!
//! A lightweight cosine KNN over the item×user matrix, retained as an
//! auxiliary capability alongside the latent factor model. With K=1 each
//! item's neighbour list collapses to the item itself, which downstream
//! "recommend among own purchases" strategies rely on.

use rayon::prelude::*;

use crate::error::{RecsError, Result};
use crate::matrix::{Csr, InteractionMatrix};

#[derive(Debug, Clone)]
pub struct ItemItemModel {
    k: usize,
    /// Per-item top-k neighbours, descending cosine, self first.
    neighbors: Vec<Vec<(usize, f32)>>,
}

impl ItemItemModel {
    /// Fit per-item cosine neighbour lists on the matrix, item-major.
    pub fn fit(matrix: &InteractionMatrix, k: usize) -> Self {
        let item_users = matrix.to_csr().transpose();
        let norms: Vec<f32> = (0..item_users.n_rows)
            .map(|r| {
                let (_, vals) = item_users.row(r);
                vals.iter().map(|v| v * v).sum::<f32>().sqrt()
            })
            .collect();

        let neighbors: Vec<Vec<(usize, f32)>> = (0..item_users.n_rows)
            .into_par_iter()
            .map(|i| {
                let mut scored: Vec<(usize, f32)> = (0..item_users.n_rows)
                    .map(|j| (j, cosine(&item_users, &norms, i, j)))
                    .collect();
                // The queried item wins score ties so it always lists first.
                scored.sort_unstable_by(|a, b| {
                    b.1.partial_cmp(&a.1)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| (b.0 == i).cmp(&(a.0 == i)))
                        .then(a.0.cmp(&b.0))
                });
                scored.truncate(k);
                scored
            })
            .collect();

        Self { k, neighbors }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn n_items(&self) -> usize {
        self.neighbors.len()
    }

    pub fn neighbors(&self, item_index: usize) -> Result<&[(usize, f32)]> {
        self.neighbors
            .get(item_index)
            .map(Vec::as_slice)
            .ok_or(RecsError::InvalidIndex {
                index: item_index,
                len: self.neighbors.len(),
            })
    }
}

/// Sparse cosine between two rows with sorted column indices.
fn cosine(csr: &Csr, norms: &[f32], a: usize, b: usize) -> f32 {
    if norms[a] == 0.0 || norms[b] == 0.0 {
        return 0.0;
    }

    let (a_cols, a_vals) = csr.row(a);
    let (b_cols, b_vals) = csr.row(b);

    let mut dot = 0.0f32;
    let (mut x, mut y) = (0usize, 0usize);
    while x < a_cols.len() && y < b_cols.len() {
        match a_cols[x].cmp(&b_cols[y]) {
            std::cmp::Ordering::Less => x += 1,
            std::cmp::Ordering::Greater => y += 1,
            std::cmp::Ordering::Equal => {
                dot += a_vals[x] * b_vals[y];
                x += 1;
                y += 1;
            }
        }
    }

    dot / (norms[a] * norms[b])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Transaction;

    fn matrix() -> InteractionMatrix {
        // Items 10 and 20 share both buyers; item 30 has its own buyer.
        let transactions = vec![
            Transaction::new(1, 10, 1.0),
            Transaction::new(1, 20, 1.0),
            Transaction::new(2, 10, 1.0),
            Transaction::new(2, 20, 1.0),
            Transaction::new(3, 30, 1.0),
        ];
        InteractionMatrix::from_transactions(&transactions).unwrap()
    }

    #[test]
    fn test_k1_returns_self() {
        let model = ItemItemModel::fit(&matrix(), 1);
        assert_eq!(model.k(), 1);
        assert_eq!(model.n_items(), 3);

        for i in 0..3 {
            let neighbors = model.neighbors(i).unwrap();
            assert_eq!(neighbors.len(), 1);
            assert_eq!(neighbors[0].0, i);
            assert!((neighbors[0].1 - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_k2_finds_copurchased_item() {
        let model = ItemItemModel::fit(&matrix(), 2);

        let neighbors = model.neighbors(0).unwrap();
        assert_eq!(neighbors[0].0, 0);
        assert_eq!(neighbors[1].0, 1);
        assert!((neighbors[1].1 - 1.0).abs() < 1e-6);

        // Item 30 shares no buyers with anyone.
        let neighbors = model.neighbors(2).unwrap();
        assert_eq!(neighbors[0].0, 2);
        assert_eq!(neighbors[1].1, 0.0);
    }

    #[test]
    fn test_out_of_range() {
        let model = ItemItemModel::fit(&matrix(), 1);
        assert!(matches!(
            model.neighbors(5),
            Err(RecsError::InvalidIndex { index: 5, len: 3 })
        ));
    }
}
