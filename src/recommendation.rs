//! Recommendation facade and the two candidate-generation algorithms.
//!
//! Construction trains everything up front; afterwards the facade is
//! immutable, so both query methods are safe for concurrent read-only use.

use std::collections::BTreeMap;

use crate::error::{RecsError, Result};
use crate::item_knn::ItemItemModel;
use crate::mapping::IdMapping;
use crate::matrix::InteractionMatrix;
use crate::matrix_factorization::LatentFactorModel;
use crate::types::Transaction;
use crate::RecommenderConfig;

/// Default recommendation count for both query methods.
pub const DEFAULT_TOP_N: usize = 5;

/// How many of the user's own top items seed the similar-items strategy.
const OWN_TOP_ITEMS: usize = 5;

/// Neighbour users consulted by the similar-users strategy (self included).
const SIMILAR_USER_POOL: usize = 6;

/// Trained recommender over a fixed transaction history.
pub struct Recommender {
    config: RecommenderConfig,
    transactions: Vec<Transaction>,
    matrix: InteractionMatrix,
    mapping: IdMapping,
    model: LatentFactorModel,
    own_model: Option<ItemItemModel>,
}

impl Recommender {
    /// Train on `transactions` with the default configuration.
    ///
    /// `weighting` applies BM25 re-weighting to the interaction matrix
    /// before fitting, damping the influence of very popular items and very
    /// active users on the factorization.
    pub fn new(transactions: Vec<Transaction>, weighting: bool) -> Result<Self> {
        Self::with_config(transactions, weighting, RecommenderConfig::default())
    }

    pub fn with_config(
        transactions: Vec<Transaction>,
        weighting: bool,
        config: RecommenderConfig,
    ) -> Result<Self> {
        let mut matrix = InteractionMatrix::from_transactions(&transactions)?;
        let mapping = IdMapping::from_matrix(&matrix);

        // Shape and sparsity pattern survive the transform, so the mapping
        // built above stays valid.
        if weighting {
            matrix.bm25_weight(config.bm25_k1, config.bm25_b);
        }

        let model = LatentFactorModel::fit(&matrix, &config.als)?;
        // The auxiliary KNN model sees the matrix in whatever state it is in
        // here: weighted when `weighting` was requested, raw counts otherwise.
        let own_model = config
            .build_own_model
            .then(|| ItemItemModel::fit(&matrix, 1));

        tracing::info!(
            users = mapping.n_users(),
            items = mapping.n_items(),
            nnz = matrix.nnz(),
            weighting,
            "recommender trained"
        );

        Ok(Self {
            config,
            transactions,
            matrix,
            mapping,
            model,
            own_model,
        })
    }

    pub fn mapping(&self) -> &IdMapping {
        &self.mapping
    }

    pub fn matrix(&self) -> &InteractionMatrix {
        &self.matrix
    }

    pub fn model(&self) -> &LatentFactorModel {
        &self.model
    }

    /// The auxiliary unweighted-style KNN model, when built.
    pub fn own_model(&self) -> Option<&ItemItemModel> {
        self.own_model.as_ref()
    }

    /// Recommend items similar to the user's own most-purchased items.
    ///
    /// The candidate pool is always the user's top 5 items, independent of
    /// `n`; each contributes the nearest distinct neighbour in the latent
    /// space, in the user's own popularity order. A user with no purchase
    /// history gets an empty list, not an error.
    pub fn similar_items_recommendation(&self, user_id: u64, n: usize) -> Result<Vec<u64>> {
        let _ = n; // candidate pool size is fixed at OWN_TOP_ITEMS

        let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
        for t in &self.transactions {
            if t.user_id == user_id {
                *counts.entry(t.item_id).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(u64, usize)> = counts.into_iter().collect();
        sort_by_count_desc(&mut ranked);
        ranked.retain(|&(item_id, _)| item_id != self.config.sentinel_item_id);
        sort_by_count_desc(&mut ranked);
        ranked.truncate(OWN_TOP_ITEMS);

        let mut result = Vec::with_capacity(ranked.len());
        for (item_id, _) in ranked {
            let item_index = self.mapping.item_index(item_id)?;
            // Top 3 leaves room to pass over the self match and, should it
            // surface as a neighbour, the sentinel item.
            let neighbors = self.model.similar_items(item_index, 3)?;
            let mut chosen = None;
            for &(index, _) in neighbors.iter().skip(1) {
                let candidate = self.mapping.item_id(index)?;
                if candidate != self.config.sentinel_item_id {
                    chosen = Some(candidate);
                    break;
                }
            }
            match chosen {
                Some(candidate) => result.push(candidate),
                None => {
                    return Err(RecsError::DegenerateModel(format!(
                        "item {item_id} has no distinct neighbour ({} items trained)",
                        self.model.n_items()
                    )))
                }
            }
        }

        Ok(result)
    }

    /// Recommend the top `n` items among purchases of the 5 users nearest
    /// to `user_id` in the latent space.
    pub fn similar_users_recommendation(&self, user_id: u64, n: usize) -> Result<Vec<u64>> {
        let user_index = self.mapping.user_index(user_id)?;

        if self.model.n_users() < SIMILAR_USER_POOL {
            return Err(RecsError::DegenerateModel(format!(
                "similar-users strategy needs at least {SIMILAR_USER_POOL} users, model has {}",
                self.model.n_users()
            )));
        }

        let neighbors = self.model.similar_users(user_index, SIMILAR_USER_POOL)?;
        // First neighbour is the user themselves.
        let similar_users: Vec<u64> = neighbors[1..]
            .iter()
            .map(|&(index, _)| self.mapping.user_id(index))
            .collect::<Result<_>>()?;

        // Count the neighbours' purchases per (user, item), sentinel excluded.
        let mut counts: BTreeMap<(u64, u64), usize> = BTreeMap::new();
        for t in &self.transactions {
            if t.item_id != self.config.sentinel_item_id && similar_users.contains(&t.user_id) {
                *counts.entry((t.user_id, t.item_id)).or_insert(0) += 1;
            }
        }

        let mut per_user: BTreeMap<u64, Vec<(u64, usize)>> = BTreeMap::new();
        for ((u, item_id), count) in counts {
            per_user.entry(u).or_default().push((item_id, count));
        }

        // Each neighbour contributes only their own top 5 items.
        let mut aggregated: BTreeMap<u64, usize> = BTreeMap::new();
        for (_, mut items) in per_user {
            sort_by_count_desc(&mut items);
            items.truncate(OWN_TOP_ITEMS);
            for (item_id, count) in items {
                *aggregated.entry(item_id).or_insert(0) += count;
            }
        }

        let mut ranked: Vec<(u64, usize)> = aggregated.into_iter().collect();
        sort_by_count_desc(&mut ranked);
        ranked.truncate(n);

        Ok(ranked.into_iter().map(|(item_id, _)| item_id).collect())
    }
}

/// Descending by count, ties broken by ascending id for determinism.
fn sort_by_count_desc(entries: &mut [(u64, usize)]) {
    entries.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_by_count_desc() {
        let mut entries = vec![(30, 1), (10, 3), (20, 3), (40, 2)];
        sort_by_count_desc(&mut entries);
        assert_eq!(entries, vec![(10, 3), (20, 3), (40, 2), (30, 1)]);
    }
}
