//! Implicit-feedback purchase recommender.
//!
//! Builds a sparse user-item interaction matrix from raw purchase
//! transactions, trains an ALS latent factor model on it, and derives two
//! recommendation strategies: items similar to a user's own top purchases,
//! and items popular among similar users.
//!
//! Data ingestion, schema validation, and model persistence are the
//! caller's concern; this crate starts from [`Transaction`] records and
//! ends at ranked item ids.

pub mod error;
pub mod item_knn;
pub mod mapping;
pub mod matrix;
pub mod matrix_factorization;
pub mod recommendation;
pub mod types;

// Re-export key types
pub use error::{RecsError, Result};
pub use item_knn::ItemItemModel;
pub use mapping::IdMapping;
pub use matrix::InteractionMatrix;
pub use matrix_factorization::{AlsConfig, LatentFactorModel};
pub use recommendation::{Recommender, DEFAULT_TOP_N};
pub use types::Transaction;

use serde::{Deserialize, Serialize};

/// Reserved item id for "unknown/miscellaneous" purchases; never recommended.
pub const DEFAULT_SENTINEL_ITEM_ID: u64 = 999_999;

/// Recommender configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommenderConfig {
    /// ALS hyperparameters for the latent factor model.
    pub als: AlsConfig,
    /// Placeholder item id excluded from all recommendation output
    /// (default: 999999).
    pub sentinel_item_id: u64,
    /// BM25 term saturation (default: 100.0).
    pub bm25_k1: f32,
    /// BM25 length normalization (default: 0.8).
    pub bm25_b: f32,
    /// Whether to fit the auxiliary item-item KNN model (default: true).
    pub build_own_model: bool,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            als: AlsConfig::default(),
            sentinel_item_id: DEFAULT_SENTINEL_ITEM_ID,
            bm25_k1: matrix::BM25_K1,
            bm25_b: matrix::BM25_B,
            build_own_model: true,
        }
    }
}

#[cfg(test)]
mod tests;
