//! Matrix factorization using Alternating Least Squares (ALS).
//!
//! Decomposes the user-item interaction matrix into per-user and per-item
//! latent factor vectors and answers nearest-neighbour queries over the
//! learned embedding space. The matrix is fit in item×user orientation.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{RecsError, Result};
use crate::matrix::{Csr, InteractionMatrix};

/// ALS hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlsConfig {
    /// Number of latent factors (embedding dimension).
    pub factors: usize,
    /// Regularization parameter (lambda).
    pub regularization: f32,
    /// Number of alternating iterations.
    pub iterations: usize,
    /// Worker threads for the per-row solves.
    pub threads: usize,
    /// Confidence scaling for implicit feedback.
    pub alpha: f32,
    /// RNG seed for factor initialization; fixing it makes fits reproducible.
    pub seed: u64,
}

impl Default for AlsConfig {
    fn default() -> Self {
        Self {
            factors: 20,
            regularization: 0.001,
            iterations: 15,
            threads: 4,
            alpha: 1.0,
            seed: 42,
        }
    }
}

/// Trained latent factor model.
#[derive(Debug, Clone)]
pub struct LatentFactorModel {
    /// User latent factors: [n_users x factors].
    user_factors: Array2<f32>,
    /// Item latent factors: [n_items x factors].
    item_factors: Array2<f32>,
}

impl LatentFactorModel {
    /// Train ALS on the interaction matrix.
    pub fn fit(matrix: &InteractionMatrix, config: &AlsConfig) -> Result<Self> {
        if config.factors == 0 {
            return Err(RecsError::InvalidInput("factors must be at least 1".into()));
        }
        if config.iterations == 0 {
            return Err(RecsError::InvalidInput(
                "iterations must be at least 1".into(),
            ));
        }

        let user_items = matrix.to_csr();
        // The factorization convention: rows = items, columns = users.
        let item_users = user_items.transpose();

        let k = config.factors;
        let n_users = user_items.n_rows;
        let n_items = item_users.n_rows;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut user_factors = random_factors(n_users, k, &mut rng);
        let mut item_factors = random_factors(n_items, k, &mut rng);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads.max(1))
            .build()
            .map_err(|e| RecsError::InvalidInput(format!("thread pool: {e}")))?;

        for iteration in 0..config.iterations {
            user_factors =
                pool.install(|| solve_half(&user_items, &user_factors, &item_factors, config))?;
            item_factors =
                pool.install(|| solve_half(&item_users, &item_factors, &user_factors, config))?;

            if iteration % 2 == 0 {
                let loss = reconstruction_loss(&user_items, &user_factors, &item_factors);
                tracing::debug!("ALS iteration {}: loss = {:.4}", iteration, loss);
            }
        }

        Ok(Self {
            user_factors,
            item_factors,
        })
    }

    pub fn n_users(&self) -> usize {
        self.user_factors.nrows()
    }

    pub fn n_items(&self) -> usize {
        self.item_factors.nrows()
    }

    /// Items nearest to `item_index` in the embedding space, descending by
    /// cosine similarity, at most `top_n` long. The queried item itself
    /// scores maximally and comes back first.
    pub fn similar_items(&self, item_index: usize, top_n: usize) -> Result<Vec<(usize, f32)>> {
        if item_index >= self.n_items() {
            return Err(RecsError::InvalidIndex {
                index: item_index,
                len: self.n_items(),
            });
        }
        Ok(nearest_rows(&self.item_factors, item_index, top_n))
    }

    /// Users nearest to `user_index`, same conventions as [`similar_items`].
    ///
    /// [`similar_items`]: LatentFactorModel::similar_items
    pub fn similar_users(&self, user_index: usize, top_n: usize) -> Result<Vec<(usize, f32)>> {
        if user_index >= self.n_users() {
            return Err(RecsError::InvalidIndex {
                index: user_index,
                len: self.n_users(),
            });
        }
        Ok(nearest_rows(&self.user_factors, user_index, top_n))
    }

    pub fn user_embedding(&self, user_index: usize) -> Result<Vec<f32>> {
        if user_index >= self.n_users() {
            return Err(RecsError::InvalidIndex {
                index: user_index,
                len: self.n_users(),
            });
        }
        Ok(self.user_factors.row(user_index).to_vec())
    }

    pub fn item_embedding(&self, item_index: usize) -> Result<Vec<f32>> {
        if item_index >= self.n_items() {
            return Err(RecsError::InvalidIndex {
                index: item_index,
                len: self.n_items(),
            });
        }
        Ok(self.item_factors.row(item_index).to_vec())
    }
}

fn random_factors(n: usize, k: usize, rng: &mut StdRng) -> Array2<f32> {
    let mut factors = Array2::<f32>::zeros((n, k));
    for i in 0..n {
        for j in 0..k {
            factors[[i, j]] = rng.gen_range(-0.1..0.1);
        }
    }
    factors
}

/// One half of an ALS iteration: re-solve every row of `own` against the
/// fixed `other` factors, parallel over rows.
fn solve_half(
    interactions: &Csr,
    own: &Array2<f32>,
    other: &Array2<f32>,
    config: &AlsConfig,
) -> Result<Array2<f32>> {
    let k = config.factors;
    let rows: Vec<Array1<f32>> = (0..interactions.n_rows)
        .into_par_iter()
        .map(|r| {
            let (cols, vals) = interactions.row(r);
            if cols.is_empty() {
                // No interactions: keep the current factors untouched.
                return Ok(own.row(r).to_owned());
            }
            solve_row(cols, vals, other, config)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut out = Array2::<f32>::zeros((interactions.n_rows, k));
    for (r, row) in rows.into_iter().enumerate() {
        out.row_mut(r).assign(&row);
    }
    Ok(out)
}

/// Least-squares solve for a single factor row: build the normal equations
/// from the row's interactions and solve by Cholesky decomposition.
fn solve_row(
    cols: &[usize],
    vals: &[f32],
    other: &Array2<f32>,
    config: &AlsConfig,
) -> Result<Array1<f32>> {
    let k = config.factors;
    let lambda = config.regularization as f64;
    let mut a = Array2::<f64>::zeros((k, k));
    let mut b = Array1::<f64>::zeros(k);

    for (&col, &value) in cols.iter().zip(vals) {
        let vec = other.row(col);
        let confidence = 1.0 + config.alpha * value;

        for i in 0..k {
            for j in 0..k {
                a[[i, j]] += (confidence * vec[i] * vec[j]) as f64;
            }
        }
        for i in 0..k {
            b[i] += (confidence * value * vec[i]) as f64;
        }
    }

    for i in 0..k {
        a[[i, i]] += lambda;
    }

    let x = cholesky_solve(&a, &b)?;
    Ok(x.mapv(|v| v as f32))
}

/// Solve A * x = b for positive definite A (regularization guarantees it).
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return Err(RecsError::DegenerateModel(
                        "normal equations are not positive definite".into(),
                    ));
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // Forward substitution: L * y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Ok(x)
}

/// Mean squared reconstruction error over the nonzero cells.
fn reconstruction_loss(user_items: &Csr, user_factors: &Array2<f32>, item_factors: &Array2<f32>) -> f32 {
    let mut loss = 0.0;
    let mut count = 0usize;

    for u in 0..user_items.n_rows {
        let (cols, vals) = user_items.row(u);
        for (&i, &value) in cols.iter().zip(vals) {
            let prediction = user_factors.row(u).dot(&item_factors.row(i));
            loss += (value - prediction).powi(2);
            count += 1;
        }
    }

    if count > 0 {
        loss / count as f32
    } else {
        0.0
    }
}

/// Top-n rows of `factors` by cosine similarity to row `query`, descending,
/// ties broken by ascending row index.
fn nearest_rows(factors: &Array2<f32>, query: usize, top_n: usize) -> Vec<(usize, f32)> {
    let query_row = factors.row(query);
    let query_norm = query_row.dot(&query_row).sqrt();

    let mut scored: Vec<(usize, f32)> = (0..factors.nrows())
        .map(|r| {
            let row = factors.row(r);
            let norm = row.dot(&row).sqrt();
            let score = if query_norm == 0.0 || norm == 0.0 {
                0.0
            } else {
                query_row.dot(&row) / (query_norm * norm)
            };
            (r, score)
        })
        .collect();

    // The query row wins score ties so the self match always lists first.
    scored.sort_unstable_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| (b.0 == query).cmp(&(a.0 == query)))
            .then(a.0.cmp(&b.0))
    });
    scored.truncate(top_n);
    scored
}
