//! Bidirectional mapping between domain ids and dense matrix indices.

use std::collections::HashMap;

use crate::error::{RecsError, Result};
use crate::matrix::InteractionMatrix;

/// Four mutually-inverse maps derived once from the matrix labels.
///
/// Built together with the matrix and never updated afterwards, so the two
/// can not drift apart. Ids absent from the training matrix fail lookup;
/// there is no cold-start fallback by design.
#[derive(Debug, Clone)]
pub struct IdMapping {
    index_to_user: Vec<u64>,
    index_to_item: Vec<u64>,
    user_to_index: HashMap<u64, usize>,
    item_to_index: HashMap<u64, usize>,
}

impl IdMapping {
    pub fn from_matrix(matrix: &InteractionMatrix) -> Self {
        let index_to_user = matrix.user_labels().to_vec();
        let index_to_item = matrix.item_labels().to_vec();
        let user_to_index = index_to_user
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i))
            .collect();
        let item_to_index = index_to_item
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i))
            .collect();

        Self {
            index_to_user,
            index_to_item,
            user_to_index,
            item_to_index,
        }
    }

    pub fn n_users(&self) -> usize {
        self.index_to_user.len()
    }

    pub fn n_items(&self) -> usize {
        self.index_to_item.len()
    }

    pub fn user_index(&self, user_id: u64) -> Result<usize> {
        self.user_to_index
            .get(&user_id)
            .copied()
            .ok_or(RecsError::UserNotFound(user_id))
    }

    pub fn item_index(&self, item_id: u64) -> Result<usize> {
        self.item_to_index
            .get(&item_id)
            .copied()
            .ok_or(RecsError::ItemNotFound(item_id))
    }

    pub fn user_id(&self, index: usize) -> Result<u64> {
        self.index_to_user
            .get(index)
            .copied()
            .ok_or(RecsError::InvalidIndex {
                index,
                len: self.index_to_user.len(),
            })
    }

    pub fn item_id(&self, index: usize) -> Result<u64> {
        self.index_to_item
            .get(index)
            .copied()
            .ok_or(RecsError::InvalidIndex {
                index,
                len: self.index_to_item.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Transaction;

    fn mapping() -> IdMapping {
        let transactions = vec![
            Transaction::new(7, 300, 1.0),
            Transaction::new(3, 100, 1.0),
            Transaction::new(5, 200, 1.0),
        ];
        let m = InteractionMatrix::from_transactions(&transactions).unwrap();
        IdMapping::from_matrix(&m)
    }

    #[test]
    fn test_mappings_are_mutual_inverses() {
        let mapping = mapping();

        for index in 0..mapping.n_users() {
            let id = mapping.user_id(index).unwrap();
            assert_eq!(mapping.user_index(id).unwrap(), index);
        }
        for index in 0..mapping.n_items() {
            let id = mapping.item_id(index).unwrap();
            assert_eq!(mapping.item_index(id).unwrap(), index);
        }
    }

    #[test]
    fn test_unknown_ids_fail_lookup() {
        let mapping = mapping();

        assert!(matches!(
            mapping.user_index(999),
            Err(RecsError::UserNotFound(999))
        ));
        assert!(matches!(
            mapping.item_index(999),
            Err(RecsError::ItemNotFound(999))
        ));
        assert!(matches!(
            mapping.item_id(3),
            Err(RecsError::InvalidIndex { index: 3, len: 3 })
        ));
    }
}
