//! Domain records shared across the pipeline.

use serde::{Deserialize, Serialize};

/// One purchase line item.
///
/// Only `user_id` and `item_id` drive the interaction matrix (interaction
/// strength is the record count, not the quantity sum); the remaining
/// columns are carried through from the retail feed and ignored by every
/// algorithm here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub user_id: u64,
    pub item_id: u64,
    pub quantity: f32,
    #[serde(default)]
    pub basket_id: u64,
    #[serde(default)]
    pub sales_value: f32,
}

impl Transaction {
    pub fn new(user_id: u64, item_id: u64, quantity: f32) -> Self {
        Self {
            user_id,
            item_id,
            quantity,
            basket_id: 0,
            sales_value: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_deserialize_defaults() {
        let tx: Transaction =
            serde_json::from_str(r#"{"user_id":1,"item_id":7,"quantity":2.0}"#).unwrap();
        assert_eq!(tx.user_id, 1);
        assert_eq!(tx.item_id, 7);
        assert_eq!(tx.basket_id, 0);
        assert_eq!(tx.sales_value, 0.0);
    }
}
