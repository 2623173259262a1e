//! Ledger records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::transfer::TransactionStatus;

/// One account per user; the balance is never negative
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    #[schema(value_type = String, example = "1000.00")]
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Transfer record, written `pending` by intake and finalized once
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Transaction {
    pub id: Uuid,
    /// `None` for externally originated credits
    pub from_account_id: Option<Uuid>,
    pub to_account_id: Uuid,
    #[schema(value_type = String, example = "30.00")]
    pub amount: Decimal,
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Set only when `status == failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Whether the account is the sender or the recipient
    pub fn involves(&self, account_id: Uuid) -> bool {
        self.from_account_id == Some(account_id) || self.to_account_id == account_id
    }
}

/// Insert payload for a new `pending` transaction
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount: Decimal,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample(from: Option<Uuid>, to: Uuid) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: Uuid::new_v4(),
            from_account_id: from,
            to_account_id: to,
            amount: dec!(30.00),
            status: TransactionStatus::Pending,
            description: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_involves_both_parties_only() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let tx = sample(Some(a), b);
        assert!(tx.involves(a));
        assert!(tx.involves(b));
        assert!(!tx.involves(c));

        let external = sample(None, b);
        assert!(external.involves(b));
        assert!(!external.involves(a));
    }

    #[test]
    fn test_optional_fields_omitted_in_json() {
        let tx = sample(None, Uuid::new_v4());
        let json = serde_json::to_value(&tx).unwrap();
        assert!(json.get("error_message").is_none());
        assert!(json.get("description").is_none());
        assert!(json["from_account_id"].is_null());
        assert_eq!(json["amount"], "30.00");
        assert_eq!(json["status"], "pending");
    }
}
