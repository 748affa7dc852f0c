use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Persisted transaction header. `raw_payload` keeps the full computed
/// result as submitted, for audit and replay.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub customer_id: Option<Uuid>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
    pub raw_payload: Option<serde_json::Value>,
}

/// Line item owned by exactly one transaction; removed with it by cascade.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransactionItemRow {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub product_id: String,
    pub name: String,
    pub category: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
}
