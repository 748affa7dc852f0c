//! Transaction ledger: deterministic pricing, atomic persistence, and
//! aggregate statistics derived from the store of record.

pub mod pricing;

use chrono::{DateTime, Utc};
use metrics::histogram;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{TransactionItemRow, TransactionRow};
use crate::db::queries;
use crate::error::AppError;

pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRequest {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub items: Vec<ItemRequest>,
    #[serde(default)]
    pub discount_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRequest {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub transaction_id: Uuid,
    pub customer_id: Option<String>,
    pub items: Vec<ItemRequest>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total_transactions: i64,
    pub total_revenue: Decimal,
    pub average_order_value: Decimal,
}

/// Converts a validated line-item list into priced, persisted financial
/// records. Transactions are append-only: there is no update or delete path.
#[derive(Clone)]
pub struct LedgerService {
    pool: PgPool,
}

impl LedgerService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Prices the request and persists header + line items as one atomic
    /// write. Retries are the caller's responsibility.
    pub async fn process(&self, request: TransactionRequest) -> Result<TransactionResponse, AppError> {
        let started = std::time::Instant::now();

        if request.items.is_empty() {
            return Err(AppError::Validation(
                "transaction must contain at least one item".to_string(),
            ));
        }
        if !pricing::has_billable_items(&request.items) {
            return Err(AppError::Validation(
                "transaction has no billable items".to_string(),
            ));
        }

        let breakdown = pricing::price(&request.items, request.discount_code.as_deref());

        let id = Uuid::new_v4();
        let now = Utc::now();

        let mut response = TransactionResponse {
            transaction_id: id,
            customer_id: request.customer_id.clone(),
            items: request.items.clone(),
            subtotal: breakdown.subtotal,
            discount: breakdown.discount,
            tax: breakdown.tax,
            total: breakdown.total,
            currency: DEFAULT_CURRENCY.to_string(),
            created_at: now,
            processed_at: now,
            processing_time_ms: None,
        };

        let raw_payload = serde_json::to_value(&response)?;

        // An unparsable customer reference is treated as absent, not rejected.
        let customer_id = request
            .customer_id
            .as_deref()
            .and_then(|s| Uuid::parse_str(s).ok());

        let header = TransactionRow {
            id,
            customer_id,
            subtotal: breakdown.subtotal,
            discount: breakdown.discount,
            tax: breakdown.tax,
            total: breakdown.total,
            currency: DEFAULT_CURRENCY.to_string(),
            created_at: now,
            processed_at: now,
            raw_payload: Some(raw_payload),
        };

        let items: Vec<TransactionItemRow> = request
            .items
            .iter()
            .map(|item| TransactionItemRow {
                id: Uuid::new_v4(),
                transaction_id: id,
                product_id: item.id.clone(),
                name: item.name.clone(),
                category: item.category.clone(),
                unit_price: item.price,
                quantity: item.quantity,
            })
            .collect();

        queries::insert_transaction(&self.pool, &header, &items).await?;

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        histogram!("ledger_process_duration_ms").record(elapsed_ms);
        response.processing_time_ms = Some(elapsed_ms);

        Ok(response)
    }

    pub async fn get(&self, id: Uuid) -> Result<TransactionResponse, AppError> {
        match queries::get_transaction(&self.pool, id).await? {
            Some((header, item_rows)) => {
                let items = item_rows
                    .into_iter()
                    .map(|row| ItemRequest {
                        id: row.product_id,
                        name: row.name,
                        price: row.unit_price,
                        quantity: row.quantity,
                        category: row.category,
                    })
                    .collect();

                Ok(TransactionResponse {
                    transaction_id: header.id,
                    customer_id: header.customer_id.map(|c| c.to_string()),
                    items,
                    subtotal: header.subtotal,
                    discount: header.discount,
                    tax: header.tax,
                    total: header.total,
                    currency: header.currency,
                    created_at: header.created_at,
                    processed_at: header.processed_at,
                    processing_time_ms: None,
                })
            }
            None => Err(AppError::NotFound(format!("transaction {} not found", id))),
        }
    }

    /// Aggregates are always computed from the ledger store, never from
    /// process-local counters, so they stay correct across restarts and
    /// replicas.
    pub async fn stats(&self) -> Result<LedgerStats, AppError> {
        let (count, revenue) = queries::ledger_totals(&self.pool).await?;

        let average_order_value = if count > 0 {
            (revenue / Decimal::from(count))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        } else {
            Decimal::ZERO
        };

        Ok(LedgerStats {
            total_transactions: count,
            total_revenue: revenue,
            average_order_value,
        })
    }
}
