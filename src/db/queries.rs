use rust_decimal::Decimal;
use sqlx::{PgPool, Result};
use uuid::Uuid;

use crate::db::models::{TransactionItemRow, TransactionRow};

/// Inserts the header and all line items in a single database transaction.
/// Any failed insert rolls the whole write back.
pub async fn insert_transaction(
    pool: &PgPool,
    header: &TransactionRow,
    items: &[TransactionItemRow],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO transactions (
            id, customer_id, subtotal, discount, tax, total,
            currency, created_at, processed_at, raw_payload
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(header.id)
    .bind(header.customer_id)
    .bind(header.subtotal)
    .bind(header.discount)
    .bind(header.tax)
    .bind(header.total)
    .bind(&header.currency)
    .bind(header.created_at)
    .bind(header.processed_at)
    .bind(&header.raw_payload)
    .execute(&mut *tx)
    .await?;

    for item in items {
        sqlx::query(
            r#"
            INSERT INTO transaction_items (
                id, transaction_id, product_id, name, category, unit_price, quantity
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(item.id)
        .bind(item.transaction_id)
        .bind(&item.product_id)
        .bind(&item.name)
        .bind(&item.category)
        .bind(item.unit_price)
        .bind(item.quantity)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn get_transaction(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<(TransactionRow, Vec<TransactionItemRow>)>> {
    let header = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match header {
        None => Ok(None),
        Some(header) => {
            let items = sqlx::query_as::<_, TransactionItemRow>(
                "SELECT * FROM transaction_items WHERE transaction_id = $1 ORDER BY product_id",
            )
            .bind(id)
            .fetch_all(pool)
            .await?;

            Ok(Some((header, items)))
        }
    }
}

pub async fn ledger_totals(pool: &PgPool) -> Result<(i64, Decimal)> {
    sqlx::query_as::<_, (i64, Decimal)>(
        "SELECT COUNT(*), COALESCE(SUM(total), 0) FROM transactions",
    )
    .fetch_one(pool)
    .await
}
