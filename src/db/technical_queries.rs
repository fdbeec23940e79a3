use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::error;

use crate::models::TechnicalRecord;

/// Upserts all records in one transaction; returns rows affected.
pub async fn upsert_many(
    pool: &PgPool,
    records: &[TechnicalRecord],
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let mut affected = 0;
    for r in records {
        let result = sqlx::query(
            r#"
            INSERT INTO stock_technical (
                symbol, td, t,
                price, p20, p50, p125, p200,
                rsi, weekly_rsi,
                increase_20, decrease_20, increase_50, decrease_50,
                best_20, worst_20, best_50, worst_50,
                steep_20, steep_50,
                is_top, is_bottom
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                    $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
            ON CONFLICT (symbol, td)
            DO UPDATE SET
                t = EXCLUDED.t,
                price = EXCLUDED.price,
                p20 = EXCLUDED.p20,
                p50 = EXCLUDED.p50,
                p125 = EXCLUDED.p125,
                p200 = EXCLUDED.p200,
                rsi = EXCLUDED.rsi,
                weekly_rsi = EXCLUDED.weekly_rsi,
                increase_20 = EXCLUDED.increase_20,
                decrease_20 = EXCLUDED.decrease_20,
                increase_50 = EXCLUDED.increase_50,
                decrease_50 = EXCLUDED.decrease_50,
                best_20 = EXCLUDED.best_20,
                worst_20 = EXCLUDED.worst_20,
                best_50 = EXCLUDED.best_50,
                worst_50 = EXCLUDED.worst_50,
                steep_20 = EXCLUDED.steep_20,
                steep_50 = EXCLUDED.steep_50,
                is_top = EXCLUDED.is_top,
                is_bottom = EXCLUDED.is_bottom
            "#,
        )
        .bind(&r.symbol)
        .bind(r.td)
        .bind(r.t)
        .bind(r.price)
        .bind(r.p20)
        .bind(r.p50)
        .bind(r.p125)
        .bind(r.p200)
        .bind(r.rsi)
        .bind(r.weekly_rsi)
        .bind(r.increase_20)
        .bind(r.decrease_20)
        .bind(r.increase_50)
        .bind(r.decrease_50)
        .bind(r.best_20)
        .bind(r.worst_20)
        .bind(r.best_50)
        .bind(r.worst_50)
        .bind(r.steep_20)
        .bind(r.steep_50)
        .bind(r.is_top)
        .bind(r.is_bottom)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to upsert technical record for {} on {}: {}", r.symbol, r.td, e);
            e
        })?;
        affected += result.rows_affected();
    }

    tx.commit().await?;
    Ok(affected)
}

/// Stored records for `symbol` in `[from, to]`, oldest first.
pub async fn fetch_range(
    pool: &PgPool,
    symbol: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<TechnicalRecord>, sqlx::Error> {
    sqlx::query_as::<_, TechnicalRecord>(
        r#"
        SELECT symbol, td, t,
               price, p20, p50, p125, p200,
               rsi, weekly_rsi,
               increase_20, decrease_20, increase_50, decrease_50,
               best_20, worst_20, best_50, worst_50,
               steep_20, steep_50,
               is_top, is_bottom
        FROM stock_technical
        WHERE symbol = $1 AND td >= $2 AND td <= $3
        ORDER BY td ASC
        "#,
    )
    .bind(symbol)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}
