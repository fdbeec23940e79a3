use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::error;

use crate::models::PricePoint;

/// Adjusted closes for `symbol` in `[from, to]`, latest first.
pub async fn fetch_range(
    pool: &PgPool,
    symbol: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<PricePoint>, sqlx::Error> {
    sqlx::query_as::<_, PricePoint>(
        r#"
        SELECT td, adj_close
        FROM stock_price
        WHERE symbol = $1 AND td >= $2 AND td <= $3
        ORDER BY td DESC
        "#,
    )
    .bind(symbol)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}

pub async fn fetch_symbols(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT DISTINCT symbol FROM stock_price ORDER BY symbol")
        .fetch_all(pool)
        .await
}

pub async fn upsert_many(
    pool: &PgPool,
    symbol: &str,
    points: &[PricePoint],
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await.map_err(|e| {
        error!("Failed to begin transaction for symbol {}: {}", symbol, e);
        e
    })?;

    let mut affected = 0;
    for (i, p) in points.iter().enumerate() {
        match sqlx::query(
            r#"
            INSERT INTO stock_price (symbol, td, adj_close)
            VALUES ($1, $2, $3)
            ON CONFLICT (symbol, td)
            DO UPDATE SET adj_close = EXCLUDED.adj_close
            "#,
        )
        .bind(symbol)
        .bind(p.td)
        .bind(p.adj_close)
        .execute(&mut *tx)
        .await
        {
            Ok(result) => affected += result.rows_affected(),
            Err(e) => {
                error!("Failed to upsert price point {} for symbol {} (td: {}, adj_close: {}): {}",
                       i, symbol, p.td, p.adj_close, e);
                return Err(e);
            }
        }
    }

    tx.commit().await.map_err(|e| {
        error!("Failed to commit transaction for symbol {}: {}", symbol, e);
        e
    })?;
    Ok(affected)
}
