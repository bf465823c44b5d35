use sqlx::{sqlite::SqliteRow, Row};

use concierge_core::domain::catalog::ServiceRateId;
use concierge_core::domain::client::ClientId;
use concierge_core::domain::quote::{Quote, QuoteId, QuoteItem, QuoteStatus};

use super::{
    decode_error, parse_date, parse_enum, parse_timestamp, parse_u32, QuoteRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlQuoteRepository {
    pool: DbPool,
}

impl SqlQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn item_from_row(row: &SqliteRow) -> Result<QuoteItem, RepositoryError> {
    Ok(QuoteItem {
        id: row.try_get("id").map_err(decode_error)?,
        service_rate_id: ServiceRateId(row.try_get("service_rate_id").map_err(decode_error)?),
        description: row.try_get("description").map_err(decode_error)?,
        quantity: parse_u32("quantity", row.try_get("quantity").map_err(decode_error)?)?,
        nights: parse_u32("nights", row.try_get("nights").map_err(decode_error)?)?,
        unit_sell_cents: row.try_get("unit_sell_cents").map_err(decode_error)?,
        unit_cost_cents: row.try_get("unit_cost_cents").map_err(decode_error)?,
    })
}

fn quote_from_row(row: &SqliteRow, items: Vec<QuoteItem>) -> Result<Quote, RepositoryError> {
    let status: String = row.try_get("status").map_err(decode_error)?;
    let start_date: Option<String> = row.try_get("start_date").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;

    Ok(Quote {
        id: QuoteId(row.try_get("id").map_err(decode_error)?),
        client_id: row
            .try_get::<Option<String>, _>("client_id")
            .map_err(decode_error)?
            .map(ClientId),
        title: row.try_get("title").map_err(decode_error)?,
        status: parse_enum::<QuoteStatus>("status", &status)?,
        currency: row.try_get("currency").map_err(decode_error)?,
        travelers: parse_u32("travelers", row.try_get("travelers").map_err(decode_error)?)?,
        start_date: start_date.as_deref().map(|value| parse_date("start_date", value)).transpose()?,
        items,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

#[async_trait::async_trait]
impl QuoteRepository for SqlQuoteRepository {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let Some(row) = sqlx::query(
            "SELECT id, client_id, title, status, currency, travelers, start_date, created_at
             FROM quote WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let item_rows = sqlx::query(
            "SELECT id, service_rate_id, description, quantity, nights, unit_sell_cents, unit_cost_cents
             FROM quote_item WHERE quote_id = ? ORDER BY sort_order",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;
        let items = item_rows.iter().map(item_from_row).collect::<Result<Vec<_>, _>>()?;

        quote_from_row(&row, items).map(Some)
    }

    /// Upserts the header and replaces all items in one transaction.
    async fn save(&self, quote: Quote) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO quote (id, client_id, title, status, currency, travelers, start_date, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 client_id = excluded.client_id,
                 title = excluded.title,
                 status = excluded.status,
                 currency = excluded.currency,
                 travelers = excluded.travelers,
                 start_date = excluded.start_date",
        )
        .bind(&quote.id.0)
        .bind(quote.client_id.as_ref().map(|id| id.0.as_str()))
        .bind(&quote.title)
        .bind(quote.status.as_str())
        .bind(&quote.currency)
        .bind(i64::from(quote.travelers))
        .bind(quote.start_date.map(|date| date.format("%Y-%m-%d").to_string()))
        .bind(quote.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM quote_item WHERE quote_id = ?")
            .bind(&quote.id.0)
            .execute(&mut *tx)
            .await?;

        for (index, item) in quote.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO quote_item (id, quote_id, service_rate_id, description, quantity, nights,
                                         unit_sell_cents, unit_cost_cents, sort_order)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&item.id)
            .bind(&quote.id.0)
            .bind(&item.service_rate_id.0)
            .bind(&item.description)
            .bind(i64::from(item.quantity))
            .bind(i64::from(item.nights))
            .bind(item.unit_sell_cents)
            .bind(item.unit_cost_cents)
            .bind(index as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
