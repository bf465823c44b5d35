use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};

use concierge_core::domain::catalog::{
    Destination, PermitRequirement, ServiceRate, ServiceRateId, ServiceType,
};

use super::{decode_error, parse_enum, CatalogRepository, RateFilter, RateOrder, RepositoryError};
use crate::DbPool;

const RATE_COLUMNS: &str = "SELECT r.id, r.destination_id, d.name AS destination_name, r.service_type,
        r.category, r.name, r.star_rating, r.supplier_name, r.cost_price_cents,
        r.sell_price_cents, r.currency, r.unit, r.duration_days, r.season_start,
        r.season_end, r.capacity, r.description, r.active
     FROM service_rate r
     JOIN destination d ON d.id = r.destination_id";

pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn rate_from_row(row: &SqliteRow) -> Result<ServiceRate, RepositoryError> {
    let service_type: String = row.try_get("service_type").map_err(decode_error)?;
    let active: i64 = row.try_get("active").map_err(decode_error)?;

    Ok(ServiceRate {
        id: ServiceRateId(row.try_get("id").map_err(decode_error)?),
        destination_id: row.try_get("destination_id").map_err(decode_error)?,
        destination_name: row.try_get("destination_name").map_err(decode_error)?,
        service_type: parse_enum::<ServiceType>("service_type", &service_type)?,
        category: row.try_get("category").map_err(decode_error)?,
        name: row.try_get("name").map_err(decode_error)?,
        star_rating: row.try_get("star_rating").map_err(decode_error)?,
        supplier_name: row.try_get("supplier_name").map_err(decode_error)?,
        cost_price_cents: row.try_get("cost_price_cents").map_err(decode_error)?,
        sell_price_cents: row.try_get("sell_price_cents").map_err(decode_error)?,
        currency: row.try_get("currency").map_err(decode_error)?,
        unit: row.try_get("unit").map_err(decode_error)?,
        duration_days: row.try_get("duration_days").map_err(decode_error)?,
        season_start: row.try_get("season_start").map_err(decode_error)?,
        season_end: row.try_get("season_end").map_err(decode_error)?,
        capacity: row.try_get("capacity").map_err(decode_error)?,
        description: row.try_get("description").map_err(decode_error)?,
        active: active != 0,
    })
}

fn destination_from_row(row: &SqliteRow) -> Result<Destination, RepositoryError> {
    Ok(Destination {
        id: row.try_get("id").map_err(decode_error)?,
        name: row.try_get("name").map_err(decode_error)?,
        country: row.try_get("country").map_err(decode_error)?,
        region: row.try_get("region").map_err(decode_error)?,
        description: row.try_get("description").map_err(decode_error)?,
        max_altitude_m: row.try_get("max_altitude_m").map_err(decode_error)?,
    })
}

fn permit_from_row(row: &SqliteRow) -> Result<PermitRequirement, RepositoryError> {
    Ok(PermitRequirement {
        region: row.try_get("region").map_err(decode_error)?,
        permit_name: row.try_get("permit_name").map_err(decode_error)?,
        issuing_authority: row.try_get("issuing_authority").map_err(decode_error)?,
        fee_cents: row.try_get("fee_cents").map_err(decode_error)?,
        currency: row.try_get("currency").map_err(decode_error)?,
        notes: row.try_get("notes").map_err(decode_error)?,
    })
}

#[async_trait::async_trait]
impl CatalogRepository for SqlCatalogRepository {
    async fn search_rates(&self, filter: &RateFilter) -> Result<Vec<ServiceRate>, RepositoryError> {
        let mut query = QueryBuilder::<Sqlite>::new(RATE_COLUMNS);
        query.push(" WHERE r.active = 1");

        if let Some(destination) = filter.destination.as_deref() {
            let destination = destination.to_lowercase();
            query.push(" AND (LOWER(r.destination_id) = ");
            query.push_bind(destination.clone());
            query.push(" OR INSTR(LOWER(d.name), ");
            query.push_bind(destination);
            query.push(") > 0)");
        }
        if let Some(service_type) = filter.service_type {
            query.push(" AND r.service_type = ");
            query.push_bind(service_type.as_str());
        }
        if let Some(category) = filter.category.as_deref() {
            query.push(" AND LOWER(r.category) = ");
            query.push_bind(category.to_lowercase());
        }
        if let Some(text) = filter.text.as_deref() {
            let text = text.to_lowercase();
            query.push(" AND (INSTR(LOWER(r.name), ");
            query.push_bind(text.clone());
            query.push(") > 0 OR INSTR(LOWER(r.description), ");
            query.push_bind(text);
            query.push(") > 0)");
        }
        if let Some(min) = filter.min_star_rating {
            query.push(" AND COALESCE(r.star_rating, 0) >= ");
            query.push_bind(min);
        }
        if let Some(max) = filter.max_duration_days {
            query.push(" AND (r.duration_days IS NULL OR r.duration_days <= ");
            query.push_bind(max);
            query.push(")");
        }
        if !filter.exclude_ids.is_empty() {
            query.push(" AND r.id NOT IN (");
            let mut separated = query.separated(", ");
            for id in &filter.exclude_ids {
                separated.push_bind(id.clone());
            }
            separated.push_unseparated(")");
        }

        query.push(match filter.order {
            RateOrder::Name => " ORDER BY r.name ASC",
            RateOrder::SellPriceDesc => " ORDER BY r.sell_price_cents DESC, r.name ASC",
        });
        query.push(" LIMIT ");
        query.push_bind(i64::try_from(filter.limit).unwrap_or(i64::MAX));

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(rate_from_row).collect()
    }

    async fn find_rate(&self, id: &ServiceRateId) -> Result<Option<ServiceRate>, RepositoryError> {
        let row = sqlx::query(&format!("{RATE_COLUMNS} WHERE r.id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(rate_from_row).transpose()
    }

    async fn list_destinations(
        &self,
        country: Option<&str>,
    ) -> Result<Vec<Destination>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, country, region, description, max_altitude_m
             FROM destination
             WHERE ?1 IS NULL OR LOWER(country) = LOWER(?1)
             ORDER BY country, name",
        )
        .bind(country)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(destination_from_row).collect()
    }

    async fn list_categories(
        &self,
        service_type: Option<ServiceType>,
    ) -> Result<Vec<String>, RepositoryError> {
        let categories = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT category FROM service_rate
             WHERE active = 1 AND (?1 IS NULL OR service_type = ?1)
             ORDER BY category",
        )
        .bind(service_type.map(|service_type| service_type.as_str()))
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    async fn permits_for_region(
        &self,
        region: &str,
    ) -> Result<Vec<PermitRequirement>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT region, permit_name, issuing_authority, fee_cents, currency, notes
             FROM permit_requirement
             WHERE LOWER(region) = LOWER(?)
             ORDER BY permit_name",
        )
        .bind(region.trim())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(permit_from_row).collect()
    }
}
