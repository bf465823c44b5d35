use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_DESTINATION_IDS: &[&str] =
    &["dest-ktm", "dest-khumbu", "dest-pokhara", "dest-paro", "dest-leh"];

const SEED_RATE_IDS: &[&str] = &[
    "rate-ktm-dwarikas",
    "rate-ktm-hyatt",
    "rate-ktm-marriott",
    "rate-ktm-yak-yeti",
    "rate-ktm-old-annex",
    "rate-ktm-heritage-walk",
    "rate-ktm-mountain-flight",
    "rate-ktm-airport-transfer",
    "rate-ktm-helicopter-ebc",
    "rate-khumbu-ebc-luxury",
    "rate-khumbu-sherpa-guide",
    "rate-pokhara-tiger-mountain",
    "rate-pokhara-annapurna-lodge-trek",
    "rate-paro-amankora",
    "rate-paro-bhutan-journey",
    "rate-leh-nubra-camp",
];

const SEED_PERMIT_IDS: &[&str] = &[
    "permit-khumbu-spnp",
    "permit-khumbu-municipality",
    "permit-annapurna-acap",
    "permit-annapurna-tims",
    "permit-ladakh-ilp",
];

const SEED_CLIENT_IDS: &[&str] = &["client-demo-001"];
const SEED_BOOKING_IDS: &[&str] = &["booking-demo-001"];

pub const DEMO_CLIENT_ID: &str = "client-demo-001";
pub const DEMO_BOOKING_REFERENCE: &str = "CNC-2026-0417";

/// Demo catalog: Himalayan destinations, contracted rates, permits and one
/// booking with its payment schedule and supplier confirmations.
pub struct DemoCatalog;

impl DemoCatalog {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_catalog.sql");

    /// Loads the fixture. Safe to run repeatedly.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        sqlx::raw_sql(Self::SQL).execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(SeedResult {
            destinations: SEED_DESTINATION_IDS.len(),
            rates: SEED_RATE_IDS.len(),
            permits: SEED_PERMIT_IDS.len(),
            clients: SEED_CLIENT_IDS.len(),
            bookings: SEED_BOOKING_IDS.len(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for (label, table, ids) in [
            ("destinations", "destination", SEED_DESTINATION_IDS),
            ("service-rates", "service_rate", SEED_RATE_IDS),
            ("permits", "permit_requirement", SEED_PERMIT_IDS),
            ("clients", "client_profile", SEED_CLIENT_IDS),
            ("bookings", "booking", SEED_BOOKING_IDS),
        ] {
            let present = count_ids(pool, table, ids).await?;
            checks.push((label, present == ids.len() as i64));
        }

        let installments: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM payment_installment WHERE booking_id = ?1")
                .bind(SEED_BOOKING_IDS[0])
                .fetch_one(pool)
                .await?;
        checks.push(("payment-schedule", installments == 3));

        let confirmations: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM supplier_confirmation WHERE booking_id = ?1")
                .bind(SEED_BOOKING_IDS[0])
                .fetch_one(pool)
                .await?;
        checks.push(("supplier-confirmations", confirmations == 3));

        let priced_above_cost: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM service_rate WHERE sell_price_cents <= cost_price_cents",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("sell-above-cost", priced_above_cost == 0));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes seeded rows; child rows go with their parents through `ON DELETE CASCADE`.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        for (table, ids) in [
            ("booking", SEED_BOOKING_IDS),
            ("client_profile", SEED_CLIENT_IDS),
            ("permit_requirement", SEED_PERMIT_IDS),
            ("service_rate", SEED_RATE_IDS),
            ("destination", SEED_DESTINATION_IDS),
        ] {
            sqlx::query(&format!("DELETE FROM {table} WHERE id IN {}", sql_array_from_ids(ids)))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn count_ids(pool: &DbPool, table: &str, ids: &[&str]) -> Result<i64, RepositoryError> {
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(1) FROM {table} WHERE id IN {}",
        sql_array_from_ids(ids)
    ))
    .fetch_one(pool)
    .await?;
    Ok(count)
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedResult {
    pub destinations: usize,
    pub rates: usize,
    pub permits: usize,
    pub clients: usize,
    pub bookings: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
