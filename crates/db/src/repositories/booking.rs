use sqlx::{sqlite::SqliteRow, Row};

use concierge_core::domain::booking::{
    Booking, BookingStatus, ConfirmationStatus, InstallmentStatus, PaymentInstallment,
    SupplierConfirmation,
};
use concierge_core::domain::client::ClientId;
use concierge_core::domain::quote::QuoteId;

use super::{decode_error, parse_date, parse_enum, parse_u32, BookingRepository, RepositoryError};
use crate::DbPool;

pub struct SqlBookingRepository {
    pool: DbPool,
}

impl SqlBookingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn booking_from_row(row: &SqliteRow) -> Result<Booking, RepositoryError> {
    let status: String = row.try_get("status").map_err(decode_error)?;
    let start_date: String = row.try_get("start_date").map_err(decode_error)?;
    let end_date: String = row.try_get("end_date").map_err(decode_error)?;

    Ok(Booking {
        id: row.try_get("id").map_err(decode_error)?,
        reference: row.try_get("reference").map_err(decode_error)?,
        quote_id: row.try_get::<Option<String>, _>("quote_id").map_err(decode_error)?.map(QuoteId),
        client_id: row
            .try_get::<Option<String>, _>("client_id")
            .map_err(decode_error)?
            .map(ClientId),
        destination_name: row.try_get("destination_name").map_err(decode_error)?,
        status: parse_enum::<BookingStatus>("status", &status)?,
        start_date: parse_date("start_date", &start_date)?,
        end_date: parse_date("end_date", &end_date)?,
        travelers: parse_u32("travelers", row.try_get("travelers").map_err(decode_error)?)?,
        total_cents: row.try_get("total_cents").map_err(decode_error)?,
        paid_cents: row.try_get("paid_cents").map_err(decode_error)?,
        currency: row.try_get("currency").map_err(decode_error)?,
    })
}

#[async_trait::async_trait]
impl BookingRepository for SqlBookingRepository {
    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Booking>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, reference, quote_id, client_id, destination_name, status, start_date,
                    end_date, travelers, total_cents, paid_cents, currency
             FROM booking WHERE UPPER(reference) = UPPER(?)",
        )
        .bind(reference.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(booking_from_row).transpose()
    }

    async fn installments(
        &self,
        booking_id: &str,
    ) -> Result<Vec<PaymentInstallment>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT label, due_date, amount_cents, status
             FROM payment_installment WHERE booking_id = ? ORDER BY due_date",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<PaymentInstallment, RepositoryError> {
                let due_date: String = row.try_get("due_date").map_err(decode_error)?;
                let status: String = row.try_get("status").map_err(decode_error)?;
                Ok(PaymentInstallment {
                    label: row.try_get("label").map_err(decode_error)?,
                    due_date: parse_date("due_date", &due_date)?,
                    amount_cents: row.try_get("amount_cents").map_err(decode_error)?,
                    status: parse_enum::<InstallmentStatus>("status", &status)?,
                })
            })
            .collect()
    }

    async fn confirmations(
        &self,
        booking_id: &str,
    ) -> Result<Vec<SupplierConfirmation>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT supplier_name, service_name, status, confirmation_number
             FROM supplier_confirmation WHERE booking_id = ? ORDER BY supplier_name",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<SupplierConfirmation, RepositoryError> {
                let status: String = row.try_get("status").map_err(decode_error)?;
                Ok(SupplierConfirmation {
                    supplier_name: row.try_get("supplier_name").map_err(decode_error)?,
                    service_name: row.try_get("service_name").map_err(decode_error)?,
                    status: parse_enum::<ConfirmationStatus>("status", &status)?,
                    confirmation_number: row.try_get("confirmation_number").map_err(decode_error)?,
                })
            })
            .collect()
    }
}
