use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use concierge_core::domain::client::{apply_score_delta, ClientId, ClientProfile};

use super::{decode_error, ClientProfileRepository, RepositoryError};
use crate::DbPool;

pub struct SqlClientProfileRepository {
    pool: DbPool,
}

impl SqlClientProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn profile_from_row(row: &SqliteRow) -> Result<ClientProfile, RepositoryError> {
    let lead_score: i64 = row.try_get("lead_score").map_err(decode_error)?;
    let lead_score = u8::try_from(lead_score.clamp(0, 100))
        .map_err(|_| RepositoryError::Decode(format!("invalid lead_score {lead_score}")))?;

    Ok(ClientProfile {
        id: ClientId(row.try_get("id").map_err(decode_error)?),
        name: row.try_get("name").map_err(decode_error)?,
        email: row.try_get("email").map_err(decode_error)?,
        locale: row.try_get("locale").map_err(decode_error)?,
        lead_score,
    })
}

#[async_trait::async_trait]
impl ClientProfileRepository for SqlClientProfileRepository {
    async fn find_by_id(&self, id: &ClientId) -> Result<Option<ClientProfile>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, email, locale, lead_score FROM client_profile WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(profile_from_row).transpose()
    }

    async fn save(&self, profile: ClientProfile) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO client_profile (id, name, email, locale, lead_score, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 email = excluded.email,
                 locale = excluded.locale,
                 lead_score = excluded.lead_score,
                 updated_at = excluded.updated_at",
        )
        .bind(&profile.id.0)
        .bind(&profile.name)
        .bind(profile.email.as_deref())
        .bind(&profile.locale)
        .bind(i64::from(profile.lead_score.min(100)))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn adjust_lead_score(&self, id: &ClientId, delta: i32) -> Result<u8, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT lead_score FROM client_profile WHERE id = ?")
                .bind(&id.0)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(current) = current else {
            return Err(RepositoryError::NotFound { entity: "client_profile", id: id.0.clone() });
        };

        let updated = apply_score_delta(current.clamp(0, 100) as u8, delta);
        sqlx::query("UPDATE client_profile SET lead_score = ?, updated_at = ? WHERE id = ?")
            .bind(i64::from(updated))
            .bind(Utc::now().to_rfc3339())
            .bind(&id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn update_locale(&self, id: &ClientId, locale: &str) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE client_profile SET locale = ?, updated_at = ? WHERE id = ?")
                .bind(locale)
                .bind(Utc::now().to_rfc3339())
                .bind(&id.0)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound { entity: "client_profile", id: id.0.clone() });
        }
        Ok(())
    }
}
