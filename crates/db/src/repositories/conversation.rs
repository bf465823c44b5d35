use chrono::SecondsFormat;
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use concierge_core::domain::client::ClientId;
use concierge_core::domain::conversation::{ConversationId, ConversationTurn, Role};

use super::{decode_error, parse_enum, parse_timestamp, ConversationMemoryRepository, RepositoryError};
use crate::DbPool;

pub struct SqlConversationMemoryRepository {
    pool: DbPool,
}

impl SqlConversationMemoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn turn_from_row(row: &SqliteRow) -> Result<ConversationTurn, RepositoryError> {
    let role: String = row.try_get("role").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;

    Ok(ConversationTurn {
        client_id: ClientId(row.try_get("client_id").map_err(decode_error)?),
        conversation_id: row
            .try_get::<Option<String>, _>("conversation_id")
            .map_err(decode_error)?
            .map(ConversationId),
        role: parse_enum::<Role>("role", &role)?,
        content: row.try_get("content").map_err(decode_error)?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

#[async_trait::async_trait]
impl ConversationMemoryRepository for SqlConversationMemoryRepository {
    async fn append(&self, turn: ConversationTurn) -> Result<(), RepositoryError> {
        if !matches!(turn.role, Role::User | Role::Assistant) {
            return Err(RepositoryError::Decode(format!(
                "conversation memory only stores user and assistant turns, got `{}`",
                turn.role.as_str()
            )));
        }

        sqlx::query(
            "INSERT INTO conversation_turn (id, client_id, conversation_id, role, content, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&turn.client_id.0)
        .bind(turn.conversation_id.as_ref().map(|id| id.0.as_str()))
        .bind(turn.role.as_str())
        .bind(&turn.content)
        .bind(turn.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent(
        &self,
        client_id: &ClientId,
        exclude_conversation: Option<&ConversationId>,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT client_id, conversation_id, role, content, created_at
             FROM conversation_turn
             WHERE client_id = ?1
               AND (?2 IS NULL OR conversation_id IS NULL OR conversation_id != ?2)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?3",
        )
        .bind(&client_id.0)
        .bind(exclude_conversation.map(|id| id.0.as_str()))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let mut turns = rows.iter().map(turn_from_row).collect::<Result<Vec<_>, _>>()?;
        turns.reverse();
        Ok(turns)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use concierge_core::domain::client::ClientId;
    use concierge_core::domain::conversation::{ConversationId, ConversationTurn, Role};

    use super::SqlConversationMemoryRepository;
    use crate::repositories::ConversationMemoryRepository;
    use crate::{connect_with_settings, migrations};

    async fn repo() -> SqlConversationMemoryRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlConversationMemoryRepository::new(pool)
    }

    fn turn(conversation: &str, role: Role, content: &str, minutes_ago: i64) -> ConversationTurn {
        let mut turn = ConversationTurn::new(
            ClientId("client-1".to_string()),
            Some(ConversationId(conversation.to_string())),
            role,
            content,
        );
        turn.created_at = Utc::now() - Duration::minutes(minutes_ago);
        turn
    }

    #[tokio::test]
    async fn recent_returns_latest_turns_oldest_first() {
        let repo = repo().await;
        repo.append(turn("conv-a", Role::User, "first", 30)).await.expect("append");
        repo.append(turn("conv-a", Role::Assistant, "second", 20)).await.expect("append");
        repo.append(turn("conv-a", Role::User, "third", 10)).await.expect("append");

        let turns = repo
            .recent(&ClientId("client-1".to_string()), None, 2)
            .await
            .expect("recent");

        let contents = turns.iter().map(|turn| turn.content.as_str()).collect::<Vec<_>>();
        assert_eq!(contents, vec!["second", "third"]);
    }

    #[tokio::test]
    async fn recent_skips_the_excluded_conversation() {
        let repo = repo().await;
        repo.append(turn("conv-old", Role::User, "Bhutan in spring?", 60)).await.expect("append");
        repo.append(turn("conv-now", Role::User, "Kathmandu hotels", 1)).await.expect("append");

        let turns = repo
            .recent(
                &ClientId("client-1".to_string()),
                Some(&ConversationId("conv-now".to_string())),
                10,
            )
            .await
            .expect("recent");

        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "Bhutan in spring?");
    }

    #[tokio::test]
    async fn tool_turns_are_rejected() {
        let repo = repo().await;
        assert!(repo.append(turn("conv-a", Role::Tool, "{}", 0)).await.is_err());
    }
}
