//! 持久化服务的 PostgreSQL 实现

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use application::ChatRepository;
use domain::{
    ChatId, Message, MessageContent, MessageId, RepositoryError, Timestamp, UserId,
};

use crate::db::DbPool;

/// 数据库消息模型（含 join 出来的发送者用户名）
#[derive(Debug, Clone, FromRow)]
struct DbMessage {
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub sender_username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl DbMessage {
    fn into_message(self) -> Result<Message, RepositoryError> {
        // 入库前内容已经过校验，这里失败说明数据被绕过应用层写入
        let content = MessageContent::parse(self.content)
            .map_err(|err| RepositoryError::database(format!("corrupt message content: {err}")))?;
        Ok(Message {
            id: MessageId::new(self.id),
            chat_id: ChatId::new(self.chat_id),
            sender_id: UserId::new(self.sender_id),
            sender_username: self.sender_username,
            content,
            created_at: self.created_at,
        })
    }
}

pub struct PgChatRepository {
    pool: DbPool,
}

impl PgChatRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn is_active_participant(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM chat_participants
                WHERE chat_id = $1 AND user_id = $2 AND is_active
            )
            "#,
        )
        .bind(i64::from(chat_id))
        .bind(i64::from(user_id))
        .fetch_one(&self.pool)
        .await
        .map_err(|err| RepositoryError::database(err.to_string()))?;

        Ok(exists)
    }

    async fn create_message(
        &self,
        chat_id: ChatId,
        sender_id: UserId,
        content: MessageContent,
    ) -> Result<Message, RepositoryError> {
        let row: DbMessage = sqlx::query_as(
            r#"
            WITH inserted AS (
                INSERT INTO messages (chat_id, sender_id, content)
                VALUES ($1, $2, $3)
                RETURNING id, chat_id, sender_id, content, created_at
            )
            SELECT i.id, i.chat_id, i.sender_id, u.username AS sender_username,
                   i.content, i.created_at
            FROM inserted i
            JOIN users u ON u.id = i.sender_id
            "#,
        )
        .bind(i64::from(chat_id))
        .bind(i64::from(sender_id))
        .bind(content.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| RepositoryError::database(err.to_string()))?;

        row.into_message()
    }

    async fn active_participants(&self, chat_id: ChatId) -> Result<Vec<UserId>, RepositoryError> {
        let rows: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT user_id FROM chat_participants
            WHERE chat_id = $1 AND is_active
            ORDER BY user_id
            "#,
        )
        .bind(i64::from(chat_id))
        .fetch_all(&self.pool)
        .await
        .map_err(|err| RepositoryError::database(err.to_string()))?;

        Ok(rows.into_iter().map(UserId::new).collect())
    }

    async fn touch_last_seen(&self, user_id: UserId, at: Timestamp) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE users SET last_seen = $2 WHERE id = $1")
            .bind(i64::from(user_id))
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|err| RepositoryError::database(err.to_string()))?;

        Ok(())
    }
}
