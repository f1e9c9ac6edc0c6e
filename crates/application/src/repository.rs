//! 持久化服务抽象。
//!
//! 投递引擎把存储当作外部协作者：这里只声明它需要的四个操作，
//! Postgres 实现在 infrastructure crate，内存实现在下面的
//! memory 模块里供测试使用。

use async_trait::async_trait;
use domain::{ChatId, Message, MessageContent, RepositoryError, Timestamp, UserId};

#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// 用户是否为该聊天的活跃参与者。
    async fn is_active_participant(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError>;

    /// 持久化一条消息，标识由存储分配。
    /// 返回的消息带有发送者用户名，用于构造投递视图。
    async fn create_message(
        &self,
        chat_id: ChatId,
        sender_id: UserId,
        content: MessageContent,
    ) -> Result<Message, RepositoryError>;

    /// 该聊天的全部活跃参与者。
    async fn active_participants(&self, chat_id: ChatId) -> Result<Vec<UserId>, RepositoryError>;

    /// 记录用户最后活跃时间，尽力而为。
    async fn touch_last_seen(&self, user_id: UserId, at: Timestamp) -> Result<(), RepositoryError>;
}

/// 内存实现（用于测试）
pub mod memory {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::RwLock;

    use domain::MessageId;

    #[derive(Default)]
    struct State {
        users: HashMap<UserId, String>,
        participants: HashMap<ChatId, HashSet<UserId>>,
        inactive: HashMap<ChatId, HashSet<UserId>>,
        messages: Vec<Message>,
        last_seen: HashMap<UserId, Timestamp>,
        next_message_id: i64,
    }

    #[derive(Default)]
    pub struct MemoryChatRepository {
        state: RwLock<State>,
        fail_writes: AtomicBool,
    }

    impl MemoryChatRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn add_user(&self, user_id: UserId, username: impl Into<String>) {
            self.state
                .write()
                .await
                .users
                .insert(user_id, username.into());
        }

        pub async fn add_participant(&self, chat_id: ChatId, user_id: UserId) {
            self.state
                .write()
                .await
                .participants
                .entry(chat_id)
                .or_default()
                .insert(user_id);
        }

        /// 把参与者标记为已退出：仍有历史记录，但不再收发消息。
        pub async fn deactivate_participant(&self, chat_id: ChatId, user_id: UserId) {
            let mut state = self.state.write().await;
            if let Some(members) = state.participants.get_mut(&chat_id) {
                members.remove(&user_id);
            }
            state.inactive.entry(chat_id).or_default().insert(user_id);
        }

        /// 让后续写操作失败，模拟持久化故障。
        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub async fn messages(&self) -> Vec<Message> {
            self.state.read().await.messages.clone()
        }

        pub async fn last_seen(&self, user_id: UserId) -> Option<Timestamp> {
            self.state.read().await.last_seen.get(&user_id).copied()
        }
    }

    #[async_trait]
    impl ChatRepository for MemoryChatRepository {
        async fn is_active_participant(
            &self,
            chat_id: ChatId,
            user_id: UserId,
        ) -> Result<bool, RepositoryError> {
            let state = self.state.read().await;
            Ok(state
                .participants
                .get(&chat_id)
                .is_some_and(|members| members.contains(&user_id)))
        }

        async fn create_message(
            &self,
            chat_id: ChatId,
            sender_id: UserId,
            content: MessageContent,
        ) -> Result<Message, RepositoryError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(RepositoryError::database("simulated write failure"));
            }
            let mut state = self.state.write().await;
            let sender_username = state
                .users
                .get(&sender_id)
                .cloned()
                .ok_or_else(|| RepositoryError::not_found("user"))?;
            state.next_message_id += 1;
            let message = Message {
                id: MessageId::new(state.next_message_id),
                chat_id,
                sender_id,
                sender_username,
                content,
                created_at: chrono::Utc::now(),
            };
            state.messages.push(message.clone());
            Ok(message)
        }

        async fn active_participants(
            &self,
            chat_id: ChatId,
        ) -> Result<Vec<UserId>, RepositoryError> {
            let state = self.state.read().await;
            let mut members: Vec<UserId> = state
                .participants
                .get(&chat_id)
                .map(|members| members.iter().copied().collect())
                .unwrap_or_default();
            members.sort();
            Ok(members)
        }

        async fn touch_last_seen(
            &self,
            user_id: UserId,
            at: Timestamp,
        ) -> Result<(), RepositoryError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(RepositoryError::database("simulated write failure"));
            }
            self.state.write().await.last_seen.insert(user_id, at);
            Ok(())
        }
    }
}
