use serde::{Deserialize, Serialize};

use crate::value_objects::{ChatId, MessageContent, MessageId, Timestamp, UserId};

/// 已持久化的聊天消息。
///
/// 标识由持久化层分配，创建后不可变；编辑和删除属于 REST 层，
/// 不在投递引擎的范围内。sender_username 随消息一起返回，
/// 用于构造发往客户端的消息视图。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender_id: UserId,
    pub sender_username: String,
    pub content: MessageContent,
    pub created_at: Timestamp,
}
