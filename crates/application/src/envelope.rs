//! 连接层的线协议定义。
//!
//! 客户端和服务端之间交换的 JSON 信封。字段名通过 serde
//! 重命名与线上格式保持一致（camelCase）。

use domain::{ChatId, ChatKind, Message, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// 客户端发来的应用信封。
///
/// `{ "type": "onetoone" | "group", "chatId": <int>, "message": "<string>" }`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEnvelope {
    #[serde(rename = "onetoone")]
    OneToOne {
        #[serde(rename = "chatId")]
        chat_id: i64,
        message: String,
    },
    #[serde(rename = "group")]
    Group {
        #[serde(rename = "chatId")]
        chat_id: i64,
        message: String,
    },
}

impl ClientEnvelope {
    pub fn kind(&self) -> ChatKind {
        match self {
            Self::OneToOne { .. } => ChatKind::OneToOne,
            Self::Group { .. } => ChatKind::Group,
        }
    }

    pub fn chat_id(&self) -> ChatId {
        match self {
            Self::OneToOne { chat_id, .. } | Self::Group { chat_id, .. } => ChatId::new(*chat_id),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::OneToOne { message, .. } | Self::Group { message, .. } => message,
        }
    }
}

/// 服务端推送给客户端的信封。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEnvelope {
    /// 握手成功后的首条推送。userId 按线协议以字符串形式发送。
    Connected {
        #[serde(rename = "userId")]
        user_id: String,
    },
    /// 投递给接收方的消息。
    Message { data: MessageView },
    /// 发给发送方本人的持久化确认。
    Ack {
        #[serde(rename = "messageId")]
        message_id: i64,
        #[serde(rename = "chatId")]
        chat_id: i64,
    },
}

impl ServerEnvelope {
    pub fn connected(user_id: UserId) -> Self {
        Self::Connected {
            user_id: user_id.to_string(),
        }
    }

    pub fn ack(message: &Message) -> Self {
        Self::Ack {
            message_id: message.id.into(),
            chat_id: message.chat_id.into(),
        }
    }
}

/// 投递给接收方的消息视图。
///
/// 刚投递的消息对接收方来说始终未读，isRead 固定为 false；
/// 真正的已读状态由 REST 层维护。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: i64,
    pub content: String,
    pub sender_id: i64,
    pub sender_username: String,
    pub chat_id: i64,
    pub created_at: Timestamp,
    pub is_read: bool,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.into(),
            content: message.content.as_str().to_owned(),
            sender_id: message.sender_id.into(),
            sender_username: message.sender_username.clone(),
            chat_id: message.chat_id.into(),
            created_at: message.created_at,
            is_read: false,
        }
    }
}

/// 只发给出错信封发送方的错误应答。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// 连接出站队列里的一帧。
///
/// 错误应答的线格式是裸的 `{"error":...}`，与带 type 标签的
/// 服务端信封不同，所以这里用 untagged 联合而不是再加一个变体。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundFrame {
    Server(ServerEnvelope),
    Error(ErrorEnvelope),
}

impl From<ServerEnvelope> for OutboundFrame {
    fn from(envelope: ServerEnvelope) -> Self {
        Self::Server(envelope)
    }
}

impl From<ErrorEnvelope> for OutboundFrame {
    fn from(envelope: ErrorEnvelope) -> Self {
        Self::Error(envelope)
    }
}
