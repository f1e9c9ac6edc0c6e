use domain::{DomainError, RepositoryError};
use thiserror::Error;

/// 单条入站信封的路由错误。
///
/// 所有变体都只影响触发它的那条信封：连接保持打开，
/// 发送方收到错误应答，其他连接不受影响。
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid message format")]
    InvalidFormat,
    #[error("invalid message content: {0}")]
    InvalidContent(DomainError),
    #[error("sender is not an active participant of chat {0}")]
    NotParticipant(domain::ChatId),
    #[error("persistence failed: {0}")]
    Repository(#[from] RepositoryError),
}

impl RouteError {
    /// 发回给客户端的错误文案。
    pub fn client_message(&self) -> &'static str {
        match self {
            RouteError::InvalidFormat => "Invalid message format",
            RouteError::InvalidContent(_) => "Message content is required",
            RouteError::NotParticipant(_) => "You are not a participant of this chat",
            RouteError::Repository(_) => "Failed to send message",
        }
    }
}
