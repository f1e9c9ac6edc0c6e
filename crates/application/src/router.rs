//! 消息路由器
//!
//! 对每条入站信封执行固定的状态机：解析 → 鉴权 → 持久化 →
//! 解析接收方 → 扇出。任何一步失败都终止这条信封的处理，
//! 由连接层把错误应答发回发送方。

use std::sync::Arc;

use domain::{Message, MessageContent, UserId};

use crate::envelope::{ClientEnvelope, MessageView, OutboundFrame, ServerEnvelope};
use crate::error::RouteError;
use crate::registry::{ConnectionHandle, ConnectionRegistry};
use crate::repository::ChatRepository;

/// 一次成功路由的结果，用于日志和测试断言。
#[derive(Debug)]
pub struct Delivery {
    pub message: Message,
    /// 解析出的接收方数量（不含发送方），无论是否在线。
    pub recipients: usize,
    /// 实际推送成功的连接数。
    pub deliveries: usize,
}

pub struct MessageRouter {
    repository: Arc<dyn ChatRepository>,
    registry: Arc<ConnectionRegistry>,
}

impl MessageRouter {
    pub fn new(repository: Arc<dyn ChatRepository>, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            repository,
            registry,
        }
    }

    /// 路由一条来自已认证连接的原始文本帧。
    ///
    /// `origin` 是发来这条信封的连接：持久化确认只发给它，
    /// 发送方的其他设备既收不到确认也收不到回显。
    pub async fn route(
        &self,
        sender_id: UserId,
        origin: &ConnectionHandle,
        raw: &str,
    ) -> Result<Delivery, RouteError> {
        // 1. 解析
        let envelope: ClientEnvelope =
            serde_json::from_str(raw).map_err(|_| RouteError::InvalidFormat)?;
        let chat_id = envelope.chat_id();
        let content =
            MessageContent::parse(envelope.message()).map_err(RouteError::InvalidContent)?;

        // 2. 鉴权：发送方必须是该聊天的活跃参与者
        if !self
            .repository
            .is_active_participant(chat_id, sender_id)
            .await?
        {
            return Err(RouteError::NotParticipant(chat_id));
        }

        // 3. 持久化。失败对这条信封是终态，本层不重试。
        let message = self
            .repository
            .create_message(chat_id, sender_id, content)
            .await?;

        // 4. 解析接收方：除发送方之外的活跃参与者。
        //    群聊与一对一走同一条路径，只是参与者集合更大。
        let recipients: Vec<UserId> = self
            .repository
            .active_participants(chat_id)
            .await?
            .into_iter()
            .filter(|participant| *participant != sender_id)
            .collect();

        // 5. 扇出：同一份出站信封推给每个在线连接。
        //    不在线的接收方直接跳过，他们之后通过 REST 拉历史。
        let outbound = OutboundFrame::from(ServerEnvelope::Message {
            data: MessageView::from(&message),
        });
        let mut deliveries = 0;
        for recipient in &recipients {
            for connection in self.registry.lookup(*recipient).await {
                if connection.push(outbound.clone()) {
                    deliveries += 1;
                } else {
                    tracing::debug!(
                        connection_id = %connection.id(),
                        user_id = %recipient,
                        "connection closed during fan-out, dropped"
                    );
                }
            }
        }

        // 6. 给发送方的持久化确认，带上分配的消息 id。
        if !origin.push(ServerEnvelope::ack(&message)) {
            tracing::debug!(
                connection_id = %origin.id(),
                "originating connection closed before ack"
            );
        }

        tracing::info!(
            message_id = %message.id,
            chat_id = %message.chat_id,
            sender_id = %sender_id,
            recipients = recipients.len(),
            deliveries,
            "message routed"
        );

        Ok(Delivery {
            message,
            recipients: recipients.len(),
            deliveries,
        })
    }
}
