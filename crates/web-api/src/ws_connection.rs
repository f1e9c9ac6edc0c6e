//! WebSocket 连接生命周期
//!
//! 封装单个已认证连接的全部逻辑：注册、首条 connected 推送、
//! 收发任务、以及断开时的清理。socket 本身只存在于这里，
//! 注册表和路由器拿到的都是出站队列的发送句柄。

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use application::{ConnectionHandle, ErrorEnvelope, RouteError, ServerEnvelope};
use domain::UserId;

use crate::state::AppState;

/// WebSocket 写操作命令
///
/// 所有对 socket 写端的操作都经由发送任务，避免并发写。
#[derive(Debug)]
enum WsCommand {
    SendPong(Vec<u8>),
}

pub struct ClientConnection {
    state: AppState,
    user_id: UserId,
}

impl ClientConnection {
    pub fn new(state: AppState, user_id: UserId) -> Self {
        Self { state, user_id }
    }

    /// 运行连接的主循环，直到任意一侧关闭。
    pub async fn run(self, socket: WebSocket) {
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        let handle = ConnectionHandle::new(outbound_tx);
        let connection_id = handle.id();

        // 首条推送必须先于注册入队：注册之后路由器就可能向这个
        // 队列扇出消息，队列保序，先入队才能保证 connected 是
        // 客户端收到的第一帧。
        handle.push(ServerEnvelope::connected(self.user_id));
        self.state.registry.register(self.user_id, handle.clone()).await;
        self.state.presence.touch(self.user_id);
        let total_connections = self.state.registry.connection_count().await;
        tracing::info!(
            user_id = %self.user_id,
            connection_id = %connection_id,
            total_connections,
            "websocket connected"
        );

        let (mut sender, mut incoming) = socket.split();
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<WsCommand>(32);

        // 发送任务：唯一的 socket 写入方
        let send_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    maybe_cmd = cmd_rx.recv() => match maybe_cmd {
                        Some(WsCommand::SendPong(data)) => {
                            if sender.send(WsMessage::Pong(data.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                    maybe_frame = outbound_rx.recv() => match maybe_frame {
                        Some(frame) => {
                            let payload = match serde_json::to_string(&frame) {
                                Ok(json) => json,
                                Err(err) => {
                                    tracing::warn!(error = %err, "failed to serialize outbound frame");
                                    continue;
                                }
                            };
                            if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
            tracing::debug!(connection_id = %connection_id, "send task finished");
        });

        // 接收任务：按到达顺序逐条处理入站帧
        let router = self.state.router.clone();
        let recv_handle = handle.clone();
        let recv_user_id = self.user_id;
        let recv_task = tokio::spawn(async move {
            while let Some(Ok(message)) = incoming.next().await {
                match message {
                    WsMessage::Text(text) => {
                        if let Err(err) = router.route(recv_user_id, &recv_handle, text.as_str()).await
                        {
                            match &err {
                                RouteError::Repository(source) => {
                                    tracing::error!(
                                        error = %source,
                                        user_id = %recv_user_id,
                                        "failed to persist inbound message"
                                    );
                                }
                                other => {
                                    tracing::debug!(
                                        error = %other,
                                        user_id = %recv_user_id,
                                        "inbound envelope rejected"
                                    );
                                }
                            }
                            // 错误只回给发送方，连接保持打开
                            if !recv_handle.push(ErrorEnvelope::new(err.client_message())) {
                                break;
                            }
                        }
                    }
                    WsMessage::Ping(data) => {
                        if cmd_tx.send(WsCommand::SendPong(data.to_vec())).await.is_err() {
                            break;
                        }
                    }
                    WsMessage::Pong(_) => {}
                    WsMessage::Binary(_) => {
                        tracing::debug!("binary frames are not supported, ignored");
                    }
                    WsMessage::Close(_) => break,
                }
            }
            tracing::debug!(connection_id = %connection_id, "receive task finished");
        });

        // 任一任务结束即视为连接终止
        tokio::select! {
            _ = send_task => {}
            _ = recv_task => {}
        }

        // 清理恰好一次：重复关闭事件由注册表的幂等性兜底
        if self.state.registry.unregister(connection_id).await.is_some() {
            self.state.presence.touch(self.user_id);
        }
        tracing::info!(
            user_id = %self.user_id,
            connection_id = %connection_id,
            "websocket disconnected"
        );
    }
}
