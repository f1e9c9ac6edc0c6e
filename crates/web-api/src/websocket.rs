//! WebSocket 握手处理
//!
//! 凭证通过升级请求的 `token` 查询参数携带。验证失败时仍然
//! 完成协议升级，然后立刻以 1008（policy violation）关闭，
//! 不会为失败的握手建立任何注册表条目。

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::Deserialize;

use domain::UserId;

use crate::state::AppState;
use crate::ws_connection::ClientConnection;

/// WebSocket连接查询参数
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// JWT access token
    pub token: Option<String>,
}

pub async fn websocket_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> Response {
    // 升级前完成验证，升级后只剩发送结果
    let verdict = match query.token.as_deref() {
        None | Some("") => {
            tracing::warn!("websocket handshake rejected: missing token");
            Err("Authentication failed, token is required")
        }
        Some(token) => match state.jwt_service.verify_token(token) {
            Ok(claims) => Ok(UserId::new(claims.user_id)),
            Err(err) => {
                tracing::warn!(reason = %err.message(), "websocket handshake rejected: invalid token");
                Err("Authentication failed, invalid token")
            }
        },
    };

    ws.on_upgrade(move |socket| async move {
        match verdict {
            Ok(user_id) => ClientConnection::new(state, user_id).run(socket).await,
            Err(reason) => refuse(socket, reason).await,
        }
    })
}

/// 以 1008 和可读原因关闭一个未通过握手的 socket。
async fn refuse(mut socket: WebSocket, reason: &'static str) {
    let frame = CloseFrame {
        code: close_code::POLICY,
        reason: reason.into(),
    };
    if let Err(err) = socket.send(WsMessage::Close(Some(frame))).await {
        tracing::debug!(error = %err, "failed to send close frame to refused connection");
    }
}
