//! Web API 层
//!
//! 提供 WebSocket 连接入口：握手认证、连接生命周期、
//! 以及把入站帧交给消息路由器。

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;
pub mod websocket;
pub mod ws_connection;

pub use auth::{Claims, JwtService};
pub use config::JwtConfig;
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
