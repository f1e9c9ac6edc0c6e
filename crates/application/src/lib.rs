//! 应用层实现。
//!
//! 这里提供消息投递引擎的用例逻辑：连接注册表、消息路由、
//! 在线状态更新，以及对持久化服务的抽象。

pub mod envelope;
pub mod error;
pub mod presence;
pub mod registry;
pub mod repository;
pub mod router;


pub use envelope::{ClientEnvelope, ErrorEnvelope, MessageView, OutboundFrame, ServerEnvelope};
pub use error::RouteError;
pub use presence::PresenceUpdater;
pub use registry::{ConnectionHandle, ConnectionId, ConnectionRegistry};
pub use repository::ChatRepository;
pub use router::{Delivery, MessageRouter};
