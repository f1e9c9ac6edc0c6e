//! 消息投递引擎核心领域模型
//!
//! 包含用户、聊天、消息等核心实体，以及相关的校验规则。

pub mod chat;
pub mod errors;
pub mod message;
pub mod value_objects;

// 重新导出常用类型
pub use chat::*;
pub use errors::*;
pub use message::*;
pub use value_objects::*;
