//! 基础设施层
//!
//! 持久化服务的 PostgreSQL 实现。

pub mod db;

pub use db::{Db, DbPool, PgChatRepository};
