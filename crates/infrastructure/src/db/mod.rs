//! 数据库连接池与仓储实现

use sqlx::{Pool, Postgres};

mod chat_repository;

pub use chat_repository::PgChatRepository;

pub type DbPool = Pool<Postgres>;

pub struct Db;

impl Db {
    pub async fn create_pool(database_url: &str, max_size: u32) -> Result<DbPool, sqlx::Error> {
        sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_size)
            .connect(database_url)
            .await
    }
}
