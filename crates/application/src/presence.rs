//! 在线状态更新器
//!
//! 连接建立和断开时把"最后活跃时间"写入持久化层。
//! 纯粹是尽力而为的元数据：写失败只记日志，绝不影响
//! 连接本身或消息投递。

use std::sync::Arc;

use domain::UserId;

use crate::repository::ChatRepository;

pub struct PresenceUpdater {
    repository: Arc<dyn ChatRepository>,
}

impl PresenceUpdater {
    pub fn new(repository: Arc<dyn ChatRepository>) -> Self {
        Self { repository }
    }

    /// 异步写入当前时间作为用户最后活跃时间。立即返回，不阻塞调用方。
    pub fn touch(&self, user_id: UserId) {
        let repository = self.repository.clone();
        tokio::spawn(async move {
            let now = chrono::Utc::now();
            if let Err(err) = repository.touch_last_seen(user_id, now).await {
                tracing::warn!(error = %err, user_id = %user_id, "failed to update last seen");
            }
        });
    }
}
