//! 连接注册表
//!
//! 已认证用户与活跃连接之间的双向索引。这是整个引擎唯一的
//! 共享可变状态：两张映射放在同一把锁里，保证正反向条目
//! 永远同时更新。注册表从不访问持久化层。

use std::collections::HashMap;
use std::fmt;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::envelope::OutboundFrame;
use domain::UserId;

/// 连接唯一标识，进程内有效。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 单个连接的发送句柄。
///
/// 注册表保存的是连接的出站队列发送端，而不是 socket 本身；
/// socket 由连接任务独占。克隆句柄只是克隆队列发送端。
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: mpsc::UnboundedSender<OutboundFrame>,
}

impl ConnectionHandle {
    pub fn new(sender: mpsc::UnboundedSender<OutboundFrame>) -> Self {
        Self {
            id: ConnectionId::new(),
            sender,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// 向连接推送一条服务端信封。
    ///
    /// 连接正在关闭时接收端已被丢弃，发送会失败；返回 false，
    /// 调用方直接跳过该连接即可。
    pub fn push(&self, frame: impl Into<OutboundFrame>) -> bool {
        self.sender.send(frame.into()).is_ok()
    }
}

#[derive(Default)]
struct RegistryInner {
    by_user: HashMap<UserId, HashMap<ConnectionId, ConnectionHandle>>,
    by_connection: HashMap<ConnectionId, UserId>,
}

/// 进程内连接注册表。
///
/// 一个用户可以有多个同时在线的连接（多设备），一个连接只属于
/// 一个用户。所有操作对并发调用安全。
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<RegistryInner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个连接。对同一连接幂等，不会挤掉该用户的其他连接。
    pub async fn register(&self, user_id: UserId, handle: ConnectionHandle) {
        let mut inner = self.inner.write().await;
        inner.by_connection.insert(handle.id(), user_id);
        inner
            .by_user
            .entry(user_id)
            .or_default()
            .insert(handle.id(), handle);
    }

    /// 移除一个连接的映射。连接不存在时是无操作（容忍重复关闭）。
    /// 返回该连接所属的用户（如果确实移除了条目）。
    pub async fn unregister(&self, connection_id: ConnectionId) -> Option<UserId> {
        let mut inner = self.inner.write().await;
        let user_id = inner.by_connection.remove(&connection_id)?;
        if let Some(connections) = inner.by_user.get_mut(&user_id) {
            connections.remove(&connection_id);
            if connections.is_empty() {
                inner.by_user.remove(&user_id);
            }
        }
        Some(user_id)
    }

    /// 返回某用户当前活跃连接的快照。
    ///
    /// 快照返回后连接随时可能关闭，调用方按尽力投递处理。
    pub async fn lookup(&self, user_id: UserId) -> Vec<ConnectionHandle> {
        let inner = self.inner.read().await;
        inner
            .by_user
            .get(&user_id)
            .map(|connections| connections.values().cloned().collect())
            .unwrap_or_default()
    }

    /// 当前注册的连接总数，仅用于日志。
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.by_connection.len()
    }
}
