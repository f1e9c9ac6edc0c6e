use serde::{Deserialize, Serialize};

/// 聊天类型：一对一或群聊。
///
/// 两者的成员解析方式相同，群聊只是参与者集合更大。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    OneToOne,
    Group,
}
