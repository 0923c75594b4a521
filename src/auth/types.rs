// 认证模块数据类型定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 登录会话
///
/// `token` 即服务端下发的 sessionid Cookie 值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// sessionid
    pub token: String,
    /// 登录用户名（从已保存的会话恢复时可能缺失）
    #[serde(default)]
    pub username: Option<String>,
    /// 登录时间戳
    pub login_time: i64,
}

impl Session {
    /// 创建新的会话
    pub fn new(token: impl Into<String>, username: Option<String>) -> Self {
        Self {
            token: token.into(),
            username,
            login_time: chrono::Utc::now().timestamp(),
        }
    }

    /// 生成 Cookie 请求头的值
    pub fn cookie_header(&self) -> String {
        format!("{}={}", super::constants::COOKIE_SESSION, self.token)
    }

    /// 日志中使用的脱敏 token
    pub fn masked_token(&self) -> String {
        let visible: String = self.token.chars().take(6).collect();
        format!("{}...", visible)
    }
}

/// 登录凭证
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

// 避免密码出现在日志里
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}
