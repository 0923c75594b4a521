//! 会话持久化
//!
//! 核心逻辑只通过 `SessionStore` 读写会话，具体存放位置由调用方决定。

use crate::auth::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// 会话存储
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 保存会话（覆盖旧值）
    async fn save(&self, session: &Session) -> Result<()>;

    /// 读取会话，不存在时返回 None
    async fn load(&self) -> Result<Option<Session>>;

    /// 删除会话，不存在时也返回成功
    async fn clear(&self) -> Result<()>;
}

/// 基于 JSON 文件的会话存储
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create session directory")?;
            }
        }

        let content =
            serde_json::to_string_pretty(session).context("Failed to serialize session")?;
        fs::write(&self.path, content)
            .await
            .context("Failed to write session file")?;

        info!("会话已保存: {:?}", self.path);
        Ok(())
    }

    async fn load(&self) -> Result<Option<Session>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("会话文件不存在: {:?}", self.path);
                return Ok(None);
            }
            Err(e) => return Err(e).context("Failed to read session file"),
        };

        match serde_json::from_str::<Session>(&content) {
            Ok(session) if !session.token.is_empty() => Ok(Some(session)),
            Ok(_) => Ok(None),
            Err(e) => {
                // 文件损坏时视为没有会话，下次登录会覆盖
                warn!("会话文件解析失败，忽略: {}", e);
                Ok(None)
            }
        }
    }

    async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                info!("会话文件已删除: {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove session file"),
        }
    }
}

/// 内存会话存储（嵌入使用或测试）
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }

    /// 当前保存的会话
    pub fn current(&self) -> Option<Session> {
        self.session.lock().clone()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, session: &Session) -> Result<()> {
        *self.session.lock() = Some(session.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<Session>> {
        Ok(self.session.lock().clone())
    }

    async fn clear(&self) -> Result<()> {
        *self.session.lock() = None;
        Ok(())
    }
}
