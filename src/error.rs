//! 错误类型定义
//!
//! 按失败的影响范围划分：
//! - `AuthError`：登录失败，终止本次登录
//! - `ApiError`：接口请求失败（会话缺失/过期、权限不足、服务器错误、解析失败）
//! - `DownloadError`：单个文件下载失败，重试耗尽后记录并跳过
//! - `FilesystemError`：所有候选下载目录均不可用

use std::path::PathBuf;
use thiserror::Error;

/// 登录错误
#[derive(Debug, Error)]
pub enum AuthError {
    /// 用户名或密码错误
    #[error("登录失败: 用户名或密码不正确")]
    InvalidCredentials,

    /// CSRF 校验失败
    #[error("登录失败: CSRF 校验未通过，请重试")]
    CsrfRejected,

    /// 服务端重新返回了登录表单
    #[error("登录失败: 服务端重新返回了登录页面")]
    LoginFormReplayed,

    /// 重定向看起来成功，但没有拿到 sessionid
    #[error("登录结果不确定: 已重定向到 {location}，但未找到 sessionid")]
    Indeterminate { location: String },

    /// 响应中找不到任何会话信息
    #[error("登录失败: 找不到会话信息 (HTTP {status})，站点结构可能已变更")]
    NoSession { status: u16 },

    /// 网络错误
    #[error("登录请求失败: {0}")]
    Network(#[from] reqwest::Error),
}

/// 接口请求错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 尚未登录，不发起网络请求
    #[error("需要先登录")]
    SessionRequired,

    /// HTTP 401
    #[error("会话已过期，请重新登录")]
    SessionExpired,

    /// HTTP 403
    #[error("没有访问权限，请检查登录状态")]
    Forbidden,

    /// 其它 HTTP >= 400
    #[error("HTTP {status}: 服务器错误")]
    Server { status: u16, body: String },

    /// 响应不是合法 JSON 或结构不符
    #[error("解析 {endpoint} 响应失败: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// 网络错误
    #[error("网络请求失败: {0}")]
    Network(#[from] reqwest::Error),
}

impl ApiError {
    /// 是否属于认证类错误（需要重新登录，整个批次终止）
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            ApiError::SessionRequired | ApiError::SessionExpired | ApiError::Forbidden
        )
    }
}

/// 下载错误
#[derive(Debug, Error)]
pub enum DownloadError {
    /// 非 200 响应
    #[error("下载失败: HTTP {status}")]
    Http { status: u16 },

    /// 网络错误
    #[error("下载请求失败: {0}")]
    Network(#[from] reqwest::Error),

    /// 写文件失败
    #[error("写入文件失败: {0}")]
    Io(#[from] std::io::Error),

    /// 超时未收到数据
    #[error("下载超时: {secs:.1} 秒内未收到数据")]
    Stalled { secs: f64 },

    /// 下载地址无效
    #[error("无效的下载地址: {0}")]
    InvalidUrl(String),

    /// 目标路径无效
    #[error("无效的目标路径: {0:?}")]
    InvalidDestination(PathBuf),

    /// 重试耗尽
    #[error("已尝试 {attempts} 次仍然失败: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

/// 文件系统错误
#[derive(Debug, Error)]
pub enum FilesystemError {
    /// 所有候选目录都不可写
    #[error("没有可用的下载目录，已尝试: {tried:?}")]
    NoWritableDirectory { tried: Vec<PathBuf> },
}

/// 顶层错误
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failure_classification() {
        assert!(ApiError::SessionRequired.is_auth_failure());
        assert!(ApiError::SessionExpired.is_auth_failure());
        assert!(ApiError::Forbidden.is_auth_failure());
        assert!(!ApiError::Server {
            status: 500,
            body: String::new()
        }
        .is_auth_failure());
    }

    #[test]
    fn test_exhausted_message_carries_last_error() {
        let err = DownloadError::RetriesExhausted {
            attempts: 5,
            last_error: "下载失败: HTTP 503".to_string(),
        };
        assert!(err.to_string().contains("HTTP 503"));
        assert!(err.to_string().contains('5'));
    }
}
