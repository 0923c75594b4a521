// Kidsnote Downloader Library
// Kidsnote 报告/相册附件下载核心库

// 认证模块（CSRF 提取、会话存储）
pub mod auth;

// 配置管理模块
pub mod config;

// 🔥 错误类型
pub mod error;

// Kidsnote 接口模块
pub mod kidsnote;

// 下载引擎模块
pub mod downloader;

// 记录处理模块（过滤、分组、命名）
pub mod processor;

// 进度与日志事件
pub mod events;

// 下载流程编排
pub mod orchestrator;

// 日志系统
pub mod logging;

// 导出常用类型
pub use auth::{Credentials, FileSessionStore, MemorySessionStore, Session, SessionStore};
pub use config::AppConfig;
pub use downloader::{RetryPolicy, RetryingDownloader};
pub use error::{ApiError, AuthError, DownloadError, Error, FilesystemError};
pub use events::{EventSink, ProgressEvent, TracingEventSink};
pub use kidsnote::{Child, Entry, EntryKind, FetchLimit, KidsnoteClient, PaginationFetcher};
pub use orchestrator::{ChildSelection, DownloadOrchestrator, DownloadRequest, RunSummary};
pub use processor::{ContentFilter, DateRange, EntryProcessor, ProcessSummary};
