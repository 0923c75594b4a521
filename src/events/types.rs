//! 事件类型定义

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// 媒体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => f.write_str("图片"),
            MediaKind::Video => f.write_str("视频"),
        }
    }
}

/// 下载进度事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// 文件下载中
    Progress {
        media_kind: MediaKind,
        /// 当前日期分组内的序号（从 1 开始）
        current: usize,
        /// 当前日期分组内该类媒体总数
        total: usize,
        /// 0~100
        progress: f64,
        file_name: String,
    },
    /// 文件下载完成
    Completed {
        media_kind: MediaKind,
        file_name: String,
        path: String,
    },
    /// 重试耗尽，已跳过
    Failed {
        media_kind: MediaKind,
        file_name: String,
        error: String,
    },
}

impl ProgressEvent {
    pub fn file_name(&self) -> &str {
        match self {
            ProgressEvent::Progress { file_name, .. }
            | ProgressEvent::Completed { file_name, .. }
            | ProgressEvent::Failed { file_name, .. } => file_name,
        }
    }
}

/// 进度与日志回调
///
/// 在处理过程中同步调用，由调用方决定如何展示
pub trait EventSink: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);

    fn on_log(&self, message: &str);
}

/// 输出到 tracing 的回调（命令行默认使用）
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn on_progress(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Progress {
                media_kind,
                current,
                total,
                progress,
                file_name,
            } => debug!(
                "{} {}/{} {:.1}%: {}",
                media_kind, current, total, progress, file_name
            ),
            ProgressEvent::Completed {
                media_kind, path, ..
            } => info!("✓ {}已保存: {}", media_kind, path),
            ProgressEvent::Failed {
                media_kind,
                file_name,
                error,
            } => tracing::warn!("✗ {}下载失败: {} - {}", media_kind, file_name, error),
        }
    }

    fn on_log(&self, message: &str) {
        info!("{}", message);
    }
}

/// 收集所有事件（嵌入使用或测试）
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<ProgressEvent>>,
    logs: Mutex<Vec<String>>,
}

impl CollectingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    pub fn logs(&self) -> Vec<String> {
        self.logs.lock().clone()
    }

    /// 已完成文件名，按完成顺序
    pub fn completed_files(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Completed { .. }))
            .map(|e| e.file_name().to_string())
            .collect()
    }
}

impl EventSink for CollectingEventSink {
    fn on_progress(&self, event: ProgressEvent) {
        self.events.lock().push(event);
    }

    fn on_log(&self, message: &str) {
        self.logs.lock().push(message.to_string());
    }
}
