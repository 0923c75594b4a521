//! 事件模块
//!
//! 处理过程中向调用方推送的进度与日志事件
//! - `types.rs`: 事件类型与 `EventSink` 回调接口
//! - `throttle.rs`: 进度事件节流，避免每个数据块都推送一次

mod throttle;
mod types;

pub use throttle::*;
pub use types::*;
