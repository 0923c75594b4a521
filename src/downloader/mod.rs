// 下载模块

pub mod engine;
pub mod retry;

pub use engine::RetryingDownloader;
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
