// 单文件下载引擎（流式写入 + 失败重试）

use crate::downloader::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::error::DownloadError;
use crate::kidsnote::KidsnoteClient;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

/// 默认卡住判定时间
const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(30);

/// 带重试的下载器
///
/// 每次尝试先写入同目录下的临时文件，完整写完后再重命名为目标文件，
/// 失败时删除临时文件，目标路径上不会留下半截文件。
#[derive(Clone)]
pub struct RetryingDownloader {
    client: Arc<KidsnoteClient>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    /// 等待响应头或下一块数据的最长时间
    stall_timeout: Duration,
}

impl RetryingDownloader {
    pub fn new(client: Arc<KidsnoteClient>, policy: RetryPolicy) -> Self {
        Self::with_sleeper(client, policy, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(
        client: Arc<KidsnoteClient>,
        policy: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            client,
            policy,
            sleeper,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
        }
    }

    pub fn with_stall_timeout(mut self, stall_timeout: Duration) -> Self {
        self.stall_timeout = stall_timeout;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// 下载 `url` 到 `dest`
    ///
    /// `on_progress` 收到 0~100 的百分比，只在服务端给出 Content-Length 时回调
    pub async fn download<F>(
        &self,
        url: &str,
        dest: &Path,
        on_progress: F,
    ) -> Result<PathBuf, DownloadError>
    where
        F: Fn(f64) + Send + Sync,
    {
        let (dir, name) = match (dest.parent(), dest.file_name()) {
            (Some(dir), Some(name)) => (dir, name.to_string_lossy().to_string()),
            _ => return Err(DownloadError::InvalidDestination(dest.to_path_buf())),
        };

        let max_attempts = self.policy.max_attempts();
        let mut last_error: Option<DownloadError> = None;

        for attempt in 1..=max_attempts {
            match self.attempt_once(url, dir, &name, dest, &on_progress).await {
                Ok(bytes) => {
                    if attempt > 1 {
                        info!("重试成功（第 {} 次尝试）: {}", attempt, name);
                    }
                    debug!("下载完成: {:?} ({} bytes)", dest, bytes);
                    return Ok(dest.to_path_buf());
                }
                Err(e) => {
                    warn!(
                        "下载失败 ({}/{}): {} - {}",
                        attempt, max_attempts, name, e
                    );
                    last_error = Some(e);
                }
            }

            // 最后一次失败后不再等待
            if self.policy.should_retry(attempt) {
                debug!(
                    "{} 秒后重试: {}",
                    self.policy.backoff().as_secs_f64(),
                    name
                );
                self.sleeper.sleep(self.policy.backoff()).await;
            }
        }

        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "未知错误".to_string());
        error!(
            "下载失败，已达到最大重试次数 ({}): {} - {}",
            max_attempts, name, last_error
        );
        Err(DownloadError::RetriesExhausted {
            attempts: max_attempts,
            last_error,
        })
    }

    /// 单次尝试，返回写入的字节数
    async fn attempt_once<F>(
        &self,
        url: &str,
        dir: &Path,
        name: &str,
        dest: &Path,
        on_progress: &F,
    ) -> Result<u64, DownloadError>
    where
        F: Fn(f64) + Send + Sync,
    {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).await?;
        }

        let resp = tokio::time::timeout(self.stall_timeout, self.client.open_media(url))
            .await
            .map_err(|_| stalled(self.stall_timeout))??;
        let total = resp.content_length().filter(|&n| n > 0);

        let temp_path = dir.join(format!(".{}.{}.part", name, uuid::Uuid::new_v4()));
        let result =
            write_stream(resp, &temp_path, total, self.stall_timeout, on_progress).await;

        match result {
            Ok(bytes) => {
                if let Err(e) = fs::rename(&temp_path, dest).await {
                    let _ = fs::remove_file(&temp_path).await;
                    return Err(e.into());
                }
                Ok(bytes)
            }
            Err(e) => {
                let _ = fs::remove_file(&temp_path).await;
                Err(e)
            }
        }
    }
}

fn stalled(timeout: Duration) -> DownloadError {
    DownloadError::Stalled {
        secs: timeout.as_secs_f64(),
    }
}

async fn write_stream<F>(
    resp: reqwest::Response,
    temp_path: &Path,
    total: Option<u64>,
    stall_timeout: Duration,
    on_progress: &F,
) -> Result<u64, DownloadError>
where
    F: Fn(f64) + Send + Sync,
{
    let mut file = File::create(temp_path).await?;
    let mut stream = resp.bytes_stream();
    let mut written = 0u64;

    loop {
        let next = tokio::time::timeout(stall_timeout, stream.next())
            .await
            .map_err(|_| stalled(stall_timeout))?;
        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;

        if let Some(total) = total {
            let percent = (written as f64 / total as f64 * 100.0).min(100.0);
            on_progress(percent);
        }
    }

    file.flush().await?;
    Ok(written)
}
