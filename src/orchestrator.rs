// 下载流程编排
//
// 登录（或复用会话）→ 选择孩子 → 确定下载目录 → 逐个孩子拉取并下载

use crate::auth::{Credentials, SessionStore};
use crate::config::{AppConfig, DownloadConfig, PathValidator};
use crate::downloader::{RetryPolicy, RetryingDownloader, Sleeper, TokioSleeper};
use crate::error::{ApiError, Error};
use crate::events::EventSink;
use crate::kidsnote::{Child, EntryKind, FetchLimit, KidsnoteClient, PaginationFetcher};
use crate::processor::{ContentFilter, DateRange, EntryProcessor, ProcessSummary};
use anyhow::Context;
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 要处理的孩子
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChildSelection {
    #[default]
    All,
    /// 列表序号（从 1 开始）
    Indices(Vec<usize>),
    /// 孩子 id
    Ids(Vec<String>),
}

impl FromStr for ChildSelection {
    type Err = String;

    /// `all`、`1,3` 或 `id:123,456`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(ChildSelection::All);
        }

        if let Some(ids) = s.strip_prefix("id:") {
            let ids: Vec<String> = ids
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect();
            if ids.is_empty() {
                return Err("id: 后面需要至少一个孩子 id".to_string());
            }
            return Ok(ChildSelection::Ids(ids));
        }

        s.split(',')
            .map(|part| match part.trim().parse::<usize>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(format!("无效的孩子序号: {}", part.trim())),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(ChildSelection::Indices)
    }
}

impl ChildSelection {
    /// 按选择条件过滤，保持列表顺序；不存在的序号或 id 记录警告后忽略
    pub fn select(&self, children: &[Child]) -> Vec<Child> {
        match self {
            ChildSelection::All => children.to_vec(),
            ChildSelection::Indices(indices) => {
                for index in indices {
                    if !children.iter().any(|c| c.ordinal_index == *index) {
                        warn!("孩子序号 {} 不存在，已忽略", index);
                    }
                }
                children
                    .iter()
                    .filter(|c| indices.contains(&c.ordinal_index))
                    .cloned()
                    .collect()
            }
            ChildSelection::Ids(ids) => {
                for id in ids {
                    if !children.iter().any(|c| &c.id == id) {
                        warn!("孩子 id {} 不存在，已忽略", id);
                    }
                }
                children
                    .iter()
                    .filter(|c| ids.contains(&c.id))
                    .cloned()
                    .collect()
            }
        }
    }
}

/// 一次下载请求
#[derive(Debug, Clone, Default)]
pub struct DownloadRequest {
    /// 没有可用的已保存会话时用于登录
    pub credentials: Option<Credentials>,
    pub kind: EntryKind,
    pub content: ContentFilter,
    pub children: ChildSelection,
    pub range: DateRange,
    pub limit: FetchLimit,
}

/// 单个孩子的失败记录
#[derive(Debug, Clone, Serialize)]
pub struct ChildFailure {
    pub child_id: String,
    pub child_name: String,
    pub error: String,
}

/// 整次运行的统计
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub download_dir: PathBuf,
    pub children_processed: usize,
    pub failures: Vec<ChildFailure>,
    pub totals: ProcessSummary,
    /// 是否在中途被取消
    pub cancelled: bool,
}

/// 下载编排器
pub struct DownloadOrchestrator {
    client: Arc<KidsnoteClient>,
    fetcher: PaginationFetcher,
    processor: EntryProcessor,
    sink: Arc<dyn EventSink>,
    candidate_dirs: Vec<PathBuf>,
    cancel: CancellationToken,
}

impl DownloadOrchestrator {
    /// 按配置创建
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn SessionStore>,
        sink: Arc<dyn EventSink>,
    ) -> anyhow::Result<Self> {
        let client = KidsnoteClient::new(&config.api, store).context("创建客户端失败")?;
        Ok(Self::new(
            Arc::new(client),
            &config.download,
            sink,
            Arc::new(TokioSleeper),
        ))
    }

    pub fn new(
        client: Arc<KidsnoteClient>,
        download: &DownloadConfig,
        sink: Arc<dyn EventSink>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let policy = RetryPolicy::new(download.max_retries, download.retry_delay());
        let downloader =
            RetryingDownloader::with_sleeper(Arc::clone(&client), policy, Arc::clone(&sleeper))
                .with_stall_timeout(download.stall_timeout());
        let processor =
            EntryProcessor::new(downloader, Arc::clone(&sink), sleeper, download.item_interval());

        Self {
            client,
            fetcher: PaginationFetcher::new(download.page_size_unit, download.max_page_rounds),
            processor,
            sink,
            candidate_dirs: download.candidate_dirs(),
            cancel: CancellationToken::new(),
        }
    }

    /// 替换候选下载目录
    pub fn with_candidate_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.candidate_dirs = dirs;
        self
    }

    /// 使用外部的取消令牌
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn client(&self) -> &Arc<KidsnoteClient> {
        &self.client
    }

    fn log(&self, message: String) {
        self.sink.on_log(&message);
    }

    /// 登录或复用已保存的会话，返回孩子列表
    ///
    /// 已保存的会话先用 me/info 验证，失效时清除后再用凭证登录；
    /// 验证请求本身出错时，有凭证就直接登录，没有凭证则返回错误
    pub async fn sign_in(&self, credentials: Option<&Credentials>) -> Result<Vec<Child>, Error> {
        if self.client.restore_session().await.is_some() {
            match self.client.children().await {
                Ok(children) => {
                    self.log("已复用保存的会话".to_string());
                    return Ok(children);
                }
                Err(e) if e.is_auth_failure() => {
                    warn!("保存的会话已失效: {}", e);
                    if let Err(e) = self.client.logout().await {
                        warn!("清除失效会话失败: {:#}", e);
                    }
                }
                Err(e) if credentials.is_some() => {
                    warn!("验证保存的会话失败，改用凭证登录: {}", e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let credentials = credentials.ok_or(ApiError::SessionRequired)?;
        self.log(format!("正在登录: {}", credentials.username));
        self.client.login(credentials).await?;
        Ok(self.client.children().await?)
    }

    /// 确定下载目录
    pub fn resolve_download_dir(&self) -> Result<PathBuf, Error> {
        Ok(PathValidator::first_writable(&self.candidate_dirs)?)
    }

    /// 执行一次下载
    pub async fn run(&self, request: &DownloadRequest) -> Result<RunSummary, Error> {
        let children = self.sign_in(request.credentials.as_ref()).await?;
        let selected = request.children.select(&children);
        self.log(format!(
            "共 {} 个孩子，本次处理 {} 个",
            children.len(),
            selected.len()
        ));

        let download_dir = self.resolve_download_dir()?;
        self.log(format!("下载目录: {}", download_dir.display()));

        let mut summary = RunSummary {
            download_dir: download_dir.clone(),
            ..Default::default()
        };

        for child in &selected {
            if self.cancel.is_cancelled() {
                self.log("已取消，剩余的孩子不再处理".to_string());
                summary.cancelled = true;
                break;
            }

            self.log(format!(
                "👶 [{}] {} ({}): 拉取{}",
                child.ordinal_index, child.name, child.id, request.kind
            ));

            let entries = match self
                .fetcher
                .fetch_all(self.client.as_ref(), &child.id, request.kind, request.limit)
                .await
            {
                Ok(entries) => entries,
                Err(e) if e.is_auth_failure() => {
                    self.log(format!("认证失败，终止本次下载: {}", e));
                    return Err(e.into());
                }
                Err(e) => {
                    self.log(format!("✗ {} 拉取失败，跳过: {}", child.name, e));
                    summary.failures.push(ChildFailure {
                        child_id: child.id.clone(),
                        child_name: child.name.clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let child_summary = self
                .processor
                .process(
                    &entries,
                    request.content,
                    request.kind,
                    &request.range,
                    &download_dir,
                )
                .await;
            summary.totals.merge(&child_summary);
            summary.children_processed += 1;
        }

        info!(
            "下载结束: 处理 {} 个孩子，下载 {} 个文件，失败 {} 个",
            summary.children_processed,
            summary.totals.downloaded(),
            summary.totals.failed
        );
        Ok(summary)
    }
}
