//! 列表拉取
//!
//! 列表接口不支持常规翻页，只能不断放大 `page_size` 重新请求：
//! 第 n 轮请求 `page_size = 基数 * n`，直到 `next` 为空或达到轮数上限。
//! 每一轮都返回从头开始的完整结果，所以只保留最后一轮的数据。

use crate::error::ApiError;
use crate::kidsnote::client::KidsnoteClient;
use crate::kidsnote::types::{Entry, EntryKind, EntryPage};
use async_trait::async_trait;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// 列表数据来源
#[async_trait]
pub trait EntrySource: Send + Sync {
    async fn fetch_entries(
        &self,
        child_id: &str,
        kind: EntryKind,
        page_size: u32,
    ) -> Result<EntryPage, ApiError>;
}

#[async_trait]
impl EntrySource for KidsnoteClient {
    async fn fetch_entries(
        &self,
        child_id: &str,
        kind: EntryKind,
        page_size: u32,
    ) -> Result<EntryPage, ApiError> {
        self.list_entries(child_id, kind, page_size).await
    }
}

/// 拉取数量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchLimit {
    /// 逐轮放大直到取完
    #[default]
    All,
    /// 只请求一次，固定 page_size
    Fixed(u32),
}

impl FromStr for FetchLimit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(FetchLimit::All);
        }
        match s.parse::<u32>() {
            Ok(n) if n > 0 => Ok(FetchLimit::Fixed(n)),
            _ => Err(format!("无效的拉取数量: {}（可选 all 或正整数）", s)),
        }
    }
}

/// 逐轮放大 page_size 的拉取器
#[derive(Debug, Clone, Copy)]
pub struct PaginationFetcher {
    page_size_unit: u32,
    max_rounds: u32,
}

impl Default for PaginationFetcher {
    fn default() -> Self {
        Self::new(9999, 10)
    }
}

impl PaginationFetcher {
    pub fn new(page_size_unit: u32, max_rounds: u32) -> Self {
        Self {
            page_size_unit: page_size_unit.max(1),
            max_rounds: max_rounds.max(1),
        }
    }

    /// 拉取某个孩子的全部记录
    pub async fn fetch_all(
        &self,
        source: &dyn EntrySource,
        child_id: &str,
        kind: EntryKind,
        limit: FetchLimit,
    ) -> Result<Vec<Entry>, ApiError> {
        if let FetchLimit::Fixed(page_size) = limit {
            let page = source.fetch_entries(child_id, kind, page_size).await?;
            info!("孩子 {} 的{}: 固定拉取 {} 条", child_id, kind, page.results.len());
            return Ok(page.results);
        }

        let mut round: u32 = 1;
        loop {
            let page_size = self.page_size_unit.saturating_mul(round);
            debug!("拉取 {} 第 {} 轮, page_size={}", kind, round, page_size);

            let page = source.fetch_entries(child_id, kind, page_size).await?;

            if !page.has_more() {
                info!(
                    "孩子 {} 的{}: 共 {} 条 ({} 轮)",
                    child_id,
                    kind,
                    page.results.len(),
                    round
                );
                return Ok(page.results);
            }

            if round >= self.max_rounds {
                warn!(
                    "孩子 {} 的{}: 已达到最大轮数 {}，仍有未取完的数据，使用最后一批 {} 条",
                    child_id,
                    kind,
                    self.max_rounds,
                    page.results.len()
                );
                return Ok(page.results);
            }

            round += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// 记录每次请求的 page_size，`more_until` 轮之前都返回 next
    struct MockSource {
        calls: Mutex<Vec<u32>>,
        more_until: Option<u32>,
        fail: bool,
    }

    impl MockSource {
        fn new(more_until: Option<u32>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                more_until,
                fail: false,
            }
        }
    }

    fn entry(id: u32) -> Entry {
        serde_json::from_str(&format!(r#"{{"id": {}, "child_name": "Kim"}}"#, id)).unwrap()
    }

    #[async_trait]
    impl EntrySource for MockSource {
        async fn fetch_entries(
            &self,
            _child_id: &str,
            _kind: EntryKind,
            page_size: u32,
        ) -> Result<EntryPage, ApiError> {
            if self.fail {
                return Err(ApiError::SessionExpired);
            }
            let round = {
                let mut calls = self.calls.lock();
                calls.push(page_size);
                calls.len() as u32
            };
            let more = self.more_until.map_or(true, |n| round < n);
            Ok(EntryPage {
                count: None,
                next: more.then(|| "next".to_string()),
                results: (0..round).map(entry).collect(),
            })
        }
    }

    #[tokio::test]
    async fn test_stops_at_max_rounds() {
        let source = MockSource::new(None);
        let entries = PaginationFetcher::default()
            .fetch_all(&source, "1", EntryKind::Report, FetchLimit::All)
            .await
            .unwrap();

        let calls = source.calls.lock().clone();
        assert_eq!(calls.len(), 10);
        assert_eq!(calls[0], 9999);
        assert_eq!(calls[9], 99990);
        // 只保留最后一轮
        assert_eq!(entries.len(), 10);
    }

    #[tokio::test]
    async fn test_stops_when_next_is_empty() {
        let source = MockSource::new(Some(3));
        let entries = PaginationFetcher::new(5, 10)
            .fetch_all(&source, "1", EntryKind::Album, FetchLimit::All)
            .await
            .unwrap();

        assert_eq!(*source.calls.lock(), vec![5, 10, 15]);
        assert_eq!(entries.len(), 3);
    }

    #[tokio::test]
    async fn test_fixed_makes_single_call() {
        let source = MockSource::new(None);
        let entries = PaginationFetcher::default()
            .fetch_all(&source, "1", EntryKind::Report, FetchLimit::Fixed(30))
            .await
            .unwrap();

        assert_eq!(*source.calls.lock(), vec![30]);
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_error_propagates() {
        let mut source = MockSource::new(None);
        source.fail = true;
        let err = PaginationFetcher::default()
            .fetch_all(&source, "1", EntryKind::Report, FetchLimit::All)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::SessionExpired));
    }

    #[test]
    fn test_fetch_limit_from_str() {
        assert_eq!("all".parse::<FetchLimit>().unwrap(), FetchLimit::All);
        assert_eq!("50".parse::<FetchLimit>().unwrap(), FetchLimit::Fixed(50));
        assert!("0".parse::<FetchLimit>().is_err());
        assert!("many".parse::<FetchLimit>().is_err());
    }
}
