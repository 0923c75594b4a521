// 记录处理模块
//
// 过滤、分组后按日期顺序逐个下载附件

pub mod naming;
pub mod plan;

pub use naming::{build_file_name, file_extension, format_date, UNKNOWN_DATE};
pub use plan::{plan, ContentFilter, DateBucket, DateRange, DownloadPlan, DownloadTarget};

use crate::downloader::{RetryingDownloader, Sleeper};
use crate::events::{EventSink, MediaKind, ProgressEvent, ProgressThrottler};
use crate::kidsnote::{Entry, EntryKind};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// 处理结果统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessSummary {
    pub entries_total: usize,
    pub entries_in_range: usize,
    pub images_downloaded: usize,
    pub videos_downloaded: usize,
    pub failed: usize,
    /// 已处理的日期，升序
    pub dates: Vec<String>,
}

impl ProcessSummary {
    pub fn downloaded(&self) -> usize {
        self.images_downloaded + self.videos_downloaded
    }

    /// 合并另一个孩子的统计
    pub fn merge(&mut self, other: &ProcessSummary) {
        self.entries_total += other.entries_total;
        self.entries_in_range += other.entries_in_range;
        self.images_downloaded += other.images_downloaded;
        self.videos_downloaded += other.videos_downloaded;
        self.failed += other.failed;
        self.dates.extend(other.dates.iter().cloned());
    }
}

/// 记录处理器
#[derive(Clone)]
pub struct EntryProcessor {
    downloader: RetryingDownloader,
    sink: Arc<dyn EventSink>,
    sleeper: Arc<dyn Sleeper>,
    /// 相邻两张图片之间的间隔
    item_interval: Duration,
}

impl EntryProcessor {
    pub fn new(
        downloader: RetryingDownloader,
        sink: Arc<dyn EventSink>,
        sleeper: Arc<dyn Sleeper>,
        item_interval: Duration,
    ) -> Self {
        Self {
            downloader,
            sink,
            sleeper,
            item_interval,
        }
    }

    fn log(&self, message: String) {
        self.sink.on_log(&message);
    }

    /// 处理一批记录，下载到 `out_dir`
    ///
    /// 单个文件失败只记录并跳过，不中断整批
    pub async fn process(
        &self,
        entries: &[Entry],
        filter: ContentFilter,
        kind: EntryKind,
        range: &DateRange,
        out_dir: &Path,
    ) -> ProcessSummary {
        let plan = plan(entries, filter, kind, range);

        let mut summary = ProcessSummary {
            entries_total: plan.entries_total,
            entries_in_range: plan.entries_in_range,
            ..Default::default()
        };

        self.log(format!(
            "共 {} 条记录，日期范围内 {} 条，待下载 {} 个文件",
            plan.entries_total,
            plan.entries_in_range,
            plan.target_count()
        ));

        for bucket in &plan.buckets {
            self.process_bucket(bucket, out_dir, &mut summary).await;
            summary.dates.push(bucket.date.clone());
        }

        if !summary.dates.is_empty() {
            self.log(format!("已处理日期: {}", summary.dates.join(", ")));
        }
        info!(
            "处理完成: 图片 {}，视频 {}，失败 {}",
            summary.images_downloaded, summary.videos_downloaded, summary.failed
        );

        summary
    }

    async fn process_bucket(&self, bucket: &DateBucket, out_dir: &Path, summary: &mut ProcessSummary) {
        let image_total = bucket.count_of(MediaKind::Image);
        let video_total = bucket.count_of(MediaKind::Video);
        self.log(format!(
            "📅 {}: {} 条记录，图片 {} 个，视频 {} 个",
            bucket.date, bucket.entry_count, image_total, video_total
        ));

        let mut image_index = 0;
        let mut video_index = 0;
        let mut done = 0;

        for target in &bucket.targets {
            let (current, total) = match target.media_kind {
                MediaKind::Image => {
                    image_index += 1;
                    (image_index, image_total)
                }
                MediaKind::Video => {
                    video_index += 1;
                    (video_index, video_total)
                }
            };

            if self.download_target(target, current, total, out_dir).await {
                done += 1;
                match target.media_kind {
                    MediaKind::Image => summary.images_downloaded += 1,
                    MediaKind::Video => summary.videos_downloaded += 1,
                }
            } else {
                summary.failed += 1;
            }

            if target.media_kind == MediaKind::Image && !self.item_interval.is_zero() {
                self.sleeper.sleep(self.item_interval).await;
            }
        }

        self.log(format!(
            "✓ {} 完成: {}/{} 个文件",
            bucket.date,
            done,
            bucket.targets.len()
        ));
    }

    /// 下载单个文件，返回是否成功
    async fn download_target(
        &self,
        target: &DownloadTarget,
        current: usize,
        total: usize,
        out_dir: &Path,
    ) -> bool {
        let dest = out_dir.join(&target.file_name);
        debug!("下载 {} {}/{}: {}", target.media_kind, current, total, target.file_name);

        let throttler = ProgressThrottler::default();
        let sink = &self.sink;
        let on_progress = |percent: f64| {
            if throttler.should_emit(percent) {
                sink.on_progress(ProgressEvent::Progress {
                    media_kind: target.media_kind,
                    current,
                    total,
                    progress: percent,
                    file_name: target.file_name.clone(),
                });
            }
        };

        match self.downloader.download(&target.url, &dest, on_progress).await {
            Ok(path) => {
                self.sink.on_progress(ProgressEvent::Completed {
                    media_kind: target.media_kind,
                    file_name: target.file_name.clone(),
                    path: path.display().to_string(),
                });
                true
            }
            Err(e) => {
                self.sink.on_progress(ProgressEvent::Failed {
                    media_kind: target.media_kind,
                    file_name: target.file_name.clone(),
                    error: e.to_string(),
                });
                self.log(format!("✗ 跳过 {}: {}", target.file_name, e));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemorySessionStore;
    use crate::config::ApiConfig;
    use crate::downloader::RetryPolicy;
    use crate::events::CollectingEventSink;
    use crate::kidsnote::KidsnoteClient;
    use parking_lot::Mutex;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    #[async_trait::async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().push(duration);
        }
    }

    fn entry(server: &MockServer, id: u32, date: &str, images: &[&str], video: Option<&str>) -> Entry {
        let images: Vec<String> = images
            .iter()
            .map(|name| {
                format!(
                    r#"{{"id": "{name}", "original": "{}/m/{name}.jpg", "original_file_name": "{name}.jpg"}}"#,
                    server.uri()
                )
            })
            .collect();
        let video = video.map_or("null".to_string(), |name| {
            format!(
                r#"{{"id": "{name}", "original": "{}/m/{name}.mp4", "original_file_name": "{name}.mp4"}}"#,
                server.uri()
            )
        });
        serde_json::from_str(&format!(
            r#"{{"id": {id}, "date_written": "{date}", "class_name": "ClassA", "child_name": "Kim",
                "attached_images": [{}], "attached_video": {video}}}"#,
            images.join(",")
        ))
        .unwrap()
    }

    fn processor(
        server: &MockServer,
        policy: RetryPolicy,
    ) -> (EntryProcessor, Arc<CollectingEventSink>, Arc<RecordingSleeper>) {
        let client = KidsnoteClient::new(
            &ApiConfig::with_base_url(server.uri()),
            Arc::new(MemorySessionStore::new()),
        )
        .unwrap();
        let sleeper = Arc::new(RecordingSleeper::default());
        let downloader = RetryingDownloader::with_sleeper(Arc::new(client), policy, sleeper.clone());
        let sink = Arc::new(CollectingEventSink::new());
        let processor = EntryProcessor::new(
            downloader,
            sink.clone(),
            sleeper.clone(),
            Duration::from_millis(100),
        );
        (processor, sink, sleeper)
    }

    async fn serve_ok(server: &MockServer) {
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_downloads_in_date_order_with_pacing() {
        let server = MockServer::start().await;
        serve_ok(&server).await;

        let entries = vec![
            entry(&server, 2, "2024-02-01", &["b1"], Some("v2")),
            entry(&server, 1, "2024-01-15", &["a1", "a2"], None),
        ];

        let dir = TempDir::new().unwrap();
        let (processor, sink, sleeper) = processor(&server, RetryPolicy::default());
        let summary = processor
            .process(
                &entries,
                ContentFilter::All,
                EntryKind::Report,
                &DateRange::unbounded(),
                dir.path(),
            )
            .await;

        assert_eq!(summary.images_downloaded, 3);
        assert_eq!(summary.videos_downloaded, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.dates, vec!["2024-01-15", "2024-02-01"]);

        assert_eq!(
            sink.completed_files(),
            vec![
                "2024년01년15일-ClassA-Kim-a1.jpg",
                "2024년01년15일-ClassA-Kim-a2.jpg",
                "2024년02년01일-ClassA-Kim-b1.jpg",
                "2024년02년01일-ClassA-Kim-v2.mp4",
            ]
        );
        assert!(dir.path().join("2024년02년01일-ClassA-Kim-v2.mp4").exists());

        // 每张图片之后暂停一次，视频之后不暂停
        assert_eq!(*sleeper.slept.lock(), vec![Duration::from_millis(100); 3]);
    }

    #[tokio::test]
    async fn test_failed_file_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/m/bad.jpg"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        serve_ok(&server).await;

        let entries = vec![entry(&server, 1, "2024-01-15", &["bad", "good"], None)];

        let dir = TempDir::new().unwrap();
        let (processor, sink, _) =
            processor(&server, RetryPolicy::new(2, Duration::from_secs(5)));
        let summary = processor
            .process(
                &entries,
                ContentFilter::Images,
                EntryKind::Report,
                &DateRange::unbounded(),
                dir.path(),
            )
            .await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.images_downloaded, 1);
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, ProgressEvent::Failed { file_name, .. } if file_name.contains("bad"))));
        assert!(sink.logs().iter().any(|l| l.contains("跳过")));
    }

    #[tokio::test]
    async fn test_date_filter_applied() {
        let server = MockServer::start().await;
        serve_ok(&server).await;

        let entries = vec![
            entry(&server, 1, "2024-01-01", &["old"], None),
            entry(&server, 2, "2024-03-01", &["new"], None),
        ];
        let range = DateRange::new(Some(DateRange::parse_date("2024-02-01").unwrap()), None);

        let dir = TempDir::new().unwrap();
        let (processor, sink, _) = processor(&server, RetryPolicy::default());
        let summary = processor
            .process(&entries, ContentFilter::All, EntryKind::Report, &range, dir.path())
            .await;

        assert_eq!(summary.entries_total, 2);
        assert_eq!(summary.entries_in_range, 1);
        assert_eq!(sink.completed_files(), vec!["2024년03년01일-ClassA-Kim-new.jpg"]);
    }

    #[test]
    fn test_summary_merge() {
        let mut total = ProcessSummary::default();
        total.merge(&ProcessSummary {
            images_downloaded: 2,
            failed: 1,
            dates: vec!["2024-01-01".to_string()],
            ..Default::default()
        });
        total.merge(&ProcessSummary {
            videos_downloaded: 1,
            ..Default::default()
        });
        assert_eq!(total.downloaded(), 3);
        assert_eq!(total.failed, 1);
        assert_eq!(total.dates.len(), 1);
    }
}
