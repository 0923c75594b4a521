// 下载计划：日期过滤 + 按日期分组 + 生成文件名
//
// 纯函数，不做任何 IO，处理器按这里给出的顺序依次下载。

use crate::events::MediaKind;
use crate::kidsnote::{Entry, EntryKind};
use crate::processor::naming::{build_file_name, file_extension, format_date, UNKNOWN_DATE};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::str::FromStr;

/// 日期格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 下载内容
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentFilter {
    Images,
    Videos,
    #[default]
    All,
}

impl ContentFilter {
    pub fn includes_images(&self) -> bool {
        matches!(self, ContentFilter::Images | ContentFilter::All)
    }

    pub fn includes_videos(&self) -> bool {
        matches!(self, ContentFilter::Videos | ContentFilter::All)
    }
}

impl FromStr for ContentFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "image" | "images" => Ok(ContentFilter::Images),
            "2" | "video" | "videos" => Ok(ContentFilter::Videos),
            "3" | "all" => Ok(ContentFilter::All),
            other => Err(format!("未知的内容类型: {}（可选 images / videos / all）", other)),
        }
    }
}

/// 闭区间日期过滤，两端都可以不设
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// 不限日期
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// 解析 YYYY-MM-DD
    pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
        NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
            .map_err(|e| format!("无效的日期 {}（格式 YYYY-MM-DD）: {}", s, e))
    }

    /// 记录日期是否在范围内
    ///
    /// 缺失或无法解析的日期视为在范围内
    pub fn contains(&self, date: Option<&str>) -> bool {
        let Some(date) = date.and_then(|d| NaiveDate::parse_from_str(d.trim(), DATE_FORMAT).ok())
        else {
            return true;
        };

        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// 单个待下载文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub url: String,
    pub file_name: String,
    pub media_kind: MediaKind,
}

/// 同一日期下的所有记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateBucket {
    /// 原始日期字符串，缺失时为 `unknown_date`
    pub date: String,
    /// 该日期下的记录数
    pub entry_count: usize,
    /// 按记录顺序排列：每条记录先图片后视频
    pub targets: Vec<DownloadTarget>,
}

impl DateBucket {
    pub fn count_of(&self, kind: MediaKind) -> usize {
        self.targets.iter().filter(|t| t.media_kind == kind).count()
    }
}

/// 下载计划
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DownloadPlan {
    /// 过滤前的记录数
    pub entries_total: usize,
    /// 过滤后的记录数
    pub entries_in_range: usize,
    /// 按日期升序
    pub buckets: Vec<DateBucket>,
}

impl DownloadPlan {
    pub fn target_count(&self) -> usize {
        self.buckets.iter().map(|b| b.targets.len()).sum()
    }
}

/// 单条记录的下载目标
fn targets_for(entry: &Entry, kind: EntryKind, filter: ContentFilter) -> Vec<DownloadTarget> {
    let formatted_date = format_date(entry.date_for(kind));
    let class_name = entry.class_for(kind);

    let mut targets = Vec::new();

    if filter.includes_images() {
        for image in &entry.attached_images {
            targets.push(DownloadTarget {
                url: image.original_url.clone(),
                file_name: build_file_name(
                    &formatted_date,
                    class_name,
                    &entry.child_name,
                    &image.id,
                    file_extension(&image.original_file_name),
                ),
                media_kind: MediaKind::Image,
            });
        }
    }

    if filter.includes_videos() {
        if let Some(video) = &entry.attached_video {
            targets.push(DownloadTarget {
                url: video.preferred_video_url().to_string(),
                file_name: build_file_name(
                    &formatted_date,
                    class_name,
                    &entry.child_name,
                    &video.id,
                    file_extension(&video.original_file_name),
                ),
                media_kind: MediaKind::Video,
            });
        }
    }

    targets
}

/// 生成下载计划
pub fn plan(
    entries: &[Entry],
    filter: ContentFilter,
    kind: EntryKind,
    range: &DateRange,
) -> DownloadPlan {
    let mut grouped: BTreeMap<String, Vec<&Entry>> = BTreeMap::new();

    for entry in entries {
        let date = entry.date_for(kind);
        if !range.contains(date) {
            continue;
        }
        let key = date.unwrap_or(UNKNOWN_DATE).to_string();
        grouped.entry(key).or_default().push(entry);
    }

    let entries_in_range = grouped.values().map(Vec::len).sum();
    let buckets = grouped
        .into_iter()
        .map(|(date, entries)| DateBucket {
            entry_count: entries.len(),
            targets: entries
                .iter()
                .flat_map(|e| targets_for(e, kind, filter))
                .collect(),
            date,
        })
        .collect();

    DownloadPlan {
        entries_total: entries.len(),
        entries_in_range,
        buckets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn report(id: u32, date: Option<&str>, images: &[u32], video: bool) -> Entry {
        let images: Vec<String> = images
            .iter()
            .map(|i| {
                format!(
                    r#"{{"id": {i}, "original": "https://img/{i}.jpg", "original_file_name": "p{i}.jpg"}}"#
                )
            })
            .collect();
        let video = if video {
            format!(
                r#"{{"id": "v{id}", "original": "https://v/o{id}.mp4", "high": "https://v/h{id}.mp4", "original_file_name": "m.mp4"}}"#
            )
        } else {
            "null".to_string()
        };
        let date = date.map_or("null".to_string(), |d| format!("\"{d}\""));
        serde_json::from_str(&format!(
            r#"{{"id": {id}, "date_written": {date}, "class_name": "ClassA", "child_name": "Kim",
                "attached_images": [{}], "attached_video": {video}}}"#,
            images.join(",")
        ))
        .unwrap()
    }

    fn ymd(s: &str) -> Option<NaiveDate> {
        Some(DateRange::parse_date(s).unwrap())
    }

    #[test]
    fn test_content_filter_from_str() {
        assert_eq!("images".parse::<ContentFilter>().unwrap(), ContentFilter::Images);
        assert_eq!("2".parse::<ContentFilter>().unwrap(), ContentFilter::Videos);
        assert_eq!("ALL".parse::<ContentFilter>().unwrap(), ContentFilter::All);
        assert!("gif".parse::<ContentFilter>().is_err());
    }

    #[test]
    fn test_date_range_inclusive_and_fail_open() {
        let range = DateRange::new(ymd("2024-01-10"), ymd("2024-01-20"));
        assert!(range.contains(Some("2024-01-10")));
        assert!(range.contains(Some("2024-01-20")));
        assert!(!range.contains(Some("2024-01-09")));
        assert!(!range.contains(Some("2024-01-21")));
        assert!(range.contains(Some("not-a-date")));
        assert!(range.contains(None));
    }

    #[test]
    fn test_plan_groups_and_orders() {
        let entries = vec![
            report(1, Some("2024-02-01"), &[11], true),
            report(2, Some("2024-01-15"), &[21, 22], false),
            report(3, None, &[31], false),
            report(4, Some("2024-01-15"), &[], true),
        ];

        let plan = plan(&entries, ContentFilter::All, EntryKind::Report, &DateRange::unbounded());
        let dates: Vec<_> = plan.buckets.iter().map(|b| b.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-01-15", "2024-02-01", "unknown_date"]);

        let jan = &plan.buckets[0];
        assert_eq!(jan.entry_count, 2);
        let names: Vec<_> = jan.targets.iter().map(|t| t.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "2024년01년15일-ClassA-Kim-21.jpg",
                "2024년01년15일-ClassA-Kim-22.jpg",
                "2024년01년15일-ClassA-Kim-v4.mp4",
            ]
        );
        assert_eq!(jan.targets[2].url, "https://v/h4.mp4");
        assert_eq!(jan.count_of(MediaKind::Image), 2);

        assert_eq!(
            plan.buckets[2].targets[0].file_name,
            "unknown_date-ClassA-Kim-31.jpg"
        );
        assert_eq!(plan.target_count(), 6);
    }

    #[test]
    fn test_plan_content_filter() {
        let entries = vec![report(1, Some("2024-02-01"), &[11, 12], true)];

        let images = plan(&entries, ContentFilter::Images, EntryKind::Report, &DateRange::unbounded());
        assert!(images.buckets[0]
            .targets
            .iter()
            .all(|t| t.media_kind == MediaKind::Image));
        assert_eq!(images.target_count(), 2);

        let videos = plan(&entries, ContentFilter::Videos, EntryKind::Report, &DateRange::unbounded());
        assert_eq!(videos.target_count(), 1);
        assert_eq!(videos.buckets[0].targets[0].media_kind, MediaKind::Video);
    }

    #[test]
    fn test_album_uses_modified_day_without_class() {
        let entry: Entry = serde_json::from_str(
            r#"{"id": 9, "modified": "2024-03-02T10:00:00+09:00", "class_name": "ClassA",
                "child_name": "Lee",
                "attached_images": [{"id": 5, "original": "https://img/5.png", "original_file_name": "x.png"}]}"#,
        )
        .unwrap();
        let plan = plan(&[entry], ContentFilter::All, EntryKind::Album, &DateRange::unbounded());
        assert_eq!(plan.buckets[0].date, "2024-03-02");
        assert_eq!(plan.buckets[0].targets[0].file_name, "2024년03년02일-Lee-5.png");
    }

    fn date_strategy() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            (2023i32..2026, 1u32..13, 1u32..29)
                .prop_map(|(y, m, d)| Some(format!("{y:04}-{m:02}-{d:02}"))),
            Just(None),
            Just(Some("garbage".to_string())),
        ]
    }

    proptest! {
        #[test]
        fn prop_out_of_range_entries_excluded(
            dates in prop::collection::vec(date_strategy(), 0..30),
            start in prop::option::of((2023i32..2026, 1u32..13, 1u32..29)),
            end in prop::option::of((2023i32..2026, 1u32..13, 1u32..29)),
        ) {
            let to_date = |(y, m, d): (i32, u32, u32)| NaiveDate::from_ymd_opt(y, m, d).unwrap();
            let range = DateRange::new(start.map(to_date), end.map(to_date));
            let entries: Vec<Entry> = dates
                .iter()
                .enumerate()
                .map(|(i, d)| report(i as u32, d.as_deref(), &[i as u32], false))
                .collect();

            let plan = plan(&entries, ContentFilter::All, EntryKind::Report, &range);
            let planned: Vec<&str> = plan
                .buckets
                .iter()
                .flat_map(|b| b.targets.iter().map(|t| t.url.as_str()))
                .collect();

            for (i, d) in dates.iter().enumerate() {
                let url = format!("https://img/{i}.jpg");
                let parsed = d.as_deref().and_then(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).ok());
                let expected = match parsed {
                    None => true,
                    Some(date) => range.start.map_or(true, |s| date >= s)
                        && range.end.map_or(true, |e| date <= e),
                };
                prop_assert_eq!(planned.contains(&url.as_str()), expected);
            }
        }

        #[test]
        fn prop_buckets_in_ascending_order(
            dates in prop::collection::vec(date_strategy(), 0..30),
        ) {
            let entries: Vec<Entry> = dates
                .iter()
                .enumerate()
                .map(|(i, d)| report(i as u32, d.as_deref(), &[i as u32], false))
                .collect();

            let plan = plan(&entries, ContentFilter::All, EntryKind::Report, &DateRange::unbounded());
            prop_assert_eq!(plan.entries_in_range, entries.len());
            for pair in plan.buckets.windows(2) {
                prop_assert!(pair[0].date < pair[1].date);
            }
        }
    }
}
