// Kidsnote API 数据类型

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// 接口中的 id 可能是数字也可能是字符串，统一转成字符串
fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Num(i64),
        Str(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Num(n) => n.to_string(),
        RawId::Str(s) => s,
    })
}

/// 字段缺失或为 null 时都取默认值
fn de_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// 数据来源：报告（알림장）或相册（앨범）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    #[default]
    Report,
    Album,
}

impl EntryKind {
    /// 列表接口路径中的资源名
    pub fn resource(&self) -> &'static str {
        match self {
            EntryKind::Report => "reports",
            EntryKind::Album => "albums",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource())
    }
}

impl FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "report" | "reports" => Ok(EntryKind::Report),
            "2" | "album" | "albums" => Ok(EntryKind::Album),
            other => Err(format!("未知的数据类型: {}（可选 reports / albums）", other)),
        }
    }
}

/// 孩子信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Child {
    pub id: String,
    pub name: String,
    /// 列表中的序号（从 1 开始）
    pub ordinal_index: usize,
}

/// me/info 接口中的孩子
#[derive(Debug, Clone, Deserialize)]
pub struct ChildInfo {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default, deserialize_with = "de_null_default")]
    pub name: String,
}

/// me/info 响应
#[derive(Debug, Clone, Deserialize)]
pub struct MeInfo {
    #[serde(default)]
    pub children: Option<Vec<ChildInfo>>,
}

impl MeInfo {
    /// 按返回顺序生成带序号的孩子列表
    pub fn into_children(self) -> Vec<Child> {
        self.children
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, c)| Child {
                id: c.id,
                name: c.name,
                ordinal_index: i + 1,
            })
            .collect()
    }
}

/// 附件（图片或视频）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAsset {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    /// 原始文件地址
    #[serde(rename = "original")]
    pub original_url: String,
    /// 高清地址（视频）
    #[serde(rename = "high", default)]
    pub high_quality_url: Option<String>,
    /// 原始文件名，用于取扩展名
    #[serde(default, deserialize_with = "de_null_default")]
    pub original_file_name: String,
}

impl MediaAsset {
    /// 视频优先使用高清地址
    pub fn preferred_video_url(&self) -> &str {
        self.high_quality_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(self.original_url.as_str())
    }
}

/// 报告或相册记录
///
/// 两种来源字段基本一致，区别只在日期字段（`date_written` / `modified`）
/// 以及报告带有班级名。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    /// 报告的书写日期 YYYY-MM-DD
    #[serde(default)]
    pub date_written: Option<String>,
    /// 相册的修改时间（ISO 8601）
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default, deserialize_with = "de_null_default")]
    pub child_name: String,
    #[serde(default, deserialize_with = "de_null_default")]
    pub attached_images: Vec<MediaAsset>,
    #[serde(default)]
    pub attached_video: Option<MediaAsset>,
}

impl Entry {
    /// 按来源取日期字符串：报告用书写日期，相册取修改时间的日期部分
    pub fn date_for(&self, kind: EntryKind) -> Option<&str> {
        let raw = match kind {
            EntryKind::Report => self.date_written.as_deref(),
            EntryKind::Album => self
                .modified
                .as_deref()
                .map(|m| m.split('T').next().unwrap_or(m)),
        };
        raw.map(str::trim).filter(|d| !d.is_empty())
    }

    /// 文件名中使用的班级名（相册不带班级）
    pub fn class_for(&self, kind: EntryKind) -> Option<&str> {
        match kind {
            EntryKind::Report => self.class_name.as_deref().filter(|c| !c.is_empty()),
            EntryKind::Album => None,
        }
    }
}

/// 列表接口响应
#[derive(Debug, Clone, Deserialize)]
pub struct EntryPage {
    #[serde(default)]
    pub count: Option<u64>,
    /// 下一页地址，null 表示没有更多
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default, deserialize_with = "de_null_default")]
    pub results: Vec<Entry>,
}

impl EntryPage {
    pub fn has_more(&self) -> bool {
        self.next.as_deref().map_or(false, |n| !n.is_empty())
    }
}
