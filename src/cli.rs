// 命令行参数

use chrono::NaiveDate;
use clap::Parser;
use kidsnote_downloader::config::DEFAULT_CONFIG_PATH;
use kidsnote_downloader::{ChildSelection, ContentFilter, DateRange, EntryKind, FetchLimit};
use std::path::PathBuf;

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    DateRange::parse_date(s)
}

#[derive(Parser, Debug)]
#[command(name = "kidsnote-downloader")]
#[command(about = "下载 Kidsnote 报告和相册中的图片与视频", long_about = None)]
#[command(version)]
pub struct Cli {
    /// 配置文件路径
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// 登录用户名（已保存的会话有效时可省略）
    #[arg(short, long, env = "KIDSNOTE_USERNAME")]
    pub username: Option<String>,

    /// 登录密码
    #[arg(short, long, env = "KIDSNOTE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// 数据来源：reports / albums
    #[arg(short, long, default_value = "reports")]
    pub kind: EntryKind,

    /// 下载内容：images / videos / all
    #[arg(short, long, default_value = "all")]
    pub content: ContentFilter,

    /// 孩子：all、序号列表（1,3）或 id:123,456
    #[arg(long, default_value = "all")]
    pub children: ChildSelection,

    /// 开始日期（含），YYYY-MM-DD
    #[arg(long, value_parser = parse_date)]
    pub start: Option<NaiveDate>,

    /// 结束日期（含），YYYY-MM-DD
    #[arg(long, value_parser = parse_date)]
    pub end: Option<NaiveDate>,

    /// 拉取数量：all 或固定条数
    #[arg(long, default_value = "all")]
    pub page_size: FetchLimit,

    /// 下载目录（覆盖配置文件）
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 只列出孩子，不下载
    #[arg(long)]
    pub list_children: bool,

    /// 清除保存的会话后退出
    #[arg(long)]
    pub logout: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["kidsnote-downloader"]);
        assert_eq!(cli.kind, EntryKind::Report);
        assert_eq!(cli.content, ContentFilter::All);
        assert_eq!(cli.children, ChildSelection::All);
        assert_eq!(cli.page_size, FetchLimit::All);
        assert!(cli.start.is_none());
    }

    #[test]
    fn test_full_arguments() {
        let cli = Cli::parse_from([
            "kidsnote-downloader",
            "--kind",
            "albums",
            "--content",
            "videos",
            "--children",
            "1,2",
            "--start",
            "2024-01-01",
            "--page-size",
            "50",
            "-o",
            "/tmp/out",
        ]);
        assert_eq!(cli.kind, EntryKind::Album);
        assert_eq!(cli.content, ContentFilter::Videos);
        assert_eq!(cli.children, ChildSelection::Indices(vec![1, 2]));
        assert_eq!(cli.start, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(cli.page_size, FetchLimit::Fixed(50));
        assert_eq!(cli.output, Some(PathBuf::from("/tmp/out")));
    }

    #[test]
    fn test_invalid_date_rejected() {
        assert!(Cli::try_parse_from(["kidsnote-downloader", "--start", "2024/01/01"]).is_err());
    }
}
