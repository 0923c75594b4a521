// 文件命名规则
//
// {日期}-{班级}-{孩子名}-{附件id}{扩展名}，相册或没有班级时省略班级段。
// 已有的下载目录依赖这个格式去重，改动时需要保持兼容。

/// 没有日期时使用的占位
pub const UNKNOWN_DATE: &str = "unknown_date";

/// 日期格式化：`-` 全部替换为 `년`，末尾追加 `일`
///
/// `2024-01-15` → `2024년01년15일`
pub fn format_date(date: Option<&str>) -> String {
    match date.map(str::trim).filter(|d| !d.is_empty()) {
        Some(d) => format!("{}일", d.replace('-', "년")),
        None => UNKNOWN_DATE.to_string(),
    }
}

/// 原始文件名中最后一个 `.` 起的部分（含 `.`），没有则为空
pub fn file_extension(original_file_name: &str) -> &str {
    original_file_name
        .rfind('.')
        .map(|i| &original_file_name[i..])
        .unwrap_or("")
}

/// 路径分隔符会把文件写到子目录里
fn sanitize_segment(segment: &str) -> String {
    segment.replace(['/', '\\'], "_")
}

/// 生成文件名
pub fn build_file_name(
    formatted_date: &str,
    class_name: Option<&str>,
    child_name: &str,
    asset_id: &str,
    extension: &str,
) -> String {
    let mut parts = vec![sanitize_segment(formatted_date)];
    if let Some(class_name) = class_name.filter(|c| !c.is_empty()) {
        parts.push(sanitize_segment(class_name));
    }
    parts.push(sanitize_segment(child_name));
    parts.push(sanitize_segment(asset_id));

    format!("{}{}", parts.join("-"), sanitize_segment(extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(Some("2024-01-15")), "2024년01년15일");
        assert_eq!(format_date(None), "unknown_date");
        assert_eq!(format_date(Some("  ")), "unknown_date");
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("IMG_0001.JPG"), ".JPG");
        assert_eq!(file_extension("archive.tar.gz"), ".gz");
        assert_eq!(file_extension("noext"), "");
    }

    #[test]
    fn test_report_file_name() {
        let name = build_file_name("2024년01년15일", Some("ClassA"), "Kim", "42", ".jpg");
        assert_eq!(name, "2024년01년15일-ClassA-Kim-42.jpg");
    }

    #[test]
    fn test_album_file_name_omits_class() {
        let name = build_file_name("2024년01년15일", None, "Kim", "42", ".jpg");
        assert_eq!(name, "2024년01년15일-Kim-42.jpg");

        let name = build_file_name("2024년01년15일", Some(""), "Kim", "42", ".jpg");
        assert_eq!(name, "2024년01년15일-Kim-42.jpg");
    }

    #[test]
    fn test_separators_replaced() {
        let name = build_file_name("unknown_date", Some("A/B"), "Kim", "1", "");
        assert_eq!(name, "unknown_date-A_B-Kim-1");
    }
}
