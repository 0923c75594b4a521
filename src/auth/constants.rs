// 认证与接口常量

/// 默认站点地址
pub const DEFAULT_BASE_URL: &str = "https://www.kidsnote.com";

/// 登录页路径（GET 取 CSRF，POST 提交表单）
pub const LOGIN_PATH: &str = "/kr/login/";

/// 接口前缀
pub const API_PREFIX: &str = "/api/v1_2";

/// 会话 Cookie 名称
pub const COOKIE_SESSION: &str = "sessionid";

/// Django CSRF Cookie 名称
pub const COOKIE_CSRF: &str = "csrftoken";

/// 登录表单中的 CSRF 字段
pub const FORM_CSRF_FIELD: &str = "csrfmiddlewaretoken";

/// 浏览器 User-Agent（登录与接口请求保持一致）
pub const USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 10; SM-G975F) AppleWebKit/537.36";

/// 列表接口使用的时区
pub const DEFAULT_TIME_ZONE: &str = "Asia/Seoul";

/// 用户名或密码错误时页面中出现的标记
pub const CREDENTIAL_REJECTION_MARKERS: &[&str] = &["Invalid username", "Invalid password"];

/// CSRF 校验失败时页面中出现的标记
pub const CSRF_REJECTION_MARKERS: &[&str] = &["CSRF verification failed", "CSRF token"];

/// 登录后可能重定向到的落地页
pub const LANDING_PATH_MARKERS: &[&str] = &["/dashboard", "/kr/", "/index"];
