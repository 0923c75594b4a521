// Kidsnote 客户端实现
//
// 负责登录（CSRF + 表单提交）、会话保存与恢复、带会话的接口请求，
// 以及为下载器打开媒体文件流。

use crate::auth::constants::{
    COOKIE_SESSION, CREDENTIAL_REJECTION_MARKERS, CSRF_REJECTION_MARKERS, FORM_CSRF_FIELD,
    LANDING_PATH_MARKERS,
};
use crate::auth::{CsrfExtractor, Credentials, Session, SessionStore};
use crate::config::ApiConfig;
use crate::error::{ApiError, AuthError, DownloadError};
use crate::kidsnote::types::{Child, EntryKind, EntryPage, MeInfo};
use anyhow::{Context, Result};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, COOKIE, LOCATION, REFERER, SET_COOKIE};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// 错误响应体在日志/错误中保留的长度
const BODY_PREVIEW_LEN: usize = 200;

/// Kidsnote 客户端
///
/// 克隆后共享同一个会话状态。
#[derive(Clone)]
pub struct KidsnoteClient {
    /// HTTP 客户端（不带 Cookie 存储，会话 Cookie 手动附加）
    http: Client,
    /// 接口配置
    config: ApiConfig,
    /// 站点地址（去掉末尾的 /）
    base_url: Url,
    /// CSRF 提取策略
    csrf: Arc<CsrfExtractor>,
    /// 当前会话
    session: Arc<RwLock<Option<Session>>>,
    /// 会话持久化
    store: Arc<dyn SessionStore>,
}

impl KidsnoteClient {
    /// 创建客户端
    pub fn new(config: &ApiConfig, store: Arc<dyn SessionStore>) -> Result<Self> {
        let csrf = CsrfExtractor::with_default_strategies()
            .context("Failed to compile CSRF patterns")?;
        Self::with_csrf_extractor(config, store, csrf)
    }

    /// 使用自定义 CSRF 策略创建客户端
    pub fn with_csrf_extractor(
        config: &ApiConfig,
        store: Arc<dyn SessionStore>,
        csrf: CsrfExtractor,
    ) -> Result<Self> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .with_context(|| format!("无效的站点地址: {}", config.base_url))?;

        // 媒体文件可能很大，这里只限制连接时间，接口请求单独设置超时
        let http = Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.timeout())
            .build()
            .context("Failed to create HTTP client")?;

        info!("初始化 Kidsnote 客户端: {}", base_url);

        Ok(Self {
            http,
            config: config.clone(),
            base_url,
            csrf: Arc::new(csrf),
            session: Arc::new(RwLock::new(None)),
            store,
        })
    }

    fn base(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    fn login_url(&self) -> String {
        format!("{}{}", self.base(), self.config.login_path)
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}{}{}", self.base(), self.config.api_prefix, endpoint)
    }

    // =====================================================
    // 会话管理
    // =====================================================

    /// 当前会话
    pub async fn current_session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    /// 直接设置会话（不写入存储）
    pub async fn set_session(&self, session: Option<Session>) {
        *self.session.write().await = session;
    }

    /// 是否已持有会话
    pub async fn is_logged_in(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// 从存储恢复会话
    ///
    /// 只恢复到内存，是否仍然有效由调用方通过接口验证
    pub async fn restore_session(&self) -> Option<Session> {
        match self.store.load().await {
            Ok(Some(session)) => {
                info!("已恢复保存的会话: {}", session.masked_token());
                *self.session.write().await = Some(session.clone());
                Some(session)
            }
            Ok(None) => {
                debug!("没有保存的会话");
                None
            }
            Err(e) => {
                warn!("读取保存的会话失败: {:#}", e);
                None
            }
        }
    }

    /// 登出：清除内存与存储中的会话，可重复调用
    pub async fn logout(&self) -> Result<()> {
        *self.session.write().await = None;
        self.store.clear().await.context("清除会话失败")?;
        info!("已登出");
        Ok(())
    }

    async fn establish(&self, token: String, username: &str) -> Session {
        let session = Session::new(token, Some(username.to_string()));
        *self.session.write().await = Some(session.clone());

        // 保存失败不影响本次运行
        if let Err(e) = self.store.save(&session).await {
            warn!("保存会话失败，仅在本次运行中有效: {:#}", e);
        }

        info!("登录成功: {} ({})", username, session.masked_token());
        session
    }

    // =====================================================
    // 登录
    // =====================================================

    /// 用户名密码登录
    ///
    /// 1. GET 登录页，提取 CSRF 令牌
    /// 2. POST 表单（不跟随重定向）
    /// 3. 从 Set-Cookie 或重定向后的 Cookie 中取 sessionid
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        // 新的登录尝试前清掉旧会话
        *self.session.write().await = None;

        let login_url = self.login_url();
        let url = Url::parse(&login_url).map_err(|_| AuthError::NoSession { status: 0 })?;

        // 登录阶段需要 Cookie（csrftoken 等），单独建一个带 Jar 的客户端
        let jar = Arc::new(Jar::default());
        let login_client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .user_agent(self.config.user_agent.as_str())
            .timeout(self.config.timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        info!("正在获取登录页: {}", login_url);
        let page = login_client.get(url.clone()).send().await?;
        let page_status = page.status();
        let html = page.text().await?;
        debug!("登录页: status={}, len={}", page_status, html.len());

        let cookie_str = jar
            .cookies(&url)
            .and_then(|h| h.to_str().ok().map(str::to_string))
            .unwrap_or_default();

        let csrf_token = match self.csrf.extract(&html, &cookie_str) {
            Some((token, strategy)) => {
                debug!("CSRF 令牌提取成功 (策略: {})", strategy);
                token
            }
            None => {
                // 继续提交，由服务端决定是否拒绝
                warn!("未找到 CSRF 令牌，将以空令牌提交");
                String::new()
            }
        };

        info!("正在提交登录表单: {}", credentials.username);
        let resp = login_client
            .post(url.clone())
            .header(REFERER, login_url.as_str())
            .form(&[
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
                (FORM_CSRF_FIELD, csrf_token.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        let headers = resp.headers().clone();

        // 1. 响应直接下发 sessionid
        if let Some(token) = session_from_set_cookie(&headers) {
            return Ok(self.establish(token, &credentials.username).await);
        }

        // 2. 重定向到登录后页面
        if status == StatusCode::FOUND || status == StatusCode::MOVED_PERMANENTLY {
            let location = headers
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            debug!("登录响应重定向: {}", location);

            if is_landing(&location) {
                let from_jar = jar
                    .cookies(&url)
                    .and_then(|h| h.to_str().ok().and_then(cookie_value_owned));
                return match from_jar {
                    Some(token) => Ok(self.establish(token, &credentials.username).await),
                    None => {
                        warn!("已重定向到 {}，但没有拿到 sessionid", location);
                        Err(AuthError::Indeterminate { location })
                    }
                };
            }
        }

        // 3. 根据页面内容判断失败原因
        let body = resp.text().await.unwrap_or_default();
        let err = classify_login_failure(&body, status);
        error!("登录失败: {}", err);
        Err(err)
    }

    // =====================================================
    // 接口请求
    // =====================================================

    /// 带会话的 GET 请求，解析为指定类型
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let session = self
            .current_session()
            .await
            .ok_or(ApiError::SessionRequired)?;

        let url = self.api_url(endpoint);
        debug!("请求接口: {} {:?}", url, query);

        let resp = self
            .http
            .get(&url)
            .query(query)
            .header(COOKIE, session.cookie_header())
            .timeout(self.config.timeout())
            .send()
            .await?;

        let status = resp.status();
        match status {
            StatusCode::UNAUTHORIZED => return Err(ApiError::SessionExpired),
            StatusCode::FORBIDDEN => return Err(ApiError::Forbidden),
            s if s.is_client_error() || s.is_server_error() => {
                let body = resp.text().await.unwrap_or_default();
                let body: String = body.chars().take(BODY_PREVIEW_LEN).collect();
                warn!("接口 {} 返回 HTTP {}: {}", endpoint, s.as_u16(), body);
                return Err(ApiError::Server {
                    status: s.as_u16(),
                    body,
                });
            }
            _ => {}
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    /// 带会话的 GET 请求，返回原始 JSON
    pub async fn request(&self, endpoint: &str) -> Result<Value, ApiError> {
        self.request_json(endpoint, &[]).await
    }

    /// 当前账号下的孩子列表
    pub async fn children(&self) -> Result<Vec<Child>, ApiError> {
        let info: MeInfo = self.request_json("/me/info", &[]).await?;
        let children = info.into_children();
        info!("获取到 {} 个孩子", children.len());
        Ok(children)
    }

    /// 拉取一批报告或相册
    pub async fn list_entries(
        &self,
        child_id: &str,
        kind: EntryKind,
        page_size: u32,
    ) -> Result<EntryPage, ApiError> {
        let endpoint = format!("/children/{}/{}/", child_id, kind.resource());
        self.request_json(
            &endpoint,
            &[
                ("page_size", page_size.to_string()),
                ("tz", self.config.time_zone.clone()),
                ("child", child_id.to_string()),
            ],
        )
        .await
    }

    // =====================================================
    // 媒体下载
    // =====================================================

    /// 打开媒体文件流
    ///
    /// 会话 Cookie 只发给站点本身，不发给第三方存储域名
    pub async fn open_media(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::InvalidUrl(url.to_string()))?;

        let mut req = self.http.get(parsed.clone());
        if same_origin(&parsed, &self.base_url) {
            if let Some(session) = self.current_session().await {
                req = req.header(COOKIE, session.cookie_header());
            }
        }

        let resp = req.send().await?;
        if resp.status() != StatusCode::OK {
            return Err(DownloadError::Http {
                status: resp.status().as_u16(),
            });
        }
        Ok(resp)
    }
}

/// 从 Set-Cookie 头中取非空的 sessionid
fn session_from_set_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|raw| {
            let kv = raw.split(';').next()?.trim();
            let (name, value) = kv.split_once('=')?;
            (name.trim() == COOKIE_SESSION && !value.trim().is_empty())
                .then(|| value.trim().to_string())
        })
}

/// 从 "a=1; b=2" 形式的 Cookie 串中取 sessionid
fn cookie_value_owned(cookies: &str) -> Option<String> {
    cookies
        .split(';')
        .map(str::trim)
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, value)| *name == COOKIE_SESSION && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// 重定向目标是否是登录后的页面
fn is_landing(location: &str) -> bool {
    if location.is_empty() || location.contains("/login") {
        return false;
    }
    location == "/" || LANDING_PATH_MARKERS.iter().any(|m| location.contains(m))
}

/// 根据登录响应页面判断失败原因
fn classify_login_failure(body: &str, status: StatusCode) -> AuthError {
    if CREDENTIAL_REJECTION_MARKERS.iter().any(|m| body.contains(m))
        || (body.contains("로그인") && body.contains("실패"))
    {
        AuthError::InvalidCredentials
    } else if CSRF_REJECTION_MARKERS.iter().any(|m| body.contains(m)) {
        AuthError::CsrfRejected
    } else if body.contains(FORM_CSRF_FIELD) && body.contains("password") {
        AuthError::LoginFormReplayed
    } else {
        AuthError::NoSession {
            status: status.as_u16(),
        }
    }
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}
