//! CSRF 令牌提取
//!
//! 登录页的标记结构随时可能变化，这里把每种提取方式封装成一个策略，
//! 按优先级依次尝试，第一个非空结果胜出。新增匹配方式时只需追加策略，
//! 登录流程本身不用改动。

use crate::auth::constants::{COOKIE_CSRF, FORM_CSRF_FIELD};
use regex::Regex;

/// 单个提取策略
pub trait CsrfStrategy: Send + Sync {
    /// 策略名称（用于日志）
    fn name(&self) -> &str;

    /// 从登录页 HTML 和登录页下发的 Cookie 中提取令牌
    fn extract(&self, html: &str, cookies: &str) -> Option<String>;
}

/// 基于正则的策略，取第 1 个捕获组
pub struct RegexCsrfStrategy {
    name: String,
    pattern: Regex,
}

impl RegexCsrfStrategy {
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            pattern: Regex::new(pattern)?,
        })
    }
}

impl CsrfStrategy for RegexCsrfStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(&self, html: &str, _cookies: &str) -> Option<String> {
        self.pattern
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }
}

/// 从 Django 的 csrftoken Cookie 中取值
pub struct CookieCsrfStrategy;

impl CsrfStrategy for CookieCsrfStrategy {
    fn name(&self) -> &str {
        "csrftoken-cookie"
    }

    fn extract(&self, _html: &str, cookies: &str) -> Option<String> {
        let prefix = format!("{}=", COOKIE_CSRF);
        cookies
            .split(';')
            .map(str::trim)
            .find_map(|pair| pair.strip_prefix(prefix.as_str()))
            .map(|v| v.to_string())
    }
}

/// 有序的策略列表
pub struct CsrfExtractor {
    strategies: Vec<Box<dyn CsrfStrategy>>,
}

impl CsrfExtractor {
    /// 空列表
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// 默认策略：三种表单写法，最后退回 Cookie
    pub fn with_default_strategies() -> Result<Self, regex::Error> {
        let extractor = Self::empty()
            .with_strategy(RegexCsrfStrategy::new(
                "form-single-quote",
                &format!(r"name='{}' value='([^']*)'", FORM_CSRF_FIELD),
            )?)
            .with_strategy(RegexCsrfStrategy::new(
                "form-double-quote",
                &format!(r#"{}.*?value="([^"]*)""#, FORM_CSRF_FIELD),
            )?)
            .with_strategy(RegexCsrfStrategy::new(
                "script-csrf-token",
                r#"csrfToken.*?["']([^"']*)"#,
            )?)
            .with_strategy(CookieCsrfStrategy);
        Ok(extractor)
    }

    /// 追加策略（优先级最低）
    pub fn with_strategy(mut self, strategy: impl CsrfStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// 依次尝试，返回第一个非空令牌及命中的策略名
    pub fn extract(&self, html: &str, cookies: &str) -> Option<(String, &str)> {
        self.strategies.iter().find_map(|strategy| {
            strategy
                .extract(html, cookies)
                .filter(|token| !token.is_empty())
                .map(|token| (token, strategy.name()))
        })
    }
}
