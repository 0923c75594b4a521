// 认证模块

pub mod constants;
pub mod csrf;
pub mod session_store;
pub mod types;

pub use csrf::{CookieCsrfStrategy, CsrfExtractor, CsrfStrategy, RegexCsrfStrategy};
pub use session_store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use types::{Credentials, Session};
