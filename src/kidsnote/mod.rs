// Kidsnote 接口模块

pub mod client;
pub mod pagination;
pub mod types;

pub use client::KidsnoteClient;
pub use pagination::{EntrySource, FetchLimit, PaginationFetcher};
pub use types::{Child, Entry, EntryKind, EntryPage, MediaAsset};
