//! # Notelingo
//!
//! 短文本笔记服务：笔记的增删改查、读穿透缓存，以及在请求路径之外执行的异步翻译任务。
//!
//! ## 模块组织
//!
//! - `model` - 笔记实体、载荷与序列化快照
//! - `repository` - 笔记仓库（内存 / redb）
//! - `cache` - 带 TTL 的笔记快照缓存
//! - `jobs` - 翻译任务状态机与任务队列
//! - `translator` - 外部翻译函数接口与 HTTP 实现
//! - `worker` - 翻译工作者与工作池
//! - `service` - 面向请求的笔记服务
//! - `config` / `env` - 配置文件与环境变量
//! - `app` - 组件装配
//! - `web` - HTTP 接口（可选）

pub mod app;
pub mod cache;
pub mod config;
pub mod env;
pub mod error;
pub mod jobs;
#[cfg(feature = "web")]
pub mod logging;
pub mod model;
pub mod repository;
pub mod service;
pub mod translator;
#[cfg(feature = "web")]
pub mod web;
pub mod worker;

pub use app::Application;
pub use config::AppConfig;
pub use error::{NoteError, NoteResult};
pub use model::{NewNote, Note, NoteChanges, NoteId, NoteSnapshot};
pub use service::NoteService;
