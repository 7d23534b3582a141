//! inkpress: a markdown blog content engine
//!
//! Turns a directory of front-matter documents into a slug-keyed, queryable
//! in-memory collection and keeps it consistent while files are created,
//! edited, deleted or renamed underneath concurrent readers.
//!
//! The pieces:
//! - [`content`]: front-matter parsing, validation, the [`Post`] model
//! - [`store`]: the [`ContentStore`] with load/query/save/delete
//! - [`storage`]: the backend trait plus filesystem and in-memory impls
//! - [`watch`]: file-change events applied incrementally to the store
//! - [`config`]: typed site configuration (_config.yml)

pub mod config;
pub mod content;
pub mod error;
pub mod slug;
pub mod storage;
pub mod store;
pub mod watch;

pub use config::SiteConfig;
pub use content::{ContentKind, FrontMatter, Post, Status};
pub use error::{Error, Result};
pub use storage::{FsStorage, MemStorage, Storage};
pub use store::ContentStore;
