//! Content module - front matter, post model, markdown rendering

mod frontmatter;
pub mod markdown;
mod post;

pub use frontmatter::FrontMatter;
pub use post::{ContentKind, Post, Status};

use chrono::{DateTime, Utc};

use crate::config::SiteConfig;
use crate::error::Result;

/// Parse a full document (front matter + body) into a validated [`Post`].
pub fn parse_document(
    text: &str,
    file_name: &str,
    last_modified: DateTime<Utc>,
    config: &SiteConfig,
) -> Result<Post> {
    let (fm, body) = FrontMatter::parse(text)?;
    Post::from_parts(fm, body, file_name, last_modified, config)
}
