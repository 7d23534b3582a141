//! Post model and front-matter validation

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};

use super::frontmatter::{parse_date, FrontMatter};
use crate::config::SiteConfig;
use crate::error::{Error, Result};

/// Whether a document is a blog post or a standalone page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentKind {
    #[default]
    Post,
    Page,
}

impl ContentKind {
    /// Case-insensitive parse; unrecognized text falls back to `Post`.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "page" => ContentKind::Page,
            _ => ContentKind::Post,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Post => "Post",
            ContentKind::Page => "Page",
        }
    }
}

/// Visibility status gating public listing and search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Draft,
    Published,
}

impl Status {
    /// Case-insensitive parse; unrecognized text falls back to `Draft`.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "published" => Status::Published,
            _ => Status::Draft,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Draft => "Draft",
            Status::Published => "Published",
        }
    }
}

/// A parsed blog post or page.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    /// Post title
    pub title: String,

    /// Author, defaulted from the site configuration when absent
    pub author: String,

    /// Post or standalone page
    pub kind: ContentKind,

    /// Publication date, stored in UTC
    pub date: DateTime<Utc>,

    /// Draft or published
    pub status: Status,

    /// Categories, order preserved from the document
    pub categories: Vec<String>,

    /// Tags, order preserved from the document
    pub tags: Vec<String>,

    /// Cover image
    pub image: Option<String>,

    /// External link for link posts
    pub link: Option<String>,

    /// URL-safe unique identifier
    pub slug: String,

    /// Short description for metadata
    pub description: Option<String>,

    /// Hand-written excerpt
    pub excerpt: Option<String>,

    /// Raw markdown body
    pub body: String,

    /// Backing document path, relative to the storage root
    pub file_name: String,

    /// Last modification time of the backing document
    pub last_modified: DateTime<Utc>,

    /// Custom front-matter fields not covered by the typed ones
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl Post {
    /// Validate a parsed front-matter header into a `Post`.
    ///
    /// `title`, `slug` and `date` are required; each missing field is its own
    /// reported error. A document that never set a date must fail rather than
    /// pick up a clock default, otherwise "unset" and "set to today" become
    /// indistinguishable.
    pub fn from_parts(
        fm: FrontMatter,
        body: &str,
        file_name: &str,
        last_modified: DateTime<Utc>,
        config: &SiteConfig,
    ) -> Result<Self> {
        let title = match fm.title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => return Err(Error::Validation("missing required field `title`".to_string())),
        };
        let slug = match fm.slug.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => return Err(Error::Validation("missing required field `slug`".to_string())),
        };
        let date = match fm.date.as_deref().map(str::trim) {
            Some(d) if !d.is_empty() => parse_date(d, config.tz())
                .ok_or_else(|| Error::Parse(format!("invalid date `{d}`")))?,
            _ => return Err(Error::Validation("missing required field `date`".to_string())),
        };

        let author = fm
            .author
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| config.author.clone());
        let kind = fm.kind.as_deref().map(ContentKind::parse).unwrap_or_default();
        let status = fm.status.as_deref().map(Status::parse).unwrap_or_default();

        Ok(Self {
            title,
            author,
            kind,
            date,
            status,
            categories: fm.categories,
            tags: fm.tags,
            image: fm.image,
            link: fm.link,
            slug,
            description: fm.description,
            excerpt: fm.excerpt,
            body: body.to_string(),
            file_name: file_name.to_string(),
            last_modified,
            extra: fm.extra,
        })
    }

    pub fn is_published(&self) -> bool {
        self.status == Status::Published
    }

    /// Serialize metadata + body back into front-matter document text.
    ///
    /// Dates are written as RFC 3339 so a re-parse reproduces the same UTC
    /// instant regardless of the site timezone.
    pub fn to_document(&self) -> Result<String> {
        let fm = FrontMatter {
            title: Some(self.title.clone()),
            author: Some(self.author.clone()),
            kind: Some(self.kind.as_str().to_string()),
            date: Some(self.date.to_rfc3339_opts(SecondsFormat::Secs, true)),
            slug: Some(self.slug.clone()),
            status: Some(self.status.as_str().to_string()),
            categories: self.categories.clone(),
            tags: self.tags.clone(),
            image: self.image.clone(),
            link: self.link.clone(),
            description: self.description.clone(),
            excerpt: self.excerpt.clone(),
            extra: self.extra.clone(),
        };
        Ok(format!("---\n{}---\n\n{}", fm.to_yaml()?, self.body))
    }
}
