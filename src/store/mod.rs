//! Content store - the slug-keyed in-memory collection
//!
//! One `ContentStore` is constructed at startup and shared by handle
//! (`Arc<ContentStore>`) between request workers and the file watcher's
//! applier thread. Parsing and storage I/O happen outside the state lock;
//! only the map mutation itself is taken under it, so readers never wait on
//! a disk read.
//!
//! Mutating operations (save, delete, watcher upserts) additionally
//! serialize on a dedicated write mutex held across the storage I/O *and*
//! the cache update. Without it, a save racing a delete on the same slug
//! could re-insert a cache entry whose file was just removed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use crate::config::SiteConfig;
use crate::content::{parse_document, ContentKind, Post};
use crate::error::{Error, Result};
use crate::slug::slugify;
use crate::storage::Storage;

/// Map state guarded by the store's mutex.
#[derive(Default)]
struct State {
    /// slug -> post
    posts: HashMap<String, Post>,
    /// file name -> slug; a file owns exactly one slug at a time
    files: HashMap<String, String>,
    /// path -> error message for documents that failed to parse
    errors: HashMap<String, String>,
}

impl State {
    /// Insert or replace a post, keeping the file index consistent.
    ///
    /// Retires the slug previously owned by the same file (a title-driven
    /// rename must not leave the old entry behind) and detaches any other
    /// file that held this slug before.
    fn upsert(&mut self, post: Post) {
        if let Some(old_slug) = self.files.get(&post.file_name).cloned() {
            if old_slug != post.slug {
                self.posts.remove(&old_slug);
            }
        }
        if let Some(previous) = self.posts.insert(post.slug.clone(), post.clone()) {
            if previous.file_name != post.file_name {
                tracing::warn!(
                    "slug {:?} moved from {} to {}",
                    post.slug,
                    previous.file_name,
                    post.file_name
                );
                self.files.remove(&previous.file_name);
            }
        }
        self.errors.remove(&post.file_name);
        self.files.insert(post.file_name.clone(), post.slug);
    }

    /// Remove whatever entry a file backs, along with its recorded error.
    fn evict_file(&mut self, path: &str) {
        if let Some(slug) = self.files.remove(path) {
            self.posts.remove(&slug);
        }
        self.errors.remove(path);
    }
}

/// Slug-keyed in-memory collection of posts and pages.
pub struct ContentStore {
    storage: Arc<dyn Storage>,
    config: SiteConfig,
    state: Mutex<State>,
    /// Serializes whole mutating operations, I/O included.
    write_lock: Mutex<()>,
}

impl ContentStore {
    /// Create an empty store. Call [`load`](Self::load) to populate it.
    pub fn new(storage: Arc<dyn Storage>, config: SiteConfig) -> Self {
        Self {
            storage,
            config,
            state: Mutex::new(State::default()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Bulk load: enumerate all documents and parse each independently.
    ///
    /// A single parse or read failure is recorded against its path and never
    /// aborts the rest of the load. The new map replaces the old one in a
    /// single swap, so concurrent readers observe either the previous
    /// collection or the complete new one, never a partial rebuild.
    pub fn load(&self) -> Result<()> {
        let _write = self.write_guard();

        let paths = self.storage.list_files("*.md")?;
        let mut fresh = State::default();

        for path in paths {
            let text = match self.storage.read_file(&path) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Failed to read {}: {}", path, e);
                    fresh.errors.insert(path, e.to_string());
                    continue;
                }
            };
            let modified = self.storage.modified(&path).unwrap_or_else(Utc::now);
            match parse_document(&text, &path, modified, &self.config) {
                Ok(post) => fresh.upsert(post),
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}", path, e);
                    fresh.errors.insert(path, e.to_string());
                }
            }
        }

        tracing::info!(
            "Loaded {} documents ({} failed)",
            fresh.posts.len(),
            fresh.errors.len()
        );
        *self.state() = fresh;
        Ok(())
    }

    /// Re-run the bulk load, replacing the map and the error set wholesale.
    /// Safe to invoke while readers are active.
    pub fn reload(&self) -> Result<()> {
        self.load()
    }

    /// O(1) lookup by slug. Drafts are hidden unless `include_drafts`.
    pub fn get(&self, slug: &str, include_drafts: bool) -> Option<Post> {
        let state = self.state();
        state
            .posts
            .get(slug)
            .filter(|p| include_drafts || p.is_published())
            .cloned()
    }

    /// Paginated listing: filter by kind (and published status unless
    /// `include_drafts`), newest first, 1-based pages. A page past the end
    /// yields an empty result, never an error.
    pub fn list(
        &self,
        kind: ContentKind,
        include_drafts: bool,
        page: usize,
        page_size: usize,
    ) -> Vec<Post> {
        if page == 0 || page_size == 0 {
            return Vec::new();
        }
        // An offset past usize::MAX is also just a page beyond the end.
        let Some(offset) = (page - 1).checked_mul(page_size) else {
            return Vec::new();
        };
        let posts = self.filtered(|p| p.kind == kind && (include_drafts || p.is_published()));
        posts
            .into_iter()
            .skip(offset)
            .take(page_size)
            .collect()
    }

    /// Published posts with a matching category, case-insensitive, newest first.
    pub fn by_category(&self, category: &str) -> Vec<Post> {
        let needle = category.to_lowercase();
        self.filtered(|p| {
            p.is_published() && p.categories.iter().any(|c| c.to_lowercase() == needle)
        })
    }

    /// Published posts with a matching tag, case-insensitive, newest first.
    pub fn by_tag(&self, tag: &str) -> Vec<Post> {
        let needle = tag.to_lowercase();
        self.filtered(|p| p.is_published() && p.tags.iter().any(|t| t.to_lowercase() == needle))
    }

    /// Published posts by an author, case-insensitive, newest first.
    pub fn by_author(&self, author: &str) -> Vec<Post> {
        let needle = author.to_lowercase();
        self.filtered(|p| p.is_published() && p.author.to_lowercase() == needle)
    }

    /// Case-insensitive substring search across title, body, description,
    /// excerpt, tags and categories. Published only. An empty term returns
    /// an empty result, never the full set.
    pub fn search(&self, term: &str) -> Vec<Post> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.filtered(|p| {
            p.is_published()
                && (p.title.to_lowercase().contains(&needle)
                    || p.body.to_lowercase().contains(&needle)
                    || p.description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
                    || p.excerpt
                        .as_deref()
                        .is_some_and(|e| e.to_lowercase().contains(&needle))
                    || p.tags.iter().any(|t| t.to_lowercase().contains(&needle))
                    || p.categories
                        .iter()
                        .any(|c| c.to_lowercase().contains(&needle)))
        })
    }

    fn filtered<F: Fn(&Post) -> bool>(&self, keep: F) -> Vec<Post> {
        let mut posts: Vec<Post> = {
            let state = self.state();
            state.posts.values().filter(|p| keep(p)).cloned().collect()
        };
        // Newest first; slug breaks date ties so pagination is stable.
        posts.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.slug.cmp(&b.slug)));
        posts
    }

    /// Persist a post and make it the authoritative cache entry.
    ///
    /// The slug is the explicit one, or derived from the title when empty.
    /// A slug already owned by a different file is rejected. The file name
    /// is reused when editing so an edit never orphans the old document.
    /// After the write, the document is re-read and re-parsed as the value
    /// of record: a failure there is fatal to the call even though the write
    /// already happened, and the cache is left untouched until a reload.
    pub fn save(&self, post: Post) -> Result<Post> {
        let _write = self.write_guard();

        let mut post = post;
        if post.slug.trim().is_empty() {
            post.slug = slugify(&post.title);
        }
        if post.slug.is_empty() {
            return Err(Error::Validation(format!(
                "cannot derive a slug from title {:?}",
                post.title
            )));
        }
        if post.file_name.is_empty() {
            post.file_name = format!("{}.md", post.slug);
        }

        {
            let state = self.state();
            if let Some(owner) = state.posts.get(&post.slug) {
                if owner.file_name != post.file_name {
                    return Err(Error::Validation(format!(
                        "slug {:?} is already used by {}",
                        post.slug, owner.file_name
                    )));
                }
            }
        }

        let text = post.to_document()?;
        self.storage.write_file(&post.file_name, &text)?;

        // Re-parse what was actually persisted; this catches any drift
        // between the in-memory value and its serialized form.
        let modified = self.storage.modified(&post.file_name).unwrap_or_else(Utc::now);
        let written = self
            .storage
            .read_file(&post.file_name)
            .and_then(|t| parse_document(&t, &post.file_name, modified, &self.config))
            .map_err(|e| {
                Error::Consistency(format!(
                    "{} was written but no longer parses: {}",
                    post.file_name, e
                ))
            })?;

        self.state().upsert(written.clone());
        tracing::debug!("Saved {} as {:?}", written.file_name, written.slug);
        Ok(written)
    }

    /// Remove the backing document, then evict the cache entry.
    /// Returns `false` for an unknown slug.
    pub fn delete(&self, slug: &str) -> Result<bool> {
        let _write = self.write_guard();

        let file_name = match self.state().posts.get(slug) {
            Some(post) => post.file_name.clone(),
            None => return Ok(false),
        };

        match self.storage.delete_file(&file_name) {
            Ok(()) | Err(Error::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        self.state().evict_file(&file_name);
        tracing::debug!("Deleted {:?} ({})", slug, file_name);
        Ok(true)
    }

    /// Re-parse a single document and replace its cache entry. Used by the
    /// change notifier for create/modify events.
    ///
    /// A read failure is logged and skipped - the file may be mid-write and
    /// the next event will retry. A parse failure evicts the stale entry and
    /// records the error.
    pub fn upsert_path(&self, path: &str) {
        let _write = self.write_guard();

        let text = match self.storage.read_file(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path, e);
                return;
            }
        };
        let modified = self.storage.modified(path).unwrap_or_else(Utc::now);
        match parse_document(&text, path, modified, &self.config) {
            Ok(post) => {
                tracing::debug!("Updated {} as {:?}", path, post.slug);
                self.state().upsert(post);
            }
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", path, e);
                let mut state = self.state();
                if let Some(slug) = state.files.remove(path) {
                    state.posts.remove(&slug);
                }
                state.errors.insert(path.to_string(), e.to_string());
            }
        }
    }

    /// Evict whatever entry a document backs. Used by the change notifier
    /// for delete and rename events.
    pub fn remove_path(&self, path: &str) {
        let _write = self.write_guard();
        tracing::debug!("Evicting {}", path);
        self.state().evict_file(path);
    }

    /// Snapshot of per-document load failures (path -> message).
    pub fn errors(&self) -> HashMap<String, String> {
        self.state().errors.clone()
    }

    /// Number of cached posts and pages.
    pub fn len(&self) -> usize {
        self.state().posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().posts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Status;
    use crate::storage::MemStorage;
    use chrono::{TimeZone, Utc};

    fn doc(title: &str, slug: &str, date: &str, status: &str, body: &str) -> String {
        format!("---\ntitle: {title}\nslug: {slug}\ndate: {date}\nstatus: {status}\n---\n\n{body}")
    }

    fn store_with(files: &[(&str, String)]) -> ContentStore {
        let mut storage = MemStorage::new();
        for (path, text) in files {
            storage = storage.with_file(path, text);
        }
        let store = ContentStore::new(Arc::new(storage), SiteConfig::default());
        store.load().unwrap();
        store
    }

    fn sample_store() -> ContentStore {
        store_with(&[
            ("one.md", doc("One", "one", "2024-01-01", "Published", "first post")),
            ("two.md", doc("Two", "two", "2024-02-01", "Published", "second post")),
            ("three.md", doc("Three", "three", "2024-03-01", "Published", "third post")),
            ("secret.md", doc("Secret", "secret", "2024-04-01", "Draft", "hidden")),
        ])
    }

    #[test]
    fn test_bulk_load_isolates_parse_errors() {
        let store = store_with(&[
            ("good.md", doc("Good", "good", "2024-01-01", "Published", "ok")),
            ("bad.md", "---\ntitle: Bad\nslug: bad\n---\nno date".to_string()),
            ("worse.md", "no front matter at all".to_string()),
        ]);

        assert_eq!(store.len(), 1);
        let errors = store.errors();
        assert_eq!(errors.len(), 2);
        assert!(errors["bad.md"].contains("date"));
        assert!(errors["worse.md"].contains("no front matter"));
        assert!(store.get("good", false).is_some());
        assert!(store.get("bad", true).is_none());
    }

    #[test]
    fn test_get_hides_drafts() {
        let store = sample_store();
        assert!(store.get("secret", false).is_none());
        assert_eq!(store.get("secret", true).unwrap().status, Status::Draft);
        assert!(store.get("missing", true).is_none());
    }

    #[test]
    fn test_list_orders_and_paginates() {
        let store = sample_store();

        let page1 = store.list(ContentKind::Post, false, 1, 2);
        let slugs: Vec<_> = page1.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["three", "two"]);

        let page2 = store.list(ContentKind::Post, false, 2, 2);
        let slugs: Vec<_> = page2.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["one"]);

        // No page exceeds the page size and pages partition the full list
        assert!(store.list(ContentKind::Post, false, 3, 2).is_empty());
        assert!(store.list(ContentKind::Post, false, 99, 2).is_empty());
        assert!(store.list(ContentKind::Post, false, 0, 2).is_empty());

        // Drafts appear only when asked for
        assert_eq!(store.list(ContentKind::Post, true, 1, 10).len(), 4);
    }

    #[test]
    fn test_list_huge_page_number_is_empty() {
        let store = sample_store();
        // Offsets past usize::MAX must not wrap back onto early pages
        assert!(store.list(ContentKind::Post, false, usize::MAX, 10).is_empty());
        assert!(store
            .list(ContentKind::Post, false, usize::MAX, usize::MAX)
            .is_empty());
    }

    #[test]
    fn test_filters_are_case_insensitive_and_published_only() {
        let store = store_with(&[
            (
                "a.md",
                "---\ntitle: A\nslug: a\ndate: 2024-01-01\nstatus: Published\nauthor: Jane\ntags: [Rust]\ncategories: [Systems]\n---\nbody"
                    .to_string(),
            ),
            (
                "b.md",
                "---\ntitle: B\nslug: b\ndate: 2024-02-01\nstatus: Draft\nauthor: Jane\ntags: [rust]\ncategories: [systems]\n---\nbody"
                    .to_string(),
            ),
        ]);

        assert_eq!(store.by_tag("RUST").len(), 1);
        assert_eq!(store.by_category("systems").len(), 1);
        assert_eq!(store.by_author("JANE").len(), 1);
        assert_eq!(store.by_tag("golang").len(), 0);
    }

    #[test]
    fn test_search() {
        let store = sample_store();
        assert_eq!(store.search("third").len(), 1);
        assert_eq!(store.search("POST").len(), 3);
        // Drafts never surface in search
        assert_eq!(store.search("hidden").len(), 0);
        // Empty term is empty, not everything
        assert!(store.search("").is_empty());
        assert!(store.search("   ").is_empty());
    }

    #[test]
    fn test_save_generates_slug_and_file_name() {
        let store = store_with(&[]);
        let post = Post {
            title: "Rock & Roll".to_string(),
            author: String::new(),
            kind: ContentKind::Post,
            date: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            status: Status::Published,
            categories: vec![],
            tags: vec![],
            image: None,
            link: None,
            slug: String::new(),
            description: None,
            excerpt: None,
            body: "Turn it up.".to_string(),
            file_name: String::new(),
            last_modified: Utc::now(),
            extra: HashMap::new(),
        };

        let saved = store.save(post).unwrap();
        assert_eq!(saved.slug, "rock-and-roll");
        assert_eq!(saved.file_name, "rock-and-roll.md");

        let fetched = store.get("rock-and-roll", false).unwrap();
        assert_eq!(fetched.title, "Rock & Roll");
        assert_eq!(fetched.body, "Turn it up.");
    }

    #[test]
    fn test_save_reuses_file_name_and_retires_old_slug() {
        let store = sample_store();
        let mut post = store.get("one", false).unwrap();
        post.title = "One Renamed".to_string();
        post.slug = "one-renamed".to_string();

        let saved = store.save(post).unwrap();
        // Editing never creates an orphan under a new name
        assert_eq!(saved.file_name, "one.md");
        // The file maps to exactly one slug at a time
        assert!(store.get("one", true).is_none());
        assert!(store.get("one-renamed", false).is_some());
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_save_rejects_slug_owned_by_another_file() {
        let store = sample_store();
        let mut post = store.get("one", false).unwrap();
        post.slug = "two".to_string();

        let err = store.save(post).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("two"));
        // Nothing changed
        assert!(store.get("one", false).is_some());
        assert_eq!(store.get("two", false).unwrap().title, "Two");
    }

    #[test]
    fn test_save_clears_recorded_error() {
        let store = store_with(&[(
            "broken.md",
            "---\ntitle: Broken\nslug: broken\n---\nno date".to_string(),
        )]);
        assert_eq!(store.errors().len(), 1);

        let post = Post {
            title: "Broken".to_string(),
            author: "Jane".to_string(),
            kind: ContentKind::Post,
            date: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            status: Status::Published,
            categories: vec![],
            tags: vec![],
            image: None,
            link: None,
            slug: "broken".to_string(),
            description: None,
            excerpt: None,
            body: "fixed".to_string(),
            file_name: "broken.md".to_string(),
            last_modified: Utc::now(),
            extra: HashMap::new(),
        };

        store.save(post).unwrap();
        assert!(store.errors().is_empty());
        assert_eq!(store.get("broken", false).unwrap().body, "fixed");
    }

    #[test]
    fn test_delete() {
        let store = sample_store();
        assert!(store.delete("one").unwrap());
        assert!(store.get("one", true).is_none());
        assert_eq!(store.len(), 3);
        // Unknown slug is an absent result, not an error
        assert!(!store.delete("one").unwrap());
    }

    #[test]
    fn test_reload_replaces_wholesale() {
        let storage: Arc<dyn Storage> = Arc::new(
            MemStorage::new().with_file(
                "one.md",
                &doc("One", "one", "2024-01-01", "Published", "first"),
            ),
        );
        let store = ContentStore::new(Arc::clone(&storage), SiteConfig::default());
        store.load().unwrap();
        assert_eq!(store.len(), 1);

        storage.delete_file("one.md").unwrap();
        storage
            .write_file("two.md", &doc("Two", "two", "2024-02-01", "Published", "second"))
            .unwrap();

        store.reload().unwrap();
        assert!(store.get("one", true).is_none());
        assert!(store.get("two", false).is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_upsert_path_and_remove_path() {
        let storage: Arc<dyn Storage> = Arc::new(MemStorage::new());
        let store = ContentStore::new(Arc::clone(&storage), SiteConfig::default());
        store.load().unwrap();

        storage
            .write_file("note.md", &doc("Note", "note", "2024-01-01", "Published", "body"))
            .unwrap();
        store.upsert_path("note.md");
        assert!(store.get("note", false).is_some());

        // Re-parse after an edit that changes the slug retires the old entry
        storage
            .write_file("note.md", &doc("Note", "note-v2", "2024-01-01", "Published", "body"))
            .unwrap();
        store.upsert_path("note.md");
        assert!(store.get("note", true).is_none());
        assert!(store.get("note-v2", false).is_some());

        // A file that turns invalid is evicted and recorded
        storage
            .write_file("note.md", "---\ntitle: Note\nslug: note-v2\n---\nlost its date")
            .unwrap();
        store.upsert_path("note.md");
        assert!(store.get("note-v2", true).is_none());
        assert!(store.errors()["note.md"].contains("date"));

        // A vanished file is skipped without killing anything
        store.upsert_path("ghost.md");

        store.remove_path("note.md");
        assert!(store.errors().is_empty());
        assert!(store.is_empty());
    }
}
