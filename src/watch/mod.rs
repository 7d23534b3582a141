//! Change notifier - keeps the store in sync with the filesystem
//!
//! OS watch callbacks arrive on an arbitrary notify thread. Instead of
//! taking store locks from there, the callback translates each event into a
//! [`ChangeEvent`] and posts it onto a bounded channel; a single applier
//! thread drains the channel and performs every mutation. Transient
//! failures are logged and skipped - the next event retries - so the watch
//! loop never terminates on a file caught mid-write.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};

use crate::error::{Error, Result};
use crate::store::ContentStore;

/// Queue capacity between the notify callback and the applier thread.
const EVENT_QUEUE_SIZE: usize = 256;

/// A normalized file-change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A document was created or modified; re-parse and replace it.
    Upsert(PathBuf),
    /// A document was removed; evict its entry.
    Remove(PathBuf),
    /// A document moved; evict the old entry, then treat the new path as a
    /// create.
    Rename { from: PathBuf, to: PathBuf },
}

/// RAII handle for an active watch. Dropping it stops the watcher and joins
/// the applier thread.
pub struct WatchHandle {
    watcher: Option<RecommendedWatcher>,
    applier: Option<JoinHandle<()>>,
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        // Dropping the watcher drops the callback and with it the channel
        // sender, which lets the applier drain and exit.
        self.watcher.take();
        if let Some(handle) = self.applier.take() {
            let _ = handle.join();
        }
    }
}

/// Watch `root` recursively and apply markdown changes to the store.
pub fn spawn(store: Arc<ContentStore>, root: PathBuf) -> Result<WatchHandle> {
    let (tx, rx) = mpsc::sync_channel::<ChangeEvent>(EVENT_QUEUE_SIZE);

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        match res {
            Ok(event) => {
                for change in translate(&event) {
                    if send_event(&tx, change).is_err() {
                        return;
                    }
                }
            }
            Err(e) => tracing::warn!("Watch error: {}", e),
        }
    })
    .map_err(|e| Error::Io(std::io::Error::other(e)))?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;
    tracing::info!("Watching {:?}", root);

    let applier = thread::spawn(move || {
        for event in rx {
            apply(&store, &root, event);
        }
        tracing::debug!("Applier thread exiting");
    });

    Ok(WatchHandle {
        watcher: Some(watcher),
        applier: Some(applier),
    })
}

fn send_event(tx: &SyncSender<ChangeEvent>, change: ChangeEvent) -> Result<(), ()> {
    // Blocks when the queue is full; the watcher callback is the only
    // producer, so this simply applies backpressure to event bursts.
    tx.send(change).map_err(|_| ())
}

/// Translate a raw notify event into the changes the store cares about.
fn translate(event: &Event) -> Vec<ChangeEvent> {
    let paths: Vec<&PathBuf> = event.paths.iter().filter(|p| is_markdown(p)).collect();

    match &event.kind {
        EventKind::Create(CreateKind::File | CreateKind::Any) => paths
            .into_iter()
            .map(|p| ChangeEvent::Upsert(p.clone()))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            let from = &event.paths[0];
            let to = &event.paths[1];
            match (is_markdown(from), is_markdown(to)) {
                (true, true) => vec![ChangeEvent::Rename {
                    from: from.clone(),
                    to: to.clone(),
                }],
                (true, false) => vec![ChangeEvent::Remove(from.clone())],
                (false, true) => vec![ChangeEvent::Upsert(to.clone())],
                (false, false) => Vec::new(),
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => paths
            .into_iter()
            .map(|p| ChangeEvent::Remove(p.clone()))
            .collect(),
        // Name(To) and plain data modifications both mean "re-parse this path"
        EventKind::Modify(_) => paths
            .into_iter()
            .map(|p| ChangeEvent::Upsert(p.clone()))
            .collect(),
        EventKind::Remove(RemoveKind::File | RemoveKind::Any) => paths
            .into_iter()
            .map(|p| ChangeEvent::Remove(p.clone()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Apply one change to the store, with paths made relative to the watch root.
fn apply(store: &ContentStore, root: &Path, event: ChangeEvent) {
    match event {
        ChangeEvent::Upsert(path) => store.upsert_path(&relative(root, &path)),
        ChangeEvent::Remove(path) => store.remove_path(&relative(root, &path)),
        ChangeEvent::Rename { from, to } => {
            store.remove_path(&relative(root, &from));
            store.upsert_path(&relative(root, &to));
        }
    }
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "md" || e == "markdown")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upserts(changes: &[ChangeEvent]) -> Vec<&PathBuf> {
        changes
            .iter()
            .filter_map(|c| match c {
                ChangeEvent::Upsert(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_translate_create_and_modify() {
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/site/hello.md"));
        let changes = translate(&event);
        assert_eq!(upserts(&changes).len(), 1);

        let event = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/site/hello.md"));
        assert_eq!(upserts(&translate(&event)).len(), 1);
    }

    #[test]
    fn test_translate_remove() {
        let event = Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(PathBuf::from("/site/hello.md"));
        assert_eq!(
            translate(&event),
            vec![ChangeEvent::Remove(PathBuf::from("/site/hello.md"))]
        );
    }

    #[test]
    fn test_translate_rename() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/site/old.md"))
            .add_path(PathBuf::from("/site/new.md"));
        assert_eq!(
            translate(&event),
            vec![ChangeEvent::Rename {
                from: PathBuf::from("/site/old.md"),
                to: PathBuf::from("/site/new.md"),
            }]
        );
    }

    #[test]
    fn test_non_markdown_paths_are_ignored() {
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/site/style.css"));
        assert!(translate(&event).is_empty());

        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/site/post.md"))
            .add_path(PathBuf::from("/site/post.md.bak"));
        assert_eq!(
            translate(&event),
            vec![ChangeEvent::Remove(PathBuf::from("/site/post.md"))]
        );
    }

    #[test]
    fn test_relative_paths() {
        assert_eq!(
            relative(Path::new("/site"), Path::new("/site/sub/a.md")),
            "sub/a.md"
        );
        // Paths outside the root pass through untouched
        assert_eq!(relative(Path::new("/site"), Path::new("b.md")), "b.md");
    }
}
