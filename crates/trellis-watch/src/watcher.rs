//! `notify` backend adapter.
//!
//! Translates OS notifications into [`ChangeEvent`]s on the synchronizer's
//! channel. Renames become removal-plus-creation so the state machine never
//! needs a special case.

use std::path::Path;

use notify::event::{Event, EventKind, ModifyKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::{ChangeEvent, WatchResult};

/// A live filesystem watch. Dropping it stops the watch.
pub struct FsWatcher {
    _watcher: RecommendedWatcher,
}

impl FsWatcher {
    /// Watch `root` recursively, forwarding events into `tx`.
    pub fn start(root: &Path, tx: mpsc::UnboundedSender<ChangeEvent>) -> WatchResult<Self> {
        let mut watcher =
            notify::recommended_watcher(move |result: Result<Event, notify::Error>| {
                match result {
                    Ok(event) => {
                        for change in translate(&event) {
                            trace!(?change, "forwarding filesystem event");
                            if tx.send(change).is_err() {
                                // Receiver gone; the watch is winding down.
                                return;
                            }
                        }
                    }
                    Err(e) => warn!("watch backend error: {e}"),
                }
            })?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        debug!(root = %root.display(), "filesystem watch started");
        Ok(Self { _watcher: watcher })
    }
}

/// Map one backend event to zero or more change events.
fn translate(event: &Event) -> Vec<ChangeEvent> {
    match &event.kind {
        EventKind::Create(_) => event.paths.iter().map(ChangeEvent::created).collect(),
        EventKind::Remove(_) => event.paths.iter().map(ChangeEvent::removed).collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => event.paths.iter().map(ChangeEvent::removed).collect(),
            RenameMode::To => event.paths.iter().map(ChangeEvent::created).collect(),
            // Both sides in one event: old path first, new path second.
            RenameMode::Both if event.paths.len() == 2 => vec![
                ChangeEvent::removed(&event.paths[0]),
                ChangeEvent::created(&event.paths[1]),
            ],
            _ => event.paths.iter().map(ChangeEvent::modified).collect(),
        },
        EventKind::Modify(_) => event.paths.iter().map(ChangeEvent::modified).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChangeKind;
    use std::path::PathBuf;

    fn event(kind: EventKind, paths: Vec<&str>) -> Event {
        Event {
            kind,
            paths: paths.into_iter().map(PathBuf::from).collect(),
            attrs: Default::default(),
        }
    }

    #[test]
    fn creates_and_removes_map_directly() {
        let created = translate(&event(
            EventKind::Create(notify::event::CreateKind::File),
            vec!["/v/a.md"],
        ));
        assert_eq!(created, vec![ChangeEvent::created("/v/a.md")]);

        let removed = translate(&event(
            EventKind::Remove(notify::event::RemoveKind::File),
            vec!["/v/a.md"],
        ));
        assert_eq!(removed[0].kind, ChangeKind::Removed);
    }

    #[test]
    fn rename_becomes_remove_plus_create() {
        let changes = translate(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            vec!["/v/old.md", "/v/new.md"],
        ));
        assert_eq!(
            changes,
            vec![
                ChangeEvent::removed("/v/old.md"),
                ChangeEvent::created("/v/new.md"),
            ]
        );
    }

    #[tokio::test]
    async fn real_filesystem_events_reach_the_channel() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _watch = FsWatcher::start(dir.path(), tx).unwrap();

        tokio::fs::write(dir.path().join("note.md"), "# hi").await.unwrap();

        let received = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .expect("no event within timeout")
            .expect("channel closed");
        assert!(received.path.ends_with("note.md"));
    }
}
