use crate::core::errors::Result;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

/// Forwards filesystem change events from the watched root into a tokio
/// channel. Dropping the struct stops the watch.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    pub fn new(root: impl AsRef<Path>, tx: mpsc::Sender<Event>) -> Result<Self> {
        let config = Config::default()
            .with_poll_interval(Duration::from_secs(2))
            .with_compare_contents(false);

        let mut watcher = RecommendedWatcher::new(
            move |result: std::result::Result<Event, notify::Error>| match result {
                Ok(event) => {
                    // notify runs this on its own thread; a blocking send is
                    // fine here. A closed receiver means shutdown.
                    if tx.blocking_send(event).is_err() {
                        warn!("watcher event receiver dropped");
                    }
                }
                Err(e) => warn!("file watcher error: {e}"),
            },
            config,
        )?;

        watcher.watch(root.as_ref(), RecursiveMode::Recursive)?;

        Ok(Self { _watcher: watcher })
    }
}
