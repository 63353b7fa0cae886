use axum::response::sse::Event;
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};

pub type ProgressSender = mpsc::Sender<Event>;

/// Named SSE channels. A client first opens the progress stream, which
/// registers the id here; the operation that follows looks the sender up and
/// feeds it events.
#[derive(Default)]
pub struct TrackerMap {
    inner: RwLock<HashMap<String, ProgressSender>>,
}

impl TrackerMap {
    /// Registers `id` and returns the receiving half for the SSE response.
    /// Re-registering an id replaces the previous channel.
    pub async fn register(&self, id: impl Into<String>) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(100);
        self.inner.write().await.insert(id.into(), tx);
        rx
    }

    pub async fn sender(&self, id: &str) -> Option<ProgressSender> {
        self.inner.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) {
        self.inner.write().await.remove(id);
    }
}

/// The two families of tracked operations: uploads report byte counts,
/// archive jobs report percentages.
#[derive(Default)]
pub struct ProgressTrackers {
    pub uploads: TrackerMap,
    pub archives: TrackerMap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_lookup_then_remove() {
        let map = TrackerMap::default();
        let mut rx = map.register("job-1").await;

        let sender = map.sender("job-1").await.expect("sender registered");
        sender.send(Event::default().data("hello")).await.unwrap();
        assert!(rx.recv().await.is_some());

        map.remove("job-1").await;
        assert!(map.sender("job-1").await.is_none());
    }

    #[tokio::test]
    async fn unknown_id_has_no_sender() {
        let map = TrackerMap::default();
        assert!(map.sender("nope").await.is_none());
    }

    #[tokio::test]
    async fn re_registering_replaces_the_channel() {
        let map = TrackerMap::default();
        let mut first = map.register("job").await;
        let mut second = map.register("job").await;

        let sender = map.sender("job").await.unwrap();
        sender.send(Event::default().data("x")).await.unwrap();

        assert!(second.recv().await.is_some());
        // The first receiver's channel was dropped on replacement.
        assert!(first.recv().await.is_none());
    }
}
