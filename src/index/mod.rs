pub mod filter;
pub mod manager;
pub mod watcher;

pub use filter::IndexFilter;
pub use manager::{IndexManager, IndexStats, IndexedFile};
pub use watcher::FileWatcher;
