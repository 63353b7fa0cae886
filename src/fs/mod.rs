pub mod archive;
pub mod download;
pub mod entry;
pub mod ops;
pub mod path;

pub use entry::{Entry, Listing};
pub use path::ClientPath;
