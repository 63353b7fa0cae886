pub mod internal;
pub mod settings;

pub use internal::InternalState;
pub use settings::{Settings, SharedSettings};
