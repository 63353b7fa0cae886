//! Server side of the Filer file-management application.
//!
//! Everything the browser front-end consumes lives under `/api`: filesystem
//! browsing and transfers, zip archiving with SSE progress, a background file
//! index with search, token authentication and configuration persistence.

pub mod auth;
pub mod config;
pub mod core;
pub mod fs;
pub mod index;
pub mod progress;
pub mod server;
pub mod store;

pub use server::run;
