pub mod permissions;
pub mod user;

pub use permissions::Permission;
pub use user::User;

/// Name of the cookie carrying the session token.
pub const TOKEN_COOKIE: &str = "token";
