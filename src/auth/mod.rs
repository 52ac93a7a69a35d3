//! Authentication
//!
//! Handles:
//! - Password hashing
//! - Session management
//! - Authentication extractors and principal resolution

mod middleware;
pub mod password;
pub mod session;

pub use middleware::{MaybeUser, SESSION_COOKIE, resolve_write_principal};
pub use session::{Session, create_session_token, verify_session_token};
