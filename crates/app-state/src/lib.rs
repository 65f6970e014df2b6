//! Session management for the finance app
//!
//! This crate owns the authenticated session: the observable
//! [`SessionState`], the [`LogoutCoordinator`] that tears it down, and the
//! [`AuthFlow`] that creates it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod logout;
pub mod session;

pub use auth::{AuthFlow, AuthFlowError};
pub use logout::{LogoutCoordinator, LogoutError, TeardownHook};
pub use session::{Session, SessionEvent, SessionState};
