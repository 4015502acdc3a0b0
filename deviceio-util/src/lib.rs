//! Shared plumbing for the deviceio crates: the HTTP client wrapper, the
//! cancellation signal used by background tasks and identity types.

pub mod http;
pub mod interrupt;
pub mod types;
