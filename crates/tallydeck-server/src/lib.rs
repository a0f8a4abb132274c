//! Tallydeck Server - HTTP boundary
//!
//! Exposes the device authentication endpoints (public, called by
//! firmware) and the user-facing pairing endpoints (authenticated at the
//! edge, identity forwarded in a header). Wire validation happens here;
//! business rules live in `tallydeck-auth`.

pub mod extract;
pub mod http;
pub mod state;

pub use extract::AuthenticatedUser;
pub use http::create_router;
pub use state::AppState;
