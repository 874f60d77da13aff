//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout, body limit)
//!     → handlers.rs (decode body, derive wallet, acquire session, run operation)
//!     → response.rs (ServiceResult → status code, Retry-After, JSON)
//!     → Send to client
//! ```

pub mod handlers;
pub mod response;
pub mod server;

pub use server::{AppState, HttpServer};
