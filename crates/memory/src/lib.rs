//! Conversation history backends for chatrelay.
//!
//! - [`SlidingWindowHistory`] keeps the most recent exchanges in process
//! - [`S3SessionStore`] persists a session's full history as one S3 object

pub mod s3;
pub mod window;

pub use s3::{ObjectStore, S3Client, S3SessionStore, session_key};
pub use window::{SlidingWindowHistory, trim_to_exchanges};
