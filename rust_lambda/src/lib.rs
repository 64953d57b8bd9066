//! S3 upload classifier: fetches a newly created object, decides whether it
//! is a small text file, and reports whether its first line is JSON or text.

pub mod classify;
pub mod config;
pub mod error;
pub mod event;
pub mod event_handler;
pub mod fetch;

pub use config::Config;
pub use event_handler::{function_handler, Response};
pub use fetch::{FetchedObject, ObjectFetcher};
