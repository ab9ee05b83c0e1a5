//! Review fetching from the store's cursor-paginated review-list endpoint.
//!
//! - [`ReviewFetcher`] walks the pages for one app with a bounded retry budget
//! - [`FetchReport`] carries the collected reviews and why the walk stopped

pub mod engine;
mod schema;

pub use engine::{FetchOptions, FetchReport, PAGE_SIZE, ReviewFetcher, StopReason};
