//! Request correlation: tags, tag-sets and the requests bound to them.

pub mod requests;
pub mod tags;

pub use requests::{Request, RequestTracker};
pub use tags::{TAG_COUNT, TagSpace};
