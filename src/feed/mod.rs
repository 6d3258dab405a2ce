//! Feed loaders: the local cache and the origin server.

mod local;
pub mod mapper;
mod remote;

pub use local::{system_clock, Clock, LocalFeedLoader};
pub use remote::RemoteFeedLoader;
