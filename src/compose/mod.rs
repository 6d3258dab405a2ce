//! Generic loader compositions, shared by the feed and blob pipelines.

mod caching;
mod fallback;

pub use caching::CachingLoader;
pub use fallback::FallbackLoader;
