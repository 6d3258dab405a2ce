//! Offline-first loading of a remote feed and the images it references.
//!
//! Remote and local loaders share the callback-based [`loader::Loader`]
//! capability and are combined with [`compose::FallbackLoader`] and
//! [`compose::CachingLoader`]. [`pipeline::Pipeline`] wires them from
//! [`config::Config`].

pub mod blob;
pub mod compose;
pub mod config;
pub mod error;
pub mod feed;
pub mod http;
pub mod loader;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod policy;
pub mod store;
pub mod task;

#[cfg(test)]
mod test_support;
