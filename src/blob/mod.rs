//! Blob (image payload) loaders: the local cache and the origin server.

mod local;
mod remote;

pub use local::LocalBlobLoader;
pub use remote::RemoteBlobLoader;
