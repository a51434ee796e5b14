//! Shared OAuth discovery: Protected Resource Metadata (RFC 9728) pointing
//! at an Authorization Server, and that server's own metadata (RFC 8414).

mod as_metadata;
mod fetcher;
mod prm;

pub use as_metadata::AuthorizationServerMetadata;
pub use fetcher::DiscoveryFetcher;
pub use prm::{discovery_url, ProtectedResourceMetadata};
