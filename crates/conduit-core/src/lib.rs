//! The conduit error taxonomy: a typed [`ErrorKind`] mapped to both JSON-RPC
//! error codes and HTTP status codes, wrapped in a context-carrying [`Error`]
//! struct rather than a bare enum.

mod error;
mod kind;

pub use error::{Error, ErrorContext};
pub use kind::ErrorKind;

pub type Result<T> = std::result::Result<T, Error>;
