// stash-common - Key construction and value marshaling for redistash
//
// Nothing in this crate touches the network; the client crate builds on it.

pub mod error;
pub mod key;
pub mod value;

// Re-export for convenience
pub use error::*;
pub use key::*;
pub use value::*;
