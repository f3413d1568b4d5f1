//! # Namespaced Key Construction
//!
//! Purpose: Turn an ordered namespace into the single string key stored in
//! Redis, optionally hashing the trailing identifier.
//!
//! ## Design Principles
//! 1. **Pure Function**: No state and no I/O; the same input always yields the
//!    same key.
//! 2. **Scope Stays Readable**: Only the final component is ever hashed so
//!    scope prefixes remain greppable with `SCAN`/`KEYS`.
//! 3. **Fixed Convention**: Scope segments first, identifier last.
//!
//! ## Key Layout
//!
//! ```text
//! ["users", "profile", "alice@example.com"]
//!
//! hash = false: users:profile:alice@example.com
//! hash = true:  users:profile:<sha1("alice@example.com") as 40 hex chars>
//! ```

use sha1::{Digest, Sha1};

/// Separator placed between namespace components.
pub const KEY_DELIMITER: &str = ":";

/// Length of a hex-encoded SHA-1 digest.
pub const SHA1_HEX_LEN: usize = 40;

/// Computes the lowercase hex SHA-1 digest of `input`.
///
/// # Examples
/// ```rust
/// use stash_common::sha1_hex;
///
/// assert_eq!(sha1_hex(""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
/// ```
pub fn sha1_hex(input: &str) -> String {
    hex::encode(Sha1::digest(input.as_bytes()))
}

/// Builds a delimited key from `parts`.
///
/// The last element is the identifier; it is replaced by its SHA-1 digest when
/// `hash_identifier` is set. An empty namespace yields an empty key.
///
/// # Examples
/// ```rust
/// use stash_common::{build_key, sha1_hex};
///
/// assert_eq!(build_key(false, &["test", "key"]), "test:key");
/// assert_eq!(build_key(true, &["test", "key"]), format!("test:{}", sha1_hex("key")));
/// ```
pub fn build_key<S: AsRef<str>>(hash_identifier: bool, parts: &[S]) -> String {
    let Some((identifier, scope)) = parts.split_last() else {
        return String::new();
    };

    let identifier = if hash_identifier {
        sha1_hex(identifier.as_ref())
    } else {
        identifier.as_ref().to_owned()
    };

    let scope_len: usize = scope.iter().map(|part| part.as_ref().len() + 1).sum();
    let mut key = String::with_capacity(scope_len + identifier.len());
    for part in scope {
        key.push_str(part.as_ref());
        key.push_str(KEY_DELIMITER);
    }
    key.push_str(&identifier);
    key
}
