//! # Value Marshaling
//!
//! Purpose: Convert caller values into the byte payloads stored in Redis and
//! decode structured payloads on the way back.
//!
//! ## Design Principles
//! 1. **Closed Variant Set**: Every payload is Text, Bytes, or Structured.
//! 2. **Static Dispatch**: The variant is inferred from the Rust type through
//!    the `Marshal` trait; no runtime type inspection.
//! 3. **Pass-Through First**: Text and bytes are stored exactly as given and
//!    borrowed where possible. Only structured values go through JSON.

use std::borrow::Cow;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ValueError, ValueResult};

/// Shape of a payload before it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// UTF-8 text, stored as its raw bytes.
    Text,
    /// Arbitrary bytes, stored unchanged.
    Bytes,
    /// Structured data, stored as JSON text.
    Structured,
}

/// Conversion of a value into a storable byte payload.
pub trait Marshal {
    /// Which of the payload variants this value produces.
    fn kind(&self) -> PayloadKind;

    /// Encodes the value. Text and byte values borrow their storage.
    fn marshal(&self) -> ValueResult<Cow<'_, [u8]>>;
}

/// Wrapper selecting JSON encoding for any `Serialize` type.
///
/// ```rust
/// use stash_common::{Json, Marshal, PayloadKind};
///
/// #[derive(serde::Serialize)]
/// struct Point { x: i32 }
///
/// let value = Json(Point { x: 2 });
/// assert_eq!(value.kind(), PayloadKind::Structured);
/// assert_eq!(&*value.marshal().unwrap(), br#"{"x":2}"#);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl Marshal for str {
    fn kind(&self) -> PayloadKind {
        PayloadKind::Text
    }

    fn marshal(&self) -> ValueResult<Cow<'_, [u8]>> {
        Ok(Cow::Borrowed(self.as_bytes()))
    }
}

impl Marshal for String {
    fn kind(&self) -> PayloadKind {
        PayloadKind::Text
    }

    fn marshal(&self) -> ValueResult<Cow<'_, [u8]>> {
        Ok(Cow::Borrowed(self.as_bytes()))
    }
}

impl Marshal for [u8] {
    fn kind(&self) -> PayloadKind {
        PayloadKind::Bytes
    }

    fn marshal(&self) -> ValueResult<Cow<'_, [u8]>> {
        Ok(Cow::Borrowed(self))
    }
}

impl<const N: usize> Marshal for [u8; N] {
    fn kind(&self) -> PayloadKind {
        PayloadKind::Bytes
    }

    fn marshal(&self) -> ValueResult<Cow<'_, [u8]>> {
        Ok(Cow::Borrowed(self.as_slice()))
    }
}

impl Marshal for Vec<u8> {
    fn kind(&self) -> PayloadKind {
        PayloadKind::Bytes
    }

    fn marshal(&self) -> ValueResult<Cow<'_, [u8]>> {
        Ok(Cow::Borrowed(self.as_slice()))
    }
}

impl Marshal for Bytes {
    fn kind(&self) -> PayloadKind {
        PayloadKind::Bytes
    }

    fn marshal(&self) -> ValueResult<Cow<'_, [u8]>> {
        Ok(Cow::Borrowed(self.as_ref()))
    }
}

impl<T: Serialize> Marshal for Json<T> {
    fn kind(&self) -> PayloadKind {
        PayloadKind::Structured
    }

    fn marshal(&self) -> ValueResult<Cow<'_, [u8]>> {
        serde_json::to_vec(&self.0)
            .map(Cow::Owned)
            .map_err(ValueError::Serialize)
    }
}

impl Marshal for serde_json::Value {
    fn kind(&self) -> PayloadKind {
        PayloadKind::Structured
    }

    fn marshal(&self) -> ValueResult<Cow<'_, [u8]>> {
        serde_json::to_vec(self)
            .map(Cow::Owned)
            .map_err(ValueError::Serialize)
    }
}

impl<T: Marshal + ?Sized> Marshal for &T {
    fn kind(&self) -> PayloadKind {
        (**self).kind()
    }

    fn marshal(&self) -> ValueResult<Cow<'_, [u8]>> {
        (**self).marshal()
    }
}

/// Decodes a JSON payload previously stored as a structured value.
pub fn from_json<T: DeserializeOwned>(payload: &[u8]) -> ValueResult<T> {
    serde_json::from_slice(payload).map_err(ValueError::Deserialize)
}
