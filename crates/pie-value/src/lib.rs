//! Values exchanged across the guest/host boundary.
//!
//! Guest requests arrive as self-describing encoded objects in guest memory;
//! host results travel back the same way. This crate holds the tagged
//! [`Value`] type and the codec, with no knowledge of memory or registers.

pub mod codec;
mod value;

pub use codec::{decode, encode, encode_into};
pub use value::{Value, ValueKind};

use thiserror::Error;

/// Object decoding errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of object data")]
    UnexpectedEof,
    #[error("invalid marker byte 0x{0:02x}")]
    InvalidMarker(u8),
    #[error("string is not valid UTF-8")]
    InvalidUtf8,
    #[error("map key is not a string")]
    NonStringKey,
    #[error("unknown extension type {0}")]
    UnknownExtension(i8),
    #[error("object nesting too deep")]
    TooDeep,
    #[error("integer does not fit in 64 bits")]
    IntegerOverflow,
    #[error("{0} trailing bytes after object")]
    TrailingBytes(usize),
}

pub type Result<T> = std::result::Result<T, DecodeError>;
