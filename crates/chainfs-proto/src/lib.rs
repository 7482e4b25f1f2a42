//! ChainFS wire contract — commands, attributes and the TLV codec
//!
//! This crate defines the generic-netlink message contract spoken between
//! the `ext4_chain` kernel module and the bridge daemon, and the attribute
//! codec used on both the request and response path.

pub mod codec;
pub mod error;
pub mod response;
pub mod types;

// Re-export key types for convenience
pub use codec::{decode_attrs, decode_ino, encode_attrs, AttrDecoder, AttrEncoder};
pub use error::ProtoError;
pub use types::{attr, AttrMask, Command, InodeAttrs, Status, TimeSpec, FAMILY_NAME};
