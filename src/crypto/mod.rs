//! Cryptographic building blocks of the container format.
//!
//! Provides subkey derivation, the header codec, and the streaming
//! cipher/MAC pipeline.

pub mod header;
pub mod kdf;
pub mod stream;

pub use header::Header;
pub use kdf::DerivedKeys;

/// Length of the magic bytes (6 bytes "scrypt").
pub const MAGIC_LEN: usize = 6;
/// Magic bytes identifying an scrypt container.
pub const MAGIC: &[u8; MAGIC_LEN] = b"scrypt";
/// Container format version emitted by this build.
pub const VERSION: u8 = 0;
/// Length of the salt (32 bytes).
pub const SALT_LEN: usize = 32;
/// Length of the truncated SHA-256 header checksum (16 bytes).
pub const CHECKSUM_LEN: usize = 16;
/// Length of an HMAC-SHA-256 tag (32 bytes).
pub const TAG_LEN: usize = 32;
/// Length of the full container header (96 bytes).
pub const HEADER_LEN: usize = 96;
/// Length of each derived subkey (32 bytes).
pub const KEY_LEN: usize = 32;
/// Length of the scrypt output both subkeys are carved from (64 bytes).
pub const DK_LEN: usize = 64;
/// Fixed container overhead: header plus trailing tag (128 bytes).
pub const OVERHEAD: usize = HEADER_LEN + TAG_LEN;
