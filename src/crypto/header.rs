//! The 96-byte container header.
//!
//! Layout (big-endian):
//! ```text
//! MAGIC "scrypt" (6) | VERSION (1) | logN (1) | r (4) | p (4) | SALT (32)
//!   | CHECKSUM (16)  = SHA-256(bytes[0..48])[0..16]
//!   | HEADER HMAC (32) = HMAC-SHA-256(bytes[0..64]) keyed by the auth subkey
//! ```
//!
//! The checksum is verifiable without the passphrase and distinguishes
//! "not an scrypt file" from everything else. The header HMAC can only be
//! checked after key derivation; a mismatch there means a wrong passphrase.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::{CHECKSUM_LEN, HEADER_LEN, KEY_LEN, MAGIC, MAGIC_LEN, SALT_LEN, VERSION};
use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Offset of the checksum field; the checksum covers everything before it.
const CHECKSUM_OFFSET: usize = 48;
/// Offset of the header HMAC field; the tag covers everything before it.
const TAG_OFFSET: usize = CHECKSUM_OFFSET + CHECKSUM_LEN;

/// The scrypt work parameters and salt carried by a container.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    log_n: u8,
    r: u32,
    p: u32,
    salt: [u8; SALT_LEN],
}

impl Header {
    pub fn new(log_n: u8, r: u32, p: u32, salt: [u8; SALT_LEN]) -> Self {
        Self { log_n, r, p, salt }
    }

    pub fn log_n(&self) -> u8 {
        self.log_n
    }

    /// The scrypt cost parameter `N = 2^logN`.
    pub fn n(&self) -> u64 {
        1u64 << self.log_n
    }

    pub fn r(&self) -> u32 {
        self.r
    }

    pub fn p(&self) -> u32 {
        self.p
    }

    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    /// Serializes the header, filling in the checksum and the header HMAC.
    pub fn to_bytes(&self, auth_key: &[u8; KEY_LEN]) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];

        buf[..MAGIC_LEN].copy_from_slice(MAGIC);
        buf[MAGIC_LEN] = VERSION;
        buf[7] = self.log_n;
        buf[8..12].copy_from_slice(&self.r.to_be_bytes());
        buf[12..16].copy_from_slice(&self.p.to_be_bytes());
        buf[16..CHECKSUM_OFFSET].copy_from_slice(&self.salt);

        let digest = Sha256::digest(&buf[..CHECKSUM_OFFSET]);
        buf[CHECKSUM_OFFSET..TAG_OFFSET].copy_from_slice(&digest[..CHECKSUM_LEN]);

        let mut mac = HmacSha256::new_from_slice(auth_key).expect("HMAC accepts any key length");
        mac.update(&buf[..TAG_OFFSET]);
        buf[TAG_OFFSET..].copy_from_slice(&mac.finalize().into_bytes());

        buf
    }

    /// Parses a header, verifying magic, version and checksum.
    ///
    /// The header HMAC is deliberately not checked here; it cannot be until
    /// the subkeys have been derived. Use [`Header::verify_tag`] afterwards.
    pub fn from_bytes(data: &[u8; HEADER_LEN]) -> Result<Self> {
        if &data[..MAGIC_LEN] != MAGIC {
            return Err(Error::Invalid);
        }
        if data[MAGIC_LEN] != VERSION {
            return Err(Error::Version(data[MAGIC_LEN]));
        }

        let digest = Sha256::digest(&data[..CHECKSUM_OFFSET]);
        if digest[..CHECKSUM_LEN] != data[CHECKSUM_OFFSET..TAG_OFFSET] {
            return Err(Error::Invalid);
        }

        let log_n = data[7];
        let r = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
        let p = u32::from_be_bytes([data[12], data[13], data[14], data[15]]);

        // No scrypt invocation can have produced these; the checksum having
        // matched anyway means the container was assembled by hand.
        if log_n == 0 || log_n > 63 || r == 0 || p == 0 {
            return Err(Error::Invalid);
        }
        if u64::from(r) * u64::from(p) >= 1 << 30 {
            return Err(Error::Invalid);
        }

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&data[16..CHECKSUM_OFFSET]);

        Ok(Self { log_n, r, p, salt })
    }

    /// Verifies the header HMAC in constant time once the subkeys are known.
    ///
    /// A mismatch on a header whose checksum already verified means the
    /// passphrase was wrong, not that the data is corrupt.
    pub fn verify_tag(data: &[u8; HEADER_LEN], auth_key: &[u8; KEY_LEN]) -> Result<()> {
        let mut mac = HmacSha256::new_from_slice(auth_key).expect("HMAC accepts any key length");
        mac.update(&data[..TAG_OFFSET]);
        let computed = mac.finalize().into_bytes();

        if bool::from(computed.ct_eq(&data[TAG_OFFSET..])) {
            Ok(())
        } else {
            Err(Error::Passphrase)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ([u8; HEADER_LEN], [u8; KEY_LEN]) {
        let key = [9u8; KEY_LEN];
        let header = Header::new(10, 8, 1, [5u8; SALT_LEN]);
        (header.to_bytes(&key), key)
    }

    #[test]
    fn header_roundtrip() {
        let (bytes, key) = sample();

        let parsed = Header::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.log_n(), 10);
        assert_eq!(parsed.n(), 1024);
        assert_eq!(parsed.r(), 8);
        assert_eq!(parsed.p(), 1);
        assert_eq!(parsed.salt(), &[5u8; SALT_LEN]);

        Header::verify_tag(&bytes, &key).unwrap();
    }

    #[test]
    fn header_invalid_magic_fails() {
        let (mut bytes, _) = sample();
        bytes[0] ^= 0xff;

        assert!(matches!(Header::from_bytes(&bytes), Err(Error::Invalid)));
    }

    #[test]
    fn header_unknown_version_fails() {
        let (mut bytes, _) = sample();
        bytes[MAGIC_LEN] = 7;

        assert!(matches!(Header::from_bytes(&bytes), Err(Error::Version(7))));
    }

    #[test]
    fn corrupted_parameter_fails_checksum() {
        let (mut bytes, _) = sample();
        bytes[7] ^= 0x01;

        assert!(matches!(Header::from_bytes(&bytes), Err(Error::Invalid)));
    }

    #[test]
    fn corrupted_checksum_fails() {
        let (mut bytes, _) = sample();
        bytes[CHECKSUM_OFFSET] ^= 0x01;

        assert!(matches!(Header::from_bytes(&bytes), Err(Error::Invalid)));
    }

    #[test]
    fn wrong_key_fails_tag_verification() {
        let (bytes, _) = sample();

        assert!(matches!(
            Header::verify_tag(&bytes, &[1u8; KEY_LEN]),
            Err(Error::Passphrase)
        ));
    }

    #[test]
    fn corrupted_tag_is_a_passphrase_error() {
        let (mut bytes, key) = sample();
        bytes[TAG_OFFSET] ^= 0x01;

        // The checksum still verifies, so the parse succeeds; only the
        // keyed tag can tell this apart from a wrong passphrase.
        Header::from_bytes(&bytes).unwrap();
        assert!(matches!(
            Header::verify_tag(&bytes, &key),
            Err(Error::Passphrase)
        ));
    }

    #[test]
    fn zero_r_rejected_even_with_valid_checksum() {
        let key = [0u8; KEY_LEN];
        let bytes = Header::new(10, 0, 1, [0u8; SALT_LEN]).to_bytes(&key);

        assert!(matches!(Header::from_bytes(&bytes), Err(Error::Invalid)));
    }
}
