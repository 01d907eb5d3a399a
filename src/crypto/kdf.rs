use scrypt::Params as ScryptParams;
use zeroize::Zeroize;

use super::{DK_LEN, KEY_LEN, SALT_LEN};
use crate::error::{Error, Result};

/// The two subkeys carved out of a single 64-byte scrypt output.
///
/// `enc` keys the AES-256-CTR stream, `auth` keys both HMAC tags.
/// Both halves are zeroized on drop.
pub struct DerivedKeys {
    pub enc: [u8; KEY_LEN],
    pub auth: [u8; KEY_LEN],
}

impl Drop for DerivedKeys {
    fn drop(&mut self) {
        self.enc.zeroize();
        self.auth.zeroize();
    }
}

impl std::fmt::Debug for DerivedKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKeys")
            .field("enc", &"[REDACTED]")
            .field("auth", &"[REDACTED]")
            .finish()
    }
}

/// Runs scrypt over the passphrase and salt and splits the 64-byte output
/// into the encryption and authentication subkeys.
///
/// The caller is expected to have validated `(log_n, r, p)` against its
/// resource budget already; failures here are internal KDF errors.
pub fn derive_keys(passwd: &[u8], salt: &[u8; SALT_LEN], log_n: u8, r: u32, p: u32) -> Result<DerivedKeys> {
    let params = ScryptParams::new(log_n, r, p, DK_LEN).map_err(|_| Error::Key)?;

    let mut dk = [0u8; DK_LEN];
    scrypt::scrypt(passwd, salt, &params, &mut dk).map_err(|_| Error::Key)?;

    let mut keys = DerivedKeys {
        enc: [0u8; KEY_LEN],
        auth: [0u8; KEY_LEN],
    };
    keys.enc.copy_from_slice(&dk[..KEY_LEN]);
    keys.auth.copy_from_slice(&dk[KEY_LEN..]);
    dk.zeroize();

    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kdf_is_deterministic() {
        let salt = [42u8; SALT_LEN];

        let k1 = derive_keys(b"password", &salt, 10, 1, 1).unwrap();
        let k2 = derive_keys(b"password", &salt, 10, 1, 1).unwrap();

        assert_eq!(k1.enc, k2.enc);
        assert_eq!(k1.auth, k2.auth);
    }

    #[test]
    fn subkeys_are_independent() {
        let salt = [7u8; SALT_LEN];
        let keys = derive_keys(b"pw", &salt, 10, 1, 1).unwrap();

        assert_ne!(keys.enc, keys.auth);
    }

    #[test]
    fn salt_affects_both_subkeys() {
        let k1 = derive_keys(b"pw", &[1u8; SALT_LEN], 10, 1, 1).unwrap();
        let k2 = derive_keys(b"pw", &[2u8; SALT_LEN], 10, 1, 1).unwrap();

        assert_ne!(k1.enc, k2.enc);
        assert_ne!(k1.auth, k2.auth);
    }

    #[test]
    fn cost_parameters_affect_output() {
        let salt = [3u8; SALT_LEN];

        let k1 = derive_keys(b"pw", &salt, 10, 1, 1).unwrap();
        let k2 = derive_keys(b"pw", &salt, 11, 1, 1).unwrap();

        assert_ne!(k1.enc, k2.enc);
    }

    #[test]
    fn invalid_cost_fails_gracefully() {
        let salt = [0u8; SALT_LEN];
        assert!(derive_keys(b"pw", &salt, 64, 1, 1).is_err());
    }

    #[test]
    fn debug_output_is_redacted() {
        let keys = derive_keys(b"pw", &[0u8; SALT_LEN], 10, 1, 1).unwrap();
        let s = format!("{keys:?}");
        assert!(s.contains("REDACTED"));
    }
}
