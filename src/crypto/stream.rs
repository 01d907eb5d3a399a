//! The streaming cipher/MAC pipeline for the container body.
//!
//! The body is the plaintext XORed with an AES-256-CTR keystream (128-bit
//! big-endian counter starting at zero), followed by a 32-byte
//! HMAC-SHA-256 tag. The MAC context is handed in already seeded with the
//! 96 header bytes and sees every ciphertext byte in stream order, so the
//! trailing tag covers header and body as one message.

use std::io::{self, Read, Write};

use aes::Aes256;
use aes::cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128BE;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::{KEY_LEN, TAG_LEN};
use crate::error::{Error, Result};

pub type Aes256Ctr = Ctr128BE<Aes256>;
pub type HmacSha256 = Hmac<Sha256>;

const CHUNK_LEN: usize = 64 * 1024;

/// Builds the body cipher: AES-256-CTR with an all-zero initial counter.
pub fn cipher(enc_key: &[u8; KEY_LEN]) -> Aes256Ctr {
    let iv = [0u8; 16];
    Aes256Ctr::new(enc_key.into(), (&iv).into())
}

/// Builds the running MAC keyed by the auth subkey.
pub fn mac(auth_key: &[u8; KEY_LEN]) -> HmacSha256 {
    HmacSha256::new_from_slice(auth_key).expect("HMAC accepts any key length")
}

/// Encrypts `input` into `output` and appends the finalized tag.
///
/// `mac` must already have absorbed the header bytes.
pub fn encrypt_body<R: Read, W: Write>(
    input: &mut R,
    output: &mut W,
    mut cipher: Aes256Ctr,
    mut mac: HmacSha256,
) -> Result<()> {
    let mut buf = vec![0u8; CHUNK_LEN];

    loop {
        let n = read_some(input, &mut buf)?;
        if n == 0 {
            break;
        }
        let chunk = &mut buf[..n];
        cipher.apply_keystream(chunk);
        mac.update(chunk);
        output.write_all(chunk).map_err(Error::WriteFile)?;
    }

    let tag = mac.finalize().into_bytes();
    output.write_all(&tag).map_err(Error::WriteFile)?;
    Ok(())
}

/// Decrypts `input` into `output`, treating the final 32 bytes as the tag.
///
/// The tag position is only known at EOF, so the last [`TAG_LEN`] bytes read
/// so far are always held back from the cipher. Plaintext is necessarily
/// written out before the tag has been checked; a caller that must not
/// expose unauthenticated data has to buffer the output itself.
pub fn decrypt_body<R: Read, W: Write>(
    input: &mut R,
    output: &mut W,
    mut cipher: Aes256Ctr,
    mut mac: HmacSha256,
) -> Result<()> {
    let mut buf = vec![0u8; CHUNK_LEN];
    let mut pending: Vec<u8> = Vec::with_capacity(CHUNK_LEN + TAG_LEN);

    loop {
        let n = read_some(input, &mut buf)?;
        if n == 0 {
            break;
        }
        pending.extend_from_slice(&buf[..n]);

        if pending.len() > TAG_LEN {
            let body_len = pending.len() - TAG_LEN;
            let body = &mut pending[..body_len];
            mac.update(body);
            cipher.apply_keystream(body);
            output.write_all(body).map_err(Error::WriteFile)?;
            pending.drain(..body_len);
        }
    }

    // Fewer bytes than a tag: the container was truncated.
    if pending.len() < TAG_LEN {
        return Err(Error::Invalid);
    }

    let tag = mac.finalize().into_bytes();
    if bool::from(tag.ct_eq(&pending[..])) {
        Ok(())
    } else {
        Err(Error::Invalid)
    }
}

fn read_some<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<usize> {
    loop {
        match input.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::ReadFile(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const ENC_KEY: [u8; KEY_LEN] = [0x11; KEY_LEN];
    const AUTH_KEY: [u8; KEY_LEN] = [0x22; KEY_LEN];

    fn encrypt(plaintext: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        encrypt_body(
            &mut Cursor::new(plaintext),
            &mut out,
            cipher(&ENC_KEY),
            mac(&AUTH_KEY),
        )
        .unwrap();
        out
    }

    fn decrypt(body: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        decrypt_body(
            &mut Cursor::new(body),
            &mut out,
            cipher(&ENC_KEY),
            mac(&AUTH_KEY),
        )?;
        Ok(out)
    }

    #[test]
    fn body_roundtrip() {
        let plaintext = b"attack at dawn";
        let body = encrypt(plaintext);

        assert_eq!(body.len(), plaintext.len() + TAG_LEN);
        assert_eq!(decrypt(&body).unwrap(), plaintext);
    }

    #[test]
    fn empty_plaintext_is_just_a_tag() {
        let body = encrypt(b"");

        assert_eq!(body.len(), TAG_LEN);
        assert_eq!(decrypt(&body).unwrap(), b"");
    }

    #[test]
    fn large_plaintext_spans_chunks() {
        let plaintext = vec![0x5au8; 3 * CHUNK_LEN + 17];
        let body = encrypt(&plaintext);

        assert_eq!(decrypt(&body).unwrap(), plaintext);
    }

    #[test]
    fn ciphertext_differs_from_plaintext() {
        let plaintext = vec![0u8; 256];
        let body = encrypt(&plaintext);

        assert_ne!(&body[..256], &plaintext[..]);
    }

    #[test]
    fn tampered_body_fails() {
        let mut body = encrypt(b"some plaintext");
        body[3] ^= 0x01;

        assert!(matches!(decrypt(&body), Err(Error::Invalid)));
    }

    #[test]
    fn tampered_tag_fails() {
        let mut body = encrypt(b"some plaintext");
        let last = body.len() - 1;
        body[last] ^= 0x80;

        assert!(matches!(decrypt(&body), Err(Error::Invalid)));
    }

    #[test]
    fn truncated_body_fails() {
        let body = encrypt(b"some plaintext");

        for cut in 1..=TAG_LEN {
            let truncated = &body[..body.len() - cut];
            assert!(matches!(decrypt(truncated), Err(Error::Invalid)));
        }
    }

    #[test]
    fn short_input_fails() {
        assert!(matches!(decrypt(&[0u8; TAG_LEN - 1]), Err(Error::Invalid)));
        assert!(matches!(decrypt(&[]), Err(Error::Invalid)));
    }
}
