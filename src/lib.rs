//! scryptenc - passphrase-based file encryption built on scrypt
//!
//! Encrypts a byte stream under a passphrase into a self-describing
//! container: a 96-byte header carrying the scrypt work parameters
//! (N, r, p) and a random salt, the AES-256-CTR-encrypted body, and a
//! trailing HMAC-SHA-256 tag over header and body. The work parameters are
//! either chosen automatically from a time/memory budget or supplied
//! explicitly and checked against that budget.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::io::Cursor;
//! use scryptenc::Params;
//!
//! let mut ciphertext = Vec::new();
//! scryptenc::encrypt(
//!     &mut Cursor::new(b"attack at dawn"),
//!     &mut ciphertext,
//!     b"hunter2",
//!     &Params::for_encrypt(),
//!     false,
//!     false,
//! )
//! .unwrap();
//!
//! let cookie = scryptenc::decrypt_prep(
//!     Cursor::new(&ciphertext),
//!     b"hunter2",
//!     &Params::for_decrypt(),
//!     false,
//!     false,
//! )
//! .unwrap();
//! let mut plaintext = Vec::new();
//! cookie.copy(&mut plaintext).unwrap();
//! ```
//!
//! # Streaming caveat
//!
//! Decryption is streaming: plaintext bytes are written to the output
//! *before* the trailing tag has been verified. A caller that must never
//! observe unauthenticated plaintext has to buffer the output and discard
//! it if [`DecryptCookie::copy`] fails.
//!
//! # Wrong passphrase vs. corruption
//!
//! [`Error::Passphrase`] and [`Error::Invalid`] are distinct on purpose:
//! the header checksum proves the container is scrypt data without any key
//! material, while the header HMAC can only fail once the subkeys have been
//! derived from the passphrase the user actually typed.

mod crypto;
mod error;
mod probe;
mod tune;

use std::fmt;
use std::io::{Read, Write};

use hmac::Mac;

use crate::crypto::stream::{Aes256Ctr, HmacSha256};
use crate::crypto::{HEADER_LEN, Header, SALT_LEN, kdf, stream};
pub use crate::error::{Error, Result};
pub use crate::tune::Params;

/// Encrypts `input` into `output` under `passwd`.
///
/// Runs the tuner (parameter selection or feasibility check, depending on
/// whether `params` carries explicit work parameters), derives the subkeys,
/// then writes header, body and trailing tag in order. The output is always
/// exactly 128 bytes longer than the input.
///
/// `verbose` reports the chosen parameters on standard error; `force`
/// bypasses the feasibility check.
pub fn encrypt<R: Read, W: Write>(
    input: &mut R,
    output: &mut W,
    passwd: &[u8],
    params: &Params,
    verbose: bool,
    force: bool,
) -> Result<()> {
    let (log_n, r, p) = tune::params_for_encrypt(params, force)?;
    if verbose {
        display_params(log_n, r, p);
    }

    let mut salt = [0u8; SALT_LEN];
    getrandom::fill(&mut salt).map_err(|_| Error::Salt)?;

    let keys = kdf::derive_keys(passwd, &salt, log_n, r, p)?;

    let header_bytes = Header::new(log_n, r, p, salt).to_bytes(&keys.auth);
    let mut mac = stream::mac(&keys.auth);
    mac.update(&header_bytes);

    output.write_all(&header_bytes).map_err(Error::WriteFile)?;
    stream::encrypt_body(input, output, stream::cipher(&keys.enc), mac)?;
    output.flush().map_err(Error::WriteFile)
}

/// The state carried from [`decrypt_prep`] to [`DecryptCookie::copy`].
///
/// Owns the input stream positioned just past the header, the body cipher,
/// and the running MAC that has already absorbed the header bytes. `copy`
/// takes the cookie by value, so it can be used exactly once; the subkeys
/// it was built from have already been zeroized by the time `prep` returns.
pub struct DecryptCookie<R: Read> {
    input: R,
    cipher: Aes256Ctr,
    mac: HmacSha256,
}

/// Reads and validates the container header, returning a cookie for the
/// body copy.
///
/// Everything that can be rejected without touching the output happens
/// here: magic/version/checksum validation, the tuner's memory and time
/// feasibility checks (before any scrypt work), subkey derivation, and the
/// header HMAC check. On failure up to 96 bytes of `input` have been
/// consumed and no cookie exists.
pub fn decrypt_prep<R: Read>(
    mut input: R,
    passwd: &[u8],
    params: &Params,
    verbose: bool,
    force: bool,
) -> Result<DecryptCookie<R>> {
    let header_bytes = read_header(&mut input)?;
    let header = Header::from_bytes(&header_bytes)?;

    tune::check_decrypt(header.log_n(), header.r(), header.p(), params, force)?;
    if verbose {
        display_params(header.log_n(), header.r(), header.p());
    }

    let keys = kdf::derive_keys(passwd, header.salt(), header.log_n(), header.r(), header.p())?;
    Header::verify_tag(&header_bytes, &keys.auth)?;

    let mut mac = stream::mac(&keys.auth);
    mac.update(&header_bytes);

    Ok(DecryptCookie {
        input,
        cipher: stream::cipher(&keys.enc),
        mac,
    })
}

impl<R: Read> DecryptCookie<R> {
    /// Streams the body into `output` and verifies the trailing tag.
    ///
    /// Consumes the cookie. A tag mismatch is [`Error::Invalid`]; by then
    /// the plaintext has already been written (see the crate-level
    /// streaming caveat).
    pub fn copy<W: Write>(mut self, output: &mut W) -> Result<()> {
        stream::decrypt_body(&mut self.input, output, self.cipher, self.mac)?;
        output.flush().map_err(Error::WriteFile)
    }
}

/// The work parameters recorded in a container header.
///
/// Returned by [`file_info`]; the `Display` form is the one-line report the
/// `info` subcommand prints.
pub struct FileInfo {
    log_n: u8,
    n: u64,
    r: u32,
    p: u32,
}

impl FileInfo {
    pub fn log_n(&self) -> u8 {
        self.log_n
    }

    pub fn n(&self) -> u64 {
        self.n
    }

    pub fn r(&self) -> u32 {
        self.r
    }

    pub fn p(&self) -> u32 {
        self.p
    }
}

impl fmt::Display for FileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "logN = {}; N = {}; r = {}; p = {};",
            self.log_n, self.n, self.r, self.p
        )
    }
}

/// Reads a container header and reports its work parameters.
///
/// Verifies magic, version and checksum, but not the header HMAC: that
/// would require the passphrase, and inspecting parameters must not.
pub fn file_info<R: Read>(input: &mut R) -> Result<FileInfo> {
    let header_bytes = read_header(input)?;
    let header = Header::from_bytes(&header_bytes)?;

    Ok(FileInfo {
        log_n: header.log_n(),
        n: header.n(),
        r: header.r(),
        p: header.p(),
    })
}

fn read_header<R: Read>(input: &mut R) -> Result<[u8; HEADER_LEN]> {
    let mut buf = [0u8; HEADER_LEN];
    input.read_exact(&mut buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Invalid
        } else {
            Error::ReadFile(e)
        }
    })?;
    Ok(buf)
}

fn display_params(log_n: u8, r: u32, p: u32) {
    eprintln!("Parameters used: N = {}; r = {}; p = {};", 1u64 << log_n, r, p);
}
