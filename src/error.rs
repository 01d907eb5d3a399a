use std::fmt;
use std::io;

/// Everything that can go wrong while encrypting, decrypting or inspecting
/// an scrypt container.
///
/// The distinction between [`Error::Passphrase`] and [`Error::Invalid`]
/// matters: the former means the header parsed as scrypt data but the
/// derived HMAC key was wrong (the user typed the wrong passphrase), the
/// latter means the data itself is not an intact scrypt container.
#[derive(Debug)]
pub enum Error {
    /// The amount of available memory could not be determined.
    Limit(io::Error),
    /// The scrypt throughput benchmark could not produce a measurement.
    Clock,
    /// scrypt key derivation failed internally.
    Key,
    /// The system random source would not produce a salt.
    Salt,
    /// An allocation-size computation overflowed.
    Memory,
    /// Input is not a valid scrypt container, or the final tag did not match.
    Invalid,
    /// The header carries a format version this build does not understand.
    Version(u8),
    /// Decrypting the file would exceed the memory budget.
    TooBig,
    /// Decrypting the file would exceed the CPU time budget.
    TooSlow,
    /// The header HMAC did not match: wrong passphrase.
    Passphrase,
    /// Manually specified parameters are infeasible under the budget.
    Param,
    /// Reading the input stream failed.
    ReadFile(io::Error),
    /// Writing the output stream failed.
    WriteFile(io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Limit(e) => {
                write!(f, "Error determining amount of available memory: {e}")
            }
            Error::Clock => write!(f, "Error reading clocks"),
            Error::Key => write!(f, "Error computing derived key"),
            Error::Salt => write!(f, "Error reading salt"),
            Error::Memory => write!(f, "Error allocating memory"),
            Error::Invalid => write!(f, "Input is not valid scrypt-encrypted block"),
            Error::Version(v) => write!(f, "Unrecognized scrypt format version: {v}"),
            Error::TooBig => write!(f, "Decrypting file would require too much memory"),
            Error::TooSlow => write!(f, "Decrypting file would take too much CPU time"),
            Error::Passphrase => write!(f, "Passphrase is incorrect"),
            Error::Param => write!(f, "Error in the manually specified parameters"),
            Error::ReadFile(e) => write!(f, "Error reading file: {e}"),
            Error::WriteFile(e) => write!(f, "Error writing file: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Limit(e) | Error::ReadFile(e) | Error::WriteFile(e) => Some(e),
            _ => None,
        }
    }
}
