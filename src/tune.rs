//! Work parameter selection and feasibility checking.
//!
//! Every scrypt invocation costs `128 * r * N` bytes of scratch memory and
//! `4 * r * p * N` salsa20/8 core calls. The tuner turns a user budget
//! (memory cap, memory fraction, time cap) into limits on those two
//! quantities, then either picks the largest feasible `logN` for encryption
//! or checks a container's recorded parameters against the limits before
//! any derivation work starts.

use crate::error::{Error, Result};
use crate::probe;

/// Smallest logN the automatic selection will settle on.
pub const MIN_LOG_N: u8 = 10;
/// Largest logN the automatic selection will settle on.
pub const MAX_LOG_N: u8 = 40;

/// The memory budget never drops below 1 MiB.
const MEMLIMIT_FLOOR: u64 = 1024 * 1024;
/// Always allow at least 2^15 salsa20/8 core operations.
const OPSLIMIT_FLOOR: f64 = 32768.0;

/// Work parameters and resource budget for one session.
///
/// `log_n`, `r` and `p` are either all zero (pick automatically) or all
/// nonzero (use exactly these, subject to a feasibility check). The three
/// budget fields are advisory: `max_mem` of 0 means no explicit byte cap,
/// and a `max_mem_frac` of 0 or above 0.5 is treated as 0.5.
#[derive(Debug, Clone, Copy)]
pub struct Params {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
    pub max_mem: u64,
    pub max_mem_frac: f64,
    pub max_time: f64,
}

impl Params {
    /// Default budget for encryption: an eighth of physical memory, 5 seconds.
    pub fn for_encrypt() -> Self {
        Self {
            log_n: 0,
            r: 0,
            p: 0,
            max_mem: 0,
            max_mem_frac: 0.125,
            max_time: 5.0,
        }
    }

    /// Default budget for decryption: half of physical memory, 300 seconds.
    pub fn for_decrypt() -> Self {
        Self {
            log_n: 0,
            r: 0,
            p: 0,
            max_mem: 0,
            max_mem_frac: 0.5,
            max_time: 300.0,
        }
    }
}

/// Resolves the parameters to use for an encryption session.
///
/// Explicit parameters are checked against the budget and rejected with
/// [`Error::Param`] if infeasible; `force` skips the check (and the probes
/// behind it), but an explicit `logN` above [`MAX_LOG_N`] is outside the
/// parameter domain and is rejected regardless. With no explicit parameters
/// the largest feasible `logN` in `[MIN_LOG_N, MAX_LOG_N]` is chosen with
/// `r = 8`, `p = 1`.
pub fn params_for_encrypt(params: &Params, force: bool) -> Result<(u8, u32, u32)> {
    if params.log_n != 0 || params.r != 0 || params.p != 0 {
        if params.log_n == 0 || params.r == 0 || params.p == 0 || params.log_n > MAX_LOG_N {
            return Err(Error::Param);
        }
        if !force {
            let (memlimit, opslimit) = budget(params)?;
            if working_set(params.log_n, params.r) > u128::from(memlimit) {
                return Err(Error::Param);
            }
            if op_count(params.log_n, params.r, params.p) as f64 > opslimit {
                return Err(Error::Param);
            }
        }
        return Ok((params.log_n, params.r, params.p));
    }

    let (memlimit, opslimit) = budget(params)?;
    Ok(pick(memlimit, opslimit))
}

/// Checks a container's recorded parameters against the decrypt budget.
///
/// Runs before any scrypt work: [`Error::TooBig`] if the scratch allocation
/// would exceed the memory budget, [`Error::TooSlow`] if the operation count
/// would exceed the time budget. `force` bypasses both (and the probes).
pub fn check_decrypt(log_n: u8, r: u32, p: u32, params: &Params, force: bool) -> Result<()> {
    if force {
        return Ok(());
    }

    let (memlimit, opslimit) = budget(params)?;
    if working_set(log_n, r) > u128::from(memlimit) {
        return Err(Error::TooBig);
    }
    if op_count(log_n, r, p) as f64 > opslimit {
        return Err(Error::TooSlow);
    }
    Ok(())
}

fn budget(params: &Params) -> Result<(u64, f64)> {
    let mem = probe::memory()?;
    let ops = probe::scrypt_ops_per_second()?;
    Ok((
        memlimit(params.max_mem, params.max_mem_frac, &mem),
        opslimit(params.max_time, ops),
    ))
}

fn memlimit(max_mem: u64, max_mem_frac: f64, mem: &probe::MemInfo) -> u64 {
    let frac = if max_mem_frac == 0.0 || max_mem_frac > 0.5 {
        0.5
    } else {
        max_mem_frac
    };

    let mut limit = (mem.total as f64 * frac) as u64;
    limit = limit.min(mem.available);
    if max_mem > 0 {
        limit = limit.min(max_mem);
    }
    limit.max(MEMLIMIT_FLOOR)
}

fn opslimit(max_time: f64, ops_per_second: f64) -> f64 {
    (max_time * ops_per_second).max(OPSLIMIT_FLOOR)
}

/// Scratch memory in bytes for one scrypt call: `128 * r * 2^logN`.
fn working_set(log_n: u8, r: u32) -> u128 {
    128 * u128::from(r) * (1u128 << log_n)
}

/// salsa20/8 core calls for one scrypt call: `4 * r * p * 2^logN`.
fn op_count(log_n: u8, r: u32, p: u32) -> u128 {
    4 * u128::from(r) * u128::from(p) * (1u128 << log_n)
}

fn pick(memlimit: u64, opslimit: f64) -> (u8, u32, u32) {
    const R: u32 = 8;
    const P: u32 = 1;

    let log_n = (MIN_LOG_N..=MAX_LOG_N)
        .rev()
        .find(|&l| {
            working_set(l, R) <= u128::from(memlimit) && op_count(l, R, P) as f64 <= opslimit
        })
        .unwrap_or(MIN_LOG_N);

    (log_n, R, P)
}
