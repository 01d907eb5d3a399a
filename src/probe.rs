//! Host resource probes backing the tuner.
//!
//! Two questions are answered here: how much physical memory this machine
//! has (and how much of it is actually free right now), and how fast it can
//! run the scrypt core. Both probes can fail; failures surface as
//! [`Error::Limit`] and [`Error::Clock`] respectively.

use std::io;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use scrypt::Params as ScryptParams;

use crate::error::{Error, Result};

/// Physical memory as reported by the operating system, in bytes.
#[derive(Debug, Clone, Copy)]
pub struct MemInfo {
    pub total: u64,
    pub available: u64,
}

/// Measurements shorter than this are considered timer noise.
const MIN_MEASUREMENT: Duration = Duration::from_millis(10);

/// salsa20/8 core calls per probe invocation: 4 * N * r * p at N=128, r=1, p=1.
const OPS_PER_PROBE: f64 = 512.0;

static SCRYPT_OPS: OnceLock<f64> = OnceLock::new();

/// Queries total and available physical memory.
pub fn memory() -> Result<MemInfo> {
    memory_impl().map_err(Error::Limit)
}

/// Estimates scrypt throughput in salsa20/8 core operations per second.
///
/// The measurement is cached for the lifetime of the process; the answer
/// only depends on the host, so racing initializations are harmless.
pub fn scrypt_ops_per_second() -> Result<f64> {
    if let Some(ops) = SCRYPT_OPS.get() {
        return Ok(*ops);
    }
    let ops = measure_ops()?;
    Ok(*SCRYPT_OPS.get_or_init(|| ops))
}

/// Times scrypt at the smallest interesting cost (N=128, r=1, p=1),
/// doubling the iteration count until the elapsed time clears the timer
/// noise threshold.
fn measure_ops() -> Result<f64> {
    let params = ScryptParams::new(7, 1, 1, 64).map_err(|_| Error::Clock)?;
    let mut iterations: u32 = 1;

    loop {
        let mut dk = [0u8; 64];
        let start = Instant::now();
        for _ in 0..iterations {
            scrypt::scrypt(b"", b"", &params, &mut dk).map_err(|_| Error::Clock)?;
        }
        let elapsed = start.elapsed();

        if elapsed >= MIN_MEASUREMENT {
            return Ok(OPS_PER_PROBE * f64::from(iterations) / elapsed.as_secs_f64());
        }

        // A clock that never accumulates time would spin here forever.
        iterations = iterations.checked_mul(2).ok_or(Error::Clock)?;
    }
}

#[cfg(target_os = "linux")]
fn memory_impl() -> io::Result<MemInfo> {
    let meminfo = std::fs::read_to_string("/proc/meminfo")?;
    parse_meminfo(&meminfo)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unparseable /proc/meminfo"))
}

/// Extracts MemTotal and MemAvailable (falling back to MemFree, falling
/// back to half of total) from /proc/meminfo contents.
#[cfg(any(target_os = "linux", test))]
fn parse_meminfo(contents: &str) -> Option<MemInfo> {
    let mut total = None;
    let mut available = None;
    let mut free = None;

    for line in contents.lines() {
        let field = if line.starts_with("MemTotal:") {
            &mut total
        } else if line.starts_with("MemAvailable:") {
            &mut available
        } else if line.starts_with("MemFree:") {
            &mut free
        } else {
            continue;
        };
        *field = line
            .split_whitespace()
            .nth(1)
            .and_then(|v| v.parse::<u64>().ok())
            .map(|kib| kib * 1024);
    }

    let total = total?;
    let available = available.or(free).unwrap_or(total / 2);
    Some(MemInfo { total, available })
}

#[cfg(target_os = "macos")]
fn memory_impl() -> io::Result<MemInfo> {
    use std::process::Command;

    let out = Command::new("sysctl").args(["-n", "hw.memsize"]).output()?;
    let total: u64 = String::from_utf8_lossy(&out.stdout)
        .trim()
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "unparseable hw.memsize"))?;

    // Free plus inactive pages approximate reclaimable memory.
    let out = Command::new("vm_stat").output()?;
    let stdout = String::from_utf8_lossy(&out.stdout);
    let mut page_size: u64 = 4096;
    let mut pages: u64 = 0;
    for line in stdout.lines() {
        if let Some(rest) = line.strip_prefix("Mach Virtual Memory Statistics: (page size of ") {
            if let Some(size) = rest.split(' ').next().and_then(|v| v.parse().ok()) {
                page_size = size;
            }
        } else if line.starts_with("Pages free:") || line.starts_with("Pages inactive:") {
            if let Some(count) = line
                .rsplit(' ')
                .next()
                .and_then(|v| v.trim_end_matches('.').parse::<u64>().ok())
            {
                pages += count;
            }
        }
    }

    let available = if pages > 0 { pages * page_size } else { total / 2 };
    Ok(MemInfo { total, available })
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn memory_impl() -> io::Result<MemInfo> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "no memory probe for this platform",
    ))
}
