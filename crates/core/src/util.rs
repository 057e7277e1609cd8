//! Time, version and key helpers shared across crates

use std::time::{SystemTime, UNIX_EPOCH};

/// Crate version string, stamped into checkpoint files
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Nanoseconds since the Unix epoch
///
/// Returns 0 if the system clock is before the epoch.
pub fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos().min(u64::MAX as u128) as u64)
        .unwrap_or(0)
}

/// Seconds since the Unix epoch
pub fn now_secs() -> u64 {
    now_nanos() / 1_000_000_000
}

/// Pack a `major.minor.patch` version string into `major<<24 | minor<<16 | patch`
///
/// Missing or non-numeric components count as zero. Minor and patch are
/// clamped to their field widths.
pub fn pack_version(version: &str) -> u32 {
    let mut parts = version
        .split('.')
        .map(|p| p.trim().parse::<u32>().unwrap_or(0));
    let major = parts.next().unwrap_or(0).min(0xFF);
    let minor = parts.next().unwrap_or(0).min(0xFF);
    let patch = parts.next().unwrap_or(0).min(0xFFFF);
    (major << 24) | (minor << 16) | patch
}

/// Inverse of [`pack_version`]
pub fn version_to_string(packed: u32) -> String {
    format!(
        "{}.{}.{}",
        packed >> 24,
        (packed >> 16) & 0xFF,
        packed & 0xFFFF
    )
}

/// True if `key` starts with any of `prefixes`, or `prefixes` is empty
pub fn matches_prefixes<S: AsRef<str>>(key: &str, prefixes: &[S]) -> bool {
    prefixes.is_empty() || prefixes.iter().any(|p| key.starts_with(p.as_ref()))
}

/// Keys beginning with `.` are process-local and never shared
pub fn is_local_key(key: &str) -> bool {
    key.starts_with('.')
}
