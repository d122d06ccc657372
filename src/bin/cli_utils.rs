use anyhow::{Context, Result};
use ipregion::Index;
use std::fs;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Open an artifact memory-mapped, or fully in memory when `load` is set
pub fn open_index(path: &Path, load: bool) -> Result<Index> {
    let index = if load {
        Index::load(path)
    } else {
        Index::open(path)
    };
    index.with_context(|| format!("Failed to open artifact: {}", path.display()))
}

/// Set file permissions to read-only (0444 on Unix, read-only attribute elsewhere)
pub fn set_readonly(path: &Path) -> Result<()> {
    let mut perms = fs::metadata(path)
        .with_context(|| format!("Failed to get metadata for: {}", path.display()))?
        .permissions();

    #[cfg(unix)]
    {
        perms.set_mode(0o444);
    }

    #[cfg(not(unix))]
    {
        perms.set_readonly(true);
    }

    fs::set_permissions(path, perms)
        .with_context(|| format!("Failed to set read-only permissions: {}", path.display()))
}

pub fn format_number(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

pub fn format_qps(qps: f64) -> String {
    if qps >= 1_000_000.0 {
        format!("{:.2}M", qps / 1_000_000.0)
    } else if qps >= 1_000.0 {
        format!("{:.2}K", qps / 1_000.0)
    } else {
        format!("{:.2}", qps)
    }
}

/// Render Unix seconds as `YYYY-MM-DD HH:MM:SS UTC`, or "not recorded" for 0
pub fn format_build_time(epoch: u64) -> String {
    if epoch == 0 {
        return "not recorded".to_string();
    }
    let (days, secs) = (epoch / 86_400, epoch % 86_400);
    let (year, month, day) = civil_from_days(days as i64);
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
        year,
        month,
        day,
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

// Days since 1970-01-01 to a proleptic Gregorian date
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

/// Current Unix time in seconds
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
