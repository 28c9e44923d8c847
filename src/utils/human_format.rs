//! Display helpers for the stream description lines

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Scales `bytes` by `base` (1024 or 1000) into the largest unit below it.
///
/// Whole bytes print without decimals; larger units keep three significant
/// digits, so `1.50 KB`, `15.0 GB`.
pub fn format_size(bytes: u64, base: u64) -> String {
    let base = base.max(2) as f64;
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= base && unit + 1 < UNITS.len() {
        value /= base;
        unit += 1;
    }

    match (unit, value) {
        (0, _) => format!("{bytes} B"),
        (_, v) if v >= 100.0 => format!("{v:.0} {}", UNITS[unit]),
        (_, v) if v >= 10.0 => format!("{v:.1} {}", UNITS[unit]),
        (_, v) => format!("{v:.2} {}", UNITS[unit]),
    }
}

/// Binary-unit size, the form debrid sources report
pub fn format_bytes(bytes: u64) -> String {
    format_size(bytes, 1024)
}

/// Runtime in milliseconds as `1h 32m`, `45m 10s` or `12s`
pub fn format_duration(millis: u64) -> String {
    let secs = millis / 1000;
    match (secs / 3600, secs % 3600 / 60, secs % 60) {
        (0, 0, s) => format!("{s}s"),
        (0, m, s) => format!("{m}m {s}s"),
        (h, m, _) => format!("{h}h {m}m"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_sizes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.00 GB");
        assert_eq!(format_bytes(15 * 1024 * 1024 * 1024), "15.0 GB");
        assert_eq!(format_bytes(250 * 1024 * 1024), "250 MB");
    }

    #[test]
    fn test_decimal_sizes() {
        assert_eq!(format_size(2_500_000_000, 1000), "2.50 GB");
        assert_eq!(format_size(999, 1000), "999 B");
    }

    #[test]
    fn test_runtime() {
        assert_eq!(format_duration(5_520_000), "1h 32m");
        assert_eq!(format_duration(2_710_000), "45m 10s");
        assert_eq!(format_duration(12_000), "12s");
        assert_eq!(format_duration(0), "0s");
    }
}
