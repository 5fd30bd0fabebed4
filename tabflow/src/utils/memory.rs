//! System memory sampling.

/// Percentage of system memory in use, or `None` when it cannot be read.
///
/// Computed as `(MemTotal - MemAvailable) / MemTotal * 100` from
/// `/proc/meminfo`.
#[must_use]
pub fn memory_usage_percent() -> Option<f64> {
    let txt = std::fs::read_to_string("/proc/meminfo").ok()?;
    parse_meminfo_percent(&txt)
}

/// Parses the used-memory percentage out of `/proc/meminfo` contents.
#[must_use]
pub fn parse_meminfo_percent(txt: &str) -> Option<f64> {
    let mut total = None;
    let mut available = None;

    for line in txt.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            total = parse_kib(rest);
        } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
            available = parse_kib(rest);
        }
        if total.is_some() && available.is_some() {
            break;
        }
    }

    let total = total?;
    let available = available?;
    if total == 0 {
        return None;
    }

    let used = total.saturating_sub(available) as f64;
    let percent = used / total as f64 * 100.0;
    Some((percent * 10.0).round() / 10.0)
}

fn parse_kib(raw: &str) -> Option<u64> {
    raw.split_whitespace().next()?.parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_meminfo() {
        let txt = "MemTotal:       16000000 kB\n\
                   MemFree:         2000000 kB\n\
                   MemAvailable:    4000000 kB\n";
        assert_eq!(parse_meminfo_percent(txt), Some(75.0));
    }

    #[test]
    fn test_parse_meminfo_missing_fields() {
        assert_eq!(parse_meminfo_percent("MemTotal: 100 kB\n"), None);
        assert_eq!(parse_meminfo_percent(""), None);
    }

    #[test]
    fn test_parse_meminfo_zero_total() {
        let txt = "MemTotal: 0 kB\nMemAvailable: 0 kB\n";
        assert_eq!(parse_meminfo_percent(txt), None);
    }

    #[test]
    fn test_memory_usage_percent_in_range() {
        if let Some(percent) = memory_usage_percent() {
            assert!((0.0..=100.0).contains(&percent));
        }
    }
}
