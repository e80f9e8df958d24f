//! Reads this process's own memory footprint out of `/proc/self/status`, the
//! same probe the original benchmark harness used.

use std::fs;

/// Virtual and resident memory usage, in kilobytes, at one point in time.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemUsage {
    pub virtual_kb: u64,
    pub resident_kb: u64,
}

/// Reads the current process's `VmSize`/`VmRSS`. Returns zeroes if
/// `/proc/self/status` can't be read (non-Linux, sandboxed, etc.) rather than
/// failing the benchmark over a diagnostic.
pub fn current_usage() -> MemUsage {
    let Ok(status) = fs::read_to_string("/proc/self/status") else {
        return MemUsage::default();
    };

    let mut usage = MemUsage::default();
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmSize:") {
            usage.virtual_kb = parse_kb(rest);
        } else if let Some(rest) = line.strip_prefix("VmRSS:") {
            usage.resident_kb = parse_kb(rest);
        }
    }
    usage
}

fn parse_kb(field: &str) -> u64 {
    field
        .split_whitespace()
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// Usage relative to a baseline snapshot, for reporting growth instead of
/// absolute numbers polluted by whatever else the process has mapped.
pub fn delta(baseline: MemUsage, now: MemUsage) -> MemUsage {
    MemUsage {
        virtual_kb: now.virtual_kb.saturating_sub(baseline.virtual_kb),
        resident_kb: now.resident_kb.saturating_sub(baseline.resident_kb),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_realistic_status_line() {
        assert_eq!(parse_kb(" 123456 kB"), 123456);
    }

    #[test]
    fn current_usage_is_nonzero_on_linux() {
        let usage = current_usage();
        assert!(usage.virtual_kb > 0);
    }
}
