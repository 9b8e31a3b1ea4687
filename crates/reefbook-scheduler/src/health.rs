//! Process resource sampling for the health sweep.

/// Read-only access to the process's resource usage.
pub trait ResourceSampler: Send + Sync {
    /// Resident set size in bytes, when the platform exposes it.
    fn rss_bytes(&self) -> Option<u64>;
}

/// Samples RSS from `/proc/self/status`. Returns `None` on platforms
/// without procfs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcStatusSampler;

impl ResourceSampler for ProcStatusSampler {
    fn rss_bytes(&self) -> Option<u64> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        rss_from_status(&status)
    }
}

fn rss_from_status(status: &str) -> Option<u64> {
    let line = status.lines().find(|line| line.starts_with("VmRSS:"))?;
    let kib: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kib * 1024)
}
