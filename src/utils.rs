//! Utility functions for display formatting and process handling

use std::path::Path;
use std::time::Duration;

/// Human-readable byte count with two decimals
///
/// # Examples
///
/// ```
/// use model_dl::utils::format_bytes;
///
/// assert_eq!(format_bytes(512), "512.00 B");
/// assert_eq!(format_bytes(1536), "1.50 KB");
/// assert_eq!(format_bytes(6_442_450_944), "6.00 GB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    for unit in UNITS {
        if value < 1024.0 {
            return format!("{value:.2} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.2} PB")
}

/// Human-readable elapsed time: `45s`, `3m 12s`, `1h 4m`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Ask a process to terminate
///
/// Sends SIGTERM on unix. Returns false if the process no longer exists, which
/// callers treat as "already gone".
#[cfg(unix)]
pub fn terminate_process(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: kill(2) has no memory-safety preconditions
    unsafe { libc::kill(pid, libc::SIGTERM) == 0 }
}

/// Ask a process to terminate
///
/// No signal API is available here; the backend's own kill-on-cancel handles it.
#[cfg(not(unix))]
pub fn terminate_process(_pid: u32) -> bool {
    false
}

/// Remove `start` and its empty parents, stopping at (and keeping) `stop`
///
/// Returns the number of directories removed. Non-empty or missing
/// directories end the walk quietly.
pub async fn remove_empty_dirs(start: &Path, stop: &Path) -> usize {
    let mut removed = 0;
    let mut current = start.to_path_buf();

    while current != stop && current.starts_with(stop) {
        if tokio::fs::remove_dir(&current).await.is_err() {
            break;
        }
        removed += 1;
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    removed
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_scale_through_units() {
        assert_eq!(format_bytes(0), "0.00 B");
        assert_eq!(format_bytes(1023), "1023.00 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_bytes(1024u64.pow(4)), "1.00 TB");
        assert_eq!(format_bytes(3 * 1024u64.pow(5)), "3.00 PB");
    }

    #[test]
    fn durations_pick_two_largest_units() {
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_secs(192)), "3m 12s");
        assert_eq!(format_duration(Duration::from_secs(3840)), "1h 4m");
        assert_eq!(format_duration(Duration::from_millis(999)), "0s");
    }

    #[tokio::test]
    async fn removes_empty_chain_but_keeps_stop() {
        let root = tempfile::tempdir().unwrap();
        let deep = root.path().join("a").join("b").join("c");
        std::fs::create_dir_all(&deep).unwrap();

        let removed = remove_empty_dirs(&deep, root.path()).await;
        assert_eq!(removed, 3);
        assert!(root.path().exists());
        assert!(!root.path().join("a").exists());
    }

    #[tokio::test]
    async fn stops_at_non_empty_directory() {
        let root = tempfile::tempdir().unwrap();
        let deep = root.path().join("a").join("b");
        std::fs::create_dir_all(&deep).unwrap();
        std::fs::write(root.path().join("a").join("keep.txt"), b"x").unwrap();

        let removed = remove_empty_dirs(&deep, root.path()).await;
        assert_eq!(removed, 1);
        assert!(root.path().join("a").exists());
    }

    #[cfg(unix)]
    #[test]
    fn terminating_missing_process_reports_false() {
        // Above the kernel's pid_max ceiling
        assert!(!terminate_process(999_999_999));
        // Does not fit a pid_t
        assert!(!terminate_process(u32::MAX));
    }
}
