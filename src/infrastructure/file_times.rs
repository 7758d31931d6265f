//! Modification-time helpers. Several policies (index TTL, lock staleness,
//! legacy retention, archive naming) are driven by file mtimes.

use std::fs::File;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

pub fn modified_time(path: &Path) -> io::Result<SystemTime> {
    std::fs::metadata(path)?.modified()
}

pub fn set_modified_time(path: &Path, time: SystemTime) -> io::Result<()> {
    File::options().write(true).open(path)?.set_modified(time)
}

/// Age relative to `now`; an mtime in the future counts as age zero
pub fn age_at(path: &Path, now: SystemTime) -> io::Result<Duration> {
    let modified = modified_time(path)?;
    Ok(now.duration_since(modified).unwrap_or(Duration::ZERO))
}
