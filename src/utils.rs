//! Small filesystem and logging helpers.

use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are cut at `max` bytes with an ellipsis and byte count
/// appended. Used for body-text previews in debug logs.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
    }
}

/// Ensure the directory holding `sink_path` exists and is writable.
///
/// Creates the parent directory if needed, then performs a write test by
/// creating and immediately deleting a probe file. Run before starting a
/// crawl so a permissions problem surfaces up front rather than at the
/// first flush.
#[instrument(level = "info", skip_all, fields(sink = %sink_path))]
pub async fn ensure_sink_writable(sink_path: &str) -> Result<(), Box<dyn Error>> {
    let parent = Path::new(sink_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| Path::new(".").to_path_buf());

    if let Err(e) = fs::create_dir_all(&parent).await {
        return Err(Box::new(e));
    }
    // Small sync write probe (simpler error surface).
    let probe_path = parent.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("sink directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
