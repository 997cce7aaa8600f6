//! Crash-safe file writes: temp file, fsync, rename

use std::io::{self, Write};
use std::path::Path;

/// Write `bytes` to `target` atomically
///
/// The temp file lives next to the target so the rename never crosses a
/// filesystem boundary. Parent directories are created as needed.
///
/// # Errors
/// IO errors from any step; the temp file is removed on failure
pub fn write_atomic(target: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let name = target
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("artc");
    let temp = dir.join(format!(".{name}.{}.tmp", std::process::id()));

    let result = (|| {
        let mut file = std::fs::File::create(&temp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        std::fs::rename(&temp, target)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&temp);
    }
    result
}

/// Serialize `value` as pretty JSON and write it atomically
///
/// # Errors
/// Serialization or IO errors
pub fn write_json_atomic<T: serde::Serialize>(target: &Path, value: &T) -> io::Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    write_atomic(target, &json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_content_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/state.json");

        write_atomic(&target, b"one").unwrap();
        write_atomic(&target, b"two").unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"two");
        let leftovers: Vec<_> = std::fs::read_dir(target.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
