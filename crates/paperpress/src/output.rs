use std::io::Write;
use std::path::Path;

/// Write `bytes` to `path` so that readers only ever see the old file or the
/// complete new one.
///
/// The data goes to a `.part` temp file in the destination directory first
/// and is renamed over `path` once fully written. On any error the temp file
/// is removed when it goes out of scope.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let prefix = path
        .file_name()
        .map(|n| format!(".{}.", n.to_string_lossy()))
        .unwrap_or_else(|| ".paperpress.".to_string());
    let mut tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".part")
        .tempfile_in(dir)?;

    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    log::debug!("wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
