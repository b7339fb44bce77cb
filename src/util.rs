//! Internal utilities.

use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{Result, ZoneError};

/// Replaces `path` with whatever `render` writes, atomically.
///
/// The contents go to a temporary file in the same directory (so the final
/// rename stays on one filesystem), which takes over the permissions of the
/// existing file, is synced, and is then renamed over `path`. On any error
/// the temporary file is removed and `path` is left as it was.
///
/// # Errors
///
/// Returns [`ZoneError::Write`] for I/O failures, or whatever `render`
/// returns if it fails for another reason.
pub fn replace_file<F>(path: &Path, render: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let write_err = |source: std::io::Error| ZoneError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    if let Ok(meta) = std::fs::metadata(path) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .map_err(write_err)?;
    }

    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        render(&mut out).map_err(|e| match e {
            ZoneError::Io(source) => write_err(source),
            other => other,
        })?;
        out.flush().map_err(write_err)?;
    }
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.example");
        std::fs::write(&path, "old\n").unwrap();

        replace_file(&path, |out| {
            writeln!(out, "new")?;
            Ok(())
        })
        .unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new\n");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn failed_render_leaves_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.example");
        std::fs::write(&path, "old\n").unwrap();

        let err = replace_file(&path, |out| {
            writeln!(out, "partial")?;
            Err(ZoneError::TypeMismatch {
                context: "boom".into(),
            })
        })
        .unwrap_err();

        assert!(err.is_type_mismatch());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old\n");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.example");
        std::fs::write(&path, "old\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        replace_file(&path, |_| Ok(())).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn missing_directory_is_write_error() {
        let err = replace_file(Path::new("/nonexistent/dir/db.example"), |_| Ok(())).unwrap_err();
        assert!(matches!(err, ZoneError::Write { .. }), "{err}");
    }
}
