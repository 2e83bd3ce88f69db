use crate::error::{Result, WeaveError};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Read the whole source file.
pub fn read_source(path: &Path) -> Result<String> {
	std::fs::read_to_string(path).map_err(|source| WeaveError::ResourceUnavailable {
		path: path.to_path_buf(),
		source,
	})
}

/// Replace the file at `path` with `contents`.
///
/// The new text goes to a temporary file next to the target, which is then
/// renamed over it, so the original is never left truncated. The original's
/// permissions carry over.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
	let write_failure = |source: std::io::Error| WeaveError::WriteFailure {
		path: path.to_path_buf(),
		source,
	};

	let dir = match path.parent() {
		Some(parent) if !parent.as_os_str().is_empty() => parent,
		_ => Path::new("."),
	};

	let mut temp = NamedTempFile::new_in(dir).map_err(write_failure)?;
	temp.write_all(contents.as_bytes()).map_err(write_failure)?;
	temp.as_file().sync_all().map_err(write_failure)?;

	if let Ok(metadata) = std::fs::metadata(path) {
		std::fs::set_permissions(temp.path(), metadata.permissions()).map_err(write_failure)?;
	}

	temp.persist(path).map_err(|e| write_failure(e.error))?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_read_missing_file() {
		let temp_dir = tempfile::tempdir().unwrap();
		let path = temp_dir.path().join("missing.go");
		match read_source(&path).unwrap_err() {
			WeaveError::ResourceUnavailable { path: reported, .. } => assert_eq!(reported, path),
			other => panic!("Expected ResourceUnavailable, got {other:?}"),
		}
	}

	#[test]
	fn test_write_atomic_replaces_contents() {
		let temp_dir = tempfile::tempdir().unwrap();
		let path = temp_dir.path().join("send.go");
		std::fs::write(&path, "old contents that are longer").unwrap();

		write_atomic(&path, "new").unwrap();

		assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
		let leftovers = std::fs::read_dir(temp_dir.path()).unwrap().count();
		assert_eq!(leftovers, 1);
	}

	#[cfg(unix)]
	#[test]
	fn test_write_atomic_keeps_permissions() {
		use std::os::unix::fs::PermissionsExt;

		let temp_dir = tempfile::tempdir().unwrap();
		let path = temp_dir.path().join("run.sh");
		std::fs::write(&path, "echo old").unwrap();
		std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

		write_atomic(&path, "echo new").unwrap();

		let mode = std::fs::metadata(&path).unwrap().permissions().mode();
		assert_eq!(mode & 0o777, 0o755);
	}

	#[test]
	fn test_write_into_missing_directory_fails() {
		let temp_dir = tempfile::tempdir().unwrap();
		let path = temp_dir.path().join("nope/send.go");
		assert!(matches!(
			write_atomic(&path, "x"),
			Err(WeaveError::WriteFailure { .. })
		));
	}
}
