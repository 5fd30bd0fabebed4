//! File existence checks and cleanup.

use crate::errors::PipelineError;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::Path;

/// Fails with [`PipelineError::FileNotFound`] when `path` does not exist.
pub fn file_exists_check(path: &Path, message: &str) -> Result<(), PipelineError> {
    if path.exists() {
        Ok(())
    } else {
        Err(PipelineError::file_not_found(message, path))
    }
}

/// Removes a file if it exists. A missing file is not an error.
pub fn delete_file(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Hex-encoded SHA-256 of a file's contents.
pub fn file_sha256(path: &Path) -> Result<String, PipelineError> {
    let bytes = std::fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_exists_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("present.txt");
        std::fs::write(&path, "x").unwrap();

        assert!(file_exists_check(&path, "File Not Found").is_ok());

        let missing = dir.path().join("missing.txt");
        let err = file_exists_check(&missing, "File Not Found").unwrap_err();
        assert!(matches!(err, PipelineError::FileNotFound { .. }));
        assert!(err.to_string().starts_with("File Not Found - "));
    }

    #[test]
    fn test_delete_file_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.txt");
        std::fs::write(&path, "x").unwrap();

        delete_file(&path).unwrap();
        assert!(!path.exists());
        delete_file(&path).unwrap();
    }

    #[test]
    fn test_file_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        std::fs::write(&path, "abc").unwrap();

        assert_eq!(
            file_sha256(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(file_sha256(&dir.path().join("missing")).is_err());
    }
}
