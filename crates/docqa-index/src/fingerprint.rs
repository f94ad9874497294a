//! Content fingerprint of the data directory.
//!
//! The fingerprint decides whether a persisted index still matches the
//! documents it was built from. Each file contributes
//! `sha256(bytes ++ decimal_size)`; the directory fingerprint is the SHA-256
//! of all per-file hex digests concatenated in walk order.

use std::path::Path;

use docqa_core::DocqaError;
use sha2::{Digest, Sha256};

use crate::walker::{by_file_name, resolves_to_file};

/// Digest of a single file's content.
///
/// The decimal byte length is appended before hashing, so the result is
/// `sha256(bytes ++ len.to_string())` in lowercase hex.
///
/// # Examples
///
/// ```
/// use docqa_index::fingerprint::file_digest;
///
/// let digest = file_digest(b"hello");
/// assert_eq!(digest.len(), 64);
/// assert_ne!(digest, file_digest(b"hello "));
/// ```
pub fn file_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.update(bytes.len().to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Fingerprint every regular file beneath `data_dir`.
///
/// Nothing is filtered: hidden files and files that the document loader
/// skips still change the fingerprint. Siblings are visited in file-name
/// order so the result does not depend on the filesystem. A symlinked file
/// contributes its target's bytes; symlinked directories are not entered.
/// File names themselves are not hashed.
///
/// # Errors
///
/// Returns [`DocqaError::FileNotFound`] if `data_dir` is not a directory and
/// [`DocqaError::Io`] if a file cannot be read.
///
/// # Examples
///
/// ```
/// use docqa_index::fingerprint::hash_directory_content;
///
/// let dir = tempfile::tempdir().unwrap();
/// let empty = hash_directory_content(dir.path()).unwrap();
/// assert_eq!(empty, "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
/// ```
pub fn hash_directory_content(data_dir: &Path) -> Result<String, DocqaError> {
    if !data_dir.is_dir() {
        return Err(DocqaError::FileNotFound(data_dir.to_path_buf()));
    }

    let walker = ignore::WalkBuilder::new(data_dir)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(by_file_name)
        .build();

    let mut directory_hasher = Sha256::new();

    for entry in walker {
        let entry = entry.map_err(walk_error)?;
        if !resolves_to_file(&entry)? {
            continue;
        }

        let bytes = std::fs::read(entry.path())?;
        directory_hasher.update(file_digest(&bytes).as_bytes());
    }

    Ok(format!("{:x}", directory_hasher.finalize()))
}

fn walk_error(err: ignore::Error) -> DocqaError {
    match err.into_io_error() {
        Some(io) => DocqaError::Io(io),
        None => DocqaError::Io(std::io::Error::other("failed to walk data directory")),
    }
}
