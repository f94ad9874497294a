use std::cmp::Ordering;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use docqa_core::DocqaError;
use tracing::{debug, warn};

/// Maximum size of a text file to load (1 MB).
const MAX_FILE_SIZE: u64 = 1_048_576;

/// Maximum size of a PDF to load (50 MB).
#[cfg(feature = "pdf")]
const MAX_PDF_SIZE: u64 = 50 * 1024 * 1024;

/// Number of bytes to check for binary detection.
const BINARY_CHECK_SIZE: usize = 8192;

/// A text document loaded from the data directory.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use docqa_index::walker::Document;
///
/// let doc = Document {
///     path: PathBuf::from("notes/todo.md"),
///     content: "- ship it".to_string(),
/// };
/// assert_eq!(doc.path.extension().unwrap(), "md");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Path relative to the data directory.
    pub path: PathBuf,
    /// Full text content.
    pub content: String,
}

pub(crate) fn by_file_name(a: &OsStr, b: &OsStr) -> Ordering {
    a.cmp(b)
}

/// Whether a walk entry is a regular file, or a symlink whose target is one.
///
/// Symlinked directories are reported as `false`: the walk does not descend
/// into them.
pub(crate) fn resolves_to_file(entry: &ignore::DirEntry) -> std::io::Result<bool> {
    match entry.file_type() {
        Some(t) if t.is_file() => Ok(true),
        Some(t) if t.is_symlink() => Ok(std::fs::metadata(entry.path())?.is_file()),
        _ => Ok(false),
    }
}

/// Load every document beneath `root`, in sorted path order.
///
/// Hidden files and directories are skipped, as are binary files, text files
/// larger than 1 MB and files with no non-whitespace content. Invalid UTF-8
/// is decoded lossily. Files with a `.pdf` extension have their text
/// extracted when the `pdf` feature is enabled and are skipped otherwise.
/// Symlinked files are read through; symlinked directories are not entered.
/// Ignore files (`.gitignore` and friends) are not consulted: everything the
/// user put in the folder is a document.
///
/// # Errors
///
/// Returns [`DocqaError::FileNotFound`] if `root` is not a directory.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use docqa_index::walker::load_documents;
///
/// let docs = load_documents(Path::new("data")).unwrap();
/// for d in &docs {
///     println!("{} ({} bytes)", d.path.display(), d.content.len());
/// }
/// ```
pub fn load_documents(root: &Path) -> Result<Vec<Document>, DocqaError> {
    if !root.is_dir() {
        return Err(DocqaError::FileNotFound(root.to_path_buf()));
    }

    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(true)
        .follow_links(false)
        .sort_by_file_name(by_file_name)
        .build();
    let mut documents = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("skipping unreadable entry: {e}");
                continue;
            }
        };

        let path = entry.path();
        match resolves_to_file(&entry) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                warn!(path = %path.display(), "skipping file: {e}");
                continue;
            }
        }

        let loaded = if is_pdf(path) {
            read_pdf(path)
        } else {
            read_text(path)
        };
        let Some(content) = loaded else {
            continue;
        };
        if content.trim().is_empty() {
            continue;
        }

        let relative = match path.strip_prefix(root) {
            Ok(r) => r.to_path_buf(),
            Err(_) => path.to_path_buf(),
        };

        documents.push(Document {
            path: relative,
            content,
        });
    }

    Ok(documents)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

fn read_limited(path: &Path, max_size: u64) -> Option<Vec<u8>> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) => {
            warn!(path = %path.display(), "skipping file: {e}");
            return None;
        }
    };
    if metadata.len() > max_size {
        debug!(path = %path.display(), size = metadata.len(), "skipping large file");
        return None;
    }

    match std::fs::read(path) {
        Ok(b) => Some(b),
        Err(e) => {
            warn!(path = %path.display(), "skipping file: {e}");
            None
        }
    }
}

fn read_text(path: &Path) -> Option<String> {
    let bytes = read_limited(path, MAX_FILE_SIZE)?;

    // Null bytes in the first 8KB mean binary
    let check_len = bytes.len().min(BINARY_CHECK_SIZE);
    if bytes[..check_len].contains(&0) {
        debug!(path = %path.display(), "skipping binary file");
        return None;
    }

    Some(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(feature = "pdf")]
fn read_pdf(path: &Path) -> Option<String> {
    let bytes = read_limited(path, MAX_PDF_SIZE)?;
    match pdf_extract::extract_text_from_mem(&bytes) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(path = %path.display(), "skipping unreadable PDF: {e}");
            None
        }
    }
}

#[cfg(not(feature = "pdf"))]
fn read_pdf(path: &Path) -> Option<String> {
    debug!(path = %path.display(), "skipping PDF, built without the `pdf` feature");
    None
}
