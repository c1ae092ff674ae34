//! Local file records
//!
//! Turns paths given on the command line into [`FileRecord`]s with their
//! MD5 content hash.

use crate::upload::{ContentHash, FileRecord};
use md5::{Digest, Md5};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Streaming MD5 of a file, hex encoded
pub fn md5_file(path: &Path) -> io::Result<ContentHash> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    ContentHash::new(hex::encode(hasher.finalize()))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Build the record for one file destined for `category_id`
pub fn file_record(path: &Path, category_id: u64) -> io::Result<FileRecord> {
    let metadata = fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a regular file", path.display()),
        ));
    }

    Ok(FileRecord {
        path: path.to_path_buf(),
        size: metadata.len(),
        hash: md5_file(path)?,
        category_id,
    })
}

fn extension_allowed(path: &Path, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| allowed.iter().any(|a| *a == ext))
}

/// Expand `paths` into the files to upload.
///
/// Directories contribute their direct children, sorted by name. Files
/// whose extension is not in `allowed_extensions` are left out; an empty
/// list allows everything.
pub fn collect_files(paths: &[PathBuf], allowed_extensions: &[String]) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut entries = fs::read_dir(path)?
                .map(|entry| entry.map(|e| e.path()))
                .collect::<io::Result<Vec<_>>>()?;
            entries.sort();

            for entry in entries.into_iter().filter(|p| p.is_file()) {
                if extension_allowed(&entry, allowed_extensions) {
                    files.push(entry);
                } else {
                    tracing::debug!(path = %entry.display(), "Skipping file with unsupported type");
                }
            }
        } else if extension_allowed(path, allowed_extensions) {
            files.push(path.clone());
        } else {
            tracing::debug!(path = %path.display(), "Skipping file with unsupported type");
        }
    }

    Ok(files)
}
