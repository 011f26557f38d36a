use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};

/// Streams the file through the hasher; memory use does not grow with file size.
pub fn sha256_file(path: &Path) -> io::Result<[u8; 32]> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().into())
}

pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Lowercase hex, 64 chars.
pub fn to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Content identity used for dedup; not a security boundary.
pub fn content_hash(data: &[u8]) -> String {
    to_hex(&sha256_bytes(data))
}

pub fn file_hash(path: &Path) -> io::Result<String> {
    sha256_file(path).map(|h| to_hex(&h))
}

/// Storage file name of a managed file, relative to its account directory.
pub fn stored_name(archive_id: &str, ext: &str) -> PathBuf {
    let ext = ext.trim_start_matches('.');
    if ext.is_empty() {
        PathBuf::from(archive_id)
    } else {
        PathBuf::from(format!("{archive_id}.{ext}"))
    }
}
