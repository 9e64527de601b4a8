/// File identity hashing: short, stable cache keys for absolute paths.
use std::path::Path;

use sha2::{Digest as _, Sha256};

use crate::types::FileHash;

/// Number of hex characters kept from the digest.
const FILE_HASH_LEN: usize = 8;

/// Compute the `FileHash` of an absolute path.
///
/// The path's UTF-8 text (lossy on non-UTF-8 platforms) is SHA-256 hashed and
/// the first eight hex characters are kept. Callers normalize the path first;
/// the hash is purely textual.
pub fn hash_path(path: &Path) -> FileHash {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    let hex = format!("{digest:x}");
    let short: String = hex.chars().take(FILE_HASH_LEN).collect();
    return FileHash(short);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_eight_lowercase_hex_chars() {
        let hash = hash_path(Path::new("/path/to/file.yaml"));
        assert_eq!(hash.0.len(), 8);
        assert!(hash.0.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn same_path_same_hash() {
        let a = hash_path(Path::new("/specs/petstore.yaml"));
        let b = hash_path(Path::new("/specs/petstore.yaml"));
        assert_eq!(a, b);
    }

    #[test]
    fn different_paths_differ() {
        let a = hash_path(Path::new("/specs/a.yaml"));
        let b = hash_path(Path::new("/specs/b.yaml"));
        let c = hash_path(Path::new("/other/a.yaml"));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }
}
