use sha2::{Digest, Sha256};
use uuid::Uuid;

/// SHA-256 of file content, hex-encoded, used by the walker for content-based
/// deduplication against the file-version catalog (spec §4.1).
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Deterministic chunk id: a 128-bit hash of `path:name:line`, formatted as a
/// UUID (spec §4.3.8). Uses the first 16 bytes of the SHA-256 digest as the
/// UUID's bytes so the id is stable across runs for identical inputs.
pub fn chunk_id(path: &str, name: &str, line: u32) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update(b":");
    hasher.update(name.as_bytes());
    hasher.update(b":");
    hasher.update(line.to_le_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_deterministic() {
        let h1 = content_hash(b"fn main() {}");
        let h2 = content_hash(b"fn main() {}");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn content_hash_changes_with_content() {
        let h1 = content_hash(b"a");
        let h2 = content_hash(b"b");
        assert_ne!(h1, h2);
    }

    #[test]
    fn chunk_id_is_deterministic() {
        let a = chunk_id("src/main.rs", "main", 1);
        let b = chunk_id("src/main.rs", "main", 1);
        assert_eq!(a, b);
    }

    #[test]
    fn chunk_id_changes_with_line() {
        let a = chunk_id("src/main.rs", "main", 1);
        let b = chunk_id("src/main.rs", "main", 2);
        assert_ne!(a, b);
    }

    #[test]
    fn chunk_id_changes_with_name_and_path() {
        let base = chunk_id("a.py", "f", 10);
        assert_ne!(base, chunk_id("b.py", "f", 10));
        assert_ne!(base, chunk_id("a.py", "g", 10));
    }
}
