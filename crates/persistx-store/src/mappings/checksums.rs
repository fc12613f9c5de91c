//! Mapping resource checksums
//!
//! Line endings are normalised first, so a mapping checked out with CRLF
//! endings matches the checksum recorded from an LF copy.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `content` with `\r\n` folded to `\n`
pub fn compute_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    for (i, line) in content.split("\r\n").enumerate() {
        if i > 0 {
            hasher.update(b"\n");
        }
        hasher.update(line.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_sha256_hex() {
        // sha256("")
        assert_eq!(
            compute_checksum(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(compute_checksum("CREATE TABLE t (id INTEGER PRIMARY KEY)").len(), 64);
    }

    #[test]
    fn test_line_endings_do_not_change_checksum() {
        assert_eq!(
            compute_checksum("CREATE TABLE t (\r\n  id INTEGER\r\n);\r\n"),
            compute_checksum("CREATE TABLE t (\n  id INTEGER\n);\n")
        );
    }

    #[test]
    fn test_checksum_changes_with_content() {
        assert_ne!(compute_checksum("SELECT 1"), compute_checksum("SELECT 2"));
    }
}
