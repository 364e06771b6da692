use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Digest used wherever "no content" must still be represented by a checksum.
pub const GENESIS_CHECKSUM: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Hex-encoded SHA-256 of an in-memory buffer.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Hex-encoded SHA-256 of a file, streamed so large targets are not loaded
/// into memory.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 8192];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(buffer.get(..read).unwrap_or_default());
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_digest_matches_buffer_digest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello laneguard").unwrap();
        file.flush().unwrap();

        assert_eq!(
            sha256_file(file.path()).unwrap(),
            sha256_hex(b"hello laneguard")
        );
    }

    #[test]
    fn empty_digest_is_not_genesis() {
        assert_ne!(sha256_hex(b""), GENESIS_CHECKSUM);
        assert_eq!(GENESIS_CHECKSUM.len(), 64);
    }
}
