//! Streaming SHA-256 over any byte source
//!
//! Plain files and zip entries both go through [`digest`], so it only relies
//! on `std::io::Read` and never on filesystem details.

use sha2::{Digest, Sha256};
use std::io::{self, Read};

/// Bytes pulled from the source per read call
pub const CHUNK_SIZE: usize = 8192;

/// Byte count and lowercase hex SHA-256 of a fully consumed stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    pub size: u64,
    pub sha256: String,
}

/// Read `source` until EOF, hashing as it goes
///
/// Read errors are returned untouched; callers attach the path they were
/// reading from.
pub fn digest<R: Read + ?Sized>(source: &mut R) -> io::Result<Checksum> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; CHUNK_SIZE];
    let mut size: u64 = 0;

    loop {
        let bytes_read = match source.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        hasher.update(&buffer[..bytes_read]);
        size += bytes_read as u64;
    }

    Ok(Checksum {
        size,
        sha256: format!("{:x}", hasher.finalize()),
    })
}
