use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Part size used by multipart uploads whose checksums we must reproduce.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Initial buffer for streamed reads; grows towards `chunk_size` on demand.
const READ_BUF: usize = 64 * 1024;

/// Checksum of zero-length content as an object store reports it.
pub const EMPTY_FINGERPRINT: &str = "\"d41d8cd98f00b204e9800998ecf8427e\"";

/// Quoted content checksum, `"<md5hex>"` for one chunk or
/// `"<md5hex>-<parts>"` for multi-chunk content.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn empty() -> Self {
        Fingerprint(EMPTY_FINGERPRINT.to_string())
    }

    /// Number of chunks encoded in the fingerprint (1 for the single-chunk form).
    pub fn parts(&self) -> usize {
        self.0
            .trim_matches('"')
            .rsplit_once('-')
            .and_then(|(_, n)| n.parse().ok())
            .unwrap_or(1)
    }

    fn from_digests(digests: &[md5::Digest]) -> Option<Self> {
        match digests {
            [] => None,
            [one] => Some(Fingerprint(format!("\"{:x}\"", one))),
            many => {
                let mut ctx = md5::Context::new();
                for d in many {
                    ctx.consume(d.0);
                }
                Some(Fingerprint(format!("\"{:x}-{}\"", ctx.compute(), many.len())))
            }
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for Fingerprint {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<String> for Fingerprint {
    fn eq(&self, other: &String) -> bool {
        &self.0 == other
    }
}

/// Fingerprint a stream. Returns `None` when the stream is empty.
pub fn fingerprint_reader<R: Read>(
    mut reader: R,
    chunk_size: usize,
) -> io::Result<Option<Fingerprint>> {
    assert!(chunk_size > 0, "chunk size must be positive");
    let mut digests = Vec::new();
    let mut buf = Vec::with_capacity(chunk_size.min(READ_BUF));
    loop {
        buf.clear();
        // A short read must not end a chunk early, so fill up to chunk_size.
        let n = (&mut reader).take(chunk_size as u64).read_to_end(&mut buf)?;
        if n == 0 {
            break;
        }
        digests.push(md5::compute(&buf));
        if n < chunk_size {
            break;
        }
    }
    Ok(Fingerprint::from_digests(&digests))
}

pub fn fingerprint_bytes(data: &[u8], chunk_size: usize) -> Option<Fingerprint> {
    assert!(chunk_size > 0, "chunk size must be positive");
    let digests: Vec<md5::Digest> = data.chunks(chunk_size).map(md5::compute).collect();
    Fingerprint::from_digests(&digests)
}

pub fn fingerprint_file(path: &Path, chunk_size: usize) -> io::Result<Option<Fingerprint>> {
    let f = File::open(path)?;
    fingerprint_reader(io::BufReader::new(f), chunk_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_chunk_is_plain_md5() {
        let fp = fingerprint_bytes(b"hello", DEFAULT_CHUNK_SIZE).unwrap();
        assert_eq!(fp.as_str(), "\"5d41402abc4b2a76b9719d911017c592\"");
        assert_eq!(fp.parts(), 1);
    }

    #[test]
    fn empty_input_has_no_fingerprint() {
        assert!(fingerprint_bytes(b"", 4).is_none());
        assert!(fingerprint_reader(&b""[..], 4).unwrap().is_none());
    }

    #[test]
    fn multi_chunk_hashes_raw_digests() {
        let fp = fingerprint_bytes(b"abcdefgh", 4).unwrap();
        let mut cat = Vec::new();
        cat.extend_from_slice(&md5::compute(b"abcd").0);
        cat.extend_from_slice(&md5::compute(b"efgh").0);
        assert_eq!(fp.as_str(), format!("\"{:x}-2\"", md5::compute(&cat)));
        assert_eq!(fp.parts(), 2);
    }

    #[test]
    fn empty_constant_matches_md5_of_nothing() {
        assert_eq!(EMPTY_FINGERPRINT, format!("\"{:x}\"", md5::compute(b"")));
    }
}
