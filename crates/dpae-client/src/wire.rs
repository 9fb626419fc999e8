//! Wire encoding of the declaration: ISO-8859-1 bytes, gzip-compressed.

use std::io::Write;

use dpae_core::{encode_latin1, DpaeError};
use flate2::write::GzEncoder;
use flate2::Compression;

/// Encode a rendered declaration for the submission endpoint.
pub fn encode_payload(document: &str) -> Result<Vec<u8>, DpaeError> {
    let latin1 = encode_latin1(document)?;
    let mut encoder = GzEncoder::new(Vec::with_capacity(latin1.len() / 3), Compression::default());
    encoder.write_all(&latin1).map_err(DpaeError::Compression)?;
    encoder.finish().map_err(DpaeError::Compression)
}
