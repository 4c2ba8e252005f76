//! Deflate/ZIP decompression

use std::io::Read;
use flate2::read::ZlibDecoder;
use crate::error::{Error, Result};

/// Decompresses a zlib-wrapped Deflate chunk
pub fn decompress(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decompressed = Vec::with_capacity(expected_len);
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| Error::InvalidFormat(format!("Deflate chunk: {}", e)))?;
    Ok(decompressed)
}
