//! LZW decompression
//!
//! TIFF flavour of LZW: codes are packed most significant bit first, start at
//! 9 bits and widen one code early (when the next free code reaches
//! `2^width - 1`), up to 12 bits.

use crate::error::{Error, Result};

const CLEAR: u16 = 256;
const EOI: u16 = 257;
const FIRST_CODE: usize = 258;
const MAX_CODES: usize = 4096;
const MIN_WIDTH: u32 = 9;
const MAX_WIDTH: u32 = 12;

/// Decompresses an LZW chunk.
///
/// Decoding stops at the end-of-information code, at the end of input, or
/// once `expected_len` bytes have been produced.
pub fn decompress(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut output: Vec<u8> = Vec::with_capacity(expected_len);
    // Every string in the table already occurs in the output, so entries are
    // stored as (offset, len) spans into it.
    let mut table: Vec<(usize, usize)> = Vec::with_capacity(MAX_CODES - FIRST_CODE);
    let mut bits = BitReader::new(data);
    let mut width = MIN_WIDTH;
    let mut previous: Option<(usize, usize)> = None;

    while let Some(code) = bits.read(width) {
        if code == EOI {
            break;
        }
        if code == CLEAR {
            table.clear();
            width = MIN_WIDTH;
            previous = None;
            continue;
        }

        let start = output.len();
        let next_code = FIRST_CODE + table.len();
        let code = code as usize;

        let len = if code < CLEAR as usize {
            output.push(code as u8);
            1
        } else if code < next_code {
            let (off, len) = table[code - FIRST_CODE];
            output.extend_from_within(off..off + len);
            len
        } else if code == next_code {
            let (off, len) = previous.ok_or_else(|| {
                Error::InvalidFormat(format!("LZW: code {} before any string", code))
            })?;
            output.extend_from_within(off..off + len);
            let first = output[off];
            output.push(first);
            len + 1
        } else {
            return Err(Error::InvalidFormat(format!("LZW: invalid code {}", code)));
        };

        if let Some((off, prev_len)) = previous {
            if next_code < MAX_CODES {
                table.push((off, prev_len + 1));
            }
            if FIRST_CODE + table.len() >= (1 << width) - 1 && width < MAX_WIDTH {
                width += 1;
            }
        }
        previous = Some((start, len));

        if expected_len > 0 && output.len() >= expected_len {
            output.truncate(expected_len);
            break;
        }
    }

    Ok(output)
}

/// Reads variable-width codes, most significant bit first
struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    acc: u32,
    nbits: u32,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, acc: 0, nbits: 0 }
    }

    fn read(&mut self, width: u32) -> Option<u16> {
        while self.nbits < width {
            let byte = *self.data.get(self.pos)?;
            self.pos += 1;
            self.acc = (self.acc << 8) | byte as u32;
            self.nbits += 8;
        }
        self.nbits -= width;
        Some(((self.acc >> self.nbits) & ((1 << width) - 1)) as u16)
    }
}
