//! PackBits decompression
//!
//! Run-length scheme: a signed header byte `n` is followed by `n + 1`
//! literal bytes when `n >= 0`, or by one byte repeated `1 - n` times when
//! `-127 <= n <= -1`; `-128` is a no-op.

use crate::error::{Error, Result};

/// Decompresses a PackBits chunk
pub fn decompress(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(expected_len);
    let mut input = data.iter().copied();

    while let Some(header) = input.next() {
        let header = header as i8;
        if header == -128 {
            continue;
        }

        if header >= 0 {
            let count = header as usize + 1;
            let before = output.len();
            output.extend(input.by_ref().take(count));
            if output.len() - before != count {
                return Err(Error::InvalidFormat("PackBits: truncated literal run".to_string()));
            }
        } else {
            let byte = input
                .next()
                .ok_or_else(|| Error::InvalidFormat("PackBits: missing repeat byte".to_string()))?;
            let count = (1 - header as isize) as usize;
            output.resize(output.len() + count, byte);
        }

        // Some writers pad chunks past the decoded size.
        if output.len() >= expected_len && expected_len > 0 {
            output.truncate(expected_len);
            break;
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_runs() {
        let data = vec![1, 0x41, 0x42, (-2i8) as u8, 0x55, (-128i8) as u8, 0, 0x43];
        let result = decompress(&data, 6).unwrap();
        assert_eq!(result, vec![0x41, 0x42, 0x55, 0x55, 0x55, 0x43]);
    }

    #[test]
    fn test_stops_at_expected_length() {
        let data = vec![(-3i8) as u8, 0xAA, 0, 0xBB];
        assert_eq!(decompress(&data, 4).unwrap(), vec![0xAA; 4]);
    }

    #[test]
    fn test_truncated_input() {
        assert!(decompress(&[3, 0x41], 4).is_err());
        assert!(decompress(&[(-3i8) as u8], 4).is_err());
    }
}
