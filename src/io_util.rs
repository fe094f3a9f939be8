//! Small shared I/O helper used by VOL, DEN, and SPL.

use std::io::{Read, Result};

/// Reads until `buf` is full or the reader hits EOF, looping over short reads. Only a genuine
/// EOF produces a return value less than `buf.len()`, which every caller in this crate relies on
/// to distinguish "final block" from "the OS felt like returning a partial read".
pub fn read_block(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
