// Little-endian primitives shared by every section codec.
//
// Plain integers and floats go through byteorder's extension traits; this
// module adds the length-prefixed strings and the skip helpers the map
// format needs.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::error::{FormatError, Result};

/// Longest string the engine keeps, terminator included. Longer strings are
/// cut to `MAX_STRLEN - 1` bytes and the excess is consumed.
pub const MAX_STRLEN: usize = 260;

pub type LE = LittleEndian;

/// Read `len` bytes, keeping at most `MAX_STRLEN - 1` of them.
pub fn read_truncated<R: Read>(r: &mut R, len: usize) -> Result<String> {
    let keep = len.min(MAX_STRLEN - 1);
    let mut buf = vec![0u8; keep];
    r.read_exact(&mut buf)?;
    if len > keep {
        skip(r, (len - keep) as u64)?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// `u16` length followed by that many bytes, truncated as above.
pub fn read_str16<R: Read>(r: &mut R) -> Result<String> {
    let len = r.read_u16::<LE>()?;
    read_truncated(r, usize::from(len))
}

pub fn write_str16<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    let bytes = s.as_bytes();
    let len = u16::try_from(bytes.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("string of {} bytes does not fit a u16 length", bytes.len()),
        )
    })?;
    w.write_u16::<LE>(len)?;
    w.write_all(bytes)
}

/// Read exactly `len` bytes.
pub fn read_bytes<R: Read>(r: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// Consume and discard `n` bytes. Running out of input is a truncation.
pub fn skip<R: Read>(r: &mut R, n: u64) -> Result<()> {
    let copied = io::copy(&mut r.take(n), &mut io::sink())?;
    if copied < n {
        return Err(FormatError::TruncatedStream);
    }
    Ok(())
}

/// Consume everything that is left, returning the byte count.
pub fn drain<R: Read>(r: &mut R) -> Result<u64> {
    Ok(io::copy(r, &mut io::sink())?)
}

pub fn read_f32_array<R: Read, const N: usize>(r: &mut R) -> Result<[f32; N]> {
    let mut out = [0f32; N];
    r.read_f32_into::<LE>(&mut out)?;
    Ok(out)
}

pub fn write_f32s<W: Write>(w: &mut W, vals: &[f32]) -> io::Result<()> {
    vals.iter().try_for_each(|&v| w.write_f32::<LE>(v))
}
