// OCTA file header.
//
// Forty bytes: the "OCTA" magic followed by nine little-endian i32 fields.
// The header is read in two steps so that a file from the wrong format or
// version is rejected before anything past the seventh field is touched.

use std::io::{self, Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use super::error::{FormatError, Result};
use super::stream::LE;

// ---------------------------------------------------------------------------
// Magic and version
// ---------------------------------------------------------------------------

pub const OCTA_MAGIC: [u8; 4] = *b"OCTA";

/// Oldest map version this crate reads.
pub const MIN_VERSION: i32 = 33;
/// Version written by this crate, and the newest it reads.
pub const MAP_VERSION: i32 = 33;

/// Size of the serialized header in bytes.
pub const HEADER_SIZE: usize = 40;
/// Bytes validated before the rest of the header is read.
const HEADER_PREFIX: usize = 28;

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: i32,
    pub header_size: i32,
    pub world_size: i32,
    pub num_ents: i32,
    pub num_pvs: i32,
    pub lightmaps: i32,
    pub blendmap: i32,
    pub num_vars: i32,
    pub num_vslots: i32,
}

impl Header {
    /// A current-version header for a world of the given size with all
    /// counts zero.
    pub fn new(world_size: i32) -> Self {
        Self {
            version: MAP_VERSION,
            header_size: HEADER_SIZE as i32,
            world_size,
            num_ents: 0,
            num_pvs: 0,
            lightmaps: 0,
            blendmap: 0,
            num_vars: 0,
            num_vslots: 0,
        }
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&OCTA_MAGIC)?;
        for v in [
            self.version,
            self.header_size,
            self.world_size,
            self.num_ents,
            self.num_pvs,
            self.lightmaps,
            self.blendmap,
            self.num_vars,
            self.num_vslots,
        ] {
            w.write_i32::<LE>(v)?;
        }
        Ok(())
    }

    /// Decode and validate a header.
    ///
    /// Magic, world size and entity count are checked before the version,
    /// and both before the last three fields are read.
    pub fn decode<R: Read>(r: &mut R) -> Result<Self> {
        let mut prefix = [0u8; HEADER_PREFIX];
        r.read_exact(&mut prefix).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                FormatError::MalformedHeader("header is shorter than 28 bytes".into())
            }
            _ => FormatError::from(e),
        })?;

        if prefix[..4] != OCTA_MAGIC {
            return Err(FormatError::MalformedHeader(format!(
                "bad magic {:02X?}",
                &prefix[..4]
            )));
        }
        let mut ints = [0i32; 6];
        (&prefix[4..]).read_i32_into::<LE>(&mut ints)?;
        let [version, header_size, world_size, num_ents, num_pvs, lightmaps] = ints;

        if world_size <= 0 {
            return Err(FormatError::MalformedHeader(format!(
                "world size {world_size} is not positive"
            )));
        }
        if world_size.count_ones() != 1 {
            return Err(FormatError::MalformedHeader(format!(
                "world size {world_size} is not a power of two"
            )));
        }
        if num_ents < 0 {
            return Err(FormatError::MalformedHeader(format!(
                "negative entity count {num_ents}"
            )));
        }
        if !(MIN_VERSION..=MAP_VERSION).contains(&version) {
            return Err(FormatError::UnsupportedVersion {
                version,
                min: MIN_VERSION,
                max: MAP_VERSION,
            });
        }

        let mut rest = [0i32; 3];
        r.read_i32_into::<LE>(&mut rest).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                FormatError::MalformedHeader("header is shorter than 40 bytes".into())
            }
            _ => FormatError::from(e),
        })?;
        let [blendmap, num_vars, num_vslots] = rest;

        Ok(Self {
            version,
            header_size,
            world_size,
            num_ents,
            num_pvs,
            lightmaps,
            blendmap,
            num_vars,
            num_vslots,
        })
    }

    /// Smallest `s` with `1 << s >= world_size`.
    pub fn map_scale(&self) -> u32 {
        crate::world::map_scale(self.world_size)
    }
}
