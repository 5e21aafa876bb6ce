// External collaborators of the map codec.
//
// The game decides how entities are tagged and how much extra data each one
// carries. The PVS and blend-map blocks have layouts owned by other
// subsystems; the codec only knows whether they exist and where they sit.

use std::io::{self, Read, Write};

use crate::format::FormatError;
use crate::world::DEFAULT_GAME_IDENT;

// ---------------------------------------------------------------------------
// Game identity
// ---------------------------------------------------------------------------

pub trait GameIdentity {
    /// Identifier written into saved maps and compared on load.
    fn ident(&self) -> &str;

    /// Bytes of game-specific data following each entity record.
    fn extra_entity_size(&self) -> usize;
}

/// The stock first-person game: ident "fps", no extra entity data.
#[derive(Debug, Default, Clone, Copy)]
pub struct FpsGame;

impl GameIdentity for FpsGame {
    fn ident(&self) -> &str {
        DEFAULT_GAME_IDENT
    }

    fn extra_entity_size(&self) -> usize {
        0
    }
}

/// A game described by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedGame {
    pub ident: String,
    pub extra_entity_size: usize,
}

impl NamedGame {
    pub fn new(ident: impl Into<String>, extra_entity_size: usize) -> Self {
        Self {
            ident: ident.into(),
            extra_entity_size,
        }
    }
}

impl GameIdentity for NamedGame {
    fn ident(&self) -> &str {
        &self.ident
    }

    fn extra_entity_size(&self) -> usize {
        self.extra_entity_size
    }
}

// ---------------------------------------------------------------------------
// Auxiliary blocks
// ---------------------------------------------------------------------------

/// Owner of the PVS and blend-map blocks that follow the octree.
pub trait AuxBlocks {
    /// Called once before anything is written.
    fn begin_save(&mut self, _bare: bool) {}

    /// PVS view cells to save; the block is written when positive.
    fn view_cells(&self) -> i32 {
        0
    }

    /// Blend-map header value; the block is written when non-zero.
    fn blend_map(&self) -> i32 {
        0
    }

    fn write_pvs(&mut self, _w: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }

    fn write_blend_map(&mut self, _w: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }

    fn read_pvs(&mut self, _r: &mut dyn Read, _num_pvs: i32) -> Result<(), FormatError> {
        Ok(())
    }

    fn read_blend_map(&mut self, _r: &mut dyn Read, _blendmap: i32) -> Result<(), FormatError> {
        Ok(())
    }
}

/// No PVS and no blend map. Blocks found on load are left to the final
/// drain.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAuxBlocks;

impl AuxBlocks for NoAuxBlocks {}

/// Keeps whatever follows the octree as one opaque tail and writes it back
/// unchanged.
///
/// The PVS and blend-map layouts are not known here, so the two blocks
/// cannot be told apart. A bare save, which omits the PVS, drops the tail
/// entirely when it holds PVS data.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RawAuxBlocks {
    pub view_cells: i32,
    pub blend_map: i32,
    pub tail: Vec<u8>,
    bare: bool,
    tail_written: bool,
}

impl RawAuxBlocks {
    pub fn new(view_cells: i32, blend_map: i32, tail: Vec<u8>) -> Self {
        Self {
            view_cells,
            blend_map,
            tail,
            ..Default::default()
        }
    }

    fn take_rest(&mut self, r: &mut dyn Read) -> Result<(), FormatError> {
        if self.tail.is_empty() {
            r.read_to_end(&mut self.tail)?;
        }
        Ok(())
    }

    fn write_tail(&mut self, w: &mut dyn Write) -> io::Result<()> {
        if !self.tail_written {
            self.tail_written = true;
            w.write_all(&self.tail)?;
        }
        Ok(())
    }
}

impl AuxBlocks for RawAuxBlocks {
    fn begin_save(&mut self, bare: bool) {
        self.bare = bare;
        self.tail_written = false;
    }

    fn view_cells(&self) -> i32 {
        self.view_cells
    }

    fn blend_map(&self) -> i32 {
        if self.bare && self.view_cells > 0 {
            0
        } else {
            self.blend_map
        }
    }

    fn write_pvs(&mut self, w: &mut dyn Write) -> io::Result<()> {
        self.write_tail(w)
    }

    fn write_blend_map(&mut self, w: &mut dyn Write) -> io::Result<()> {
        self.write_tail(w)
    }

    fn read_pvs(&mut self, r: &mut dyn Read, num_pvs: i32) -> Result<(), FormatError> {
        self.view_cells = num_pvs;
        self.take_rest(r)
    }

    fn read_blend_map(&mut self, r: &mut dyn Read, blendmap: i32) -> Result<(), FormatError> {
        self.blend_map = blendmap;
        self.take_rest(r)
    }
}
