// Map encoder: writes a `World` as an uncompressed OCTA stream.
//
// Sections go out in file order: header, variables, game identity block,
// texture MRU, entities, VSlots, octree, then the optional PVS and
// blend-map blocks. Gzip framing and backups live in `crate::io`.

use std::io::Write;

use log::debug;

use super::collab::{AuxBlocks, FpsGame, GameIdentity, NoAuxBlocks};
use super::progress::{NoProgress, ProgressReporter};
use super::{Collaborators, MapError, Stage, at};
use crate::format::entity::{self, GameBlock};
use crate::format::octree::{self, OctreeWriter};
use crate::format::{Header, vars, vslot};
use crate::world::{EntityKind, World};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// What happens to an existing map file before it is overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackupPolicy {
    /// Overwrite in place.
    None,
    /// Rename to `<map>.BAK`, replacing any older backup.
    Single,
    /// Rename to `<map>_<millis>.BAK`.
    #[default]
    Timestamped,
}

/// Configuration for saving a map.
#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Omit editor-only data: merge masks, surfaces and the PVS. Empty
    /// entities are kept.
    pub bare: bool,
    pub backup: BackupPolicy,
    /// Gzip level (0-9).
    pub compression_level: u32,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            bare: false,
            backup: BackupPolicy::default(),
            compression_level: 9,
        }
    }
}

/// Counts of what a save wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeStats {
    pub num_ents: usize,
    pub num_vars: usize,
    pub num_vslots: usize,
    /// Octant groups written, the root group included.
    pub octree_groups: u64,
    pub wrote_pvs: bool,
    pub wrote_blend_map: bool,
}

// ---------------------------------------------------------------------------
// MapEncoder
// ---------------------------------------------------------------------------

/// Writes one map to `W`.
pub struct MapEncoder<'c, W: Write> {
    w: W,
    bare: bool,
    stage: Stage,
    game: &'c dyn GameIdentity,
    aux: &'c mut dyn AuxBlocks,
    progress: &'c mut dyn ProgressReporter,
}

impl<'c, W: Write> MapEncoder<'c, W> {
    pub fn new(w: W, bare: bool, ctx: Collaborators<'c>) -> Self {
        Self {
            w,
            bare,
            stage: Stage::Idle,
            game: ctx.game,
            aux: ctx.aux,
            progress: ctx.progress,
        }
    }

    /// Stage reached so far. `Closed` after a successful `encode`.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Header for `world` under the current options and collaborators.
    pub fn header_for(&self, world: &World) -> Header {
        let num_ents = world
            .entities
            .iter()
            .filter(|e| self.bare || e.kind != EntityKind::EMPTY)
            .count();
        Header {
            num_ents: num_ents as i32,
            num_pvs: if self.bare { 0 } else { self.aux.view_cells() },
            blendmap: self.aux.blend_map(),
            num_vars: world.vars.len() as i32,
            num_vslots: world.vslots.len() as i32,
            ..Header::new(world.world_size)
        }
    }

    /// Write the whole map.
    pub fn encode(&mut self, world: &World) -> Result<EncodeStats, MapError> {
        self.aux.begin_save(self.bare);
        self.progress.report(0.0, "saving map...");

        self.stage = Stage::Header;
        let hdr = self.header_for(world);
        hdr.encode(&mut self.w).map_err(at(self.stage))?;

        self.stage = Stage::Variables;
        vars::encode_vars(&mut self.w, &world.vars).map_err(at(self.stage))?;

        self.stage = Stage::Entities;
        let extra_size = self.game.extra_entity_size();
        let block = GameBlock {
            ident: self.game.ident().to_string(),
            extra_entity_size: u16::try_from(extra_size).unwrap_or(u16::MAX),
            game_data: world.game_data.clone(),
        };
        block.encode(&mut self.w).map_err(at(self.stage))?;
        entity::encode_texmru(&mut self.w, &world.texmru).map_err(at(self.stage))?;
        let extra_size = usize::from(block.extra_entity_size);
        for e in &world.entities {
            if self.bare || e.kind != EntityKind::EMPTY {
                entity::encode_entity(&mut self.w, e, extra_size).map_err(at(self.stage))?;
            }
        }

        self.stage = Stage::VSlots;
        vslot::encode_vslots(&mut self.w, &world.vslots, world.vslots.len())
            .map_err(at(self.stage))?;

        self.stage = Stage::Octree;
        self.progress.report(0.0, "saving octree...");
        let total = octree::group_count(&world.root) as f32;
        let octree_groups = {
            let progress = &mut *self.progress;
            let mut tick = |n: u64| progress.report(n as f32 / total, "saving octree...");
            let mut writer = OctreeWriter::new(&mut self.w, self.bare, &mut tick);
            writer
                .write_children(&world.root)
                .map_err(|e| MapError::new(Stage::Octree, e))?;
            writer.groups()
        };

        self.stage = Stage::OptionalBlocks;
        let wrote_pvs = hdr.num_pvs > 0;
        if wrote_pvs {
            self.progress.report(0.0, "saving pvs...");
            self.aux.write_pvs(&mut self.w).map_err(at(self.stage))?;
        }
        let wrote_blend_map = hdr.blendmap != 0;
        if wrote_blend_map {
            self.progress.report(0.0, "saving blendmap...");
            self.aux.write_blend_map(&mut self.w).map_err(at(self.stage))?;
        }
        self.w.flush().map_err(at(self.stage))?;

        self.stage = Stage::Closed;
        debug!(
            "encoded map: {} ents, {} vars, {} vslots, {octree_groups} octree groups",
            hdr.num_ents, hdr.num_vars, hdr.num_vslots
        );
        Ok(EncodeStats {
            num_ents: hdr.num_ents as usize,
            num_vars: world.vars.len(),
            num_vslots: world.vslots.len(),
            octree_groups,
            wrote_pvs,
            wrote_blend_map,
        })
    }

    /// Return the underlying writer.
    pub fn finish(self) -> W {
        self.w
    }
}

// ---------------------------------------------------------------------------
// Convenience function
// ---------------------------------------------------------------------------

/// Encode `world` to memory with the stock game and no auxiliary blocks.
pub fn encode_all(world: &World, bare: bool) -> Result<Vec<u8>, MapError> {
    let mut aux = NoAuxBlocks;
    let mut progress = NoProgress;
    let ctx = Collaborators::new(&FpsGame, &mut aux, &mut progress);
    let mut enc = MapEncoder::new(Vec::new(), bare, ctx);
    enc.encode(world)?;
    Ok(enc.finish())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
