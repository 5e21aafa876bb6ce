// Map decoder: reads an uncompressed OCTA stream back into a `World`.
//
// The stream is wrapped in a `CrcReader` from the first header byte; once
// the last section is processed whatever remains is drained so the CRC
// always covers the full stream. Fatal errors abort with the stage they
// happened in. Recoverable ones land in `LoadReport::warnings`.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::CrcReader;
use log::{debug, error, warn};

use super::collab::{AuxBlocks, FpsGame, GameIdentity, NoAuxBlocks};
use super::progress::{NoProgress, ProgressReporter};
use super::{Collaborators, MapError, Stage, at};
use crate::format::entity::{self, EntityContext, GameBlock, MAX_ENTS};
use crate::format::{FormatError, Header, octree, stream, vars, vslot};
use crate::world::{Entity, World};

/// Side of a legacy lightmap texture.
const LM_PACK_SIZE: u64 = 512;

// ---------------------------------------------------------------------------
// Options and report
// ---------------------------------------------------------------------------

/// Configuration for loading a map.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Entities materialized at most; the rest are consumed and dropped.
    pub max_ents: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { max_ents: MAX_ENTS }
    }
}

/// How much of each section was read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadCounts {
    pub entities: usize,
    /// Game-specific entities of a foreign game.
    pub dropped_entities: usize,
    /// Entities past `LoadOptions::max_ents`.
    pub skipped_entities: usize,
    pub vars: usize,
    pub vslots: usize,
    pub nodes: u64,
}

/// Outcome of a load that did not hit a fatal error.
#[derive(Debug)]
pub struct LoadReport {
    /// The octree was corrupt; the world holds what was read before it.
    pub failed: bool,
    pub warnings: Vec<FormatError>,
    /// CRC-32 of the whole uncompressed stream.
    pub crc: u32,
    pub map_version: i32,
    pub map_size: i32,
    pub map_scale: u32,
    pub counts: LoadCounts,
    /// Game that wrote the file.
    pub game_ident: String,
    /// Per-entity extra bytes declared by that game.
    pub entity_extra_size: u16,
}

#[derive(Debug)]
pub struct LoadedWorld {
    pub world: World,
    pub report: LoadReport,
}

// ---------------------------------------------------------------------------
// MapDecoder
// ---------------------------------------------------------------------------

/// Reads one map from `R`.
pub struct MapDecoder<'c, R: Read> {
    r: CrcReader<R>,
    opts: LoadOptions,
    stage: Stage,
    game: &'c dyn GameIdentity,
    aux: &'c mut dyn AuxBlocks,
    progress: &'c mut dyn ProgressReporter,
}

impl<'c, R: Read> MapDecoder<'c, R> {
    pub fn new(r: R, opts: LoadOptions, ctx: Collaborators<'c>) -> Self {
        Self {
            r: CrcReader::new(r),
            opts,
            stage: Stage::Idle,
            game: ctx.game,
            aux: ctx.aux,
            progress: ctx.progress,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Read the whole map.
    pub fn decode(&mut self) -> Result<LoadedWorld, MapError> {
        self.stage = Stage::Header;
        let hdr = Header::decode(&mut self.r).map_err(at(self.stage))?;
        debug!(
            "map header: version {}, world size {}, {} ents",
            hdr.version, hdr.world_size, hdr.num_ents
        );
        let mut world = World {
            world_size: hdr.world_size,
            ..World::new(hdr.world_size.max(2))
        };
        let mut warnings = Vec::new();
        let mut counts = LoadCounts::default();

        self.stage = Stage::Variables;
        self.progress.report(0.0, "loading vars...");
        let num_vars = hdr.num_vars.max(0) as usize;
        let decoded = vars::decode_vars(&mut self.r, num_vars).map_err(at(self.stage))?;
        world.vars = decoded.vars;
        counts.vars = world.vars.len();
        warnings.extend(decoded.warnings);

        self.stage = Stage::Entities;
        let block = GameBlock::decode(&mut self.r).map_err(at(self.stage))?;
        let same_game = block.ident == self.game.ident();
        if !same_game {
            warn!(
                "loading map from {} game, ignoring entities except for lights/mapmodels",
                block.ident
            );
        }
        world.texmru = entity::decode_texmru(&mut self.r).map_err(at(self.stage))?;
        if same_game {
            world.game_data = block.game_data;
        }
        world.game_ident = block.ident;
        let entity_extra_size = block.extra_entity_size;

        self.progress.report(0.0, "loading entities...");
        let ents = entity::decode_entities(
            &mut self.r,
            &EntityContext {
                count: hdr.num_ents as usize,
                extra_size: usize::from(entity_extra_size),
                same_game,
                max_ents: self.opts.max_ents,
                world_size: hdr.world_size,
            },
        )
        .map_err(at(self.stage))?;
        counts.entities = ents.entities.len();
        counts.dropped_entities = ents.dropped_foreign;
        counts.skipped_entities = ents.skipped_over_cap;
        world.entities = ents.entities;

        self.stage = Stage::VSlots;
        self.progress.report(0.0, "loading slots...");
        let num_vslots = hdr.num_vslots.max(0) as usize;
        let slots = vslot::decode_vslots(&mut self.r, num_vslots).map_err(at(self.stage))?;
        counts.vslots = slots.vslots.len();
        world.vslots = slots.vslots;
        warnings.extend(slots.warnings);

        self.stage = Stage::Octree;
        self.progress.report(0.0, "loading octree...");
        let tree = octree::decode_octree(&mut self.r, hdr.world_size).map_err(at(self.stage))?;
        if tree.failed {
            error!("garbage in map");
        }
        self.progress.report(0.0, "validating...");
        world.root = tree.root;
        counts.nodes = tree.nodes;
        warnings.extend(tree.warnings);

        self.stage = Stage::OptionalBlocks;
        if !tree.failed {
            skip_lightmaps(&mut self.r, hdr.lightmaps).map_err(at(self.stage))?;
            if hdr.num_pvs > 0 {
                self.aux
                    .read_pvs(&mut self.r, hdr.num_pvs)
                    .map_err(at(self.stage))?;
            }
            if hdr.blendmap != 0 {
                self.aux
                    .read_blend_map(&mut self.r, hdr.blendmap)
                    .map_err(at(self.stage))?;
            }
        }
        let trailing = stream::drain(&mut self.r).map_err(at(self.stage))?;
        if trailing > 0 {
            debug!("drained {trailing} trailing bytes");
        }
        let crc = self.r.crc().sum();

        self.stage = Stage::Closed;
        debug!(
            "decoded map: {} ents, {} vslots, {} nodes, crc {crc:08x}",
            counts.entities, counts.vslots, counts.nodes
        );
        Ok(LoadedWorld {
            report: LoadReport {
                failed: tree.failed,
                warnings,
                crc,
                map_version: hdr.version,
                map_size: hdr.world_size,
                map_scale: hdr.map_scale(),
                counts,
                game_ident: world.game_ident.clone(),
                entity_extra_size,
            },
            world,
        })
    }

    /// Return the underlying reader.
    pub fn into_inner(self) -> R {
        self.r.into_inner()
    }
}

/// Consume `count` legacy lightmap blocks.
fn skip_lightmaps<R: Read>(r: &mut R, count: i32) -> Result<(), FormatError> {
    for _ in 0..count.max(0) {
        let ty = r.read_u8()?;
        if ty & 0x80 != 0 {
            // unlit texel coordinates
            r.read_u16::<LittleEndian>()?;
            r.read_u16::<LittleEndian>()?;
        }
        let bpp = if ty & 0x10 != 0 && ty & 0x0F != 2 { 4 } else { 3 };
        stream::skip(r, bpp * LM_PACK_SIZE * LM_PACK_SIZE)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Entity-only read
// ---------------------------------------------------------------------------

/// Read the header and game identity block that open a stream.
///
/// Variables are consumed without being kept.
pub fn read_identity<R: Read>(mut r: R) -> Result<(Header, GameBlock), MapError> {
    let hdr = Header::decode(&mut r).map_err(at(Stage::Header))?;
    vars::skip_vars(&mut r, hdr.num_vars.max(0) as usize).map_err(at(Stage::Variables))?;
    let block = GameBlock::decode(&mut r).map_err(at(Stage::Entities))?;
    Ok((hdr, block))
}

/// Read only the entities of a map and the CRC of its whole stream.
///
/// Game data and the texture MRU are discarded; everything after the
/// entities is drained for the CRC.
pub fn read_entities<R: Read>(
    r: R,
    game: &dyn GameIdentity,
    max_ents: usize,
) -> Result<(Vec<Entity>, u32), MapError> {
    let mut r = CrcReader::new(r);
    let (hdr, block) = read_identity(&mut r)?;
    let same_game = block.ident == game.ident();
    if !same_game {
        warn!(
            "loading map from {} game, ignoring entities except for lights/mapmodels",
            block.ident
        );
    }
    entity::decode_texmru(&mut r).map_err(at(Stage::Entities))?;
    let ents = entity::decode_entities(
        &mut r,
        &EntityContext {
            count: hdr.num_ents as usize,
            extra_size: usize::from(block.extra_entity_size),
            same_game,
            max_ents,
            world_size: hdr.world_size,
        },
    )
    .map_err(at(Stage::Entities))?;

    stream::drain(&mut r).map_err(at(Stage::OptionalBlocks))?;
    Ok((ents.entities, r.crc().sum()))
}

// ---------------------------------------------------------------------------
// Convenience function
// ---------------------------------------------------------------------------

/// Decode an uncompressed map held in memory with the stock game.
pub fn decode_all(data: &[u8]) -> Result<LoadedWorld, MapError> {
    let mut aux = NoAuxBlocks;
    let mut progress = NoProgress;
    let ctx = Collaborators::new(&FpsGame, &mut aux, &mut progress);
    MapDecoder::new(data, LoadOptions::default(), ctx).decode()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
