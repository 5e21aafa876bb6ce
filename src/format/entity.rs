// Game identity block, texture MRU list and entity records.
//
// The identity block names the game that wrote the map and fixes the size
// of the per-entity extra data for the whole file. Entities written by a
// different game keep only their engine-level fields, and game-specific
// kinds are dropped.

use std::io::{self, Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};
use log::warn;

use super::error::Result;
use super::stream::{self, LE};
use crate::world::{Entity, EntityKind, inside_world};

/// Most entities a map load materializes.
pub const MAX_ENTS: usize = 10_000;

/// On-disk size of an entity record without its extra data.
pub const ENTITY_SIZE: usize = 24;

// ---------------------------------------------------------------------------
// Game identity block
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameBlock {
    pub ident: String,
    /// Extra bytes following every entity record in this file.
    pub extra_entity_size: u16,
    pub game_data: Vec<u8>,
}

impl GameBlock {
    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let ident = self.ident.as_bytes();
        let len = u8::try_from(ident.len()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("game ident of {} bytes is too long", ident.len()),
            )
        })?;
        let data_len = u16::try_from(self.game_data.len()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} bytes of game data do not fit a u16", self.game_data.len()),
            )
        })?;
        w.write_u8(len)?;
        w.write_all(ident)?;
        w.write_u8(0)?;
        w.write_u16::<LE>(self.extra_entity_size)?;
        w.write_u16::<LE>(data_len)?;
        w.write_all(&self.game_data)
    }

    pub fn decode<R: Read>(r: &mut R) -> Result<Self> {
        let len = usize::from(r.read_u8()?);
        let raw = stream::read_bytes(r, len + 1)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let ident = String::from_utf8_lossy(&raw[..end]).into_owned();
        let extra_entity_size = r.read_u16::<LE>()?;
        let data_len = r.read_u16::<LE>()?;
        let game_data = stream::read_bytes(r, usize::from(data_len))?;
        Ok(Self {
            ident,
            extra_entity_size,
            game_data,
        })
    }
}

// ---------------------------------------------------------------------------
// Texture MRU
// ---------------------------------------------------------------------------

pub fn encode_texmru<W: Write>(w: &mut W, mru: &[u16]) -> io::Result<()> {
    let count = u16::try_from(mru.len()).unwrap_or(u16::MAX);
    w.write_u16::<LE>(count)?;
    for &tex in &mru[..usize::from(count)] {
        w.write_u16::<LE>(tex)?;
    }
    Ok(())
}

pub fn decode_texmru<R: Read>(r: &mut R) -> Result<Vec<u16>> {
    let count = usize::from(r.read_u16::<LE>()?);
    let mut mru = vec![0u16; count];
    r.read_u16_into::<LE>(&mut mru)?;
    Ok(mru)
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Write one record; `extra` is padded with zeros or cut to `extra_size`.
pub fn encode_entity<W: Write>(w: &mut W, e: &Entity, extra_size: usize) -> io::Result<()> {
    stream::write_f32s(w, &e.o)?;
    for a in e.attr {
        w.write_i16::<LE>(a)?;
    }
    w.write_u8(e.kind.0)?;
    w.write_u8(e.reserved)?;
    let n = e.extra.len().min(extra_size);
    w.write_all(&e.extra[..n])?;
    w.write_all(&vec![0u8; extra_size - n])
}

/// Read the fixed part of one record.
pub fn decode_entity_base<R: Read>(r: &mut R) -> Result<Entity> {
    let o = stream::read_f32_array::<_, 3>(r)?;
    let mut attr = [0i16; 5];
    r.read_i16_into::<LE>(&mut attr)?;
    let kind = EntityKind(r.read_u8()?);
    let reserved = r.read_u8()?;
    Ok(Entity {
        o,
        attr,
        kind,
        reserved,
        extra: Vec::new(),
    })
}

/// How the entity block of one file is interpreted.
#[derive(Debug, Clone, Copy)]
pub struct EntityContext {
    /// Entity count from the header.
    pub count: usize,
    /// Extra bytes per record, from the file's identity block.
    pub extra_size: usize,
    /// Whether the file was written by the game reading it.
    pub same_game: bool,
    pub max_ents: usize,
    pub world_size: i32,
}

#[derive(Debug, Default)]
pub struct DecodedEntities {
    pub entities: Vec<Entity>,
    /// Game-specific entities of a foreign game that were discarded.
    pub dropped_foreign: usize,
    /// Records past the entity cap that were consumed unread.
    pub skipped_over_cap: usize,
}

pub fn decode_entities<R: Read>(r: &mut R, ctx: &EntityContext) -> Result<DecodedEntities> {
    let keep = ctx.count.min(ctx.max_ents);
    let mut out = DecodedEntities {
        entities: Vec::with_capacity(keep.min(MAX_ENTS)),
        ..Default::default()
    };

    for i in 0..keep {
        let mut e = decode_entity_base(r)?;
        if ctx.same_game {
            e.extra = stream::read_bytes(r, ctx.extra_size)?;
        } else {
            stream::skip(r, ctx.extra_size as u64)?;
            if e.kind.is_game_specific() {
                out.dropped_foreign += 1;
                continue;
            }
        }
        if !inside_world(ctx.world_size, e.o) && !e.kind.is_light() {
            warn!(
                "ent outside of world: enttype[{}] index {i} ({}, {}, {})",
                e.kind.name(),
                e.o[0],
                e.o[1],
                e.o[2]
            );
        }
        out.entities.push(e);
    }

    if ctx.count > keep {
        warn!("map has {} entities, keeping {keep}", ctx.count);
        out.skipped_over_cap = ctx.count - keep;
        let surplus = (out.skipped_over_cap * (ENTITY_SIZE + ctx.extra_size)) as u64;
        stream::skip(r, surplus)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatError;
    use std::io::Cursor;

    fn ctx(count: usize, extra_size: usize, same_game: bool) -> EntityContext {
        EntityContext {
            count,
            extra_size,
            same_game,
            max_ents: MAX_ENTS,
            world_size: 1024,
        }
    }

    #[test]
    fn entity_record_is_24_bytes() {
        let e = Entity::new(EntityKind::LIGHT, [1.0, 2.0, 3.0]).with_attrs([64, 255, 0, 0, 0]);
        let mut buf = Vec::new();
        encode_entity(&mut buf, &e, 0).unwrap();
        assert_eq!(buf.len(), ENTITY_SIZE);
        assert_eq!(&buf[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&buf[12..14], &[64, 0]);
        assert_eq!(buf[22], 1);
    }

    #[test]
    fn extra_is_padded_and_cut() {
        let mut e = Entity::new(EntityKind::MAPMODEL, [0.0; 3]);
        e.extra = vec![1, 2, 3];
        let mut buf = Vec::new();
        encode_entity(&mut buf, &e, 5).unwrap();
        assert_eq!(&buf[24..], &[1, 2, 3, 0, 0]);
        buf.clear();
        encode_entity(&mut buf, &e, 2).unwrap();
        assert_eq!(&buf[24..], &[1, 2]);
    }

    #[test]
    fn game_block_roundtrip() {
        let block = GameBlock {
            ident: "fps".into(),
            extra_entity_size: 2,
            game_data: vec![9, 8, 7],
        };
        let mut buf = Vec::new();
        block.encode(&mut buf).unwrap();
        assert_eq!(&buf[..5], &[3, b'f', b'p', b's', 0]);
        assert_eq!(GameBlock::decode(&mut Cursor::new(&buf)).unwrap(), block);
    }

    #[test]
    fn texmru_roundtrip() {
        let mut buf = Vec::new();
        encode_texmru(&mut buf, &[4, 1, 300]).unwrap();
        assert_eq!(buf.len(), 2 + 6);
        assert_eq!(decode_texmru(&mut Cursor::new(&buf)).unwrap(), vec![4, 1, 300]);
    }

    #[test]
    fn foreign_game_drops_game_specific() {
        let mut buf = Vec::new();
        let mut pickup = Entity::new(EntityKind(12), [1.0; 3]);
        pickup.extra = vec![0xEE; 4];
        let light = Entity::new(EntityKind::LIGHT, [2.0; 3]);
        encode_entity(&mut buf, &pickup, 4).unwrap();
        encode_entity(&mut buf, &light, 4).unwrap();
        buf.push(0x55);

        let mut cur = Cursor::new(&buf);
        let out = decode_entities(&mut cur, &ctx(2, 4, false)).unwrap();
        assert_eq!(out.entities.len(), 1);
        assert_eq!(out.entities[0].kind, EntityKind::LIGHT);
        assert!(out.entities[0].extra.is_empty());
        assert_eq!(out.dropped_foreign, 1);
        assert_eq!(cur.read_u8().unwrap(), 0x55);
    }

    #[test]
    fn same_game_keeps_extra() {
        let mut e = Entity::new(EntityKind(12), [1.0; 3]);
        e.extra = vec![1, 2];
        let mut buf = Vec::new();
        encode_entity(&mut buf, &e, 2).unwrap();
        let out = decode_entities(&mut Cursor::new(&buf), &ctx(1, 2, true)).unwrap();
        assert_eq!(out.entities, vec![e]);
    }

    #[test]
    fn cap_consumes_surplus() {
        let mut buf = Vec::new();
        for i in 0..5 {
            encode_entity(&mut buf, &Entity::new(EntityKind::MAPMODEL, [i as f32; 3]), 1).unwrap();
        }
        buf.push(0x77);
        let mut cur = Cursor::new(&buf);
        let c = EntityContext {
            max_ents: 3,
            ..ctx(5, 1, true)
        };
        let out = decode_entities(&mut cur, &c).unwrap();
        assert_eq!(out.entities.len(), 3);
        assert_eq!(out.skipped_over_cap, 2);
        assert_eq!(cur.read_u8().unwrap(), 0x77);
    }

    #[test]
    fn truncated_record_is_fatal() {
        let buf = [0u8; 20];
        let err = decode_entities(&mut Cursor::new(&buf), &ctx(1, 0, true)).unwrap_err();
        assert!(matches!(err, FormatError::TruncatedStream));
    }
}
