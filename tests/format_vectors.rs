use std::io::Cursor;

use octamap::format::header::HEADER_SIZE;
use octamap::format::octree::decode_octree;
use octamap::format::vslot::{decode_vslots, encode_vslots};
use octamap::format::{FormatError, Header, MAP_VERSION, NodeKind};
use octamap::map::{
    Collaborators, FpsGame, LoadOptions, MapDecoder, MapEncoder, NamedGame, NoAuxBlocks,
    NoProgress, RawAuxBlocks, Stage, decode_all, encode_all,
};
use octamap::world::{Cube, CubeNode, Entity, EntityKind, VSlot, VSlotFields, World};

fn ints(buf: &[u8]) -> Vec<i32> {
    buf.chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn set_header_field(buf: &mut [u8], offset: usize, value: i32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

const LIGHTMAPS_OFFSET: usize = 24;
const BLENDMAP_OFFSET: usize = 28;

#[test]
fn empty_world_exact_bytes() {
    let buf = encode_all(&World::new(1024), false).unwrap();

    let mut expected = b"OCTA".to_vec();
    for v in [MAP_VERSION, HEADER_SIZE as i32, 1024, 0, 0, 0, 0, 0, 0] {
        expected.extend_from_slice(&v.to_le_bytes());
    }
    // ident "fps", no extra entity bytes, no game data, empty MRU
    expected.extend_from_slice(&[3, b'f', b'p', b's', 0, 0, 0, 0, 0, 0, 0]);
    for _ in 0..8 {
        expected.push(NodeKind::Empty as u8);
        expected.extend_from_slice(&[0; 12]);
    }
    assert_eq!(buf, expected);
}

#[test]
fn empty_cube_uses_shortcut_record() {
    let mut root = CubeNode::empty_octants();
    root[0] = CubeNode::Leaf(Cube::with_edges([0; 12]));
    let mut world = World::new(64);
    world.root = Box::new(root);

    let buf = encode_all(&world, false).unwrap();
    let octree = &buf[buf.len() - 8 * 13..];
    assert_eq!(octree[0], NodeKind::Empty as u8);
    assert!(octree[1..13].iter().all(|&b| b == 0));

    let back = decode_octree(&mut Cursor::new(octree), 64).unwrap();
    assert_eq!(back.root[0], CubeNode::Leaf(Cube::empty()));
}

#[test]
fn vslot_chain_bytes() {
    let mut slots = vec![
        VSlot::new(0),
        VSlot::new(1).with_scale(2.0),
        VSlot::new(2),
        VSlot::new(3).with_rotation(3),
    ];
    slots[0].next = Some(1);
    slots[1].next = Some(3);

    let mut buf = Vec::new();
    encode_vslots(&mut buf, &slots, slots.len()).unwrap();
    let expected = vec![
        -1,
        VSlotFields::SCALE.bits() as i32,
        0,
        2.0f32.to_bits() as i32,
        -1,
        VSlotFields::ROTATION.bits() as i32,
        1,
        3,
    ];
    assert_eq!(ints(&buf), expected);

    let back = decode_vslots(&mut Cursor::new(&buf), 4).unwrap();
    assert_eq!(back.vslots, slots);

    let mut again = Vec::new();
    encode_vslots(&mut again, &back.vslots, 4).unwrap();
    assert_eq!(again, buf);
}

#[test]
fn shared_backref_keeps_last_link() {
    // Two variants both naming slot 0 as their predecessor.
    let mut buf = Vec::new();
    for v in [
        -1,
        VSlotFields::SCALE.bits() as i32,
        0,
        2.0f32.to_bits() as i32,
        -1,
        VSlotFields::ROTATION.bits() as i32,
        0,
        3,
    ] {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    let back = decode_vslots(&mut Cursor::new(&buf), 4).unwrap();
    assert!(back.warnings.is_empty());
    assert_eq!(back.vslots[1].scale, 2.0);
    assert_eq!(back.vslots[3].rotation, 3);
    assert_eq!(back.vslots[0].next, Some(3));
    assert_eq!(back.vslots[1].next, None);
}

#[test]
fn zero_world_size_rejected_before_body() {
    let mut buf = encode_all(&World::new(256), false).unwrap();
    set_header_field(&mut buf, 12, 0);
    let mut r = &buf[..];
    let err = Header::decode(&mut r).unwrap_err();
    assert!(matches!(err, FormatError::MalformedHeader(_)));
    assert_eq!(r.len(), buf.len() - 28);
}

#[test]
fn newer_version_rejected() {
    let mut buf = encode_all(&World::new(256), false).unwrap();
    set_header_field(&mut buf, 4, MAP_VERSION + 1);
    let err = decode_all(&buf).unwrap_err();
    assert_eq!(err.stage, Stage::Header);
    assert!(matches!(
        err.source,
        FormatError::UnsupportedVersion { version, .. } if version == MAP_VERSION + 1
    ));

    set_header_field(&mut buf, 4, 32);
    assert!(matches!(
        decode_all(&buf).unwrap_err().source,
        FormatError::UnsupportedVersion { .. }
    ));
}

#[test]
fn fields_are_little_endian() {
    let mut world = World::new(2048);
    world.entities = vec![
        Entity::new(EntityKind::SOUND, [1.5, 256.0, 1000.25]).with_attrs([-2, 300, 0, 0, 7]),
    ];
    let buf = encode_all(&world, false).unwrap();
    assert_eq!(&buf[12..16], &[0x00, 0x08, 0x00, 0x00]);

    let ent = &buf[HEADER_SIZE + 9 + 2..HEADER_SIZE + 9 + 2 + 24];
    assert_eq!(&ent[0..4], &1.5f32.to_le_bytes());
    assert_eq!(&ent[8..12], &1000.25f32.to_le_bytes());
    assert_eq!(&ent[12..14], &(-2i16).to_le_bytes());
    assert_eq!(&ent[14..16], &300i16.to_le_bytes());
    assert_eq!(ent[22], EntityKind::SOUND.0);

    let back = decode_all(&buf).unwrap();
    assert_eq!(back.world.entities, world.entities);
}

#[test]
fn legacy_lightmaps_consumed_and_ignored() {
    let mut buf = encode_all(&World::new(256), false).unwrap();
    set_header_field(&mut buf, LIGHTMAPS_OFFSET, 2);
    set_header_field(&mut buf, BLENDMAP_OFFSET, 1);
    // rgb lightmap, then rgba lightmap with unlit texel coordinates
    buf.push(0x00);
    buf.extend(std::iter::repeat_n(0x11, 3 * 512 * 512));
    buf.extend_from_slice(&[0x90 | 0x01, 4, 0, 8, 0]);
    buf.extend(std::iter::repeat_n(0x22, 4 * 512 * 512));
    let blend = b"blend-map payload".to_vec();
    buf.extend_from_slice(&blend);

    let mut aux = RawAuxBlocks::default();
    let mut progress = NoProgress;
    let loaded = MapDecoder::new(
        &buf[..],
        LoadOptions::default(),
        Collaborators::new(&FpsGame, &mut aux, &mut progress),
    )
    .decode()
    .unwrap();
    assert!(!loaded.report.failed);
    assert_eq!(aux.tail, blend);
    assert_eq!(aux.blend_map, 1);
}

#[test]
fn optional_blocks_skipped_after_corrupt_octree() {
    let mut buf = encode_all(&World::new(256), false).unwrap();
    set_header_field(&mut buf, BLENDMAP_OFFSET, 1);
    let octree_start = buf.len() - 8 * 13;
    buf[octree_start] = 0x06;
    buf.extend_from_slice(b"tail");

    let mut aux = RawAuxBlocks::default();
    let mut progress = NoProgress;
    let loaded = MapDecoder::new(
        &buf[..],
        LoadOptions::default(),
        Collaborators::new(&FpsGame, &mut aux, &mut progress),
    )
    .decode()
    .unwrap();
    assert!(loaded.report.failed);
    assert!(aux.tail.is_empty());

    let mut crc = flate2::Crc::new();
    crc.update(&buf);
    assert_eq!(loaded.report.crc, crc.sum());
}

#[test]
fn foreign_game_entities_filtered() {
    let mut world = World::new(1024);
    world.entities = vec![
        Entity::new(EntityKind::LIGHT, [10.0; 3]),
        Entity::new(EntityKind(11), [20.0; 3]),
        Entity::new(EntityKind::MAPMODEL, [30.0; 3]),
    ];
    world.entities[1].extra = vec![9, 9, 9];
    let game = NamedGame::new("other", 3);
    let mut aux = NoAuxBlocks;
    let mut progress = NoProgress;
    let mut enc = MapEncoder::new(
        Vec::new(),
        false,
        Collaborators::new(&game, &mut aux, &mut progress),
    );
    enc.encode(&world).unwrap();
    let buf = enc.finish();

    let foreign = decode_all(&buf).unwrap();
    let kinds: Vec<_> = foreign.world.entities.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EntityKind::LIGHT, EntityKind::MAPMODEL]);
    assert!(foreign.world.entities.iter().all(|e| e.extra.is_empty()));

    let mut aux = NoAuxBlocks;
    let mut progress = NoProgress;
    let native = MapDecoder::new(
        &buf[..],
        LoadOptions::default(),
        Collaborators::new(&game, &mut aux, &mut progress),
    )
    .decode()
    .unwrap();
    assert_eq!(native.world.entities[1].extra, vec![9, 9, 9]);
    assert_eq!(native.world.entities[0].extra, vec![0, 0, 0]);
}

#[test]
fn entity_cap_consumes_surplus_records() {
    let mut world = World::new(1024);
    world.entities = (0..5)
        .map(|i| Entity::new(EntityKind::PARTICLES, [i as f32; 3]))
        .collect();
    world.root[4] = CubeNode::solid();
    let buf = encode_all(&world, false).unwrap();

    let mut aux = NoAuxBlocks;
    let mut progress = NoProgress;
    let loaded = MapDecoder::new(
        &buf[..],
        LoadOptions { max_ents: 3 },
        Collaborators::new(&FpsGame, &mut aux, &mut progress),
    )
    .decode()
    .unwrap();
    assert_eq!(loaded.world.entities, world.entities[..3]);
    assert_eq!(loaded.report.counts.skipped_entities, 2);
    assert_eq!(loaded.world.root, world.root);
}
