use std::path::Path;
use std::process::Command;

use octamap::io;
use octamap::map::{Collaborators, FpsGame, NoAuxBlocks, NoProgress, SaveOptions};
use octamap::world::{CubeNode, Entity, EntityKind, MapVar, World};
use tempfile::tempdir;

fn bin() -> String {
    env!("CARGO_BIN_EXE_octamap").to_string()
}

fn write_map(path: &Path) -> World {
    let mut world = World::new(512);
    world.root[2] = CubeNode::solid();
    world.vars = vec![MapVar::string("maptitle", "cli test")];
    world.entities = vec![Entity::new(EntityKind::PLAYERSTART, [10.0, 20.0, 30.0])];
    let mut aux = NoAuxBlocks;
    let mut progress = NoProgress;
    io::save_world(
        path,
        &world,
        &SaveOptions::default(),
        Collaborators::new(&FpsGame, &mut aux, &mut progress),
    )
    .unwrap();
    world
}

#[test]
fn cli_savemap_creates_new_map() {
    let dir = tempdir().unwrap();
    let st = Command::new(bin())
        .arg("--media")
        .arg(dir.path())
        .args(["savemap", "arena"])
        .status()
        .unwrap();
    assert!(st.success());

    let path = dir.path().join("map").join("arena.ogz");
    let loaded = io::read_stream(&path).unwrap();
    assert_eq!(&loaded[..4], b"OCTA");
}

#[test]
fn cli_savemap_from_file_and_backup() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("source.ogz");
    let world = write_map(&source);

    for _ in 0..2 {
        let st = Command::new(bin())
            .arg("--media")
            .arg(dir.path())
            .args(["savemap", "custom/dm1", "--backup", "single", "--from"])
            .arg(&source)
            .status()
            .unwrap();
        assert!(st.success());
    }

    let target = dir.path().join("custom").join("dm1.ogz");
    assert!(dir.path().join("custom").join("dm1.BAK").exists());
    assert_eq!(
        io::read_stream(&target).unwrap(),
        io::read_stream(&source).unwrap()
    );
    let mut aux = NoAuxBlocks;
    let mut progress = NoProgress;
    let loaded = io::load_world(
        &target,
        Collaborators::new(&FpsGame, &mut aux, &mut progress),
        &Default::default(),
    )
    .unwrap();
    assert_eq!(loaded.world, world);
}

#[test]
fn cli_savecurrentmap_uses_env_name() {
    let dir = tempdir().unwrap();
    let st = Command::new(bin())
        .env("OCTAMAP_MAP", "current")
        .arg("--media")
        .arg(dir.path())
        .args(["savecurrentmap", "--bare", "--backup", "none"])
        .status()
        .unwrap();
    assert!(st.success());
    assert!(dir.path().join("map").join("current.ogz").exists());
}

#[test]
fn cli_info_reports_counts() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("info.ogz");
    write_map(&path);

    let out = Command::new(bin()).arg("info").arg(&path).output().unwrap();
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    assert!(text.contains("world size: 512 (scale 9)"), "{text}");
    assert!(text.contains("game:       fps"), "{text}");
    assert!(text.contains("status:     ok"), "{text}");

    let out = Command::new(bin())
        .args(["--json", "info"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(out.status.success());
    let json = String::from_utf8_lossy(&out.stderr);
    assert!(json.contains("\"entities\":1"), "{json}");
    assert!(json.contains("\"failed\":false"), "{json}");
}

#[test]
fn cli_verify_accepts_clean_map() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("verify.ogz");
    write_map(&path);

    let out = Command::new(bin())
        .args(["--json", "verify"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(out.status.success());
    let json = String::from_utf8_lossy(&out.stderr);
    assert!(json.contains("\"identical\":true"), "{json}");
}

#[test]
fn cli_recode_changes_compression_only() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.ogz");
    let output = dir.path().join("out.ogz");
    write_map(&input);

    let st = Command::new(bin())
        .args(["-q", "recode", "--level", "1", "--backup", "none"])
        .arg(&input)
        .arg(&output)
        .status()
        .unwrap();
    assert!(st.success());
    assert_eq!(
        io::read_stream(&input).unwrap(),
        io::read_stream(&output).unwrap()
    );
}

#[test]
fn cli_rejects_non_map_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bogus.ogz");
    std::fs::write(&path, b"definitely not gzip").unwrap();

    for cmd in ["info", "verify"] {
        let out = Command::new(bin()).arg(cmd).arg(&path).output().unwrap();
        assert_eq!(out.status.code(), Some(1), "{cmd}");
    }
    let out = Command::new(bin())
        .arg("info")
        .arg(dir.path().join("missing.ogz"))
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn cli_config_works() {
    let out = Command::new(bin())
        .args(["--media", "/tmp/media", "config"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stderr);
    assert!(text.contains("MAP_VERSION=33"), "{text}");
    assert!(text.contains("MEDIA_ROOT=/tmp/media"), "{text}");
}
