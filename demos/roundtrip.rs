use octamap::io;
use octamap::map::{Collaborators, FpsGame, LoadOptions, NoAuxBlocks, RecordingProgress, SaveOptions};
use octamap::world::{Cube, CubeNode, Entity, EntityKind, MapVar, VSlot, World};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut world = World::new(1024);
    world.vars.push(MapVar::string("maptitle", "demo"));
    world.entities.push(Entity::new(EntityKind::PLAYERSTART, [512.0, 512.0, 520.0]));

    let mut floor = CubeNode::empty_octants();
    floor[0] = CubeNode::solid();
    floor[1] = CubeNode::Leaf(Cube::with_edges([0x40; 12]));
    world.root[0] = CubeNode::branch(floor);

    world.vslots = vec![VSlot::new(0), VSlot::new(1).with_scale(0.5)];
    world.vslots[0].next = Some(1);

    let dir = std::env::temp_dir().join("octamap-demo");
    let path = dir.join("demo.ogz");

    let mut aux = NoAuxBlocks;
    let mut progress = RecordingProgress::default();
    let stats = io::save_world(
        &path,
        &world,
        &SaveOptions::default(),
        Collaborators::new(&FpsGame, &mut aux, &mut progress),
    )?;
    println!(
        "wrote {} ({} bytes, stream {} bytes, crc {:08x})",
        path.display(),
        stats.file_size,
        stats.stream_size,
        stats.crc
    );

    let mut progress = RecordingProgress::default();
    let loaded = io::load_world(
        &path,
        Collaborators::new(&FpsGame, &mut aux, &mut progress),
        &LoadOptions::default(),
    )?;
    assert_eq!(loaded.world, world);
    assert_eq!(loaded.report.crc, stats.crc);
    println!("stages: {}", progress.labels().join(", "));
    println!("nodes read: {}", loaded.report.counts.nodes);
    Ok(())
}
