// In-memory world model consumed and produced by the map codecs.
//
// - `cube`:   octree nodes, leaf cubes, surfaces and vertices
// - `vslot`:  texture-slot variants and their forward chain
// - `entity`: fixed-layout entities and typed variable overrides
//
// The `World` aggregate owns all of it. Codecs borrow it for the duration
// of a single save, or produce a fresh one on load.

pub mod cube;
pub mod entity;
pub mod vslot;

pub use cube::{Cube, CubeNode, FaceHint, SurfaceInfo, VertexInfo};
pub use entity::{Entity, EntityKind, MapVar, VarValue};
pub use vslot::{ShaderParam, VSlot, VSlotFields};

/// Default game identifier written into maps saved by this crate.
pub const DEFAULT_GAME_IDENT: &str = "fps";

/// Largest power-of-two world size an `i32` can hold.
pub const MAX_WORLD_SIZE: i32 = 1 << 30;

/// A complete map: geometry, texture variants, entities and map settings.
#[derive(Debug, Clone, PartialEq)]
pub struct World {
    /// Edge length of the world cube. Always a power of two.
    pub world_size: i32,
    /// The eight octants of the world cube, each `world_size / 2` wide.
    pub root: Box<[CubeNode; 8]>,
    /// Texture-slot variants in index order.
    pub vslots: Vec<VSlot>,
    pub entities: Vec<Entity>,
    /// Map-scoped variable overrides.
    pub vars: Vec<MapVar>,
    /// Identifier of the game the map was saved from.
    pub game_ident: String,
    /// Opaque game-specific blob carried alongside the entities.
    pub game_data: Vec<u8>,
    /// Most-recently-used texture list of the editor.
    pub texmru: Vec<u16>,
}

impl World {
    /// Create an empty world of the given size.
    ///
    /// `world_size` is clamped to `2..=MAX_WORLD_SIZE` and rounded up to the
    /// next power of two, so the root always has non-zero octants.
    pub fn new(world_size: i32) -> Self {
        let world_size = (world_size.clamp(2, MAX_WORLD_SIZE) as u32).next_power_of_two() as i32;
        Self {
            world_size,
            root: Box::new(CubeNode::empty_octants()),
            vslots: Vec::new(),
            entities: Vec::new(),
            vars: Vec::new(),
            game_ident: DEFAULT_GAME_IDENT.to_string(),
            game_data: Vec::new(),
            texmru: Vec::new(),
        }
    }

    /// log2 of the world size (the `mapscale` runtime variable).
    pub fn map_scale(&self) -> u32 {
        map_scale(self.world_size)
    }

    /// Total number of octree nodes below the root, branches included.
    pub fn node_count(&self) -> u64 {
        self.root.iter().map(CubeNode::node_count).sum()
    }

    /// Whether a point lies inside the world cube.
    pub fn contains(&self, o: [f32; 3]) -> bool {
        inside_world(self.world_size, o)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Whether `o` lies in `[0, world_size)` on every axis.
pub fn inside_world(world_size: i32, o: [f32; 3]) -> bool {
    let size = world_size as f32;
    o.iter().all(|&c| c >= 0.0 && c < size)
}

/// Smallest `s` such that `1 << s >= world_size`.
pub fn map_scale(world_size: i32) -> u32 {
    let mut scale = 0;
    while scale < 31 && (1i64 << scale) < i64::from(world_size) {
        scale += 1;
    }
    scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_world_rounds_to_power_of_two() {
        assert_eq!(World::new(1000).world_size, 1024);
        assert_eq!(World::new(0).world_size, 2);
        assert_eq!(World::new(4096).world_size, 4096);
        assert_eq!(World::new(i32::MAX).world_size, MAX_WORLD_SIZE);
        assert_eq!(World::new(MAX_WORLD_SIZE + 1).world_size, MAX_WORLD_SIZE);
        assert_eq!(World::new(-5).world_size, 2);
        assert_eq!(World::new(i32::MAX).map_scale(), 30);
    }

    #[test]
    fn map_scale_matches_world_size() {
        assert_eq!(map_scale(1), 0);
        assert_eq!(map_scale(2), 1);
        assert_eq!(map_scale(1024), 10);
        assert_eq!(map_scale(1025), 11);
    }

    #[test]
    fn empty_world_has_eight_nodes() {
        let world = World::new(512);
        assert_eq!(world.node_count(), 8);
        assert!(world.root.iter().all(|n| n.as_leaf().is_some_and(Cube::is_empty)));
    }

    #[test]
    fn contains_is_half_open() {
        let world = World::new(256);
        assert!(world.contains([0.0, 0.0, 0.0]));
        assert!(world.contains([255.9, 10.0, 1.0]));
        assert!(!world.contains([256.0, 10.0, 1.0]));
        assert!(!world.contains([-0.5, 10.0, 1.0]));
        assert_eq!(world.contains([255.0, 0.0, 0.0]), inside_world(256, [255.0, 0.0, 0.0]));
    }
}
