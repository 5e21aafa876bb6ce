// Octree nodes and leaf cube geometry.

use bitflags::bitflags;

/// Edge byte of an edge that spans no part of the cube.
pub const EDGE_EMPTY: u8 = 0x00;
/// Edge byte of an edge that spans the whole cube (start 0, end 8).
pub const EDGE_SOLID: u8 = 0x80;

/// Air: the material of a cube without any special material.
pub const MAT_AIR: u16 = 0;

/// Mask of the per-layer vertex count in `SurfaceInfo::numverts`.
pub const MAX_FACE_VERTS: u8 = 15;
pub const LAYER_TOP: u8 = 1 << 5;
pub const LAYER_BOTTOM: u8 = 1 << 6;
/// The surface carries a duplicated second layer of vertices.
pub const LAYER_DUP: u8 = 1 << 7;

bitflags! {
    /// Visibility facts about a non-merged face, computed by the editor.
    ///
    /// The map writer copies these into the vertex mask verbatim and the
    /// reader recovers them from it; neither re-derives them.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct FaceHint: u8 {
        /// Triangulate along the other diagonal (concave face or split).
        const SPLIT = 0x01;
        /// For faces with fewer than four vertices, the second triangle is
        /// the visible one.
        const SECOND_TRI = 0x02;
    }
}

// ---------------------------------------------------------------------------
// Vertices and surfaces
// ---------------------------------------------------------------------------

/// One render vertex of a face: lattice position in 1/8 world units and a
/// packed normal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct VertexInfo {
    pub x: u16,
    pub y: u16,
    pub z: u16,
    pub norm: u16,
}

impl VertexInfo {
    pub fn new(xyz: [u16; 3], norm: u16) -> Self {
        Self {
            x: xyz[0],
            y: xyz[1],
            z: xyz[2],
            norm,
        }
    }

    /// Position as signed integers, indexable by dimension.
    #[inline]
    pub fn xyz(&self) -> [i32; 3] {
        [i32::from(self.x), i32::from(self.y), i32::from(self.z)]
    }

    /// Store a position, truncating each coordinate to 16 bits.
    #[inline]
    pub fn set_xyz(&mut self, v: [i32; 3]) {
        self.x = v[0] as u16;
        self.y = v[1] as u16;
        self.z = v[2] as u16;
    }
}

/// Explicit render geometry of one cube face.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurfaceInfo {
    /// Vertex count per layer (low 4 bits) plus `LAYER_*` flags.
    pub numverts: u8,
    /// `total_verts()` vertices; the duplicate layer follows the first.
    pub verts: Vec<VertexInfo>,
    pub hint: FaceHint,
}

impl SurfaceInfo {
    /// A single-layer surface over the given vertices.
    pub fn new(verts: Vec<VertexInfo>) -> Self {
        Self {
            numverts: (verts.len() as u8) & MAX_FACE_VERTS,
            verts,
            hint: FaceHint::empty(),
        }
    }

    /// Vertices per layer.
    #[inline]
    pub fn layer_verts(&self) -> usize {
        usize::from(self.numverts & MAX_FACE_VERTS)
    }

    /// Vertices across all layers.
    #[inline]
    pub fn total_verts(&self) -> usize {
        total_verts(self.numverts)
    }

    /// Whether the surface has to be written at all.
    #[inline]
    pub fn is_used(&self) -> bool {
        self.numverts & !LAYER_TOP != 0
    }

    #[inline]
    pub fn has_dup_layer(&self) -> bool {
        self.numverts & LAYER_DUP != 0
    }
}

/// Vertex count implied by a `numverts` byte.
#[inline]
pub fn total_verts(numverts: u8) -> usize {
    let layer = usize::from(numverts & MAX_FACE_VERTS);
    if numverts & LAYER_DUP != 0 {
        layer * 2
    } else {
        layer
    }
}

// ---------------------------------------------------------------------------
// Cubes
// ---------------------------------------------------------------------------

/// A leaf of the octree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cube {
    /// Packed edge positions: three groups of four edges, one group per
    /// axis. Low nibble is the start, high nibble the end, both 0..=8.
    pub edges: [u8; 12],
    /// Texture (VSlot index) of each face, in orientation order.
    pub texture: [u16; 6],
    pub material: u16,
    /// Bitmask of faces merged with coplanar neighbours.
    pub merged: u8,
    /// Explicit render geometry, one slot per face.
    pub surfaces: Option<Box<[SurfaceInfo; 6]>>,
}

impl Cube {
    pub fn empty() -> Self {
        Self::with_edges([EDGE_EMPTY; 12])
    }

    pub fn solid() -> Self {
        Self::with_edges([EDGE_SOLID; 12])
    }

    pub fn with_edges(edges: [u8; 12]) -> Self {
        Self {
            edges,
            texture: [0; 6],
            material: MAT_AIR,
            merged: 0,
            surfaces: None,
        }
    }

    /// The first axis group collapsed to nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edges[..4].iter().all(|&e| e == EDGE_EMPTY)
    }

    #[inline]
    pub fn is_entirely_solid(&self) -> bool {
        self.edges.iter().all(|&e| e == EDGE_SOLID)
    }

    /// Surfaces that carry data, paired with their orientation.
    pub fn used_surfaces(&self) -> impl Iterator<Item = (usize, &SurfaceInfo)> {
        self.surfaces
            .iter()
            .flat_map(|s| s.iter().enumerate())
            .filter(|(_, s)| s.is_used())
    }

    /// Attach a surface to one face, allocating the surface table on demand.
    pub fn set_surface(&mut self, orient: usize, surface: SurfaceInfo) {
        let table = self
            .surfaces
            .get_or_insert_with(|| Box::new(Default::default()));
        table[orient] = surface;
    }
}

impl Default for Cube {
    fn default() -> Self {
        Self::empty()
    }
}

/// A node of the octree: either eight children or a leaf cube.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CubeNode {
    Branch(Box<[CubeNode; 8]>),
    Leaf(Cube),
}

impl CubeNode {
    pub fn empty() -> Self {
        Self::Leaf(Cube::empty())
    }

    pub fn solid() -> Self {
        Self::Leaf(Cube::solid())
    }

    pub fn branch(children: [CubeNode; 8]) -> Self {
        Self::Branch(Box::new(children))
    }

    /// Eight empty leaves, the content of a freshly subdivided node.
    pub fn empty_octants() -> [CubeNode; 8] {
        std::array::from_fn(|_| Self::empty())
    }

    pub fn as_leaf(&self) -> Option<&Cube> {
        match self {
            Self::Leaf(c) => Some(c),
            Self::Branch(_) => None,
        }
    }

    pub fn as_leaf_mut(&mut self) -> Option<&mut Cube> {
        match self {
            Self::Leaf(c) => Some(c),
            Self::Branch(_) => None,
        }
    }

    pub fn children(&self) -> Option<&[CubeNode; 8]> {
        match self {
            Self::Branch(c) => Some(c),
            Self::Leaf(_) => None,
        }
    }

    /// This node plus all of its descendants.
    pub fn node_count(&self) -> u64 {
        match self {
            Self::Leaf(_) => 1,
            Self::Branch(children) => 1 + children.iter().map(Self::node_count).sum::<u64>(),
        }
    }

    /// Depth of the deepest leaf below this node (a leaf has depth 0).
    pub fn depth(&self) -> u32 {
        match self {
            Self::Leaf(_) => 0,
            Self::Branch(children) => 1 + children.iter().map(Self::depth).max().unwrap_or(0),
        }
    }
}

impl Default for CubeNode {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Cube> for CubeNode {
    fn from(c: Cube) -> Self {
        Self::Leaf(c)
    }
}

/// Origin of octant `i` of a node at `origin` whose children are `size` wide.
#[inline]
pub fn octant_origin(i: usize, origin: [i32; 3], size: i32) -> [i32; 3] {
    [
        origin[0] + (i & 1) as i32 * size,
        origin[1] + ((i >> 1) & 1) as i32 * size,
        origin[2] + ((i >> 2) & 1) as i32 * size,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_solid_are_exclusive() {
        assert!(Cube::empty().is_empty());
        assert!(!Cube::empty().is_entirely_solid());
        assert!(Cube::solid().is_entirely_solid());
        assert!(!Cube::solid().is_empty());
    }

    #[test]
    fn partially_cut_cube_is_neither() {
        let mut edges = [EDGE_SOLID; 12];
        edges[5] = 0x84;
        let c = Cube::with_edges(edges);
        assert!(!c.is_empty());
        assert!(!c.is_entirely_solid());
    }

    #[test]
    fn total_verts_doubles_for_dup_layer() {
        assert_eq!(total_verts(4), 4);
        assert_eq!(total_verts(4 | LAYER_DUP), 8);
        assert_eq!(total_verts(3 | LAYER_BOTTOM), 3);
        assert_eq!(total_verts(LAYER_TOP), 0);
    }

    #[test]
    fn top_only_surface_is_unused() {
        let s = SurfaceInfo {
            numverts: LAYER_TOP,
            ..Default::default()
        };
        assert!(!s.is_used());
        let s = SurfaceInfo {
            numverts: LAYER_BOTTOM,
            ..Default::default()
        };
        assert!(s.is_used());
    }

    #[test]
    fn octant_origins_follow_bit_layout() {
        assert_eq!(octant_origin(0, [0, 0, 0], 8), [0, 0, 0]);
        assert_eq!(octant_origin(1, [0, 0, 0], 8), [8, 0, 0]);
        assert_eq!(octant_origin(2, [0, 0, 0], 8), [0, 8, 0]);
        assert_eq!(octant_origin(4, [16, 0, 0], 8), [16, 0, 8]);
        assert_eq!(octant_origin(7, [0, 32, 0], 4), [4, 36, 4]);
    }

    #[test]
    fn node_count_and_depth() {
        let mut inner = CubeNode::empty_octants();
        inner[3] = CubeNode::solid();
        let mut outer = CubeNode::empty_octants();
        outer[0] = CubeNode::branch(inner);
        let node = CubeNode::branch(outer);
        assert_eq!(node.node_count(), 1 + 8 + 8);
        assert_eq!(node.depth(), 2);
    }

    #[test]
    fn set_surface_allocates_table() {
        let mut c = Cube::solid();
        assert_eq!(c.used_surfaces().count(), 0);
        c.set_surface(2, SurfaceInfo::new(vec![VertexInfo::default(); 4]));
        let used: Vec<_> = c.used_surfaces().map(|(i, _)| i).collect();
        assert_eq!(used, vec![2]);
    }
}
