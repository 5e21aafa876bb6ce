// Octree node codec.
//
// Nodes are written depth first, eight octants at a time. Each node starts
// with a type byte whose low three bits give the node kind and whose high
// bits flag the optional fields that follow. Leaf geometry is stored as
// edges; explicit surfaces carry only what cannot be regenerated from them.

use std::io::{self, Read, Write};

use bitflags::bitflags;
use byteorder::{ReadBytesExt, WriteBytesExt};

use super::error::{FormatError, Result};
use super::geometry::{self, C, FacePlane, IVec, R};
use super::stream::{self, LE};
use crate::world::cube::{LAYER_DUP, octant_origin, total_verts};
use crate::world::{Cube, CubeNode, FaceHint, SurfaceInfo, VertexInfo};

// ---------------------------------------------------------------------------
// Type byte
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeKind {
    Children = 0,
    Empty = 1,
    Solid = 2,
    Normal = 3,
    /// A leaf that also has children. Read for compatibility, never written.
    LodCube = 4,
}

impl NodeKind {
    pub const MASK: u8 = 0x07;

    pub fn from_byte(b: u8) -> Option<Self> {
        match b & Self::MASK {
            0 => Some(Self::Children),
            1 => Some(Self::Empty),
            2 => Some(Self::Solid),
            3 => Some(Self::Normal),
            4 => Some(Self::LodCube),
            _ => None,
        }
    }
}

bitflags! {
    /// Optional leaf fields present after the type byte.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct NodeFlags: u8 {
        const SURFACES = 0x20;
        const MATERIAL = 0x40;
        const MERGED   = 0x80;
    }
}

bitflags! {
    /// Per-surface layout of the vertex payload.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct VertexMask: u8 {
        /// Merged quad stored as two corners (with XYZ), or split along the
        /// other diagonal (without).
        const QUAD_ORDER  = 0x01;
        /// Second triangle visible. Also marks collapsed UVs when reading.
        const SECOND_TRI  = 0x02;
        /// In-plane coordinates are stored explicitly.
        const XYZ         = 0x04;
        /// A single normal shared by every vertex.
        const SHARED_NORM = 0x08;
        /// Lightmap UVs from older maps; consumed and dropped.
        const UV          = 0x40;
        const NORM        = 0x80;
    }
}

/// Legacy lightmap ids written in front of each surface.
const LMID_AMBIENT: u8 = 0;

/// Progress is reported once per this many octant groups.
pub const PROGRESS_INTERVAL: u64 = 0x1000;

/// Number of eight-child groups in a tree, the root group included.
pub fn group_count(root: &[CubeNode; 8]) -> u64 {
    fn branches(n: &CubeNode) -> u64 {
        n.children()
            .map_or(0, |c| 1 + c.iter().map(branches).sum::<u64>())
    }
    1 + root.iter().map(branches).sum::<u64>()
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Depth-first writer for a world's octants.
pub struct OctreeWriter<'a, W: Write> {
    w: &'a mut W,
    bare: bool,
    groups: u64,
    tick: &'a mut dyn FnMut(u64),
}

impl<'a, W: Write> OctreeWriter<'a, W> {
    /// `bare` drops merge masks and surfaces. `tick` receives the number of
    /// groups visited so far every `PROGRESS_INTERVAL` groups.
    pub fn new(w: &'a mut W, bare: bool, tick: &'a mut dyn FnMut(u64)) -> Self {
        Self {
            w,
            bare,
            groups: 0,
            tick,
        }
    }

    /// Groups written so far.
    pub fn groups(&self) -> u64 {
        self.groups
    }

    pub fn write_children(&mut self, children: &[CubeNode; 8]) -> io::Result<()> {
        if self.groups & (PROGRESS_INTERVAL - 1) == 0 {
            (self.tick)(self.groups);
        }
        self.groups += 1;

        for node in children {
            match node {
                CubeNode::Branch(c) => {
                    self.w.write_u8(NodeKind::Children as u8)?;
                    self.write_children(c)?;
                }
                CubeNode::Leaf(c) => self.write_leaf(c)?,
            }
        }
        Ok(())
    }

    fn write_leaf(&mut self, c: &Cube) -> io::Result<()> {
        let mut flags = NodeFlags::empty();
        let mut surfmask = 0u8;
        let mut totalverts = 0usize;
        if c.material != 0 {
            flags |= NodeFlags::MATERIAL;
        }
        if !self.bare {
            if c.merged != 0 {
                flags |= NodeFlags::MERGED;
            }
            for (j, surf) in c.used_surfaces() {
                flags |= NodeFlags::SURFACES;
                surfmask |= 1 << j;
                totalverts += surf.total_verts();
            }
        }

        let w = &mut *self.w;
        if c.is_empty() {
            w.write_u8(flags.bits() | NodeKind::Empty as u8)?;
        } else if c.is_entirely_solid() {
            w.write_u8(flags.bits() | NodeKind::Solid as u8)?;
        } else {
            w.write_u8(flags.bits() | NodeKind::Normal as u8)?;
            w.write_all(&c.edges)?;
        }
        for t in c.texture {
            w.write_u16::<LE>(t)?;
        }
        if flags.contains(NodeFlags::MATERIAL) {
            w.write_u16::<LE>(c.material)?;
        }
        if flags.contains(NodeFlags::MERGED) {
            w.write_u8(c.merged)?;
        }
        if flags.contains(NodeFlags::SURFACES) {
            let totalverts = u8::try_from(totalverts).map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("cube has {totalverts} surface vertices"),
                )
            })?;
            w.write_u8(surfmask)?;
            w.write_u8(totalverts)?;
            for (j, surf) in c.used_surfaces() {
                let merged = c.merged & (1 << j) != 0;
                encode_surface(w, j, surf, merged)?;
            }
        }
        Ok(())
    }
}

/// Vertex mask and rotation for a surface about to be written.
pub fn surface_mask(orient: usize, surf: &SurfaceInfo, merged: bool) -> (VertexMask, usize) {
    let layer = surf.layer_verts();
    let total = surf.total_verts().min(surf.verts.len());
    let mut mask = VertexMask::empty();
    let mut order = 0;
    if total == 0 {
        return (mask, order);
    }

    if merged {
        mask |= VertexMask::XYZ;
        if layer == 4 && total >= 4 {
            let v: [IVec; 4] = std::array::from_fn(|k| surf.verts[k].xyz());
            if let Some(k) = geometry::quad_order(&v, geometry::dimension(orient)) {
                mask |= VertexMask::QUAD_ORDER;
                order = k;
            }
        }
    } else {
        if surf.hint.contains(FaceHint::SPLIT) {
            mask |= VertexMask::QUAD_ORDER;
        }
        if layer < 4 && surf.hint.contains(FaceHint::SECOND_TRI) {
            mask |= VertexMask::SECOND_TRI;
        }
    }

    let first = surf.verts[0].norm;
    let mut match_norm = true;
    for v in &surf.verts[..total] {
        if v.norm != 0 {
            mask |= VertexMask::NORM;
            if v.norm != first {
                match_norm = false;
            }
        }
    }
    if match_norm {
        mask |= VertexMask::SHARED_NORM;
    }
    (mask, order)
}

pub fn encode_surface<W: Write>(
    w: &mut W,
    orient: usize,
    surf: &SurfaceInfo,
    merged: bool,
) -> io::Result<()> {
    let layer = surf.layer_verts();
    let total = surf.total_verts();
    if surf.verts.len() < total {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "face {orient} declares {total} vertices but has {}",
                surf.verts.len()
            ),
        ));
    }
    let (mask, order) = surface_mask(orient, surf, merged);
    w.write_all(&[LMID_AMBIENT, LMID_AMBIENT, mask.bits(), surf.numverts])?;

    let dim = geometry::dimension(orient);
    let (vc, vr) = (C[dim], R[dim]);
    let verts = &surf.verts;
    let mut has_xyz = mask.contains(VertexMask::XYZ);
    let mut has_norm = mask.contains(VertexMask::NORM);

    if layer == 4 && has_xyz && mask.contains(VertexMask::QUAD_ORDER) {
        let v0 = verts[order].xyz();
        let v2 = verts[(order + 2) & 3].xyz();
        for coord in [v0[vc], v0[vr], v2[vc], v2[vr]] {
            w.write_u16::<LE>(coord as u16)?;
        }
        has_xyz = false;
    }
    if has_norm && mask.contains(VertexMask::SHARED_NORM) {
        w.write_u16::<LE>(verts[0].norm)?;
        has_norm = false;
    }
    if has_xyz || has_norm {
        for k in 0..layer {
            let v = &verts[(k + order) % layer];
            if has_xyz {
                let xyz = v.xyz();
                w.write_u16::<LE>(xyz[vc] as u16)?;
                w.write_u16::<LE>(xyz[vr] as u16)?;
            }
            if has_norm {
                w.write_u16::<LE>(v.norm)?;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Result of reading a tree. `failed` means a corrupt node stopped the read;
/// everything after it is empty.
#[derive(Debug)]
pub struct DecodedOctree {
    pub root: Box<[CubeNode; 8]>,
    pub failed: bool,
    pub warnings: Vec<FormatError>,
    pub nodes: u64,
}

#[derive(Default)]
struct LoadState {
    failed: bool,
    warnings: Vec<FormatError>,
    nodes: u64,
}

impl LoadState {
    fn fail(&mut self, err: FormatError) {
        self.failed = true;
        self.warnings.push(err);
    }
}

/// Read the eight root octants of a world of `world_size`.
pub fn decode_octree<R: Read>(r: &mut R, world_size: i32) -> Result<DecodedOctree> {
    let mut st = LoadState::default();
    let root = read_children(r, [0, 0, 0], world_size >> 1, &mut st)?;
    Ok(DecodedOctree {
        root: Box::new(root),
        failed: st.failed,
        warnings: st.warnings,
        nodes: st.nodes,
    })
}

fn read_children<R: Read>(
    r: &mut R,
    origin: IVec,
    size: i32,
    st: &mut LoadState,
) -> Result<[CubeNode; 8]> {
    let mut children = CubeNode::empty_octants();
    for (i, child) in children.iter_mut().enumerate() {
        *child = read_node(r, octant_origin(i, origin, size), size, st)?;
        if st.failed {
            break;
        }
    }
    Ok(children)
}

fn read_node<R: Read>(r: &mut R, origin: IVec, size: i32, st: &mut LoadState) -> Result<CubeNode> {
    st.nodes += 1;
    let octsav = r.read_u8()?;
    let Some(kind) = NodeKind::from_byte(octsav) else {
        st.fail(FormatError::CorruptOctree(format!(
            "unknown node type {} at {origin:?}",
            octsav & NodeKind::MASK
        )));
        return Ok(CubeNode::empty());
    };

    let mut cube = match kind {
        NodeKind::Children => return read_branch(r, origin, size, st),
        NodeKind::LodCube | NodeKind::Empty => Cube::empty(),
        NodeKind::Solid => Cube::solid(),
        NodeKind::Normal => {
            let mut edges = [0u8; 12];
            r.read_exact(&mut edges)?;
            Cube::with_edges(edges)
        }
    };

    r.read_u16_into::<LE>(&mut cube.texture)?;
    let flags = NodeFlags::from_bits_truncate(octsav);
    if flags.contains(NodeFlags::MATERIAL) {
        cube.material = r.read_u16::<LE>()?;
    }
    if flags.contains(NodeFlags::MERGED) {
        cube.merged = r.read_u8()?;
    }
    if flags.contains(NodeFlags::SURFACES) {
        read_surfaces(r, &mut cube, origin, size, st)?;
        if st.failed {
            return Ok(CubeNode::empty());
        }
    }

    if kind == NodeKind::LodCube {
        return read_branch(r, origin, size, st);
    }
    Ok(CubeNode::Leaf(cube))
}

fn read_branch<R: Read>(r: &mut R, origin: IVec, size: i32, st: &mut LoadState) -> Result<CubeNode> {
    if size >> 1 == 0 {
        st.fail(FormatError::CorruptOctree(format!(
            "node at {origin:?} subdivides below unit size"
        )));
        return Ok(CubeNode::empty());
    }
    let children = read_children(r, origin, size >> 1, st)?;
    Ok(CubeNode::branch(children))
}

fn read_surfaces<R: Read>(
    r: &mut R,
    cube: &mut Cube,
    origin: IVec,
    size: i32,
    st: &mut LoadState,
) -> Result<()> {
    let surfmask = r.read_u8()?;
    let declared = usize::from(r.read_u8()?);
    let mut table: [SurfaceInfo; 6] = Default::default();
    let mut offset = 0usize;

    for (orient, surf) in table.iter_mut().enumerate() {
        if surfmask & (1 << orient) == 0 {
            continue;
        }
        let mut psurf = [0u8; 4];
        r.read_exact(&mut psurf)?;
        let mask = VertexMask::from_bits_retain(psurf[2]);
        surf.numverts = psurf[3];
        let total = total_verts(surf.numverts);
        if total == 0 {
            continue;
        }
        offset += total;
        if offset > declared {
            st.fail(FormatError::CorruptOctree(format!(
                "cube at {origin:?} has more surface vertices than the {declared} declared"
            )));
            return Ok(());
        }
        let degenerate = read_surface_verts(r, cube, orient, surf, mask, origin, size)?;
        if degenerate {
            st.warnings.push(FormatError::DegenerateSurface { orient, origin });
        }
    }
    cube.surfaces = Some(Box::new(table));
    Ok(())
}

/// Fill `surf.verts` from the stream. Returns whether the face plane could
/// not be solved for some vertex.
fn read_surface_verts<R: Read>(
    r: &mut R,
    cube: &Cube,
    orient: usize,
    surf: &mut SurfaceInfo,
    mask: VertexMask,
    origin: IVec,
    size: i32,
) -> Result<bool> {
    let layer = surf.layer_verts();
    let total = surf.total_verts();
    let dim = geometry::dimension(orient);
    let (vc, vr) = (C[dim], R[dim]);
    let corners = geometry::face_verts(cube, orient);
    let mut verts = vec![VertexInfo::default(); total];

    let mut has_xyz = mask.contains(VertexMask::XYZ);
    let mut has_uv = mask.contains(VertexMask::UV);
    let mut has_norm = mask.contains(VertexMask::NORM);

    let plane = FacePlane::new(&corners, size, origin);
    let fallback = geometry::corner_position(corners[0], size, origin)[dim];
    let mut degenerate = false;
    let mut place = |c: u16, r: u16| -> IVec {
        let mut xyz = [0; 3];
        xyz[vc] = i32::from(c);
        xyz[vr] = i32::from(r);
        xyz[dim] = plane.solve(dim, xyz[vc], xyz[vr]).unwrap_or_else(|| {
            degenerate = true;
            fallback
        });
        xyz
    };

    if has_xyz {
        surf.hint = FaceHint::empty();
    } else {
        surf.hint = FaceHint::from_bits_truncate(mask.bits());
        let positions =
            geometry::implicit_positions(cube, orient, origin, size, layer, surf.hint);
        for (v, p) in verts.iter_mut().zip(positions) {
            v.set_xyz(p);
        }
    }

    if layer == 4 {
        if has_xyz && mask.contains(VertexMask::QUAD_ORDER) {
            let c1 = r.read_u16::<LE>()?;
            let r1 = r.read_u16::<LE>()?;
            let c2 = r.read_u16::<LE>()?;
            let r2 = r.read_u16::<LE>()?;
            for (v, (c, r)) in verts.iter_mut().zip([(c1, r1), (c1, r2), (c2, r2), (c2, r1)]) {
                v.set_xyz(place(c, r));
            }
            has_xyz = false;
        }
        if has_uv && mask.contains(VertexMask::SECOND_TRI) {
            let n = if surf.has_dup_layer() { 16 } else { 8 };
            stream::skip(r, n)?;
            has_uv = false;
        }
    }
    if has_norm && mask.contains(VertexMask::SHARED_NORM) {
        let norm = r.read_u16::<LE>()?;
        for v in &mut verts[..layer] {
            v.norm = norm;
        }
        has_norm = false;
    }
    if has_xyz || has_uv || has_norm {
        for v in &mut verts[..layer] {
            if has_xyz {
                let c = r.read_u16::<LE>()?;
                let rr = r.read_u16::<LE>()?;
                v.set_xyz(place(c, rr));
            }
            if has_uv {
                stream::skip(r, 4)?;
            }
            if has_norm {
                v.norm = r.read_u16::<LE>()?;
            }
        }
    }
    if surf.numverts & LAYER_DUP != 0 && has_uv {
        stream::skip(r, 4 * layer as u64)?;
    }

    surf.verts = verts;
    Ok(degenerate)
}
