// Face geometry derived from a cube's packed edges.
//
// A surface stores only the two in-plane coordinates of each vertex. The
// third is recovered from the plane through the face corners, which are in
// turn generated from the twelve edge bytes. Everything here works in the
// 1/8-unit lattice used by `VertexInfo`.

use crate::world::{Cube, FaceHint};

/// In-plane column axis for each face dimension.
pub const C: [usize; 3] = [2, 0, 1];
/// In-plane row axis for each face dimension.
pub const R: [usize; 3] = [1, 2, 0];

pub type IVec = [i32; 3];

/// Axis perpendicular to face `orient`.
#[inline]
pub fn dimension(orient: usize) -> usize {
    orient >> 1
}

/// Start (coord 0) or end (coord 1) of a packed edge, 0..=15.
#[inline]
pub fn edge_get(edge: u8, coord: usize) -> i32 {
    if coord != 0 {
        i32::from(edge >> 4)
    } else {
        i32::from(edge & 0xF)
    }
}

/// Edge of axis group `d` at corner `(x, y)` of the other two axes.
#[inline]
pub fn cube_edge(c: &Cube, d: usize, x: usize, y: usize) -> u8 {
    c.edges[(d << 2) + (y << 1) + x]
}

// Corner selectors of the four vertices of each face, wound consistently.
const FACE_CORNERS: [[[usize; 3]; 4]; 6] = [
    [[0, 1, 1], [0, 1, 0], [0, 0, 0], [0, 0, 1]],
    [[1, 1, 1], [1, 0, 1], [1, 0, 0], [1, 1, 0]],
    [[1, 0, 1], [0, 0, 1], [0, 0, 0], [1, 0, 0]],
    [[0, 1, 1], [1, 1, 1], [1, 1, 0], [0, 1, 0]],
    [[0, 0, 0], [0, 1, 0], [1, 1, 0], [1, 0, 0]],
    [[0, 0, 1], [1, 0, 1], [1, 1, 1], [0, 1, 1]],
];

/// The four corners of face `orient`, each component in 0..=8.
pub fn face_verts(c: &Cube, orient: usize) -> [IVec; 4] {
    FACE_CORNERS[orient].map(|[x, y, z]| {
        [
            edge_get(cube_edge(c, 0, y, z), x),
            edge_get(cube_edge(c, 1, z, x), y),
            edge_get(cube_edge(c, 2, x, y), z),
        ]
    })
}

#[inline]
fn sub(a: IVec, b: IVec) -> IVec {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
fn cross(a: IVec, b: IVec) -> IVec {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
fn dot64(a: IVec, b: IVec) -> i64 {
    (0..3).map(|i| i64::from(a[i]) * i64::from(b[i])).sum()
}

/// Lattice offset of a node origin: the low 12 bits, in 1/8 units.
#[inline]
pub fn vertex_origin(origin: IVec) -> IVec {
    origin.map(|c| (c & 0xFFF) << 3)
}

/// Corner `v` scaled to a lattice position inside a node of `size`.
///
/// Wraps on overflow; stored positions keep only the low 16 bits.
#[inline]
pub fn corner_position(v: IVec, size: i32, origin: IVec) -> IVec {
    let vo = vertex_origin(origin);
    std::array::from_fn(|k| v[k].wrapping_mul(size).wrapping_add(vo[k]))
}

/// Plane through the corners of a face, in lattice units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacePlane {
    pub normal: IVec,
    pub bias: i64,
}

impl FacePlane {
    /// Plane of `corners` for a node of `size` at `origin`. The normal is
    /// `(v1-v0)x(v2-v0)`, or `(v2-v0)x(v3-v0)` when the first is zero.
    pub fn new(corners: &[IVec; 4], size: i32, origin: IVec) -> Self {
        let e1 = sub(corners[1], corners[0]);
        let e2 = sub(corners[2], corners[0]);
        let mut normal = cross(e1, e2);
        if normal == [0; 3] {
            normal = cross(e2, sub(corners[3], corners[0]));
        }
        let bias = -dot64(normal, corner_position(corners[0], size, origin));
        Self { normal, bias }
    }

    /// The coordinate along `dim` of the in-plane point `(c, r)`, or `None`
    /// when the plane is parallel to `dim`.
    pub fn solve(&self, dim: usize, c: i32, r: i32) -> Option<i32> {
        let n = self.normal;
        if n[dim] == 0 {
            return None;
        }
        let num = self.bias + i64::from(n[C[dim]]) * i64::from(c) + i64::from(n[R[dim]]) * i64::from(r);
        Some((-num / i64::from(n[dim])) as i32)
    }
}

/// Rotation `k` under which a quad is an axis-aligned rectangle in the
/// (C, R) basis of `dim`, if there is one.
pub fn quad_order(verts: &[IVec; 4], dim: usize) -> Option<usize> {
    let (vc, vr) = (C[dim], R[dim]);
    (0..4).find(|&k| {
        let v0 = verts[k];
        let v1 = verts[(k + 1) & 3];
        let v2 = verts[(k + 2) & 3];
        let v3 = verts[(k + 3) & 3];
        v1[vc] == v0[vc] && v1[vr] == v2[vr] && v3[vc] == v2[vc] && v3[vr] == v0[vr]
    })
}

/// The corners a non-merged face renders, in order.
///
/// Quads use all four corners starting at 0, or at 1 when split along the
/// other diagonal. Faces with fewer vertices are a single triangle; the
/// hint picks which one.
pub fn implicit_corners(corners: &[IVec; 4], layer_verts: usize, hint: FaceHint) -> Vec<IVec> {
    let vis = if layer_verts < 4 {
        if hint.contains(FaceHint::SECOND_TRI) { 2 } else { 1 }
    } else {
        3
    };
    let order = usize::from(hint.contains(FaceHint::SPLIT));
    let mut out = Vec::with_capacity(4);
    out.push(corners[order]);
    if vis & 1 != 0 {
        out.push(corners[order + 1]);
    }
    out.push(corners[order + 2]);
    if vis & 2 != 0 {
        out.push(corners[(order + 3) & 3]);
    }
    out
}

/// Lattice positions of the vertices a non-merged face of `c` carries.
pub fn implicit_positions(
    c: &Cube,
    orient: usize,
    origin: IVec,
    size: i32,
    layer_verts: usize,
    hint: FaceHint,
) -> Vec<IVec> {
    let corners = face_verts(c, orient);
    implicit_corners(&corners, layer_verts, hint)
        .into_iter()
        .map(|v| corner_position(v, size, origin))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_cube_faces_span_lattice() {
        let c = Cube::solid();
        assert_eq!(
            face_verts(&c, 0),
            [[0, 8, 8], [0, 8, 0], [0, 0, 0], [0, 0, 8]]
        );
        assert_eq!(
            face_verts(&c, 5),
            [[0, 0, 8], [8, 0, 8], [8, 8, 8], [0, 8, 8]]
        );
        for orient in 0..6 {
            let d = dimension(orient);
            let side = if orient & 1 == 1 { 8 } else { 0 };
            assert!(face_verts(&c, orient).iter().all(|v| v[d] == side));
        }
    }

    #[test]
    fn plane_solve_recovers_flat_face() {
        let c = Cube::solid();
        let origin = [16, 32, 8];
        let size = 4;
        for orient in 0..6 {
            let d = dimension(orient);
            let corners = face_verts(&c, orient);
            let plane = FacePlane::new(&corners, size, origin);
            for v in corners {
                let p = corner_position(v, size, origin);
                assert_eq!(plane.solve(d, p[C[d]], p[R[d]]), Some(p[d]), "orient {orient}");
            }
        }
    }

    #[test]
    fn plane_solve_on_slanted_face() {
        // Pull the top edges of the z group down to 4 on one side.
        let mut edges = [0x80u8; 12];
        edges[10] = 0x40;
        edges[11] = 0x40;
        let c = Cube::with_edges(edges);
        let corners = face_verts(&c, 5);
        let plane = FacePlane::new(&corners, 1, [0; 3]);
        for v in corners {
            assert_eq!(plane.solve(2, v[C[2]], v[R[2]]), Some(v[2]));
        }
    }

    #[test]
    fn degenerate_plane_has_no_solution() {
        let plane = FacePlane {
            normal: [1, 0, 0],
            bias: 0,
        };
        assert_eq!(plane.solve(2, 3, 4), None);
    }

    #[test]
    fn normal_falls_back_to_second_triangle() {
        let corners = [[0, 0, 0], [0, 0, 0], [0, 8, 0], [8, 8, 0]];
        let plane = FacePlane::new(&corners, 1, [0; 3]);
        assert_ne!(plane.normal, [0; 3]);
        assert_eq!(plane.normal[0], 0);
        assert_eq!(plane.normal[1], 0);
    }

    #[test]
    fn quad_order_finds_rectangle_rotation() {
        // Dim 2: C = y, R = x.
        let rect = [[0, 0, 0], [0, 8, 0], [8, 8, 0], [8, 0, 0]];
        assert_eq!(quad_order(&rect, 2), Some(1));
        let rotated = [rect[1], rect[2], rect[3], rect[0]];
        assert_eq!(quad_order(&rotated, 2), Some(0));
        let skew = [[0, 0, 0], [1, 8, 0], [8, 8, 0], [8, 0, 0]];
        assert_eq!(quad_order(&skew, 2), None);
    }

    #[test]
    fn implicit_corners_by_hint() {
        let corners = [[0, 0, 0], [1, 0, 0], [2, 0, 0], [3, 0, 0]];
        assert_eq!(implicit_corners(&corners, 4, FaceHint::empty()), corners.to_vec());
        assert_eq!(
            implicit_corners(&corners, 4, FaceHint::SPLIT),
            vec![corners[1], corners[2], corners[3], corners[0]]
        );
        assert_eq!(
            implicit_corners(&corners, 3, FaceHint::empty()),
            vec![corners[0], corners[1], corners[2]]
        );
        assert_eq!(
            implicit_corners(&corners, 3, FaceHint::SECOND_TRI),
            vec![corners[0], corners[2], corners[3]]
        );
    }

    #[test]
    fn vertex_origin_masks_low_bits() {
        assert_eq!(vertex_origin([0x1001, 8, 0]), [8, 64, 0]);
    }
}
