//! Indexed kernel mesh with separate vertex, facet and cell containers.
//!
//! A [`KernelMesh`] stores elements in bulk-created, homogeneous batches:
//! vertices are created first, then facets (all triangles or all quads per
//! creation call) and cells (one [`CellType`] per creation call). After the
//! corners have been assigned, [`Facets::connect`] and [`Cells::connect`]
//! derive the adjacency between neighbouring elements.
//!
//! Creation order is preserved: the n-th created facet is always `FacetId(n)`,
//! which is what makes array/kernel round trips lossless.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::ops::Range;

use nalgebra::Point3;

use super::index::{CellId, FacetId, MeshIndex, VertexId};

/// Kind of a volume element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellType {
    /// Tetrahedron (4 vertices, 4 triangular faces).
    Tet,
    /// Hexahedron (8 vertices, 6 quad faces).
    Hex,
    /// Triangular prism (6 vertices, 2 triangles and 3 quads).
    Prism,
    /// Square pyramid (5 vertices, 1 quad and 4 triangles).
    Pyramid,
}

const TET_FACES: [&[usize]; 4] = [&[1, 2, 3], &[0, 3, 2], &[0, 1, 3], &[0, 2, 1]];
const HEX_FACES: [&[usize]; 6] = [
    &[0, 2, 6, 4],
    &[3, 1, 5, 7],
    &[1, 0, 4, 5],
    &[2, 3, 7, 6],
    &[1, 3, 2, 0],
    &[4, 6, 7, 5],
];
const PRISM_FACES: [&[usize]; 5] = [
    &[0, 1, 2],
    &[3, 5, 4],
    &[0, 3, 4, 1],
    &[0, 2, 5, 3],
    &[1, 4, 5, 2],
];
const PYRAMID_FACES: [&[usize]; 5] = [
    &[0, 1, 2, 3],
    &[0, 4, 1],
    &[0, 3, 4],
    &[2, 4, 3],
    &[2, 1, 4],
];

impl CellType {
    /// Number of vertices of this cell type.
    pub fn nb_vertices(self) -> usize {
        match self {
            CellType::Tet => 4,
            CellType::Hex => 8,
            CellType::Prism => 6,
            CellType::Pyramid => 5,
        }
    }

    /// Local vertex indices of each face of this cell type.
    ///
    /// For tetrahedra, face `i` is the face opposite local vertex `i`.
    pub fn faces(self) -> &'static [&'static [usize]] {
        match self {
            CellType::Tet => &TET_FACES,
            CellType::Hex => &HEX_FACES,
            CellType::Prism => &PRISM_FACES,
            CellType::Pyramid => &PYRAMID_FACES,
        }
    }

    /// Number of faces of this cell type.
    pub fn nb_faces(self) -> usize {
        self.faces().len()
    }
}

/// Vertex container of a [`KernelMesh`].
#[derive(Debug, Clone)]
pub struct Vertices<I: MeshIndex = u32> {
    points: Vec<Point3<f64>>,
    _index: PhantomData<I>,
}

impl<I: MeshIndex> Default for Vertices<I> {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            _index: PhantomData,
        }
    }
}

impl<I: MeshIndex> Vertices<I> {
    /// Number of vertices.
    #[inline]
    pub fn nb(&self) -> usize {
        self.points.len()
    }

    /// Create `count` vertices at the origin and return the id of the first one.
    pub fn create_vertices(&mut self, count: usize) -> VertexId<I> {
        let first = VertexId::new(self.points.len());
        self.points.resize(self.points.len() + count, Point3::origin());
        first
    }

    /// Create a single vertex at the given position.
    pub fn create_vertex(&mut self, position: Point3<f64>) -> VertexId<I> {
        let id = VertexId::new(self.points.len());
        self.points.push(position);
        id
    }

    /// Position of a vertex.
    #[inline]
    pub fn point(&self, v: VertexId<I>) -> &Point3<f64> {
        &self.points[v.index()]
    }

    /// Set the position of a vertex.
    #[inline]
    pub fn set_point(&mut self, v: VertexId<I>, position: Point3<f64>) {
        self.points[v.index()] = position;
    }

    /// All vertex positions in creation order.
    #[inline]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Iterate over all vertex IDs.
    pub fn ids(&self) -> impl Iterator<Item = VertexId<I>> + '_ {
        (0..self.points.len()).map(VertexId::new)
    }

    fn clear(&mut self) {
        self.points.clear();
    }
}

/// Facet container of a [`KernelMesh`].
///
/// Facets are polygons stored as contiguous corner ranges. Each corner also
/// stores the facet adjacent across the edge leaving that corner.
#[derive(Debug, Clone)]
pub struct Facets<I: MeshIndex = u32> {
    corner_vertex: Vec<VertexId<I>>,
    corner_adjacent: Vec<FacetId<I>>,
    facet_ptr: Vec<usize>,
}

impl<I: MeshIndex> Default for Facets<I> {
    fn default() -> Self {
        Self {
            corner_vertex: Vec::new(),
            corner_adjacent: Vec::new(),
            facet_ptr: vec![0],
        }
    }
}

impl<I: MeshIndex> Facets<I> {
    /// Number of facets.
    #[inline]
    pub fn nb(&self) -> usize {
        self.facet_ptr.len() - 1
    }

    /// Create `count` triangles with unassigned corners, returning the first id.
    pub fn create_triangles(&mut self, count: usize) -> FacetId<I> {
        self.create_polygons(count, 3)
    }

    /// Create `count` quads with unassigned corners, returning the first id.
    pub fn create_quads(&mut self, count: usize) -> FacetId<I> {
        self.create_polygons(count, 4)
    }

    fn create_polygons(&mut self, count: usize, arity: usize) -> FacetId<I> {
        let first = FacetId::new(self.nb());
        let total = count * arity;
        self.corner_vertex
            .resize(self.corner_vertex.len() + total, VertexId::invalid());
        self.corner_adjacent
            .resize(self.corner_adjacent.len() + total, FacetId::invalid());
        let mut end = self.corner_vertex.len() - total;
        for _ in 0..count {
            end += arity;
            self.facet_ptr.push(end);
        }
        first
    }

    /// Corner range of a facet.
    #[inline]
    pub fn corners(&self, f: FacetId<I>) -> Range<usize> {
        self.facet_ptr[f.index()]..self.facet_ptr[f.index() + 1]
    }

    /// Number of vertices of a facet.
    #[inline]
    pub fn nb_vertices(&self, f: FacetId<I>) -> usize {
        self.corners(f).len()
    }

    /// Vertex at local position `lv` of a facet.
    #[inline]
    pub fn vertex(&self, f: FacetId<I>, lv: usize) -> VertexId<I> {
        self.corner_vertex[self.facet_ptr[f.index()] + lv]
    }

    /// Assign the vertex at local position `lv` of a facet.
    #[inline]
    pub fn set_vertex(&mut self, f: FacetId<I>, lv: usize, v: VertexId<I>) {
        debug_assert!(lv < self.nb_vertices(f));
        let c = self.facet_ptr[f.index()] + lv;
        self.corner_vertex[c] = v;
    }

    /// All vertices of a facet, in order.
    #[inline]
    pub fn vertices(&self, f: FacetId<I>) -> &[VertexId<I>] {
        &self.corner_vertex[self.corners(f)]
    }

    /// Facet adjacent across the edge from local vertex `le` to `le + 1`.
    ///
    /// Invalid on borders, on non-manifold edges and before [`Facets::connect`].
    #[inline]
    pub fn adjacent(&self, f: FacetId<I>, le: usize) -> FacetId<I> {
        self.corner_adjacent[self.facet_ptr[f.index()] + le]
    }

    /// Whether every facet is a triangle.
    pub fn are_simplices(&self) -> bool {
        self.facet_ptr.windows(2).all(|w| w[1] - w[0] == 3)
    }

    /// Iterate over all facet IDs.
    pub fn ids(&self) -> impl Iterator<Item = FacetId<I>> + '_ {
        (0..self.nb()).map(FacetId::new)
    }

    /// Derive facet adjacency from shared edges.
    ///
    /// Edges shared by exactly two facets link both corners; border edges and
    /// non-manifold edges (three or more facets) stay unlinked.
    pub fn connect(&mut self) {
        let mut edge_corners: HashMap<(usize, usize), Vec<(usize, usize)>> = HashMap::new();

        for f in 0..self.nb() {
            let start = self.facet_ptr[f];
            let end = self.facet_ptr[f + 1];
            for c in start..end {
                let next = if c + 1 == end { start } else { c + 1 };
                let a = self.corner_vertex[c];
                let b = self.corner_vertex[next];
                if !a.is_valid() || !b.is_valid() {
                    continue;
                }
                let (a, b) = (a.index(), b.index());
                let key = if a < b { (a, b) } else { (b, a) };
                edge_corners.entry(key).or_default().push((f, c));
            }
        }

        self.corner_adjacent.fill(FacetId::invalid());

        let mut non_manifold = 0usize;
        for corners in edge_corners.values() {
            match corners.as_slice() {
                [(f0, c0), (f1, c1)] => {
                    self.corner_adjacent[*c0] = FacetId::new(*f1);
                    self.corner_adjacent[*c1] = FacetId::new(*f0);
                }
                [_] => {}
                _ => non_manifold += 1,
            }
        }

        if non_manifold > 0 {
            log::warn!("{} non-manifold facet edges left unconnected", non_manifold);
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Cell container of a [`KernelMesh`].
#[derive(Debug, Clone)]
pub struct Cells<I: MeshIndex = u32> {
    cell_type: Vec<CellType>,
    cell_ptr: Vec<usize>,
    corner_vertex: Vec<VertexId<I>>,
    adjacent_ptr: Vec<usize>,
    face_adjacent: Vec<CellId<I>>,
}

impl<I: MeshIndex> Default for Cells<I> {
    fn default() -> Self {
        Self {
            cell_type: Vec::new(),
            cell_ptr: vec![0],
            corner_vertex: Vec::new(),
            adjacent_ptr: vec![0],
            face_adjacent: Vec::new(),
        }
    }
}

impl<I: MeshIndex> Cells<I> {
    /// Number of cells.
    #[inline]
    pub fn nb(&self) -> usize {
        self.cell_type.len()
    }

    /// Create `count` tetrahedra with unassigned corners, returning the first id.
    pub fn create_tets(&mut self, count: usize) -> CellId<I> {
        self.create_cells(count, CellType::Tet)
    }

    /// Create `count` hexahedra with unassigned corners, returning the first id.
    pub fn create_hexes(&mut self, count: usize) -> CellId<I> {
        self.create_cells(count, CellType::Hex)
    }

    /// Create `count` prisms with unassigned corners, returning the first id.
    pub fn create_prisms(&mut self, count: usize) -> CellId<I> {
        self.create_cells(count, CellType::Prism)
    }

    /// Create `count` pyramids with unassigned corners, returning the first id.
    pub fn create_pyramids(&mut self, count: usize) -> CellId<I> {
        self.create_cells(count, CellType::Pyramid)
    }

    /// Create `count` cells of a single type, returning the first id.
    pub fn create_cells(&mut self, count: usize, cell_type: CellType) -> CellId<I> {
        let first = CellId::new(self.nb());
        let nv = cell_type.nb_vertices();
        let nf = cell_type.nb_faces();

        self.cell_type.resize(self.cell_type.len() + count, cell_type);
        self.corner_vertex
            .resize(self.corner_vertex.len() + count * nv, VertexId::invalid());
        self.face_adjacent
            .resize(self.face_adjacent.len() + count * nf, CellId::invalid());

        for _ in 0..count {
            let last = self.cell_ptr[self.cell_ptr.len() - 1];
            self.cell_ptr.push(last + nv);
            let last = self.adjacent_ptr[self.adjacent_ptr.len() - 1];
            self.adjacent_ptr.push(last + nf);
        }
        first
    }

    /// Type of a cell.
    #[inline]
    pub fn cell_type(&self, c: CellId<I>) -> CellType {
        self.cell_type[c.index()]
    }

    /// Number of vertices of a cell.
    #[inline]
    pub fn nb_vertices(&self, c: CellId<I>) -> usize {
        self.cell_type(c).nb_vertices()
    }

    /// Vertex at local position `lv` of a cell.
    #[inline]
    pub fn vertex(&self, c: CellId<I>, lv: usize) -> VertexId<I> {
        self.corner_vertex[self.cell_ptr[c.index()] + lv]
    }

    /// Assign the vertex at local position `lv` of a cell.
    #[inline]
    pub fn set_vertex(&mut self, c: CellId<I>, lv: usize, v: VertexId<I>) {
        debug_assert!(lv < self.nb_vertices(c));
        let corner = self.cell_ptr[c.index()] + lv;
        self.corner_vertex[corner] = v;
    }

    /// All vertices of a cell, in order.
    #[inline]
    pub fn vertices(&self, c: CellId<I>) -> &[VertexId<I>] {
        &self.corner_vertex[self.cell_ptr[c.index()]..self.cell_ptr[c.index() + 1]]
    }

    /// Cell adjacent across local face `lf`.
    ///
    /// Invalid on the border and before [`Cells::connect`].
    #[inline]
    pub fn adjacent(&self, c: CellId<I>, lf: usize) -> CellId<I> {
        self.face_adjacent[self.adjacent_ptr[c.index()] + lf]
    }

    /// Whether every cell is a tetrahedron.
    pub fn are_simplices(&self) -> bool {
        self.cell_type.iter().all(|&t| t == CellType::Tet)
    }

    /// Iterate over all cell IDs.
    pub fn ids(&self) -> impl Iterator<Item = CellId<I>> + '_ {
        (0..self.nb()).map(CellId::new)
    }

    /// Derive cell adjacency from shared faces.
    ///
    /// A face is matched by its vertex set, so a triangle never matches a quad.
    pub fn connect(&mut self) {
        let mut face_slots: HashMap<Vec<usize>, Vec<(usize, usize)>> = HashMap::new();

        for c in 0..self.nb() {
            let base = self.cell_ptr[c];
            for (lf, face) in self.cell_type[c].faces().iter().enumerate() {
                let mut key: Vec<usize> = face
                    .iter()
                    .map(|&lv| self.corner_vertex[base + lv])
                    .filter(|v| v.is_valid())
                    .map(|v| v.index())
                    .collect();
                if key.len() != face.len() {
                    continue;
                }
                key.sort_unstable();
                face_slots
                    .entry(key)
                    .or_default()
                    .push((c, self.adjacent_ptr[c] + lf));
            }
        }

        self.face_adjacent.fill(CellId::invalid());

        let mut non_manifold = 0usize;
        for slots in face_slots.values() {
            match slots.as_slice() {
                [(c0, s0), (c1, s1)] => {
                    self.face_adjacent[*s0] = CellId::new(*c1);
                    self.face_adjacent[*s1] = CellId::new(*c0);
                }
                [_] => {}
                _ => non_manifold += 1,
            }
        }

        if non_manifold > 0 {
            log::warn!("{} non-manifold cell faces left unconnected", non_manifold);
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// An indexed mesh with vertex, facet and cell containers.
#[derive(Debug, Clone)]
pub struct KernelMesh<I: MeshIndex = u32> {
    /// Vertex positions.
    pub vertices: Vertices<I>,
    /// Surface polygons.
    pub facets: Facets<I>,
    /// Volume elements.
    pub cells: Cells<I>,
}

impl<I: MeshIndex> Default for KernelMesh<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: MeshIndex> KernelMesh<I> {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self {
            vertices: Vertices::default(),
            facets: Facets::default(),
            cells: Cells::default(),
        }
    }

    /// Remove all vertices, facets and cells.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.facets.clear();
        self.cells.clear();
    }

    /// Axis-aligned bounding box of the vertices, or `None` if the mesh is empty.
    pub fn bbox(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        bounding_box(self.vertices.points())
    }

    /// Area of a facet (fan-triangulated from its first vertex).
    pub fn facet_area(&self, f: FacetId<I>) -> f64 {
        self.facet_triangles(f)
            .map(|[a, b, c]| {
                let (pa, pb, pc) = (
                    self.vertices.point(a),
                    self.vertices.point(b),
                    self.vertices.point(c),
                );
                (pb - pa).cross(&(pc - pa)).norm() * 0.5
            })
            .sum()
    }

    /// Fan triangulation of a facet.
    pub fn facet_triangles(&self, f: FacetId<I>) -> impl Iterator<Item = [VertexId<I>; 3]> + '_ {
        let vs = self.facets.vertices(f);
        (1..vs.len().saturating_sub(1)).map(move |i| [vs[0], vs[i], vs[i + 1]])
    }

    /// Unsigned volume of a tetrahedral cell, or `None` for other cell types.
    pub fn tet_volume(&self, c: CellId<I>) -> Option<f64> {
        if self.cells.cell_type(c) != CellType::Tet {
            return None;
        }
        let [a, b, c, d] = self.tet_points(c);
        Some(((b - a).cross(&(c - a)).dot(&(d - a)) / 6.0).abs())
    }

    /// Corner positions of a tetrahedral cell.
    pub fn tet_points(&self, c: CellId<I>) -> [Point3<f64>; 4] {
        let vs = self.cells.vertices(c);
        [
            *self.vertices.point(vs[0]),
            *self.vertices.point(vs[1]),
            *self.vertices.point(vs[2]),
            *self.vertices.point(vs[3]),
        ]
    }
}

/// Axis-aligned bounding box of a point set, or `None` if it is empty.
pub fn bounding_box(points: &[Point3<f64>]) -> Option<(Point3<f64>, Point3<f64>)> {
    let first = points.first()?;
    let (mut pmin, mut pmax) = (*first, *first);
    for p in &points[1..] {
        pmin = pmin.inf(p);
        pmax = pmax.sup(p);
    }
    Some((pmin, pmax))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_triangles() -> KernelMesh {
        let mut mesh = KernelMesh::new();
        for p in [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, -1.0, 0.0),
        ] {
            mesh.vertices.create_vertex(p);
        }
        let first = mesh.facets.create_triangles(2);
        let second = FacetId::new(first.index() + 1);
        for (lv, v) in [0, 1, 2].into_iter().enumerate() {
            mesh.facets.set_vertex(first, lv, VertexId::new(v));
        }
        for (lv, v) in [1, 0, 3].into_iter().enumerate() {
            mesh.facets.set_vertex(second, lv, VertexId::new(v));
        }
        mesh.facets.connect();
        mesh
    }

    #[test]
    fn test_facet_connect_shared_edge() {
        let mesh = two_triangles();
        let f0 = FacetId::new(0);
        let f1 = FacetId::new(1);

        assert_eq!(mesh.facets.nb(), 2);
        assert_eq!(mesh.facets.adjacent(f0, 0), f1);
        assert_eq!(mesh.facets.adjacent(f1, 0), f0);
        assert!(!mesh.facets.adjacent(f0, 1).is_valid());
        assert!(!mesh.facets.adjacent(f0, 2).is_valid());
        assert!(mesh.facets.are_simplices());
    }

    #[test]
    fn test_facet_non_manifold_edge_unlinked() {
        let mut mesh = two_triangles();
        let v = mesh.vertices.create_vertex(Point3::new(0.5, 0.0, 1.0));
        let f = mesh.facets.create_triangles(1);
        mesh.facets.set_vertex(f, 0, VertexId::new(0));
        mesh.facets.set_vertex(f, 1, VertexId::new(1));
        mesh.facets.set_vertex(f, 2, v);
        mesh.facets.connect();

        for f in mesh.facets.ids() {
            for le in 0..3 {
                let a = mesh.facets.vertex(f, le).index();
                let b = mesh.facets.vertex(f, (le + 1) % 3).index();
                if (a.min(b), a.max(b)) == (0, 1) {
                    assert!(!mesh.facets.adjacent(f, le).is_valid());
                }
            }
        }
    }

    #[test]
    fn test_mixed_facet_batches() {
        let mut mesh: KernelMesh = KernelMesh::new();
        mesh.vertices.create_vertices(5);
        mesh.facets.create_triangles(1);
        let q = mesh.facets.create_quads(1);

        assert_eq!(q.index(), 1);
        assert_eq!(mesh.facets.nb_vertices(FacetId::new(0)), 3);
        assert_eq!(mesh.facets.nb_vertices(q), 4);
        assert!(!mesh.facets.are_simplices());
    }

    #[test]
    fn test_cell_connect_shared_face() {
        let mut mesh: KernelMesh<u16> = KernelMesh::new();
        for p in [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
        ] {
            mesh.vertices.create_vertex(p);
        }
        mesh.cells.create_tets(2);
        for (c, tet) in [[0, 1, 2, 3], [4, 1, 3, 2]].iter().enumerate() {
            for (lv, &v) in tet.iter().enumerate() {
                mesh.cells.set_vertex(CellId::new(c), lv, VertexId::new(v));
            }
        }
        mesh.cells.connect();

        let c0 = CellId::new(0);
        let c1 = CellId::new(1);
        // Face opposite local vertex 0 is {1, 2, 3} in both cells.
        assert_eq!(mesh.cells.adjacent(c0, 0), c1);
        assert_eq!(mesh.cells.adjacent(c1, 0), c0);
        for lf in 1..4 {
            assert!(!mesh.cells.adjacent(c0, lf).is_valid());
        }
        assert!(mesh.cells.are_simplices());
    }

    #[test]
    fn test_non_tet_cells_are_not_simplices() {
        let mut mesh: KernelMesh = KernelMesh::new();
        mesh.vertices.create_vertices(8);
        mesh.cells.create_tets(1);
        let hex = mesh.cells.create_hexes(1);

        assert_eq!(mesh.cells.cell_type(hex), CellType::Hex);
        assert_eq!(mesh.cells.nb_vertices(hex), 8);
        assert!(!mesh.cells.are_simplices());
        assert_eq!(mesh.tet_volume(hex), None);
    }

    #[test]
    fn test_geometry_helpers() {
        let mut mesh: KernelMesh = KernelMesh::new();
        for p in [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 3.0),
        ] {
            mesh.vertices.create_vertex(p);
        }
        let q = mesh.facets.create_quads(1);
        for lv in 0..4 {
            mesh.facets.set_vertex(q, lv, VertexId::new(lv));
        }
        let t = mesh.cells.create_tets(1);
        for (lv, v) in [0, 1, 3, 4].into_iter().enumerate() {
            mesh.cells.set_vertex(t, lv, VertexId::new(v));
        }

        assert!((mesh.facet_area(q) - 2.0).abs() < 1e-12);
        assert!((mesh.tet_volume(t).unwrap_or(0.0) - 1.0).abs() < 1e-12);

        let (pmin, pmax) = mesh.bbox().unwrap();
        assert_eq!(pmin, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(pmax, Point3::new(2.0, 1.0, 3.0));

        mesh.clear();
        assert_eq!(mesh.vertices.nb(), 0);
        assert_eq!(mesh.facets.nb(), 0);
        assert_eq!(mesh.cells.nb(), 0);
        assert!(mesh.bbox().is_none());
    }
}
