//! Polygon solids whose polygons remember the face they belong to.
//!
//! Every polygon carries a face tag in its metadata. Booleans keep the tags
//! of both operands apart and renumber them afterwards, so that the faces of
//! a result are exactly the groups of polygons sharing a tag.

use crate::bsp::Node;
use crate::errors::CsgError;
use crate::float_types::parry3d::{
    bounding_volume::Aabb,
    query::PointQuery,
    shape::{Shape, TriMesh, Triangle},
};
use crate::float_types::{EPSILON, PI, Real, TAU};
use crate::plane::Plane;
use crate::polygon::Polygon;
use crate::vertex::Vertex;
use hashbrown::HashMap;
use nalgebra::{Matrix4, Point3, Vector3, partial_max, partial_min};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A closed polygon solid. Polygon metadata is the face tag.
#[derive(Debug, Clone, Default)]
pub struct MeshSolid {
    pub polygons: Vec<Polygon<usize>>,
}

impl MeshSolid {
    pub fn new() -> Self {
        MeshSolid { polygons: Vec::new() }
    }

    pub fn from_polygons(polygons: &[Polygon<usize>]) -> Self {
        MeshSolid {
            polygons: polygons.to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// One past the largest face tag.
    fn tag_bound(&self) -> usize {
        self.polygons
            .iter()
            .filter_map(|p| p.metadata)
            .max()
            .map_or(0, |t| t + 1)
    }

    fn shift_tags(&self, by: usize) -> Vec<Polygon<usize>> {
        self.polygons
            .iter()
            .cloned()
            .map(|mut p| {
                p.metadata = Some(p.metadata.unwrap_or(0) + by);
                p
            })
            .collect()
    }

    /// Renumber face tags densely in order of first appearance.
    fn compacted(mut polygons: Vec<Polygon<usize>>) -> MeshSolid {
        let mut seen: HashMap<usize, usize> = HashMap::new();
        for p in &mut polygons {
            let old = p.metadata.unwrap_or(0);
            let next = seen.len();
            p.metadata = Some(*seen.entry(old).or_insert(next));
        }
        MeshSolid { polygons }
    }

    /// Number of distinct faces.
    pub fn face_count(&self) -> usize {
        let mut tags: Vec<usize> = self.polygons.iter().filter_map(|p| p.metadata).collect();
        tags.sort_unstable();
        tags.dedup();
        tags.len()
    }

    fn trees(&self, other: &MeshSolid) -> (Node<usize>, Node<usize>) {
        let a = Node::new(&self.polygons);
        let b = Node::new(&other.shift_tags(self.tag_bound()));
        (a, b)
    }

    #[must_use = "Use new solid representing space in both solids"]
    pub fn union(&self, other: &MeshSolid) -> MeshSolid {
        let (mut a, mut b) = self.trees(other);

        a.clip_to(&b);
        b.clip_to(&a);
        b.invert();
        b.clip_to(&a);
        b.invert();
        a.build(&b.all_polygons());

        MeshSolid::compacted(a.all_polygons())
    }

    #[must_use = "Use new solid"]
    pub fn difference(&self, other: &MeshSolid) -> MeshSolid {
        let (mut a, mut b) = self.trees(other);

        a.invert();
        a.clip_to(&b);
        b.clip_to(&a);
        b.invert();
        b.clip_to(&a);
        b.invert();
        a.build(&b.all_polygons());
        a.invert();

        MeshSolid::compacted(a.all_polygons())
    }

    #[must_use = "Use new solid"]
    pub fn intersection(&self, other: &MeshSolid) -> MeshSolid {
        let (mut a, mut b) = self.trees(other);

        a.invert();
        b.clip_to(&a);
        b.invert();
        a.clip_to(&b);
        b.clip_to(&a);
        a.build(&b.all_polygons());
        a.invert();

        MeshSolid::compacted(a.all_polygons())
    }

    /// Flip inside and outside.
    pub fn inverse(&self) -> MeshSolid {
        let mut solid = self.clone();
        for p in &mut solid.polygons {
            p.flip();
        }
        solid
    }

    /// Disjoint collection of solids, faces listed part by part.
    pub fn compound(parts: &[MeshSolid]) -> MeshSolid {
        let mut polygons = Vec::new();
        let mut offset = 0;
        for part in parts {
            let part = MeshSolid::compacted(part.polygons.clone());
            polygons.extend(part.shift_tags(offset));
            offset += part.tag_bound();
        }
        MeshSolid { polygons }
    }

    /// Apply an invertible 4×4 affine matrix to every vertex and normal.
    pub fn transform(&self, mat: &Matrix4<Real>) -> Result<MeshSolid, CsgError> {
        let mat_inv_transpose = mat
            .try_inverse()
            .ok_or_else(|| CsgError::InvalidParameter("transformation matrix is singular".into()))?
            .transpose();
        let mut solid = self.clone();

        for poly in &mut solid.polygons {
            for vert in &mut poly.vertices {
                let hom_pos = mat * vert.pos.to_homogeneous();
                vert.pos = Point3::from_homogeneous(hom_pos).ok_or_else(|| {
                    CsgError::InvalidParameter("transformation is not affine".into())
                })?;
                vert.normal = mat_inv_transpose.transform_vector(&vert.normal).normalize();
            }
            poly.plane = Plane::from_vertices(&poly.vertices);
        }
        Ok(solid)
    }

    /// Axis-aligned bounding box of every vertex, degenerate at the origin when empty.
    pub fn bounding_box(&self) -> Aabb {
        let mut min_x = Real::MAX;
        let mut min_y = Real::MAX;
        let mut min_z = Real::MAX;
        let mut max_x = -Real::MAX;
        let mut max_y = -Real::MAX;
        let mut max_z = -Real::MAX;

        for poly in &self.polygons {
            for v in &poly.vertices {
                min_x = *partial_min(&min_x, &v.pos.x).unwrap_or(&min_x);
                min_y = *partial_min(&min_y, &v.pos.y).unwrap_or(&min_y);
                min_z = *partial_min(&min_z, &v.pos.z).unwrap_or(&min_z);

                max_x = *partial_max(&max_x, &v.pos.x).unwrap_or(&max_x);
                max_y = *partial_max(&max_y, &v.pos.y).unwrap_or(&max_y);
                max_z = *partial_max(&max_z, &v.pos.z).unwrap_or(&max_z);
            }
        }

        if min_x > max_x {
            return Aabb::new(Point3::origin(), Point3::origin());
        }
        Aabb::new(
            Point3::new(min_x, min_y, min_z),
            Point3::new(max_x, max_y, max_z),
        )
    }

    /// Triangulate every polygon, keeping face tags.
    #[must_use = "Use the new solid"]
    pub fn tessellate(&self) -> MeshSolid {
        #[cfg(not(feature = "parallel"))]
        let iter = self.polygons.iter();
        #[cfg(feature = "parallel")]
        let iter = self.polygons.par_iter();

        let triangles = iter
            .flat_map(|poly| {
                poly.tessellate()
                    .into_iter()
                    .map(|tri| Polygon::with_plane(tri.to_vec(), poly.plane.clone(), poly.metadata))
                    .collect::<Vec<_>>()
            })
            .collect();
        MeshSolid { polygons: triangles }
    }

    /// Triangle soup of the surface.
    pub fn triangles(&self) -> Vec<[Point3<Real>; 3]> {
        self.tessellate()
            .polygons
            .iter()
            .map(|p| [p.vertices[0].pos, p.vertices[1].pos, p.vertices[2].pos])
            .collect()
    }

    /// The surface as a parry `TriMesh`, `None` when there is no surface.
    pub fn to_trimesh(&self) -> Option<TriMesh> {
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        for [a, b, c] in self.triangles() {
            let base = vertices.len() as u32;
            vertices.extend([a, b, c]);
            indices.push([base, base + 1, base + 2]);
        }
        if indices.is_empty() {
            return None;
        }
        TriMesh::new(vertices, indices).ok()
    }

    /// Mass and center of mass at the given density.
    pub fn mass_properties(&self, density: Real) -> (Real, Point3<Real>) {
        match self.to_trimesh() {
            Some(trimesh) => {
                let mp = trimesh.mass_properties(density);
                (mp.mass(), mp.local_com)
            }
            None => (0.0, Point3::origin()),
        }
    }

    /// Enclosed volume by the divergence theorem.
    pub fn volume(&self) -> Real {
        self.triangles()
            .iter()
            .map(|[a, b, c]| a.coords.dot(&b.coords.cross(&c.coords)) / 6.0)
            .sum()
    }

    /// Point membership through a BSP tree of the surface.
    pub fn contains_point(&self, p: &Point3<Real>) -> bool {
        Node::new(&self.polygons).contains_point(p)
    }

    /// Faces in tag order.
    pub fn faces(&self) -> Vec<MeshFace> {
        let mut groups: Vec<(usize, Vec<Polygon<usize>>)> = Vec::new();
        for poly in &self.polygons {
            let tag = poly.metadata.unwrap_or(0);
            match groups.iter_mut().find(|(t, _)| *t == tag) {
                Some((_, polys)) => polys.push(poly.clone()),
                None => groups.push((tag, vec![poly.clone()])),
            }
        }
        groups.sort_by_key(|(t, _)| *t);
        groups
            .into_iter()
            .filter_map(|(_, polys)| MeshFace::new(polys))
            .collect()
    }

    /// Parallelepiped spanned by `edges` at `corner`. `edges` must be right
    /// handed. Face tags: `-e2, +e2, -e1, +e1, -e0, +e0` from `first_tag` on.
    pub fn parallelepiped(corner: Point3<Real>, edges: [Vector3<Real>; 3], first_tag: usize) -> MeshSolid {
        let [a, b, h] = edges;
        let p = |i: u8, j: u8, k: u8| corner + a * Real::from(i) + b * Real::from(j) + h * Real::from(k);
        let quads = [
            [p(0, 0, 0), p(0, 1, 0), p(1, 1, 0), p(1, 0, 0)],
            [p(0, 0, 1), p(1, 0, 1), p(1, 1, 1), p(0, 1, 1)],
            [p(0, 0, 0), p(1, 0, 0), p(1, 0, 1), p(0, 0, 1)],
            [p(0, 1, 0), p(0, 1, 1), p(1, 1, 1), p(1, 1, 0)],
            [p(0, 0, 0), p(0, 0, 1), p(0, 1, 1), p(0, 1, 0)],
            [p(1, 0, 0), p(1, 1, 0), p(1, 1, 1), p(1, 0, 1)],
        ];
        let polygons = quads
            .iter()
            .enumerate()
            .map(|(i, quad)| {
                let mut poly = Polygon::new(
                    quad.iter().map(|&q| Vertex::new(q, Vector3::zeros())).collect(),
                    Some(first_tag + i),
                );
                poly.set_flat_normals();
                poly
            })
            .collect();
        MeshSolid { polygons }
    }

    /// Axis-aligned box.
    pub fn cuboid(center: Point3<Real>, size: Vector3<Real>) -> MeshSolid {
        MeshSolid::parallelepiped(
            center - size / 2.0,
            [Vector3::x() * size.x, Vector3::y() * size.y, Vector3::z() * size.z],
            0,
        )
    }

    /// UV sphere, a single face.
    pub fn sphere(radius: Real, center: Point3<Real>, segments: usize, stacks: usize) -> MeshSolid {
        let mut polygons = Vec::new();
        let vertex = |theta: Real, phi: Real| {
            let dir = Vector3::new(theta.cos() * phi.sin(), phi.cos(), theta.sin() * phi.sin());
            Vertex::new(center + dir * radius, dir)
        };

        for i in 0..segments {
            for j in 0..stacks {
                let theta0 = i as Real / segments as Real * TAU;
                let theta1 = (i + 1) as Real / segments as Real * TAU;
                let phi0 = j as Real / stacks as Real * PI;
                let phi1 = (j + 1) as Real / stacks as Real * PI;

                let mut vertices = vec![vertex(theta0, phi0)];
                if j > 0 {
                    vertices.push(vertex(theta1, phi0));
                }
                if j < stacks - 1 {
                    vertices.push(vertex(theta1, phi1));
                }
                vertices.push(vertex(theta0, phi1));

                polygons.push(Polygon::new(vertices, Some(0)));
            }
        }
        MeshSolid { polygons }
    }

    /// Frustum from `start` to `end` with radii `radius1` and `radius2`.
    /// Face tags: lateral 0, bottom cap 1, top cap 2. A zero radius collapses
    /// that cap into the apex.
    pub fn frustum(
        start: Point3<Real>,
        end: Point3<Real>,
        radius1: Real,
        radius2: Real,
        segments: usize,
    ) -> MeshSolid {
        let s = start.coords;
        let ray = end.coords - s;
        if ray.norm_squared() < EPSILON {
            return MeshSolid::new();
        }
        let axis_z = ray.normalize();
        let axis_x = if axis_z.y.abs() > 0.5 {
            Vector3::x()
        } else {
            Vector3::y()
        }
        .cross(&axis_z)
        .normalize();
        let axis_y = axis_x.cross(&axis_z).normalize();
        let start_v = Vertex::new(start, -axis_z);
        let end_v = Vertex::new(end, axis_z);

        let point = |stack: Real, slice: Real, normal_blend: Real| {
            let r = radius1 * (1.0 - stack) + radius2 * stack;
            let angle = slice * TAU;
            let radial_dir = axis_x * angle.cos() + axis_y * angle.sin();
            let pos = s + ray * stack + radial_dir * r;
            let normal = radial_dir * (1.0 - normal_blend.abs()) + axis_z * normal_blend;
            Vertex::new(Point3::from(pos), normal.normalize())
        };

        let bottom_degenerate = radius1.abs() < EPSILON;
        let top_degenerate = radius2.abs() < EPSILON;
        if bottom_degenerate && top_degenerate {
            return MeshSolid::new();
        }

        let mut polygons = Vec::new();
        for i in 0..segments {
            let slice0 = i as Real / segments as Real;
            let slice1 = (i + 1) as Real / segments as Real;

            if !bottom_degenerate {
                polygons.push(Polygon::new(
                    vec![start_v.clone(), point(0.0, slice0, -1.0), point(0.0, slice1, -1.0)],
                    Some(1),
                ));
            }
            if !top_degenerate {
                polygons.push(Polygon::new(
                    vec![end_v.clone(), point(1.0, slice1, 1.0), point(1.0, slice0, 1.0)],
                    Some(2),
                ));
            }

            let side = if bottom_degenerate {
                vec![start_v.clone(), point(1.0, slice0, 0.0), point(1.0, slice1, 0.0)]
            } else if top_degenerate {
                vec![point(0.0, slice1, 0.0), point(0.0, slice0, 0.0), end_v.clone()]
            } else {
                vec![
                    point(0.0, slice1, 0.0),
                    point(0.0, slice0, 0.0),
                    point(1.0, slice0, 0.0),
                    point(1.0, slice1, 0.0),
                ]
            };
            polygons.push(Polygon::new(side, Some(0)));
        }
        MeshSolid { polygons }
    }

    /// Surface-net extraction of the zero level of `sdf` over `[min_pt, max_pt]`,
    /// negative inside. The result is a single face.
    #[cfg(feature = "sdf")]
    pub fn sdf<F>(
        sdf: F,
        resolution: (usize, usize, usize),
        min_pt: Point3<Real>,
        max_pt: Point3<Real>,
    ) -> MeshSolid
    where
        F: Fn(&Point3<Real>) -> Real + Sync + Send,
    {
        use fast_surface_nets::{SurfaceNetsBuffer, surface_nets};

        #[derive(Clone, Copy)]
        struct GridShape {
            nx: u32,
            ny: u32,
            nz: u32,
        }

        impl fast_surface_nets::ndshape::Shape<3> for GridShape {
            type Coord = u32;

            #[inline]
            fn as_array(&self) -> [Self::Coord; 3] {
                [self.nx, self.ny, self.nz]
            }

            fn size(&self) -> Self::Coord {
                self.nx * self.ny * self.nz
            }

            fn usize(&self) -> usize {
                (self.nx * self.ny * self.nz) as usize
            }

            fn linearize(&self, coords: [Self::Coord; 3]) -> u32 {
                let [x, y, z] = coords;
                (z * self.ny + y) * self.nx + x
            }

            fn delinearize(&self, i: u32) -> [Self::Coord; 3] {
                let x = i % self.nx;
                let yz = i / self.nx;
                [x, yz % self.ny, yz / self.ny]
            }
        }

        let nx = resolution.0.max(2) as u32;
        let ny = resolution.1.max(2) as u32;
        let nz = resolution.2.max(2) as u32;

        let dx = (max_pt.x - min_pt.x) / (nx as Real - 1.0);
        let dy = (max_pt.y - min_pt.y) / (ny as Real - 1.0);
        let dz = (max_pt.z - min_pt.z) / (nz as Real - 1.0);

        let shape = GridShape { nx, ny, nz };
        let field_values: Vec<f32> = (0..nx * ny * nz)
            .map(|i| {
                let [ix, iy, iz] = fast_surface_nets::ndshape::Shape::<3>::delinearize(&shape, i);
                let p = Point3::new(
                    min_pt.x + ix as Real * dx,
                    min_pt.y + iy as Real * dy,
                    min_pt.z + iz as Real * dz,
                );
                sdf(&p) as f32
            })
            .collect();

        let mut sn_buffer = SurfaceNetsBuffer::default();
        surface_nets(&field_values, &shape, [0, 0, 0], [nx - 1, ny - 1, nz - 1], &mut sn_buffer);

        let to_world = |pos: [f32; 3]| {
            Point3::new(
                min_pt.x + pos[0] as Real * dx,
                min_pt.y + pos[1] as Real * dy,
                min_pt.z + pos[2] as Real * dz,
            )
        };
        let polygons = sn_buffer
            .indices
            .chunks_exact(3)
            .filter_map(|tri| {
                let vertices: Vec<Vertex> = tri
                    .iter()
                    .map(|&i| {
                        let n = sn_buffer.normals[i as usize];
                        Vertex::new(
                            to_world(sn_buffer.positions[i as usize]),
                            Vector3::new(n[0] as Real, n[1] as Real, n[2] as Real),
                        )
                    })
                    .collect();
                let gradient = vertices.iter().fold(Vector3::zeros(), |acc, v| acc + v.normal);
                let mut poly = Polygon::new(vertices, Some(0));
                if poly.plane.normal.norm() == 0.0 {
                    return None;
                }
                // outward is up the gradient
                if poly.plane.normal.dot(&gradient) < 0.0 {
                    poly.flip();
                }
                Some(poly)
            })
            .collect();
        MeshSolid { polygons }
    }
}

/// One face of a [`MeshSolid`] with a planar chart `(u, v)`.
///
/// The chart projects the face onto the plane through its first vertex
/// orthogonal to the area-weighted mean normal. When that mean vanishes
/// (closed faces such as a whole sphere) the plane of the largest polygon is
/// used instead.
#[derive(Debug, Clone)]
pub struct MeshFace {
    pub polygons: Vec<Polygon<usize>>,
    triangles: Vec<[Point3<Real>; 3]>,
    origin: Point3<Real>,
    u: Vector3<Real>,
    v: Vector3<Real>,
    range: [Real; 4],
}

impl MeshFace {
    fn new(polygons: Vec<Polygon<usize>>) -> Option<MeshFace> {
        let triangles: Vec<[Point3<Real>; 3]> = polygons
            .iter()
            .flat_map(|p| p.tessellate())
            .map(|[a, b, c]| [a.pos, b.pos, c.pos])
            .collect();
        let first = triangles.first()?[0];

        let mean = polygons
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.plane.normal * p.area());
        let normal = if mean.norm() > 1e-6 * polygons.iter().map(Polygon::area).sum::<Real>().max(EPSILON) {
            mean.normalize()
        } else {
            polygons
                .iter()
                .max_by(|a, b| a.area().total_cmp(&b.area()))
                .map(|p| p.plane.normal)
                .filter(|n| n.norm() > 0.0)
                .unwrap_or_else(Vector3::z)
        };
        let (u, v) = Plane { normal, w: 0.0 }.basis();

        let mut range = [Real::MAX, -Real::MAX, Real::MAX, -Real::MAX];
        for tri in &triangles {
            for p in tri {
                let d = p - first;
                let (pu, pv) = (d.dot(&u), d.dot(&v));
                range = [range[0].min(pu), range[1].max(pu), range[2].min(pv), range[3].max(pv)];
            }
        }
        Some(MeshFace {
            polygons,
            triangles,
            origin: first,
            u,
            v,
            range,
        })
    }

    /// `[u_min, u_max, v_min, v_max]` of the chart.
    pub fn parameter_range(&self) -> [Real; 4] {
        self.range
    }

    fn chart(&self, p: &Point3<Real>) -> (Real, Real) {
        let d = p - self.origin;
        (d.dot(&self.u), d.dot(&self.v))
    }

    /// Barycentric weights of `(u, v)` in the projection of `tri`, if inside.
    fn weights(&self, tri: &[Point3<Real>; 3], u: Real, v: Real) -> Option<[Real; 3]> {
        let [a, b, c] = tri.map(|p| self.chart(&p));
        let det = (b.1 - c.1) * (a.0 - c.0) + (c.0 - b.0) * (a.1 - c.1);
        if det.abs() < EPSILON {
            return None;
        }
        let w0 = ((b.1 - c.1) * (u - c.0) + (c.0 - b.0) * (v - c.1)) / det;
        let w1 = ((c.1 - a.1) * (u - c.0) + (a.0 - c.0) * (v - c.1)) / det;
        let w2 = 1.0 - w0 - w1;
        let tol = -1e-9;
        (w0 >= tol && w1 >= tol && w2 >= tol).then_some([w0, w1, w2])
    }

    /// Whether `(u, v)` lies in the parametric domain of the face.
    pub fn contains_uv(&self, u: Real, v: Real) -> bool {
        self.triangles.iter().any(|t| self.weights(t, u, v).is_some())
    }

    /// Point of the face above `(u, v)`.
    pub fn value_at(&self, u: Real, v: Real) -> Option<Point3<Real>> {
        self.triangles.iter().find_map(|t| {
            self.weights(t, u, v)
                .map(|[w0, w1, w2]| Point3::from(t[0].coords * w0 + t[1].coords * w1 + t[2].coords * w2))
        })
    }

    /// Whether `p` lies on the face within `tolerance`.
    pub fn contains_point(&self, p: &Point3<Real>, tolerance: Real) -> bool {
        self.triangles
            .iter()
            .any(|[a, b, c]| Triangle::new(*a, *b, *c).distance_to_local_point(p, true) <= tolerance)
    }

    /// Centroid of the largest polygon, an interior point for any face.
    pub fn inner_point(&self) -> Option<Point3<Real>> {
        self.polygons
            .iter()
            .max_by(|a, b| a.area().total_cmp(&b.area()))
            .map(Polygon::centroid)
    }

    pub fn area(&self) -> Real {
        self.polygons.iter().map(Polygon::area).sum()
    }
}
