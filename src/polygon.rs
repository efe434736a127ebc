use crate::float_types::Real;
use crate::plane::Plane;
use crate::vertex::Vertex;
use geo::{LineString, Polygon as GeoPolygon, TriangulateEarcut, coord};
use nalgebra::{Point3, Vector3};

/// A planar polygon, defined by a list of vertices.
/// - `S` is the generic metadata type, stored as `Option<S>`.
#[derive(Debug, Clone)]
pub struct Polygon<S: Clone> {
    pub vertices: Vec<Vertex>,
    pub plane: Plane,
    pub metadata: Option<S>,
}

impl<S: Clone + Send + Sync> Polygon<S> {
    /// Create a polygon from vertices; the plane is computed from them.
    pub fn new(vertices: Vec<Vertex>, metadata: Option<S>) -> Self {
        let plane = Plane::from_vertices(&vertices);
        Polygon {
            vertices,
            plane,
            metadata,
        }
    }

    /// Create a polygon that keeps the plane of the polygon it was cut from.
    pub fn with_plane(vertices: Vec<Vertex>, plane: Plane, metadata: Option<S>) -> Self {
        Polygon {
            vertices,
            plane,
            metadata,
        }
    }

    /// Reverses winding order, flips vertices normals, and flips the plane normal
    pub fn flip(&mut self) {
        self.vertices.reverse();
        for v in &mut self.vertices {
            v.flip();
        }
        self.plane.flip();
    }

    /// Set every vertex normal to the plane normal (flat shading).
    pub fn set_flat_normals(&mut self) {
        let n = self.plane.normal;
        for v in &mut self.vertices {
            v.normal = n;
        }
    }

    /// Project into the plane's `(u, v)` basis, with `origin` mapping to (0, 0).
    pub fn to_2d(&self, origin: &Point3<Real>) -> Vec<[Real; 2]> {
        let (u, v) = self.plane.basis();
        self.vertices
            .iter()
            .map(|vert| {
                let d = vert.pos - origin;
                [d.dot(&u), d.dot(&v)]
            })
            .collect()
    }

    /// Triangulate this polygon into a list of triangles, each triangle is [v0, v1, v2].
    pub fn tessellate(&self) -> Vec<[Vertex; 3]> {
        if self.vertices.len() < 3 {
            return Vec::new();
        }
        if self.vertices.len() == 3 {
            return vec![[
                self.vertices[0].clone(),
                self.vertices[1].clone(),
                self.vertices[2].clone(),
            ]];
        }

        let normal = self.plane.normal;
        let (u, v) = self.plane.basis();
        let origin = self.vertices[0].pos;

        let coords: Vec<_> = self
            .to_2d(&origin)
            .into_iter()
            .map(|[x, y]| coord! { x: x, y: y })
            .collect();
        let triangulation = GeoPolygon::new(LineString::new(coords), Vec::new()).earcut_triangles_raw();
        let flat = triangulation.vertices;

        triangulation
            .triangle_indices
            .chunks_exact(3)
            .map(|tri| {
                let xy = |idx: usize| (flat[idx * 2], flat[idx * 2 + 1]);
                let lift = |idx: usize| {
                    let (x, y) = xy(idx);
                    Vertex::new(origin + u * x + v * y, normal)
                };
                let (a, b, c) = (xy(tri[0]), xy(tri[1]), xy(tri[2]));
                // earcut does not keep the input winding; (u, v, normal) is right handed
                if (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0) < 0.0 {
                    [lift(tri[0]), lift(tri[2]), lift(tri[1])]
                } else {
                    [lift(tri[0]), lift(tri[1]), lift(tri[2])]
                }
            })
            .collect()
    }

    /// Area of the polygon.
    pub fn area(&self) -> Real {
        let n = self.vertices.len();
        if n < 3 {
            return 0.0;
        }
        let mut acc = Vector3::zeros();
        for i in 0..n {
            let a = self.vertices[i].pos.coords;
            let b = self.vertices[(i + 1) % n].pos.coords;
            acc += a.cross(&b);
        }
        0.5 * acc.dot(&self.plane.normal).abs()
    }

    /// Mean of the vertex positions.
    pub fn centroid(&self) -> Point3<Real> {
        let n = self.vertices.len().max(1) as Real;
        Point3::from(self.vertices.iter().fold(Vector3::zeros(), |acc, v| acc + v.pos.coords) / n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_tessellates_into_two_triangles() {
        let n = Vector3::z();
        let poly: Polygon<()> = Polygon::new(
            vec![
                Vertex::new(Point3::new(0.0, 0.0, 0.0), n),
                Vertex::new(Point3::new(2.0, 0.0, 0.0), n),
                Vertex::new(Point3::new(2.0, 1.0, 0.0), n),
                Vertex::new(Point3::new(0.0, 1.0, 0.0), n),
            ],
            None,
        );
        assert!((poly.plane.normal - n).norm() < 1e-12);
        assert!((poly.area() - 2.0).abs() < 1e-12);
        let tris = poly.tessellate();
        assert_eq!(tris.len(), 2);
        for t in &tris {
            assert!(t.iter().all(|v| v.pos.z.abs() < 1e-12));
        }
    }

    #[test]
    fn triangles_keep_the_polygon_winding() {
        let n = -Vector3::z();
        let poly: Polygon<()> = Polygon::new(
            vec![
                Vertex::new(Point3::new(0.0, 0.0, 0.0), n),
                Vertex::new(Point3::new(0.0, 1.0, 0.0), n),
                Vertex::new(Point3::new(1.0, 1.0, 0.0), n),
                Vertex::new(Point3::new(1.0, 0.0, 0.0), n),
            ],
            None,
        );
        assert!((poly.plane.normal - n).norm() < 1e-12);
        for [a, b, c] in poly.tessellate() {
            let normal = (b.pos - a.pos).cross(&(c.pos - a.pos));
            assert!(normal.dot(&n) > 0.0);
        }
    }
}
