use crate::float_types::{EPSILON, Real};
use crate::polygon::Polygon;
use crate::vertex::Vertex;
use nalgebra::{Point3, Vector3};

/// Distance within which a point counts as lying on a plane.
pub const PLANE_EPSILON: Real = 1e-8;

pub const COPLANAR: i8 = 0;
pub const FRONT: i8 = 1;
pub const BACK: i8 = 2;
pub const SPANNING: i8 = 3;

/// An oriented plane `normal · p = w` with unit normal.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub normal: Vector3<Real>,
    pub w: Real,
}

impl Plane {
    /// Plane through three points, oriented counter-clockwise. Degenerate
    /// (collinear) input gives a zero normal.
    pub fn from_points(a: &Point3<Real>, b: &Point3<Real>, c: &Point3<Real>) -> Plane {
        let n = (b - a).cross(&(c - a));
        let len = n.norm();
        if len < EPSILON {
            return Plane {
                normal: Vector3::zeros(),
                w: 0.0,
            };
        }
        let normal = n / len;
        Plane {
            normal,
            w: normal.dot(&a.coords),
        }
    }

    /// Plane of a polygon, using Newell's method so that nearly collinear
    /// leading vertices do not spoil the normal.
    pub fn from_vertices(vertices: &[Vertex]) -> Plane {
        let n = vertices.len();
        if n < 3 {
            return Plane {
                normal: Vector3::zeros(),
                w: 0.0,
            };
        }
        let mut normal: Vector3<Real> = Vector3::zeros();
        for i in 0..n {
            let cur = vertices[i].pos;
            let next = vertices[(i + 1) % n].pos;
            normal.x += (cur.y - next.y) * (cur.z + next.z);
            normal.y += (cur.z - next.z) * (cur.x + next.x);
            normal.z += (cur.x - next.x) * (cur.y + next.y);
        }
        let len = normal.norm();
        if len < EPSILON {
            return Plane::from_points(&vertices[0].pos, &vertices[1].pos, &vertices[2].pos);
        }
        let normal = normal / len;
        let centroid = vertices.iter().fold(Vector3::zeros(), |acc, v| acc + v.pos.coords) / n as Real;
        Plane {
            normal,
            w: normal.dot(&centroid),
        }
    }

    pub fn flip(&mut self) {
        self.normal = -self.normal;
        self.w = -self.w;
    }

    /// Signed distance of `p` from the plane.
    #[inline]
    pub fn signed_distance(&self, p: &Point3<Real>) -> Real {
        self.normal.dot(&p.coords) - self.w
    }

    /// `FRONT`, `BACK` or `COPLANAR`.
    pub fn orient_point(&self, p: &Point3<Real>) -> i8 {
        let t = self.signed_distance(p);
        if t < -PLANE_EPSILON {
            BACK
        } else if t > PLANE_EPSILON {
            FRONT
        } else {
            COPLANAR
        }
    }

    /// Split `polygon` by this plane.
    ///
    /// Returns four buckets:
    /// `(coplanar_front, coplanar_back, front, back)`.
    #[allow(clippy::type_complexity)]
    pub fn split_polygon<S: Clone + Send + Sync>(
        &self,
        polygon: &Polygon<S>,
    ) -> (Vec<Polygon<S>>, Vec<Polygon<S>>, Vec<Polygon<S>>, Vec<Polygon<S>>) {
        let mut coplanar_front = Vec::new();
        let mut coplanar_back = Vec::new();
        let mut front = Vec::new();
        let mut back = Vec::new();

        let mut polygon_type = COPLANAR;
        let types: Vec<i8> = polygon
            .vertices
            .iter()
            .map(|v| {
                let t = self.orient_point(&v.pos);
                polygon_type |= t;
                t
            })
            .collect();

        match polygon_type {
            COPLANAR => {
                if self.normal.dot(&polygon.plane.normal) > 0.0 {
                    coplanar_front.push(polygon.clone());
                } else {
                    coplanar_back.push(polygon.clone());
                }
            }
            FRONT => front.push(polygon.clone()),
            BACK => back.push(polygon.clone()),
            _ => {
                let mut split_front = Vec::<Vertex>::new();
                let mut split_back = Vec::<Vertex>::new();
                let n = polygon.vertices.len();
                for i in 0..n {
                    let j = (i + 1) % n;
                    let (type_i, type_j) = (types[i], types[j]);
                    let (vi, vj) = (&polygon.vertices[i], &polygon.vertices[j]);

                    if type_i != BACK {
                        split_front.push(vi.clone());
                    }
                    if type_i != FRONT {
                        split_back.push(vi.clone());
                    }
                    if (type_i | type_j) == SPANNING {
                        let denom = self.normal.dot(&(vj.pos - vi.pos));
                        if denom.abs() > EPSILON {
                            let t = (self.w - self.normal.dot(&vi.pos.coords)) / denom;
                            let v = vi.interpolate(vj, t);
                            split_front.push(v.clone());
                            split_back.push(v);
                        }
                    }
                }
                if split_front.len() >= 3 {
                    front.push(Polygon::with_plane(
                        split_front,
                        polygon.plane.clone(),
                        polygon.metadata.clone(),
                    ));
                }
                if split_back.len() >= 3 {
                    back.push(Polygon::with_plane(
                        split_back,
                        polygon.plane.clone(),
                        polygon.metadata.clone(),
                    ));
                }
            }
        }

        (coplanar_front, coplanar_back, front, back)
    }

    /// Orthonormal `(u, v)` spanning the plane, with `u × v = normal`.
    pub fn basis(&self) -> (Vector3<Real>, Vector3<Real>) {
        let n = self.normal;
        let helper = if n.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
        let u = helper.cross(&n).normalize();
        let v = n.cross(&u);
        (u, v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(z: Real) -> Polygon<()> {
        let n = Vector3::z();
        Polygon::new(
            vec![
                Vertex::new(Point3::new(-1.0, -1.0, z), n),
                Vertex::new(Point3::new(1.0, -1.0, z), n),
                Vertex::new(Point3::new(1.0, 1.0, z), n),
                Vertex::new(Point3::new(-1.0, 1.0, z), n),
            ],
            None,
        )
    }

    #[test]
    fn spanning_polygon_is_split_in_two() {
        let cut = Plane::from_points(
            &Point3::origin(),
            &Point3::new(0.0, 1.0, 0.0),
            &Point3::new(0.0, 0.0, 1.0),
        );
        let (cf, cb, f, b) = cut.split_polygon(&square(0.0));
        assert!(cf.is_empty() && cb.is_empty());
        assert_eq!(f.len(), 1);
        assert_eq!(b.len(), 1);
        assert!(f[0].vertices.iter().all(|v| v.pos.x >= -PLANE_EPSILON));
    }

    #[test]
    fn coplanar_polygons_sort_by_orientation() {
        let plane = square(0.0).plane;
        let (cf, cb, _, _) = plane.split_polygon(&square(0.0));
        assert_eq!((cf.len(), cb.len()), (1, 0));
        let mut flipped = square(0.0);
        flipped.flip();
        let (cf, cb, _, _) = plane.split_polygon(&flipped);
        assert_eq!((cf.len(), cb.len()), (0, 1));
    }

    #[test]
    fn basis_is_right_handed() {
        let p = Plane::from_points(&Point3::origin(), &Point3::new(1.0, 0.0, 0.0), &Point3::new(0.0, 0.0, 1.0));
        let (u, v) = p.basis();
        assert!((u.cross(&v) - p.normal).norm() < 1e-12);
    }
}
