//! Canonical bodies assembled from primitives, and polyhedron vertex tables.

use nalgebra::{Point3, Vector3};

use crate::errors::CsgError;
use crate::float_types::Real;
use crate::primitive::Primitive;
use crate::set::{Set, halfspace};

#[cfg(feature = "chull-io")]
use chull::ConvexHullWrapper;

/// Golden ratio.
pub const PHI: Real = 1.618_033_988_749_895;

const TABLE_TOLERANCE: Real = 1e-9;

/// Axis-aligned cube of edge `size` centered at the origin, as six half-spaces.
pub fn cube(size: Real) -> Result<Set, CsgError> {
    let half = size.abs() / 2.0;
    let mut faces = Vec::with_capacity(6);
    for axis in [Vector3::x(), Vector3::y(), Vector3::z()] {
        faces.push(halfspace(axis, -half)?);
        faces.push(halfspace(-axis, -half)?);
    }
    Ok(Set::intersection(faces))
}

/// Ball of radius `r` centered at the origin.
pub fn sphere(r: Real) -> Result<Set, CsgError> {
    Ok(Set::Primitive(Primitive::sphere(r, Point3::origin())?))
}

/// Cylinder along +z from the origin to height `h`.
pub fn cylinder(r: Real, h: Real) -> Result<Set, CsgError> {
    Ok(Set::intersection([
        Set::Primitive(Primitive::infinite_cylinder(r, Vector3::z(), Point3::origin())?),
        halfspace(Vector3::z(), 0.0)?,
        halfspace(-Vector3::z(), -h)?,
    ]))
}

/// Cone with base disc of radius `r` at the origin and apex at `(0, 0, h)`.
pub fn cone(r: Real, h: Real) -> Result<Set, CsgError> {
    if h <= 0.0 {
        return Err(CsgError::InvalidParameter(format!("cone height must be positive, got {h}")));
    }
    Ok(Set::intersection([
        Set::Primitive(Primitive::semi_infinite_cone(
            r.abs() / h,
            -Vector3::z(),
            Point3::new(0.0, 0.0, h),
        )?),
        halfspace(Vector3::z(), 0.0)?,
    ]))
}

/// `[s, exterior(s)]`, a knife cutting every piece along the boundary of `s`.
pub fn with_exterior(s: Set) -> [Set; 2] {
    let outside = s.exterior();
    [s, outside]
}

// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// Vertex tables
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/// A coordinate-slot symmetry: a sign flip or a permutation.
pub type Generator = fn([Real; 3]) -> [Real; 3];

pub fn flip_x(p: [Real; 3]) -> [Real; 3] {
    [-p[0], p[1], p[2]]
}

pub fn flip_y(p: [Real; 3]) -> [Real; 3] {
    [p[0], -p[1], p[2]]
}

pub fn flip_z(p: [Real; 3]) -> [Real; 3] {
    [p[0], p[1], -p[2]]
}

/// Two sign flips at once; these generate the rotations among the flips.
pub fn flip_xy(p: [Real; 3]) -> [Real; 3] {
    [-p[0], -p[1], p[2]]
}

pub fn flip_yz(p: [Real; 3]) -> [Real; 3] {
    [p[0], -p[1], -p[2]]
}

/// `(x, y, z) → (y, z, x)`
pub fn cycle(p: [Real; 3]) -> [Real; 3] {
    [p[1], p[2], p[0]]
}

/// `(x, y, z) → (y, x, z)`
pub fn swap(p: [Real; 3]) -> [Real; 3] {
    [p[1], p[0], p[2]]
}

const SIGNS: [Generator; 3] = [flip_x, flip_y, flip_z];
const SIGNS_CYCLIC: [Generator; 4] = [flip_x, flip_y, flip_z, cycle];

fn same_point(a: &[Real; 3], b: &[Real; 3]) -> bool {
    a.iter().zip(b).all(|(x, y)| (x - y).abs() < TABLE_TOLERANCE)
}

/// Closure of `seeds` under `generators`, in discovery order.
pub fn orbit(seeds: &[[Real; 3]], generators: &[Generator]) -> Vec<[Real; 3]> {
    let mut out: Vec<[Real; 3]> = Vec::new();
    let mut frontier: Vec<[Real; 3]> = Vec::new();
    for s in seeds {
        if !out.iter().any(|q| same_point(q, s)) {
            out.push(*s);
            frontier.push(*s);
        }
    }
    while let Some(p) = frontier.pop() {
        for g in generators {
            let q = g(p);
            if !out.iter().any(|r| same_point(r, &q)) {
                out.push(q);
                frontier.push(q);
            }
        }
    }
    out
}

pub fn tetrahedron_vertices() -> Vec<[Real; 3]> {
    orbit(&[[1.0, 1.0, 1.0]], &[flip_xy, flip_yz])
}

pub fn cube_vertices() -> Vec<[Real; 3]> {
    orbit(&[[1.0, 1.0, 1.0]], &SIGNS)
}

pub fn octahedron_vertices() -> Vec<[Real; 3]> {
    orbit(&[[1.0, 0.0, 0.0]], &SIGNS_CYCLIC)
}

pub fn dodecahedron_vertices() -> Vec<[Real; 3]> {
    orbit(&[[1.0, 1.0, 1.0], [0.0, 1.0 / PHI, PHI]], &SIGNS_CYCLIC)
}

pub fn icosahedron_vertices() -> Vec<[Real; 3]> {
    orbit(&[[0.0, 1.0, PHI]], &SIGNS_CYCLIC)
}

pub fn cuboctahedron_vertices() -> Vec<[Real; 3]> {
    orbit(&[[1.0, 1.0, 0.0]], &[flip_x, flip_y, flip_z, cycle, swap])
}

pub fn icosidodecahedron_vertices() -> Vec<[Real; 3]> {
    orbit(
        &[[0.0, 0.0, PHI], [0.5, PHI / 2.0, PHI * PHI / 2.0]],
        &SIGNS_CYCLIC,
    )
}

/// Convex hull of `vertices` as an intersection of face half-spaces.
#[cfg(feature = "chull-io")]
pub fn polyhedron(vertices: &[[Real; 3]]) -> Result<Set, CsgError> {
    if vertices.len() < 4 {
        return Err(CsgError::InvalidParameter(format!(
            "a polyhedron needs at least 4 vertices, got {}",
            vertices.len()
        )));
    }
    let points: Vec<Vec<Real>> = vertices.iter().map(|v| v.to_vec()).collect();
    let hull = ConvexHullWrapper::try_new(&points, None)
        .map_err(|e| CsgError::InvalidParameter(format!("convex hull failed: {e:?}")))?;
    let (verts, indices) = hull.vertices_indices();
    let at = |i: usize| Point3::new(verts[i][0], verts[i][1], verts[i][2]);
    let centroid = verts
        .iter()
        .fold(Vector3::zeros(), |acc, v| acc + Vector3::new(v[0], v[1], v[2]))
        / verts.len().max(1) as Real;

    // coplanar hull triangles share one face plane
    let mut planes: Vec<(Vector3<Real>, Real)> = Vec::new();
    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (at(tri[0]), at(tri[1]), at(tri[2]));
        let Some(mut n) = (b - a).cross(&(c - a)).try_normalize(TABLE_TOLERANCE) else {
            continue;
        };
        if n.dot(&(centroid - a.coords)) > 0.0 {
            n = -n;
        }
        let d = n.dot(&a.coords);
        if !planes
            .iter()
            .any(|(m, e)| (m - n).norm() < 1e-6 && (e - d).abs() < 1e-6)
        {
            planes.push((n, d));
        }
    }
    if planes.len() < 4 {
        return Err(CsgError::InvalidParameter("vertices span no volume".into()));
    }
    // n·p ≤ d is the half-space -n·p ≥ -d
    let faces = planes
        .into_iter()
        .map(|(n, d)| halfspace(-n, -d))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Set::intersection(faces))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_form_bodies() {
        let c = cube(2.0).unwrap();
        assert_eq!(c.leaf_count(), 6);
        assert!(c.contains(&Point3::new(1.0, -1.0, 0.5)));
        assert!(!c.contains(&Point3::new(1.01, 0.0, 0.0)));

        let cyl = cylinder(1.0, 2.0).unwrap();
        assert!(cyl.contains(&Point3::new(0.5, 0.5, 1.9)));
        assert!(!cyl.contains(&Point3::new(0.0, 0.0, -0.1)));
        assert!(!cyl.contains(&Point3::new(0.9, 0.9, 1.0)));

        let k = cone(1.0, 2.0).unwrap();
        assert!(k.contains(&Point3::new(0.9, 0.0, 0.0)));
        assert!(k.contains(&Point3::new(0.0, 0.0, 1.9)));
        assert!(!k.contains(&Point3::new(0.6, 0.0, 1.0)));
        assert!(cone(1.0, 0.0).is_err());

        assert!(sphere(1.0).unwrap().contains(&Point3::new(0.0, 0.6, 0.8)));
    }

    #[test]
    fn knife_covers_space() {
        let [inside, outside] = with_exterior(sphere(1.0).unwrap());
        for p in [Point3::new(0.0, 0.0, 0.5), Point3::new(2.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)] {
            assert!(inside.contains(&p) || outside.contains(&p));
        }
        // the boundary belongs to both blades
        assert!(inside.contains(&Point3::new(1.0, 0.0, 0.0)));
        assert!(outside.contains(&Point3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn vertex_table_sizes() {
        assert_eq!(tetrahedron_vertices().len(), 4);
        assert_eq!(cube_vertices().len(), 8);
        assert_eq!(octahedron_vertices().len(), 6);
        assert_eq!(dodecahedron_vertices().len(), 20);
        assert_eq!(icosahedron_vertices().len(), 12);
        assert_eq!(cuboctahedron_vertices().len(), 12);
        assert_eq!(icosidodecahedron_vertices().len(), 30);
    }

    #[test]
    fn table_vertices_share_a_radius() {
        for table in [dodecahedron_vertices(), icosahedron_vertices(), icosidodecahedron_vertices()] {
            let r0 = Vector3::from(table[0]).norm();
            assert!(table.iter().all(|v| (Vector3::from(*v).norm() - r0).abs() < 1e-9));
        }
    }

    #[cfg(feature = "chull-io")]
    #[test]
    fn hull_faces() {
        let cube = polyhedron(&cube_vertices()).unwrap();
        assert_eq!(cube.leaf_count(), 6);
        assert!(cube.contains(&Point3::origin()));
        assert!(!cube.contains(&Point3::new(1.2, 0.0, 0.0)));

        let ico = polyhedron(&icosahedron_vertices()).unwrap();
        assert_eq!(ico.leaf_count(), 20);
        for v in icosahedron_vertices() {
            assert!(ico.contains(&Point3::from(Vector3::from(v) * 0.99)));
            assert!(!ico.contains(&Point3::from(Vector3::from(v) * 1.01)));
        }
        assert!(polyhedron(&cube_vertices()[..3]).is_err());
    }
}
