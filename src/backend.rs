//! Realization of symbolic sets as concrete solids.
//!
//! A [`Backend`] builds finite representatives of primitives and combines
//! them. Unbounded primitives are cut down to a bounding box; nothing outside
//! that box is meaningful.

use nalgebra::{Matrix4, Point3, Vector3};

use crate::errors::CsgError;
use crate::float_types::Real;
use crate::float_types::parry3d::bounding_volume::Aabb;
use crate::mesh::{MeshFace, MeshSolid};
use crate::primitive::Primitive;
use crate::set::{AbstractSet, Set};
use crate::transform::Transformation;

/// A face of a realized shape, parametrized over a `(u, v)` rectangle.
pub trait Face {
    /// `[u_min, u_max, v_min, v_max]`
    fn parameter_range(&self) -> [Real; 4];
    fn contains_uv(&self, u: Real, v: Real) -> bool;
    fn value_at(&self, u: Real, v: Real) -> Option<Point3<Real>>;
    fn contains_point(&self, p: &Point3<Real>, tolerance: Real) -> bool;
    /// Some point of the face, used when the parameter domain is too thin to sample.
    fn inner_point(&self) -> Option<Point3<Real>>;
}

/// Solid-modeling backend.
pub trait Backend {
    type Shape: Clone;
    type Face: Face;

    fn make_sphere(&self, radius: Real, center: Point3<Real>) -> Self::Shape;
    fn make_infinite_cylinder(
        &self,
        radius: Real,
        direction: Vector3<Real>,
        center: Point3<Real>,
        bbox: &Aabb,
    ) -> Self::Shape;
    fn make_semi_infinite_cone(
        &self,
        slope: Real,
        direction: Vector3<Real>,
        center: Point3<Real>,
        bbox: &Aabb,
    ) -> Self::Shape;
    /// `{p : p·direction ≥ offset}` within `bbox`; face 0 lies on the boundary plane.
    fn make_halfspace(&self, direction: Vector3<Real>, offset: Real, bbox: &Aabb) -> Self::Shape;
    /// Frustum from `center` to `center + axis`. Radii of opposite sign give
    /// two cones joined at the apex.
    fn make_conical_frustum(&self, r1: Real, r2: Real, center: Point3<Real>, axis: Vector3<Real>) -> Self::Shape;
    fn make_box(&self, center: Point3<Real>, size: Vector3<Real>) -> Self::Shape;
    fn make_whole_space(&self, bbox: &Aabb) -> Self::Shape;
    fn make_empty_space(&self) -> Self::Shape;
    fn make_predicate(&self, set: &AbstractSet, bbox: &Aabb) -> Result<Self::Shape, CsgError> {
        let _ = bbox;
        Err(CsgError::Unrealizable(format!("no predicate realization for {}", set.formula)))
    }

    fn intersection(&self, shapes: &[Self::Shape]) -> Self::Shape;
    fn union(&self, shapes: &[Self::Shape]) -> Self::Shape;
    fn complement(&self, shape: &Self::Shape) -> Self::Shape;
    fn compound(&self, shapes: &[Self::Shape]) -> Self::Shape;
    fn transform(&self, shape: &Self::Shape, placement: &Matrix4<Real>) -> Result<Self::Shape, CsgError>;

    /// Merge co-moving shapes into one.
    fn fuse(&self, shapes: &[Self::Shape]) -> Self::Shape {
        self.union(shapes)
    }

    fn bounding_box(&self, shape: &Self::Shape) -> Aabb;
    fn mass(&self, shape: &Self::Shape) -> Real;
    fn center(&self, shape: &Self::Shape) -> Point3<Real>;
    fn tessellate(&self, shape: &Self::Shape, precision: Real) -> Vec<[Point3<Real>; 3]>;
    fn faces(&self, shape: &Self::Shape) -> Vec<Self::Face>;
}

impl Face for MeshFace {
    fn parameter_range(&self) -> [Real; 4] {
        MeshFace::parameter_range(self)
    }

    fn contains_uv(&self, u: Real, v: Real) -> bool {
        MeshFace::contains_uv(self, u, v)
    }

    fn value_at(&self, u: Real, v: Real) -> Option<Point3<Real>> {
        MeshFace::value_at(self, u, v)
    }

    fn contains_point(&self, p: &Point3<Real>, tolerance: Real) -> bool {
        MeshFace::contains_point(self, p, tolerance)
    }

    fn inner_point(&self) -> Option<Point3<Real>> {
        MeshFace::inner_point(self)
    }
}

/// Polygon-mesh backend on top of [`MeshSolid`].
#[derive(Debug, Clone, Copy)]
pub struct MeshBackend {
    /// Segments around round primitives.
    pub segments: usize,
    /// Latitude bands of spheres.
    pub stacks: usize,
    /// Samples per axis when realizing abstract predicates.
    pub resolution: usize,
}

impl Default for MeshBackend {
    fn default() -> Self {
        MeshBackend {
            segments: 32,
            stacks: 16,
            resolution: 48,
        }
    }
}

/// Reach that covers `bbox` from anywhere inside it, with margin.
fn reach(bbox: &Aabb, from: &Point3<Real>) -> Real {
    let corner_distance = bbox
        .vertices()
        .iter()
        .map(|c| (c - from).norm())
        .fold(0.0, Real::max);
    2.0 * corner_distance.max(bbox.extents().norm()) + 1.0
}

/// Right-handed orthonormal frame `(u, v, d)`.
fn frame(d: &Vector3<Real>) -> (Vector3<Real>, Vector3<Real>) {
    crate::plane::Plane { normal: *d, w: 0.0 }.basis()
}

impl Backend for MeshBackend {
    type Shape = MeshSolid;
    type Face = MeshFace;

    fn make_sphere(&self, radius: Real, center: Point3<Real>) -> MeshSolid {
        MeshSolid::sphere(radius, center, self.segments, self.stacks)
    }

    fn make_infinite_cylinder(
        &self,
        radius: Real,
        direction: Vector3<Real>,
        center: Point3<Real>,
        bbox: &Aabb,
    ) -> MeshSolid {
        let d = direction.normalize();
        let l = reach(bbox, &center);
        MeshSolid::frustum(center - d * l, center + d * l, radius, radius, self.segments)
    }

    fn make_semi_infinite_cone(
        &self,
        slope: Real,
        direction: Vector3<Real>,
        center: Point3<Real>,
        bbox: &Aabb,
    ) -> MeshSolid {
        let d = direction.normalize();
        let l = reach(bbox, &center);
        MeshSolid::frustum(center, center + d * l, 0.0, slope * l, self.segments)
    }

    fn make_halfspace(&self, direction: Vector3<Real>, offset: Real, bbox: &Aabb) -> MeshSolid {
        let d = direction.normalize();
        let c = bbox.center();
        let foot = c - d * (d.dot(&c.coords) - offset);
        let l = reach(bbox, &foot);
        let (u, v) = frame(&d);
        MeshSolid::parallelepiped(foot - u * l - v * l, [u * (2.0 * l), v * (2.0 * l), d * l], 0)
    }

    fn make_conical_frustum(&self, r1: Real, r2: Real, center: Point3<Real>, axis: Vector3<Real>) -> MeshSolid {
        if r1 * r2 < 0.0 {
            let t = r1 / (r1 - r2);
            let apex = center + axis * t;
            let lower = MeshSolid::frustum(center, apex, r1.abs(), 0.0, self.segments);
            let upper = MeshSolid::frustum(apex, center + axis, 0.0, r2.abs(), self.segments);
            return MeshSolid::compound(&[lower, upper]);
        }
        MeshSolid::frustum(center, center + axis, r1.abs(), r2.abs(), self.segments)
    }

    fn make_box(&self, center: Point3<Real>, size: Vector3<Real>) -> MeshSolid {
        MeshSolid::cuboid(center, size)
    }

    fn make_whole_space(&self, bbox: &Aabb) -> MeshSolid {
        let c = bbox.center();
        let l = reach(bbox, &c);
        MeshSolid::cuboid(c, Vector3::repeat(l))
    }

    fn make_empty_space(&self) -> MeshSolid {
        MeshSolid::new()
    }

    #[cfg(feature = "sdf")]
    fn make_predicate(&self, set: &AbstractSet, bbox: &Aabb) -> Result<MeshSolid, CsgError> {
        use crate::expr::compile_formula;
        use hashbrown::HashMap;

        let inside = compile_formula(&set.formula, &set.vars, &HashMap::new());
        let n = self.resolution.max(4);
        // pad so that the surface closes inside the sampled block
        let pad = bbox.extents() / (n as Real);
        let mins = bbox.mins - pad;
        let maxs = bbox.maxs + pad;
        let solid = MeshSolid::sdf(
            |p| {
                let interior = (p.x > bbox.mins.x && p.x < bbox.maxs.x)
                    && (p.y > bbox.mins.y && p.y < bbox.maxs.y)
                    && (p.z > bbox.mins.z && p.z < bbox.maxs.z);
                if interior && inside(&[p.x, p.y, p.z]) { -1.0 } else { 1.0 }
            },
            (n, n, n),
            mins,
            maxs,
        );
        log::debug!("realized predicate with {} polygons", solid.polygons.len());
        Ok(solid)
    }

    fn intersection(&self, shapes: &[MeshSolid]) -> MeshSolid {
        match shapes.split_first() {
            Some((first, rest)) => rest.iter().fold(first.clone(), |acc, s| acc.intersection(s)),
            None => MeshSolid::new(),
        }
    }

    fn union(&self, shapes: &[MeshSolid]) -> MeshSolid {
        match shapes.split_first() {
            Some((first, rest)) => rest.iter().fold(first.clone(), |acc, s| acc.union(s)),
            None => MeshSolid::new(),
        }
    }

    fn complement(&self, shape: &MeshSolid) -> MeshSolid {
        shape.inverse()
    }

    fn compound(&self, shapes: &[MeshSolid]) -> MeshSolid {
        MeshSolid::compound(shapes)
    }

    fn transform(&self, shape: &MeshSolid, placement: &Matrix4<Real>) -> Result<MeshSolid, CsgError> {
        shape.transform(placement)
    }

    fn bounding_box(&self, shape: &MeshSolid) -> Aabb {
        shape.bounding_box()
    }

    fn mass(&self, shape: &MeshSolid) -> Real {
        shape.mass_properties(1.0).0
    }

    fn center(&self, shape: &MeshSolid) -> Point3<Real> {
        shape.mass_properties(1.0).1
    }

    // polygon solids are already exact at their own resolution
    fn tessellate(&self, shape: &MeshSolid, _precision: Real) -> Vec<[Point3<Real>; 3]> {
        shape.triangles()
    }

    fn faces(&self, shape: &MeshSolid) -> Vec<MeshFace> {
        shape.faces()
    }
}

/// Bounding box of the image of `bbox` under `t`.
pub fn transform_aabb(t: &Transformation, bbox: &Aabb) -> Aabb {
    let corners = bbox.vertices().map(|c| t.apply(&c));
    let mins = corners.iter().fold(corners[0], |acc, c| acc.inf(c));
    let maxs = corners.iter().fold(corners[0], |acc, c| acc.sup(c));
    Aabb::new(mins, maxs)
}

/// Lower a set to a backend shape. `bbox` bounds the region of interest.
pub fn realize<B: Backend>(backend: &B, set: &Set, bbox: &Aabb) -> Result<B::Shape, CsgError> {
    let whole_minus = |inner: B::Shape| {
        backend.intersection(&[backend.make_whole_space(bbox), backend.complement(&inner)])
    };
    Ok(match set {
        Set::Empty => backend.make_empty_space(),
        Set::Universal => backend.make_whole_space(bbox),
        Set::Primitive(p) => match p {
            Primitive::Halfspace { direction, offset, .. } => backend.make_halfspace(*direction, *offset, bbox),
            Primitive::Sphere {
                radius, center, exterior, ..
            } => {
                let ball = backend.make_sphere(*radius, *center);
                if *exterior { whole_minus(ball) } else { ball }
            }
            Primitive::InfiniteCylinder {
                radius, direction, center, exterior, ..
            } => {
                let tube = backend.make_infinite_cylinder(*radius, *direction, *center, bbox);
                if *exterior { whole_minus(tube) } else { tube }
            }
            Primitive::SemiInfiniteCone {
                slope, direction, center, exterior, ..
            } => {
                let cone = backend.make_semi_infinite_cone(*slope, *direction, *center, bbox);
                if *exterior { whole_minus(cone) } else { cone }
            }
            Primitive::Cuboid { center, size, .. } => backend.make_box(*center, *size),
            Primitive::Cylinder {
                radius, height, center, direction, ..
            } => backend.make_conical_frustum(*radius, *radius, *center, direction * *height),
            Primitive::Cone {
                radius, height, center, direction, ..
            } => backend.make_conical_frustum(*radius, 0.0, *center, direction * *height),
        },
        Set::Abstract(a) => backend.make_predicate(a, bbox)?,
        Set::Intersection(args) => {
            let shapes = args
                .iter()
                .map(|a| realize(backend, a, bbox))
                .collect::<Result<Vec<_>, _>>()?;
            backend.intersection(&shapes)
        }
        Set::Union(args) => {
            let shapes = args
                .iter()
                .map(|a| realize(backend, a, bbox))
                .collect::<Result<Vec<_>, _>>()?;
            backend.union(&shapes)
        }
        Set::Complement(inner) => whole_minus(realize(backend, inner, bbox)?),
        Set::Image(t, inner) => {
            let local_box = transform_aabb(&t.inverse(), bbox);
            let shape = realize(backend, inner, &local_box)?;
            backend.transform(&shape, &t.to_matrix4())?
        }
    })
}

/// The realized leaves of `set`, in the order of [`Set::leaves`].
pub fn realize_leaves<B: Backend>(backend: &B, set: &Set, bbox: &Aabb) -> Result<Vec<B::Shape>, CsgError> {
    set.leaves().iter().map(|leaf| realize(backend, leaf, bbox)).collect()
}

/// Region of interest for `set`: its own bounds when it has some, else `fallback`.
pub fn region_of_interest(set: &Set, fallback: &Aabb) -> Aabb {
    match set.bounds() {
        Some((lo, hi)) if lo.x <= hi.x && lo.y <= hi.y && lo.z <= hi.z => {
            let margin = Vector3::repeat(0.25 * (hi - lo).norm().max(1.0));
            Aabb::new(lo - margin, hi + margin)
        }
        _ => *fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::float_types::approx_eq;
    use crate::set::halfspace;

    fn bbox() -> Aabb {
        Aabb::new(Point3::new(-2.0, -2.0, -2.0), Point3::new(2.0, 2.0, 2.0))
    }

    #[test]
    fn halfspace_face_zero_is_the_plane() {
        let b = MeshBackend::default();
        let h = b.make_halfspace(Vector3::x(), 0.5, &bbox());
        let faces = b.faces(&h);
        assert_eq!(faces.len(), 6);
        assert!(faces[0].contains_point(&Point3::new(0.5, 0.3, -0.2), 1e-9));
        assert!(h.contains_point(&Point3::new(1.0, 0.0, 0.0)));
        assert!(!h.contains_point(&Point3::new(0.0, 0.0, 0.0)));
    }

    #[test]
    fn realized_cube_has_unit_volume() {
        let b = MeshBackend::default();
        let cube = Set::intersection(
            [Vector3::x(), Vector3::y(), Vector3::z()]
                .into_iter()
                .flat_map(|d| [halfspace(d, -0.5).unwrap(), halfspace(-d, -0.5).unwrap()]),
        );
        let shape = realize(&b, &cube, &bbox()).unwrap();
        assert!(approx_eq(shape.volume(), 1.0, 1e-6));
        assert_eq!(b.faces(&shape).len(), 6);
    }

    #[test]
    fn exterior_and_image_realize() {
        let b = MeshBackend::default();
        let ball = Set::Primitive(Primitive::sphere(1.0, Point3::origin()).unwrap());
        let outside = realize(&b, &ball.clone().complement(), &bbox()).unwrap();
        assert!(!outside.contains_point(&Point3::origin()));
        assert!(outside.contains_point(&Point3::new(1.5, 1.5, 0.0)));

        let shift = Transformation::translation(Vector3::new(1.0, 0.0, 0.0));
        let moved = realize(&b, &Set::Image(shift, Box::new(Set::Complement(Box::new(ball)))), &bbox()).unwrap();
        assert!(!moved.contains_point(&Point3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn mixed_sign_frustum_is_two_cones() {
        let b = MeshBackend::default();
        let s = b.make_conical_frustum(1.0, -1.0, Point3::origin(), Vector3::new(0.0, 0.0, 2.0));
        assert_eq!(b.faces(&s).len(), 4);
        let v = s.volume();
        // two cones of radius 1 and height 1
        assert!(approx_eq(v, 2.0 * crate::float_types::PI / 3.0, 0.05));
    }
}
