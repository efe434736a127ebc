//! Algebraic primitive subsets of ℝ³.
//!
//! Every primitive is canonicalized on construction: directions are unit
//! length, radii and sizes are non-negative (the exterior of a round
//! primitive is carried by an `exterior` flag, which is what a negative radius
//! or slope produces), and all parameters are snapped so that equal
//! primitives hash equal.

use std::fmt;
use std::hash::{Hash, Hasher};

use nalgebra::{Point3, Vector3};
use ordered_float::OrderedFloat;

use crate::errors::CsgError;
use crate::expr::{Expr, Formula, Vec3Expr, dot, vconst, vsub};
use crate::float_types::{EPSILON, Real, snap};
use crate::transform::Transformation;

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// `{p : p·direction ≥ offset}`
    Halfspace {
        direction: Vector3<Real>,
        offset: Real,
        closed: bool,
    },
    /// `{p : |p - center| ≤ radius}`, or its complement when `exterior`.
    Sphere {
        radius: Real,
        center: Point3<Real>,
        exterior: bool,
        closed: bool,
    },
    /// Points within `radius` of the line through `center` along `direction`.
    InfiniteCylinder {
        radius: Real,
        direction: Vector3<Real>,
        center: Point3<Real>,
        exterior: bool,
        closed: bool,
    },
    /// Cone with apex `center` opening along `direction`; radial distance at
    /// height `h` is at most `slope · h`.
    SemiInfiniteCone {
        slope: Real,
        direction: Vector3<Real>,
        center: Point3<Real>,
        exterior: bool,
        closed: bool,
    },
    /// Axis-aligned box.
    Cuboid {
        center: Point3<Real>,
        size: Vector3<Real>,
        closed: bool,
    },
    /// Finite cylinder from the base disc at `center` along `direction`.
    Cylinder {
        radius: Real,
        height: Real,
        center: Point3<Real>,
        direction: Vector3<Real>,
        closed: bool,
    },
    /// Finite cone with base disc at `center` and apex at `center + height·direction`.
    Cone {
        radius: Real,
        height: Real,
        center: Point3<Real>,
        direction: Vector3<Real>,
        closed: bool,
    },
}

fn snap_vec(v: &Vector3<Real>) -> Vector3<Real> {
    Vector3::new(snap(v.x), snap(v.y), snap(v.z))
}

fn snap_point(p: &Point3<Real>) -> Point3<Real> {
    Point3::new(snap(p.x), snap(p.y), snap(p.z))
}

fn check_finite(name: &str, values: &[Real]) -> Result<(), CsgError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(CsgError::InvalidParameter(format!("{name} must be finite")))
    }
}

/// Unit direction; zero-length vectors are rejected.
pub fn unit_direction(v: &Vector3<Real>) -> Result<Vector3<Real>, CsgError> {
    check_finite("direction", v.as_slice())?;
    let n = v.norm();
    if n < EPSILON {
        return Err(CsgError::InvalidParameter(format!(
            "direction must be non-zero, got ({}, {}, {})",
            v.x, v.y, v.z
        )));
    }
    Ok(v / n)
}

/// Of `v` and `-v`, the one whose coordinate tuple is lexicographically greater.
pub fn sign_canonical(v: &Vector3<Real>) -> Vector3<Real> {
    let flipped = -v;
    let key = |u: &Vector3<Real>| (OrderedFloat(snap(u.x)), OrderedFloat(snap(u.y)), OrderedFloat(snap(u.z)));
    if key(&flipped) > key(v) { flipped } else { *v }
}

impl Primitive {
    pub fn halfspace(direction: Vector3<Real>, offset: Real) -> Result<Self, CsgError> {
        check_finite("offset", &[offset])?;
        let n = direction.norm();
        let direction = unit_direction(&direction)?;
        Ok(Primitive::Halfspace {
            direction: snap_vec(&direction),
            offset: snap(offset / n),
            closed: true,
        })
    }

    /// A negative radius denotes the exterior of the ball.
    pub fn sphere(radius: Real, center: Point3<Real>) -> Result<Self, CsgError> {
        check_finite("radius", &[radius])?;
        check_finite("center", center.coords.as_slice())?;
        Ok(Primitive::Sphere {
            radius: snap(radius.abs()),
            center: snap_point(&center),
            exterior: radius < 0.0,
            closed: true,
        })
    }

    pub fn infinite_cylinder(
        radius: Real,
        direction: Vector3<Real>,
        center: Point3<Real>,
    ) -> Result<Self, CsgError> {
        check_finite("radius", &[radius])?;
        check_finite("center", center.coords.as_slice())?;
        Ok(Self::canonical_infinite_cylinder(
            radius.abs(),
            unit_direction(&direction)?,
            center,
            radius < 0.0,
            true,
        ))
    }

    fn canonical_infinite_cylinder(
        radius: Real,
        direction: Vector3<Real>,
        center: Point3<Real>,
        exterior: bool,
        closed: bool,
    ) -> Self {
        let direction = sign_canonical(&direction);
        // the axis is invariant under translation along itself
        let center = center - direction * center.coords.dot(&direction);
        Primitive::InfiniteCylinder {
            radius: snap(radius),
            direction: snap_vec(&direction),
            center: snap_point(&center),
            exterior,
            closed,
        }
    }

    /// A negative slope denotes the exterior of the cone.
    pub fn semi_infinite_cone(
        slope: Real,
        direction: Vector3<Real>,
        apex: Point3<Real>,
    ) -> Result<Self, CsgError> {
        check_finite("slope", &[slope])?;
        check_finite("center", apex.coords.as_slice())?;
        Ok(Primitive::SemiInfiniteCone {
            slope: snap(slope.abs()),
            direction: snap_vec(&unit_direction(&direction)?),
            center: snap_point(&apex),
            exterior: slope < 0.0,
            closed: true,
        })
    }

    pub fn cuboid(center: Point3<Real>, size: Vector3<Real>) -> Result<Self, CsgError> {
        check_finite("center", center.coords.as_slice())?;
        check_finite("size", size.as_slice())?;
        Ok(Primitive::Cuboid {
            center: snap_point(&center),
            size: snap_vec(&size.abs()),
            closed: true,
        })
    }

    pub fn cylinder(
        radius: Real,
        height: Real,
        center: Point3<Real>,
        direction: Vector3<Real>,
    ) -> Result<Self, CsgError> {
        check_finite("radius", &[radius, height])?;
        check_finite("center", center.coords.as_slice())?;
        let mut direction = unit_direction(&direction)?;
        let mut center = center;
        let mut height = height;
        if height < 0.0 {
            height = -height;
            direction = -direction;
        }
        // a finite cylinder is symmetric under swapping its two caps
        let canonical = sign_canonical(&direction);
        if canonical != direction {
            center += direction * height;
            direction = canonical;
        }
        Ok(Primitive::Cylinder {
            radius: snap(radius.abs()),
            height: snap(height),
            center: snap_point(&center),
            direction: snap_vec(&direction),
            closed: true,
        })
    }

    pub fn cone(
        radius: Real,
        height: Real,
        center: Point3<Real>,
        direction: Vector3<Real>,
    ) -> Result<Self, CsgError> {
        check_finite("radius", &[radius, height])?;
        check_finite("center", center.coords.as_slice())?;
        let mut direction = unit_direction(&direction)?;
        if height < 0.0 {
            direction = -direction;
        }
        Ok(Primitive::Cone {
            radius: snap(radius.abs()),
            height: snap(height.abs()),
            center: snap_point(&center),
            direction: snap_vec(&direction),
            closed: true,
        })
    }

    pub fn is_closed(&self) -> bool {
        match self {
            Primitive::Halfspace { closed, .. }
            | Primitive::Sphere { closed, .. }
            | Primitive::InfiniteCylinder { closed, .. }
            | Primitive::SemiInfiniteCone { closed, .. }
            | Primitive::Cuboid { closed, .. }
            | Primitive::Cylinder { closed, .. }
            | Primitive::Cone { closed, .. } => *closed,
        }
    }

    /// Copy of this primitive with the `closed` flag replaced.
    pub fn with_closed(&self, value: bool) -> Self {
        let mut out = self.clone();
        match &mut out {
            Primitive::Halfspace { closed, .. }
            | Primitive::Sphere { closed, .. }
            | Primitive::InfiniteCylinder { closed, .. }
            | Primitive::SemiInfiniteCone { closed, .. }
            | Primitive::Cuboid { closed, .. }
            | Primitive::Cylinder { closed, .. }
            | Primitive::Cone { closed, .. } => *closed = value,
        }
        out
    }

    pub fn interior(&self) -> Self {
        self.with_closed(false)
    }

    pub fn closure(&self) -> Self {
        self.with_closed(true)
    }

    /// The complementary primitive of the same kind, when the kind has one.
    pub fn complement(&self) -> Option<Self> {
        match self {
            Primitive::Halfspace {
                direction,
                offset,
                closed,
            } => Some(Primitive::Halfspace {
                direction: snap_vec(&-direction),
                offset: snap(-offset),
                closed: !closed,
            }),
            Primitive::Sphere {
                radius,
                center,
                exterior,
                closed,
            } => Some(Primitive::Sphere {
                radius: *radius,
                center: *center,
                exterior: !exterior,
                closed: !closed,
            }),
            Primitive::InfiniteCylinder {
                radius,
                direction,
                center,
                exterior,
                closed,
            } => Some(Primitive::InfiniteCylinder {
                radius: *radius,
                direction: *direction,
                center: *center,
                exterior: !exterior,
                closed: !closed,
            }),
            Primitive::SemiInfiniteCone {
                slope,
                direction,
                center,
                exterior,
                closed,
            } => Some(Primitive::SemiInfiniteCone {
                slope: *slope,
                direction: *direction,
                center: *center,
                exterior: !exterior,
                closed: !closed,
            }),
            Primitive::Cuboid { .. } | Primitive::Cylinder { .. } | Primitive::Cone { .. } => None,
        }
    }

    /// Push a transformation into the parameters, when the kind is closed
    /// under it. Half-spaces accept any affine map, round kinds need a
    /// Euclidean one, and boxes only survive signed axis permutations.
    pub fn image(&self, t: &Transformation) -> Option<Self> {
        let euclidean = t.as_euclidean().is_some();
        match self {
            Primitive::Halfspace {
                direction, offset, closed,
            } => {
                // q ∈ T(H)  ⇔  (A⁻ᵀ d)·q ≥ o + (A⁻ᵀ d)·t
                let inv_t = t.linear().try_inverse()?.transpose();
                let raw = inv_t * direction;
                let n = raw.norm();
                if n < EPSILON {
                    return None;
                }
                let new_dir = raw / n;
                let new_offset = offset / n + t.translation_part().dot(&new_dir);
                Some(Primitive::Halfspace {
                    direction: snap_vec(&new_dir),
                    offset: snap(new_offset),
                    closed: *closed,
                })
            }
            Primitive::Sphere {
                radius, center, exterior, closed,
            } if euclidean => Some(Primitive::Sphere {
                radius: *radius,
                center: snap_point(&t.apply(center)),
                exterior: *exterior,
                closed: *closed,
            }),
            Primitive::InfiniteCylinder {
                radius, direction, center, exterior, closed,
            } if euclidean => Some(Self::canonical_infinite_cylinder(
                *radius,
                t.apply_vector(direction),
                t.apply(center),
                *exterior,
                *closed,
            )),
            Primitive::SemiInfiniteCone {
                slope, direction, center, exterior, closed,
            } if euclidean => Some(Primitive::SemiInfiniteCone {
                slope: *slope,
                direction: snap_vec(&t.apply_vector(direction)),
                center: snap_point(&t.apply(center)),
                exterior: *exterior,
                closed: *closed,
            }),
            Primitive::Cuboid { center, size, closed } if euclidean => {
                let m = t.linear();
                let mut new_size = Vector3::zeros();
                for col in 0..3 {
                    let axis = m.column(col);
                    let row = (0..3).find(|&r| (axis[r].abs() - 1.0).abs() < 1e-9)?;
                    new_size[row] = size[col];
                }
                Some(Primitive::Cuboid {
                    center: snap_point(&t.apply(center)),
                    size: snap_vec(&new_size),
                    closed: *closed,
                })
            }
            Primitive::Cylinder {
                radius, height, center, direction, closed,
            } if euclidean => {
                let out = Primitive::cylinder(*radius, *height, t.apply(center), t.apply_vector(direction))
                    .ok()?;
                Some(out.with_closed(*closed))
            }
            Primitive::Cone {
                radius, height, center, direction, closed,
            } if euclidean => {
                let out = Primitive::cone(*radius, *height, t.apply(center), t.apply_vector(direction)).ok()?;
                Some(out.with_closed(*closed))
            }
            _ => None,
        }
    }

    /// Membership formula at the symbolic point `p`.
    pub fn contains_formula(&self, p: &Vec3Expr) -> Formula {
        // `lower ≤ value` (closed) or `lower < value` (open)
        let at_least = |closed: bool, value: Expr, lower: Expr| {
            if closed { Formula::ge(value, lower) } else { Formula::gt(value, lower) }
        };
        let at_most = |closed: bool, value: Expr, upper: Expr| {
            if closed { Formula::le(value, upper) } else { Formula::lt(value, upper) }
        };
        match self {
            Primitive::Halfspace {
                direction, offset, closed,
            } => at_least(*closed, dot(p, &vconst(direction)), Expr::constant(*offset)),
            Primitive::Sphere {
                radius, center, exterior, closed,
            } => {
                let rel = vsub(p, &vconst(&center.coords));
                let d2 = dot(&rel, &rel);
                let r2 = Expr::constant(radius * radius);
                if *exterior { at_least(*closed, d2, r2) } else { at_most(*closed, d2, r2) }
            }
            Primitive::InfiniteCylinder {
                radius, direction, center, exterior, closed,
            } => {
                let rho2 = radial_squared(p, center, direction);
                let r2 = Expr::constant(radius * radius);
                if *exterior { at_least(*closed, rho2, r2) } else { at_most(*closed, rho2, r2) }
            }
            Primitive::SemiInfiniteCone {
                slope, direction, center, exterior, closed,
            } => {
                let h = dot(&vsub(p, &vconst(&center.coords)), &vconst(direction));
                let rho2 = radial_squared(p, center, direction);
                let bound = Expr::constant(slope * slope) * h.clone().square();
                if *exterior {
                    Formula::or([
                        at_most(*closed, h, Expr::zero()),
                        at_least(*closed, rho2, bound),
                    ])
                } else {
                    Formula::and([
                        at_least(*closed, h, Expr::zero()),
                        at_most(*closed, rho2, bound),
                    ])
                }
            }
            Primitive::Cuboid { center, size, closed } => Formula::and((0..3).map(|i| {
                let rel = (p[i].clone() - Expr::constant(center[i])).abs();
                at_most(*closed, rel, Expr::constant(size[i] / 2.0))
            })),
            Primitive::Cylinder {
                radius, height, center, direction, closed,
            } => {
                let h = dot(&vsub(p, &vconst(&center.coords)), &vconst(direction));
                Formula::and([
                    at_least(*closed, h.clone(), Expr::zero()),
                    at_most(*closed, h, Expr::constant(*height)),
                    at_most(
                        *closed,
                        radial_squared(p, center, direction),
                        Expr::constant(radius * radius),
                    ),
                ])
            }
            Primitive::Cone {
                radius, height, center, direction, closed,
            } => {
                let h = dot(&vsub(p, &vconst(&center.coords)), &vconst(direction));
                let shrink = if *height > 0.0 { radius / height } else { 0.0 };
                let allowed = Expr::constant(shrink) * (Expr::constant(*height) - h.clone());
                Formula::and([
                    at_least(*closed, h.clone(), Expr::zero()),
                    at_most(*closed, h, Expr::constant(*height)),
                    at_most(*closed, radial_squared(p, center, direction), allowed.square()),
                ])
            }
        }
    }

    /// Numeric membership test.
    pub fn contains_point(&self, p: &Point3<Real>) -> bool {
        matches!(self.contains_formula(&vconst(&p.coords)), Formula::True)
    }

    /// Axis-aligned bounds for the bounded kinds.
    pub fn bounds(&self) -> Option<(Point3<Real>, Point3<Real>)> {
        match self {
            Primitive::Sphere {
                radius, center, exterior: false, ..
            } => {
                let r = Vector3::repeat(*radius);
                Some((center - r, center + r))
            }
            Primitive::Cuboid { center, size, .. } => Some((center - size / 2.0, center + size / 2.0)),
            Primitive::Cylinder {
                radius, height, center, direction, ..
            }
            | Primitive::Cone {
                radius, height, center, direction, ..
            } => {
                let top = center + direction * *height;
                let r = Vector3::repeat(*radius);
                Some((center.inf(&top) - r, center.sup(&top) + r))
            }
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Primitive::Halfspace { .. } => "Halfspace",
            Primitive::Sphere { .. } => "Sphere",
            Primitive::InfiniteCylinder { .. } => "InfiniteCylinder",
            Primitive::SemiInfiniteCone { .. } => "SemiInfiniteCone",
            Primitive::Cuboid { .. } => "Box",
            Primitive::Cylinder { .. } => "Cylinder",
            Primitive::Cone { .. } => "Cone",
        }
    }

    /// Named parameters as stored by the host document.
    pub fn properties(&self) -> Vec<(&'static str, String)> {
        let v = |u: &Vector3<Real>| format!("Vector({}, {}, {})", u.x, u.y, u.z);
        let p = |u: &Point3<Real>| format!("Vector({}, {}, {})", u.x, u.y, u.z);
        let signed = |m: Real, exterior: bool| if exterior { -m } else { m };
        let mut out = match self {
            Primitive::Halfspace { direction, offset, .. } => {
                vec![("Direction", v(direction)), ("Offset", offset.to_string())]
            }
            Primitive::Sphere {
                radius, center, exterior, ..
            } => vec![
                ("Radius", signed(*radius, *exterior).to_string()),
                ("Center", p(center)),
            ],
            Primitive::InfiniteCylinder {
                radius, direction, center, exterior, ..
            } => vec![
                ("Radius", signed(*radius, *exterior).to_string()),
                ("Direction", v(direction)),
                ("Center", p(center)),
            ],
            Primitive::SemiInfiniteCone {
                slope, direction, center, exterior, ..
            } => vec![
                ("Slope", signed(*slope, *exterior).to_string()),
                ("Direction", v(direction)),
                ("Center", p(center)),
            ],
            Primitive::Cuboid { center, size, .. } => vec![("Center", p(center)), ("Size", v(size))],
            Primitive::Cylinder {
                radius, height, center, direction, ..
            }
            | Primitive::Cone {
                radius, height, center, direction, ..
            } => vec![
                ("Radius", radius.to_string()),
                ("Height", height.to_string()),
                ("Center", p(center)),
                ("Orientation", v(direction)),
            ],
        };
        out.push((
            "Closed",
            if self.is_closed() { "True" } else { "False" }.to_string(),
        ));
        out
    }

    fn hash_key(&self) -> Vec<Real> {
        let v3 = |u: &Vector3<Real>| [u.x, u.y, u.z];
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        match self {
            Primitive::Halfspace { direction, offset, .. } => {
                [v3(direction).as_slice(), &[*offset]].concat()
            }
            Primitive::Sphere {
                radius, center, exterior, ..
            } => [&[*radius, flag(*exterior)][..], &v3(&center.coords)].concat(),
            Primitive::InfiniteCylinder {
                radius, direction, center, exterior, ..
            }
            | Primitive::SemiInfiniteCone {
                slope: radius, direction, center, exterior, ..
            } => [&[*radius, flag(*exterior)][..], &v3(direction), &v3(&center.coords)].concat(),
            Primitive::Cuboid { center, size, .. } => [v3(&center.coords), v3(size)].concat(),
            Primitive::Cylinder {
                radius, height, center, direction, ..
            }
            | Primitive::Cone {
                radius, height, center, direction, ..
            } => [&[*radius, *height][..], &v3(&center.coords), &v3(direction)].concat(),
        }
    }
}

fn radial_squared(p: &Vec3Expr, center: &Point3<Real>, direction: &Vector3<Real>) -> Expr {
    let rel = vsub(p, &vconst(&center.coords));
    let along = dot(&rel, &vconst(direction));
    dot(&rel, &rel) - along.square()
}

// parameters are snapped and finite
impl Eq for Primitive {}

impl Hash for Primitive {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind_name().hash(state);
        self.is_closed().hash(state);
        for c in self.hash_key() {
            OrderedFloat(c).hash(state);
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.kind_name())?;
        for (i, (name, value)) in self.properties().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name.to_lowercase(), value)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::float_types::FRAC_PI_2;

    #[test]
    fn zero_direction_is_invalid() {
        assert!(matches!(
            Primitive::halfspace(Vector3::zeros(), 0.0),
            Err(CsgError::InvalidParameter(_))
        ));
    }

    #[test]
    fn halfspace_is_normalized() {
        let h = Primitive::halfspace(Vector3::new(0.0, 2.0, 0.0), 4.0).unwrap();
        assert_eq!(h, Primitive::halfspace(Vector3::y(), 2.0).unwrap());
        assert!(h.contains_point(&Point3::new(0.0, 2.0, 0.0)));
        assert!(!h.interior().contains_point(&Point3::new(0.0, 2.0, 0.0)));
    }

    #[test]
    fn cylinder_axis_is_canonical() {
        let a = Primitive::infinite_cylinder(1.0, Vector3::new(0.0, 0.0, -3.0), Point3::new(1.0, 0.0, 5.0))
            .unwrap();
        let b = Primitive::infinite_cylinder(1.0, Vector3::z(), Point3::new(1.0, 0.0, -2.0)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn complement_is_an_involution() {
        let prims = [
            Primitive::halfspace(Vector3::new(1.0, 1.0, 0.0), 0.5).unwrap(),
            Primitive::sphere(2.0, Point3::new(1.0, 0.0, 0.0)).unwrap(),
            Primitive::semi_infinite_cone(0.5, Vector3::z(), Point3::origin()).unwrap(),
        ];
        for p in prims {
            let c = p.complement().unwrap();
            assert_ne!(c, p);
            assert_eq!(c.complement().unwrap(), p);
        }
    }

    #[test]
    fn complement_partitions_points() {
        let cone = Primitive::semi_infinite_cone(1.0, Vector3::z(), Point3::origin()).unwrap();
        let ext = cone.complement().unwrap();
        for p in [
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(2.0, 0.0, 1.0),
            Point3::new(0.0, 0.0, -1.0),
            Point3::origin(),
        ] {
            assert_ne!(cone.contains_point(&p), ext.contains_point(&p), "{p}");
        }
    }

    #[test]
    fn negative_radius_is_exterior() {
        let s = Primitive::sphere(-1.0, Point3::origin()).unwrap();
        assert!(!s.contains_point(&Point3::new(0.5, 0.0, 0.0)));
        assert!(s.contains_point(&Point3::new(2.0, 0.0, 0.0)));
        assert_eq!(s.complement().unwrap(), Primitive::sphere(1.0, Point3::origin()).unwrap().interior());
    }

    #[test]
    fn rotated_halfspace_moves_its_normal() {
        let h = Primitive::halfspace(Vector3::x(), 1.0).unwrap();
        let r = Transformation::rotation(Vector3::z(), FRAC_PI_2).unwrap();
        assert_eq!(h.image(&r).unwrap(), Primitive::halfspace(Vector3::y(), 1.0).unwrap());
        let t = Transformation::translation(Vector3::new(2.0, 0.0, 0.0));
        assert_eq!(h.image(&t).unwrap(), Primitive::halfspace(Vector3::x(), 3.0).unwrap());
    }

    #[test]
    fn box_survives_quarter_turns_only() {
        let b = Primitive::cuboid(Point3::origin(), Vector3::new(1.0, 2.0, 3.0)).unwrap();
        let quarter = Transformation::rotation(Vector3::z(), FRAC_PI_2).unwrap();
        assert_eq!(
            b.image(&quarter).unwrap(),
            Primitive::cuboid(Point3::origin(), Vector3::new(2.0, 1.0, 3.0)).unwrap()
        );
        let eighth = Transformation::rotation(Vector3::z(), FRAC_PI_2 / 2.0).unwrap();
        assert!(b.image(&eighth).is_none());
    }
}
