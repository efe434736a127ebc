//! Rigid and affine transformations of ℝ³.
//!
//! Transformations are kept in a normal form: anything whose linear part is
//! orthogonal is stored as a [`EuclideanTransformation`] (translation,
//! rotation quaternion, parity), everything else as an
//! [`AffineTransformation`]. Group membership is read off that normal form
//! instead of being re-derived from matrix identities.

use std::fmt;
use std::hash::{Hash, Hasher};

use nalgebra::{Cholesky, Matrix3, Matrix4, Point3, Quaternion, UnitQuaternion, Vector3};
use ordered_float::OrderedFloat;

use crate::errors::CsgError;
use crate::expr::{Expr, Vec3Expr};
use crate::float_types::{EPSILON, Real, snap};

// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// Quaternion algebra
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/// The unit quaternion of `q`; rotations are stored as plain quaternions so
/// that they can be snapped and hashed.
pub fn to_unit_quaternion(q: &Quaternion<Real>) -> UnitQuaternion<Real> {
    UnitQuaternion::from_quaternion(*q)
}

fn rotation_matrix(q: &Quaternion<Real>) -> Matrix3<Real> {
    to_unit_quaternion(q).to_rotation_matrix().into_inner()
}

/// Reconstruct a unit quaternion from a rotation matrix.
///
/// The branch with a non-vanishing `w` is tried first; only when the trace is
/// close to `-1` do we fall back to the branch led by the largest diagonal entry.
pub fn quat_from_matrix(m: &Matrix3<Real>) -> Quaternion<Real> {
    let trace = m[(0, 0)] + m[(1, 1)] + m[(2, 2)];
    let q = if trace > -0.9 {
        let s = (1.0 + trace).sqrt() * 2.0;
        Quaternion::new(
            0.25 * s,
            (m[(2, 1)] - m[(1, 2)]) / s,
            (m[(0, 2)] - m[(2, 0)]) / s,
            (m[(1, 0)] - m[(0, 1)]) / s,
        )
    } else if m[(0, 0)] > m[(1, 1)] && m[(0, 0)] > m[(2, 2)] {
        let s = (1.0 + m[(0, 0)] - m[(1, 1)] - m[(2, 2)]).sqrt() * 2.0;
        Quaternion::new(
            (m[(2, 1)] - m[(1, 2)]) / s,
            0.25 * s,
            (m[(0, 1)] + m[(1, 0)]) / s,
            (m[(0, 2)] + m[(2, 0)]) / s,
        )
    } else if m[(1, 1)] > m[(2, 2)] {
        let s = (1.0 + m[(1, 1)] - m[(0, 0)] - m[(2, 2)]).sqrt() * 2.0;
        Quaternion::new(
            (m[(0, 2)] - m[(2, 0)]) / s,
            (m[(0, 1)] + m[(1, 0)]) / s,
            0.25 * s,
            (m[(1, 2)] + m[(2, 1)]) / s,
        )
    } else {
        let s = (1.0 + m[(2, 2)] - m[(0, 0)] - m[(1, 1)]).sqrt() * 2.0;
        Quaternion::new(
            (m[(1, 0)] - m[(0, 1)]) / s,
            (m[(0, 2)] + m[(2, 0)]) / s,
            (m[(1, 2)] + m[(2, 1)]) / s,
            0.25 * s,
        )
    };
    canonical_quat(&q)
}

/// Normalize, choose the sign with `w > 0` (or the first non-zero component
/// positive), and snap the components.
fn canonical_quat(q: &Quaternion<Real>) -> Quaternion<Real> {
    let n = q.norm();
    let mut c = if n > EPSILON { q / n } else { Quaternion::identity() };
    let lead = [c.w, c.i, c.j, c.k]
        .into_iter()
        .find(|v| v.abs() > EPSILON)
        .unwrap_or(1.0);
    if lead < 0.0 {
        c = -c;
    }
    Quaternion::new(snap(c.w), snap(c.i), snap(c.j), snap(c.k))
}

fn snap_vec(v: &Vector3<Real>) -> Vector3<Real> {
    Vector3::new(snap(v.x), snap(v.y), snap(v.z))
}

// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// Transformations
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/// Orientation behaviour of a Euclidean transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parity {
    /// `+1`: orientation preserving.
    Even,
    /// `-1`: composed with the point inversion `x ↦ -x`.
    Odd,
}

impl Parity {
    pub fn sign(self) -> Real {
        match self {
            Parity::Even => 1.0,
            Parity::Odd => -1.0,
        }
    }

    pub fn compose(self, other: Parity) -> Parity {
        if self == other { Parity::Even } else { Parity::Odd }
    }
}

/// `x ↦ rquat · (parity · x) + tvec`
#[derive(Debug, Clone, PartialEq)]
pub struct EuclideanTransformation {
    pub tvec: Vector3<Real>,
    pub rquat: Quaternion<Real>,
    pub parity: Parity,
}

/// `x ↦ matrix · x + vector`
#[derive(Debug, Clone, PartialEq)]
pub struct AffineTransformation {
    pub matrix: Matrix3<Real>,
    pub vector: Vector3<Real>,
}

/// A transformation of ℝ³ in normal form.
#[derive(Debug, Clone, PartialEq)]
pub enum Transformation {
    Euclidean(EuclideanTransformation),
    Affine(AffineTransformation),
}

// every stored component is snapped and finite
impl Eq for Transformation {}

impl Hash for Transformation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Transformation::Euclidean(e) => {
                0u8.hash(state);
                for c in e.tvec.iter() {
                    OrderedFloat(*c).hash(state);
                }
                for c in [e.rquat.w, e.rquat.i, e.rquat.j, e.rquat.k] {
                    OrderedFloat(c).hash(state);
                }
                e.parity.hash(state);
            }
            Transformation::Affine(a) => {
                1u8.hash(state);
                for c in a.matrix.iter().chain(a.vector.iter()) {
                    OrderedFloat(*c).hash(state);
                }
            }
        }
    }
}

/// The nested transformation groups, narrowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransformationGroup {
    Translation,
    Rotation,
    SpecialEuclidean,
    Euclidean,
    Affine,
    Trans,
}

impl TransformationGroup {
    /// Membership by inspection of the normal form.
    pub fn contains(self, t: &Transformation) -> bool {
        match (self, t) {
            (TransformationGroup::Trans, _) | (TransformationGroup::Affine, _) => true,
            (_, Transformation::Affine(_)) => false,
            (TransformationGroup::Euclidean, Transformation::Euclidean(_)) => true,
            (TransformationGroup::SpecialEuclidean, Transformation::Euclidean(e)) => {
                e.parity == Parity::Even
            }
            (TransformationGroup::Rotation, Transformation::Euclidean(e)) => {
                e.parity == Parity::Even && e.tvec == Vector3::zeros()
            }
            (TransformationGroup::Translation, Transformation::Euclidean(e)) => {
                e.parity == Parity::Even && e.rquat == Quaternion::identity()
            }
        }
    }

    pub fn is_subgroup_of(self, other: TransformationGroup) -> bool {
        match (self, other) {
            (a, b) if a == b => true,
            (TransformationGroup::Translation, TransformationGroup::Rotation)
            | (TransformationGroup::Rotation, TransformationGroup::Translation) => false,
            (a, b) => a < b,
        }
    }
}

impl Transformation {
    pub fn identity() -> Self {
        Transformation::euclidean(Vector3::zeros(), Quaternion::identity(), Parity::Even)
    }

    /// Build a Euclidean transformation; the quaternion is normalized and sign-canonicalized.
    pub fn euclidean(tvec: Vector3<Real>, rquat: Quaternion<Real>, parity: Parity) -> Self {
        Transformation::Euclidean(EuclideanTransformation {
            tvec: snap_vec(&tvec),
            rquat: canonical_quat(&rquat),
            parity,
        })
    }

    pub fn translation(v: Vector3<Real>) -> Self {
        Transformation::euclidean(v, Quaternion::identity(), Parity::Even)
    }

    /// Rotation by `angle` radians about `axis` through the origin.
    pub fn rotation(axis: Vector3<Real>, angle: Real) -> Result<Self, CsgError> {
        let n = axis.norm();
        if n < EPSILON || !n.is_finite() {
            return Err(CsgError::InvalidParameter(format!(
                "rotation axis must be non-zero, got {axis:?}"
            )));
        }
        let u = axis / n;
        let (s, c) = (angle / 2.0).sin_cos();
        let q = Quaternion::new(c, u.x * s, u.y * s, u.z * s);
        Ok(Transformation::euclidean(Vector3::zeros(), q, Parity::Even))
    }

    /// Rotation about the line through `center` with direction `axis`.
    pub fn rotation_about(
        axis: Vector3<Real>,
        angle: Real,
        center: Point3<Real>,
    ) -> Result<Self, CsgError> {
        let to = Transformation::translation(center.coords);
        let back = Transformation::translation(-center.coords);
        Ok(to.compose(&Transformation::rotation(axis, angle)?).compose(&back))
    }

    /// The point inversion `x ↦ -x`.
    pub fn inversion() -> Self {
        Transformation::euclidean(Vector3::zeros(), Quaternion::identity(), Parity::Odd)
    }

    /// Reflection through the plane through the origin with normal `normal`.
    pub fn reflection(normal: Vector3<Real>) -> Result<Self, CsgError> {
        // inversion composed with a half turn about the normal
        Ok(Transformation::inversion().compose(&Transformation::rotation(normal, crate::float_types::PI)?))
    }

    /// Build from a linear part and a translation, normalizing to the
    /// Euclidean form when the linear part is orthogonal.
    pub fn affine(matrix: Matrix3<Real>, vector: Vector3<Real>) -> Result<Self, CsgError> {
        if matrix.iter().chain(vector.iter()).any(|c| !c.is_finite()) {
            return Err(CsgError::InvalidParameter("non-finite affine entry".into()));
        }
        let det = matrix.determinant();
        if det.abs() < EPSILON {
            return Err(CsgError::InvalidParameter(format!(
                "affine matrix is singular (det = {det})"
            )));
        }
        let gram = matrix.transpose() * matrix;
        if (gram - Matrix3::identity()).abs().max() < 1e-9 {
            let parity = if det > 0.0 { Parity::Even } else { Parity::Odd };
            let rot = matrix * parity.sign();
            return Ok(Transformation::euclidean(vector, quat_from_matrix(&rot), parity));
        }
        Ok(Transformation::Affine(AffineTransformation {
            matrix: matrix.map(snap),
            vector: snap_vec(&vector),
        }))
    }

    /// Build from a 4×4 augmented matrix; the last row must be `[0 0 0 1]`.
    pub fn from_matrix4(m: &Matrix4<Real>) -> Result<Self, CsgError> {
        let last = m.row(3);
        if (last[0].abs() + last[1].abs() + last[2].abs() + (last[3] - 1.0).abs()) > EPSILON {
            return Err(CsgError::InvalidParameter(
                "augmented matrix must end with row [0 0 0 1]".into(),
            ));
        }
        let linear = m.fixed_view::<3, 3>(0, 0).into_owned();
        let vector = m.fixed_view::<3, 1>(0, 3).into_owned();
        Transformation::affine(linear, vector)
    }

    /// Linear part of the map.
    pub fn linear(&self) -> Matrix3<Real> {
        match self {
            Transformation::Euclidean(e) => rotation_matrix(&e.rquat) * e.parity.sign(),
            Transformation::Affine(a) => a.matrix,
        }
    }

    /// Translation part of the map.
    pub fn translation_part(&self) -> Vector3<Real> {
        match self {
            Transformation::Euclidean(e) => e.tvec,
            Transformation::Affine(a) => a.vector,
        }
    }

    pub fn to_matrix4(&self) -> Matrix4<Real> {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.linear());
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation_part());
        m
    }

    pub fn apply(&self, p: &Point3<Real>) -> Point3<Real> {
        match self {
            Transformation::Euclidean(e) => {
                Point3::from(to_unit_quaternion(&e.rquat).transform_vector(&(p.coords * e.parity.sign())) + e.tvec)
            }
            Transformation::Affine(a) => Point3::from(a.matrix * p.coords + a.vector),
        }
    }

    /// Apply the linear part only.
    pub fn apply_vector(&self, v: &Vector3<Real>) -> Vector3<Real> {
        match self {
            Transformation::Euclidean(e) => to_unit_quaternion(&e.rquat).transform_vector(&(v * e.parity.sign())),
            Transformation::Affine(a) => a.matrix * v,
        }
    }

    /// Coordinate form of [`apply`](Self::apply).
    pub fn call(&self, x: Real, y: Real, z: Real) -> (Real, Real, Real) {
        let p = self.apply(&Point3::new(x, y, z));
        (p.x, p.y, p.z)
    }

    /// Owned closure evaluating the transformation.
    pub fn as_lambda(&self) -> impl Fn(&Point3<Real>) -> Point3<Real> + Send + Sync + 'static {
        let linear = self.linear();
        let shift = self.translation_part();
        move |p| Point3::from(linear * p.coords + shift)
    }

    /// Symbolic image of a coordinate vector.
    pub fn apply_exprs(&self, v: &Vec3Expr) -> Vec3Expr {
        let m = self.linear();
        let t = self.translation_part();
        let row = |i: usize| {
            Expr::constant(m[(i, 0)]) * v[0].clone()
                + Expr::constant(m[(i, 1)]) * v[1].clone()
                + Expr::constant(m[(i, 2)]) * v[2].clone()
                + Expr::constant(t[i])
        };
        [row(0), row(1), row(2)]
    }

    /// `self ∘ other`: apply `other` first. The result stays in the narrowest
    /// representation containing both operands.
    pub fn compose(&self, other: &Transformation) -> Transformation {
        match (self, other) {
            (Transformation::Euclidean(a), Transformation::Euclidean(b)) => {
                let tvec = a.tvec + to_unit_quaternion(&a.rquat).transform_vector(&(b.tvec * a.parity.sign()));
                Transformation::euclidean(
                    tvec,
                    a.rquat * b.rquat,
                    a.parity.compose(b.parity),
                )
            }
            _ => {
                let matrix = self.linear() * other.linear();
                let vector = self.linear() * other.translation_part() + self.translation_part();
                // composing invertible maps never produces a singular matrix
                Transformation::affine(matrix, vector).unwrap_or_else(|_| {
                    Transformation::Affine(AffineTransformation { matrix, vector })
                })
            }
        }
    }

    pub fn inverse(&self) -> Transformation {
        match self {
            Transformation::Euclidean(e) => {
                let qinv = e.rquat.try_inverse().unwrap_or_else(Quaternion::identity);
                let tvec = -to_unit_quaternion(&qinv).transform_vector(&e.tvec) * e.parity.sign();
                Transformation::euclidean(tvec, qinv, e.parity)
            }
            Transformation::Affine(a) => {
                let inv = a.matrix.try_inverse().unwrap_or_else(Matrix3::identity);
                Transformation::Affine(AffineTransformation {
                    matrix: inv.map(snap),
                    vector: snap_vec(&(-(inv * a.vector))),
                })
            }
        }
    }

    /// Narrowest group of the hierarchy containing this transformation.
    pub fn group(&self) -> TransformationGroup {
        [
            TransformationGroup::Translation,
            TransformationGroup::Rotation,
            TransformationGroup::SpecialEuclidean,
            TransformationGroup::Euclidean,
        ]
        .into_iter()
        .find(|g| g.contains(self))
        .unwrap_or(TransformationGroup::Affine)
    }

    pub fn is_identity(&self) -> bool {
        *self == Transformation::identity()
    }

    pub fn as_euclidean(&self) -> Option<&EuclideanTransformation> {
        match self {
            Transformation::Euclidean(e) => Some(e),
            Transformation::Affine(_) => None,
        }
    }
}

impl fmt::Display for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transformation::Euclidean(e) => write!(
                f,
                "EuclideanTransformation(tvec=({}, {}, {}), rquat=({}, {}, {}, {}), parity={})",
                e.tvec.x,
                e.tvec.y,
                e.tvec.z,
                e.rquat.w,
                e.rquat.i,
                e.rquat.j,
                e.rquat.k,
                e.parity.sign()
            ),
            Transformation::Affine(a) => {
                write!(f, "AffineTransformation(matrix=[")?;
                for r in 0..3 {
                    if r > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{} {} {}", a.matrix[(r, 0)], a.matrix[(r, 1)], a.matrix[(r, 2)])?;
                }
                write!(f, "], vector=({}, {}, {}))", a.vector.x, a.vector.y, a.vector.z)
            }
        }
    }
}

// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// Affine decomposition
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/// Translation, rotation, parity, scale and shear of an affine map:
/// `A = parity · R · diag(scale) · H`, with `H` unit upper triangular holding
/// the shear triple `(xy, xz, yz)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trpzs {
    pub translation: Vector3<Real>,
    pub rotation: Quaternion<Real>,
    pub parity: Parity,
    pub scale: Vector3<Real>,
    pub shear: Vector3<Real>,
}

/// Decompose an augmented affine matrix.
///
/// Uses the Cholesky factor `U` of `AᵀA = UᵀU`; `Q = A U⁻¹` is then
/// orthogonal. Succeeds whenever the linear part is invertible.
pub fn aff2trpzs(m: &Matrix4<Real>) -> Result<Trpzs, CsgError> {
    let a = m.fixed_view::<3, 3>(0, 0).into_owned();
    let translation = m.fixed_view::<3, 1>(0, 3).into_owned();
    if a.determinant().abs() < EPSILON {
        return Err(CsgError::InvalidParameter("affine matrix is singular".into()));
    }
    let chol = Cholesky::new(a.transpose() * a)
        .ok_or_else(|| CsgError::InvalidParameter("AᵀA is not positive definite".into()))?;
    let u = chol.l().transpose();
    let u_inv = u
        .try_inverse()
        .ok_or_else(|| CsgError::InvalidParameter("Cholesky factor is singular".into()))?;
    let q = a * u_inv;
    let parity = if q.determinant() > 0.0 { Parity::Even } else { Parity::Odd };
    let rotation = quat_from_matrix(&(q * parity.sign()));
    let scale = Vector3::new(u[(0, 0)], u[(1, 1)], u[(2, 2)]);
    let shear = Vector3::new(
        u[(0, 1)] / u[(0, 0)],
        u[(0, 2)] / u[(0, 0)],
        u[(1, 2)] / u[(1, 1)],
    );
    Ok(Trpzs {
        translation,
        rotation,
        parity,
        scale,
        shear,
    })
}

/// Rebuild the augmented matrix from its decomposition.
pub fn trpzs2aff(d: &Trpzs) -> Matrix4<Real> {
    let h = Matrix3::new(
        1.0, d.shear.x, d.shear.y,
        0.0, 1.0, d.shear.z,
        0.0, 0.0, 1.0,
    );
    let a = rotation_matrix(&d.rotation) * d.parity.sign() * Matrix3::from_diagonal(&d.scale) * h;
    let mut m = Matrix4::identity();
    m.fixed_view_mut::<3, 3>(0, 0).copy_from(&a);
    m.fixed_view_mut::<3, 1>(0, 3).copy_from(&d.translation);
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::float_types::{FRAC_PI_2, approx_eq};

    fn close(a: &Point3<Real>, b: &Point3<Real>) -> bool {
        (a - b).norm() < 1e-8
    }

    #[test]
    fn quarter_turn_about_z() {
        let r = Transformation::rotation(Vector3::z(), FRAC_PI_2).unwrap();
        assert!(close(&r.apply(&Point3::new(1.0, 0.0, 0.0)), &Point3::new(0.0, 1.0, 0.0)));
        assert_eq!(r.group(), TransformationGroup::Rotation);
    }

    #[test]
    fn compose_with_inverse_is_identity() {
        let t = Transformation::rotation_about(Vector3::new(1.0, 2.0, 3.0), 0.7, Point3::new(1.0, -1.0, 2.0))
            .unwrap()
            .compose(&Transformation::inversion());
        assert_eq!(t.compose(&t.inverse()), Transformation::identity());
        assert_eq!(t.inverse().compose(&t), Transformation::identity());
        assert_eq!(t.group(), TransformationGroup::Euclidean);
    }

    #[test]
    fn zero_axis_is_rejected() {
        assert!(matches!(
            Transformation::rotation(Vector3::zeros(), 1.0),
            Err(CsgError::InvalidParameter(_))
        ));
    }

    #[test]
    fn orthogonal_affine_normalizes_to_euclidean() {
        let m = Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        let t = Transformation::affine(m, Vector3::zeros()).unwrap();
        assert!(t.as_euclidean().is_some());
        assert_eq!(t, Transformation::rotation(Vector3::z(), FRAC_PI_2).unwrap());
    }

    #[test]
    fn euclidean_after_affine_is_affine() {
        let s = Transformation::affine(Matrix3::from_diagonal(&Vector3::new(2.0, 1.0, 1.0)), Vector3::zeros())
            .unwrap();
        let r = Transformation::rotation(Vector3::x(), 0.3).unwrap();
        assert_eq!(r.compose(&s).group(), TransformationGroup::Affine);
        assert_eq!(r.compose(&r).group(), TransformationGroup::Rotation);
    }

    #[test]
    fn linear_part_agrees_with_rotation3() {
        let axis = Vector3::new(1.0, -2.0, 0.5);
        let t = Transformation::rotation(axis, 1.1).unwrap();
        let expected = nalgebra::Rotation3::from_axis_angle(&nalgebra::Unit::new_normalize(axis), 1.1);
        assert!((t.linear() - expected.matrix()).norm() < 1e-8);
        let p = Point3::new(0.3, 0.7, -1.2);
        assert!(close(&t.apply(&p), &(expected * p)));
        let twice = t.compose(&t);
        assert!(close(&twice.apply(&p), &t.apply(&t.apply(&p))));
    }

    #[test]
    fn quaternion_matrix_roundtrip_near_half_turn() {
        let q = canonical_quat(&Quaternion::new(1e-3, 0.0, 1.0, 0.0));
        let back = quat_from_matrix(&rotation_matrix(&q));
        assert!((back - q).norm() < 1e-8);
    }

    #[test]
    fn decomposition_rebuilds_matrix() {
        let m = Matrix4::new(
            2.0, 0.5, 0.0, 1.0,
            0.0, -1.0, 0.3, 2.0,
            0.1, 0.0, 3.0, -1.0,
            0.0, 0.0, 0.0, 1.0,
        );
        let d = aff2trpzs(&m).unwrap();
        let back = trpzs2aff(&d);
        for (a, b) in m.iter().zip(back.iter()) {
            assert!(approx_eq(*a, *b, 1e-8), "{m} vs {back}");
        }
        assert!(d.scale.iter().all(|s| *s > 0.0));
    }

    #[test]
    fn decomposition_of_singular_matrix_fails() {
        let mut m = Matrix4::identity();
        m[(2, 2)] = 0.0;
        assert!(aff2trpzs(&m).is_err());
    }
}
