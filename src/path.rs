//! Continuous paths `[0, L] → G` through a group `G`.
//!
//! Paths are values in normal form. The constructors apply the algebraic
//! laws eagerly: identities vanish from concatenations, nested
//! concatenations and tensors flatten, adjacent slices of the same path
//! merge back together and `slice(0, L)` is the path itself.
//!
//! A path with `nres` resources evaluates to one group element per resource;
//! tensor products put paths side by side, every other constructor keeps the
//! resource count of its operands.

use std::fmt;
use std::sync::Arc;

use nalgebra::{Point3, Vector3};

use crate::errors::CsgError;
use crate::float_types::{EPSILON, Real};
use crate::transform::Transformation;

/// A group in which paths take their values.
pub trait PathElement: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    fn unit() -> Self;

    /// `self` followed by `next`.
    fn then(&self, next: &Self) -> Self;

    fn inverse(&self) -> Self;
}

/// Real numbers under addition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Additive(pub Real);

/// Non-zero real numbers under multiplication.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Multiplicative(pub Real);

impl PathElement for Additive {
    fn unit() -> Self {
        Additive(0.0)
    }

    fn then(&self, next: &Self) -> Self {
        Additive(self.0 + next.0)
    }

    fn inverse(&self) -> Self {
        Additive(-self.0)
    }
}

impl PathElement for Multiplicative {
    fn unit() -> Self {
        Multiplicative(1.0)
    }

    fn then(&self, next: &Self) -> Self {
        Multiplicative(self.0 * next.0)
    }

    fn inverse(&self) -> Self {
        Multiplicative(1.0 / self.0)
    }
}

impl PathElement for Transformation {
    fn unit() -> Self {
        Transformation::identity()
    }

    /// Apply `self` first, then `next`.
    fn then(&self, next: &Self) -> Self {
        next.compose(self)
    }

    fn inverse(&self) -> Self {
        Transformation::inverse(self)
    }
}

pub type LambdaFn<G> = Arc<dyn Fn(Real) -> G + Send + Sync>;

#[derive(Clone)]
pub enum Path<G: PathElement> {
    /// The unit for concatenation, of length zero.
    Identity { nres: usize },
    /// `base` restricted to `[start, end]` and re-based to start at the unit.
    /// `base` is never itself a slice.
    Sliced {
        base: Box<Path<G>>,
        start: Real,
        end: Real,
    },
    Concatenated(Vec<Path<G>>),
    Tensor(Vec<Path<G>>),
    /// An explicit one-parameter family, evaluated relative to its value at 0.
    Lambda { length: Real, func: LambdaFn<G> },
}

fn close(a: Real, b: Real) -> bool {
    (a - b).abs() <= EPSILON * (1.0 + a.abs().max(b.abs()))
}

impl<G: PathElement> Path<G> {
    pub fn identity(nres: usize) -> Self {
        Path::Identity { nres }
    }

    pub fn lambda<F>(length: Real, func: F) -> Result<Self, CsgError>
    where
        F: Fn(Real) -> G + Send + Sync + 'static,
    {
        if !length.is_finite() || length < 0.0 {
            return Err(CsgError::InvalidParameter(format!(
                "path length must be a non-negative number, got {length}"
            )));
        }
        if length == 0.0 {
            return Ok(Path::Identity { nres: 1 });
        }
        Ok(Path::Lambda {
            length,
            func: Arc::new(func),
        })
    }

    pub fn length(&self) -> Real {
        match self {
            Path::Identity { .. } => 0.0,
            Path::Sliced { start, end, .. } => end - start,
            Path::Concatenated(parts) => parts.iter().map(Path::length).sum(),
            Path::Tensor(parts) => parts.first().map_or(0.0, Path::length),
            Path::Lambda { length, .. } => *length,
        }
    }

    /// Number of resources moved by the path.
    pub fn nres(&self) -> usize {
        match self {
            Path::Identity { nres } => *nres,
            Path::Sliced { base, .. } => base.nres(),
            Path::Concatenated(parts) => parts.first().map_or(0, Path::nres),
            Path::Tensor(parts) => parts.iter().map(Path::nres).sum(),
            Path::Lambda { .. } => 1,
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Path::Identity { .. })
    }

    /// `self` restricted to `[start, end]`.
    pub fn slice(&self, start: Real, end: Real) -> Result<Self, CsgError> {
        let length = self.length();
        let in_range = |v: Real| v >= -EPSILON && v <= length + EPSILON;
        if !(in_range(start) && in_range(end) && start <= end + EPSILON) {
            return Err(CsgError::IndexOutOfRange { start, end, length });
        }
        let start = start.clamp(0.0, length);
        let end = end.clamp(start, length);

        if close(start, end) {
            return Ok(Path::Identity { nres: self.nres() });
        }
        if close(start, 0.0) && close(end, length) {
            return Ok(self.clone());
        }
        match self {
            Path::Identity { .. } => Ok(self.clone()),
            Path::Sliced { base, start: s, .. } => base.slice(s + start, s + end),
            Path::Concatenated(parts) => {
                let mut pieces = Vec::new();
                let mut offset = 0.0;
                for part in parts {
                    let len = part.length();
                    let lo = (start - offset).max(0.0);
                    let hi = (end - offset).min(len);
                    if hi > lo && !close(lo, hi) {
                        pieces.push(part.slice(lo, hi)?);
                    }
                    offset += len;
                }
                Path::concat(pieces)
            }
            Path::Tensor(parts) => Path::tensor(
                parts
                    .iter()
                    .map(|p| p.slice(start, end))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Path::Lambda { .. } => Ok(Path::Sliced {
                base: Box::new(self.clone()),
                start,
                end,
            }),
        }
    }

    /// Concatenate in order. All operands must move the same resources.
    pub fn concat<I: IntoIterator<Item = Path<G>>>(paths: I) -> Result<Self, CsgError> {
        let mut flat: Vec<Path<G>> = Vec::new();
        let mut nres = None;
        for p in paths {
            let n = p.nres();
            match nres {
                None => nres = Some(n),
                Some(m) if m != n => {
                    return Err(CsgError::TypeMismatch(format!(
                        "cannot concatenate paths over {m} and {n} resources"
                    )));
                }
                _ => {}
            }
            match p {
                Path::Identity { .. } => {}
                Path::Concatenated(inner) => {
                    for q in inner {
                        push_merged(&mut flat, q)?;
                    }
                }
                other => push_merged(&mut flat, other)?,
            }
        }
        let nres = nres.ok_or_else(|| CsgError::InvalidParameter("empty concatenation".into()))?;
        Ok(match flat.len() {
            0 => Path::Identity { nres },
            1 => flat.pop().unwrap_or(Path::Identity { nres }),
            _ => Path::Concatenated(flat),
        })
    }

    /// Side-by-side product of paths of equal length.
    pub fn tensor<I: IntoIterator<Item = Path<G>>>(paths: I) -> Result<Self, CsgError> {
        let mut flat = Vec::new();
        for p in paths {
            match p {
                Path::Tensor(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        let Some(first) = flat.first() else {
            return Err(CsgError::InvalidParameter("empty tensor product".into()));
        };
        let length = first.length();
        if let Some(bad) = flat.iter().find(|p| !close(p.length(), length)) {
            return Err(CsgError::InvalidParameter(format!(
                "tensor components must share a length, got {length} and {}",
                bad.length()
            )));
        }
        if flat.iter().all(Path::is_identity) {
            return Ok(Path::Identity {
                nres: flat.iter().map(Path::nres).sum(),
            });
        }
        Ok(if flat.len() == 1 {
            flat.remove(0)
        } else {
            Path::Tensor(flat)
        })
    }

    /// Values at `t`, one per resource; `t` is clamped to `[0, L]`.
    pub fn at(&self, t: Real) -> Vec<G> {
        let t = t.clamp(0.0, self.length());
        match self {
            Path::Identity { nres } => vec![G::unit(); *nres],
            Path::Lambda { func, .. } => vec![func(0.0).inverse().then(&func(t))],
            Path::Sliced { base, start, .. } => {
                let from = base.at(*start);
                let to = base.at(start + t);
                from.iter().zip(&to).map(|(a, b)| a.inverse().then(b)).collect()
            }
            Path::Concatenated(parts) => {
                let mut acc = vec![G::unit(); self.nres()];
                let mut offset = 0.0;
                for (i, part) in parts.iter().enumerate() {
                    let len = part.length();
                    if t <= offset + len || i + 1 == parts.len() {
                        let local = part.at(t - offset);
                        return acc.iter().zip(&local).map(|(a, b)| a.then(b)).collect();
                    }
                    let end = part.at(len);
                    acc = acc.iter().zip(&end).map(|(a, b)| a.then(b)).collect();
                    offset += len;
                }
                acc
            }
            Path::Tensor(parts) => parts.iter().flat_map(|p| p.at(t)).collect(),
        }
    }

    /// Value at the end of the path.
    pub fn end_value(&self) -> Vec<G> {
        self.at(self.length())
    }

    /// `{0, 1/d, 2/d, …}` up to the length, with the length itself always included.
    pub fn sample_times(&self, density: Real) -> Vec<Real> {
        let length = self.length();
        let count = (length * density).floor() as usize;
        let mut out: Vec<Real> = (0..=count).map(|i| i as Real / density).collect();
        if out.last().is_some_and(|&last| !close(last, length)) {
            out.push(length);
        }
        out
    }
}

/// Push `next` onto a flattened concatenation, merging it with the last part
/// when both are slices of one path that meet end to start.
fn push_merged<G: PathElement>(flat: &mut Vec<Path<G>>, next: Path<G>) -> Result<(), CsgError> {
    if let (
        Some(Path::Sliced { base: b1, start: s1, end: e1 }),
        Path::Sliced { base: b2, start: s2, end: e2 },
    ) = (flat.last(), &next)
    {
        if b1 == b2 && close(*e1, *s2) {
            let merged = b1.slice(*s1, *e2)?;
            flat.pop();
            return push_merged(flat, merged);
        }
    }
    if let (Some(Path::Tensor(left)), Path::Tensor(right)) = (flat.last(), &next) {
        if left.len() == right.len() && left.iter().zip(right).all(|(a, b)| a.nres() == b.nres()) {
            let merged = Path::tensor(
                left.iter()
                    .zip(right)
                    .map(|(a, b)| Path::concat([a.clone(), b.clone()]))
                    .collect::<Result<Vec<_>, _>>()?,
            )?;
            flat.pop();
            flat.push(merged);
            return Ok(());
        }
    }
    flat.push(next);
    Ok(())
}

impl<G: PathElement> PartialEq for Path<G> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Path::Identity { nres: a }, Path::Identity { nres: b }) => a == b,
            (
                Path::Sliced { base: b1, start: s1, end: e1 },
                Path::Sliced { base: b2, start: s2, end: e2 },
            ) => b1 == b2 && close(*s1, *s2) && close(*e1, *e2),
            (Path::Concatenated(a), Path::Concatenated(b)) | (Path::Tensor(a), Path::Tensor(b)) => a == b,
            (Path::Lambda { length: l1, func: f1 }, Path::Lambda { length: l2, func: f2 }) => {
                Arc::ptr_eq(f1, f2) && l1 == l2
            }
            _ => false,
        }
    }
}

impl<G: PathElement> fmt::Debug for Path<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Path::Identity { nres } => write!(f, "Identity(nres={nres})"),
            Path::Sliced { base, start, end } => write!(f, "{base:?}[{start}:{end}]"),
            Path::Concatenated(parts) => f.debug_tuple("Concatenated").field(parts).finish(),
            Path::Tensor(parts) => f.debug_tuple("Tensor").field(parts).finish(),
            Path::Lambda { length, func } => {
                write!(f, "Lambda(length={length}, at={:?})", func(*length))
            }
        }
    }
}

// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// Paths of rigid motions
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

impl Path<Transformation> {
    /// Unit-length rotation by `angle` about the line through `center` along `axis`.
    pub fn rotate(angle: Real, axis: Vector3<Real>, center: Point3<Real>) -> Result<Self, CsgError> {
        // validate once so the closure cannot fail
        Transformation::rotation(axis, angle)?;
        Path::lambda(1.0, move |t| {
            Transformation::rotation_about(axis, angle * t, center)
                .unwrap_or_else(|_| Transformation::identity())
        })
    }

    /// Unit-length straight translation by `shift`.
    pub fn shift(shift: Vector3<Real>) -> Result<Self, CsgError> {
        Path::lambda(1.0, move |t| Transformation::translation(shift * t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::float_types::{FRAC_PI_2, approx_eq};

    fn ramp(length: Real) -> Path<Additive> {
        Path::lambda(length, |t| Additive(2.0 * t)).unwrap()
    }

    #[test]
    fn slices_recombine() {
        let p = ramp(10.0);
        let q = Path::concat([
            p.slice(0.0, 3.0).unwrap(),
            p.slice(3.0, 7.0).unwrap(),
            p.slice(7.0, 10.0).unwrap(),
        ])
        .unwrap();
        assert_eq!(q, p);
    }

    #[test]
    fn slice_laws() {
        let p = ramp(4.0);
        assert_eq!(p.slice(0.0, 4.0).unwrap(), p);
        assert!(p.slice(1.0, 1.0).unwrap().is_identity());
        let s = p.slice(1.0, 3.5).unwrap();
        assert!(approx_eq(s.length(), 2.5, 1e-12));
        assert_eq!(s.slice(0.5, 1.0).unwrap(), p.slice(1.5, 2.0).unwrap());
        assert!(approx_eq(s.at(1.0)[0].0, 2.0, 1e-12));
        assert!(matches!(p.slice(-1.0, 2.0), Err(CsgError::IndexOutOfRange { .. })));
        assert!(matches!(p.slice(3.0, 2.0), Err(CsgError::IndexOutOfRange { .. })));
    }

    #[test]
    fn identity_is_the_unit() {
        let p = ramp(2.0);
        assert_eq!(Path::concat([p.clone(), Path::identity(1)]).unwrap(), p);
        assert_eq!(Path::concat([Path::identity(1), p.clone()]).unwrap(), p);
    }

    #[test]
    fn concatenation_composes_at_boundary() {
        let p = Path::lambda(1.0, |t| Multiplicative(1.0 + t)).unwrap();
        let pp = Path::concat([p.clone(), p]).unwrap();
        assert!(approx_eq(pp.length(), 2.0, 1e-12));
        assert!(approx_eq(pp.at(2.0)[0].0, 4.0, 1e-12));
        assert!(approx_eq(pp.at(1.5)[0].0, 3.0, 1e-12));
    }

    #[test]
    fn tensor_requires_equal_lengths() {
        assert!(Path::tensor([ramp(1.0), ramp(2.0)]).is_err());
        let t = Path::tensor([ramp(1.0), Path::tensor([ramp(1.0), ramp(1.0)]).unwrap()]).unwrap();
        assert_eq!(t.nres(), 3);
        assert_eq!(t.at(1.0).len(), 3);
    }

    #[test]
    fn adjacent_tensors_concatenate_componentwise() {
        let a = ramp(1.0);
        let b = ramp(1.0);
        let t1 = Path::tensor([a.slice(0.0, 0.5).unwrap(), b.slice(0.0, 0.5).unwrap()]).unwrap();
        let t2 = Path::tensor([a.slice(0.5, 1.0).unwrap(), b.slice(0.5, 1.0).unwrap()]).unwrap();
        let joined = Path::concat([t1, t2]).unwrap();
        assert_eq!(joined, Path::tensor([a, b]).unwrap());
    }

    #[test]
    fn rotation_path_starts_at_identity() {
        let p = Path::rotate(FRAC_PI_2, Vector3::x(), Point3::origin()).unwrap();
        assert!(p.at(0.0)[0].is_identity());
        let end = &p.end_value()[0];
        let y = end.apply(&Point3::new(0.0, 1.0, 0.0));
        assert!(approx_eq(y.z, 1.0, 1e-9));
        let half = p.slice(0.5, 1.0).unwrap();
        let q = half.end_value()[0].apply(&Point3::new(0.0, 1.0, 0.0));
        assert!(approx_eq(q.y, (FRAC_PI_2 / 2.0).cos(), 1e-9));
    }

    #[test]
    fn sampling_includes_the_end() {
        let p = ramp(1.0);
        let ts = p.sample_times(10.0);
        assert_eq!(ts.len(), 11);
        assert!(approx_eq(*ts.last().unwrap(), 1.0, 1e-12));
        let ts = ramp(0.25).sample_times(10.0);
        assert_eq!(ts.len(), 4);
    }
}
