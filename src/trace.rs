//! Boolean tracing: which source face did each face of a result come from.

use nalgebra::Point3;

use crate::backend::{Backend, Face};
use crate::float_types::Real;

/// Number of interior samples compared per face.
pub const TRACE_SAMPLES: usize = 4;

/// Distance within which a sample counts as lying on a candidate face.
pub const TRACE_TOLERANCE: Real = 1e-6;

/// Finest dyadic level tried before falling back to a polygon centroid.
const MAX_DEPTH: u32 = 6;

/// Link from a result face to face `face` of source shape `source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceLink {
    pub source: usize,
    pub face: usize,
}

/// Refinement levels `(n, m)` in sampling order: `(0, 0)`, then for each
/// `k ≥ 1` the pairs `(k, 0..k)`, then `(0..k, k)`, then `(k, k)`.
pub fn dyadic_levels(max_depth: u32) -> impl Iterator<Item = (u32, u32)> {
    std::iter::once((0, 0)).chain((1..=max_depth).flat_map(|k| {
        (0..k)
            .map(move |m| (k, m))
            .chain((0..k).map(move |n| (n, k)))
            .chain(std::iter::once((k, k)))
    }))
}

/// Points `((2i+1)/2^(n+1), (2j+1)/2^(m+1))` of the unit square at level `(n, m)`.
fn level_points(n: u32, m: u32) -> impl Iterator<Item = (Real, Real)> {
    let du = 1.0 / (1u64 << (n + 1)) as Real;
    let dv = 1.0 / (1u64 << (m + 1)) as Real;
    (0..1u64 << n).flat_map(move |i| {
        (0..1u64 << m).map(move |j| ((2 * i + 1) as Real * du, (2 * j + 1) as Real * dv))
    })
}

/// Dyadic samples of the unit square, every point distinct.
pub fn dyadic_samples(max_depth: u32) -> impl Iterator<Item = (Real, Real)> {
    dyadic_levels(max_depth).flat_map(|(n, m)| level_points(n, m))
}

/// Up to `count` interior points of `face`, at least one when the face has any area.
pub fn face_samples<F: Face>(face: &F, count: usize) -> Vec<Point3<Real>> {
    let [u0, u1, v0, v1] = face.parameter_range();
    let mut out: Vec<Point3<Real>> = dyadic_samples(MAX_DEPTH)
        .map(|(s, t)| (u0 + s * (u1 - u0), v0 + t * (v1 - v0)))
        .filter(|&(u, v)| face.contains_uv(u, v))
        .filter_map(|(u, v)| face.value_at(u, v))
        .take(count)
        .collect();
    if out.is_empty() {
        out.extend(face.inner_point());
    }
    out
}

/// Trace every face of `result` into the faces of `sources`.
///
/// Candidates are tried source by source, face by face; the first face
/// containing all samples wins. Faces nothing matches are `None`.
pub fn trace<B: Backend>(backend: &B, result: &B::Shape, sources: &[B::Shape]) -> Vec<Option<FaceLink>> {
    let candidates: Vec<(FaceLink, B::Face)> = sources
        .iter()
        .enumerate()
        .flat_map(|(source, shape)| {
            backend
                .faces(shape)
                .into_iter()
                .enumerate()
                .map(move |(face, f)| (FaceLink { source, face }, f))
        })
        .collect();

    backend
        .faces(result)
        .iter()
        .enumerate()
        .map(|(index, face)| {
            let samples = face_samples(face, TRACE_SAMPLES);
            let link = candidates
                .iter()
                .find(|(_, cand)| {
                    !samples.is_empty()
                        && samples.iter().all(|p| cand.contains_point(p, TRACE_TOLERANCE))
                })
                .map(|(link, _)| *link);
            if link.is_none() {
                log::debug!("face {index} of the result matches no source face");
            }
            link
        })
        .collect()
}

/// Trace of a compound: the traces of its parts, one after the other.
pub fn trace_compound<B: Backend>(backend: &B, parts: &[(B::Shape, Vec<B::Shape>)]) -> Vec<Option<FaceLink>> {
    parts
        .iter()
        .flat_map(|(result, sources)| trace(backend, result, sources))
        .collect()
}

/// Follow a trace to per-face attributes of the sources, e.g. colors.
pub fn map_through<T: Clone>(
    trace: &[Option<FaceLink>],
    source_attributes: &[Vec<T>],
    default: T,
) -> Vec<T> {
    trace
        .iter()
        .map(|link| {
            link.and_then(|l| source_attributes.get(l.source)?.get(l.face).cloned())
                .unwrap_or_else(|| default.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MeshBackend;
    use crate::mesh::MeshSolid;
    use nalgebra::Vector3;

    #[test]
    fn level_order() {
        let levels: Vec<_> = dyadic_levels(2).collect();
        assert_eq!(
            levels,
            vec![(0, 0), (1, 0), (0, 1), (1, 1), (2, 0), (2, 1), (0, 2), (1, 2), (2, 2)]
        );
    }

    #[test]
    fn samples_start_at_the_center_and_never_repeat() {
        let samples: Vec<_> = dyadic_samples(3).collect();
        assert_eq!(samples[0], (0.5, 0.5));
        assert_eq!(samples[1], (0.25, 0.5));
        assert_eq!(samples[2], (0.75, 0.5));
        for (i, a) in samples.iter().enumerate() {
            assert!(samples[i + 1..].iter().all(|b| b != a));
            assert!(a.0 > 0.0 && a.0 < 1.0 && a.1 > 0.0 && a.1 < 1.0);
        }
    }

    #[test]
    fn corner_cut_traces_back() {
        let backend = MeshBackend::default();
        let a = MeshSolid::cuboid(Point3::origin(), Vector3::repeat(1.0));
        let b = MeshSolid::cuboid(Point3::new(0.5, 0.5, 0.5), Vector3::repeat(1.0));
        let cut = a.difference(&b);
        let links = trace(&backend, &cut, &[a.clone(), b.clone()]);
        assert_eq!(links.len(), 9);
        assert!(links.iter().all(Option::is_some));
        assert_eq!(links.iter().flatten().filter(|l| l.source == 1).count(), 3);

        let colors = map_through(&links, &[vec!["red"; 6], vec!["blue"; 6]], "none");
        assert_eq!(colors.iter().filter(|c| **c == "blue").count(), 3);
    }

    #[test]
    fn unrelated_faces_are_none() {
        let backend = MeshBackend::default();
        let a = MeshSolid::cuboid(Point3::origin(), Vector3::repeat(1.0));
        let far = MeshSolid::cuboid(Point3::new(5.0, 0.0, 0.0), Vector3::repeat(1.0));
        let links = trace(&backend, &a, &[far]);
        assert_eq!(links.len(), 6);
        assert!(links.iter().all(Option::is_none));
    }
}
