//! Operations on puzzles.
//!
//! Discrete operations move each piece by one transformation; continuous
//! ones move it along a path and are checked for collisions at every sample
//! of the path.

use crate::errors::{IllegalOperationError, IllegalStateError, OperationError};
use crate::float_types::{EPSILON, Real};
use crate::path::Path;
use crate::puzzle::Puzzle;
use crate::set::Set;
use crate::transform::Transformation;
use crate::voxel::VoxelEngine;

/// Samples per unit length of a continuous operation.
pub const DEFAULT_DENSITY: Real = 10.0;

/// A map from puzzle states to puzzle states.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Identity,
    /// Applied left to right.
    Concatenated(Vec<Operation>),
    /// Componentwise on a tuple of puzzles.
    Tensor(Vec<Operation>),
    /// One transformation per piece.
    Combinational(Vec<Transformation>),
    /// Selector and action pairs; a piece moves by the action of the first
    /// selector containing it and stays put otherwise.
    Selective(Vec<(Set, Transformation)>),
    /// One path per piece, all of the same length.
    ContinuousCombinational(Vec<Path<Transformation>>),
    /// Selector and path pairs.
    ContinuousSelective(Vec<(Set, Path<Transformation>)>),
}

impl Operation {
    /// Normal form of a concatenation: identities drop out and nested
    /// concatenations flatten.
    ///
    /// Adjacent per-piece operations are kept apart, since an unordered
    /// puzzle re-sorts its pieces after every step.
    pub fn concat<I: IntoIterator<Item = Operation>>(ops: I) -> Operation {
        let mut flat: Vec<Operation> = Vec::new();
        for op in ops {
            flatten_into(&mut flat, op);
        }
        match flat.len() {
            0 => Operation::Identity,
            1 => flat.pop().unwrap_or(Operation::Identity),
            _ => Operation::Concatenated(flat),
        }
    }

    pub fn tensor<I: IntoIterator<Item = Operation>>(ops: I) -> Operation {
        let mut flat = Vec::new();
        for op in ops {
            match op {
                Operation::Tensor(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        Operation::Tensor(flat)
    }

    pub fn is_continuous(&self) -> bool {
        match self {
            Operation::ContinuousCombinational(_) | Operation::ContinuousSelective(_) => true,
            Operation::Concatenated(ops) | Operation::Tensor(ops) => ops.iter().any(Operation::is_continuous),
            _ => false,
        }
    }

    /// Apply with the default sampling density.
    pub fn apply(&self, puzzle: &Puzzle, engine: &VoxelEngine) -> Result<Puzzle, OperationError> {
        self.apply_with_density(puzzle, engine, DEFAULT_DENSITY)
    }

    pub fn apply_with_density(
        &self,
        puzzle: &Puzzle,
        engine: &VoxelEngine,
        density: Real,
    ) -> Result<Puzzle, OperationError> {
        match self {
            Operation::Identity => Ok(puzzle.clone()),
            Operation::Concatenated(ops) => ops
                .iter()
                .try_fold(puzzle.clone(), |p, op| op.apply_with_density(&p, engine, density)),
            Operation::Tensor(ops) => match ops.as_slice() {
                [only] => only.apply_with_density(puzzle, engine, density),
                _ => Err(IllegalOperationError::WrongArity {
                    expected: ops.len(),
                    found: 1,
                }
                .into()),
            },
            Operation::Combinational(actions) => {
                check_arity(actions.len(), puzzle)?;
                let pieces = puzzle
                    .pieces()
                    .iter()
                    .zip(actions)
                    .map(|(piece, t)| elem_transform(puzzle, piece, t))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(puzzle.with_pieces(pieces))
            }
            Operation::Selective(table) => {
                let actions = resolve(puzzle, engine, table, Transformation::identity)?;
                Operation::Combinational(actions).apply_with_density(puzzle, engine, density)
            }
            Operation::ContinuousCombinational(paths) => apply_continuous(puzzle, engine, paths, density),
            Operation::ContinuousSelective(table) => {
                let paths = resolve(puzzle, engine, table, || Path::identity(1))?;
                apply_continuous(puzzle, engine, &paths, density)
            }
        }
    }

    /// Apply to a tuple of puzzles; tensors act componentwise.
    pub fn apply_all(&self, puzzles: &[Puzzle], engine: &VoxelEngine) -> Result<Vec<Puzzle>, OperationError> {
        match self {
            Operation::Identity => Ok(puzzles.to_vec()),
            Operation::Tensor(ops) => {
                if ops.len() != puzzles.len() {
                    return Err(IllegalOperationError::WrongArity {
                        expected: ops.len(),
                        found: puzzles.len(),
                    }
                    .into());
                }
                ops.iter().zip(puzzles).map(|(op, p)| op.apply(p, engine)).collect()
            }
            Operation::Concatenated(ops) => ops
                .iter()
                .try_fold(puzzles.to_vec(), |ps, op| op.apply_all(&ps, engine)),
            single => match puzzles {
                [p] => Ok(vec![single.apply(p, engine)?]),
                _ => Err(IllegalOperationError::WrongArity {
                    expected: 1,
                    found: puzzles.len(),
                }
                .into()),
            },
        }
    }
}

fn flatten_into(flat: &mut Vec<Operation>, op: Operation) {
    match op {
        Operation::Identity => {}
        Operation::Concatenated(inner) => {
            for op in inner {
                flatten_into(flat, op);
            }
        }
        other => flat.push(other),
    }
}

fn check_arity(expected: usize, puzzle: &Puzzle) -> Result<(), IllegalOperationError> {
    if expected == puzzle.len() {
        Ok(())
    } else {
        Err(IllegalOperationError::WrongArity {
            expected,
            found: puzzle.len(),
        })
    }
}

/// Move one piece, refusing transformations outside the puzzle's action group.
fn elem_transform(puzzle: &Puzzle, piece: &Set, t: &Transformation) -> Result<Set, IllegalOperationError> {
    if !puzzle.actions.admits(t) {
        return Err(IllegalOperationError::NotApplicable(format!(
            "{t} is not in the action group {:?}",
            puzzle.actions
        )));
    }
    Ok(Set::image(t, piece.clone()))
}

/// Whether `piece` is selected by `selector`: a subset of it, judged on the grid.
fn elem_filter(engine: &VoxelEngine, piece: &Set, selector: &Set) -> bool {
    engine.is_subset(piece, selector)
}

/// Per-piece actions from a selector table. A piece takes the action of the
/// first selector containing it. A piece no selector contains gets `rest()`,
/// unless its interior meets the interior of some selector, which makes it
/// ambiguous.
fn resolve<A: Clone>(
    puzzle: &Puzzle,
    engine: &VoxelEngine,
    table: &[(Set, A)],
    rest: impl Fn() -> A,
) -> Result<Vec<A>, IllegalOperationError> {
    let mut matched_any = false;
    let mut actions = Vec::with_capacity(puzzle.len());
    for (index, piece) in puzzle.pieces().iter().enumerate() {
        if let Some((_, a)) = table.iter().find(|(selector, _)| elem_filter(engine, piece, selector)) {
            matched_any = true;
            actions.push(a.clone());
            continue;
        }
        let inside = piece.interior();
        if let Some(selector) = table
            .iter()
            .position(|(selector, _)| !engine.is_disjoint(&inside, &selector.interior()))
        {
            return Err(IllegalOperationError::AmbiguousSelection { piece: index, selector });
        }
        actions.push(rest());
    }
    if !matched_any {
        return Err(IllegalOperationError::UnresolvedSelection);
    }
    Ok(actions)
}

/// Sample the paths, checking collisions between rigidly co-moving groups,
/// then move every piece to the end of its path.
fn apply_continuous(
    puzzle: &Puzzle,
    engine: &VoxelEngine,
    paths: &[Path<Transformation>],
    density: Real,
) -> Result<Puzzle, OperationError> {
    check_arity(paths.len(), puzzle)?;
    if let Some(p) = paths.iter().find(|p| p.nres() != 1) {
        return Err(IllegalOperationError::NotApplicable(format!(
            "a piece path moves {} resources",
            p.nres()
        ))
        .into());
    }
    let length = paths
        .iter()
        .filter(|p| !p.is_identity())
        .map(Path::length)
        .fold(0.0, Real::max);
    if paths
        .iter()
        .any(|p| !p.is_identity() && (p.length() - length).abs() > EPSILON)
    {
        return Err(IllegalOperationError::NotApplicable("piece paths differ in length".into()).into());
    }

    // fuse pieces sharing a path so they cannot collide with each other
    let mut groups: Vec<(&Path<Transformation>, Vec<Set>)> = Vec::new();
    for (piece, path) in puzzle.pieces().iter().zip(paths) {
        match groups.iter_mut().find(|(p, _)| *p == path) {
            Some((_, members)) => members.push(piece.clone()),
            None => groups.push((path, vec![piece.clone()])),
        }
    }
    let fused: Vec<(&Path<Transformation>, Set)> = groups
        .into_iter()
        .map(|(path, members)| (path, Set::union(members)))
        .collect();

    let clock = Path::<Transformation>::identity(1);
    let times = match paths.iter().find(|p| !p.is_identity()) {
        Some(p) => p.sample_times(density),
        None => clock.sample_times(density),
    };
    for t in times {
        let moved: Vec<Set> = fused
            .iter()
            .map(|(path, set)| {
                let at = path.at(t);
                let placement = at.first().cloned().unwrap_or_else(Transformation::identity);
                Set::image(&placement, set.clone())
            })
            .collect();
        log::trace!("checking collisions at t = {t}");
        if !puzzle.with_pieces(moved).no_collision(engine) {
            return Err(IllegalOperationError::CollisionAlongPath { t }.into());
        }
    }

    let pieces = puzzle
        .pieces()
        .iter()
        .zip(paths)
        .map(|(piece, path)| {
            let end = path.end_value().first().cloned().unwrap_or_else(Transformation::identity);
            elem_transform(puzzle, piece, &end)
        })
        .collect::<Result<Vec<_>, _>>()?;
    let result = puzzle.with_pieces(pieces);
    if !result.is_valid_state(engine) {
        return Err(IllegalStateError::InvalidState("pieces overlap or left the state space".into()).into());
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructors::with_exterior;
    use crate::float_types::FRAC_PI_2;
    use crate::primitive::Primitive;
    use crate::set::halfspace;
    use crate::voxel::VoxelGrid;
    use nalgebra::{Point3, Vector3};

    fn engine() -> VoxelEngine {
        VoxelEngine::new(VoxelGrid::cubic(2.0, 4))
    }

    fn halves(e: &VoxelEngine) -> Puzzle {
        let ball = Set::Primitive(Primitive::sphere(1.0, Point3::origin()).unwrap());
        let knife = with_exterior(halfspace(Vector3::x(), 0.0).unwrap());
        Puzzle::new(vec![ball]).cross_common(&[knife.to_vec()], e)
    }

    #[test]
    fn identities_drop_out_of_concatenations() {
        let r = Transformation::rotation(Vector3::x(), 0.1).unwrap();
        let op = Operation::concat([
            Operation::Identity,
            Operation::Concatenated(vec![Operation::Identity, Operation::Combinational(vec![r.clone()])]),
        ]);
        assert_eq!(op, Operation::Combinational(vec![r.clone()]));
        let twice = Operation::concat([
            Operation::Combinational(vec![r.clone()]),
            Operation::Combinational(vec![r.clone()]),
        ]);
        assert_eq!(
            twice,
            Operation::Concatenated(vec![
                Operation::Combinational(vec![r.clone()]),
                Operation::Combinational(vec![r.clone()]),
            ])
        );
        assert_eq!(Operation::concat([]), Operation::Identity);
    }

    #[test]
    fn combinational_arity_is_checked() {
        let e = engine();
        let p = halves(&e);
        let op = Operation::Combinational(vec![Transformation::identity()]);
        assert!(matches!(
            op.apply(&p, &e),
            Err(OperationError::IllegalOperation(IllegalOperationError::WrongArity { expected: 1, found: 2 }))
        ));
    }

    #[test]
    fn selective_moves_only_selected_pieces() {
        let e = engine();
        let p = halves(&e);
        let slide = Transformation::translation(Vector3::new(1.0, 0.0, 0.0));
        let op = Operation::Selective(vec![(halfspace(Vector3::x(), 0.0).unwrap(), slide)]);
        let q = op.apply(&p, &e).unwrap();
        assert!(!e.equal(&p.pieces()[0], &q.pieces()[0]));
        assert!((e.volume(&p.pieces()[0]) - e.volume(&q.pieces()[0])).abs() < 1e-12);
        assert!(e.equal(&p.pieces()[1], &q.pieces()[1]));

        let turn = Transformation::rotation(Vector3::x(), FRAC_PI_2).unwrap();
        let mirrored = Operation::Selective(vec![(halfspace(Vector3::x(), 0.0).unwrap(), Transformation::inversion())]);
        assert!(matches!(
            mirrored.apply(&p, &e),
            Err(OperationError::IllegalOperation(IllegalOperationError::NotApplicable(_)))
        ));
        assert!(Operation::Selective(vec![(halfspace(Vector3::x(), 0.0).unwrap(), turn)]).apply(&p, &e).is_ok());
        let nothing = Operation::Selective(vec![(halfspace(Vector3::x(), 1.5).unwrap(), Transformation::identity())]);
        assert!(matches!(
            nothing.apply(&p, &e),
            Err(OperationError::IllegalOperation(IllegalOperationError::UnresolvedSelection))
        ));
        let straddling = Operation::Selective(vec![(halfspace(Vector3::y(), 0.0).unwrap(), Transformation::identity())]);
        assert!(matches!(
            straddling.apply(&p, &e),
            Err(OperationError::IllegalOperation(IllegalOperationError::AmbiguousSelection { .. }))
        ));
    }

    #[test]
    fn sliding_into_a_neighbour_collides() {
        let e = engine();
        let p = halves(&e);
        let push = Path::shift(Vector3::new(-0.5, 0.0, 0.0)).unwrap();
        let op = Operation::ContinuousSelective(vec![(halfspace(Vector3::x(), 0.0).unwrap(), push)]);
        match op.apply(&p, &e) {
            Err(OperationError::IllegalOperation(IllegalOperationError::CollisionAlongPath { t })) => {
                // the overlap first covers a sample once the slide passes a grid step
                assert!(t > 0.5 && t <= 1.0);
            }
            other => panic!("expected a collision, got {other:?}"),
        }
        let away = Path::shift(Vector3::new(0.5, 0.0, 0.0)).unwrap();
        let op = Operation::ContinuousSelective(vec![(halfspace(Vector3::x(), 0.0).unwrap(), away)]);
        let q = op.apply(&p, &e).unwrap();
        assert!(q.is_valid_state(&e));
    }

    #[test]
    fn tensor_acts_componentwise() {
        let e = engine();
        let p = halves(&e);
        let op = Operation::tensor([Operation::Identity, Operation::Combinational(vec![Transformation::identity(); 2])]);
        let out = op.apply_all(&[p.clone(), p.clone()], &e).unwrap();
        assert_eq!(out, vec![p.clone(), p.clone()]);
        assert!(op.apply_all(&[p.clone()], &e).is_err());
        assert!(op.apply(&p, &e).is_err());
    }
}
