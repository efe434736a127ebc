//! CSG simplification driven by voxel evidence.
//!
//! An operand of an intersection (union) is redundant when dropping it does
//! not change the bitmap of the whole inside the current range. Once no
//! operand can be dropped, each remaining operand is simplified recursively
//! against a range narrowed to the points where it still decides membership.

use hashbrown::HashMap;

use crate::errors::CsgError;
use crate::expr::{Expr, Formula, Symbol};
use crate::float_types::Real;
use crate::set::{AbstractSet, Set};
use crate::voxel::{Bitmap, VoxelEngine, VoxelGrid};

/// Tolerance of [`VolumeEngine::near_equal`].
pub const VOLUME_TOLERANCE: Real = 1e-6;

/// Simplify a set in negation normal form relative to the range `ran`.
///
/// The result has the same bitmap as `set` on every point of `ran`.
///
/// Negation normal form still allows a complement around a leaf with no
/// complementary primitive, such as a cuboid. Such a complement is kept as
/// a leaf; a complement of a composite fails with [`CsgError::NotNormalForm`].
pub fn marchingsetsimp(engine: &VoxelEngine, set: &Set, ran: &Bitmap) -> Result<Set, CsgError> {
    match set {
        Set::Empty | Set::Universal => return Ok(set.clone()),
        Set::Complement(inner) if !inner.is_leaf() => return Err(CsgError::NotNormalForm),
        _ => {}
    }
    let bits = &engine.bits(set) & ran;
    if bits.is_zero() {
        return Ok(Set::Empty);
    }
    if bits == *ran {
        return Ok(Set::Universal);
    }
    match set {
        Set::Intersection(args) => {
            let mut args = args.clone();
            drop_redundant(&mut args, &bits, |rest| {
                &rest.iter().fold(engine.ran(), |acc, a| &acc & &engine.bits(a)) & ran
            });
            for i in 0..args.len() {
                let others = args
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .fold(ran.clone(), |acc, (_, a)| &acc & &engine.bits(a));
                args[i] = marchingsetsimp(engine, &args[i], &others)?;
            }
            Ok(Set::intersection(args))
        }
        Set::Union(args) => {
            let mut args = args.clone();
            drop_redundant(&mut args, &bits, |rest| {
                &rest.iter().fold(Bitmap::zeros(ran.len()), |acc, a| &acc | &engine.bits(a)) & ran
            });
            for i in 0..args.len() {
                let others = args
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .fold(Bitmap::zeros(ran.len()), |acc, (_, a)| &acc | &engine.bits(a));
                args[i] = marchingsetsimp(engine, &args[i], &ran.and_not(&others))?;
            }
            Ok(Set::union(args))
        }
        _ => Ok(set.clone()),
    }
}

/// Remove every operand whose absence leaves `target` unchanged.
fn drop_redundant<T: std::fmt::Display, F>(args: &mut Vec<T>, target: &Bitmap, bits_of: F)
where
    F: Fn(&[&T]) -> Bitmap,
{
    let mut i = 0;
    while i < args.len() {
        let rest: Vec<&T> = args
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, a)| a)
            .collect();
        if bits_of(&rest) == *target {
            log::debug!("dropping redundant operand {}", args[i]);
            args.remove(i);
        } else {
            i += 1;
        }
    }
}

/// Convert to negation normal form and simplify over the whole grid.
pub fn simp(engine: &VoxelEngine, set: &Set) -> Result<Set, CsgError> {
    marchingsetsimp(engine, &set.nnf(), &engine.ran())
}

/// [`marchingsetsimp`] on formulas in negation normal form, with `And` and
/// `Or` in the roles of intersection and union.
pub fn marchingfuncsimp(
    engine: &VoxelEngine,
    vars: &[Symbol; 3],
    formula: &Formula,
    ran: &Bitmap,
) -> Result<Formula, CsgError> {
    if !formula.is_nnf() {
        return Err(CsgError::NotNormalForm);
    }
    match formula {
        Formula::True | Formula::False => return Ok(formula.clone()),
        _ => {}
    }
    let bits = &engine.bits_of_formula(vars, formula) & ran;
    if bits.is_zero() {
        return Ok(Formula::False);
    }
    if bits == *ran {
        return Ok(Formula::True);
    }
    let of = |f: &Formula| engine.bits_of_formula(vars, f);
    match formula {
        Formula::And(args) => {
            let mut args = args.clone();
            drop_redundant(&mut args, &bits, |rest| {
                &rest.iter().fold(engine.ran(), |acc, a| &acc & &of(*a)) & ran
            });
            for i in 0..args.len() {
                let others = args
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .fold(ran.clone(), |acc, (_, a)| &acc & &of(a));
                args[i] = marchingfuncsimp(engine, vars, &args[i], &others)?;
            }
            Ok(Formula::and(args))
        }
        Formula::Or(args) => {
            let mut args = args.clone();
            drop_redundant(&mut args, &bits, |rest| {
                &rest.iter().fold(Bitmap::zeros(ran.len()), |acc, a| &acc | &of(*a)) & ran
            });
            for i in 0..args.len() {
                let others = args
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .fold(Bitmap::zeros(ran.len()), |acc, (_, a)| &acc | &of(a));
                args[i] = marchingfuncsimp(engine, vars, &args[i], &ran.and_not(&others))?;
            }
            Ok(Formula::or(args))
        }
        _ => Ok(formula.clone()),
    }
}

/// Replace named parameters inside every abstract leaf.
pub fn substitute_set(set: &Set, map: &HashMap<Symbol, Expr>) -> Set {
    match set {
        Set::Abstract(a) => Set::abstract_set(a.vars.clone(), a.formula.substitute(map))
            .unwrap_or_else(|_| Set::Abstract(AbstractSet {
                vars: a.vars.clone(),
                formula: a.formula.substitute(map),
            })),
        Set::Intersection(args) => Set::intersection(args.iter().map(|a| substitute_set(a, map))),
        Set::Union(args) => Set::union(args.iter().map(|a| substitute_set(a, map))),
        Set::Complement(inner) => substitute_set(inner, map).complement(),
        Set::Image(t, inner) => Set::image(t, substitute_set(inner, map)),
        other => other.clone(),
    }
}

/// Voxel engine plus a substitution map for named parameters, comparing
/// sets by volume.
#[derive(Debug)]
pub struct VolumeEngine {
    engine: VoxelEngine,
    substitutions: HashMap<Symbol, Expr>,
}

impl VolumeEngine {
    pub fn new(grid: VoxelGrid) -> Self {
        Self::with_substitutions(grid, HashMap::new())
    }

    pub fn with_substitutions(grid: VoxelGrid, substitutions: HashMap<Symbol, Expr>) -> Self {
        VolumeEngine {
            engine: VoxelEngine::new(grid),
            substitutions,
        }
    }

    pub fn engine(&self) -> &VoxelEngine {
        &self.engine
    }

    fn prepare(&self, set: &Set) -> Set {
        if self.substitutions.is_empty() {
            set.nnf()
        } else {
            substitute_set(set, &self.substitutions).nnf()
        }
    }

    pub fn simplify(&self, set: &Set) -> Result<Set, CsgError> {
        marchingsetsimp(&self.engine, &self.prepare(set), &self.engine.ran())
    }

    pub fn volume(&self, set: &Set) -> Real {
        self.engine.volume(&self.prepare(set))
    }

    /// `|volume(a) - volume(b)| < 1e-6`
    pub fn near_equal(&self, a: &Set, b: &Set) -> bool {
        (self.volume(a) - self.volume(b)).abs() < VOLUME_TOLERANCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::Primitive;
    use nalgebra::{Point3, Vector3};

    fn ball(r: Real) -> Set {
        Set::Primitive(Primitive::sphere(r, Point3::origin()).unwrap())
    }

    fn half(d: Vector3<Real>, o: Real) -> Set {
        Set::Primitive(Primitive::halfspace(d, o).unwrap())
    }

    fn engine() -> VoxelEngine {
        VoxelEngine::new(VoxelGrid::cubic(2.0, 4))
    }

    #[test]
    fn only_complements_of_composites_are_rejected() {
        let e = engine();
        let union = Set::union([ball(1.0), half(Vector3::x(), 0.5)]);
        assert!(matches!(
            marchingsetsimp(&e, &Set::Complement(Box::new(union)), &e.ran()),
            Err(CsgError::NotNormalForm)
        ));
        let cube = Set::Primitive(Primitive::cuboid(Point3::origin(), Vector3::repeat(1.0)).unwrap());
        let outside = cube.complement();
        assert!(matches!(outside, Set::Complement(_)));
        let kept = marchingsetsimp(&e, &outside, &e.ran()).unwrap();
        assert!(e.equal(&kept, &outside));
    }

    #[test]
    fn redundant_operands_are_dropped() {
        let e = engine();
        // the big ball contains the small one
        let s = Set::intersection([ball(1.0), ball(1.5)]);
        assert_eq!(simp(&e, &s).unwrap(), ball(1.0));
        let u = Set::union([ball(1.0), ball(1.5)]);
        assert_eq!(simp(&e, &u).unwrap(), ball(1.5));
    }

    #[test]
    fn empty_and_full_results_collapse() {
        let e = engine();
        let s = Set::intersection([half(Vector3::x(), 1.0), half(-Vector3::x(), 1.0)]);
        assert_eq!(simp(&e, &s).unwrap(), Set::Empty);
        assert_eq!(simp(&e, &ball(10.0)).unwrap(), Set::Universal);
    }

    #[test]
    fn result_agrees_with_input() {
        let e = engine();
        let s = Set::union([
            Set::intersection([ball(1.0), half(Vector3::x(), 0.0), half(Vector3::y(), -5.0)]),
            Set::intersection([ball(0.5), half(Vector3::z(), 0.0)]),
        ]);
        let t = simp(&e, &s).unwrap();
        assert!(e.equal(&s, &t));
        assert!(t.leaf_count() < s.leaf_count());
        assert_eq!(simp(&e, &t).unwrap(), t);
    }

    #[test]
    fn composite_complement_is_rejected() {
        let e = engine();
        let s = Set::Complement(Box::new(Set::union([ball(1.0), half(Vector3::x(), 0.0)])));
        assert_eq!(marchingsetsimp(&e, &s, &e.ran()), Err(CsgError::NotNormalForm));
        assert!(simp(&e, &s).is_ok());
    }

    #[test]
    fn formulas_simplify_like_sets() {
        let e = engine();
        let vars = Symbol::xyz();
        let x = Expr::var(&vars[0]);
        let f = Formula::and([
            Formula::ge(x.clone(), Expr::constant(0.0)),
            Formula::ge(x.clone(), Expr::constant(-1.0)),
        ]);
        let g = marchingfuncsimp(&e, &vars, &f, &e.ran()).unwrap();
        assert_eq!(g, Formula::ge(x, Expr::constant(0.0)));
        assert_eq!(
            marchingfuncsimp(&e, &vars, &Formula::True.not().not(), &e.ran()).unwrap(),
            Formula::True
        );
    }

    #[test]
    fn substitutions_feed_volume() {
        let [x, y, z] = Symbol::xyz();
        let r = Symbol::new("r");
        let s = Set::abstract_set(
            [x.clone(), y.clone(), z.clone()],
            Formula::le(
                Expr::var(&x).square() + Expr::var(&y).square() + Expr::var(&z).square(),
                Expr::var(&r).square(),
            ),
        )
        .unwrap();
        let mut subs = HashMap::new();
        subs.insert(r, Expr::constant(1.0));
        let v = VolumeEngine::with_substitutions(VoxelGrid::cubic(1.5, 4), subs);
        assert!(v.near_equal(&s, &ball(1.0)));
        assert!(!v.near_equal(&s, &ball(1.4)));
    }
}
