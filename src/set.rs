//! CSG expressions over primitive and abstract sets.
//!
//! [`Set`] values are built through smart constructors which keep them in a
//! canonical form: commutative operands are flattened, sorted by structural
//! hash and deduplicated, `Empty`/`Universal` are folded away, complements
//! never nest and images are pushed down to the leaves. Two sets that compare
//! equal therefore denote the same subset of ℝ³, and the structural hash can
//! be used as a cache key.

use std::collections::BTreeSet;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};

use crate::errors::CsgError;
use crate::expr::{Expr, Formula, Symbol, Vec3Expr, vconst, vxyz};
use crate::float_types::Real;
use crate::primitive::Primitive;
use crate::transform::Transformation;

/// `{ (x, y, z) | formula }` over three bound variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AbstractSet {
    pub vars: [Symbol; 3],
    pub formula: Formula,
}

impl AbstractSet {
    pub fn new(vars: [Symbol; 3], formula: Formula) -> Result<Self, CsgError> {
        if vars[0] == vars[1] || vars[1] == vars[2] || vars[0] == vars[2] {
            return Err(CsgError::TypeMismatch(format!(
                "set-builder variables must be distinct, got ({}, {}, {})",
                vars[0], vars[1], vars[2]
            )));
        }
        Ok(AbstractSet { vars, formula })
    }

    /// Symbols of the predicate other than the bound variables.
    pub fn free_parameters(&self) -> BTreeSet<Symbol> {
        let mut out = self.formula.free_symbols();
        for v in &self.vars {
            out.remove(v);
        }
        out
    }

    /// The predicate with the bound variables replaced by `p`.
    pub fn formula_at(&self, p: &Vec3Expr) -> Formula {
        let map: HashMap<Symbol, Expr> = self.vars.iter().cloned().zip(p.iter().cloned()).collect();
        self.formula.substitute(&map)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Set {
    Empty,
    Universal,
    Primitive(Primitive),
    Abstract(AbstractSet),
    Intersection(Vec<Set>),
    Union(Vec<Set>),
    /// Absolute complement of a set which has no complementary primitive.
    Complement(Box<Set>),
    Image(Transformation, Box<Set>),
}

impl From<Primitive> for Set {
    fn from(p: Primitive) -> Self {
        Set::Primitive(p)
    }
}

/// Deterministic structural hash, used for canonical operand order and cache keys.
pub fn structural_hash<T: Hash>(value: &T) -> u64 {
    let mut h = DefaultHasher::new();
    value.hash(&mut h);
    h.finish()
}

impl Set {
    /// Set-builder notation; constant predicates fold to `Empty`/`Universal`.
    pub fn abstract_set(vars: [Symbol; 3], formula: Formula) -> Result<Set, CsgError> {
        Ok(match formula {
            Formula::True => Set::Universal,
            Formula::False => Set::Empty,
            formula => Set::Abstract(AbstractSet::new(vars, formula)?),
        })
    }

    pub fn intersection<I: IntoIterator<Item = Set>>(args: I) -> Set {
        let mut out = Vec::new();
        for arg in args {
            match arg {
                Set::Universal => {}
                Set::Empty => return Set::Empty,
                Set::Intersection(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        match canonical_operands(out) {
            Operands::Complementary => Set::Empty,
            Operands::List(mut out) => match out.len() {
                0 => Set::Universal,
                1 => out.pop().unwrap_or(Set::Universal),
                _ => Set::Intersection(out),
            },
        }
    }

    pub fn union<I: IntoIterator<Item = Set>>(args: I) -> Set {
        let mut out = Vec::new();
        for arg in args {
            match arg {
                Set::Empty => {}
                Set::Universal => return Set::Universal,
                Set::Union(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        match canonical_operands(out) {
            Operands::Complementary => Set::Universal,
            Operands::List(mut out) => match out.len() {
                0 => Set::Empty,
                1 => out.pop().unwrap_or(Set::Empty),
                _ => Set::Union(out),
            },
        }
    }

    /// Absolute complement. Primitives with a complementary kind are swapped
    /// for it, double complements cancel.
    pub fn complement(self) -> Set {
        match self {
            Set::Empty => Set::Universal,
            Set::Universal => Set::Empty,
            Set::Complement(inner) => *inner,
            Set::Primitive(p) => match p.complement() {
                Some(c) => Set::Primitive(c),
                None => Set::Complement(Box::new(Set::Primitive(p))),
            },
            other => Set::Complement(Box::new(other)),
        }
    }

    /// `self ∩ ¬other`
    pub fn difference(self, other: Set) -> Set {
        Set::intersection([self, other.complement()])
    }

    /// Closure of the complement, the regular-closed exterior of a piece.
    pub fn exterior(&self) -> Set {
        self.clone().complement().closure()
    }

    /// `T(S)`: the set whose membership at `x` is `S.contains(T⁻¹ x)`.
    pub fn image(t: &Transformation, s: Set) -> Set {
        if t.is_identity() {
            return s;
        }
        match s {
            Set::Empty | Set::Universal => s,
            Set::Intersection(args) => Set::intersection(args.into_iter().map(|a| Set::image(t, a))),
            Set::Union(args) => Set::union(args.into_iter().map(|a| Set::image(t, a))),
            Set::Complement(inner) => Set::image(t, *inner).complement(),
            Set::Image(u, inner) => Set::image(&t.compose(&u), *inner),
            Set::Primitive(p) => match p.image(t) {
                Some(q) => Set::Primitive(q),
                None => Set::Image(t.clone(), Box::new(Set::Primitive(p))),
            },
            Set::Abstract(_) => Set::Image(t.clone(), Box::new(s)),
        }
    }

    /// Membership formula at the symbolic point `p`.
    pub fn contains_formula(&self, p: &Vec3Expr) -> Formula {
        match self {
            Set::Empty => Formula::False,
            Set::Universal => Formula::True,
            Set::Primitive(prim) => prim.contains_formula(p),
            Set::Abstract(a) => a.formula_at(p),
            Set::Intersection(args) => Formula::and(args.iter().map(|a| a.contains_formula(p))),
            Set::Union(args) => Formula::or(args.iter().map(|a| a.contains_formula(p))),
            Set::Complement(inner) => inner.contains_formula(p).not(),
            Set::Image(t, inner) => inner.contains_formula(&t.inverse().apply_exprs(p)),
        }
    }

    /// Numeric membership. Free parameters of abstract sets are unbound
    /// here, so comparisons involving them are false.
    pub fn contains(&self, p: &Point3<Real>) -> bool {
        self.contains_formula(&vconst(&p.coords)).eval(&|_| None)
    }

    /// Membership of an arbitrary tuple; anything but a 3-tuple is outside.
    pub fn contains_tuple(&self, coords: &[Real]) -> bool {
        match coords {
            [x, y, z] => self.contains(&Point3::new(*x, *y, *z)),
            _ => false,
        }
    }

    /// Lower to `{ (x, y, z) | φ }`.
    pub fn as_predicate(&self) -> AbstractSet {
        let vars = Symbol::xyz();
        let formula = self.contains_formula(&vxyz(&vars));
        AbstractSet { vars, formula }
    }

    pub fn interior(&self) -> Set {
        match self {
            Set::Empty | Set::Universal => self.clone(),
            Set::Primitive(p) => Set::Primitive(p.interior()),
            Set::Abstract(a) => Set::Abstract(AbstractSet {
                vars: a.vars.clone(),
                formula: a.formula.interior(),
            }),
            Set::Intersection(args) => Set::intersection(args.iter().map(Set::interior)),
            Set::Union(args) => Set::union(args.iter().map(Set::interior)),
            Set::Complement(inner) => inner.closure().complement(),
            Set::Image(t, inner) => Set::image(t, inner.interior()),
        }
    }

    pub fn closure(&self) -> Set {
        match self {
            Set::Empty | Set::Universal => self.clone(),
            Set::Primitive(p) => Set::Primitive(p.closure()),
            Set::Abstract(a) => Set::Abstract(AbstractSet {
                vars: a.vars.clone(),
                formula: a.formula.closure(),
            }),
            Set::Intersection(args) => Set::intersection(args.iter().map(Set::closure)),
            Set::Union(args) => Set::union(args.iter().map(Set::closure)),
            Set::Complement(inner) => inner.interior().complement(),
            Set::Image(t, inner) => Set::image(t, inner.closure()),
        }
    }

    /// Structural regular-closedness: the closure of the interior is the closure.
    pub fn is_regular_closed(&self) -> bool {
        let closed = self.closure();
        self.interior().closure() == closed && *self == closed
    }

    /// Negation normal form: complements only wrap leaves.
    pub fn nnf(&self) -> Set {
        match self {
            Set::Intersection(args) => Set::intersection(args.iter().map(Set::nnf)),
            Set::Union(args) => Set::union(args.iter().map(Set::nnf)),
            Set::Image(t, inner) => Set::image(t, inner.nnf()),
            Set::Complement(inner) => match inner.as_ref() {
                Set::Intersection(args) => {
                    Set::union(args.iter().map(|a| a.clone().complement().nnf()))
                }
                Set::Union(args) => {
                    Set::intersection(args.iter().map(|a| a.clone().complement().nnf()))
                }
                Set::Image(t, s) => Set::image(t, s.clone().complement().nnf()),
                Set::Abstract(a) => Set::Abstract(AbstractSet {
                    vars: a.vars.clone(),
                    formula: a.formula.clone().not().nnf(),
                }),
                _ => self.clone(),
            },
            _ => self.clone(),
        }
    }

    /// True if no complement wraps a composite set.
    pub fn is_nnf(&self) -> bool {
        match self {
            Set::Intersection(args) | Set::Union(args) => args.iter().all(Set::is_nnf),
            Set::Image(_, inner) => inner.is_nnf(),
            Set::Complement(inner) => inner.is_leaf(),
            _ => true,
        }
    }

    /// Primitives, abstract sets and images of them.
    pub fn is_leaf(&self) -> bool {
        match self {
            Set::Primitive(_) | Set::Abstract(_) => true,
            Set::Image(_, inner) | Set::Complement(inner) => inner.is_leaf(),
            _ => false,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Set::Intersection(_) | Set::Union(_))
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            Set::Empty | Set::Universal => 0,
            Set::Intersection(args) | Set::Union(args) => args.iter().map(Set::leaf_count).sum(),
            Set::Complement(inner) | Set::Image(_, inner) => inner.leaf_count(),
            Set::Primitive(_) | Set::Abstract(_) => 1,
        }
    }

    /// The distinct leaves of the tree, in first-visit order.
    pub fn leaves(&self) -> Vec<Set> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves(&self, out: &mut Vec<Set>) {
        match self {
            Set::Intersection(args) | Set::Union(args) => {
                args.iter().for_each(|a| a.collect_leaves(out));
            }
            Set::Empty | Set::Universal => {}
            leaf => {
                if !out.contains(leaf) {
                    out.push(leaf.clone());
                }
            }
        }
    }

    /// Free parameters of every abstract leaf.
    pub fn free_parameters(&self) -> BTreeSet<Symbol> {
        let mut out = BTreeSet::new();
        for leaf in self.leaves() {
            let mut current = &leaf;
            while let Set::Image(_, inner) | Set::Complement(inner) = current {
                current = inner.as_ref();
            }
            if let Set::Abstract(a) = current {
                out.extend(a.free_parameters());
            }
        }
        out
    }

    /// `Some(true)` when `T(S)` canonicalizes to `S`, `None` when unknown.
    pub fn is_invariant_to(&self, t: &Transformation) -> Option<bool> {
        if Set::image(t, self.clone()) == *self { Some(true) } else { None }
    }

    /// Axis-aligned bounds when some bounded primitive confines the set.
    pub fn bounds(&self) -> Option<(Point3<Real>, Point3<Real>)> {
        match self {
            Set::Empty => Some((Point3::origin(), Point3::origin())),
            Set::Primitive(p) => p.bounds(),
            Set::Intersection(args) => args
                .iter()
                .filter_map(Set::bounds)
                .reduce(|(a0, a1), (b0, b1)| (a0.sup(&b0), a1.inf(&b1))),
            Set::Union(args) => args
                .iter()
                .map(Set::bounds)
                .collect::<Option<Vec<_>>>()?
                .into_iter()
                .reduce(|(a0, a1), (b0, b1)| (a0.inf(&b0), a1.sup(&b1))),
            Set::Image(t, inner) => {
                let (lo, hi) = inner.bounds()?;
                let mut corners = (0..8).map(|i| {
                    let pick = |bit: usize, a: Real, b: Real| if i & bit == 0 { a } else { b };
                    t.apply(&Point3::new(pick(1, lo.x, hi.x), pick(2, lo.y, hi.y), pick(4, lo.z, hi.z)))
                });
                let first = corners.next()?;
                Some(corners.fold((first, first), |(a, b), c| (a.inf(&c), b.sup(&c))))
            }
            _ => None,
        }
    }
}

enum Operands {
    List(Vec<Set>),
    /// Some operand appears together with its complement.
    Complementary,
}

fn canonical_operands(mut args: Vec<Set>) -> Operands {
    args.sort_by_cached_key(structural_hash::<Set>);
    args.dedup();
    for (i, a) in args.iter().enumerate() {
        let c = a.clone().complement();
        if args[i + 1..].contains(&c) || args[..i].contains(&c) {
            return Operands::Complementary;
        }
    }
    Operands::List(args)
}

impl fmt::Display for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |f: &mut fmt::Formatter<'_>, name: &str, args: &[Set]| -> fmt::Result {
            write!(f, "{name}(")?;
            for (i, a) in args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{a}")?;
            }
            write!(f, ")")
        };
        match self {
            Set::Empty => write!(f, "EmptySet"),
            Set::Universal => write!(f, "UniversalSet"),
            Set::Primitive(p) => write!(f, "{p}"),
            Set::Abstract(a) => write!(f, "{{({}, {}, {}) | {}}}", a.vars[0], a.vars[1], a.vars[2], a.formula),
            Set::Intersection(args) => join(f, "Intersection", args),
            Set::Union(args) => join(f, "Union", args),
            Set::Complement(inner) => write!(f, "AbsoluteComplement({inner})"),
            Set::Image(t, inner) => write!(f, "Image({t}, {inner})"),
        }
    }
}

/// Half-space `{p : p·direction ≥ offset}` as a set.
pub fn halfspace(direction: Vector3<Real>, offset: Real) -> Result<Set, CsgError> {
    Ok(Set::Primitive(Primitive::halfspace(direction, offset)?))
}
