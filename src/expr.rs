//! Small expression IR for set-membership predicates.
//!
//! An [`Expr`] is a real-valued arithmetic tree over named [`Symbol`]s, and a
//! [`Formula`] is a quantifier-free boolean combination of comparisons between
//! expressions. Formulas are what every set lowers to (see
//! [`Set::as_predicate`](crate::set::Set::as_predicate)) and what the voxel
//! engine compiles into closures once per set.
//!
//! Constructors do light constant folding in the spirit of an arena context:
//! `x + 0`, `x * 1`, `x * 0`, double negation and constant comparisons are
//! reduced as the tree is built, which keeps lowered predicates small.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;

use hashbrown::HashMap;
use ordered_float::OrderedFloat;

use crate::float_types::Real;

/// A named free variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(Arc<str>);

impl Symbol {
    pub fn new(name: &str) -> Self {
        Symbol(Arc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// The three coordinate symbols `x`, `y`, `z` used by every lowered set.
    pub fn xyz() -> [Symbol; 3] {
        [Symbol::new("x"), Symbol::new("y"), Symbol::new("z")]
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Real-valued expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Expr {
    Const(OrderedFloat<Real>),
    Var(Symbol),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Sqrt(Box<Expr>),
    Abs(Box<Expr>),
}

/// Three expressions treated as a vector in ℝ³.
pub type Vec3Expr = [Expr; 3];

impl Expr {
    pub fn constant(value: Real) -> Self {
        Expr::Const(OrderedFloat(value))
    }

    pub fn var(symbol: &Symbol) -> Self {
        Expr::Var(symbol.clone())
    }

    pub fn zero() -> Self {
        Expr::constant(0.0)
    }

    pub fn as_const(&self) -> Option<Real> {
        match self {
            Expr::Const(c) => Some(c.0),
            _ => None,
        }
    }

    pub fn sqrt(self) -> Self {
        match self.as_const() {
            Some(c) => Expr::constant(c.sqrt()),
            None => Expr::Sqrt(Box::new(self)),
        }
    }

    pub fn abs(self) -> Self {
        match self.as_const() {
            Some(c) => Expr::constant(c.abs()),
            None => Expr::Abs(Box::new(self)),
        }
    }

    pub fn square(self) -> Self {
        self.clone() * self
    }

    /// Collect every symbol occurring in this expression.
    pub fn free_symbols(&self, out: &mut BTreeSet<Symbol>) {
        match self {
            Expr::Const(_) => {}
            Expr::Var(s) => {
                out.insert(s.clone());
            }
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
                a.free_symbols(out);
                b.free_symbols(out);
            }
            Expr::Neg(a) | Expr::Sqrt(a) | Expr::Abs(a) => a.free_symbols(out),
        }
    }

    /// Replace symbols by expressions, rebuilding through the folding constructors.
    pub fn substitute(&self, map: &HashMap<Symbol, Expr>) -> Expr {
        match self {
            Expr::Const(_) => self.clone(),
            Expr::Var(s) => map.get(s).cloned().unwrap_or_else(|| self.clone()),
            Expr::Add(a, b) => a.substitute(map) + b.substitute(map),
            Expr::Sub(a, b) => a.substitute(map) - b.substitute(map),
            Expr::Mul(a, b) => a.substitute(map) * b.substitute(map),
            Expr::Div(a, b) => a.substitute(map) / b.substitute(map),
            Expr::Neg(a) => -a.substitute(map),
            Expr::Sqrt(a) => a.substitute(map).sqrt(),
            Expr::Abs(a) => a.substitute(map).abs(),
        }
    }

    /// Evaluate with a symbol lookup; unknown symbols evaluate to NaN.
    pub fn eval(&self, env: &dyn Fn(&Symbol) -> Option<Real>) -> Real {
        match self {
            Expr::Const(c) => c.0,
            Expr::Var(s) => env(s).unwrap_or(Real::NAN),
            Expr::Add(a, b) => a.eval(env) + b.eval(env),
            Expr::Sub(a, b) => a.eval(env) - b.eval(env),
            Expr::Mul(a, b) => a.eval(env) * b.eval(env),
            Expr::Div(a, b) => a.eval(env) / b.eval(env),
            Expr::Neg(a) => -a.eval(env),
            Expr::Sqrt(a) => a.eval(env).sqrt(),
            Expr::Abs(a) => a.eval(env).abs(),
        }
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        match self {
            Expr::Const(_) | Expr::Var(_) => 1,
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
                1 + a.size() + b.size()
            }
            Expr::Neg(a) | Expr::Sqrt(a) | Expr::Abs(a) => 1 + a.size(),
        }
    }
}

impl Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        match (self.as_const(), rhs.as_const()) {
            (Some(a), Some(b)) => Expr::constant(a + b),
            (Some(a), None) if a == 0.0 => rhs,
            (None, Some(b)) if b == 0.0 => self,
            _ => Expr::Add(Box::new(self), Box::new(rhs)),
        }
    }
}

impl Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        match (self.as_const(), rhs.as_const()) {
            (Some(a), Some(b)) => Expr::constant(a - b),
            (Some(a), None) if a == 0.0 => -rhs,
            (None, Some(b)) if b == 0.0 => self,
            _ => Expr::Sub(Box::new(self), Box::new(rhs)),
        }
    }
}

impl Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        match (self.as_const(), rhs.as_const()) {
            (Some(a), Some(b)) => Expr::constant(a * b),
            (Some(a), None) | (None, Some(a)) if a == 0.0 => Expr::zero(),
            (Some(a), None) if a == 1.0 => rhs,
            (None, Some(b)) if b == 1.0 => self,
            (Some(a), None) if a == -1.0 => -rhs,
            (None, Some(b)) if b == -1.0 => -self,
            _ => Expr::Mul(Box::new(self), Box::new(rhs)),
        }
    }
}

impl Div for Expr {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        match (self.as_const(), rhs.as_const()) {
            (Some(a), Some(b)) => Expr::constant(a / b),
            (None, Some(b)) if b == 1.0 => self,
            _ => Expr::Div(Box::new(self), Box::new(rhs)),
        }
    }
}

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        match self {
            Expr::Const(c) => Expr::constant(-c.0),
            Expr::Neg(inner) => *inner,
            other => Expr::Neg(Box::new(other)),
        }
    }
}

impl From<Real> for Expr {
    fn from(value: Real) -> Self {
        Expr::constant(value)
    }
}

/// `a · b`
pub fn dot(a: &Vec3Expr, b: &Vec3Expr) -> Expr {
    a[0].clone() * b[0].clone() + a[1].clone() * b[1].clone() + a[2].clone() * b[2].clone()
}

/// `a × b`
pub fn cross(a: &Vec3Expr, b: &Vec3Expr) -> Vec3Expr {
    [
        a[1].clone() * b[2].clone() - a[2].clone() * b[1].clone(),
        a[2].clone() * b[0].clone() - a[0].clone() * b[2].clone(),
        a[0].clone() * b[1].clone() - a[1].clone() * b[0].clone(),
    ]
}

/// `a - b` componentwise.
pub fn vsub(a: &Vec3Expr, b: &Vec3Expr) -> Vec3Expr {
    [
        a[0].clone() - b[0].clone(),
        a[1].clone() - b[1].clone(),
        a[2].clone() - b[2].clone(),
    ]
}

/// Lift a numeric vector into the IR.
pub fn vconst(v: &nalgebra::Vector3<Real>) -> Vec3Expr {
    [Expr::constant(v.x), Expr::constant(v.y), Expr::constant(v.z)]
}

/// The coordinate vector `(x, y, z)`.
pub fn vxyz(vars: &[Symbol; 3]) -> Vec3Expr {
    [Expr::var(&vars[0]), Expr::var(&vars[1]), Expr::var(&vars[2])]
}

/// Comparison operator of an atomic formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Cmp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Cmp {
    #[inline]
    pub fn apply(self, a: Real, b: Real) -> bool {
        match self {
            Cmp::Lt => a < b,
            Cmp::Le => a <= b,
            Cmp::Gt => a > b,
            Cmp::Ge => a >= b,
            Cmp::Eq => a == b,
            Cmp::Ne => a != b,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Cmp::Lt => "<",
            Cmp::Le => "<=",
            Cmp::Gt => ">",
            Cmp::Ge => ">=",
            Cmp::Eq => "==",
            Cmp::Ne => "!=",
        }
    }
}

/// Quantifier-free boolean formula over comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Formula {
    True,
    False,
    Cmp(Cmp, Expr, Expr),
    And(Vec<Formula>),
    Or(Vec<Formula>),
    Not(Box<Formula>),
    Ite(Box<Formula>, Box<Formula>, Box<Formula>),
}

impl Formula {
    /// Atomic comparison, folded when both sides are constant.
    pub fn cmp(op: Cmp, lhs: Expr, rhs: Expr) -> Formula {
        match (lhs.as_const(), rhs.as_const()) {
            (Some(a), Some(b)) => Formula::from_bool(op.apply(a, b)),
            _ => Formula::Cmp(op, lhs, rhs),
        }
    }

    pub fn le(lhs: Expr, rhs: Expr) -> Formula {
        Formula::cmp(Cmp::Le, lhs, rhs)
    }

    pub fn lt(lhs: Expr, rhs: Expr) -> Formula {
        Formula::cmp(Cmp::Lt, lhs, rhs)
    }

    pub fn ge(lhs: Expr, rhs: Expr) -> Formula {
        Formula::cmp(Cmp::Ge, lhs, rhs)
    }

    pub fn gt(lhs: Expr, rhs: Expr) -> Formula {
        Formula::cmp(Cmp::Gt, lhs, rhs)
    }

    pub fn from_bool(value: bool) -> Formula {
        if value { Formula::True } else { Formula::False }
    }

    /// Conjunction; flattens nested `And`, drops `True`, short-circuits on `False`.
    pub fn and<I: IntoIterator<Item = Formula>>(args: I) -> Formula {
        let mut out = Vec::new();
        for arg in args {
            match arg {
                Formula::True => {}
                Formula::False => return Formula::False,
                Formula::And(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        out.dedup();
        match out.len() {
            0 => Formula::True,
            1 => out.pop().unwrap_or(Formula::True),
            _ => Formula::And(out),
        }
    }

    /// Disjunction; flattens nested `Or`, drops `False`, short-circuits on `True`.
    pub fn or<I: IntoIterator<Item = Formula>>(args: I) -> Formula {
        let mut out = Vec::new();
        for arg in args {
            match arg {
                Formula::False => {}
                Formula::True => return Formula::True,
                Formula::Or(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        out.dedup();
        match out.len() {
            0 => Formula::False,
            1 => out.pop().unwrap_or(Formula::False),
            _ => Formula::Or(out),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Formula {
        match self {
            Formula::True => Formula::False,
            Formula::False => Formula::True,
            Formula::Not(inner) => *inner,
            other => Formula::Not(Box::new(other)),
        }
    }

    pub fn ite(cond: Formula, then: Formula, otherwise: Formula) -> Formula {
        match cond {
            Formula::True => then,
            Formula::False => otherwise,
            cond => Formula::Ite(Box::new(cond), Box::new(then), Box::new(otherwise)),
        }
    }

    /// Negation normal form: `Not` only wraps comparisons.
    ///
    /// A negated comparison stays `Not(Cmp)` instead of flipping the
    /// operator, so that undefined (NaN) operands keep landing on the
    /// negated side, as they do under the complement of a set.
    pub fn nnf(&self) -> Formula {
        self.nnf_signed(false)
    }

    fn nnf_signed(&self, negated: bool) -> Formula {
        match self {
            Formula::True => Formula::from_bool(!negated),
            Formula::False => Formula::from_bool(negated),
            Formula::Cmp(op, a, b) => {
                let atom = Formula::cmp(*op, a.clone(), b.clone());
                if negated { atom.not() } else { atom }
            }
            Formula::And(args) => {
                let mapped = args.iter().map(|a| a.nnf_signed(negated));
                if negated { Formula::or(mapped) } else { Formula::and(mapped) }
            }
            Formula::Or(args) => {
                let mapped = args.iter().map(|a| a.nnf_signed(negated));
                if negated { Formula::and(mapped) } else { Formula::or(mapped) }
            }
            Formula::Not(inner) => inner.nnf_signed(!negated),
            Formula::Ite(c, a, b) => {
                let expanded = Formula::or([
                    Formula::and([(**c).clone(), (**a).clone()]),
                    Formula::and([(**c).clone().not(), (**b).clone()]),
                ]);
                expanded.nnf_signed(negated)
            }
        }
    }

    pub fn is_nnf(&self) -> bool {
        match self {
            Formula::True | Formula::False | Formula::Cmp(..) => true,
            Formula::And(args) | Formula::Or(args) => args.iter().all(Formula::is_nnf),
            Formula::Not(inner) => matches!(**inner, Formula::Cmp(..)),
            Formula::Ite(..) => false,
        }
    }

    /// Relax strict comparisons, an over-approximation of the closure.
    pub fn closure(&self) -> Formula {
        self.nnf().relax(true)
    }

    /// Tighten non-strict comparisons, an under-approximation of the interior.
    pub fn interior(&self) -> Formula {
        self.nnf().relax(false)
    }

    /// Closure (`closing`) or interior of a formula in negation normal form.
    /// Under a negation the roles swap: the closure of `¬φ` is `¬interior(φ)`.
    fn relax(&self, closing: bool) -> Formula {
        match self {
            Formula::True | Formula::False => self.clone(),
            Formula::Cmp(op, a, b) => {
                let (a, b) = (a.clone(), b.clone());
                match (closing, op) {
                    (true, Cmp::Lt) => Formula::cmp(Cmp::Le, a, b),
                    (true, Cmp::Gt) => Formula::cmp(Cmp::Ge, a, b),
                    (true, Cmp::Ne) => Formula::True,
                    (false, Cmp::Le) => Formula::cmp(Cmp::Lt, a, b),
                    (false, Cmp::Ge) => Formula::cmp(Cmp::Gt, a, b),
                    (false, Cmp::Eq) => Formula::False,
                    (_, op) => Formula::cmp(*op, a, b),
                }
            }
            Formula::And(args) => Formula::and(args.iter().map(|a| a.relax(closing))),
            Formula::Or(args) => Formula::or(args.iter().map(|a| a.relax(closing))),
            Formula::Not(inner) => inner.relax(!closing).not(),
            Formula::Ite(..) => self.nnf().relax(closing),
        }
    }

    pub fn substitute(&self, map: &HashMap<Symbol, Expr>) -> Formula {
        match self {
            Formula::True | Formula::False => self.clone(),
            Formula::Cmp(op, a, b) => Formula::cmp(*op, a.substitute(map), b.substitute(map)),
            Formula::And(args) => Formula::and(args.iter().map(|a| a.substitute(map))),
            Formula::Or(args) => Formula::or(args.iter().map(|a| a.substitute(map))),
            Formula::Not(inner) => inner.substitute(map).not(),
            Formula::Ite(c, a, b) => {
                Formula::ite(c.substitute(map), a.substitute(map), b.substitute(map))
            }
        }
    }

    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<Symbol>) {
        match self {
            Formula::True | Formula::False => {}
            Formula::Cmp(_, a, b) => {
                a.free_symbols(out);
                b.free_symbols(out);
            }
            Formula::And(args) | Formula::Or(args) => {
                args.iter().for_each(|a| a.collect_symbols(out));
            }
            Formula::Not(inner) => inner.collect_symbols(out),
            Formula::Ite(c, a, b) => {
                c.collect_symbols(out);
                a.collect_symbols(out);
                b.collect_symbols(out);
            }
        }
    }

    /// Direct tree-walking evaluation.
    pub fn eval(&self, env: &dyn Fn(&Symbol) -> Option<Real>) -> bool {
        match self {
            Formula::True => true,
            Formula::False => false,
            Formula::Cmp(op, a, b) => op.apply(a.eval(env), b.eval(env)),
            Formula::And(args) => args.iter().all(|a| a.eval(env)),
            Formula::Or(args) => args.iter().any(|a| a.eval(env)),
            Formula::Not(inner) => !inner.eval(env),
            Formula::Ite(c, a, b) => {
                if c.eval(env) {
                    a.eval(env)
                } else {
                    b.eval(env)
                }
            }
        }
    }

    /// Number of atomic comparisons.
    pub fn leaf_count(&self) -> usize {
        match self {
            Formula::True | Formula::False => 0,
            Formula::Cmp(..) => 1,
            Formula::And(args) | Formula::Or(args) => args.iter().map(Formula::leaf_count).sum(),
            Formula::Not(inner) => inner.leaf_count(),
            Formula::Ite(c, a, b) => c.leaf_count() + a.leaf_count() + b.leaf_count(),
        }
    }
}

// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// Compilation to closures
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/// A real-valued function of the positional inputs.
pub type CompiledExpr = Box<dyn Fn(&[Real]) -> Real + Send + Sync>;

/// A membership test over the positional inputs.
pub type CompiledFormula = Box<dyn Fn(&[Real]) -> bool + Send + Sync>;

/// Compile an expression once; `inputs` fixes the argument order and
/// `bindings` supplies numeric values for the remaining symbols.
///
/// Symbols found in neither compile to NaN, so any comparison that
/// depends on them is false.
pub fn compile_expr(
    expr: &Expr,
    inputs: &[Symbol],
    bindings: &HashMap<Symbol, Real>,
) -> CompiledExpr {
    match expr {
        Expr::Const(c) => {
            let c = c.0;
            Box::new(move |_| c)
        }
        Expr::Var(s) => {
            if let Some(i) = inputs.iter().position(|v| v == s) {
                Box::new(move |args| args[i])
            } else if let Some(&v) = bindings.get(s) {
                Box::new(move |_| v)
            } else {
                log::warn!("unbound symbol `{s}` compiles to NaN");
                Box::new(|_| Real::NAN)
            }
        }
        Expr::Add(a, b) => {
            let (a, b) = (compile_expr(a, inputs, bindings), compile_expr(b, inputs, bindings));
            Box::new(move |args| a(args) + b(args))
        }
        Expr::Sub(a, b) => {
            let (a, b) = (compile_expr(a, inputs, bindings), compile_expr(b, inputs, bindings));
            Box::new(move |args| a(args) - b(args))
        }
        Expr::Mul(a, b) => {
            let (a, b) = (compile_expr(a, inputs, bindings), compile_expr(b, inputs, bindings));
            Box::new(move |args| a(args) * b(args))
        }
        Expr::Div(a, b) => {
            let (a, b) = (compile_expr(a, inputs, bindings), compile_expr(b, inputs, bindings));
            Box::new(move |args| a(args) / b(args))
        }
        Expr::Neg(a) => {
            let a = compile_expr(a, inputs, bindings);
            Box::new(move |args| -a(args))
        }
        Expr::Sqrt(a) => {
            let a = compile_expr(a, inputs, bindings);
            Box::new(move |args| a(args).sqrt())
        }
        Expr::Abs(a) => {
            let a = compile_expr(a, inputs, bindings);
            Box::new(move |args| a(args).abs())
        }
    }
}

/// Compile a formula once. See [`compile_expr`] for the meaning of the arguments.
pub fn compile_formula(
    formula: &Formula,
    inputs: &[Symbol],
    bindings: &HashMap<Symbol, Real>,
) -> CompiledFormula {
    match formula {
        Formula::True => Box::new(|_| true),
        Formula::False => Box::new(|_| false),
        Formula::Cmp(op, a, b) => {
            let op = *op;
            let (a, b) = (compile_expr(a, inputs, bindings), compile_expr(b, inputs, bindings));
            Box::new(move |args| op.apply(a(args), b(args)))
        }
        Formula::And(parts) => {
            let parts: Vec<_> = parts.iter().map(|p| compile_formula(p, inputs, bindings)).collect();
            Box::new(move |args| parts.iter().all(|p| p(args)))
        }
        Formula::Or(parts) => {
            let parts: Vec<_> = parts.iter().map(|p| compile_formula(p, inputs, bindings)).collect();
            Box::new(move |args| parts.iter().any(|p| p(args)))
        }
        Formula::Not(inner) => {
            let inner = compile_formula(inner, inputs, bindings);
            Box::new(move |args| !inner(args))
        }
        Formula::Ite(c, a, b) => {
            let c = compile_formula(c, inputs, bindings);
            let a = compile_formula(a, inputs, bindings);
            let b = compile_formula(b, inputs, bindings);
            Box::new(move |args| if c(args) { a(args) } else { b(args) })
        }
    }
}

// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// Display (the serialized form stored in document properties)
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(c) => write!(f, "{}", c.0),
            Expr::Var(s) => write!(f, "{s}"),
            Expr::Add(a, b) => write!(f, "({a} + {b})"),
            Expr::Sub(a, b) => write!(f, "({a} - {b})"),
            Expr::Mul(a, b) => write!(f, "{a}*{b}"),
            Expr::Div(a, b) => write!(f, "{a}/{b}"),
            Expr::Neg(a) => write!(f, "-{a}"),
            Expr::Sqrt(a) => write!(f, "sqrt({a})"),
            Expr::Abs(a) => write!(f, "Abs({a})"),
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, name: &str, args: &[Formula]) -> fmt::Result {
            write!(f, "{name}(")?;
            for (i, a) in args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{a}")?;
            }
            write!(f, ")")
        }
        match self {
            Formula::True => write!(f, "True"),
            Formula::False => write!(f, "False"),
            Formula::Cmp(op, a, b) => write!(f, "{a} {} {b}", op.symbol()),
            Formula::And(args) => join(f, "And", args),
            Formula::Or(args) => join(f, "Or", args),
            Formula::Not(inner) => write!(f, "Not({inner})"),
            Formula::Ite(c, a, b) => write!(f, "ITE({c}, {a}, {b})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Expr {
        Expr::var(&Symbol::new("x"))
    }

    #[test]
    fn folding_removes_neutral_elements() {
        assert_eq!(x() + Expr::zero(), x());
        assert_eq!(x() * Expr::constant(1.0), x());
        assert_eq!(x() * Expr::zero(), Expr::zero());
        assert_eq!(-(-x()), x());
        assert_eq!(Expr::constant(2.0) + Expr::constant(3.0), Expr::constant(5.0));
    }

    #[test]
    fn nnf_pushes_negation_onto_comparisons() {
        let f = Formula::and([Formula::le(x(), Expr::zero()), Formula::gt(x(), Expr::constant(-1.0))]).not();
        let n = f.nnf();
        assert!(n.is_nnf());
        assert_eq!(
            n,
            Formula::Or(vec![
                Formula::le(x(), Expr::zero()).not(),
                Formula::gt(x(), Expr::constant(-1.0)).not(),
            ])
        );
    }

    #[test]
    fn negated_undefined_comparison_stays_true() {
        // sqrt(x) >= 0.5 is undefined for x < 0, which belongs to the negation
        let f = Formula::ge(x().sqrt(), Expr::constant(0.5)).not();
        let n = f.nnf();
        let inputs = [Symbol::new("x")];
        let direct = compile_formula(&f, &inputs, &HashMap::new());
        let normal = compile_formula(&n, &inputs, &HashMap::new());
        for v in [-1.0, -0.25, 0.0, 0.2, 0.25, 0.5, 1.0] {
            assert_eq!(direct(&[v]), normal(&[v]), "x = {v}");
        }
        assert!(normal(&[-0.5]));
        assert_eq!(n.closure(), Formula::gt(x().sqrt(), Expr::constant(0.5)).not());
    }

    #[test]
    fn ite_expands_in_nnf() {
        let c = Formula::gt(x(), Expr::zero());
        let f = Formula::ite(c, Formula::True, Formula::False);
        assert_eq!(f.nnf(), Formula::gt(x(), Expr::zero()));
    }

    #[test]
    fn nan_is_outside() {
        let f = Formula::ge(x().sqrt(), Expr::zero());
        let compiled = compile_formula(&f, &[Symbol::new("x")], &HashMap::new());
        assert!(compiled(&[4.0]));
        assert!(!compiled(&[-4.0]));
    }

    #[test]
    fn unbound_symbols_use_bindings() {
        let r = Symbol::new("r");
        let f = Formula::le(x(), Expr::var(&r));
        let mut bindings = HashMap::new();
        bindings.insert(r.clone(), 2.0);
        let compiled = compile_formula(&f, &[Symbol::new("x")], &bindings);
        assert!(compiled(&[1.5]));
        assert!(!compiled(&[2.5]));
        let unbound = compile_formula(&f, &[Symbol::new("x")], &HashMap::new());
        assert!(!unbound(&[0.0]));
    }

    #[test]
    fn closure_and_interior_flip_strictness() {
        let f = Formula::lt(x(), Expr::zero());
        assert_eq!(f.closure(), Formula::le(x(), Expr::zero()));
        assert_eq!(f.closure().interior(), f);
    }
}
