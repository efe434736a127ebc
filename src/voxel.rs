//! Approximate set relations by sampling predicates on a fixed point grid.
//!
//! Every set is mapped to a [`Bitmap`] with one bit per grid point. Boolean
//! operators become bitwise operators, so disjointness, containment and
//! equality reduce to a handful of word operations once the leaves have been
//! sampled. Leaf bitmaps are cached per engine, keyed by the canonical set.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ops::{BitAnd, BitOr};

use hashbrown::HashMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::expr::{Formula, Symbol, compile_formula};
use crate::float_types::Real;
use crate::set::Set;

/// Minimum number of leaf bitmaps kept by an engine.
pub const MIN_CACHE_CAPACITY: usize = 128;

/// A finite ordered sample of ℝ³. The order never changes for the life of the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelGrid {
    points: Vec<[Real; 3]>,
    voxel_volume: Real,
}

impl VoxelGrid {
    /// The lattice `{(i/n, j/n, k/n) : -Rn ≤ i, j, k ≤ Rn}`.
    pub fn cubic(radius: Real, subdivisions: u32) -> Self {
        let n = subdivisions.max(1) as Real;
        let steps = (radius.abs() * n).round() as i64;
        let side = (2 * steps + 1) as usize;
        let mut points = Vec::with_capacity(side * side * side);
        for i in -steps..=steps {
            for j in -steps..=steps {
                for k in -steps..=steps {
                    points.push([i as Real / n, j as Real / n, k as Real / n]);
                }
            }
        }
        log::debug!("cubic voxel grid R={radius} n={subdivisions}: {} points", points.len());
        VoxelGrid {
            points,
            voxel_volume: 1.0 / (n * n * n),
        }
    }

    /// An arbitrary sample, each point standing for `voxel_volume` of space.
    pub fn from_points(points: Vec<[Real; 3]>, voxel_volume: Real) -> Self {
        VoxelGrid { points, voxel_volume }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[[Real; 3]] {
        &self.points
    }

    pub fn voxel_volume(&self) -> Real {
        self.voxel_volume
    }

    /// The range mask `2ᴺ - 1`.
    pub fn ran(&self) -> Bitmap {
        Bitmap::ones(self.len())
    }
}

/// A fixed-length bit vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bitmap {
    words: Vec<u64>,
    len: usize,
}

impl Bitmap {
    pub fn zeros(len: usize) -> Self {
        Bitmap {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    pub fn ones(len: usize) -> Self {
        let mut out = Bitmap {
            words: vec![u64::MAX; len.div_ceil(64)],
            len,
        };
        out.clear_tail();
        out
    }

    pub fn from_bools<I: IntoIterator<Item = bool>>(len: usize, bits: I) -> Self {
        let mut out = Bitmap::zeros(len);
        for (i, b) in bits.into_iter().enumerate().take(len) {
            if b {
                out.words[i / 64] |= 1 << (i % 64);
            }
        }
        out
    }

    fn clear_tail(&mut self) {
        let rem = self.len % 64;
        if rem != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << rem) - 1;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, i: usize) -> bool {
        i < self.len && self.words[i / 64] & (1 << (i % 64)) != 0
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Bits set in `self` but not in `other`.
    pub fn and_not(&self, other: &Bitmap) -> Bitmap {
        debug_assert_eq!(self.len, other.len);
        Bitmap {
            words: self.words.iter().zip(&other.words).map(|(a, b)| a & !b).collect(),
            len: self.len,
        }
    }

    /// Indices of the set bits.
    pub fn ones_iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(|&i| self.get(i))
    }
}

impl BitAnd for &Bitmap {
    type Output = Bitmap;

    fn bitand(self, rhs: &Bitmap) -> Bitmap {
        debug_assert_eq!(self.len, rhs.len);
        Bitmap {
            words: self.words.iter().zip(&rhs.words).map(|(a, b)| a & b).collect(),
            len: self.len,
        }
    }
}

impl BitOr for &Bitmap {
    type Output = Bitmap;

    fn bitor(self, rhs: &Bitmap) -> Bitmap {
        debug_assert_eq!(self.len, rhs.len);
        Bitmap {
            words: self.words.iter().zip(&rhs.words).map(|(a, b)| a | b).collect(),
            len: self.len,
        }
    }
}

/// Bounded least-recently-used map from sets to their bitmaps.
#[derive(Debug)]
pub struct BitmapCache {
    capacity: usize,
    map: HashMap<Set, Bitmap>,
    order: VecDeque<Set>,
    hits: usize,
    misses: usize,
}

impl BitmapCache {
    pub fn new(capacity: usize) -> Self {
        BitmapCache {
            capacity: capacity.max(MIN_CACHE_CAPACITY),
            map: HashMap::new(),
            order: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, key: &Set) -> Option<Bitmap> {
        match self.map.get(key) {
            Some(bits) => {
                self.hits += 1;
                if let Some(pos) = self.order.iter().position(|k| k == key) {
                    if let Some(k) = self.order.remove(pos) {
                        self.order.push_back(k);
                    }
                }
                Some(bits.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: Set, bits: Bitmap) {
        if self.map.contains_key(&key) {
            return;
        }
        while self.map.len() >= self.capacity {
            match self.order.pop_front() {
                Some(old) => {
                    self.map.remove(&old);
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.map.insert(key, bits);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// `(hits, misses)` since construction.
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }
}

/// Evaluates sets on a grid and answers relations between them.
#[derive(Debug)]
pub struct VoxelEngine {
    grid: VoxelGrid,
    bindings: HashMap<Symbol, Real>,
    cache: RefCell<BitmapCache>,
}

impl VoxelEngine {
    pub fn new(grid: VoxelGrid) -> Self {
        Self::with_bindings(grid, HashMap::new())
    }

    /// `bindings` give values to the free parameters of abstract sets.
    pub fn with_bindings(grid: VoxelGrid, bindings: HashMap<Symbol, Real>) -> Self {
        VoxelEngine {
            grid,
            bindings,
            cache: RefCell::new(BitmapCache::new(MIN_CACHE_CAPACITY)),
        }
    }

    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    pub fn bindings(&self) -> &HashMap<Symbol, Real> {
        &self.bindings
    }

    pub fn ran(&self) -> Bitmap {
        self.grid.ran()
    }

    pub fn cache_stats(&self) -> (usize, usize) {
        self.cache.borrow().stats()
    }

    /// Bitmap of `set` over the grid.
    pub fn bits(&self, set: &Set) -> Bitmap {
        let len = self.grid.len();
        match set {
            Set::Empty => Bitmap::zeros(len),
            Set::Universal => Bitmap::ones(len),
            Set::Intersection(args) => args
                .iter()
                .fold(Bitmap::ones(len), |acc, a| &acc & &self.bits(a)),
            Set::Union(args) => args
                .iter()
                .fold(Bitmap::zeros(len), |acc, a| &acc | &self.bits(a)),
            Set::Complement(inner) => self.ran().and_not(&self.bits(inner)),
            leaf => self.leaf_bits(leaf),
        }
    }

    fn leaf_bits(&self, leaf: &Set) -> Bitmap {
        if let Some(bits) = self.cache.borrow_mut().get(leaf) {
            log::trace!("bitmap cache hit for {leaf}");
            return bits;
        }
        log::trace!("bitmap cache miss for {leaf}");
        let predicate = leaf.as_predicate();
        let bits = self.bits_of_formula(&predicate.vars, &predicate.formula);
        self.cache.borrow_mut().insert(leaf.clone(), bits.clone());
        bits
    }

    /// Sample a formula over the grid, with `vars` bound to the coordinates.
    pub fn bits_of_formula(&self, vars: &[Symbol; 3], formula: &Formula) -> Bitmap {
        let len = self.grid.len();
        match formula {
            Formula::True => return Bitmap::ones(len),
            Formula::False => return Bitmap::zeros(len),
            _ => {}
        }
        let f = compile_formula(formula, vars, &self.bindings);

        #[cfg(not(feature = "parallel"))]
        let inside: Vec<bool> = self.grid.points.iter().map(|p| f(p)).collect();

        #[cfg(feature = "parallel")]
        let inside: Vec<bool> = self.grid.points.par_iter().map(|p| f(p)).collect();

        Bitmap::from_bools(len, inside)
    }

    pub fn is_disjoint(&self, a: &Set, b: &Set) -> bool {
        (&self.bits(a) & &self.bits(b)).is_zero()
    }

    pub fn is_subset(&self, a: &Set, b: &Set) -> bool {
        self.bits(a).and_not(&self.bits(b)).is_zero()
    }

    pub fn equal(&self, a: &Set, b: &Set) -> bool {
        self.bits(a) == self.bits(b)
    }

    pub fn is_empty(&self, a: &Set) -> bool {
        self.bits(a).is_zero()
    }

    /// Number of inside samples times the voxel volume.
    pub fn volume(&self, a: &Set) -> Real {
        self.bits(a).count_ones() as Real * self.grid.voxel_volume
    }

    /// Whether some sample lies in the interior of the set.
    pub fn has_interior(&self, a: &Set) -> bool {
        !self.bits(&a.interior()).is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use crate::float_types::approx_eq;
    use crate::primitive::Primitive;
    use nalgebra::{Point3, Vector3};

    fn ball(r: Real) -> Set {
        Set::Primitive(Primitive::sphere(r, Point3::origin()).unwrap())
    }

    fn half(d: Vector3<Real>) -> Set {
        Set::Primitive(Primitive::halfspace(d, 0.0).unwrap())
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic]
    fn bitmaps_of_different_grids_do_not_mix() {
        let _ = &Bitmap::ones(64) & &Bitmap::ones(65);
    }

    #[test]
    fn grid_has_expected_size() {
        let g = VoxelGrid::cubic(1.0, 2);
        assert_eq!(g.len(), 125);
        assert!(approx_eq(g.voxel_volume(), 0.125, 1e-12));
        assert_eq!(g.ran().count_ones(), 125);
    }

    #[test]
    fn bitmap_tail_is_masked() {
        let b = Bitmap::ones(70);
        assert_eq!(b.count_ones(), 70);
        assert!(!b.get(70));
        let z = Bitmap::zeros(70);
        assert_eq!(b.and_not(&z), b);
        assert!((&b & &z).is_zero());
    }

    #[test]
    fn engine_relations() {
        let e = VoxelEngine::new(VoxelGrid::cubic(2.0, 4));
        let a = ball(1.0);
        let b = half(Vector3::x());
        assert!(e.is_subset(&a, &a));
        assert!(e.is_subset(&a, &Set::union([a.clone(), b.clone()])));
        assert!(e.is_disjoint(&a, &a.clone().complement()));
        assert!(e.equal(&a, &Set::union([a.clone(), a.clone()])));
        assert!(!e.is_disjoint(&a, &b));
        assert!(e.is_disjoint(&b.interior(), &half(-Vector3::x()).interior()));
        assert!(e.is_empty(&ball(1.0).difference(ball(2.0))));
    }

    #[test]
    fn volume_approximates_ball() {
        let e = VoxelEngine::new(VoxelGrid::cubic(1.5, 10));
        let v = e.volume(&ball(1.0));
        assert!((v - 4.0 / 3.0 * std::f64::consts::PI).abs() < 0.1, "volume {v}");
        assert!(e.has_interior(&ball(1.0)));
        assert!(!e.has_interior(&half(Vector3::x()).difference(half(Vector3::x()).interior())));
    }

    #[test]
    fn leaf_bitmaps_are_cached() {
        let e = VoxelEngine::new(VoxelGrid::cubic(1.0, 2));
        let a = ball(1.0);
        e.bits(&a);
        e.bits(&a);
        assert_eq!(e.cache_stats(), (1, 1));
    }

    #[test]
    fn cache_evicts_oldest() {
        let mut c = BitmapCache::new(0);
        assert_eq!(c.capacity(), MIN_CACHE_CAPACITY);
        for i in 0..=MIN_CACHE_CAPACITY {
            c.insert(ball(1.0 + i as Real), Bitmap::zeros(1));
        }
        assert_eq!(c.len(), MIN_CACHE_CAPACITY);
        assert!(c.get(&ball(1.0)).is_none());
        assert!(c.get(&ball(2.0)).is_some());
    }

    #[test]
    fn unbound_parameters_are_outside() {
        let [x, y, z] = Symbol::xyz();
        let r = Symbol::new("r");
        let s = Set::abstract_set(
            [x.clone(), y, z],
            Formula::le(Expr::var(&x).square(), Expr::var(&r)),
        )
        .unwrap();
        let free = VoxelEngine::new(VoxelGrid::cubic(1.0, 2));
        assert!(free.is_empty(&s));
        let mut bindings = HashMap::new();
        bindings.insert(r, 0.3);
        let bound = VoxelEngine::with_bindings(VoxelGrid::cubic(1.0, 2), bindings);
        // |x| ≤ 0.547 keeps the x = -0.5, 0, 0.5 slabs
        assert_eq!(bound.bits(&s).count_ones(), 75);
    }
}
