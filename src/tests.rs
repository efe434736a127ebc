// tests

use crate::backend::{Backend, MeshBackend, realize, realize_leaves};
use crate::constructors::{cube, sphere, with_exterior};
use crate::expr::{Expr, Formula, Symbol};
use crate::float_types::parry3d::bounding_volume::Aabb;
use crate::float_types::{FRAC_PI_2, PI, Real, approx_eq};
use crate::operation::Operation;
use crate::path::Path;
use crate::primitive::Primitive;
use crate::puzzle::Puzzle;
use crate::set::{Set, halfspace};
use crate::simplify::simp;
use crate::trace::trace;
use crate::transform::Transformation;
use crate::voxel::{VoxelEngine, VoxelGrid};
use nalgebra::{Point3, Vector3};

// --------------------------------------------------------
//   Helpers
// --------------------------------------------------------

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn axes() -> [Vector3<Real>; 3] {
    [Vector3::x(), Vector3::y(), Vector3::z()]
}

/// `{x ≥ 0}, {x ≤ 0}` and likewise for y and z.
fn octant_knives() -> Vec<Vec<Set>> {
    axes()
        .into_iter()
        .map(|a| with_exterior(halfspace(a, 0.0).unwrap()).to_vec())
        .collect()
}

fn signs() -> Vec<[Real; 3]> {
    let mut out = Vec::new();
    for sx in [1.0, -1.0] {
        for sy in [1.0, -1.0] {
            for sz in [1.0, -1.0] {
                out.push([sx, sy, sz]);
            }
        }
    }
    out
}

fn two_by_two(engine: &VoxelEngine) -> Puzzle {
    Puzzle::new(vec![sphere(1.0).unwrap()]).cross_common(&octant_knives(), engine)
}

// --------------------------------------------------------
//   End-to-end scenarios
// --------------------------------------------------------

#[test]
fn test_two_by_two_ball() {
    init_logger();
    let engine = VoxelEngine::new(VoxelGrid::cubic(2.0, 10));
    let puzzle = two_by_two(&engine).simplified(&engine).unwrap();
    assert_eq!(puzzle.len(), 8);
    assert!(puzzle.no_collision(&engine));
    assert!(puzzle.is_valid_state(&engine));

    for s in signs() {
        let expected = Set::intersection(
            std::iter::once(sphere(1.0).unwrap())
                .chain(axes().iter().zip(s).map(|(a, si)| halfspace(a * si, 0.0).unwrap())),
        );
        let matching = puzzle
            .pieces()
            .iter()
            .filter(|p| engine.equal(p, &expected))
            .count();
        assert_eq!(matching, 1, "octant {s:?}");
    }
}

#[test]
fn test_quarter_turn_on_two_by_two() {
    init_logger();
    let engine = VoxelEngine::new(VoxelGrid::cubic(2.0, 10));
    let before = two_by_two(&engine);
    let turn = Path::rotate(PI / 4.0, Vector3::x(), Point3::origin()).unwrap();
    let op = Operation::ContinuousSelective(vec![(halfspace(Vector3::x(), 0.0).unwrap(), turn)]);
    let after = op.apply(&before, &engine).unwrap();
    assert_eq!(after.len(), 8);
    assert!(after.is_valid_state(&engine));

    let rot = Transformation::rotation(Vector3::x(), PI / 4.0).unwrap();
    for s in signs() {
        let sample = Point3::new(0.4 * s[0], 0.3 * s[1], 0.05 * s[2]);
        let i = before
            .pieces()
            .iter()
            .position(|p| p.contains(&sample))
            .unwrap();
        if s[0] > 0.0 {
            assert!(after.pieces()[i].contains(&rot.apply(&sample)));
        } else {
            assert!(engine.equal(&after.pieces()[i], &before.pieces()[i]));
            assert!(after.pieces()[i].contains(&sample));
        }
    }
    // the (+, +, +) piece has turned away from its old position
    let i = before
        .pieces()
        .iter()
        .position(|p| p.contains(&Point3::new(0.4, 0.3, 0.05)))
        .unwrap();
    assert!(!after.pieces()[i].contains(&Point3::new(0.4, 0.3, 0.05)));

    let simplified = after.simplified(&engine).unwrap();
    for (a, b) in after.pieces().iter().zip(simplified.pieces()) {
        assert!(engine.equal(a, b));
    }
}

#[test]
fn test_floppy_three_by_three_by_one() {
    init_logger();
    let engine = VoxelEngine::new(VoxelGrid::cubic(4.0, 5));
    let knives: Vec<Vec<Set>> = [Vector3::x(), -Vector3::x(), Vector3::y(), -Vector3::y()]
        .into_iter()
        .map(|d| with_exterior(halfspace(-d, -1.0).unwrap()).to_vec())
        .collect();
    let puzzle = Puzzle::new(vec![sphere(3.0).unwrap()])
        .cross_common(&knives, &engine)
        .simplified(&engine)
        .unwrap();
    assert_eq!(puzzle.len(), 9);
    assert!(puzzle.is_valid_state(&engine));
    // four corner cells of 3 leaves, four edge cells of 4, one center of 5
    let leaves: usize = puzzle.pieces().iter().map(Set::leaf_count).sum();
    assert_eq!(leaves, 33);

    for (x, y) in [(-2.0, -2.0), (0.0, -2.0), (2.0, 0.0), (0.0, 0.0), (2.0, 2.0)] {
        let p = Point3::new(x, y, 0.5);
        assert_eq!(puzzle.pieces().iter().filter(|s| s.contains(&p)).count(), 1);
    }
}

#[test]
fn test_path_normal_form() {
    let p = Path::lambda(10.0, |t| {
        Transformation::translation(Vector3::new(t, 0.5 * t, 0.0))
    })
    .unwrap();
    let q = Path::concat([
        p.slice(0.0, 3.0).unwrap(),
        p.slice(3.0, 7.0).unwrap(),
        p.slice(7.0, 10.0).unwrap(),
    ])
    .unwrap();
    assert_eq!(q, p);
    assert_eq!(Path::concat([p.clone(), Path::identity(1)]).unwrap(), p);
    assert!(approx_eq(p.slice(2.0, 4.5).unwrap().length(), 2.5, 1e-12));
}

#[test]
fn test_cube_dissection_trace() {
    init_logger();
    let engine = VoxelEngine::new(VoxelGrid::cubic(1.0, 8));
    let puzzle = Puzzle::new(vec![cube(1.0).unwrap()]).cross_common(&octant_knives(), &engine);
    assert_eq!(puzzle.len(), 8);

    let backend = MeshBackend::default();
    let bbox = Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
    for piece in puzzle.pieces() {
        let shape = realize(&backend, piece, &bbox).unwrap();
        assert!(approx_eq(backend.mass(&shape), 0.125, 1e-6));
        let sources = realize_leaves(&backend, piece, &bbox).unwrap();
        let links = trace(&backend, &shape, &sources);
        assert_eq!(links.len(), 6);
        for link in links {
            let link = link.unwrap();
            // each source is a half-space, whose plane is face 0
            assert_eq!(link.face, 0);
            assert!(matches!(
                piece.leaves()[link.source],
                Set::Primitive(Primitive::Halfspace { .. })
            ));
        }
    }
}

#[test]
fn test_simplification_is_monotone() {
    let engine = VoxelEngine::new(VoxelGrid::cubic(2.0, 6));
    let a = Set::intersection([sphere(1.0).unwrap(), halfspace(Vector3::x(), 0.0).unwrap()]);
    let b = Set::intersection([
        Set::Primitive(Primitive::sphere(1.0, Point3::new(0.5, 0.0, 0.0)).unwrap()),
        halfspace(Vector3::y(), -0.2).unwrap(),
    ]);
    let sa = simp(&engine, &a).unwrap();
    let sb = simp(&engine, &b).unwrap();
    let sab = simp(&engine, &Set::intersection([a.clone(), b.clone()])).unwrap();
    assert!(sab.leaf_count() <= sa.leaf_count() + sb.leaf_count());
    assert!(engine.equal(&sab, &Set::intersection([a.clone(), b.clone()])));
    assert_eq!(simp(&engine, &Set::intersection([a.clone(), a.clone()])).unwrap(), sa);
    assert_eq!(simp(&engine, &sa).unwrap(), sa);
}

// --------------------------------------------------------
//   Invariants
// --------------------------------------------------------

#[test]
fn test_voxel_relations() {
    let engine = VoxelEngine::new(VoxelGrid::cubic(2.0, 4));
    let a = sphere(1.0).unwrap();
    let b = halfspace(Vector3::new(1.0, 1.0, 0.0), 0.3).unwrap();
    assert!(engine.is_subset(&a, &a));
    assert!(engine.is_subset(&a, &Set::union([a.clone(), b.clone()])));
    assert!(engine.is_disjoint(&a, &a.clone().complement()));
    assert!(engine.equal(&a, &Set::union([a.clone(), a.clone()])));
}

#[test]
fn test_primitive_regular_closed_laws() {
    let prims = [
        Primitive::halfspace(Vector3::new(0.0, 2.0, 1.0), 0.5).unwrap(),
        Primitive::sphere(-1.5, Point3::new(1.0, 0.0, 0.0)).unwrap(),
        Primitive::infinite_cylinder(1.0, Vector3::z(), Point3::origin()).unwrap(),
        Primitive::semi_infinite_cone(0.5, Vector3::y(), Point3::origin()).unwrap(),
    ];
    for p in prims {
        assert_eq!(p.interior().closure(), p.closure());
        assert_eq!(p.closure().closure(), p.closure());
        let back = p.complement().and_then(|c| c.complement());
        assert_eq!(back, Some(p.clone()));
    }
}

#[test]
fn test_membership_is_pure() {
    let s = Set::difference(cube(2.0).unwrap(), sphere(1.0).unwrap());
    let p = Point3::new(0.9, 0.9, 0.0);
    let first = s.contains(&p);
    assert!(first);
    for _ in 0..3 {
        assert_eq!(s.contains(&p), first);
    }
    assert!(!s.contains(&Point3::origin()));
}

#[test]
fn test_cut_count_is_bounded() {
    let engine = VoxelEngine::new(VoxelGrid::cubic(2.0, 5));
    let knives: Vec<Vec<Set>> = [
        Vector3::new(1.0, 0.2, 0.0),
        Vector3::new(0.0, 1.0, 0.3),
        Vector3::new(0.1, 0.0, 1.0),
        Vector3::new(1.0, 1.0, 1.0),
    ]
    .into_iter()
    .map(|d| with_exterior(halfspace(d, 0.1).unwrap()).to_vec())
    .collect();
    let puzzle = Puzzle::new(vec![sphere(1.5).unwrap()]).cross_common(&knives, &engine);
    assert!(puzzle.len() <= 16);
    assert!(puzzle.len() >= 8);
    assert!(puzzle.no_collision(&engine));
}

#[test]
fn test_turned_puzzle_returns_home() {
    let engine = VoxelEngine::new(VoxelGrid::cubic(2.0, 4));
    let start = two_by_two(&engine);
    let quarter = Operation::Selective(vec![(
        halfspace(Vector3::z(), 0.0).unwrap(),
        Transformation::rotation(Vector3::z(), FRAC_PI_2).unwrap(),
    )]);
    let once = quarter.apply(&start, &engine).unwrap();
    let back = Operation::concat([quarter.clone(), quarter.clone(), quarter.clone()])
        .apply(&once, &engine)
        .unwrap();
    // four quarter turns bring every piece back onto its starting octant
    for (a, b) in start.pieces().iter().zip(back.pieces()) {
        assert!(engine.equal(a, b));
    }
}

#[test]
fn test_complement_keeps_undefined_points() {
    init_logger();
    let engine = VoxelEngine::new(VoxelGrid::cubic(1.0, 2));
    let [x, y, z] = Symbol::xyz();
    let root = Set::abstract_set(
        [x.clone(), y, z],
        Formula::ge(Expr::var(&x).sqrt(), Expr::constant(0.5)),
    )
    .unwrap();
    let outside = root.complement();
    // sqrt is undefined for x < 0, so those points lie outside the root set
    let p = Point3::new(-0.5, 0.0, 0.0);
    assert!(outside.contains(&p));
    assert!(outside.nnf().contains(&p));
    assert!(!outside.contains(&Point3::new(0.5, 0.0, 0.0)));
    assert!(engine.equal(&outside, &outside.nnf()));
    let simplified = simp(&engine, &outside).unwrap();
    assert!(engine.equal(&outside, &simplified));
}

#[test]
fn test_first_containing_selector_wins() {
    init_logger();
    let engine = VoxelEngine::new(VoxelGrid::cubic(2.0, 4));
    let halves = Puzzle::new(vec![sphere(1.0).unwrap()])
        .cross_common(&[with_exterior(halfspace(Vector3::x(), 0.0).unwrap()).to_vec()], &engine);
    let turn = Transformation::rotation(Vector3::x(), FRAC_PI_2).unwrap();
    // the upper half space meets both pieces, but the universe contains them
    let op = Operation::Selective(vec![
        (halfspace(Vector3::y(), 0.0).unwrap(), Transformation::identity()),
        (Set::Universal, turn.clone()),
    ]);
    let after = op.apply(&halves, &engine).unwrap();
    assert_eq!(after.len(), 2);
    for (before, moved) in halves.pieces().iter().zip(after.pieces()) {
        assert_eq!(*moved, Set::image(&turn, before.clone()));
        assert!(engine.equal(before, moved));
    }
}

#[test]
fn test_concatenation_on_unordered_puzzle() {
    init_logger();
    let engine = VoxelEngine::new(VoxelGrid::cubic(4.0, 4));
    let small = |c: Point3<Real>| Set::Primitive(Primitive::sphere(0.4, c).unwrap());
    let start = Puzzle::unordered(vec![small(Point3::origin()), small(Point3::new(3.0, 0.0, 0.0))]);
    let lift = Operation::Combinational(vec![
        Transformation::translation(Vector3::new(0.0, 0.0, 1.0)),
        Transformation::identity(),
    ]);
    for dy in [-2.0, -1.0, 0.5, 1.0, 2.0, 3.0] {
        let slide = Operation::Combinational(vec![
            Transformation::identity(),
            Transformation::translation(Vector3::new(0.0, dy, 0.0)),
        ]);
        // the slide may re-sort the pieces, so the lift must see the new order
        let stepwise = lift
            .apply(&slide.apply(&start, &engine).unwrap(), &engine)
            .unwrap();
        let joined = Operation::concat([slide.clone(), lift.clone()])
            .apply(&start, &engine)
            .unwrap();
        assert_eq!(stepwise, joined, "dy = {dy}");
    }
}
