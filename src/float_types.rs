// Re-export parry for the f64 build
pub use parry3d_f64 as parry3d;

// Our Real scalar type:
pub type Real = f64;

/// A small epsilon for geometric comparisons.
pub const EPSILON: Real = 1e-10;

// Pi
pub const PI: Real = core::f64::consts::PI;

// Frac Pi 2
pub const FRAC_PI_2: Real = core::f64::consts::FRAC_PI_2;

// Tau
pub const TAU: Real = core::f64::consts::TAU;

/// Number of fractional decimal digits kept by [`snap`].
const SNAP_SCALE: Real = 1e9;

/// Round a parameter onto a fixed decimal lattice so that values which only
/// differ by floating-point noise hash and compare equal.
///
/// `-0.0` is folded to `0.0` and the rounding is symmetric around zero, so
/// `snap(-x) == -snap(x)` holds for every finite `x`.
#[inline]
pub fn snap(x: Real) -> Real {
    if !x.is_finite() {
        return x;
    }
    let r = (x * SNAP_SCALE).round() / SNAP_SCALE;
    if r == 0.0 { 0.0 } else { r }
}

/// Approximate float equality with an absolute tolerance.
#[inline]
pub fn approx_eq(a: Real, b: Real, eps: Real) -> bool {
    (a - b).abs() < eps
}
