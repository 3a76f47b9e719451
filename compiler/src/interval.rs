// interval.rs — Tracked numeric bounds for signal types
//
// An `Interval` is a closed [lo, hi] range with a validity flag. An invalid
// interval means "bounds unknown". Intervals are part of every type key, so
// equality and hashing go through a canonical bit encoding: invalid
// intervals all compare equal, NaN bounds collapse to invalid, and -0.0 is
// folded onto 0.0.
//
// Preconditions: none.
// Postconditions: every constructor returns a canonical interval.
// Failure modes: none (undefined results become invalid intervals).
// Side effects: none.

use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy)]
pub struct Interval {
    pub valid: bool,
    pub lo: f64,
    pub hi: f64,
}

fn canonical(x: f64) -> f64 {
    if x == 0.0 {
        0.0
    } else {
        x
    }
}

impl Interval {
    /// Unknown bounds.
    pub fn invalid() -> Self {
        Interval {
            valid: false,
            lo: f64::NEG_INFINITY,
            hi: f64::INFINITY,
        }
    }

    /// Valid range with the bounds in either order.
    pub fn new(a: f64, b: f64) -> Self {
        if a.is_nan() || b.is_nan() {
            return Self::invalid();
        }
        Interval {
            valid: true,
            lo: canonical(a.min(b)),
            hi: canonical(a.max(b)),
        }
    }

    pub fn point(v: f64) -> Self {
        Self::new(v, v)
    }

    /// [-inf, +inf], valid: the widest known range.
    pub fn full() -> Self {
        Self::new(f64::NEG_INFINITY, f64::INFINITY)
    }

    pub fn is_bounded(&self) -> bool {
        self.valid && self.lo.is_finite() && self.hi.is_finite()
    }

    pub fn is_point(&self) -> bool {
        self.valid && self.lo == self.hi
    }

    pub fn contains(&self, v: f64) -> bool {
        self.valid && self.lo <= v && v <= self.hi
    }

    fn is_nonneg_int_range(&self) -> bool {
        self.is_bounded() && self.lo >= 0.0
    }

    /// Same interval with a new low bound (re-normalized).
    pub fn with_lo(self, lo: f64) -> Self {
        if !self.valid {
            return self;
        }
        Self::new(lo, self.hi)
    }

    /// Same interval with a new high bound (re-normalized).
    pub fn with_hi(self, hi: f64) -> Self {
        if !self.valid {
            return self;
        }
        Self::new(self.lo, hi)
    }

    fn map2(self, other: Interval, f: impl Fn(&Interval, &Interval) -> Interval) -> Interval {
        if self.valid && other.valid {
            f(&self, &other)
        } else {
            Interval::invalid()
        }
    }

    fn from_corners(corners: [f64; 4]) -> Interval {
        if corners.iter().any(|c| c.is_nan()) {
            return Interval::invalid();
        }
        let lo = corners.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = corners.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Interval::new(lo, hi)
    }

    // ── Lattice operations ───────────────────────────────────────────────

    /// Smallest interval containing both. Unknown bounds absorb.
    pub fn reunion(self, other: Interval) -> Interval {
        self.map2(other, |a, b| Interval::new(a.lo.min(b.lo), a.hi.max(b.hi)))
    }

    /// Largest interval contained in both. An unknown operand yields the
    /// other one; disjoint operands yield unknown bounds.
    pub fn intersection(self, other: Interval) -> Interval {
        match (self.valid, other.valid) {
            (true, true) => {
                let lo = self.lo.max(other.lo);
                let hi = self.hi.min(other.hi);
                if lo > hi {
                    Interval::invalid()
                } else {
                    Interval::new(lo, hi)
                }
            }
            (true, false) => self,
            _ => other,
        }
    }

    // ── Arithmetic ───────────────────────────────────────────────────────

    pub fn add(self, other: Interval) -> Interval {
        self.map2(other, |a, b| Interval::new(a.lo + b.lo, a.hi + b.hi))
    }

    pub fn sub(self, other: Interval) -> Interval {
        self.map2(other, |a, b| Interval::new(a.lo - b.hi, a.hi - b.lo))
    }

    pub fn mul(self, other: Interval) -> Interval {
        self.map2(other, |a, b| {
            let m = |x: f64, y: f64| if x == 0.0 || y == 0.0 { 0.0 } else { x * y };
            Interval::from_corners([m(a.lo, b.lo), m(a.lo, b.hi), m(a.hi, b.lo), m(a.hi, b.hi)])
        })
    }

    pub fn div(self, other: Interval) -> Interval {
        self.map2(other, |a, b| {
            if b.contains(0.0) {
                Interval::invalid()
            } else {
                a.mul(Interval::new(1.0 / b.lo, 1.0 / b.hi))
            }
        })
    }

    /// Remainder: magnitude below the divisor's magnitude, sign of the dividend.
    pub fn rem(self, other: Interval) -> Interval {
        self.map2(other, |a, b| {
            let m = b.lo.abs().max(b.hi.abs());
            if m == 0.0 || !m.is_finite() && !a.is_bounded() {
                return Interval::invalid();
            }
            let lo = if a.lo >= 0.0 { 0.0 } else { a.lo.max(-m) };
            let hi = if a.hi <= 0.0 { 0.0 } else { a.hi.min(m) };
            Interval::new(lo, hi)
        })
    }

    pub fn shl(self, other: Interval) -> Interval {
        self.map2(other, |a, b| {
            if !b.is_bounded() || b.lo < 0.0 || b.hi >= 64.0 {
                return Interval::invalid();
            }
            a.mul(Interval::new(b.lo.floor().exp2(), b.hi.floor().exp2()))
        })
    }

    /// Arithmetic right shift: floor division by a power of two.
    pub fn shr(self, other: Interval) -> Interval {
        self.map2(other, |a, b| {
            if !b.is_bounded() || b.lo < 0.0 {
                return Interval::invalid();
            }
            let scaled = a.mul(Interval::new(
                (-b.lo.floor()).exp2(),
                (-b.hi.min(64.0).floor()).exp2(),
            ));
            Interval::new(scaled.lo.floor(), scaled.hi.floor())
        })
    }

    // ── Comparisons: always [0, 1], a point when the answer is decided ──

    fn decided(yes: bool, no: bool) -> Interval {
        if yes {
            Interval::point(1.0)
        } else if no {
            Interval::point(0.0)
        } else {
            Interval::new(0.0, 1.0)
        }
    }

    fn compare(self, other: Interval, f: impl Fn(&Interval, &Interval) -> Interval) -> Interval {
        if self.valid && other.valid {
            f(&self, &other)
        } else {
            Interval::new(0.0, 1.0)
        }
    }

    pub fn greater(self, other: Interval) -> Interval {
        self.compare(other, |a, b| Self::decided(a.lo > b.hi, a.hi <= b.lo))
    }

    pub fn less(self, other: Interval) -> Interval {
        other.greater(self)
    }

    pub fn greater_eq(self, other: Interval) -> Interval {
        self.compare(other, |a, b| Self::decided(a.lo >= b.hi, a.hi < b.lo))
    }

    pub fn less_eq(self, other: Interval) -> Interval {
        other.greater_eq(self)
    }

    pub fn equal(self, other: Interval) -> Interval {
        self.compare(other, |a, b| {
            Self::decided(
                a.is_point() && b.is_point() && a.lo == b.lo,
                a.hi < b.lo || b.hi < a.lo,
            )
        })
    }

    pub fn not_equal(self, other: Interval) -> Interval {
        let e = self.equal(other);
        Interval::new(1.0 - e.hi, 1.0 - e.lo)
    }

    // ── Bitwise: only tracked for non-negative bounded operands ─────────

    fn bit_ceiling(x: f64) -> f64 {
        let n = x.max(0.0) as u64;
        match n.saturating_add(1).checked_next_power_of_two() {
            Some(p) => (p - 1) as f64,
            None => u64::MAX as f64,
        }
    }

    pub fn and(self, other: Interval) -> Interval {
        if self.is_nonneg_int_range() && other.is_nonneg_int_range() {
            Interval::new(0.0, self.hi.min(other.hi).floor())
        } else {
            Interval::invalid()
        }
    }

    pub fn or(self, other: Interval) -> Interval {
        if self.is_nonneg_int_range() && other.is_nonneg_int_range() {
            Interval::new(
                self.lo.max(other.lo).floor(),
                Self::bit_ceiling(self.hi.max(other.hi)),
            )
        } else {
            Interval::invalid()
        }
    }

    pub fn xor(self, other: Interval) -> Interval {
        if self.is_nonneg_int_range() && other.is_nonneg_int_range() {
            Interval::new(0.0, Self::bit_ceiling(self.hi.max(other.hi)))
        } else {
            Interval::invalid()
        }
    }

    // ── Unary functions used by extended primitives ─────────────────────

    pub fn abs(self) -> Interval {
        if !self.valid {
            return self;
        }
        if self.lo >= 0.0 {
            self
        } else if self.hi <= 0.0 {
            Interval::new(-self.hi, -self.lo)
        } else {
            Interval::new(0.0, self.hi.max(-self.lo))
        }
    }

    /// Image under a monotonically increasing function.
    pub fn map_increasing(self, f: impl Fn(f64) -> f64) -> Interval {
        if !self.valid {
            return self;
        }
        Interval::new(f(self.lo), f(self.hi))
    }

    pub fn min(self, other: Interval) -> Interval {
        self.map2(other, |a, b| Interval::new(a.lo.min(b.lo), a.hi.min(b.hi)))
    }

    pub fn max(self, other: Interval) -> Interval {
        self.map2(other, |a, b| Interval::new(a.lo.max(b.lo), a.hi.max(b.hi)))
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self::invalid()
    }
}

impl PartialEq for Interval {
    fn eq(&self, other: &Self) -> bool {
        match (self.valid, other.valid) {
            (false, false) => true,
            (true, true) => self.lo.to_bits() == other.lo.to_bits() && self.hi.to_bits() == other.hi.to_bits(),
            _ => false,
        }
    }
}

impl Eq for Interval {}

impl Hash for Interval {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.valid.hash(state);
        if self.valid {
            self.lo.to_bits().hash(state);
            self.hi.to_bits().hash(state);
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            write!(f, "[{}, {}]", self.lo, self.hi)
        } else {
            write!(f, "[?]")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(lo: f64, hi: f64) -> Interval {
        Interval::new(lo, hi)
    }

    #[test]
    fn canonical_forms() {
        assert_eq!(Interval::point(-0.0), Interval::point(0.0));
        assert_eq!(Interval::new(f64::NAN, 1.0), Interval::invalid());
        assert_eq!(iv(3.0, 1.0), iv(1.0, 3.0));
        assert_ne!(Interval::full(), Interval::invalid());
    }

    #[test]
    fn reunion_absorbs_unknown() {
        assert_eq!(iv(0.0, 1.0).reunion(iv(3.0, 4.0)), iv(0.0, 4.0));
        assert_eq!(iv(0.0, 1.0).reunion(Interval::invalid()), Interval::invalid());
    }

    #[test]
    fn intersection_prefers_known_bounds() {
        assert_eq!(iv(0.0, 5.0).intersection(iv(3.0, 9.0)), iv(3.0, 5.0));
        assert_eq!(Interval::invalid().intersection(iv(1.0, 2.0)), iv(1.0, 2.0));
        assert_eq!(iv(0.0, 1.0).intersection(iv(2.0, 3.0)), Interval::invalid());
    }

    #[test]
    fn arithmetic_table() {
        assert_eq!(iv(1.0, 2.0).add(iv(10.0, 20.0)), iv(11.0, 22.0));
        assert_eq!(iv(1.0, 2.0).sub(iv(10.0, 20.0)), iv(-19.0, -8.0));
        assert_eq!(iv(-1.0, 2.0).mul(iv(3.0, 4.0)), iv(-4.0, 8.0));
        assert_eq!(iv(0.0, 0.0).mul(Interval::full()), iv(0.0, 0.0));
        assert_eq!(iv(1.0, 2.0).div(iv(2.0, 4.0)), iv(0.25, 1.0));
        assert_eq!(iv(1.0, 2.0).div(iv(-1.0, 1.0)), Interval::invalid());
        assert_eq!(iv(0.0, 100.0).rem(iv(8.0, 8.0)), iv(0.0, 8.0));
        assert_eq!(iv(1.0, 3.0).shl(iv(2.0, 2.0)), iv(4.0, 12.0));
        assert_eq!(iv(8.0, 17.0).shr(iv(1.0, 1.0)), iv(4.0, 8.0));
    }

    #[test]
    fn comparisons_are_boolean_ranges() {
        assert_eq!(iv(0.0, 1.0).less(iv(5.0, 6.0)), Interval::point(1.0));
        assert_eq!(iv(0.0, 10.0).less(iv(5.0, 6.0)), iv(0.0, 1.0));
        assert_eq!(iv(7.0, 8.0).less(iv(5.0, 6.0)), Interval::point(0.0));
        assert_eq!(Interval::invalid().equal(iv(1.0, 1.0)), iv(0.0, 1.0));
        assert_eq!(iv(2.0, 2.0).not_equal(iv(2.0, 2.0)), Interval::point(0.0));
    }

    #[test]
    fn bitwise_needs_nonnegative_bounds() {
        assert_eq!(iv(0.0, 5.0).and(iv(0.0, 3.0)), iv(0.0, 3.0));
        assert_eq!(iv(0.0, 5.0).or(iv(0.0, 3.0)), iv(0.0, 7.0));
        assert_eq!(iv(-1.0, 5.0).xor(iv(0.0, 3.0)), Interval::invalid());
    }

    #[test]
    fn abs_folds_negative_side() {
        assert_eq!(iv(-3.0, 2.0).abs(), iv(0.0, 3.0));
        assert_eq!(iv(-3.0, -2.0).abs(), iv(2.0, 3.0));
        assert_eq!(Interval::invalid().abs(), Interval::invalid());
    }

    #[test]
    fn display() {
        assert_eq!(iv(0.0, 1.5).to_string(), "[0, 1.5]");
        assert_eq!(Interval::invalid().to_string(), "[?]");
    }
}
