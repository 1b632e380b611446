//! Numeric capability trait for aggregatable value types.
//!
//! Aggregation algorithms are generic over a single [`Numeric`] trait rather
//! than inspecting types at runtime. Integral instantiations report
//! `is_nan() == false` statically, so NaN handling compiles away for them.

use std::fmt::Debug;

/// Capabilities required of a value type fed into an aggregation algorithm.
///
/// Implemented for the signed integral and floating-point primitives.
pub trait Numeric:
    Copy + PartialOrd + Debug + Send + Sync + 'static
{
    /// Whether this type is an integral kind. Integral results are rounded
    /// to the nearest integer after noise addition.
    const IS_INTEGRAL: bool;

    /// The additive identity.
    fn zero() -> Self;

    /// The largest finite representable value.
    fn max_finite() -> Self;

    /// Whether the value is not-a-number. Statically false for integral types.
    fn is_nan(self) -> bool;

    /// Lossy conversion to `f64` for sensitivity and noise arithmetic.
    fn to_f64(self) -> f64;

    /// Conversion back from `f64`, rounding to the nearest integer for
    /// integral types and saturating at the representable range.
    fn from_f64(value: f64) -> Self;

    /// Addition that saturates instead of overflowing for integral types.
    fn saturating_add(self, rhs: Self) -> Self;

    /// Negation that saturates at `max_finite` for integral types.
    fn saturating_neg(self) -> Self;

    /// Whether negating this value would exceed the representable range,
    /// i.e. `self < -max_finite()`.
    fn negation_overflows(self) -> bool;
}

macro_rules! impl_numeric_int {
    ($($t:ty),*) => {$(
        impl Numeric for $t {
            const IS_INTEGRAL: bool = true;

            fn zero() -> Self {
                0
            }

            fn max_finite() -> Self {
                <$t>::MAX
            }

            fn is_nan(self) -> bool {
                false
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(value: f64) -> Self {
                // Saturating cast; NaN maps to zero.
                value.round() as $t
            }

            fn saturating_add(self, rhs: Self) -> Self {
                <$t>::saturating_add(self, rhs)
            }

            fn saturating_neg(self) -> Self {
                self.checked_neg().unwrap_or(<$t>::MAX)
            }

            fn negation_overflows(self) -> bool {
                self.checked_neg().is_none()
            }
        }
    )*};
}

macro_rules! impl_numeric_float {
    ($($t:ty),*) => {$(
        impl Numeric for $t {
            const IS_INTEGRAL: bool = false;

            fn zero() -> Self {
                0.0
            }

            fn max_finite() -> Self {
                <$t>::MAX
            }

            fn is_nan(self) -> bool {
                <$t>::is_nan(self)
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(value: f64) -> Self {
                value as $t
            }

            fn saturating_add(self, rhs: Self) -> Self {
                self + rhs
            }

            fn saturating_neg(self) -> Self {
                -self
            }

            fn negation_overflows(self) -> bool {
                self < -<$t>::MAX
            }
        }
    )*};
}

impl_numeric_int!(i8, i16, i32, i64);
impl_numeric_float!(f32, f64);

/// Restrict `value` to the closed range `[lower, upper]`.
pub fn clamp<T: Numeric>(lower: T, upper: T, value: T) -> T {
    if value < lower {
        lower
    } else if value > upper {
        upper
    } else {
        value
    }
}
