//! Animatable value types
//!
//! Linear interpolation for the numeric, vector and color property types.
//! Types without a meaningful midpoint (booleans, strings) step: they hold the
//! start value until the segment completes.

use prism_core::{Color, Vec2};

/// Trait for values that can be linearly interpolated
pub trait Interpolate: Clone {
    /// Interpolate between self and other by factor t (0.0 to 1.0)
    fn lerp(&self, other: &Self, t: f32) -> Self;
}

// ============================================================================
// Numeric
// ============================================================================

impl Interpolate for f32 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Interpolate for f64 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t as f64
    }
}

impl Interpolate for i32 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        (*self as f64 + (*other as f64 - *self as f64) * t as f64).round() as i32
    }
}

impl Interpolate for i64 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        (*self as f64 + (*other as f64 - *self as f64) * t as f64).round() as i64
    }
}

// ============================================================================
// Vector / Color
// ============================================================================

impl Interpolate for Vec2 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Vec2::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

impl Interpolate for Color {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Color::lerp(self, other, t)
    }
}

// ============================================================================
// Discrete
// ============================================================================

fn step<T: Clone>(from: &T, to: &T, t: f32) -> T {
    if t >= 1.0 {
        to.clone()
    } else {
        from.clone()
    }
}

impl Interpolate for bool {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        step(self, other, t)
    }
}

impl Interpolate for String {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        step(self, other, t)
    }
}

/// Interpolates when both ends are present, steps otherwise
impl<T: Interpolate> Interpolate for Option<T> {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        match (self, other) {
            (Some(a), Some(b)) => Some(a.lerp(b, t)),
            _ => step(self, other, t),
        }
    }
}
