//! Keyframe animations
//!
//! A [`KeyframeAnimation`] is a time-sorted list of keyframes. At elapsed time
//! `τ` it finds the bracketing pair, the last keyframe at or before `τ` and the
//! first one after it, and interpolates between them according to the second
//! keyframe's interpolation mode. Before the first keyframe the value the
//! property held when the animation attached (the *seed*) stands in for the
//! missing start. A keyframe without a value also uses the seed.
//!
//! ```ignore
//! let fade = KeyframeAnimation::builder()
//!     .at(Duration::from_millis(0), 0.0f32)
//!     .eased_at(Duration::from_millis(300), 1.0, Easing::EaseOut)
//!     .fill(FillMode::HoldEnd)
//!     .build();
//! element.animate(&OPACITY, fade.into_ref(), StoryboardClock::new().into_ref());
//! ```

use std::sync::Arc;
use std::time::Duration;

use smallvec::SmallVec;

use prism_core::{Animation, AnimationRef, PropertyType};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::easing::Easing;
use crate::values::Interpolate;

/// What happens once the animation's duration has passed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FillMode {
    /// Keep the final keyframe's value
    #[default]
    HoldEnd,
    /// Revert to the seed value
    Stop,
}

/// How a keyframe is reached from the one before it
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum KeyInterpolation {
    #[default]
    Linear,
    /// Jump to the value when its time is reached
    Discrete,
    /// Shaped progress; `Easing::CubicBezier` gives spline keyframes
    Eased(Easing),
}

/// A single keyframe
#[derive(Clone, Debug, PartialEq)]
pub struct Keyframe<T> {
    pub time: Duration,
    /// `None` means "the seed value"
    pub value: Option<T>,
    pub interpolation: KeyInterpolation,
}

impl<T> Keyframe<T> {
    pub fn new(time: Duration, value: Option<T>, interpolation: KeyInterpolation) -> Self {
        Self {
            time,
            value,
            interpolation,
        }
    }

    pub fn linear(time: Duration, value: T) -> Self {
        Self::new(time, Some(value), KeyInterpolation::Linear)
    }

    pub fn discrete(time: Duration, value: T) -> Self {
        Self::new(time, Some(value), KeyInterpolation::Discrete)
    }

    pub fn eased(time: Duration, value: T, easing: Easing) -> Self {
        Self::new(time, Some(value), KeyInterpolation::Eased(easing))
    }

    /// Spline keyframe with Bézier control points `(x1, y1)`, `(x2, y2)`
    pub fn spline(time: Duration, value: T, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::eased(time, value, Easing::CubicBezier(x1, y1, x2, y2))
    }

    /// Keyframe returning to the seed value
    pub fn seed(time: Duration, interpolation: KeyInterpolation) -> Self {
        Self::new(time, None, interpolation)
    }

    fn value_or<'a>(&'a self, seed: &'a T) -> &'a T {
        self.value.as_ref().unwrap_or(seed)
    }
}

/// A keyframe sequence for one property type
pub struct KeyframeAnimation<T> {
    keyframes: SmallVec<[Keyframe<T>; 4]>,
    fill: FillMode,
    duration: Duration,
    /// Resolved once from the value type
    lerp: fn(&T, &T, f32) -> T,
}

impl<T: Interpolate + PropertyType> KeyframeAnimation<T> {
    pub fn builder() -> KeyframeAnimationBuilder<T> {
        KeyframeAnimationBuilder::new()
    }

    /// Build from keyframes with the default fill and duration
    pub fn new(keyframes: impl IntoIterator<Item = Keyframe<T>>) -> Self {
        let mut builder = Self::builder();
        builder.keyframes.extend(keyframes);
        builder.build()
    }

    pub fn keyframes(&self) -> &[Keyframe<T>] {
        &self.keyframes
    }

    pub fn fill(&self) -> FillMode {
        self.fill
    }

    pub fn into_ref(self) -> AnimationRef<T> {
        Arc::new(self)
    }

    /// Value at `elapsed` given the seed
    pub fn value_at(&self, elapsed: Duration, seed: &T) -> T {
        let Some(last) = self.keyframes.last() else {
            return seed.clone();
        };

        if elapsed > self.duration {
            return match self.fill {
                FillMode::HoldEnd => last.value_or(seed).clone(),
                FillMode::Stop => seed.clone(),
            };
        }

        let kfs = &self.keyframes;
        let mut idx = kfs.partition_point(|kf| kf.time < elapsed);
        if idx == kfs.len() {
            // Past the last keyframe, inside the duration
            return last.value_or(seed).clone();
        }
        // Several keyframes at exactly `elapsed`: the last one wins
        while idx + 1 < kfs.len() && kfs[idx].time == elapsed && kfs[idx + 1].time == elapsed {
            idx += 1;
        }

        let to = &kfs[idx];
        let (start, from) = match idx.checked_sub(1) {
            Some(prev) => (kfs[prev].time, kfs[prev].value_or(seed)),
            None => (Duration::ZERO, seed),
        };
        let target = to.value_or(seed);

        let span = to.time.saturating_sub(start);
        if span.is_zero() {
            return target.clone();
        }
        let factor = elapsed.saturating_sub(start).as_secs_f32() / span.as_secs_f32();

        match to.interpolation {
            KeyInterpolation::Linear => (self.lerp)(from, target, factor),
            KeyInterpolation::Discrete => {
                if factor >= 1.0 {
                    target.clone()
                } else {
                    from.clone()
                }
            }
            KeyInterpolation::Eased(easing) => (self.lerp)(from, target, easing.apply(factor)),
        }
    }
}

impl<T: Interpolate + PropertyType> Animation<T> for KeyframeAnimation<T> {
    fn evaluate(&self, elapsed: Duration, seed: &T) -> T {
        self.value_at(elapsed, seed)
    }

    fn duration(&self) -> Duration {
        self.duration
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for KeyframeAnimation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyframeAnimation")
            .field("keyframes", &self.keyframes)
            .field("fill", &self.fill)
            .field("duration", &self.duration)
            .finish()
    }
}

/// Builder for [`KeyframeAnimation`]
pub struct KeyframeAnimationBuilder<T> {
    keyframes: SmallVec<[Keyframe<T>; 4]>,
    fill: FillMode,
    duration: Option<Duration>,
}

impl<T: Interpolate + PropertyType> KeyframeAnimationBuilder<T> {
    pub fn new() -> Self {
        Self {
            keyframes: SmallVec::new(),
            fill: FillMode::default(),
            duration: None,
        }
    }

    pub fn keyframe(mut self, keyframe: Keyframe<T>) -> Self {
        self.keyframes.push(keyframe);
        self
    }

    /// Linear keyframe
    pub fn at(self, time: Duration, value: T) -> Self {
        self.keyframe(Keyframe::linear(time, value))
    }

    pub fn discrete_at(self, time: Duration, value: T) -> Self {
        self.keyframe(Keyframe::discrete(time, value))
    }

    pub fn eased_at(self, time: Duration, value: T, easing: Easing) -> Self {
        self.keyframe(Keyframe::eased(time, value, easing))
    }

    pub fn fill(mut self, fill: FillMode) -> Self {
        self.fill = fill;
        self
    }

    /// Total duration; defaults to the last keyframe's time
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn build(self) -> KeyframeAnimation<T> {
        let mut keyframes = self.keyframes;
        // Stable: keyframes sharing a time keep their declaration order
        keyframes.sort_by_key(|kf| kf.time);
        let duration = self
            .duration
            .or_else(|| keyframes.last().map(|kf| kf.time))
            .unwrap_or_default();
        tracing::debug!(
            keyframes = keyframes.len(),
            ?duration,
            fill = ?self.fill,
            "built keyframe animation"
        );
        KeyframeAnimation {
            keyframes,
            fill: self.fill,
            duration,
            lerp: T::lerp,
        }
    }
}

impl<T: Interpolate + PropertyType> Default for KeyframeAnimationBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
