//! Prism Animation
//!
//! Keyframe animations and clocks that drive animated dependency property
//! values.
//!
//! # Features
//!
//! - **Keyframe Animations**: time-sorted keyframes with linear, discrete and
//!   eased (spline) segments, seeded from the property's value at attach time
//! - **Fill Modes**: hold the final keyframe or revert to the seed once the
//!   duration has passed
//! - **Clocks**: storyboard clocks latching their begin time on first use, and
//!   manual clocks for scrubbing and tests
//! - **Interpolation**: numeric, vector and color types; step interpolation
//!   for types without a midpoint

pub mod clock;
pub mod easing;
pub mod keyframe;
pub mod values;

pub use clock::{ManualClock, StoryboardClock};
pub use easing::Easing;
pub use keyframe::{
    FillMode, KeyInterpolation, Keyframe, KeyframeAnimation, KeyframeAnimationBuilder,
};
pub use values::Interpolate;
