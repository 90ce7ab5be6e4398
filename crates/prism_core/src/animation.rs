//! Animation and clock abstractions consumed by value slots
//!
//! The slot only needs two things from an animation: a time source telling it
//! how far along the animation is, and a function from that elapsed time (plus
//! the value the property had when the animation started) to the animated
//! value. Concrete keyframe animations and clocks live in `prism_animation`.

use std::sync::Arc;
use std::time::Duration;

/// Time source for an animation
///
/// `now` is the host's frame time passed to `digest`. A clock maps it to the
/// elapsed time of the animation it drives.
pub trait Clock: Send + Sync {
    fn elapsed_time(&self, now: Duration) -> Duration;
}

/// A time-varying value for one property type
pub trait Animation<T>: Send + Sync {
    /// Value at `elapsed`, given the value the property held when the animation attached
    fn evaluate(&self, elapsed: Duration, seed: &T) -> T;

    /// Total running time
    fn duration(&self) -> Duration;
}

/// Shared handle to an animation
pub type AnimationRef<T> = Arc<dyn Animation<T>>;

/// Shared handle to a clock
pub type ClockRef = Arc<dyn Clock>;

/// Whether two handles point at the same allocation (vtables ignored)
pub(crate) fn same_handle<A: ?Sized, B: ?Sized>(a: &Arc<A>, b: &Arc<B>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
