//! Toroidal one-dimensional world geometry.
//!
//! Positions live on a circle of circumference `world_size`: moving past the eastern edge
//! re-enters from the western edge. Everything that moves (the agent and every particle)
//! is wrapped through [`wrap_position`] so that `0 <= position < world_size` always holds.

/// Wrap a position into `[0, world_size)` using a true (non-negative) modulo.
///
/// `f64::rem_euclid` can round a tiny negative input up to exactly `world_size`; that case
/// is folded back to `0.0` so the half-open range is preserved.
///
/// # Panics
/// If `world_size` is not strictly positive and finite.
pub fn wrap_position(position: f64, world_size: f64) -> f64 {
    assert!(
        world_size.is_finite() && world_size > 0.0,
        "World size must be finite and positive, got {world_size}"
    );
    let wrapped = position.rem_euclid(world_size);
    if wrapped >= world_size { 0.0 } else { wrapped }
}

/// Shortest signed offset `to - from` on the circle, in `[-world_size / 2, world_size / 2)`.
pub fn signed_offset(from: f64, to: f64, world_size: f64) -> f64 {
    let half = world_size / 2.0;
    wrap_position(to - from + half, world_size) - half
}

/// Shortest distance between two positions on the circle.
pub fn toroidal_distance(a: f64, b: f64, world_size: f64) -> f64 {
    signed_offset(a, b, world_size).abs()
}
