//! Math utilities and types
//!
//! 2D aliases over nalgebra plus the interpolation helpers the render
//! scheduler relies on.

pub use nalgebra::{Matrix3, Vector2};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 2D point type
pub type Point2 = nalgebra::Point2<f32>;

/// 3x3 matrix type (2D homogeneous transforms)
pub type Mat3 = Matrix3<f32>;

/// Linear interpolation between two scalars
pub fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}

/// Linear interpolation between two vectors
pub fn lerp_vec2(from: &Vec2, to: &Vec2, t: f32) -> Vec2 {
    from.lerp(to, t)
}

/// Interpolate between two angles (radians) along the shortest arc
pub fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    let mut delta = (to - from) % TAU;
    if delta > PI {
        delta -= TAU;
    } else if delta < -PI {
        delta += TAU;
    }
    from + delta * t
}
