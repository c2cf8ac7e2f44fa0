//! Small numeric helpers shared by the games.

/// Normalize an angle in degrees to the range `[0, 360)`.
///
/// Non-finite input comes back as NaN.
pub fn normalize_angle(angle: f64) -> f64 {
    let mut angle = angle % 360.0;
    if angle < 0.0 {
        angle += 360.0;
        // A tiny negative angle rounds up to a full turn.
        if angle >= 360.0 {
            angle = 0.0;
        }
    }
    angle
}
