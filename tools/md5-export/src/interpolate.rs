//! Keyframe interpolation
//!
//! Shared by the scene document and glTF adapters to evaluate sparse
//! translation/rotation/scale keys at arbitrary sample times.

use glam::{Quat, Vec3};

/// How values between two keys are derived
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    #[default]
    Linear,
    /// Hold the previous key until the next one
    Step,
}

/// Find the key pair surrounding `t` and the blend factor between them
///
/// Returns `None` when `t` is past the last key (or there is only one key),
/// in which case the last value applies.
fn bracket(times: &[f32], t: f32, interp: Interpolation) -> Option<(usize, f32)> {
    let mut i = 0;
    while i < times.len() - 1 && times[i + 1] <= t {
        i += 1;
    }

    if i >= times.len() - 1 {
        return None;
    }

    let t0 = times[i];
    let t1 = times[i + 1];
    let factor = match interp {
        Interpolation::Step => 0.0,
        Interpolation::Linear if t1 > t0 => ((t - t0) / (t1 - t0)).clamp(0.0, 1.0),
        Interpolation::Linear => 0.0,
    };
    Some((i, factor))
}

pub fn interpolate_vec3(times: &[f32], values: &[Vec3], t: f32, interp: Interpolation) -> Option<Vec3> {
    if times.is_empty() || values.len() < times.len() {
        return None;
    }
    if t <= times[0] {
        return Some(values[0]);
    }

    Some(match bracket(times, t, interp) {
        Some((i, factor)) => values[i].lerp(values[i + 1], factor),
        None => values[times.len() - 1],
    })
}

pub fn interpolate_quat(times: &[f32], values: &[Quat], t: f32, interp: Interpolation) -> Option<Quat> {
    if times.is_empty() || values.len() < times.len() {
        return None;
    }
    if t <= times[0] {
        return Some(values[0].normalize());
    }

    Some(match bracket(times, t, interp) {
        Some((i, factor)) => slerp(values[i], values[i + 1], factor),
        None => values[times.len() - 1].normalize(),
    })
}

/// Shortest-path spherical interpolation
fn slerp(q0: Quat, q1: Quat, t: f32) -> Quat {
    let q1 = if q0.dot(q1) < 0.0 { -q1 } else { q1 };
    q0.normalize().slerp(q1.normalize(), t).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_linear_midpoint() {
        let times = [0.0, 1.0];
        let values = [Vec3::ZERO, Vec3::new(2.0, 4.0, 6.0)];
        let v = interpolate_vec3(&times, &values, 0.5, Interpolation::Linear).unwrap();
        assert!(v.abs_diff_eq(Vec3::new(1.0, 2.0, 3.0), 1e-6));
    }

    #[test]
    fn test_vec3_clamps_outside_range() {
        let times = [1.0, 2.0];
        let values = [Vec3::X, Vec3::Y];
        assert_eq!(interpolate_vec3(&times, &values, 0.0, Interpolation::Linear), Some(Vec3::X));
        assert_eq!(interpolate_vec3(&times, &values, 5.0, Interpolation::Linear), Some(Vec3::Y));
    }

    #[test]
    fn test_vec3_step_holds_previous() {
        let times = [0.0, 1.0, 2.0];
        let values = [Vec3::X, Vec3::Y, Vec3::Z];
        let v = interpolate_vec3(&times, &values, 1.9, Interpolation::Step).unwrap();
        assert_eq!(v, Vec3::Y);
    }

    #[test]
    fn test_vec3_exact_key_time() {
        let times = [0.0, 1.0, 2.0];
        let values = [Vec3::X, Vec3::Y, Vec3::Z];
        let v = interpolate_vec3(&times, &values, 1.0, Interpolation::Linear).unwrap();
        assert!(v.abs_diff_eq(Vec3::Y, 1e-6));
    }

    #[test]
    fn test_empty_keys() {
        assert_eq!(interpolate_vec3(&[], &[], 0.0, Interpolation::Linear), None);
        assert_eq!(interpolate_quat(&[], &[], 0.0, Interpolation::Linear), None);
    }

    #[test]
    fn test_quat_slerp_midpoint() {
        let times = [0.0, 1.0];
        let values = [Quat::IDENTITY, Quat::from_rotation_z(std::f32::consts::FRAC_PI_2)];
        let q = interpolate_quat(&times, &values, 0.5, Interpolation::Linear).unwrap();
        let expected = Quat::from_rotation_z(std::f32::consts::FRAC_PI_4);
        assert!(q.abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn test_quat_shortest_path() {
        // Same rotation with opposite signs must not swing through 360 degrees
        let q = Quat::from_rotation_x(0.2);
        let times = [0.0, 1.0];
        let values = [q, -q];
        let mid = interpolate_quat(&times, &values, 0.5, Interpolation::Linear).unwrap();
        assert!(mid.abs_diff_eq(q, 1e-5));
    }
}
