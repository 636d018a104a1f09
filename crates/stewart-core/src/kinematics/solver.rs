// Closed-form rotary-actuator IK
//
// For each leg: rotate the platform joint by the pose orientation (ZYX,
// yaw * pitch * roll), translate, then solve the arm angle from
//   e = 2 L1 lz,  f = 2 L1 (cos b lx + sin b ly),  g = |l|^2 - (L2^2 - L1^2)
//   alpha = asin(g / sqrt(e^2 + f^2)) - atan2(f, e)

use super::{ActuatorDef, PlatformGeometry, ValidityMask};
use crate::{AXIS_COUNT, ActuatorAngles, Pose};

/// Pre-clamp result for a single leg.
#[derive(Debug, Clone, Copy)]
struct LegSolution {
    angle: f64,
    reachable: bool,
}

/// Orientation of the pose as a rotation matrix (ZYX).
fn rotation(pose: &Pose) -> [[f64; 3]; 3] {
    let [_, _, _, roll, pitch, yaw] = pose.0;
    let (sr, cr) = roll.sin_cos();
    let (sp, cp) = pitch.sin_cos();
    let (sy, cy) = yaw.sin_cos();
    [
        [cy * cp, cy * sp * sr - sy * cr, cy * sp * cr + sy * sr],
        [sy * cp, sy * sp * sr + cy * cr, sy * sp * cr - cy * sr],
        [-sp, cp * sr, cp * cr],
    ]
}

fn solve_leg(
    pose: &Pose,
    rot: &[[f64; 3]; 3],
    home_height: f64,
    act: &ActuatorDef,
) -> LegSolution {
    let p = act.platform_joint;
    let offset = [pose.0[0], pose.0[1], pose.0[2] + home_height];

    let mut leg = [0.0; 3];
    for (i, row) in rot.iter().enumerate() {
        let joint = row[0] * p[0] + row[1] * p[1] + row[2] * p[2] + offset[i];
        leg[i] = joint - act.base_joint[i];
    }

    let [lx, ly, lz] = leg;
    let (l1, l2) = (act.arm_length, act.rod_length);
    let (sb, cb) = act.beta.sin_cos();

    let e = 2.0 * l1 * lz;
    let f = 2.0 * l1 * (cb * lx + sb * ly);
    let g = lx * lx + ly * ly + lz * lz - (l2 * l2 - l1 * l1);

    let ef = (e * e + f * f).sqrt();
    let (arg, reachable) = if ef > 0.0 {
        let arg = g / ef;
        (arg.clamp(-1.0, 1.0), (-1.0..=1.0).contains(&arg))
    } else {
        // Degenerate leg: no direction to swing the arm in
        (0.0, false)
    };

    LegSolution {
        angle: arg.asin() - f.atan2(e),
        reachable,
    }
}

fn solve_raw(pose: &Pose, geometry: &PlatformGeometry) -> [LegSolution; AXIS_COUNT] {
    let rot = rotation(pose);
    std::array::from_fn(|k| solve_leg(pose, &rot, geometry.home_height, &geometry.actuators[k]))
}

/// Solve and report which actuators are out of range in one pass.
pub fn solve_checked(pose: &Pose, geometry: &PlatformGeometry) -> (ActuatorAngles, ValidityMask) {
    let (min, max) = (geometry.servo_min, geometry.servo_max);
    let mut mask = ValidityMask::new();
    let mut angles = [0.0; AXIS_COUNT];

    for (k, leg) in solve_raw(pose, geometry).into_iter().enumerate() {
        if !leg.angle.is_finite() {
            mask = mask.with(k);
            angles[k] = 0.0_f64.clamp(min, max);
            continue;
        }
        if !leg.reachable || leg.angle <= min || leg.angle >= max {
            mask = mask.with(k);
        }
        angles[k] = leg.angle.clamp(min, max);
    }

    (ActuatorAngles(angles), mask)
}

/// Six actuator angles for `pose`, each clamped into the servo range.
pub fn solve(pose: &Pose, geometry: &PlatformGeometry) -> ActuatorAngles {
    solve_checked(pose, geometry).0
}

/// Bit k set when actuator k is at or beyond its limit, or cannot reach.
pub fn validate(pose: &Pose, geometry: &PlatformGeometry) -> ValidityMask {
    solve_checked(pose, geometry).1
}
