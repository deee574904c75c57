//! Scalar-first quaternion helpers for placing boxes in the global frame.

use std::ops::Mul;

use crate::types::{Quat, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    pub const IDENTITY: Self = Self {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn from_wxyz(q: Quat) -> Self {
        Self {
            w: q[0],
            x: q[1],
            y: q[2],
            z: q[3],
        }
    }

    pub fn to_wxyz(self) -> Quat {
        [self.w, self.x, self.y, self.z]
    }

    /// Rotation from intrinsic Euler angles in radians, applied yaw (z), then
    /// pitch (y), then roll (x).
    pub fn from_euler(roll: f64, pitch: f64, yaw: f64) -> Self {
        let (sr, cr) = (roll * 0.5).sin_cos();
        let (sp, cp) = (pitch * 0.5).sin_cos();
        let (sy, cy) = (yaw * 0.5).sin_cos();

        Self {
            w: cr * cp * cy + sr * sp * sy,
            x: sr * cp * cy - cr * sp * sy,
            y: cr * sp * cy + sr * cp * sy,
            z: cr * cp * sy - sr * sp * cy,
        }
    }

    pub fn norm(self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit quaternion; a zero quaternion normalizes to identity.
    pub fn normalized(self) -> Self {
        let n = self.norm();
        if n == 0.0 {
            return Self::IDENTITY;
        }
        Self {
            w: self.w / n,
            x: self.x / n,
            y: self.y / n,
            z: self.z / n,
        }
    }

    /// 3x3 rotation matrix, row-major.
    pub fn to_mat3(self) -> [[f64; 3]; 3] {
        let Self { w, x, y, z } = self.normalized();
        [
            [
                1.0 - 2.0 * (y * y + z * z),
                2.0 * (x * y - z * w),
                2.0 * (x * z + y * w),
            ],
            [
                2.0 * (x * y + z * w),
                1.0 - 2.0 * (x * x + z * z),
                2.0 * (y * z - x * w),
            ],
            [
                2.0 * (x * z - y * w),
                2.0 * (y * z + x * w),
                1.0 - 2.0 * (x * x + y * y),
            ],
        ]
    }

    pub fn rotate(self, v: Vec3) -> Vec3 {
        let m = self.to_mat3();
        [
            m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
            m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
            m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
        ]
    }
}

impl Mul for Quaternion {
    type Output = Self;

    /// Hamilton product; `a * b` applies `b` first.
    fn mul(self, rhs: Self) -> Self {
        Self {
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            z: self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        }
    }
}

/// Move a box pose from the ego frame into the global frame.
pub fn ego_to_global(
    translation: Vec3,
    rotation: Quat,
    ego_translation: Vec3,
    ego_rotation: Quat,
) -> (Vec3, Quat) {
    let ego_q = Quaternion::from_wxyz(ego_rotation);
    let rotated = ego_q.rotate(translation);
    let global_translation = [
        rotated[0] + ego_translation[0],
        rotated[1] + ego_translation[1],
        rotated[2] + ego_translation[2],
    ];
    let global_rotation = (ego_q * Quaternion::from_wxyz(rotation)).to_wxyz();
    (global_translation, global_rotation)
}
