use std::ops::{AddAssign, Div, Sub};

use libm::{atan2f, cosf, sinf, sqrtf};

/// Raw three axis sample, gyro rates in deg/s or acceleration in g.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SensorVector3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl SensorVector3D {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        SensorVector3D { x, y, z }
    }

    /// Tilt of the gravity vector. Only meaningful for accelerometer samples
    /// taken while the vehicle is not accelerating.
    pub fn calculate_orientation_angles(&self) -> RotationVector2D {
        let roll = atan2f(self.y, sqrtf(self.x.powf(2.0) + self.z.powf(2.0)));
        let pitch = atan2f(-self.x, sqrtf(self.y.powf(2.0) + self.z.powf(2.0)));

        RotationVector2D {
            roll: roll.to_degrees(),
            pitch: pitch.to_degrees(),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Sub<SensorVector3D> for SensorVector3D {
    type Output = SensorVector3D;

    fn sub(self, rhs: SensorVector3D) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

impl AddAssign<SensorVector3D> for SensorVector3D {
    fn add_assign(&mut self, rhs: SensorVector3D) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Div<f32> for SensorVector3D {
    type Output = SensorVector3D;

    fn div(self, rhs: f32) -> Self::Output {
        Self {
            x: self.x / rhs,
            y: self.y / rhs,
            z: self.z / rhs,
        }
    }
}

/// Angles in degrees.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RotationVector3D {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl RotationVector3D {
    pub fn from(vector_2d: &RotationVector2D, yaw: f32) -> Self {
        RotationVector3D {
            roll: vector_2d.roll,
            pitch: vector_2d.pitch,
            yaw,
        }
    }

    /// Rotates the roll/pitch pair around the vertical axis by `angle_deg`.
    /// Yaw is left untouched.
    pub fn rotate_on_z(&self, angle_deg: f32) -> Self {
        let angle = angle_deg.to_radians();
        let (sin, cos) = (sinf(angle), cosf(angle));
        RotationVector3D {
            roll: cos * self.roll - sin * self.pitch,
            pitch: sin * self.roll + cos * self.pitch,
            yaw: self.yaw,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RotationVector2D {
    pub roll: f32,
    pub pitch: f32,
}
