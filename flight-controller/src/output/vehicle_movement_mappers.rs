use std::ops::Add;

use crate::util::math::vectors::RotationVector3D;

pub trait FlyingVehicleMovementMapper<TActuator> {
    fn map_controller_output_to_actuators_input(
        &self,
        throttle: f32,
        rotation_input: RotationVector3D,
    ) -> TActuator;
}

/// Requested pulse widths before any calibration offset or clamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadcopterActuatorsValues {
    pub motor_front_left: f32,
    pub motor_front_right: f32,
    pub motor_back_right: f32,
    pub motor_back_left: f32,
}

impl From<f32> for QuadcopterActuatorsValues {
    fn from(value: f32) -> Self {
        Self {
            motor_front_left: value,
            motor_front_right: value,
            motor_back_right: value,
            motor_back_left: value,
        }
    }
}

impl Add for QuadcopterActuatorsValues {
    type Output = QuadcopterActuatorsValues;

    fn add(self, other: Self) -> Self::Output {
        Self {
            motor_front_left: self.motor_front_left + other.motor_front_left,
            motor_front_right: self.motor_front_right + other.motor_front_right,
            motor_back_right: self.motor_back_right + other.motor_back_right,
            motor_back_left: self.motor_back_left + other.motor_back_left,
        }
    }
}

impl QuadcopterActuatorsValues {
    /// FL, FR, BR, BL
    pub fn to_array(&self) -> [f32; 4] {
        [
            self.motor_front_left,
            self.motor_front_right,
            self.motor_back_right,
            self.motor_back_left,
        ]
    }
}

/// Mixer for the "+" control axes obtained after the frame offset rotation:
/// roll acts on the FR/BL pair, pitch on the FL/BR pair, yaw on the
/// diagonals against each other.
pub struct Quadcopter;

impl Quadcopter {
    fn map_roll_to_motor_input(&self, roll_value: f32) -> QuadcopterActuatorsValues {
        QuadcopterActuatorsValues {
            motor_front_left: 0.0,
            motor_front_right: roll_value,
            motor_back_right: 0.0,
            motor_back_left: -roll_value,
        }
    }

    fn map_pitch_to_motor_input(&self, pitch_value: f32) -> QuadcopterActuatorsValues {
        QuadcopterActuatorsValues {
            motor_front_left: pitch_value,
            motor_front_right: 0.0,
            motor_back_right: -pitch_value,
            motor_back_left: 0.0,
        }
    }

    fn map_yaw_to_motor_input(&self, yaw_value: f32) -> QuadcopterActuatorsValues {
        QuadcopterActuatorsValues {
            motor_front_left: yaw_value,
            motor_front_right: -yaw_value,
            motor_back_right: yaw_value,
            motor_back_left: -yaw_value,
        }
    }
}

impl FlyingVehicleMovementMapper<QuadcopterActuatorsValues> for Quadcopter {
    fn map_controller_output_to_actuators_input(
        &self,
        throttle: f32,
        rotation_input: RotationVector3D,
    ) -> QuadcopterActuatorsValues {
        let motors_throttle = QuadcopterActuatorsValues::from(throttle);
        let roll_input = self.map_roll_to_motor_input(rotation_input.roll);
        let pitch_input = self.map_pitch_to_motor_input(rotation_input.pitch);
        let yaw_input = self.map_yaw_to_motor_input(rotation_input.yaw);
        motors_throttle + roll_input + pitch_input + yaw_input
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mix(throttle: f32, roll: f32, pitch: f32, yaw: f32) -> QuadcopterActuatorsValues {
        Quadcopter.map_controller_output_to_actuators_input(
            throttle,
            RotationVector3D { roll, pitch, yaw },
        )
    }

    #[test]
    fn positive_roll_raises_front_right_and_lowers_back_left() {
        let out = mix(1000.0, 25.0, 0.0, 0.0);
        assert_eq!(out.motor_front_right, 1025.0);
        assert_eq!(out.motor_back_left, 975.0);
        assert_eq!(out.motor_front_left, 1000.0);
        assert_eq!(out.motor_back_right, 1000.0);
    }

    #[test]
    fn positive_pitch_raises_front_left_and_lowers_back_right() {
        let out = mix(1000.0, 0.0, 10.0, 0.0);
        assert_eq!(out.motor_front_left, 1010.0);
        assert_eq!(out.motor_back_right, 990.0);
        assert_eq!(out.motor_front_right, 1000.0);
        assert_eq!(out.motor_back_left, 1000.0);
    }

    #[test]
    fn yaw_spins_diagonals_against_each_other() {
        let out = mix(1000.0, 0.0, 0.0, 4.0);
        assert_eq!(out.to_array(), [1004.0, 996.0, 1004.0, 996.0]);
    }
}
