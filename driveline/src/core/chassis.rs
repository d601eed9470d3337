use glam::{DQuat, DVec3};
use helpers::general::lin_interp;
use serde::Deserialize;

pub const FRONT_LEFT: usize = 0;
pub const FRONT_RIGHT: usize = 1;
pub const REAR_LEFT: usize = 2;
pub const REAR_RIGHT: usize = 3;

/// Engine force effectiveness falls off with speed, roughly modelling the torque curve.
const FORCE_FALLOFF_SPEEDS: [f64; 3] = [0.0, 10.0, 20.0];
const FORCE_FALLOFF_SCALES: [f64; 3] = [1.0, 0.8, 0.5];

#[derive(Debug, Clone, Copy)]
pub struct ChassisTransform {
    pub position: DVec3,
    pub orientation: DQuat,
}

impl ChassisTransform {
    /// The method returns the unit heading vector of the chassis (+z is yaw 0).
    pub fn forward(&self) -> DVec3 {
        self.orientation * DVec3::Z
    }
}

/// Chassis is the boundary to the rigid-body physics collaborator: the simulation core only
/// applies engine forces and steering values and reads back the resulting transform. The
/// embedding application provides its physics engine behind this trait; headless simulation
/// and tests use [`KinematicChassis`].
pub trait Chassis {
    fn apply_engine_force(&mut self, force: f64, wheel: usize);
    fn set_steering_value(&mut self, value: f64, wheel: usize);
    fn read_transform(&self) -> ChassisTransform;

    /// Advance the chassis by one time step with the currently applied actuator values.
    fn integrate(&mut self, dt: f64);
}

/// * `mass` - (kg) Chassis mass
/// * `wheelbase` - (m) Distance between front and rear axle
/// * `drag_lin` - (1/s) Linear drag coefficient (rolling resistance)
/// * `drag_quad` - (1/m) Quadratic drag coefficient (air resistance)
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChassisPars {
    pub mass: f64,
    pub wheelbase: f64,
    pub drag_lin: f64,
    pub drag_quad: f64,
}

impl Default for ChassisPars {
    fn default() -> Self {
        ChassisPars {
            mass: 800.0,
            wheelbase: 2.5,
            drag_lin: 0.25,
            drag_quad: 0.02,
        }
    }
}

/// KinematicChassis is a single-track kinematic stand-in for the external physics engine:
/// the steering value acts as front wheel angle, yaw rate follows from speed and wheelbase,
/// longitudinal speed from engine force minus drag. No lateral slip is modelled.
#[derive(Debug)]
pub struct KinematicChassis {
    pars: ChassisPars,
    position: DVec3,
    yaw: f64,
    speed: f64,
    steering: [f64; 2],
    engine_forces: [f64; 2],
}

impl KinematicChassis {
    pub fn new(pars: ChassisPars, position: DVec3, yaw: f64) -> KinematicChassis {
        KinematicChassis {
            pars,
            position,
            yaw,
            speed: 0.0,
            steering: [0.0; 2],
            engine_forces: [0.0; 2],
        }
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }
}

impl Chassis for KinematicChassis {
    fn apply_engine_force(&mut self, force: f64, wheel: usize) {
        if wheel == REAR_LEFT || wheel == REAR_RIGHT {
            self.engine_forces[wheel - REAR_LEFT] = force;
        }
    }

    fn set_steering_value(&mut self, value: f64, wheel: usize) {
        if wheel == FRONT_LEFT || wheel == FRONT_RIGHT {
            self.steering[wheel - FRONT_LEFT] = value;
        }
    }

    fn read_transform(&self) -> ChassisTransform {
        ChassisTransform {
            position: self.position,
            orientation: DQuat::from_rotation_y(self.yaw),
        }
    }

    fn integrate(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }

        let steer = 0.5 * (self.steering[0] + self.steering[1]);
        let force = (self.engine_forces[0] + self.engine_forces[1])
            * lin_interp(self.speed, &FORCE_FALLOFF_SPEEDS, &FORCE_FALLOFF_SCALES);

        let accel = force / self.pars.mass
            - (self.pars.drag_lin + self.pars.drag_quad * self.speed) * self.speed;

        self.speed = (self.speed + accel * dt).max(0.0);
        self.yaw += self.speed / self.pars.wheelbase * steer.tan() * dt;

        let forward = DVec3::new(self.yaw.sin(), 0.0, self.yaw.cos());
        self.position += forward * self.speed * dt;
    }
}
