use crate::core::chassis::{Chassis, FRONT_LEFT, FRONT_RIGHT, REAR_LEFT, REAR_RIGHT};
use crate::core::steering::{ControlCommand, SteeringController};
use crate::core::track::Track;
use crate::interfaces::telemetry::{RgbColor, VehicleUpdate};
use glam::DVec3;
use serde::Deserialize;

/// Displacements below this floor are floating-point jitter of a standing car and must not
/// leak into the cumulative distance, since that would slowly inflate the standings.
pub const MIN_DISPLACEMENT: f64 = 0.001;

/// Weight of the corrective assist that nudges an externally-controlled car back toward the
/// center line while its input is idle.
const ASSIST_WEIGHT: f64 = 0.25;

const INPUT_IDLE_EPS: f64 = 0.01;

/// * `car_no` - Car number
/// * `driver_initials` - Driver initials, e.g. BOT
/// * `color` - Display color as a CSS color string, e.g. "#e10600"
/// * `aggressiveness` - (0-100) Biases target speed and engine force upward
/// * `consistency` - (0-100) Inversely controls the random control-input jitter
/// * `is_player_controlled` - True if steering/throttle come from an external input source
#[derive(Debug, Deserialize, Clone)]
pub struct CarProfile {
    pub car_no: u32,
    pub driver_initials: String,
    pub color: String,
    pub aggressiveness: f64,
    pub consistency: f64,
    #[serde(default)]
    pub is_player_controlled: bool,
}

/// * `v_base` - (m/s) Target speed of a zero-aggressiveness car
/// * `v_span` - (m/s) Additional target speed at aggressiveness 100
/// * `max_engine_force` - (N) Engine force at full throttle, split over the rear wheels
/// * `force_bias_base` - Engine force scale of a zero-aggressiveness car
/// * `force_bias_span` - Additional engine force scale at aggressiveness 100
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VehiclePars {
    pub v_base: f64,
    pub v_span: f64,
    pub max_engine_force: f64,
    pub force_bias_base: f64,
    pub force_bias_span: f64,
}

impl Default for VehiclePars {
    fn default() -> Self {
        VehiclePars {
            v_base: 8.0,
            v_span: 6.0,
            max_engine_force: 6000.0,
            force_bias_base: 0.7,
            force_bias_span: 0.6,
        }
    }
}

/// External steering/throttle for a player-controlled car, both in actuator units.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalInput {
    pub steering: f64,
    pub throttle: f64,
}

impl ExternalInput {
    pub fn is_idle(&self) -> bool {
        self.steering.abs() < INPUT_IDLE_EPS && self.throttle.abs() < INPUT_IDLE_EPS
    }
}

/// VehicleState is owned exclusively by its agent; other components only ever see the
/// telemetry snapshots emitted from it.
#[derive(Debug)]
pub struct VehicleState {
    pub position: DVec3,
    pub heading_yaw: f64,
    pub speed: f64,
    pub cumulative_distance: f64,
    prev_position: DVec3,
}

/// VehicleAgent owns one car's simulation state and drives it forward one tick at a time:
/// read the chassis transform, query the track, compute controls, feed them back to the
/// chassis and emit a telemetry frame.
pub struct VehicleAgent {
    pub profile: CarProfile,
    pub color: RgbColor,
    target_speed: f64,
    engine_force: f64,
    controller: SteeringController,
    chassis: Box<dyn Chassis>,
    state: VehicleState,
}

impl VehicleAgent {
    pub fn new(
        profile: CarProfile,
        color: RgbColor,
        vehicle_pars: &VehiclePars,
        controller: SteeringController,
        chassis: Box<dyn Chassis>,
    ) -> VehicleAgent {
        let aggr_frac = profile.aggressiveness / 100.0;
        let target_speed = vehicle_pars.v_base + aggr_frac * vehicle_pars.v_span;
        let engine_force = vehicle_pars.max_engine_force
            * (vehicle_pars.force_bias_base + aggr_frac * vehicle_pars.force_bias_span);

        let transform = chassis.read_transform();
        let forward = transform.forward();

        VehicleAgent {
            profile,
            color,
            target_speed,
            engine_force,
            controller,
            chassis,
            state: VehicleState {
                position: transform.position,
                heading_yaw: forward.x.atan2(forward.z),
                speed: 0.0,
                cumulative_distance: 0.0,
                prev_position: transform.position,
            },
        }
    }

    /// The method advances the car by one tick and returns the emitted telemetry frame.
    /// A non-positive time step carries no usable position delta and is skipped entirely.
    pub fn tick(
        &mut self,
        dt: f64,
        racetime: f64,
        track: &Track,
        external_input: Option<ExternalInput>,
    ) -> Option<VehicleUpdate> {
        if dt <= 0.0 {
            return None;
        }

        let transform = self.chassis.read_transform();
        let position = transform.position;
        let forward = transform.forward();

        let displacement = position.distance(self.state.prev_position);
        let speed = displacement / dt;

        let idx_closest = track.closest_waypoint_index(position);
        let target = track.look_ahead_waypoint(idx_closest, track.look_ahead_count);

        let assist =
            self.controller
                .compute(position, forward, target, speed, self.target_speed);

        let cmd = match external_input {
            // active external input wins unmodified (apart from actuator clamps)
            Some(input) if !input.is_idle() => ControlCommand {
                steering: input
                    .steering
                    .clamp(-self.controller.max_steer(), self.controller.max_steer()),
                throttle: input.throttle.clamp(0.0, 1.0),
            },
            // idle input: blend in the controller at low weight so the car is nudged back
            // toward the center line without fighting the player
            Some(_) => ControlCommand {
                steering: assist.steering * ASSIST_WEIGHT,
                throttle: assist.throttle * ASSIST_WEIGHT,
            },
            None => assist,
        };

        self.chassis.set_steering_value(cmd.steering, FRONT_LEFT);
        self.chassis.set_steering_value(cmd.steering, FRONT_RIGHT);
        self.chassis
            .apply_engine_force(0.5 * cmd.throttle * self.engine_force, REAR_LEFT);
        self.chassis
            .apply_engine_force(0.5 * cmd.throttle * self.engine_force, REAR_RIGHT);

        if displacement > MIN_DISPLACEMENT {
            self.state.cumulative_distance += displacement;
        }

        self.state.position = position;
        self.state.heading_yaw = forward.x.atan2(forward.z);
        self.state.speed = speed;
        self.state.prev_position = position;

        Some(VehicleUpdate {
            car_no: self.profile.car_no,
            driver_initials: self.profile.driver_initials.to_owned(),
            color: self.color,
            position,
            heading_yaw: self.state.heading_yaw,
            speed,
            cumulative_distance: self.state.cumulative_distance,
            timestamp: racetime,
        })
    }

    /// Advance the underlying chassis. Called once per tick after all agents have published
    /// their frames.
    pub fn integrate_chassis(&mut self, dt: f64) {
        self.chassis.integrate(dt);
    }

    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    pub fn car_no(&self) -> u32 {
        self.profile.car_no
    }
}
