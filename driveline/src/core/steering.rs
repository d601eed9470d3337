use glam::DVec3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::Deserialize;

/// Floor for the measured speed in the throttle governor, prevents the division from blowing
/// up while the car is (almost) standing.
pub const SPEED_EPS: f64 = 0.1;

const DIR_EPS: f64 = 1e-6;

/// * `gain` - Scales the angular error between heading and target direction into the raw
/// steering command
/// * `max_steer` - Clamp bound of the steering actuator
/// * `smoothing` - Exponential smoothing factor in ]0.0, 1.0], lower values react slower but
/// suppress per-tick zig-zag
/// * `jitter_damping` - How strongly high aggressiveness suppresses the control jitter
/// * `steer_jitter_scale` - (rad) Base standard deviation of the steering perturbation
/// * `throttle_jitter_scale` - Base standard deviation of the throttle perturbation
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SteeringPars {
    pub gain: f64,
    pub max_steer: f64,
    pub smoothing: f64,
    pub jitter_damping: f64,
    pub steer_jitter_scale: f64,
    pub throttle_jitter_scale: f64,
}

impl Default for SteeringPars {
    fn default() -> Self {
        SteeringPars {
            gain: 1.35,
            max_steer: 0.3,
            smoothing: 0.15,
            jitter_damping: 0.6,
            steer_jitter_scale: 0.05,
            throttle_jitter_scale: 0.08,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ControlCommand {
    pub steering: f64,
    pub throttle: f64,
}

/// SteeringController converts "where am I, which way am I facing, where should I go" into
/// bounded actuator commands. The random source is owned and seeded so that a race replays
/// deterministically for the same seed.
#[derive(Debug)]
pub struct SteeringController {
    pars: SteeringPars,
    jitter_sigma: f64,
    smoothed_steer: f64,
    rng: StdRng,
}

impl SteeringController {
    /// Aggressiveness and consistency are the 0-100 car profile values: low consistency cars
    /// wobble more, high aggressiveness partially suppresses that wobble again.
    pub fn new(
        pars: SteeringPars,
        aggressiveness: f64,
        consistency: f64,
        seed: u64,
    ) -> SteeringController {
        let jitter_sigma = (1.0 - consistency / 100.0)
            * (1.0 - aggressiveness / 100.0 * pars.jitter_damping);

        SteeringController {
            pars,
            jitter_sigma,
            smoothed_steer: 0.0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The method computes the steering and throttle command for one tick. `forward` must be
    /// the unit heading vector of the car, `target` the look-ahead waypoint.
    pub fn compute(
        &mut self,
        position: DVec3,
        forward: DVec3,
        target: DVec3,
        current_speed: f64,
        target_speed: f64,
    ) -> ControlCommand {
        let offset = target - position;

        // a coincident target carries no direction, hold the previous command instead of
        // letting a NaN enter the filter
        let raw_steer = if offset.length_squared() < DIR_EPS * DIR_EPS {
            self.smoothed_steer
        } else {
            let dir = offset.normalize();
            let angle = forward.cross(dir).y.atan2(forward.dot(dir));
            (angle * self.pars.gain).clamp(-self.pars.max_steer, self.pars.max_steer)
        };

        // the key anti-oscillation mechanism: without it, recomputing a large raw angle
        // every tick produces visible zig-zag steering
        self.smoothed_steer += (raw_steer - self.smoothed_steer) * self.pars.smoothing;

        // proportional speed governor, saturates at 1 below target speed
        let throttle = (target_speed / current_speed.max(SPEED_EPS)).min(1.0);

        let steer_jitter = self.sample_jitter(self.pars.steer_jitter_scale);
        let throttle_jitter = self.sample_jitter(self.pars.throttle_jitter_scale);

        ControlCommand {
            steering: (self.smoothed_steer + steer_jitter)
                .clamp(-self.pars.max_steer, self.pars.max_steer),
            throttle: (throttle + throttle_jitter).clamp(0.0, 1.0),
        }
    }

    pub fn max_steer(&self) -> f64 {
        self.pars.max_steer
    }

    fn sample_jitter(&mut self, scale: f64) -> f64 {
        let std_dev = self.jitter_sigma * scale;

        if std_dev > 0.0 {
            let normal = Normal::new(0.0, std_dev).unwrap();
            normal.sample(&mut self.rng)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn perfect_controller() -> SteeringController {
        // consistency 100 -> no jitter, fully deterministic filter behavior
        SteeringController::new(SteeringPars::default(), 50.0, 100.0, 42)
    }

    #[test]
    fn steering_is_bounded_for_any_target() {
        let mut ctrl = SteeringController::new(SteeringPars::default(), 0.0, 0.0, 7);
        let max_steer = ctrl.max_steer();
        let position = DVec3::ZERO;
        let forward = DVec3::Z;

        let targets = [
            DVec3::new(0.0, 0.0, 10.0),
            DVec3::new(10.0, 0.0, 0.0),
            DVec3::new(-10.0, 0.0, 0.0),
            // directly behind the car, raw angle near 180 degrees
            DVec3::new(0.0, 0.0, -10.0),
            DVec3::new(0.001, 0.0, -10.0),
        ];

        for target in targets.iter() {
            for _ in 0..50 {
                let cmd = ctrl.compute(position, forward, *target, 5.0, 10.0);
                assert!(cmd.steering.abs() <= max_steer + 1e-12);
                assert!((0.0..=1.0).contains(&cmd.throttle));
            }
        }
    }

    #[test]
    fn smoothing_converges_monotonically_without_overshoot() {
        let mut ctrl = perfect_controller();
        let position = DVec3::ZERO;
        let forward = DVec3::Z;
        // constant target 90 degrees to the left saturates the raw command at max_steer
        let target = DVec3::new(10.0, 0.0, 0.0);
        let raw_target = ctrl.max_steer();

        let mut prev = 0.0;
        for _ in 0..200 {
            let cmd = ctrl.compute(position, forward, target, 5.0, 10.0);
            assert!(cmd.steering >= prev, "filter output must not oscillate");
            assert!(cmd.steering <= raw_target + 1e-12, "filter must not overshoot");
            prev = cmd.steering;
        }

        assert_relative_eq!(prev, raw_target, epsilon = 1e-6);
    }

    #[test]
    fn throttle_governor_saturates_and_decays() {
        let mut ctrl = perfect_controller();
        let target = DVec3::new(0.0, 0.0, 10.0);

        // below target speed the governor saturates at full throttle
        let cmd = ctrl.compute(DVec3::ZERO, DVec3::Z, target, 4.0, 12.0);
        assert_relative_eq!(cmd.throttle, 1.0);

        // above target speed it decays proportionally
        let cmd = ctrl.compute(DVec3::ZERO, DVec3::Z, target, 16.0, 12.0);
        assert_relative_eq!(cmd.throttle, 12.0 / 16.0);
    }

    #[test]
    fn throttle_survives_zero_speed() {
        let mut ctrl = perfect_controller();
        let cmd = ctrl.compute(DVec3::ZERO, DVec3::Z, DVec3::new(0.0, 0.0, 10.0), 0.0, 12.0);
        assert!(cmd.throttle.is_finite());
        assert_relative_eq!(cmd.throttle, 1.0);
    }

    #[test]
    fn coincident_target_holds_previous_command() {
        let mut ctrl = perfect_controller();
        let target = DVec3::new(10.0, 0.0, 0.0);

        for _ in 0..10 {
            ctrl.compute(DVec3::ZERO, DVec3::Z, target, 5.0, 10.0);
        }
        let before = ctrl.compute(DVec3::ZERO, DVec3::Z, target, 5.0, 10.0).steering;

        // target equal to the position must not inject NaN or reset the filter
        let cmd = ctrl.compute(DVec3::ZERO, DVec3::Z, DVec3::ZERO, 5.0, 10.0);
        assert!(cmd.steering.is_finite());
        assert_relative_eq!(cmd.steering, before, epsilon = 1e-12);
    }

    #[test]
    fn same_seed_replays_identically() {
        let mut ctrl_a = SteeringController::new(SteeringPars::default(), 40.0, 50.0, 1234);
        let mut ctrl_b = SteeringController::new(SteeringPars::default(), 40.0, 50.0, 1234);
        let target = DVec3::new(3.0, 0.0, 8.0);

        for i in 0..100 {
            let speed = 5.0 + i as f64 * 0.05;
            let cmd_a = ctrl_a.compute(DVec3::ZERO, DVec3::Z, target, speed, 11.0);
            let cmd_b = ctrl_b.compute(DVec3::ZERO, DVec3::Z, target, speed, 11.0);
            assert_eq!(cmd_a.steering, cmd_b.steering);
            assert_eq!(cmd_a.throttle, cmd_b.throttle);
        }
    }
}
