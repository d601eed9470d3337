use crate::post::race_result::RaceResult;
use glam::DVec3;

/// Upper bound for vehicle/standings publishes per second and car. Late frames are dropped,
/// not queued, since only the freshest position matters.
pub const MAX_TELEMETRY_FREQUENCY: f64 = 10.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Per-tick snapshot of one car, published to external consumers (HUD, network sync,
/// persistence). Consumers never see the live vehicle state.
#[derive(Debug, Clone)]
pub struct VehicleUpdate {
    pub car_no: u32,
    pub driver_initials: String,
    pub color: RgbColor,
    pub position: DVec3,
    pub heading_yaw: f64,
    pub speed: f64,
    pub cumulative_distance: f64,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct LapComplete {
    pub car_no: u32,
    pub lap: u32,
    pub racetime: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct Standing {
    pub car_no: u32,
    pub position: u32,
    pub laps: u32,
    pub distance: f64,
}

/// TelemetryEvent is the message type pushed over the flume channel to whatever consumes the
/// race live. `Finished` is sent exactly once per race.
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    Vehicle(VehicleUpdate),
    Lap(LapComplete),
    Standings(Vec<Standing>),
    Finished(RaceResult),
}
