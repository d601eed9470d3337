use crate::core::chassis::{ChassisPars, KinematicChassis};
use crate::core::lap_tracker::LapTracker;
use crate::core::ranking::{FinalStanding, RaceRanking, RankEntry};
use crate::core::steering::{SteeringController, SteeringPars};
use crate::core::track::{Track, TrackPars};
use crate::core::vehicle::{CarProfile, ExternalInput, VehicleAgent, VehiclePars};
use crate::interfaces::telemetry::{LapComplete, RgbColor, Standing, VehicleUpdate};
use crate::post::race_result::{CarDriverPair, RaceResult};
use anyhow::{bail, Context, Result};
use helpers::general::argmax;
use serde::Deserialize;
use std::collections::HashSet;

/// * `race_duration_s` - (s) Race length; the race ends once the race time passes it
/// * `seed` - Base seed of the per-car control jitter, offset by the car index
/// * `d_first_gridpos` - (m) Distance between the first grid position and the start line
/// * `d_per_gridpos` - (m) Distance between two grid positions
/// * `steering_pars` / `vehicle_pars` / `chassis_pars` - Tuning, all optional in the
/// parameter file
#[derive(Debug, Deserialize, Clone)]
pub struct RacePars {
    pub race_duration_s: f64,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_d_first_gridpos")]
    pub d_first_gridpos: f64,
    #[serde(default = "default_d_per_gridpos")]
    pub d_per_gridpos: f64,
    #[serde(default)]
    pub steering_pars: SteeringPars,
    #[serde(default)]
    pub vehicle_pars: VehiclePars,
    #[serde(default)]
    pub chassis_pars: ChassisPars,
}

fn default_d_first_gridpos() -> f64 {
    2.0
}

fn default_d_per_gridpos() -> f64 {
    3.0
}

/// Slack on the timer expiry check, so that accumulated timestep rounding cannot delay the
/// race end by one tick.
const TIME_EPS: f64 = 1e-9;

/// Everything one timestep produced, in producer order: all vehicle frames first, then the
/// lap events and standings derived from them.
#[derive(Debug, Default)]
pub struct TickOutput {
    pub frames: Vec<VehicleUpdate>,
    pub laps: Vec<LapComplete>,
    pub standings: Vec<Standing>,
    pub finished: bool,
}

pub struct Race {
    pub timestep_size: f64,
    pub cur_racetime: f64,
    pub race_duration: f64,
    pub print_events: bool,
    is_active: bool,
    pub track: Track,
    cars_list: Vec<VehicleAgent>,
    player_inputs: Vec<ExternalInput>,
    lap_tracker: LapTracker,
    ranking: RaceRanking,
}

impl Race {
    pub fn new(
        race_pars: &RacePars,
        track_pars: &TrackPars,
        car_profiles: &[CarProfile],
        timestep_size: f64,
    ) -> Result<Race> {
        if timestep_size <= 0.0 {
            bail!("Timestep size must be positive, but is {:.4}s!", timestep_size)
        }

        if race_pars.race_duration_s <= 0.0 {
            bail!(
                "Race duration must be positive, but is {:.1}s!",
                race_pars.race_duration_s
            )
        }

        if car_profiles.is_empty() {
            bail!("At least one car profile is required to start a race!")
        }

        let mut car_nos_seen = HashSet::new();
        for profile in car_profiles.iter() {
            if !car_nos_seen.insert(profile.car_no) {
                bail!("Car number {} appears more than once!", profile.car_no)
            }

            if !(0.0..=100.0).contains(&profile.aggressiveness)
                || !(0.0..=100.0).contains(&profile.consistency)
            {
                bail!(
                    "Aggressiveness and consistency of car {} must be in [0, 100]!",
                    profile.car_no
                )
            }
        }

        let track = Track::new(track_pars)?;

        // create cars on their grid positions behind the start line, facing the driving
        // direction of the center line
        let no_cars = car_profiles.len();
        let mut cars_list: Vec<VehicleAgent> = Vec::with_capacity(no_cars);
        let mut grid_s: Vec<f64> = Vec::with_capacity(no_cars);

        for (i, profile) in car_profiles.iter().enumerate() {
            let color = profile
                .color
                .parse::<css_color_parser::Color>()
                .context(format!("Could not parse color of car {}!", profile.car_no))?;

            let s_start = track.wrap_s(
                track.start_line_s - race_pars.d_first_gridpos - i as f64 * race_pars.d_per_gridpos,
            );
            let position = track.point_at(s_start);
            let tangent = track.tangent_at(s_start);

            let controller = SteeringController::new(
                race_pars.steering_pars.clone(),
                profile.aggressiveness,
                profile.consistency,
                race_pars.seed.wrapping_add(i as u64),
            );
            let chassis = KinematicChassis::new(
                race_pars.chassis_pars.clone(),
                position,
                tangent.x.atan2(tangent.z),
            );

            cars_list.push(VehicleAgent::new(
                profile.to_owned(),
                RgbColor {
                    r: color.r,
                    g: color.g,
                    b: color.b,
                },
                &race_pars.vehicle_pars,
                controller,
                Box::new(chassis),
            ));
            grid_s.push(s_start);
        }

        let car_nos: Vec<u32> = car_profiles.iter().map(|p| p.car_no).collect();
        let lap_tracker = LapTracker::new(&track, car_nos, &grid_s);

        Ok(Race {
            timestep_size,
            cur_racetime: 0.0,
            race_duration: race_pars.race_duration_s,
            print_events: false,
            is_active: true,
            track,
            cars_list,
            player_inputs: vec![ExternalInput::default(); no_cars],
            lap_tracker,
            ranking: RaceRanking::new(),
        })
    }

    // ---------------------------------------------------------------------------------------------
    // MAIN METHOD ---------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// The method simulates one timestep: all vehicle agents are ticked first, then the lap
    /// tracker and the ranking consume the emitted frames. Once the race is over, further
    /// calls are no-ops.
    pub fn simulate_timestep(&mut self) -> TickOutput {
        let mut output = TickOutput::default();

        if !self.is_active {
            return output;
        }

        // increment discretization variable
        self.cur_racetime += self.timestep_size;

        // update all producers before any consumer runs
        for (i, car) in self.cars_list.iter_mut().enumerate() {
            let input = if car.profile.is_player_controlled {
                Some(self.player_inputs[i])
            } else {
                None
            };

            if let Some(frame) = car.tick(self.timestep_size, self.cur_racetime, &self.track, input)
            {
                output.frames.push(frame);
            }
        }

        // advance the physics collaborators for the next tick
        for car in self.cars_list.iter_mut() {
            car.integrate_chassis(self.timestep_size);
        }

        // lap detection on the published frames
        for (i, frame) in output.frames.iter().enumerate() {
            let s_track = self.track.progress_at(frame.position);

            if let Some(lap_event) = self.lap_tracker.update(i, s_track, self.cur_racetime) {
                if self.print_events {
                    println!(
                        "INFO: Car {} completed lap {} at race time {:.3}s",
                        lap_event.car_no, lap_event.lap, lap_event.racetime
                    );
                }
                output.laps.push(lap_event);
            }
        }

        // live standings
        let entries = self.current_entries();
        output.standings = self.ranking.update(&entries).to_vec();

        // end of race on timer expiry
        if self.cur_racetime >= self.race_duration - TIME_EPS {
            self.end_race();
            output.finished = true;
        }

        output
    }

    /// The method ends the race: a single idempotent transition that freezes the standings
    /// and assigns the point awards. Safe to call any number of times.
    pub fn end_race(&mut self) {
        if !self.is_active && self.ranking.is_finalized() {
            return;
        }

        self.is_active = false;
        let entries = self.current_entries();
        self.ranking.finalize(&entries);
    }

    // ---------------------------------------------------------------------------------------------
    // METHODS (HELPERS) ---------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// External steering/throttle for a player-controlled car. The input stays applied until
    /// it is overwritten by the next one.
    pub fn set_player_input(&mut self, car_no: u32, input: ExternalInput) -> Result<()> {
        let idx = self
            .cars_list
            .iter()
            .position(|car| car.car_no() == car_no);

        match idx {
            Some(i) if self.cars_list[i].profile.is_player_controlled => {
                self.player_inputs[i] = input;
                Ok(())
            }
            Some(_) => bail!("Car {} is not player-controlled!", car_no),
            None => bail!("Unknown car number {}!", car_no),
        }
    }

    /// Race progress of the current leader in laps (fractional).
    pub fn leader_race_prog(&self) -> f64 {
        let progs: Vec<f64> = (0..self.cars_list.len())
            .map(|i| {
                self.lap_tracker.laps(i) as f64
                    + self.lap_tracker.record(i).last_s / self.track.circumference
            })
            .collect();

        progs[argmax(&progs)]
    }

    pub fn get_race_result(&self) -> RaceResult {
        let final_standings: Vec<FinalStanding> = self
            .ranking
            .final_standings()
            .map(|finals| finals.to_vec())
            .unwrap_or_default();

        RaceResult {
            race_duration_s: self.race_duration,
            car_driver_pairs: self
                .cars_list
                .iter()
                .map(|car| CarDriverPair {
                    car_no: car.car_no(),
                    driver_initials: car.profile.driver_initials.to_owned(),
                })
                .collect(),
            final_standings,
            laptimes: (0..self.cars_list.len())
                .map(|i| Self::laptimes_from_racetimes(self.lap_tracker.lap_racetimes(i)))
                .collect(),
        }
    }

    fn laptimes_from_racetimes(racetimes: &[f64]) -> Vec<f64> {
        racetimes
            .iter()
            .scan(0.0, |prev, &t| {
                let laptime = t - *prev;
                *prev = t;
                Some(laptime)
            })
            .collect()
    }

    fn current_entries(&self) -> Vec<RankEntry> {
        self.cars_list
            .iter()
            .enumerate()
            .map(|(i, car)| RankEntry {
                car_no: car.car_no(),
                laps: self.lap_tracker.laps(i),
                cumulative_distance: car.state().cumulative_distance,
                speed: car.state().speed,
            })
            .collect()
    }
}
