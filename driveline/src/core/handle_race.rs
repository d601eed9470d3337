use crate::core::race::Race;
use crate::interfaces::telemetry::{TelemetryEvent, MAX_TELEMETRY_FREQUENCY};
use crate::post::race_result::RaceResult;
use crate::pre::read_sim_pars::SimPars;
use anyhow::Context;
use flume::Sender;
use std::thread::sleep;
use std::time::{Duration, Instant};

/// handle_race creates and simulates a race on the basis of the inserted parameters, and
/// returns the results for post-processing.
///
/// Without a sender the race is simulated flat-out. With a sender it runs in real time
/// (scaled by `realtime_factor`) and pushes telemetry events into the channel: lap events
/// unthrottled, vehicle frames and standings at most at [`MAX_TELEMETRY_FREQUENCY`], and the
/// final result exactly once.
pub fn handle_race(
    sim_pars: &SimPars,
    timestep_size: f64,
    print_debug: bool,
    tx: Option<&Sender<TelemetryEvent>>,
    realtime_factor: f64,
) -> anyhow::Result<RaceResult> {
    let mut race = Race::new(
        &sim_pars.race_pars,
        &sim_pars.track_pars,
        &sim_pars.car_profiles,
        timestep_size,
    )?;
    race.print_events = print_debug;

    // check if sender was inserted -> in that case simulate in real-time
    let sim_realtime = tx.is_some();

    if !sim_realtime {
        let mut t_race_update_print = 0.0;

        while race.is_active() {
            race.simulate_timestep();

            if print_debug && race.cur_racetime > t_race_update_print + 0.9999 {
                println!(
                    "INFO: Simulating... Current race time is {:.3}s, leader progress is {:.2} laps",
                    race.cur_racetime,
                    race.leader_race_prog()
                );
                t_race_update_print = race.cur_racetime;
            }
        }
    } else {
        let tx = tx.unwrap();
        let mut t_race_update_tel = 0.0;

        while race.is_active() {
            let t_start = Instant::now();
            let output = race.simulate_timestep();

            // lap events are sparse, they bypass the throttle
            for lap_event in output.laps.iter() {
                tx.send(TelemetryEvent::Lap(*lap_event))
                    .context("Failed to send lap event!")?;
            }

            // vehicle frames and standings are throttled; skipped frames are dropped, not
            // queued, only the freshest position matters
            if race.cur_racetime > t_race_update_tel + 1.0 / MAX_TELEMETRY_FREQUENCY - 0.001 {
                for frame in output.frames.iter() {
                    tx.send(TelemetryEvent::Vehicle(frame.to_owned()))
                        .context("Failed to send vehicle update!")?;
                }

                tx.send(TelemetryEvent::Standings(output.standings.to_owned()))
                    .context("Failed to send standings!")?;
                t_race_update_tel = race.cur_racetime;
            }

            // sleep until time step is finished in real-time as well (calculation in ms)
            let t_sleep = (race.timestep_size * 1000.0 / realtime_factor) as i64
                - t_start.elapsed().as_millis() as i64;

            if t_sleep > 0 {
                sleep(Duration::from_millis(t_sleep as u64));
            } else {
                println!("WARNING: Could not keep up with real-time!")
            }
        }

        // after the real-time loop finishes, send the final result once
        tx.send(TelemetryEvent::Finished(race.get_race_result()))
            .context("Failed to send final race result!")?;
    }

    Ok(race.get_race_result())
}
