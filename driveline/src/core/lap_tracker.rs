use crate::core::track::Track;
use crate::interfaces::telemetry::LapComplete;

/// Per-car lap bookkeeping, mutated once per tick per car.
#[derive(Debug)]
pub struct LapRecord {
    pub last_s: f64,
    pub laps: u32,
    crossed_start: bool,
    ever_crossed: bool,
}

/// LapTracker detects start-line crossings per car from the forward-progress coordinate and
/// increments lap counters. A naive single-threshold check double-fires when position noise
/// oscillates across the line, so the detector is a two-sided band: crossing the line arms
/// it, and it only re-arms after the car has dropped below the line by the hysteresis
/// margin, i.e., has actually gone around.
#[derive(Debug)]
pub struct LapTracker {
    start_line_s: f64,
    hysteresis_margin: f64,
    car_nos: Vec<u32>,
    records: Vec<LapRecord>,
    lap_racetimes: Vec<Vec<f64>>,
}

impl LapTracker {
    /// `initial_s` is the grid progress coordinate per car, so that the first line crossing
    /// arms the detector without counting a lap.
    pub fn new(track: &Track, car_nos: Vec<u32>, initial_s: &[f64]) -> LapTracker {
        let records = initial_s
            .iter()
            .map(|&s| LapRecord {
                last_s: s,
                laps: 0,
                crossed_start: false,
                ever_crossed: false,
            })
            .collect();

        LapTracker {
            start_line_s: track.start_line_s,
            hysteresis_margin: track.hysteresis_margin,
            lap_racetimes: vec![Vec::new(); car_nos.len()],
            car_nos,
            records,
        }
    }

    /// The method consumes one progress observation for one car. Cars whose telemetry stops
    /// arriving are simply not updated and their lap count stops advancing.
    pub fn update(&mut self, car_idx: usize, s: f64, racetime: f64) -> Option<LapComplete> {
        let record = &mut self.records[car_idx];
        let mut event = None;

        if record.crossed_start {
            // the car has to leave the band below the line before the next crossing counts
            if s < self.start_line_s - self.hysteresis_margin {
                record.crossed_start = false;
            }
        } else if s >= self.start_line_s {
            record.crossed_start = true;

            // every arming but the very first one completes a lap
            if record.ever_crossed {
                record.laps += 1;
                self.lap_racetimes[car_idx].push(racetime);
                event = Some(LapComplete {
                    car_no: self.car_nos[car_idx],
                    lap: record.laps,
                    racetime,
                });
            }
            record.ever_crossed = true;
        }

        record.last_s = s;
        event
    }

    pub fn laps(&self, car_idx: usize) -> u32 {
        self.records[car_idx].laps
    }

    pub fn record(&self, car_idx: usize) -> &LapRecord {
        &self.records[car_idx]
    }

    /// Race times at which the car completed its laps, one entry per lap.
    pub fn lap_racetimes(&self, car_idx: usize) -> &[f64] {
        &self.lap_racetimes[car_idx]
    }
}
