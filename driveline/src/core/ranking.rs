use crate::interfaces::telemetry::Standing;
use helpers::general::{argsort, SortOrder};
use serde::{Deserialize, Serialize};

/// Points awarded for positions 1..10 at race end, 0 beyond.
pub const POINTS_TABLE: [u32; 10] = [25, 18, 15, 12, 10, 8, 6, 4, 2, 1];

/// Per-car snapshot consumed by one ranking pass. Built from telemetry, never from live
/// vehicle state.
#[derive(Debug, Clone, Copy)]
pub struct RankEntry {
    pub car_no: u32,
    pub laps: u32,
    pub cumulative_distance: f64,
    pub speed: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FinalStanding {
    pub car_no: u32,
    pub position: u32,
    pub laps: u32,
    pub distance: f64,
    pub points: u32,
}

/// RaceRanking maintains the live total order over all cars and freezes it exactly once at
/// race end. Sort key: laps, then cumulative distance, then current speed as the final
/// tiebreak, all descending.
#[derive(Debug, Default)]
pub struct RaceRanking {
    standings: Vec<Standing>,
    final_result: Option<Vec<FinalStanding>>,
}

impl RaceRanking {
    pub fn new() -> RaceRanking {
        RaceRanking {
            standings: Vec::new(),
            final_result: None,
        }
    }

    /// The method recomputes the live standings from the given snapshots. After the race has
    /// been finalized the order is frozen and further updates are ignored.
    pub fn update(&mut self, entries: &[RankEntry]) -> &[Standing] {
        if self.final_result.is_none() {
            let sort_keys: Vec<(u32, f64, f64)> = entries
                .iter()
                .map(|e| (e.laps, e.cumulative_distance, e.speed))
                .collect();

            self.standings = argsort(&sort_keys, SortOrder::Descending)
                .into_iter()
                .enumerate()
                .map(|(rank, idx)| Standing {
                    car_no: entries[idx].car_no,
                    position: rank as u32 + 1,
                    laps: entries[idx].laps,
                    distance: entries[idx].cumulative_distance,
                })
                .collect();
        }

        &self.standings
    }

    /// The method freezes the order and assigns the point awards. Idempotent: the second and
    /// any later call returns the already frozen result untouched.
    pub fn finalize(&mut self, entries: &[RankEntry]) -> &[FinalStanding] {
        if self.final_result.is_none() {
            self.update(entries);

            let final_standings = self
                .standings
                .iter()
                .map(|standing| FinalStanding {
                    car_no: standing.car_no,
                    position: standing.position,
                    laps: standing.laps,
                    distance: standing.distance,
                    points: POINTS_TABLE
                        .get(standing.position as usize - 1)
                        .copied()
                        .unwrap_or(0),
                })
                .collect();

            self.final_result = Some(final_standings);
        }

        self.final_result.as_ref().unwrap()
    }

    pub fn standings(&self) -> &[Standing] {
        &self.standings
    }

    pub fn final_standings(&self) -> Option<&[FinalStanding]> {
        self.final_result.as_deref()
    }

    pub fn is_finalized(&self) -> bool {
        self.final_result.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(car_no: u32, laps: u32, distance: f64, speed: f64) -> RankEntry {
        RankEntry {
            car_no,
            laps,
            cumulative_distance: distance,
            speed,
        }
    }

    #[test]
    fn laps_dominate_distance_and_speed() {
        let mut ranking = RaceRanking::new();
        let standings = ranking.update(&[
            entry(1, 2, 500.0, 30.0),
            entry(2, 3, 100.0, 1.0),
            entry(3, 2, 400.0, 50.0),
        ]);

        let order: Vec<u32> = standings.iter().map(|s| s.car_no).collect();
        assert_eq!(order, vec![2, 1, 3]);
        assert_eq!(standings[0].position, 1);
        assert_eq!(standings[2].position, 3);
    }

    #[test]
    fn speed_breaks_exact_ties_independent_of_insertion_order() {
        let mut ranking_a = RaceRanking::new();
        let mut ranking_b = RaceRanking::new();

        let fast = entry(7, 2, 250.0, 14.0);
        let slow = entry(8, 2, 250.0, 9.0);

        let order_a: Vec<u32> = ranking_a
            .update(&[fast, slow])
            .iter()
            .map(|s| s.car_no)
            .collect();
        let order_b: Vec<u32> = ranking_b
            .update(&[slow, fast])
            .iter()
            .map(|s| s.car_no)
            .collect();

        assert_eq!(order_a, vec![7, 8]);
        assert_eq!(order_a, order_b);
    }

    #[test]
    fn points_follow_the_race_table() {
        let mut ranking = RaceRanking::new();
        let entries: Vec<RankEntry> = (0..12)
            .map(|i| entry(i as u32, 5, 1000.0 - i as f64, 10.0))
            .collect();

        let finals = ranking.finalize(&entries);

        assert_eq!(finals[0].points, 25);
        assert_eq!(finals[1].points, 18);
        assert_eq!(finals[9].points, 1);
        assert_eq!(finals[10].points, 0);
        assert_eq!(finals[11].points, 0);
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut ranking = RaceRanking::new();
        let first = ranking
            .finalize(&[entry(1, 3, 300.0, 10.0), entry(2, 2, 280.0, 12.0)])
            .to_vec();

        // a second end-race call with different data must not re-score
        let second = ranking
            .finalize(&[entry(2, 9, 900.0, 50.0), entry(1, 0, 0.0, 0.0)])
            .to_vec();

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.car_no, b.car_no);
            assert_eq!(a.position, b.position);
            assert_eq!(a.points, b.points);
        }
    }

    #[test]
    fn updates_after_finalize_are_frozen() {
        let mut ranking = RaceRanking::new();
        ranking.finalize(&[entry(1, 3, 300.0, 10.0), entry(2, 2, 280.0, 12.0)]);

        let standings = ranking.update(&[entry(2, 9, 900.0, 50.0), entry(1, 0, 0.0, 0.0)]);
        let order: Vec<u32> = standings.iter().map(|s| s.car_no).collect();
        assert_eq!(order, vec![1, 2]);
    }
}
