use crate::core::ranking::FinalStanding;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

/// CarDriverPair is used to store car number and driver initials for post-processing the
/// results.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CarDriverPair {
    pub car_no: u32,
    pub driver_initials: String,
}

/// RaceResult contains all race information that is required for post-processing: the final
/// point-scored standings and the lap times of every car. `laptimes[i]` holds the lap
/// durations of car i in the order of `car_driver_pairs`; cars may have completed different
/// lap counts.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RaceResult {
    pub race_duration_s: f64,
    pub car_driver_pairs: Vec<CarDriverPair>,
    pub final_standings: Vec<FinalStanding>,
    pub laptimes: Vec<Vec<f64>>,
}

impl RaceResult {
    /// print_final_standings prints the frozen standings with point awards to the console.
    pub fn print_final_standings(&self) {
        println!("RESULT: Final standings");

        for standing in self.final_standings.iter() {
            let initials = self
                .car_driver_pairs
                .iter()
                .find(|pair| pair.car_no == standing.car_no)
                .map(|pair| pair.driver_initials.as_str())
                .unwrap_or("???");

            println!(
                "P{:<2} car {:3} ({}) | {:2} laps | {:8.1}m | {:2} points",
                standing.position, standing.car_no, initials, standing.laps, standing.distance,
                standing.points
            );
        }
    }

    /// print_laptimes prints the resulting lap times of all cars to the console output.
    pub fn print_laptimes(&self) {
        let max_laps = self.laptimes.iter().map(|lt| lt.len()).max().unwrap_or(0);

        let mut tmp_string_header = String::from("lap, ");
        for (i, pair) in self.car_driver_pairs.iter().enumerate() {
            if i < self.car_driver_pairs.len() - 1 {
                write!(
                    &mut tmp_string_header,
                    "{:3} ({}), ",
                    pair.car_no, pair.driver_initials
                )
                .unwrap()
            } else {
                write!(
                    &mut tmp_string_header,
                    "{:3} ({})",
                    pair.car_no, pair.driver_initials
                )
                .unwrap()
            }
        }

        println!("RESULT: Lap times");
        println!("{}", tmp_string_header);

        for lap in 0..max_laps {
            let mut tmp_string_laptime = String::new();
            write!(&mut tmp_string_laptime, "{:3}, ", lap + 1).unwrap();

            for (i, laptimes) in self.laptimes.iter().enumerate() {
                let cell = match laptimes.get(lap) {
                    Some(laptime) => format!("{:8.3}s", laptime),
                    None => format!("{:>9}", "-"),
                };

                if i < self.laptimes.len() - 1 {
                    write!(&mut tmp_string_laptime, "{}, ", cell).unwrap();
                } else {
                    write!(&mut tmp_string_laptime, "{}", cell).unwrap();
                }
            }

            println!("{}", tmp_string_laptime);
        }
    }

    /// write_results_txt writes the final standings and the lap time table to a text file in
    /// output/ (or the given path) and returns the path to the written file.
    pub fn write_results_txt(&self, path: Option<&Path>) -> anyhow::Result<String> {
        let mut content = String::new();

        writeln!(&mut content, "RESULT: Final standings")?;
        for standing in self.final_standings.iter() {
            let initials = self
                .car_driver_pairs
                .iter()
                .find(|pair| pair.car_no == standing.car_no)
                .map(|pair| pair.driver_initials.as_str())
                .unwrap_or("???");

            writeln!(
                &mut content,
                "P{:<2} car {:3} ({}) | {:2} laps | {:8.1}m | {:2} points",
                standing.position, standing.car_no, initials, standing.laps, standing.distance,
                standing.points
            )?;
        }

        writeln!(&mut content, "RESULT: Lap times")?;
        write!(&mut content, "lap, ")?;
        for (i, pair) in self.car_driver_pairs.iter().enumerate() {
            if i < self.car_driver_pairs.len() - 1 {
                write!(&mut content, "{:3} ({}), ", pair.car_no, pair.driver_initials)?;
            } else {
                writeln!(&mut content, "{:3} ({})", pair.car_no, pair.driver_initials)?;
            }
        }

        let max_laps = self.laptimes.iter().map(|lt| lt.len()).max().unwrap_or(0);
        for lap in 0..max_laps {
            write!(&mut content, "{:3}, ", lap + 1)?;

            for (i, laptimes) in self.laptimes.iter().enumerate() {
                let cell = match laptimes.get(lap) {
                    Some(laptime) => format!("{:8.3}s", laptime),
                    None => format!("{:>9}", "-"),
                };

                if i < self.laptimes.len() - 1 {
                    write!(&mut content, "{}, ", cell)?;
                } else {
                    writeln!(&mut content, "{}", cell)?;
                }
            }
        }

        let out_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let out_dir = PathBuf::from("output");
                std::fs::create_dir_all(&out_dir)?;
                out_dir.join("last_run.txt")
            }
        };

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&out_path)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;

        Ok(out_path.to_string_lossy().into_owned())
    }

    /// write_laptimes_csv writes the lap time table to a CSV file in output/ (or the given
    /// path) and returns the path to the written file.
    pub fn write_laptimes_csv(&self, path: Option<&Path>) -> anyhow::Result<String> {
        let out_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let out_dir = PathBuf::from("output");
                std::fs::create_dir_all(&out_dir)?;
                out_dir.join("laptimes.csv")
            }
        };

        let mut writer = csv::Writer::from_path(&out_path)?;

        let mut header = vec!["lap".to_string()];
        for pair in self.car_driver_pairs.iter() {
            header.push(format!("{} ({})", pair.car_no, pair.driver_initials));
        }
        writer.write_record(&header)?;

        let max_laps = self.laptimes.iter().map(|lt| lt.len()).max().unwrap_or(0);
        for lap in 0..max_laps {
            let mut record = vec![(lap + 1).to_string()];
            for laptimes in self.laptimes.iter() {
                record.push(
                    laptimes
                        .get(lap)
                        .map(|laptime| format!("{:.3}", laptime))
                        .unwrap_or_default(),
                );
            }
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(out_path.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_result() -> RaceResult {
        RaceResult {
            race_duration_s: 30.0,
            car_driver_pairs: vec![
                CarDriverPair {
                    car_no: 44,
                    driver_initials: "HAM".to_string(),
                },
                CarDriverPair {
                    car_no: 33,
                    driver_initials: "VER".to_string(),
                },
            ],
            final_standings: vec![
                FinalStanding {
                    car_no: 33,
                    position: 1,
                    laps: 4,
                    distance: 350.0,
                    points: 25,
                },
                FinalStanding {
                    car_no: 44,
                    position: 2,
                    laps: 3,
                    distance: 310.0,
                    points: 18,
                },
            ],
            laptimes: vec![vec![7.5, 7.2, 7.3], vec![7.1, 7.0, 7.2, 6.9]],
        }
    }

    #[test]
    fn csv_export_writes_all_laps() {
        let result = test_result();
        let out_path = std::env::temp_dir().join("driveline_laptimes_test.csv");

        let written = result.write_laptimes_csv(Some(&out_path)).unwrap();
        let content = std::fs::read_to_string(written).unwrap();

        let lines: Vec<&str> = content.trim().lines().collect();
        assert_eq!(lines.len(), 5, "header plus four lap rows");
        assert!(lines[0].contains("44 (HAM)"));
        // car 44 only completed 3 laps, lap 4 cell stays empty
        assert!(lines[4].starts_with('4'));

        std::fs::remove_file(out_path).ok();
    }

    #[test]
    fn txt_export_contains_standings_and_laptimes() {
        let result = test_result();
        let out_path = std::env::temp_dir().join("driveline_results_test.txt");

        let written = result.write_results_txt(Some(&out_path)).unwrap();
        let content = std::fs::read_to_string(written).unwrap();

        assert!(content.contains("RESULT: Final standings"));
        assert!(content.contains("car  33 (VER) |  4 laps"));
        assert!(content.contains("25 points"));
        assert!(content.contains("RESULT: Lap times"));
        // car 44 only completed 3 laps, lap 4 cell shows a dash
        assert!(content.lines().last().unwrap().contains('-'));

        std::fs::remove_file(out_path).ok();
    }

    #[test]
    fn result_round_trips_through_serde() {
        let result = test_result();
        let json = serde_json::to_string(&result).unwrap();
        let parsed: RaceResult = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.final_standings.len(), 2);
        assert_eq!(parsed.final_standings[0].points, 25);
        assert_eq!(parsed.laptimes[1].len(), 4);
    }
}
