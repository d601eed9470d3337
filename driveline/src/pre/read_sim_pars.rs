use crate::core::race::RacePars;
use crate::core::track::TrackPars;
use crate::core::vehicle::CarProfile;
use anyhow::Context;
use serde::Deserialize;
use std::fs::OpenOptions;
use std::path::Path;

/// SimPars is used to store all other parameter structs.
#[derive(Debug, Deserialize, Clone)]
pub struct SimPars {
    pub race_pars: RacePars,
    pub track_pars: TrackPars,
    pub car_profiles: Vec<CarProfile>,
}

/// read_sim_pars reads the JSON file and decodes the JSON string into the simulation
/// parameters struct. Semantic validation (geometry, profile ranges) happens when the race
/// is constructed from these parameters.
pub fn read_sim_pars(filepath: &Path) -> anyhow::Result<SimPars> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!(
            "Failed to open parameter file {}!",
            filepath.display()
        ))?;
    let pars = serde_json::from_reader(&fh).context(format!(
        "Failed to parse parameter file {}!",
        filepath.display()
    ))?;
    Ok(pars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_parameter_file_parses_with_defaults() {
        let json = r##"{
            "race_pars": {
                "race_duration_s": 30.0,
                "seed": 7
            },
            "track_pars": {
                "name": "oval",
                "segment_count": 64,
                "inner_radius": 10.5,
                "outer_radius": 15.0
            },
            "car_profiles": [
                {
                    "car_no": 44,
                    "driver_initials": "HAM",
                    "color": "#00d2be",
                    "aggressiveness": 80.0,
                    "consistency": 90.0
                },
                {
                    "car_no": 4,
                    "driver_initials": "NOR",
                    "color": "#ff8700",
                    "aggressiveness": 40.0,
                    "consistency": 50.0,
                    "is_player_controlled": true
                }
            ]
        }"##;

        let pars: SimPars = serde_json::from_str(json).unwrap();

        assert_eq!(pars.car_profiles.len(), 2);
        assert_eq!(pars.track_pars.look_ahead_count, 4, "serde default");
        assert!(!pars.car_profiles[0].is_player_controlled);
        assert!(pars.car_profiles[1].is_player_controlled);
        assert_eq!(pars.race_pars.seed, 7);
    }

    #[test]
    fn missing_parameter_file_reports_context() {
        let err = read_sim_pars(Path::new("does/not/exist.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to open parameter file"));
    }
}
