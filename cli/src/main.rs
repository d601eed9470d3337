use clap::Parser;
use driveline::core::handle_race::handle_race;
use driveline::interfaces::telemetry::TelemetryEvent;
use driveline::post::race_result::RaceResult;
use driveline::pre::read_sim_pars::read_sim_pars;
use driveline::pre::sim_opts::{check_sim_opts, SimOpts};
use plotters::prelude::*;
use rayon::prelude::*;
use std::thread;
use std::time::Instant;

fn export_results_plot(result: &RaceResult) -> anyhow::Result<String> {
    let out_dir = std::path::Path::new("output");
    std::fs::create_dir_all(out_dir)?;
    let out_path = out_dir.join("race_plot.png");

    let max_laps = result.laptimes.iter().map(|lt| lt.len()).max().unwrap_or(0);
    if max_laps == 0 {
        anyhow::bail!("No completed laps to plot!");
    }

    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for laptimes in result.laptimes.iter() {
        for &laptime in laptimes.iter() {
            if laptime.is_finite() && laptime > 0.0 {
                if laptime < y_min {
                    y_min = laptime;
                }
                if laptime > y_max {
                    y_max = laptime;
                }
            }
        }
    }
    if !y_min.is_finite() || !y_max.is_finite() {
        y_min = 0.0;
        y_max = 1.0;
    }
    let margin = (y_max - y_min).max(0.1) * 0.05;
    y_min -= margin;
    y_max += margin;

    let root = BitMapBackend::new(&out_path, (1280, 720)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Lap times", ("sans-serif", 24).into_font())
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(1u32..max_laps as u32 + 1, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Lap")
        .y_desc("s")
        .label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 16))
        .draw()?;

    let palette = Palette99::pick;
    for (i, pair) in result.car_driver_pairs.iter().enumerate() {
        let series: Vec<(u32, f64)> = result.laptimes[i]
            .iter()
            .enumerate()
            .map(|(lap, &laptime)| (lap as u32 + 1, laptime))
            .collect();

        chart
            .draw_series(LineSeries::new(series.into_iter(), palette(i)))?
            .label(format!("{} ({})", pair.car_no, pair.driver_initials))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], palette(i)));
    }

    chart
        .configure_series_labels()
        .border_style(&BLACK)
        .background_style(&WHITE.mix(0.8))
        .label_font(("sans-serif", 16))
        .position(plotters::chart::SeriesLabelPosition::UpperRight)
        .draw()?;

    root.present()?;
    Ok(out_path.to_string_lossy().into_owned())
}

fn main() -> anyhow::Result<()> {
    // PRE-PROCESSING ------------------------------------------------------------------------------
    // get simulation options from the command line arguments
    let sim_opts: SimOpts = SimOpts::parse();
    check_sim_opts(&sim_opts)?;

    // get simulation parameters
    let mut sim_pars = if let Some(parfile_path) = &sim_opts.parfile_path {
        println!("INFO: Reading simulation parameters from {:?}", parfile_path);
        read_sim_pars(parfile_path)?
    } else {
        anyhow::bail!("No parameter file provided! Use -p <path_to_json> to run the simulation.");
    };

    if let Some(seed) = sim_opts.seed {
        sim_pars.race_pars.seed = seed;
    }

    // print race details
    println!(
        "INFO: Simulating {} with {} cars and a time step size of {:.4}s",
        sim_pars.track_pars.name,
        sim_pars.car_profiles.len(),
        sim_opts.timestep_size
    );

    // EXECUTION -----------------------------------------------------------------------------------
    if sim_opts.live {
        // LIVE CASE - real-time simulation, telemetry events printed as they arrive
        println!("INFO: Starting live simulation...");

        let (tx, rx) = flume::unbounded();
        let sim_opts_thread = sim_opts.clone();
        let sim_pars_thread = sim_pars.clone();

        let sim_handle = thread::spawn(move || {
            handle_race(
                &sim_pars_thread,
                sim_opts_thread.timestep_size,
                false,
                Some(&tx),
                sim_opts_thread.realtime_factor,
            )
        });

        let mut cur_leader = None;
        for event in rx.iter() {
            match event {
                TelemetryEvent::Lap(lap) => println!(
                    "INFO: Car {} completed lap {} at race time {:.3}s",
                    lap.car_no, lap.lap, lap.racetime
                ),
                TelemetryEvent::Standings(standings) => {
                    let leader = standings.first().map(|s| s.car_no);
                    if leader != cur_leader {
                        if let Some(car_no) = leader {
                            println!("INFO: Car {} takes the lead", car_no);
                        }
                        cur_leader = leader;
                    }
                }
                TelemetryEvent::Vehicle(_) => {}
                TelemetryEvent::Finished(result) => {
                    result.print_final_standings();
                }
            }
        }

        let race_result = sim_handle
            .join()
            .map_err(|_| anyhow::anyhow!("Simulation thread panicked!"))??;
        race_result.print_laptimes();
    } else if sim_opts.no_sim_runs > 1 {
        // BATCH CASE - parallel runs over different jitter seeds
        println!(
            "INFO: Running {} simulation runs in parallel...",
            sim_opts.no_sim_runs
        );
        let t_start = Instant::now();

        let winners = (0..sim_opts.no_sim_runs)
            .into_par_iter()
            .map(|run| {
                let mut sim_pars_run = sim_pars.clone();
                sim_pars_run.race_pars.seed =
                    sim_pars.race_pars.seed.wrapping_add(run as u64);

                let result =
                    handle_race(&sim_pars_run, sim_opts.timestep_size, false, None, 1.0)?;
                Ok(result.final_standings[0].car_no)
            })
            .collect::<anyhow::Result<Vec<u32>>>()?;

        println!("INFO: Execution time: {}ms", t_start.elapsed().as_millis());

        for profile in sim_pars.car_profiles.iter() {
            let wins = winners
                .iter()
                .filter(|&&car_no| car_no == profile.car_no)
                .count();
            println!(
                "RESULT: Car {:3} ({}) won {:4} of {} runs ({:.1}%)",
                profile.car_no,
                profile.driver_initials,
                wins,
                sim_opts.no_sim_runs,
                100.0 * wins as f64 / sim_opts.no_sim_runs as f64
            );
        }
    } else {
        // SINGLE RUN CASE
        println!("INFO: Running simulation...");
        let t_start = Instant::now();

        let race_result =
            handle_race(&sim_pars, sim_opts.timestep_size, sim_opts.debug, None, 1.0)?;

        println!("INFO: Execution time: {}ms", t_start.elapsed().as_millis());

        race_result.print_final_standings();
        race_result.print_laptimes();

        match race_result.write_results_txt(None) {
            Ok(path) => println!("INFO: Results written to {}", path),
            Err(e) => eprintln!("WARNING: Could not write results: {}", e),
        }

        match race_result.write_laptimes_csv(None) {
            Ok(path) => println!("INFO: Lap times written to {}", path),
            Err(e) => eprintln!("WARNING: Could not write lap times: {}", e),
        }

        match export_results_plot(&race_result) {
            Ok(path) => println!("INFO: Plot written to {}", path),
            Err(e) => eprintln!("WARNING: Could not write plot: {}", e),
        }
    }

    Ok(())
}
