// Particle Filter localization sample
//
// usage: cargo run --example particle_filter [map_data.txt] [trajectory.csv]
//
// Without a map file a random one is generated. The ground truth, the estimate
// and the error of every cycle are written to the csv file when one is given.

use log::info;
use nalgebra::Vector3;
use serde::Serialize;
use std::error::Error;

extern crate pf_localization;
use pf_localization::data::map::read_map;
use pf_localization::data::simulation::{random_map, Simulation, SimulationConfig};
use pf_localization::localization::{BayesianFilter, ParticleFilter, ParticleFilterConfig};
use pf_localization::utils::{pose_error, rad2deg};

#[derive(Debug, Serialize)]
struct Record {
    time: f64,
    gt_x: f64,
    gt_y: f64,
    gt_yaw: f64,
    best_x: f64,
    best_y: f64,
    best_yaw: f64,
    err_x: f64,
    err_y: f64,
    err_yaw: f64,
    ess: f64,
    associations: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let mut args = std::env::args().skip(1);

    let map = match args.next() {
        Some(path) => read_map(path)?,
        None => random_map(42, 80.0, 1)?,
    };
    info!("map with {} landmarks", map.len());

    let sim_steps = 2000;
    let start = Vector3::new(0.0, 0.0, 0.0);
    let sim_config = SimulationConfig::default();
    let dt = sim_config.dt;
    let sim = Simulation::new(sim_config, map.clone(), start)?;

    let config = ParticleFilterConfig {
        seed: Some(1),
        ..Default::default()
    };
    let mut pf = ParticleFilter::new(config, map)?;
    pf.initialize(&start)?;
    info!(
        "{} particles, {:?} resampling, {} landmarks, sensor range {} m",
        pf.particles().len(),
        pf.config().resampling,
        pf.landmarks().len(),
        pf.config().sensor_range
    );

    let mut writer = match args.next() {
        Some(path) => Some(csv::Writer::from_path(path)?),
        None => None,
    };

    let mut cum_error = Vector3::zeros();
    for step in sim.take(sim_steps) {
        pf.update_estimate(Some(step.control), Some(step.observations.as_slice()), dt)?;
        let Some(best) = pf.best_particle() else {
            break;
        };
        let err = pose_error(&step.ground_truth, &best.pose);
        cum_error += err;

        if let Some(w) = writer.as_mut() {
            w.serialize(Record {
                time: step.time,
                gt_x: step.ground_truth.x,
                gt_y: step.ground_truth.y,
                gt_yaw: step.ground_truth.z,
                best_x: best.pose.x,
                best_y: best.pose.y,
                best_yaw: best.pose.z,
                err_x: err.x,
                err_y: err.y,
                err_yaw: err.z,
                ess: pf.effective_sample_size(),
                associations: best.associations_text(),
            })?;
        }
    }
    if let Some(mut w) = writer {
        w.flush()?;
    }

    let mean_error = cum_error / sim_steps as f64;
    info!(
        "mean error: x = {:.3} m, y = {:.3} m, yaw = {:.3} deg",
        mean_error.x,
        mean_error.y,
        rad2deg(mean_error.z)
    );
    if let Some(estimate) = pf.gaussian_estimate() {
        info!("final estimate {:?}", estimate.x);
        info!("final std devs {:?}", estimate.std_devs());
    }
    Ok(())
}
