use argh::FromArgs;
use glam::{DMat3, DQuat, DVec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use vio_init::{
    extrinsic::{CalibrationConfig, ExtrinsicRotationCalibrator},
    linalg::rotation::rotation_angle_deg,
    pose::Correspondence,
};

#[derive(FromArgs)]
/// Calibrate the camera-IMU rotation on a simulated sequence
struct Args {
    /// number of frames to simulate
    #[argh(option, short = 'n', default = "40")]
    frames: usize,

    /// tracked points per frame
    #[argh(option, short = 'p', default = "80")]
    points: usize,

    /// feature noise in pixels at a 460 pixel focal length
    #[argh(option, default = "0.5")]
    noise_px: f64,

    /// gyroscope rotation noise in degrees per frame
    #[argh(option, default = "0.1")]
    imu_noise_deg: f64,

    /// seed of the simulation
    #[argh(option, short = 's', default = "0")]
    seed: u64,

    /// optional JSON file with the calibration configuration
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,
}

fn random_axis(rng: &mut StdRng) -> DVec3 {
    DVec3::new(
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
    )
    .normalize_or(DVec3::Z)
}

/// Track `n` random landmarks across a camera motion; the pose maps second view points into the
/// first view.
fn simulate_tracks(
    rng: &mut StdRng,
    rotation: DMat3,
    translation: DVec3,
    n: usize,
    noise: f64,
) -> Vec<Correspondence> {
    let mut tracks = Vec::with_capacity(n);
    while tracks.len() < n {
        let x1 = DVec3::new(
            rng.random_range(-5.0..5.0),
            rng.random_range(-4.0..4.0),
            rng.random_range(4.0..20.0),
        );
        let x2 = rotation.transpose() * (x1 - translation);
        if x2.z < 1.0 {
            continue;
        }
        let jitter = DVec3::new(
            rng.random_range(-noise..=noise),
            rng.random_range(-noise..=noise),
            0.0,
        );
        tracks.push(Correspondence::new(x1 / x1.z, x2 / x2.z + jitter));
    }
    tracks
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let config = match &args.config {
        Some(path) => serde_json::from_str::<CalibrationConfig>(&std::fs::read_to_string(path)?)?,
        None => CalibrationConfig::default(),
    };
    log::info!("calibration config: {}", serde_json::to_string(&config)?);

    let mut rng = StdRng::seed_from_u64(args.seed);
    let camera_from_imu = DMat3::from_axis_angle(random_axis(&mut rng), rng.random_range(0.1..1.0));
    let feature_noise = args.noise_px / 460.0;
    let imu_noise = args.imu_noise_deg.to_radians();

    let mut calib = ExtrinsicRotationCalibrator::new(config);
    for frame in 0..args.frames {
        let camera_rotation =
            DMat3::from_axis_angle(random_axis(&mut rng), rng.random_range(0.05..0.35));
        let translation = DVec3::new(
            rng.random_range(0.3..1.0),
            rng.random_range(-0.3..0.3),
            rng.random_range(-0.3..0.3),
        );
        let tracks = simulate_tracks(
            &mut rng,
            camera_rotation,
            translation,
            args.points,
            feature_noise,
        );

        let imu_rotation = DMat3::from_axis_angle(random_axis(&mut rng), imu_noise)
            * camera_from_imu.transpose()
            * camera_rotation
            * camera_from_imu;
        let estimate = calib.process_frame(&tracks, DQuat::from_mat3(&imu_rotation));

        println!(
            "frame {:3}: error {:7.3} deg, confidence {:.3}, converged {}",
            frame,
            rotation_angle_deg(&estimate.camera_from_imu, &camera_from_imu),
            estimate.confidence,
            estimate.converged
        );
    }

    match calib.calibrated_rotation() {
        Ok(rotation) => println!(
            "calibrated rotation error: {:.4} deg",
            rotation_angle_deg(&rotation, &camera_from_imu)
        ),
        Err(err) => println!("{err}"),
    }

    Ok(())
}
