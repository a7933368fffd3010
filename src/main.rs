use std::time::Duration;

use armcap::engine::{Recorder, RecorderConfig};
use armcap::hal::mock::{SimulatedArm, SimulatedCamera};
use armcap::hal::{ArmInterface, CameraInterface};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("armcap - Episodic Recording Demo");
    println!("================================\n");

    let config = RecorderConfig {
        dataset_name: "demo".to_string(),
        fps: 10,
        ..RecorderConfig::default()
    };

    let arms: Vec<Box<dyn ArmInterface>> = vec![
        Box::new(SimulatedArm::new("left")),
        Box::new(SimulatedArm::new("right")),
    ];
    let cameras: Vec<Box<dyn CameraInterface>> =
        vec![Box::new(SimulatedCamera::new("video0", 64, 48))];

    let mut recorder = Recorder::new(config, arms, cameras)?;
    recorder.connect().await?;

    recorder.start_episode("Pick and place (simulated)", 0)?;
    recorder.start_recording()?;

    // Stand-in for the operator performing the task
    tokio::time::sleep(Duration::from_secs(2)).await;

    recorder.stop_recording().await?;
    let stats = recorder.end_episode()?;
    let summary = recorder.close().await?;

    println!("\nDemo complete:");
    println!("  Episode 0: {} frames over {:.2}s", stats.length, stats.duration);
    println!(
        "  Dataset: {} episodes, {} frames, {} failed writes",
        summary.info.num_episodes, summary.info.total_frames, summary.episodes_failed
    );
    println!("  Location: ./lerobot_data/demo");

    Ok(())
}
