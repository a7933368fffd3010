use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::core::episode::{Episode, EpisodeStats};
use crate::core::error::{RecorderError, Result};
use crate::core::frame::{ChannelMap, ChannelValue};
use crate::dataset::layout::DatasetLayout;
use crate::dataset::queue::WriteQueue;
use crate::dataset::writer::{DatasetInfo, DatasetWriter};
use crate::engine::state::RecorderState;
use crate::hal::traits::{ArmInterface, CameraInterface};
use crate::observability::metrics::CaptureMetrics;

/// Recording session configuration, established once at construction
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub dataset_name: String,
    pub root: PathBuf,
    pub robot_type: String,
    /// Target sampling rate; recorded once in the dataset metadata
    pub fps: u32,
    /// Episodes per chunk directory
    pub chunk_size: u64,
    /// Upper bound for one source read; a timeout becomes a per-channel
    /// read failure, not a fatal error
    pub read_timeout: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            dataset_name: "dataset".to_string(),
            root: PathBuf::from("./lerobot_data"),
            robot_type: "realman_dual_arm".to_string(),
            fps: 30,
            chunk_size: crate::dataset::layout::DEFAULT_CHUNK_SIZE,
            read_timeout: Duration::from_millis(200),
        }
    }
}

/// End-of-session summary returned by [`Recorder::close`]
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub info: DatasetInfo,
    pub episodes_failed: u64,
}

/// The arm and camera collaborators, bundled so the sampling task can take
/// ownership while recording and hand them back on stop.
struct SourceSet {
    arms: Vec<Box<dyn ArmInterface>>,
    cameras: Vec<Box<dyn CameraInterface>>,
}

/// Drives fixed-period sampling and owns the in-progress episode.
///
/// One recorder is one recording session: construction is the only place
/// sources and dataset configuration are established, and only one episode
/// is active at a time. Finalized episodes are handed to the dataset write
/// queue in finalize order.
pub struct Recorder {
    config: RecorderConfig,
    interval: Duration,
    sources: Option<SourceSet>,
    episode: Option<Episode>,
    state: RecorderState,
    queue: WriteQueue,
    metrics: Arc<CaptureMetrics>,
    stop_tx: Option<broadcast::Sender<()>>,
    sampler: Option<JoinHandle<(SourceSet, Episode)>>,
    recording_since: Option<Instant>,
}

impl Recorder {
    pub fn new(
        config: RecorderConfig,
        arms: Vec<Box<dyn ArmInterface>>,
        cameras: Vec<Box<dyn CameraInterface>>,
    ) -> Result<Self> {
        if config.fps == 0 {
            return Err(RecorderError::State(
                "Target fps must be at least 1".to_string(),
            ));
        }

        let layout = DatasetLayout::new(config.root.join(&config.dataset_name), config.chunk_size);
        let writer = DatasetWriter::open(
            layout,
            &config.dataset_name,
            &config.robot_type,
            config.fps,
        )?;
        let queue = WriteQueue::spawn(writer);

        let interval = Duration::from_secs_f64(1.0 / config.fps as f64);
        Ok(Self {
            config,
            interval,
            sources: Some(SourceSet { arms, cameras }),
            episode: None,
            state: RecorderState::Idle,
            queue,
            metrics: Arc::new(CaptureMetrics::new()),
            stop_tx: None,
            sampler: None,
            recording_since: None,
        })
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn metrics(&self) -> Arc<CaptureMetrics> {
        self.metrics.clone()
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Connect all sources. Any failure is fatal: recording cannot start
    /// with an unreachable arm or camera.
    pub async fn connect(&mut self) -> Result<()> {
        let sources = self.sources.as_mut().ok_or_else(|| {
            RecorderError::State("Sources are held by the sampling task".to_string())
        })?;

        for arm in sources.arms.iter_mut() {
            let name = arm.name().to_string();
            arm.connect()
                .await
                .map_err(|e| RecorderError::Connection {
                    source_name: format!("arm {name}"),
                    reason: e.to_string(),
                })?;
            println!("Connected to arm {name}");
        }
        for camera in sources.cameras.iter_mut() {
            let name = camera.name().to_string();
            camera
                .connect()
                .await
                .map_err(|e| RecorderError::Connection {
                    source_name: format!("camera {name}"),
                    reason: e.to_string(),
                })?;
            println!("Connected to camera {name}");
        }
        Ok(())
    }

    /// Allocate the next episode index from the dataset and activate an
    /// empty episode for it.
    pub fn start_episode(&mut self, task: impl Into<String>, task_index: u32) -> Result<u64> {
        // Only from Idle: the Recording -> EpisodeActive edge belongs to
        // stop_recording, not to starting a second concurrent episode.
        if self.state != RecorderState::Idle {
            return Err(RecorderError::State(format!(
                "Cannot start_episode while {}",
                self.state.name()
            )));
        }

        let episode_index = self.queue.allocate_episode_index();
        let task = task.into();
        println!("Started episode {episode_index}: {task}");

        self.episode = Some(Episode::new(episode_index, task, task_index));
        self.state = RecorderState::EpisodeActive;
        Ok(episode_index)
    }

    /// Begin the fixed-period sampling cycle on a spawned task. The task
    /// owns the sources and the active episode until [`stop_recording`]
    /// joins it.
    ///
    /// [`stop_recording`]: Recorder::stop_recording
    pub fn start_recording(&mut self) -> Result<()> {
        self.transition(RecorderState::Recording, "start_recording")?;

        let episode = self
            .episode
            .take()
            .ok_or_else(|| RecorderError::State("No active episode".to_string()))?;
        let sources = match self.sources.take() {
            Some(sources) => sources,
            None => {
                self.episode = Some(episode);
                return Err(RecorderError::State(
                    "Sources are held by the sampling task".to_string(),
                ));
            }
        };

        let (stop_tx, stop_rx) = broadcast::channel(16);
        let params = SamplingParams {
            interval: self.interval,
            read_timeout: self.config.read_timeout,
            status_every: self.config.fps.max(1) as u64,
        };
        let metrics = self.metrics.clone();

        self.sampler = Some(tokio::spawn(sampling_loop(
            sources, episode, params, metrics, stop_rx,
        )));
        self.stop_tx = Some(stop_tx);
        self.recording_since = Some(Instant::now());
        self.state = RecorderState::Recording;
        Ok(())
    }

    /// Signal the sampling loop to exit after its current cycle and wait
    /// for it. Never truncates a half-built frame. Idempotent when already
    /// stopped.
    pub async fn stop_recording(&mut self) -> Result<()> {
        if self.state != RecorderState::Recording {
            return Ok(());
        }

        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        let sampler = self
            .sampler
            .take()
            .ok_or_else(|| RecorderError::State("Sampling task is missing".to_string()))?;
        let (sources, episode) = sampler
            .await
            .map_err(|e| RecorderError::State(format!("Sampling task failed: {e}")))?;

        self.sources = Some(sources);
        self.episode = Some(episode);
        self.state = RecorderState::EpisodeActive;

        if let Some(since) = self.recording_since.take() {
            print!("{}", self.metrics.report(since.elapsed()).render());
        }
        Ok(())
    }

    /// Finalize the active episode and hand it to the dataset writer.
    pub fn end_episode(&mut self) -> Result<EpisodeStats> {
        self.transition(RecorderState::Idle, "end_episode")?;

        let mut episode = self
            .episode
            .take()
            .ok_or_else(|| RecorderError::State("No active episode".to_string()))?;

        // An empty episode is discarded; the session returns to idle either way.
        if let Err(e) = episode.finalize() {
            self.state = RecorderState::Idle;
            return Err(e);
        }

        let stats = episode.stats();
        println!(
            "Episode {} complete: {} frames, {:.2}s, {:.2} FPS average",
            stats.episode_index, stats.length, stats.duration, stats.average_fps
        );

        self.queue.enqueue(episode)?;
        self.state = RecorderState::Idle;
        Ok(stats)
    }

    /// Stop any in-flight recording, disconnect all sources, drain the
    /// write queue and return the final dataset counters.
    pub async fn close(mut self) -> Result<SessionSummary> {
        self.stop_recording().await?;
        if self.state == RecorderState::EpisodeActive {
            match self.end_episode() {
                Ok(_) | Err(RecorderError::EmptyEpisode(_)) => {}
                Err(e) => return Err(e),
            }
        }

        if let Some(mut sources) = self.sources.take() {
            for arm in sources.arms.iter_mut() {
                if let Err(e) = arm.disconnect().await {
                    eprintln!("Failed to disconnect arm {}: {e}", arm.name());
                }
            }
            for camera in sources.cameras.iter_mut() {
                if let Err(e) = camera.disconnect().await {
                    eprintln!("Failed to disconnect camera {}: {e}", camera.name());
                }
            }
        }

        let (writer, episodes_failed) = self.queue.close()?;
        writer.save_dataset_info()?;
        Ok(SessionSummary {
            info: writer.info().clone(),
            episodes_failed,
        })
    }

    fn transition(&self, target: RecorderState, operation: &str) -> Result<()> {
        if !self.state.can_transition_to(target) {
            return Err(RecorderError::State(format!(
                "Cannot {operation} while {}",
                self.state.name()
            )));
        }
        Ok(())
    }
}

struct SamplingParams {
    interval: Duration,
    read_timeout: Duration,
    status_every: u64,
}

/// The fixed-period sampling cycle.
///
/// Per cycle: capture the timestamp, read every arm then every camera
/// sequentially (bounding worst-case inter-channel skew to the sum of read
/// latencies), assemble the channel maps and append the frame. The stop
/// signal is checked once per cycle boundary, never mid-read. If a cycle
/// overruns the target interval there is no catch-up: achieved FPS degrades
/// gracefully and is reported, history is never dropped to compensate.
async fn sampling_loop(
    mut sources: SourceSet,
    mut episode: Episode,
    params: SamplingParams,
    metrics: Arc<CaptureMetrics>,
    mut stop_rx: broadcast::Receiver<()>,
) -> (SourceSet, Episode) {
    let session_start = Instant::now();
    let mut frame_count = 0u64;

    loop {
        if stop_rx.try_recv().is_ok() {
            break;
        }

        let cycle_start = Instant::now();
        // One timestamp per frame, captured before any source read
        let timestamp = epoch_seconds();

        let mut observation = ChannelMap::new();
        let mut action = ChannelMap::new();
        let mut state = ChannelMap::new();

        for arm in sources.arms.iter_mut() {
            let name = arm.name().to_string();
            let reading = match tokio::time::timeout(params.read_timeout, arm.read_state()).await {
                Ok(Ok(arm_state)) => Ok(arm_state),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!(
                    "read timed out after {:?}",
                    params.read_timeout
                )),
            };
            insert_arm_reading(
                &name,
                reading,
                &metrics,
                &mut observation,
                &mut action,
                &mut state,
            );
        }

        for camera in sources.cameras.iter_mut() {
            let name = camera.name().to_string();
            let channel = camera_channel(&name);
            match tokio::time::timeout(params.read_timeout, camera.read_frame()).await {
                Ok(Ok(image)) => {
                    observation.insert(
                        channel,
                        ChannelValue::Image {
                            height: image.height,
                            width: image.width,
                            data: image.data,
                        },
                    );
                }
                Ok(Err(e)) => {
                    observation.insert(channel.clone(), ChannelValue::Error(e.to_string()));
                    metrics.record_read_error(&channel);
                }
                Err(_) => {
                    let msg = format!("read timed out after {:?}", params.read_timeout);
                    observation.insert(channel.clone(), ChannelValue::Error(msg));
                    metrics.record_read_error(&channel);
                }
            }
        }

        if let Err(e) = episode.add_frame(timestamp, observation, action, state) {
            // Schema divergence mid-episode is fatal for the episode; stop
            // sampling rather than feed heterogeneous columns to the writer.
            eprintln!("Dropping out of recording loop: {e}");
            break;
        }
        metrics.record_frame();
        frame_count += 1;

        if frame_count % params.status_every == 0 {
            let elapsed = session_start.elapsed().as_secs_f64();
            let achieved = if elapsed > 0.0 {
                frame_count as f64 / elapsed
            } else {
                0.0
            };
            println!("Recording... {elapsed:.1}s | {frame_count} frames | {achieved:.1} FPS");
        }

        // No catch-up on overrun: sleep only for whatever interval remains
        let elapsed = cycle_start.elapsed();
        if elapsed < params.interval {
            tokio::time::sleep(params.interval - elapsed).await;
        }
    }

    (sources, episode)
}

fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn camera_channel(name: &str) -> String {
    format!("observation.camera_{name}")
}

/// Populate the arm's channels from one read. A failed read marks every
/// channel of this arm with the error message and counts each marked
/// channel in the metrics; the channel key set stays identical either way,
/// so the episode schema is stable.
///
/// Action currently mirrors observation: during pure demonstration capture
/// there is no distinct commanded value. The two maps stay structurally
/// separate so a teleoperation layer can diverge them later.
fn insert_arm_reading(
    name: &str,
    reading: std::result::Result<crate::hal::traits::ArmState, String>,
    metrics: &CaptureMetrics,
    observation: &mut ChannelMap,
    action: &mut ChannelMap,
    state: &mut ChannelMap,
) {
    let obs_arm = format!("observation.state.{name}_arm");
    let obs_eef_pos = format!("observation.state.{name}_eef_pos");
    let obs_eef_euler = format!("observation.state.{name}_eef_euler");
    let obs_gripper = format!("observation.state.{name}_gripper");
    let act_arm = format!("action.{name}_arm");
    let act_gripper = format!("action.{name}_gripper");
    let state_arm = format!("state.{name}_arm");

    match reading {
        Ok(arm_state) => {
            let joints = arm_state.joint_angles.to_vec();
            observation.insert(obs_arm, ChannelValue::FloatVec(joints.clone()));
            observation.insert(
                obs_eef_pos,
                ChannelValue::FloatVec(arm_state.eef_position.to_vec()),
            );
            observation.insert(
                obs_eef_euler,
                ChannelValue::FloatVec(arm_state.eef_orientation_euler.to_vec()),
            );
            observation.insert(obs_gripper, ChannelValue::scalar(arm_state.gripper_state));

            action.insert(act_arm, ChannelValue::FloatVec(joints.clone()));
            action.insert(act_gripper, ChannelValue::scalar(arm_state.gripper_state));

            state.insert(state_arm, ChannelValue::FloatVec(joints));
        }
        Err(msg) => {
            for key in [obs_arm, obs_eef_pos, obs_eef_euler, obs_gripper] {
                metrics.record_read_error(&key);
                observation.insert(key, ChannelValue::Error(msg.clone()));
            }
            for key in [act_arm, act_gripper] {
                metrics.record_read_error(&key);
                action.insert(key, ChannelValue::Error(msg.clone()));
            }
            metrics.record_read_error(&state_arm);
            state.insert(state_arm, ChannelValue::Error(msg));
        }
    }
}
