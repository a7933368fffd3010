use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::core::episode::Episode;
use crate::core::error::{RecorderError, Result};
use crate::core::frame::{ChannelValue, Frame};

/// The standalone single-arm recording format: `metadata` plus `frames[]`
/// with nested per-arm joint/pose/gripper objects. A convenience export
/// sink, not part of the core dataset contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmRecording {
    pub metadata: RecordingMetadata,
    pub frames: Vec<RecordedFrame>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub fps: u32,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub duration: Option<f64>,
    pub num_frames: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub frame_number: u64,
    pub timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arm1: Option<ArmSample>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arm2: Option<ArmSample>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmSample {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joint_states: Option<JointStates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_effector_pose: Option<EndEffectorPose>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gripper_state: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointStates {
    pub angles_rad: Vec<f64>,
    pub angles_deg: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndEffectorPose {
    pub position: Position,
    pub orientation_euler: EulerAngles,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EulerAngles {
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
}

impl ArmRecording {
    /// Flatten an episode's arm channels into the single-arm recording
    /// format. `arm1_name`/`arm2_name` are the channel-name identifiers of
    /// the arms to export (e.g. "left", "right"); camera channels are
    /// ignored by this sink.
    pub fn from_episode(
        episode: &Episode,
        fps: u32,
        arm1_name: Option<&str>,
        arm2_name: Option<&str>,
    ) -> Self {
        let frames = episode
            .frames()
            .iter()
            .map(|frame| RecordedFrame {
                frame_number: frame.frame_index,
                timestamp: frame.timestamp,
                arm1: arm1_name.map(|name| arm_sample(frame, name)),
                arm2: arm2_name.map(|name| arm_sample(frame, name)),
            })
            .collect();

        Self {
            metadata: RecordingMetadata {
                fps,
                start_time: episode.start_time(),
                end_time: episode.end_time(),
                duration: episode.duration(),
                num_frames: episode.len(),
            },
            frames,
        }
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| RecorderError::io(e, path))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// CSV flattening: one row per frame, columns per exported arm. Cells
    /// are left empty on frames where the arm's read failed.
    pub fn to_csv(&self) -> String {
        let arms: Vec<(&str, bool)> = [
            ("arm1", self.frames.iter().any(|f| f.arm1.is_some())),
            ("arm2", self.frames.iter().any(|f| f.arm2.is_some())),
        ]
        .into_iter()
        .filter(|(_, present)| *present)
        .collect();

        let mut out = String::from("frame_number,timestamp");
        for (prefix, _) in &arms {
            for i in 0..crate::hal::traits::JOINT_COUNT {
                out.push_str(&format!(",{prefix}_joint_{i}"));
            }
            for field in ["x", "y", "z", "rx", "ry", "rz", "gripper"] {
                out.push_str(&format!(",{prefix}_{field}"));
            }
        }
        out.push('\n');

        for frame in &self.frames {
            out.push_str(&format!("{},{}", frame.frame_number, frame.timestamp));
            for (prefix, _) in &arms {
                let sample = match *prefix {
                    "arm1" => frame.arm1.as_ref(),
                    _ => frame.arm2.as_ref(),
                };
                push_arm_cells(&mut out, sample);
            }
            out.push('\n');
        }

        out
    }

    pub fn save_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::create(path).map_err(|e| RecorderError::io(e, path))?;
        file.write_all(self.to_csv().as_bytes())
            .map_err(|e| RecorderError::io(e, path))?;
        Ok(())
    }
}

fn arm_sample(frame: &Frame, name: &str) -> ArmSample {
    let joints_key = format!("observation.state.{name}_arm");
    let pos_key = format!("observation.state.{name}_eef_pos");
    let euler_key = format!("observation.state.{name}_eef_euler");
    let gripper_key = format!("observation.state.{name}_gripper");

    if let Some(ChannelValue::Error(msg)) = frame.channel(&joints_key) {
        return ArmSample {
            joint_states: None,
            end_effector_pose: None,
            gripper_state: None,
            error: Some(msg.clone()),
        };
    }

    let joint_states = match frame.channel(&joints_key) {
        Some(ChannelValue::FloatVec(rad)) => Some(JointStates {
            angles_rad: rad.clone(),
            angles_deg: rad.iter().map(|a| a.to_degrees()).collect(),
        }),
        _ => None,
    };

    let end_effector_pose = match (frame.channel(&pos_key), frame.channel(&euler_key)) {
        (Some(ChannelValue::FloatVec(pos)), Some(ChannelValue::FloatVec(euler)))
            if pos.len() == 3 && euler.len() == 3 =>
        {
            Some(EndEffectorPose {
                position: Position {
                    x: pos[0],
                    y: pos[1],
                    z: pos[2],
                },
                orientation_euler: EulerAngles {
                    rx: euler[0],
                    ry: euler[1],
                    rz: euler[2],
                },
            })
        }
        _ => None,
    };

    let gripper_state = match frame.channel(&gripper_key) {
        Some(ChannelValue::FloatVec(v)) => v.first().copied(),
        _ => None,
    };

    ArmSample {
        joint_states,
        end_effector_pose,
        gripper_state,
        error: None,
    }
}

fn push_arm_cells(out: &mut String, sample: Option<&ArmSample>) {
    let joint_count = crate::hal::traits::JOINT_COUNT;

    let Some(sample) = sample else {
        for _ in 0..joint_count + 7 {
            out.push(',');
        }
        return;
    };

    match &sample.joint_states {
        Some(joints) => {
            for i in 0..joint_count {
                out.push(',');
                if let Some(angle) = joints.angles_rad.get(i) {
                    out.push_str(&angle.to_string());
                }
            }
        }
        None => {
            for _ in 0..joint_count {
                out.push(',');
            }
        }
    }

    match &sample.end_effector_pose {
        Some(pose) => {
            for value in [
                pose.position.x,
                pose.position.y,
                pose.position.z,
                pose.orientation_euler.rx,
                pose.orientation_euler.ry,
                pose.orientation_euler.rz,
            ] {
                out.push(',');
                out.push_str(&value.to_string());
            }
        }
        None => {
            for _ in 0..6 {
                out.push(',');
            }
        }
    }

    out.push(',');
    if let Some(gripper) = sample.gripper_state {
        out.push_str(&gripper.to_string());
    }
}
