use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Joint count of the supported arms
pub const JOINT_COUNT: usize = 7;

/// One state readout from a robotic arm
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArmState {
    /// Joint angles in radians
    pub joint_angles: [f64; JOINT_COUNT],
    /// End effector position [x, y, z] in meters
    pub eef_position: [f64; 3],
    /// End effector orientation [rx, ry, rz] in radians
    pub eef_orientation_euler: [f64; 3],
    /// Gripper opening, 0.0 (closed) to 1.0 (open)
    pub gripper_state: f64,
}

/// One raw camera frame, row-major H x W x 3 RGB bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFrame {
    pub height: usize,
    pub width: usize,
    pub data: Vec<u8>,
}

impl ImageFrame {
    pub fn new(height: usize, width: usize, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), height * width * 3);
        Self {
            height,
            width,
            data,
        }
    }
}

/// Collaborator contract for one robotic arm.
///
/// The recorder only ever reads; motion commands are out of scope. A read
/// may block on network I/O; the recorder bounds it with a timeout and
/// treats both errors and timeouts as per-channel read failures.
#[async_trait]
pub trait ArmInterface: Send {
    /// Short identifier used in channel names, e.g. "left" or "right"
    fn name(&self) -> &str;

    async fn connect(&mut self) -> Result<()>;

    async fn read_state(&mut self) -> Result<ArmState>;

    async fn disconnect(&mut self) -> Result<()>;
}

/// Collaborator contract for one camera source.
#[async_trait]
pub trait CameraInterface: Send {
    /// Short identifier used in channel names, e.g. "video0"
    fn name(&self) -> &str;

    async fn connect(&mut self) -> Result<()>;

    async fn read_frame(&mut self) -> Result<ImageFrame>;

    async fn disconnect(&mut self) -> Result<()>;
}
