pub mod mock;
pub mod traits;

pub use traits::{ArmInterface, ArmState, CameraInterface, ImageFrame, JOINT_COUNT};
