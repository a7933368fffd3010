pub mod arm;
pub mod camera;

pub use arm::SimulatedArm;
pub use camera::SimulatedCamera;
