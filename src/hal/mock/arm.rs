use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::hal::traits::{ArmInterface, ArmState, JOINT_COUNT};

/// Deterministic simulated arm for tests and demos.
///
/// Produces a slow sinusoidal sweep across all joints so consecutive reads
/// are distinguishable. Failure modes are scriptable per instance.
pub struct SimulatedArm {
    name: String,
    connected: bool,
    ticks: u64,
    fail_connect: bool,
    fail_reads: bool,
    read_delay: Option<Duration>,
}

impl SimulatedArm {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connected: false,
            ticks: 0,
            fail_connect: false,
            fail_reads: false,
            read_delay: None,
        }
    }

    /// Every `connect()` call fails with a connection error.
    pub fn with_connect_failure(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Every `read_state()` call fails.
    pub fn with_read_failures(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    /// Each read blocks for `delay` before returning, to exercise the
    /// recorder's per-source timeout.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }
}

#[async_trait]
impl ArmInterface for SimulatedArm {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&mut self) -> Result<()> {
        if self.fail_connect {
            return Err(anyhow!("simulated connection refused"));
        }
        self.connected = true;
        self.ticks = 0;
        Ok(())
    }

    async fn read_state(&mut self) -> Result<ArmState> {
        if !self.connected {
            return Err(anyhow!("arm {} is not connected", self.name));
        }
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_reads {
            return Err(anyhow!("simulated read failure on arm {}", self.name));
        }

        let t = self.ticks as f64 * 0.01;
        self.ticks += 1;

        let mut joint_angles = [0.0; JOINT_COUNT];
        for (i, angle) in joint_angles.iter_mut().enumerate() {
            *angle = (t + i as f64 * 0.1).sin();
        }

        Ok(ArmState {
            joint_angles,
            eef_position: [0.3 + 0.1 * t.sin(), 0.0, 0.2],
            eef_orientation_euler: [0.0, t.cos() * 0.05, 0.0],
            gripper_state: 0.5 + 0.5 * t.sin(),
        })
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }
}
