use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::hal::traits::{CameraInterface, ImageFrame};

/// Simulated camera producing solid-color frames whose intensity tracks the
/// read counter, so frames are distinguishable without real hardware.
pub struct SimulatedCamera {
    name: String,
    width: usize,
    height: usize,
    connected: bool,
    ticks: u64,
    fail_connect: bool,
    fail_reads: bool,
    read_delay: Option<Duration>,
}

impl SimulatedCamera {
    pub fn new(name: impl Into<String>, width: usize, height: usize) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            connected: false,
            ticks: 0,
            fail_connect: false,
            fail_reads: false,
            read_delay: None,
        }
    }

    pub fn with_connect_failure(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn with_read_failures(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }
}

#[async_trait]
impl CameraInterface for SimulatedCamera {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&mut self) -> Result<()> {
        if self.fail_connect {
            return Err(anyhow!("simulated camera not found"));
        }
        self.connected = true;
        self.ticks = 0;
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<ImageFrame> {
        if !self.connected {
            return Err(anyhow!("camera {} is not connected", self.name));
        }
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_reads {
            return Err(anyhow!("simulated frame grab failure on camera {}", self.name));
        }

        let intensity = (self.ticks % 256) as u8;
        self.ticks += 1;

        Ok(ImageFrame::new(
            self.height,
            self.width,
            vec![intensity; self.height * self.width * 3],
        ))
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }
}
