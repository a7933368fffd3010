use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::error::{RecorderError, Result};

/// One value on a named channel.
///
/// Channels carry either a fixed-width numeric vector (joint angles, end
/// effector pose, gripper) or a raw camera image. A failed source read is
/// recorded as an explicit error marker so the channel key never goes
/// missing from a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChannelValue {
    FloatVec(Vec<f64>),
    /// Raw H x W x 3 image, row-major RGB bytes
    Image {
        height: usize,
        width: usize,
        data: Vec<u8>,
    },
    Error(String),
}

impl ChannelValue {
    pub fn scalar(value: f64) -> Self {
        Self::FloatVec(vec![value])
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Channel name -> value, ordered for deterministic column layout
pub type ChannelMap = BTreeMap<String, ChannelValue>;

/// One synchronized sample: arm states + camera images at a single instant.
///
/// Immutable once constructed. The timestamp is captured once per sampling
/// cycle, before any source read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// Monotonically increasing within an episode, starts at 0
    pub frame_index: u64,
    /// Seconds since epoch
    pub timestamp: f64,
    pub observation: ChannelMap,
    pub action: ChannelMap,
    /// Raw channels not folded into observation/action
    pub state: ChannelMap,
}

impl Frame {
    /// Look up a channel value across the observation, action and state maps.
    /// Channel names carry their group prefix, so the maps never collide.
    pub fn channel(&self, key: &str) -> Option<&ChannelValue> {
        self.observation
            .get(key)
            .or_else(|| self.action.get(key))
            .or_else(|| self.state.get(key))
    }
}

/// Closed channel-key enumeration established by the first frame of an
/// episode and validated on every later append.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSchema {
    pub observation: Vec<String>,
    pub action: Vec<String>,
    pub state: Vec<String>,
}

impl ChannelSchema {
    pub fn of(frame: &Frame) -> Self {
        Self {
            observation: frame.observation.keys().cloned().collect(),
            action: frame.action.keys().cloned().collect(),
            state: frame.state.keys().cloned().collect(),
        }
    }

    /// All channel keys in column order: observation, then action, then state.
    pub fn all_keys(&self) -> impl Iterator<Item = &String> {
        self.observation
            .iter()
            .chain(self.action.iter())
            .chain(self.state.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.observation.is_empty() && self.action.is_empty() && self.state.is_empty()
    }

    /// Check a frame's channel key set against this schema.
    pub fn validate(&self, frame: &Frame) -> Result<()> {
        let actual = Self::of(frame);
        if actual == *self {
            return Ok(());
        }

        let expected: Vec<&String> = self.all_keys().collect();
        let got: Vec<&String> = actual.all_keys().collect();

        let missing = expected
            .iter()
            .filter(|k| !got.contains(k))
            .map(|k| (*k).clone())
            .collect();
        let unexpected = got
            .iter()
            .filter(|k| !expected.contains(k))
            .map(|k| (*k).clone())
            .collect();

        Err(RecorderError::Schema {
            missing,
            unexpected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_keys(obs: &[&str], act: &[&str]) -> Frame {
        let fill = |keys: &[&str]| {
            keys.iter()
                .map(|k| (k.to_string(), ChannelValue::scalar(0.0)))
                .collect::<ChannelMap>()
        };
        Frame {
            frame_index: 0,
            timestamp: 0.0,
            observation: fill(obs),
            action: fill(act),
            state: ChannelMap::new(),
        }
    }

    #[test]
    fn test_schema_accepts_matching_frame() {
        let frame = frame_with_keys(&["observation.state.left_arm"], &["action.left_arm"]);
        let schema = ChannelSchema::of(&frame);
        assert!(schema.validate(&frame).is_ok());
    }

    #[test]
    fn test_schema_rejects_divergent_frame() {
        let first = frame_with_keys(&["observation.state.left_arm"], &["action.left_arm"]);
        let schema = ChannelSchema::of(&first);

        let other = frame_with_keys(&["observation.state.right_arm"], &["action.left_arm"]);
        let err = schema.validate(&other).unwrap_err();
        match err {
            RecorderError::Schema { missing, unexpected } => {
                assert_eq!(missing, vec!["observation.state.left_arm".to_string()]);
                assert_eq!(unexpected, vec!["observation.state.right_arm".to_string()]);
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_error_marker_keeps_key() {
        let mut frame = frame_with_keys(&["observation.camera_video0"], &[]);
        frame.observation.insert(
            "observation.camera_video0".to_string(),
            ChannelValue::Error("read timed out".to_string()),
        );

        let schema = ChannelSchema::of(&frame);
        assert!(schema.validate(&frame).is_ok());
        assert!(frame
            .channel("observation.camera_video0")
            .unwrap()
            .is_error());
    }
}
