//! Labeled relation examples.

use serde::{Deserialize, Serialize};

use crate::error::RelexError;

/// Direction of a dependency edge along the path between two entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum EdgeDirection {
    /// Edge followed from head to dependent.
    Forward = 0,
    /// Edge followed from dependent to head.
    Backward = 1,
}

impl EdgeDirection {
    /// Row of the edge-direction table.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for EdgeDirection {
    type Error = RelexError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(EdgeDirection::Forward),
            1 => Ok(EdgeDirection::Backward),
            other => Err(RelexError::Precondition(format!(
                "edge direction must be 0 or 1, got {}",
                other
            ))),
        }
    }
}

impl From<EdgeDirection> for u8 {
    fn from(dir: EdgeDirection) -> Self {
        dir as u8
    }
}

/// One token on the dependency path between the two entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub word: String,
    pub pos: String,
    #[serde(rename = "dep")]
    pub dependency: String,
    #[serde(rename = "dir")]
    pub direction: EdgeDirection,
    /// Token offset relative to the first entity.
    pub offset: i64,
}

impl PathStep {
    pub fn new(
        word: impl Into<String>,
        pos: impl Into<String>,
        dependency: impl Into<String>,
        direction: EdgeDirection,
        offset: i64,
    ) -> Self {
        Self {
            word: word.into(),
            pos: pos.into(),
            dependency: dependency.into(),
            direction,
            offset,
        }
    }
}

/// A labeled training or evaluation example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    #[serde(rename = "label-id")]
    pub label_id: u32,
    pub path: Vec<PathStep>,
}

impl Example {
    pub fn new(label_id: u32, path: Vec<PathStep>) -> Self {
        Self { label_id, path }
    }

    /// Whether any edge on the path carries the given dependency label.
    pub fn has_dependency(&self, label: &str) -> bool {
        self.path.iter().any(|step| step.dependency == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_json_record() {
        let json = r#"{"label-id": 4, "path": [
            {"word": "Paris", "pos": "NNP", "dep": "nsubj", "dir": 1, "offset": 0},
            {"word": "is", "pos": "VBZ", "dep": "cop", "dir": 0, "offset": 1}
        ]}"#;
        let example: Example = serde_json::from_str(json).unwrap();

        assert_eq!(example.label_id, 4);
        assert_eq!(example.path.len(), 2);
        assert_eq!(example.path[0].direction, EdgeDirection::Backward);
        assert_eq!(example.path[1].dependency, "cop");
        assert!(example.has_dependency("nsubj"));
        assert!(!example.has_dependency("ROOT"));
    }

    #[test]
    fn rejects_unknown_direction() {
        let json = r#"{"word": "x", "pos": "NN", "dep": "amod", "dir": 2, "offset": 0}"#;
        assert!(serde_json::from_str::<PathStep>(json).is_err());
    }

    #[test]
    fn direction_round_trips_through_u8() {
        assert_eq!(u8::from(EdgeDirection::Backward), 1);
        assert_eq!(EdgeDirection::try_from(0).unwrap(), EdgeDirection::Forward);
    }
}
