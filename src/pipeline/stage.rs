//! Named pipeline stages, in execution order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One discrete step of the transformation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Decode,
    Enhance,
    Filter,
    Resize,
    Rotate,
    Flatten,
    Encode,
}

impl PipelineStage {
    /// Every stage, in the order the pipeline runs them.
    pub const ORDER: [PipelineStage; 7] = [
        PipelineStage::Decode,
        PipelineStage::Enhance,
        PipelineStage::Filter,
        PipelineStage::Resize,
        PipelineStage::Rotate,
        PipelineStage::Flatten,
        PipelineStage::Encode,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PipelineStage::Decode => "decode",
            PipelineStage::Enhance => "enhance",
            PipelineStage::Filter => "filter",
            PipelineStage::Resize => "resize",
            PipelineStage::Rotate => "rotate",
            PipelineStage::Flatten => "flatten",
            PipelineStage::Encode => "encode",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
