//! Node type labels.
//!
//! Pipeline edges carry labels such as `DensityMap.mrc` or
//! `ParticleGroupMetadata.star.relion.class2d`. The first component names the
//! kind; the rest is the file extension plus optional RELION tags.

use serde::{Deserialize, Serialize};

/// Kinds of data nodes RELION connects processes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    MicrographMovieGroupMetadata,
    MicrographGroupMetadata,
    MicrographCoordsGroup,
    ParticleGroupMetadata,
    DensityMap,
    Mask,
    Image2DStack,
    Image2D,
    Image3D,
    /// Optimiser and other process-specific STAR files
    ProcessData,
    LogFile,
    TomogramGroupMetadata,
    TomoTrajectoryData,
    TomoOptimisationSet,
    TomoManifoldData,
}

impl NodeType {
    /// The kind component of a label
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeType::MicrographMovieGroupMetadata => "MicrographMovieGroupMetadata",
            NodeType::MicrographGroupMetadata => "MicrographGroupMetadata",
            NodeType::MicrographCoordsGroup => "MicrographCoordsGroup",
            NodeType::ParticleGroupMetadata => "ParticleGroupMetadata",
            NodeType::DensityMap => "DensityMap",
            NodeType::Mask => "Mask",
            NodeType::Image2DStack => "Image2DStack",
            NodeType::Image2D => "Image2D",
            NodeType::Image3D => "Image3D",
            NodeType::ProcessData => "ProcessData",
            NodeType::LogFile => "LogFile",
            NodeType::TomogramGroupMetadata => "TomogramGroupMetadata",
            NodeType::TomoTrajectoryData => "TomoTrajectoryData",
            NodeType::TomoOptimisationSet => "TomoOptimisationSet",
            NodeType::TomoManifoldData => "TomoManifoldData",
        }
    }

    /// Extension RELION uses for this kind
    pub fn extension(&self) -> &'static str {
        match self {
            NodeType::DensityMap | NodeType::Mask | NodeType::Image2D | NodeType::Image3D => "mrc",
            NodeType::Image2DStack => "mrcs",
            NodeType::LogFile => "pdf",
            _ => "star",
        }
    }

    /// Full label, e.g. `DensityMap.mrc`
    pub fn label(&self) -> String {
        format!("{}.{}", self.kind_name(), self.extension())
    }

    /// Parse any label whose first component is a known kind
    pub fn from_label(label: &str) -> Option<Self> {
        let kind = label.split('.').next()?;
        Self::all().iter().copied().find(|t| t.kind_name() == kind)
    }

    pub fn all() -> &'static [NodeType] {
        &[
            NodeType::MicrographMovieGroupMetadata,
            NodeType::MicrographGroupMetadata,
            NodeType::MicrographCoordsGroup,
            NodeType::ParticleGroupMetadata,
            NodeType::DensityMap,
            NodeType::Mask,
            NodeType::Image2DStack,
            NodeType::Image2D,
            NodeType::Image3D,
            NodeType::ProcessData,
            NodeType::LogFile,
            NodeType::TomogramGroupMetadata,
            NodeType::TomoTrajectoryData,
            NodeType::TomoOptimisationSet,
            NodeType::TomoManifoldData,
        ]
    }

    /// Whether nodes of this kind are MRC volumes or images
    pub fn is_image(&self) -> bool {
        matches!(self.extension(), "mrc" | "mrcs")
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
