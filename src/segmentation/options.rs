use serde::Deserialize;

use crate::analysis::AnalysisOptions;

/// Per-signal vote weights.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub edge: f32,
    pub cluster: f32,
    pub saliency: f32,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            edge: 1.0,
            cluster: 1.0,
            saliency: 1.0,
        }
    }
}

/// Background removal tunables.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SegmentationOptions {
    /// Smallest accepted width and height.
    pub min_size: usize,
    /// Border band and contrast model.
    pub analysis: AnalysisOptions,

    /// Normalized gradient magnitude above which a pixel is an edge.
    pub edge_threshold: f32,
    /// Disk radius used to close gaps in the edge map.
    pub edge_close_radius: f32,

    /// Number of colour clusters.
    pub clusters: usize,
    pub kmeans_iterations: usize,
    /// Pixels sampled (strided) to fit the clusters.
    pub max_cluster_samples: usize,
    /// A cluster holding at least this share of the border band is background.
    pub border_cluster_share: f32,

    /// Saliency score of a zero-contrast pixel at the exact centre.
    pub center_floor: f32,
    pub saliency_threshold: f32,

    pub weights: SignalWeights,
    /// Half-width of the square close/open cleanup element on the voted mask.
    pub cleanup_radius: f32,
    /// Feather applied to the final mask.
    pub feather_radius: f32,
    /// Below this the result should be refined by hand.
    pub confidence_threshold: f32,
}

impl Default for SegmentationOptions {
    fn default() -> Self {
        Self {
            min_size: 8,
            analysis: AnalysisOptions::default(),
            edge_threshold: 0.08,
            edge_close_radius: 2.0,
            clusters: 3,
            kmeans_iterations: 12,
            max_cluster_samples: 4096,
            border_cluster_share: 0.25,
            center_floor: 0.35,
            saliency_threshold: 0.5,
            weights: SignalWeights::default(),
            cleanup_radius: 1.0,
            feather_radius: 2.0,
            confidence_threshold: 0.6,
        }
    }
}
