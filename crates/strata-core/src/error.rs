use thiserror::Error;

/// Failures raised by the hydraulic erosion simulator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErosionError {
    /// Droplets need a full 2×2 cell for bilinear lookups.
    #[error("erosion map must be at least 2x2, got {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    #[error("erosion radius must be at least 1, got {0}")]
    InvalidRadius(u32),
    #[error("height map holds {actual} cells, simulator was built for {expected}")]
    MapSizeMismatch { expected: usize, actual: usize },
}

/// Failures raised by the layer mixer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MixerError {
    #[error(
        "conflicting operation: a background pass is still running; \
         wait for it to finish before computing again"
    )]
    Conflict,
    #[error("mixer grid must have a non-zero size, got {width}x{height}")]
    EmptyGrid { width: usize, height: usize },
    #[error(transparent)]
    Erosion(#[from] ErosionError),
}
