use serde::{Deserialize, Serialize};

/// How droplet iterations share the height buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropletScheduling {
    /// One droplet after another on the live buffer.
    Sequential,
    /// `batch_size` droplets at a time, simulated in parallel against a
    /// snapshot; their private deltas are merged in droplet order before the
    /// next batch starts.
    Batched { batch_size: usize },
}

impl Default for DropletScheduling {
    fn default() -> Self {
        Self::Sequential
    }
}

/// Droplet erosion tuning. Missing fields fall back to the defaults when
/// deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErosionParams {
    /// Brush radius in cells; erosion is spread over every cell closer than this.
    pub erosion_radius: u32,
    /// 0 = direction follows the gradient, 1 = direction never changes.
    pub inertia: f64,
    pub sediment_capacity_factor: f64,
    /// Floor on capacity so slow droplets on flats still carry something.
    pub min_sediment_capacity: f64,
    /// Fraction of spare capacity eroded per step.
    pub erode_speed: f64,
    /// Fraction of surplus sediment deposited per step.
    pub deposit_speed: f64,
    /// Fraction of water lost per step.
    pub evaporate_speed: f64,
    pub gravity: f64,
    pub max_droplet_lifetime: u32,
    pub initial_water_volume: f64,
    pub initial_speed: f64,
    pub scheduling: DropletScheduling,
}

impl Default for ErosionParams {
    fn default() -> Self {
        Self {
            erosion_radius: 3,
            inertia: 0.05,
            sediment_capacity_factor: 4.0,
            min_sediment_capacity: 0.01,
            erode_speed: 0.3,
            deposit_speed: 0.3,
            evaporate_speed: 0.01,
            gravity: 4.0,
            max_droplet_lifetime: 30,
            initial_water_volume: 1.0,
            initial_speed: 1.0,
            scheduling: DropletScheduling::default(),
        }
    }
}
