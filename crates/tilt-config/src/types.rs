use glam::DVec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Orientation filter configuration.
    pub imu: ImuConfig,
    /// Where samples come from.
    pub source: SourceConfig,
    /// Console output cadence.
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImuConfig {
    /// Madgwick filter beta (correction strength). Higher = faster convergence, more noise.
    /// Stable range is 0.05-0.2.
    pub madgwick_beta: f64,
    /// Body axis the reported angle is measured about. Normalized at startup.
    #[serde(with = "dvec3_serde")]
    pub reference_axis: DVec3,
}

impl Default for ImuConfig {
    fn default() -> Self {
        Self {
            madgwick_beta: 0.1,
            // Screen diagonal in device coordinates.
            reference_axis: DVec3::new(1.0, -1.0, 0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// TCP address of the sensor sample stream.
    pub address: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:52998".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Maximum snapshot refresh rate (Hz).
    pub refresh_hz: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { refresh_hz: 10.0 }
    }
}

// glam's own serde output is a map; TOML reads better as an array.
mod dvec3_serde {
    use glam::DVec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &DVec3, s: S) -> Result<S::Ok, S::Error> {
        [v.x, v.y, v.z].serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DVec3, D::Error> {
        let [x, y, z] = <[f64; 3]>::deserialize(d)?;
        Ok(DVec3::new(x, y, z))
    }
}
