//! Protocol configuration.
//!
//! Every protocol has serde defaults; user overrides are deep-merged onto the
//! serialized defaults and the result is deserialized and validated. Unknown
//! fields are rejected.

use cadence_core::{merge, Error, KeyCode, MediaKind, Result, TrainingPhase};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Merge `overrides` onto `C::default()` and deserialize the result
pub fn resolve<C>(overrides: &Value) -> Result<C>
where
    C: Default + Serialize + DeserializeOwned,
{
    let defaults = serde_json::to_value(C::default())?;
    let merged = merge(&defaults, overrides);
    serde_json::from_value(merged).map_err(|e| Error::invalid(e.to_string()))
}

/// Lookback depth: fixed, or scheduled per block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Lookback {
    Fixed(usize),
    Schedule(Vec<usize>),
}

impl Lookback {
    /// Depth for the 1-based `block`. A short schedule repeats its last entry.
    pub fn for_block(&self, block: usize) -> usize {
        match self {
            Lookback::Fixed(n) => *n,
            Lookback::Schedule(ns) => ns
                .get(block.saturating_sub(1))
                .or_else(|| ns.last())
                .copied()
                .unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NBackConfig {
    pub blocks: usize,
    pub trials: usize,
    pub n: Lookback,
    /// Probability of repeating the n-back symbol; 0 means `1 / symbols`
    pub p: f64,
    pub baseline: u64,
    pub display: u64,
    pub response: u64,
    pub intertrial: u64,
    pub symbols: String,
    pub respond_key: KeyCode,
}

impl Default for NBackConfig {
    fn default() -> Self {
        Self {
            blocks: 3,
            trials: 25,
            n: Lookback::Fixed(2),
            p: 0.2,
            baseline: 0,
            display: 500,
            response: 1000,
            intertrial: 2000,
            symbols: "1234567890".to_owned(),
            respond_key: KeyCode::SPACE,
        }
    }
}

impl NBackConfig {
    pub fn from_overrides(overrides: &Value) -> Result<Self> {
        let mut config: Self = resolve(overrides)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Replaces `p == 0` with the uniform repeat probability
    pub fn normalize(&mut self) {
        let len = self.symbols.chars().count();
        if self.p == 0.0 && len > 0 {
            self.p = 1.0 / len as f64;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.blocks == 0 {
            return Err(Error::invalid("blocks must be at least 1"));
        }
        if self.trials == 0 {
            return Err(Error::invalid("trials must be at least 1"));
        }
        if self.symbols.is_empty() {
            return Err(Error::invalid("symbols must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.p) {
            return Err(Error::invalid(format!("p must lie in [0, 1], got {}", self.p)));
        }
        match &self.n {
            Lookback::Fixed(0) => return Err(Error::invalid("n must be at least 1")),
            Lookback::Schedule(ns) if ns.is_empty() => {
                return Err(Error::invalid("n schedule must not be empty"));
            }
            Lookback::Schedule(ns) if ns.contains(&0) => {
                return Err(Error::invalid("n schedule entries must be at least 1"));
            }
            _ => {}
        }
        Ok(())
    }

    pub fn alphabet(&self) -> Vec<char> {
        self.symbols.chars().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaselineConfig {
    pub enable: bool,
    pub duration: u64,
    pub instruction: String,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            enable: true,
            duration: 3000,
            instruction: "Stay as still as possible and look at the fixation cross.".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MotorDurations {
    pub prep: u64,
    pub rest: u64,
    pub on: u64,
    pub off: u64,
    pub pause: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Media {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default)]
    pub position: String,
}

impl Media {
    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_path(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MotorConfig {
    pub enable: bool,
    pub blocks: usize,
    pub trials: usize,
    pub duration: MotorDurations,
    pub instruction: String,
    /// One cue per imagery class
    pub imagery: Vec<String>,
    /// Optional media cues, in the same order as `imagery`
    #[serde(default, deserialize_with = "list_or_false")]
    pub media: Option<Vec<Media>>,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            enable: true,
            blocks: 3,
            trials: 10,
            duration: MotorDurations {
                prep: 5000,
                rest: 10000,
                on: 3000,
                off: 2000,
                pause: 0,
            },
            instruction: "Stay as still as possible. Try to stay in sync, and feel the \
                          sensation as you imagine doing the movement displayed on the screen."
                .to_owned(),
            imagery: vec![
                "Extend your LEFT wrist".to_owned(),
                "Extend your RIGHT wrist".to_owned(),
            ],
            media: None,
        }
    }
}

fn list_or_false<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<Media>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Flag(bool),
        List(Vec<Media>),
    }

    match Option::<Wire>::deserialize(deserializer)? {
        None | Some(Wire::Flag(false)) => Ok(None),
        Some(Wire::List(list)) => Ok(Some(list)),
        Some(Wire::Flag(true)) => Err(de::Error::custom("media: expected a list or false")),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlinkDurations {
    pub prep: u64,
    pub stim: u64,
    pub display: u64,
    pub rest_min: u64,
    pub rest_max: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlinkConfig {
    pub enable: bool,
    pub trials: usize,
    pub duration: BlinkDurations,
    pub instruction: String,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            enable: true,
            trials: 10,
            duration: BlinkDurations {
                prep: 3000,
                stim: 1500,
                display: 800,
                rest_min: 0,
                rest_max: 500,
            },
            instruction: "Stay as still as possible. Blink once when you see a red dot."
                .to_owned(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainingConfig {
    pub baseline: BaselineConfig,
    pub motor: MotorConfig,
    pub blink: BlinkConfig,
}

impl TrainingConfig {
    pub fn from_overrides(overrides: &Value) -> Result<Self> {
        let config: Self = resolve(overrides)?;
        config.validate()?;
        Ok(config)
    }

    pub fn enabled(&self, phase: TrainingPhase) -> bool {
        match phase {
            TrainingPhase::Baseline => self.baseline.enable,
            TrainingPhase::Motor => self.motor.enable,
            TrainingPhase::Blink => self.blink.enable,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let motor = &self.motor;
        if motor.enable {
            if motor.imagery.is_empty() {
                return Err(Error::invalid("motor.imagery must list at least one class"));
            }
            if motor.blocks == 0 || motor.trials == 0 {
                return Err(Error::invalid("motor blocks and trials must be at least 1"));
            }
            if let Some(media) = &motor.media {
                if media.len() != motor.imagery.len() {
                    return Err(Error::invalid(format!(
                        "motor.media has {} entries for {} imagery classes",
                        media.len(),
                        motor.imagery.len()
                    )));
                }
                if let Some(bad) = media.iter().find(|m| m.kind().is_none()) {
                    return Err(Error::invalid(format!(
                        "unsupported media type: {}",
                        bad.path
                    )));
                }
            }
        }
        let blink = &self.blink;
        if blink.enable && blink.duration.rest_min > blink.duration.rest_max {
            return Err(Error::invalid(
                "blink.duration.rest_min must not exceed rest_max",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridShape {
    pub columns: usize,
    /// Presentation hints, forwarded untouched
    pub ratio: String,
    pub borders: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridConfig {
    pub symbols: String,
    pub shape: GridShape,
    pub wrap: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            symbols: "123456789".to_owned(),
            shape: GridShape {
                columns: 3,
                ratio: String::new(),
                borders: true,
            },
            wrap: false,
        }
    }
}

impl GridConfig {
    pub fn from_overrides(overrides: &Value) -> Result<Self> {
        let config: Self = resolve(overrides)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.shape.columns == 0 {
            return Err(Error::invalid("grid needs at least one column"));
        }
        if self.symbols.is_empty() {
            return Err(Error::invalid("grid symbols must not be empty"));
        }
        Ok(())
    }
}

/// How external predictions drive the grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Window for counting consecutive blinks, in ms
    pub blink_delay: u64,
    /// Forward motor classifier confidence to the grid
    pub feedback: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            blink_delay: 1200,
            feedback: true,
        }
    }
}

impl DispatchConfig {
    pub fn from_overrides(overrides: &Value) -> Result<Self> {
        resolve(overrides)
    }
}
