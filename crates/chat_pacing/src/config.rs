use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PacingError, Result};

const CONFIG_FILE_PATH: &str = "pacing.toml";

/// Settings for splitting a response into fragments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmenterConfig {
    pub max_fragment_length: usize,
    pub min_fragment_length: usize,
    /// Probability of trying natural-break patterns before sentence splitting.
    pub natural_break_probability: f64,
    /// Probability of restricting natural breaks to the first `reduced_group_count` groups.
    pub reduced_group_probability: f64,
    pub reduced_group_count: usize,
    /// Width of the random window around `max_fragment_length` used by sentence splitting.
    pub threshold_jitter: usize,
    pub hesitation_probability: f64,
    pub long_fragment_length: usize,
    pub long_split_probability: f64,
    pub min_split_remainder: usize,
}

impl Default for FragmenterConfig {
    fn default() -> Self {
        Self {
            max_fragment_length: 120,
            min_fragment_length: 15,
            natural_break_probability: 0.7,
            reduced_group_probability: 0.3,
            reduced_group_count: 4,
            threshold_jitter: 20,
            hesitation_probability: 0.1,
            long_fragment_length: 80,
            long_split_probability: 0.15,
            min_split_remainder: 20,
        }
    }
}

/// Settings for typing and scroll delays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub base_delay_ms: f64,
    pub per_word_ms: f64,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub first_fragment_multiplier: f64,
    pub later_fragment_multiplier: f64,
    pub quick_reaction_multiplier: f64,
    pub thoughtful_multiplier: f64,
    /// Relative jitter, 0.03 means ±3%.
    pub jitter: f64,
    pub first_scroll_delay_ms: i64,
    pub scroll_delay_ms: i64,
    pub scroll_jitter_ms: i64,
    pub min_scroll_delay_ms: i64,
    pub max_scroll_delay_ms: i64,
    pub avatar_probability: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1500.0,
            per_word_ms: 150.0,
            min_delay_ms: 1200,
            max_delay_ms: 4500,
            first_fragment_multiplier: 1.3,
            later_fragment_multiplier: 1.1,
            quick_reaction_multiplier: 0.5,
            thoughtful_multiplier: 1.2,
            jitter: 0.03,
            first_scroll_delay_ms: 20,
            scroll_delay_ms: 45,
            scroll_jitter_ms: 20,
            min_scroll_delay_ms: 10,
            max_scroll_delay_ms: 80,
            avatar_probability: 0.95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    pub inter_fragment_gap_ms: u64,
    pub event_capacity: usize,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            inter_fragment_gap_ms: 200,
            event_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Minimum pause between two processed items.
    pub item_spacing_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            item_spacing_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub fragmenter: FragmenterConfig,
    pub timing: TimingConfig,
    pub sequencer: SequencerConfig,
    pub queue: QueueConfig,
    /// Fixed seed for reproducible runs. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

fn pacing_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".chat_pacing")
}

fn pacing_config_json_path() -> PathBuf {
    pacing_dir().join("config.json")
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|value| value.trim().parse().ok())
}

impl PacingConfig {
    /// Load from the user config, then `pacing.toml`, then the environment.
    ///
    /// Unreadable files are skipped; the result is always validated.
    pub fn load() -> Result<Self> {
        let mut config = PacingConfig::default();

        let json_path = pacing_config_json_path();
        if json_path.exists() {
            match Self::from_path(&json_path) {
                Ok(file_config) => config = file_config,
                Err(e) => tracing::warn!("Ignoring {}: {}", json_path.display(), e),
            }
        }

        if Path::new(CONFIG_FILE_PATH).exists() {
            match Self::from_path(Path::new(CONFIG_FILE_PATH)) {
                Ok(file_config) => config = file_config,
                Err(e) => tracing::warn!("Ignoring {}: {}", CONFIG_FILE_PATH, e),
            }
        }

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load a `.json` or `.toml` file; the extension picks the format.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PacingError::Config(format!("{}: {}", path.display(), e)))?;
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str::<PacingConfig>(&content)
                .map_err(|e| PacingError::Config(format!("{}: {}", path.display(), e)))?,
            _ => Self::from_toml_str(&content)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| PacingError::Config(e.to_string()))
    }

    fn apply_env(&mut self) {
        if let Some(seed) = parse_env::<u64>("PACING_SEED") {
            self.seed = Some(seed);
        }
        if let Some(length) = parse_env::<usize>("PACING_MAX_FRAGMENT_LENGTH") {
            self.fragmenter.max_fragment_length = length;
        }
        if let Some(gap) = parse_env::<u64>("PACING_INTER_FRAGMENT_GAP_MS") {
            self.sequencer.inter_fragment_gap_ms = gap;
        }
        if let Some(spacing) = parse_env::<u64>("PACING_QUEUE_SPACING_MS") {
            self.queue.item_spacing_ms = spacing;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let f = &self.fragmenter;
        let t = &self.timing;

        let probabilities = [
            ("fragmenter.natural_break_probability", f.natural_break_probability),
            ("fragmenter.reduced_group_probability", f.reduced_group_probability),
            ("fragmenter.hesitation_probability", f.hesitation_probability),
            ("fragmenter.long_split_probability", f.long_split_probability),
            ("timing.avatar_probability", t.avatar_probability),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(PacingError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if f.min_fragment_length > f.max_fragment_length {
            return Err(PacingError::Config(format!(
                "min_fragment_length ({}) exceeds max_fragment_length ({})",
                f.min_fragment_length, f.max_fragment_length
            )));
        }
        if t.min_delay_ms > t.max_delay_ms {
            return Err(PacingError::Config(format!(
                "min_delay_ms ({}) exceeds max_delay_ms ({})",
                t.min_delay_ms, t.max_delay_ms
            )));
        }
        if t.min_scroll_delay_ms > t.max_scroll_delay_ms {
            return Err(PacingError::Config(format!(
                "min_scroll_delay_ms ({}) exceeds max_scroll_delay_ms ({})",
                t.min_scroll_delay_ms, t.max_scroll_delay_ms
            )));
        }
        if self.sequencer.event_capacity == 0 {
            return Err(PacingError::Config(
                "sequencer.event_capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = PacingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fragmenter.max_fragment_length, 120);
        assert_eq!(config.sequencer.inter_fragment_gap_ms, 200);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = PacingConfig::from_toml_str(
            r#"
            seed = 7

            [fragmenter]
            max_fragment_length = 200

            [queue]
            item_spacing_ms = 5
            "#,
        )
        .expect("parse");

        assert_eq!(config.seed, Some(7));
        assert_eq!(config.fragmenter.max_fragment_length, 200);
        assert_eq!(config.fragmenter.min_fragment_length, 15);
        assert_eq!(config.queue.item_spacing_ms, 5);
        assert_eq!(config.timing, TimingConfig::default());
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let mut config = PacingConfig::default();
        config.fragmenter.natural_break_probability = 1.5;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, PacingError::Config(ref msg) if msg.contains("natural_break")));
    }

    #[test]
    fn rejects_inverted_lengths() {
        let mut config = PacingConfig::default();
        config.fragmenter.min_fragment_length = 500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_json_file_by_extension() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("pacing.json");
        let mut file = std::fs::File::create(&path).expect("create");
        write!(file, r#"{{"sequencer": {{"inter_fragment_gap_ms": 50}}}}"#).expect("write");

        let config = PacingConfig::from_path(&path).expect("load");
        assert_eq!(config.sequencer.inter_fragment_gap_ms, 50);
        assert_eq!(config.sequencer.event_capacity, 256);
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = PacingConfig::from_path(Path::new("/nonexistent/pacing.toml")).unwrap_err();
        assert!(matches!(err, PacingError::Config(_)));
    }
}
