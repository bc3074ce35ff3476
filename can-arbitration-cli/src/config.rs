//! Scenario configuration loading and parsing

use crate::scenario::{parse_hex_payload, IdentifierSpec, NodeSpec, NodeSpecError, Round};
use anyhow::{Context, Result};
use can_arbitration::{Bit, TimelineConfig, STANDARD_ID_WIDTH};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main application configuration (loaded from a scenario .toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub rounds: Vec<RoundConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BusConfig {
    #[serde(default = "default_bit_time_us")]
    pub bit_time_us: u64,
    #[serde(default = "default_leading_idle_us")]
    pub leading_idle_us: u64,
    #[serde(default = "default_trailing_idle_us")]
    pub trailing_idle_us: u64,
    #[serde(default = "default_id_width")]
    pub id_width: usize,
}

fn default_bit_time_us() -> u64 {
    10_000
}

fn default_leading_idle_us() -> u64 {
    10_000
}

fn default_trailing_idle_us() -> u64 {
    20_000
}

fn default_id_width() -> usize {
    STANDARD_ID_WIDTH
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            bit_time_us: default_bit_time_us(),
            leading_idle_us: default_leading_idle_us(),
            trailing_idle_us: default_trailing_idle_us(),
            id_width: default_id_width(),
        }
    }
}

impl BusConfig {
    /// Timing parameters for the synthesizer
    pub fn timeline(&self) -> TimelineConfig {
        TimelineConfig::new()
            .with_bit_duration(Duration::from_micros(self.bit_time_us))
            .with_leading_idle(Duration::from_micros(self.leading_idle_us))
            .with_trailing_idle(Duration::from_micros(self.trailing_idle_us))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    pub format: Option<OutputFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Txt,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoundConfig {
    pub name: String,
    /// Overrides `bus.id_width` for numeric ids in this round
    pub id_width: Option<usize>,
    pub nodes: Vec<NodeConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeConfig {
    pub label: String,
    pub id: Option<u32>,
    /// Literal identifier bits, e.g. "0010000"
    pub bits: Option<String>,
    /// Trailing payload as hex bytes
    pub payload: Option<String>,
}

impl NodeConfig {
    fn to_spec(&self) -> std::result::Result<NodeSpec, NodeSpecError> {
        let identifier = match (&self.bits, self.id) {
            (Some(bits), _) => IdentifierSpec::Bits(Bit::parse_bits(bits)?),
            (None, Some(id)) => IdentifierSpec::Numeric(id),
            (None, None) => return Err(NodeSpecError::MissingIdentifier(self.label.clone())),
        };
        let payload = self.payload.as_deref().map(parse_hex_payload).transpose()?;

        Ok(NodeSpec {
            label: self.label.clone(),
            identifier,
            payload,
        })
    }
}

impl AppConfig {
    /// Build the arbitration rounds described by this configuration
    pub fn rounds(&self) -> Result<Vec<Round>> {
        self.rounds
            .iter()
            .map(|round| {
                let width = round.id_width.unwrap_or(self.bus.id_width);
                let frames = round
                    .nodes
                    .iter()
                    .map(|node| {
                        node.to_spec()
                            .and_then(|spec| spec.to_frame(width))
                            .with_context(|| {
                                format!("Invalid node '{}' in round '{}'", node.label, round.name)
                            })
                    })
                    .collect::<Result<Vec<_>>>()?;

                Ok(Round {
                    name: round.name.clone(),
                    frames,
                })
            })
            .collect()
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    if config.bus.bit_time_us == 0 {
        anyhow::bail!("bus.bit_time_us must be greater than zero in {:?}", path);
    }
    log::debug!("Loaded {} round(s) from {:?}", config.rounds.len(), path);

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SCENARIO: &str = r#"
        [bus]
        bit_time_us = 2
        trailing_idle_us = 0

        [[rounds]]
        name = "sun sensor vs camera"

        [[rounds.nodes]]
        label = "sun_sensor"
        id = 0x001

        [[rounds.nodes]]
        label = "camera"
        id = 0x100
        payload = "CAFE"

        [[rounds]]
        name = "seven bit"

        [[rounds.nodes]]
        label = "a"
        bits = "0000001"
    "#;

    #[test]
    fn test_config_deserialization() {
        let config: AppConfig = toml::from_str(SCENARIO).unwrap();
        assert_eq!(config.bus.bit_time_us, 2);
        assert_eq!(config.bus.leading_idle_us, 10_000);
        assert_eq!(config.bus.id_width, 11);
        assert_eq!(config.rounds.len(), 2);

        let timing = config.bus.timeline();
        assert_eq!(timing.bit_duration, Duration::from_micros(2));
        assert_eq!(timing.trailing_idle, Duration::ZERO);
    }

    #[test]
    fn test_rounds_from_config() {
        let config: AppConfig = toml::from_str(SCENARIO).unwrap();
        let rounds = config.rounds().unwrap();

        assert_eq!(rounds[0].frames.len(), 2);
        assert_eq!(rounds[0].frames[1].trailing_bits.as_ref().map(Vec::len), Some(16));
        assert_eq!(rounds[1].frames[0].identifier_len(), 7);
    }

    #[test]
    fn test_node_without_identifier() {
        let config: AppConfig = toml::from_str(
            r#"
            [[rounds]]
            name = "broken"
            [[rounds.nodes]]
            label = "nobody"
            "#,
        )
        .unwrap();
        let err = config.rounds().unwrap_err();
        assert!(format!("{:#}", err).contains("needs either an id or a bit string"));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SCENARIO.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.rounds[0].name, "sun sensor vs camera");
    }

    #[test]
    fn test_load_config_rejects_zero_bit_time() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[bus]\nbit_time_us = 0\n").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_bundled_scenario() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../scenarios/spacecraft_bus.toml");
        let config = load_config(&path).unwrap();
        let rounds = config.rounds().unwrap();

        assert_eq!(rounds.len(), 3);
        assert_eq!(config.output.format, Some(OutputFormat::Txt));
        assert_eq!(rounds[2].frames[0].trailing_bits.as_ref().map(Vec::len), Some(16));
    }

    #[test]
    fn test_missing_file() {
        assert!(load_config(Path::new("does/not/exist.toml")).is_err());
    }
}
