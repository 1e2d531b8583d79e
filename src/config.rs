use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::device::DevicePolicy;
use crate::policy::PolicyOutput;

pub const DEFAULT_MODEL_PATH: &str = "/app/models/ppo_trading_v2.onnx";
pub const DEFAULT_MODEL_VERSION: &str = "ppo_trading_v2";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub model_path: PathBuf,
    pub model_version: String,
    /// "cpu", "cuda", or "auto"
    pub device: String,
    /// Name of the graph output holding the action head.
    pub output_name: String,
    /// "logits" or "probs"
    pub policy_output: String,
    pub host: String,
    pub port: u16,
    /// "text" or "json"
    pub log_format: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Build settings from defaults, optional config files and `PPO_*` variables.
    /// `env` replaces the process environment when given.
    pub fn load(env: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("model_path", DEFAULT_MODEL_PATH)?
            .set_default("model_version", DEFAULT_MODEL_VERSION)?
            .set_default("device", "auto")?
            .set_default("output_name", "logits")?
            .set_default("policy_output", "logits")?
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8000)?
            .set_default("log_format", "text")?
            // config/ppo.toml or config/ppo.json, then config/local.* (not checked in)
            .add_source(File::with_name("config/ppo").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g. PPO_MODEL_PATH, PPO_DEVICE
            .add_source(Environment::with_prefix("PPO").source(env))
            .build()?;

        let settings: Settings = s.try_deserialize()?;
        settings.device_policy()?;
        settings.output_kind()?;
        Ok(settings)
    }

    pub fn device_policy(&self) -> Result<DevicePolicy, ConfigError> {
        self.device.parse().map_err(ConfigError::Message)
    }

    pub fn output_kind(&self) -> Result<PolicyOutput, ConfigError> {
        self.policy_output.parse().map_err(ConfigError::Message)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_config_defaults() {
        let settings = Settings::load(env(&[])).unwrap();

        assert_eq!(settings.model_path, PathBuf::from(DEFAULT_MODEL_PATH));
        assert_eq!(settings.model_version, "ppo_trading_v2");
        assert_eq!(settings.device_policy().unwrap(), DevicePolicy::Auto);
        assert_eq!(settings.output_kind().unwrap(), PolicyOutput::Logits);
        assert_eq!(settings.bind_address(), "0.0.0.0:8000");
        assert!(!settings.json_logs());
    }

    #[test]
    fn test_env_overrides() {
        let settings = Settings::load(env(&[
            ("PPO_MODEL_PATH", "/tmp/policy.onnx"),
            ("PPO_MODEL_VERSION", "ppo_trading_v3"),
            ("PPO_DEVICE", "cpu"),
            ("PPO_PORT", "9100"),
            ("PPO_LOG_FORMAT", "json"),
        ]))
        .unwrap();

        assert_eq!(settings.model_path, PathBuf::from("/tmp/policy.onnx"));
        assert_eq!(settings.model_version, "ppo_trading_v3");
        assert_eq!(settings.device_policy().unwrap(), DevicePolicy::Cpu);
        assert_eq!(settings.port, 9100);
        assert!(settings.json_logs());
    }

    #[test]
    fn test_unknown_device_rejected() {
        let result = Settings::load(env(&[("PPO_DEVICE", "tpu")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_policy_output_rejected() {
        let result = Settings::load(env(&[("PPO_POLICY_OUTPUT", "values")]));
        assert!(result.is_err());
    }
}
