use crate::types::Config;
use anyhow::Result;
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.scoring.helmet_threshold, 0.15);
        assert_eq!(parsed.region.up_ratio, 0.8);
        assert_eq!(parsed.model.input_size, 640);
    }

    #[test]
    fn test_load_missing_file_errors() {
        assert!(Config::load("/nonexistent/config.yaml").is_err());
    }
}
