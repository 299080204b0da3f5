use anyhow::{anyhow, Result};
use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};

use crate::RuleEngineConfig;

/// 配置文件名
pub const CONFIG_FILE: &str = "rule_engine.toml";

/// 环境变量前缀，例如 `FLUX_RULE__WORKERS__COUNT=8`
pub const ENV_PREFIX: &str = "FLUX_RULE";

/// 配置加载器
pub struct ConfigLoader {
    config_dir: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    /// 创建配置加载器
    pub fn new<P: AsRef<Path>>(config_dir: P) -> Self {
        Self {
            config_dir: config_dir.as_ref().to_path_buf(),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// 加载配置：默认值 < 配置文件 < 环境变量
    pub fn load(&self) -> Result<RuleEngineConfig> {
        let config_path = self.config_path();

        let mut builder = Config::builder();
        if config_path.exists() {
            builder = builder.add_source(File::new(
                config_path.to_str().ok_or_else(|| anyhow!("Invalid config path"))?,
                FileFormat::Toml,
            ));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// 加载并验证配置
    pub fn load_validated(&self) -> Result<RuleEngineConfig> {
        let config = self.load()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_logging::LogFormat;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_default_config() {
        let temp_dir = tempdir().unwrap();
        let loader = ConfigLoader::new(temp_dir.path()).with_env_prefix("FLUX_RULE_TEST_DEFAULT");

        let config = loader.load().unwrap();
        assert_eq!(config, RuleEngineConfig::default());
    }

    #[test]
    fn test_load_config_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_content = r#"
[system]
name = "Test Rule Engine"

[matcher]
min_retrigger_interval_ms = 30000
store_timeout_ms = 2000

[workers]
count = 8

[logging]
level = "flux_rule=debug"
format = "json"

[metrics]
listen_addr = "127.0.0.1:9100"
"#;

        fs::write(temp_dir.path().join(CONFIG_FILE), config_content).unwrap();

        let loader = ConfigLoader::new(temp_dir.path()).with_env_prefix("FLUX_RULE_TEST_FILE");
        let config = loader.load_validated().unwrap();

        assert_eq!(config.system.name, "Test Rule Engine");
        assert_eq!(config.system.version, "1.0.0");
        assert_eq!(config.matcher.min_retrigger_interval_ms, 30_000);
        assert_eq!(config.matcher.store_timeout_ms, 2_000);
        assert_eq!(config.matcher.dispatch_timeout_ms, 5_000);
        assert_eq!(config.workers.count, 8);
        assert_eq!(config.workers.queue_capacity, 1024);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.metrics.listen_addr.as_deref(), Some("127.0.0.1:9100"));
    }

    #[test]
    fn test_environment_overrides_file() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join(CONFIG_FILE), "[workers]\ncount = 2\n").unwrap();

        std::env::set_var("FLUX_RULE_TEST_ENV__WORKERS__COUNT", "16");
        let loader = ConfigLoader::new(temp_dir.path()).with_env_prefix("FLUX_RULE_TEST_ENV");
        let config = loader.load().unwrap();
        std::env::remove_var("FLUX_RULE_TEST_ENV__WORKERS__COUNT");

        assert_eq!(config.workers.count, 16);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join(CONFIG_FILE), "[workers]\ncount = 0\n").unwrap();

        let loader = ConfigLoader::new(temp_dir.path()).with_env_prefix("FLUX_RULE_TEST_INVALID");
        assert!(loader.load().is_ok());
        assert!(loader.load_validated().is_err());
    }
}
