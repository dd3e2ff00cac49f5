use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use veilgate_pii::DetectorSpec;
use veilgate_pii::builtin;
use veilgate_pipeline::PipelineConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub redaction: RedactionConfig,

    #[serde(default)]
    pub pipeline: PipelineSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which object store backend serves reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Local filesystem rooted at `root`
    Fs { root: PathBuf },
    /// Remote HTTP store at `base_url`
    Http { base_url: String },
    /// In-process store, starts empty (testing and demos)
    Memory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Fs {
            root: PathBuf::from(default_store_root()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionConfig {
    /// Built-in detectors to enable, in registration order
    #[serde(default = "default_detectors")]
    pub detectors: Vec<String>,

    /// Custom detectors, registered after the built-ins
    #[serde(default)]
    pub custom: Vec<DetectorSpec>,

    /// Object key extensions to scan; empty scans every object
    #[serde(default)]
    pub extensions: Vec<String>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            detectors: default_detectors(),
            custom: Vec::new(),
            extensions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Bytes accumulated per scan call; must exceed the longest pattern
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// End-to-end deadline per invocation
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Optional wall-clock budget per scan call, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_budget_ms: Option<u64>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            timeout_secs: default_timeout_secs(),
            scan_budget_ms: None,
        }
    }
}

impl PipelineSettings {
    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            chunk_size: self.chunk_size,
            timeout: Duration::from_secs(self.timeout_secs),
            scan_budget: self.scan_budget_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            store: StoreConfig::default(),
            redaction: RedactionConfig::default(),
            pipeline: PipelineSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents)?
        } else {
            // Default to YAML
            serde_yaml::from_str(&contents)?
        };

        Ok(config)
    }

    /// Merge environment variables into config (env vars take precedence)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("VEILGATE_HOST") {
            self.host = val;
        }

        if let Ok(val) = std::env::var("VEILGATE_PORT") {
            match val.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(_) => eprintln!("Warning: Invalid VEILGATE_PORT '{}', keeping {}", val, self.port),
            }
        }

        // Store backend: a root path selects fs, a URL selects http
        if let Ok(val) = std::env::var("VEILGATE_STORE_ROOT") {
            self.store = StoreConfig::Fs {
                root: PathBuf::from(val),
            };
        }

        if let Ok(val) = std::env::var("VEILGATE_STORE_URL") {
            self.store = StoreConfig::Http { base_url: val };
        }

        if let Ok(val) = std::env::var("VEILGATE_DETECTORS") {
            self.redaction.detectors = split_list(&val);
        }

        if let Ok(val) = std::env::var("VEILGATE_SCAN_EXTENSIONS") {
            self.redaction.extensions = split_list(&val);
        }

        if let Ok(val) = std::env::var("VEILGATE_CHUNK_SIZE") {
            match val.parse::<usize>() {
                Ok(size) => self.pipeline.chunk_size = size,
                Err(_) => eprintln!(
                    "Warning: Invalid VEILGATE_CHUNK_SIZE '{}', keeping {}",
                    val, self.pipeline.chunk_size
                ),
            }
        }

        if let Ok(val) = std::env::var("VEILGATE_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => self.pipeline.timeout_secs = secs,
                Err(_) => eprintln!(
                    "Warning: Invalid VEILGATE_TIMEOUT_SECS '{}', keeping {}",
                    val, self.pipeline.timeout_secs
                ),
            }
        }

        if let Ok(val) = std::env::var("VEILGATE_LOG_LEVEL") {
            self.logging.level = val;
        }
    }
}

fn split_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_store_root() -> String {
    "./objects".to_string()
}

fn default_detectors() -> Vec<String> {
    builtin::DEFAULT_ENABLED.iter().map(|s| s.to_string()).collect()
}

fn default_chunk_size() -> usize {
    64 * 1024
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert!(matches!(config.store, StoreConfig::Fs { .. }));
        assert_eq!(config.redaction.detectors, vec!["email".to_string()]);
        assert!(config.redaction.extensions.is_empty());
        assert_eq!(config.pipeline.chunk_size, 64 * 1024);
        assert_eq!(config.pipeline.timeout_secs, 30);
    }

    #[test]
    fn test_yaml_config_parses() {
        let yaml = r#"
host: 0.0.0.0
port: 9100
store:
  backend: http
  base_url: http://objects.internal:9000
redaction:
  detectors: [email, phone]
  extensions: [txt, log]
  custom:
    - name: badge
      pattern: 'BADGE-[0-9]{6}'
      token: '[REDACTED_BADGE]'
      max_match_len: 13
pipeline:
  chunk_size: 32768
  timeout_secs: 10
"#;
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9100);
        assert!(
            matches!(config.store, StoreConfig::Http { ref base_url } if base_url == "http://objects.internal:9000")
        );
        assert_eq!(config.redaction.detectors, vec!["email", "phone"]);
        assert_eq!(config.redaction.extensions, vec!["txt", "log"]);
        assert_eq!(config.redaction.custom.len(), 1);
        assert_eq!(config.redaction.custom[0].name, "badge");
        assert_eq!(config.pipeline.chunk_size, 32768);
    }

    #[test]
    fn test_toml_config_parses() {
        let toml = r#"
host = "127.0.0.1"
port = 9200

[store]
backend = "fs"
root = "/var/data/objects"

[redaction]
detectors = ["email", "ssn"]
"#;
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(toml.as_bytes()).unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.port, 9200);
        assert!(
            matches!(config.store, StoreConfig::Fs { ref root } if root == &PathBuf::from("/var/data/objects"))
        );
        assert_eq!(config.redaction.detectors, vec!["email", "ssn"]);
        // Unspecified sections fall back to defaults
        assert_eq!(config.pipeline.timeout_secs, 30);
    }

    #[test]
    fn test_settings_convert_to_pipeline_config() {
        let settings = PipelineSettings {
            chunk_size: 4096,
            timeout_secs: 5,
            scan_budget_ms: Some(250),
        };
        let config = settings.to_pipeline_config();
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.scan_budget, Some(Duration::from_millis(250)));
    }

    #[test]
    #[serial]
    fn test_merge_env_overrides() {
        unsafe {
            std::env::set_var("VEILGATE_PORT", "9999");
            std::env::set_var("VEILGATE_STORE_URL", "http://127.0.0.1:9000");
            std::env::set_var("VEILGATE_DETECTORS", "email, phone,ssn");
            std::env::set_var("VEILGATE_SCAN_EXTENSIONS", "txt,csv");
        }

        let mut config = ServerConfig::default();
        config.merge_env();

        assert_eq!(config.port, 9999);
        assert!(
            matches!(config.store, StoreConfig::Http { ref base_url } if base_url == "http://127.0.0.1:9000")
        );
        assert_eq!(config.redaction.detectors, vec!["email", "phone", "ssn"]);
        assert_eq!(config.redaction.extensions, vec!["txt", "csv"]);

        unsafe {
            std::env::remove_var("VEILGATE_PORT");
            std::env::remove_var("VEILGATE_STORE_URL");
            std::env::remove_var("VEILGATE_DETECTORS");
            std::env::remove_var("VEILGATE_SCAN_EXTENSIONS");
        }
    }

    #[test]
    #[serial]
    fn test_merge_env_rejects_garbage_port() {
        unsafe {
            std::env::set_var("VEILGATE_PORT", "not-a-port");
        }

        let mut config = ServerConfig::default();
        config.merge_env();
        assert_eq!(config.port, 8080);

        unsafe {
            std::env::remove_var("VEILGATE_PORT");
        }
    }
}
