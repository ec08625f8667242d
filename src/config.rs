use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) const CONFIG_FILE: &str = "phoenix.toml";

/// Environment variable overriding `[llm].host`.
pub(crate) const LLM_HOST_ENV: &str = "PHOENIX_LLM_HOST";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub healing: HealingConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Language-model backend configuration (Ollama API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the Ollama server
    #[serde(default = "default_llm_host")]
    pub host: String,

    /// Model used for intent classification and general answers
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Model used for code generation and repair
    #[serde(default = "default_coder_model")]
    pub coder_model: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Sampling temperature (optional, uses the model default if not set)
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            host: default_llm_host(),
            model: default_chat_model(),
            coder_model: default_coder_model(),
            timeout_secs: default_llm_timeout(),
            temperature: None,
        }
    }
}

fn default_llm_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_chat_model() -> String {
    "llama3.1".to_string()
}

fn default_coder_model() -> String {
    "qwen2.5-coder".to_string()
}

fn default_llm_timeout() -> u64 {
    120
}

/// Sandbox configuration. Networking is always disabled and has no key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Docker image to run code in
    #[serde(default = "default_image")]
    pub image: String,

    /// Entry command; the code is appended as the final argument
    #[serde(default = "default_interpreter")]
    pub interpreter: Vec<String>,

    /// Memory limit (e.g., "512m")
    #[serde(default = "default_memory")]
    pub memory: String,

    /// Share of one CPU core (e.g., 0.5)
    #[serde(default = "default_cpu_fraction")]
    pub cpu_fraction: f64,

    /// Wall-clock ceiling per run, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Grace period for a timed-out run to exit, in seconds
    #[serde(default = "default_stop_grace")]
    pub stop_grace_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            image: default_image(),
            interpreter: default_interpreter(),
            memory: default_memory(),
            cpu_fraction: default_cpu_fraction(),
            timeout_secs: default_timeout(),
            stop_grace_secs: default_stop_grace(),
        }
    }
}

fn default_image() -> String {
    "ai-sandbox:latest".to_string()
}

fn default_interpreter() -> Vec<String> {
    vec!["python3".to_string(), "-c".to_string()]
}

fn default_memory() -> String {
    "512m".to_string()
}

fn default_cpu_fraction() -> f64 {
    0.5
}

fn default_timeout() -> u64 {
    15
}

fn default_stop_grace() -> u64 {
    2
}

/// Retry policy for the healing loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingConfig {
    /// Total sandbox runs allowed per request
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Case-insensitive substrings that mark output as a failure
    #[serde(default = "default_failure_signals")]
    pub failure_signals: Vec<String>,
}

impl Default for HealingConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            failure_signals: default_failure_signals(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_failure_signals() -> Vec<String> {
    vec![
        "error".to_string(),
        "traceback".to_string(),
        "syntaxerror".to_string(),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Record every resolved request
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// JSON-lines file, relative to the working directory
    #[serde(default = "default_history_path")]
    pub path: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_history_path(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_history_path() -> PathBuf {
    PathBuf::from(".phoenix/history.jsonl")
}

impl Config {
    /// Load configuration from file, using defaults if not found
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(CONFIG_FILE);

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;

            toml::from_str(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            Self::default()
        };

        config.apply_env_overrides(std::env::var(LLM_HOST_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self, llm_host: Option<String>) {
        if let Some(host) = llm_host.filter(|h| !h.trim().is_empty()) {
            self.llm.host = host;
        }
    }

    /// Reject values no run could work with.
    pub fn validate(&self) -> Result<()> {
        if self.healing.max_attempts == 0 {
            anyhow::bail!("[healing].max_attempts must be at least 1");
        }
        if self.llm.timeout_secs == 0 {
            anyhow::bail!("[llm].timeout_secs must be at least 1");
        }
        if self.sandbox.timeout_secs == 0 {
            anyhow::bail!("[sandbox].timeout_secs must be at least 1");
        }
        if !(self.sandbox.cpu_fraction.is_finite() && self.sandbox.cpu_fraction > 0.0) {
            anyhow::bail!("[sandbox].cpu_fraction must be a positive number");
        }
        if self
            .healing
            .failure_signals
            .iter()
            .all(|s| s.trim().is_empty())
        {
            anyhow::bail!("[healing].failure_signals must name at least one signal");
        }
        parse_memory_limit(&self.sandbox.memory)
            .with_context(|| format!("Invalid [sandbox].memory '{}'", self.sandbox.memory))?;
        Ok(())
    }

    /// History file resolved against the project directory
    pub fn history_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.history.path)
    }
}

/// Parse memory limit string (e.g., "8g", "512m", "1024k") to bytes
pub(crate) fn parse_memory_limit(limit: &str) -> Result<i64> {
    let limit = limit.trim().to_lowercase();

    let (num, unit) = if let Some(num) = limit.strip_suffix('g') {
        (num, 1024 * 1024 * 1024)
    } else if let Some(num) = limit.strip_suffix('m') {
        (num, 1024 * 1024)
    } else if let Some(num) = limit.strip_suffix('k') {
        (num, 1024)
    } else {
        (limit.as_str(), 1)
    };

    let value: i64 = num.parse().context("Invalid memory limit")?;
    if value <= 0 {
        anyhow::bail!("Memory limit must be positive");
    }
    value
        .checked_mul(unit)
        .with_context(|| format!("Memory limit too large: {limit}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sandbox.image, "ai-sandbox:latest");
        assert_eq!(config.sandbox.memory, "512m");
        assert_eq!(config.sandbox.timeout_secs, 15);
        assert_eq!(config.sandbox.stop_grace_secs, 2);
        assert_eq!(config.healing.max_attempts, 3);
        assert!(config.history.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[llm]
host = "http://gpu-box:11434"
coder_model = "deepseek-coder"

[sandbox]
image = "my-sandbox:dev"
memory = "1g"
timeout_secs = 30

[healing]
max_attempts = 5
failure_signals = ["traceback"]

[history]
enabled = false
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.llm.host, "http://gpu-box:11434");
        assert_eq!(config.llm.coder_model, "deepseek-coder");
        assert_eq!(config.llm.model, "llama3.1");
        assert_eq!(config.sandbox.image, "my-sandbox:dev");
        assert_eq!(config.sandbox.timeout_secs, 30);
        assert_eq!(config.sandbox.stop_grace_secs, 2);
        assert_eq!(config.healing.max_attempts, 5);
        assert_eq!(config.healing.failure_signals, vec!["traceback"]);
        assert!(!config.history.enabled);
    }

    #[test]
    fn test_network_key_is_not_accepted_as_override() {
        // Unknown keys are ignored; there is no field that could enable networking.
        let toml = r#"
[sandbox]
network = "allow-all"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("network"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.healing.max_attempts, 3);
    }

    #[test]
    fn test_load_rejects_zero_attempts() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[healing]\nmax_attempts = 0\n",
        )
        .unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn test_load_rejects_bad_memory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "[sandbox]\nmemory = \"lots\"\n").unwrap();
        assert!(Config::load(dir.path()).is_err());
    }

    #[test]
    fn test_validate_rejects_non_positive_cpu() {
        let mut config = Config::default();
        config.sandbox.cpu_fraction = 0.0;
        assert!(config.validate().is_err());
        config.sandbox.cpu_fraction = f64::NAN;
        assert!(config.validate().is_err());
        config.sandbox.cpu_fraction = 1.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_override_llm_host() {
        let mut config = Config::default();
        config.apply_env_overrides(Some("http://remote:11434".to_string()));
        assert_eq!(config.llm.host, "http://remote:11434");

        config.apply_env_overrides(Some("  ".to_string()));
        assert_eq!(config.llm.host, "http://remote:11434");

        config.apply_env_overrides(None);
        assert_eq!(config.llm.host, "http://remote:11434");
    }

    #[test]
    fn test_history_path_is_relative_to_project() {
        let config = Config::default();
        let path = config.history_path(Path::new("/work"));
        assert_eq!(path, PathBuf::from("/work/.phoenix/history.jsonl"));
    }

    #[test]
    fn test_parse_memory_limit() {
        assert_eq!(parse_memory_limit("8g").unwrap(), 8 * 1024 * 1024 * 1024);
        assert_eq!(parse_memory_limit("512m").unwrap(), 512 * 1024 * 1024);
        assert_eq!(parse_memory_limit("1G").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_memory_limit("64k").unwrap(), 64 * 1024);
        assert_eq!(parse_memory_limit("1048576").unwrap(), 1_048_576);
        assert!(parse_memory_limit("lots").is_err());
        assert!(parse_memory_limit("0m").is_err());
    }

    #[test]
    fn test_parse_memory_limit_overflow_is_error() {
        let err = parse_memory_limit("99999999999g").unwrap_err();
        assert!(err.to_string().contains("too large"));
        assert!(parse_memory_limit(&format!("{}k", i64::MAX)).is_err());
        assert_eq!(parse_memory_limit("8388607g").unwrap(), 8_388_607 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_validate_rejects_empty_failure_signals() {
        let mut config = Config::default();
        config.healing.failure_signals = Vec::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("failure_signals"));

        config.healing.failure_signals = vec!["  ".to_string()];
        assert!(config.validate().is_err());

        config.healing.failure_signals = vec!["traceback".to_string()];
        assert!(config.validate().is_ok());
    }
}
