//! Configuration loading from TOML files.
//!
//! Lookup order:
//! 1. `$MEMEVAL_CONFIG` environment variable
//! 2. `~/.config/memeval/config.toml`
//! 3. Built-in defaults (everything is optional)

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use memeval_gen::GenConfig;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub generation: GenerationConfig,
    pub matcher: MatcherSection,
    pub verification: VerificationConfig,
    pub output: OutputConfig,
}

/// Model endpoint settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL (`{base_url}/chat/completions`).
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Model that produces scenarios, cores, and conversations.
    pub generator_model: String,
    /// Model that verifies evidence items; may be cheaper/smaller.
    pub judge_model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Pipeline sizing and retry budgets.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub evidence_count: usize,
    pub use_cases_per_person: usize,
    pub core_retries: u32,
    pub embed_retries: u32,
    pub scenario_max_calls: u32,
    pub use_case_timeout_secs: u64,
    pub person_timeout_secs: u64,
    pub person_threads: usize,
    pub use_case_threads: usize,
    pub extensive: bool,
}

/// Evidence matching thresholds.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MatcherSection {
    pub min_distance: usize,
    pub distance_ratio: f64,
    pub partial_ratio: f64,
}

/// Judge verification settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub consecutive_passes: u32,
    pub extensive_consecutive_passes: u32,
}

/// Persistence settings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Evidence output directory. Default: platform-specific data dir.
    pub dir: Option<String>,
}

// --- Defaults ---

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key_env: "MEMEVAL_API_KEY".into(),
            generator_model: "gpt-4o".into(),
            judge_model: "gpt-4o-mini".into(),
            temperature: 0.7,
            max_tokens: 4096,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        let d = GenConfig::default();
        Self {
            evidence_count: d.evidence_count,
            use_cases_per_person: d.use_cases_per_person,
            core_retries: d.core_retries,
            embed_retries: d.embed_retries,
            scenario_max_calls: d.scenario_max_calls,
            use_case_timeout_secs: d.use_case_timeout.as_secs(),
            person_timeout_secs: d.person_timeout.as_secs(),
            person_threads: d.person_threads,
            use_case_threads: d.use_case_threads,
            extensive: d.extensive,
        }
    }
}

impl Default for MatcherSection {
    fn default() -> Self {
        let d = memeval_core::MatcherConfig::default();
        Self {
            min_distance: d.min_distance,
            distance_ratio: d.distance_ratio,
            partial_ratio: d.partial_ratio,
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        let d = GenConfig::default();
        Self {
            consecutive_passes: d.consecutive_passes,
            extensive_consecutive_passes: d.extensive_consecutive_passes,
        }
    }
}

impl Config {
    /// Assemble the pipeline config from the TOML sections.
    pub fn gen_config(&self) -> GenConfig {
        GenConfig {
            evidence_count: self.generation.evidence_count,
            use_cases_per_person: self.generation.use_cases_per_person,
            core_retries: self.generation.core_retries,
            embed_retries: self.generation.embed_retries,
            scenario_max_calls: self.generation.scenario_max_calls,
            use_case_timeout: Duration::from_secs(self.generation.use_case_timeout_secs),
            person_timeout: Duration::from_secs(self.generation.person_timeout_secs),
            person_threads: self.generation.person_threads,
            use_case_threads: self.generation.use_case_threads,
            consecutive_passes: self.verification.consecutive_passes,
            extensive_consecutive_passes: self.verification.extensive_consecutive_passes,
            extensive: self.generation.extensive,
            matcher: memeval_core::MatcherConfig {
                min_distance: self.matcher.min_distance,
                distance_ratio: self.matcher.distance_ratio,
                partial_ratio: self.matcher.partial_ratio,
            },
            ..GenConfig::default()
        }
    }
}

/// Load config from disk. Returns defaults if no config file exists.
pub fn load_config() -> Result<Config> {
    let path = config_path();

    if let Some(p) = &path {
        if p.exists() {
            let content =
                std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
            let config: Config =
                toml::from_str(&content).with_context(|| format!("parsing {}", p.display()))?;
            return Ok(config);
        }
    }

    Ok(Config::default())
}

/// Resolve the config file path.
fn config_path() -> Option<PathBuf> {
    // 1. Environment variable
    if let Ok(p) = std::env::var("MEMEVAL_CONFIG") {
        return Some(PathBuf::from(p));
    }

    // 2. ~/.config/memeval/config.toml
    if let Some(home) = dirs_home() {
        let p = home.join(".config").join("memeval").join("config.toml");
        return Some(p);
    }

    None
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

/// Show the active config path (for `memeval config`).
pub fn show_config_path() -> String {
    match config_path() {
        Some(p) if p.exists() => format!("{} (loaded)", p.display()),
        Some(p) => format!("{} (not found, using defaults)", p.display()),
        None => "no config path resolved (using defaults)".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.generation.evidence_count, 2);
        assert_eq!(config.verification.consecutive_passes, 2);
        assert_eq!(config.matcher.min_distance, 10);
        assert_eq!(config.llm.api_key_env, "MEMEVAL_API_KEY");
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[generation]
evidence_count = 3
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.generation.evidence_count, 3);
        // Other fields should be defaults
        assert_eq!(config.generation.core_retries, 5);
        assert_eq!(config.matcher.partial_ratio, 0.8);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[llm]
base_url = "http://localhost:8080/v1"
api_key_env = "MY_KEY"
generator_model = "big-model"
judge_model = "small-model"
temperature = 0.2
max_tokens = 2048

[generation]
evidence_count = 4
use_cases_per_person = 20
core_retries = 3
embed_retries = 2
scenario_max_calls = 10
use_case_timeout_secs = 120
person_timeout_secs = 900
person_threads = 8
use_case_threads = 4
extensive = true

[matcher]
min_distance = 5
distance_ratio = 0.2
partial_ratio = 0.9

[verification]
consecutive_passes = 1
extensive_consecutive_passes = 4

[output]
dir = "/tmp/evidence"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.llm.base_url, "http://localhost:8080/v1");
        assert_eq!(config.generation.use_cases_per_person, 20);
        assert!(config.generation.extensive);
        assert_eq!(config.output.dir.as_deref(), Some("/tmp/evidence"));

        let gen = config.gen_config();
        assert_eq!(gen.evidence_count, 4);
        assert_eq!(gen.use_case_timeout, Duration::from_secs(120));
        assert_eq!(gen.required_consecutive_passes(), 4);
        assert_eq!(gen.matcher.min_distance, 5);
    }
}
