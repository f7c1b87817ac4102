use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::default::Default;
use std::time::Duration;

use crate::artifacts::is_known_artifact_type;
use crate::output::OutputFormat;
use crate::pipeline::retry::RetryPolicy;
use crate::validation::policy::ValidationMethod;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Dialect the artifacts are exported from
    #[serde(default = "default_source_dialect")]
    pub source_dialect: String,

    /// Dialect the statements must parse under
    #[serde(default = "default_target_dialect")]
    pub target_dialect: String,

    /// LLM settings for the translator and the judge
    #[serde(default)]
    pub llm: LlmConfig,

    /// Batching and concurrency
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Retry behavior per capability
    #[serde(default)]
    pub retry: RetryConfig,

    /// Validation policy
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Where and how results are written
    #[serde(default)]
    pub output: OutputConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// LLM provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    // @provider: OpenAI chat completions
    OpenAI,
    // @provider: Anthropic messages
    Anthropic,
    // @provider: Databricks model serving (OpenAI-compatible)
    #[default]
    Databricks,
}

impl LlmProviderKind {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Databricks => "Databricks",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::OpenAI => "openai".to_string(),
            Self::Anthropic => "anthropic".to_string(),
            Self::Databricks => "databricks".to_string(),
        }
    }
}

impl std::fmt::Display for LlmProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for LlmProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "databricks" => Ok(Self::Databricks),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Settings for one LLM-backed capability
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LlmSettings {
    // @field: Provider type
    #[serde(default)]
    pub provider: LlmProviderKind,

    // @field: Model or serving endpoint name
    #[serde(default = "default_model")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL; empty uses the provider default
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Sampling temperature
    #[serde(default = "default_translator_temperature")]
    pub temperature: f32,

    // @field: Max tokens per completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    // @field: HTTP request timeout seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::default(),
            model: default_model(),
            api_key: String::new(),
            endpoint: String::new(),
            temperature: default_translator_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl LlmSettings {
    /// Endpoint to call, falling back to the provider's public API
    pub fn resolved_endpoint(&self) -> String {
        if !self.endpoint.is_empty() {
            return self.endpoint.clone();
        }
        match self.provider {
            LlmProviderKind::OpenAI => default_openai_endpoint(),
            LlmProviderKind::Anthropic => default_anthropic_endpoint(),
            LlmProviderKind::Databricks => String::new(),
        }
    }

    fn validate(&self, role: &str) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(anyhow!("llm.{}.model must not be empty", role));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(anyhow!("llm.{}.temperature must be between 0.0 and 2.0", role));
        }
        if self.max_tokens == 0 {
            return Err(anyhow!("llm.{}.max_tokens must be greater than zero", role));
        }
        if !self.endpoint.is_empty() {
            url::Url::parse(&self.endpoint)
                .map_err(|e| anyhow!("llm.{}.endpoint is not a valid URL: {}", role, e))?;
        }
        Ok(())
    }

    pub fn validate_credentials(&self, role: &str) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(anyhow!("llm.{}.api_key is required for the {} provider", role, self.provider));
        }
        if self.resolved_endpoint().is_empty() {
            return Err(anyhow!(
                "llm.{}.endpoint is required for the {} provider (e.g. https://<workspace>/serving-endpoints)",
                role,
                self.provider
            ));
        }
        Ok(())
    }
}

/// Per-capability LLM settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LlmConfig {
    #[serde(default)]
    pub translator: LlmSettings,

    #[serde(default = "default_judge_settings")]
    pub judge: LlmSettings,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            translator: LlmSettings::default(),
            judge: default_judge_settings(),
        }
    }
}

/// Batching and concurrency settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProcessingConfig {
    /// Records per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Upper bound on batches in flight
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,

    /// Deadline for a single external call
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_concurrent_batches: default_max_concurrent_batches(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

impl ProcessingConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// Retry settings for one capability
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RetrySettings {
    /// Total attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the second attempt, doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound on a single backoff
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_retry_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetrySettings {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.backoff_base_ms, self.max_backoff_ms)
    }
}

/// Retry settings per capability
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct RetryConfig {
    #[serde(default)]
    pub translator: RetrySettings,

    #[serde(default)]
    pub judge: RetrySettings,
}

/// Validation policy settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ValidationConfig {
    /// Method for artifact types without an explicit entry
    #[serde(default)]
    pub default_method: ValidationMethod,

    /// Per artifact type overrides
    #[serde(default = "default_validation_methods")]
    pub methods: BTreeMap<String, ValidationMethod>,

    /// Judge compliance score below which a semantic issue is reported
    #[serde(default = "default_compliance_threshold")]
    pub compliance_threshold: f64,

    /// Judge best-practice score below which a warning is reported
    #[serde(default = "default_best_practice_threshold")]
    pub best_practice_threshold: f64,

    /// Statements per judge call
    #[serde(default = "default_judge_batch_size")]
    pub judge_batch_size: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            default_method: ValidationMethod::default(),
            methods: default_validation_methods(),
            compliance_threshold: default_compliance_threshold(),
            best_practice_threshold: default_best_practice_threshold(),
            judge_batch_size: default_judge_batch_size(),
        }
    }
}

/// Output settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OutputConfig {
    /// Directory receiving the run artifacts
    #[serde(default = "default_output_dir")]
    pub dir: String,

    /// Statement output format
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            format: OutputFormat::default(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_source_dialect() -> String {
    "snowflake".to_string()
}

fn default_target_dialect() -> String {
    "databricks".to_string()
}

fn default_model() -> String {
    "databricks-meta-llama-3-3-70b-instruct".to_string()
}

fn default_translator_temperature() -> f32 {
    0.2
}

fn default_judge_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_judge_settings() -> LlmSettings {
    LlmSettings {
        temperature: default_judge_temperature(),
        ..LlmSettings::default()
    }
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_batch_size() -> usize {
    8
}

fn default_max_concurrent_batches() -> usize {
    5
}

fn default_call_timeout_secs() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000 // doubled on each retry
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_validation_methods() -> BTreeMap<String, ValidationMethod> {
    let mut methods = BTreeMap::new();
    for exempt in ["grants", "procedures", "udfs"] {
        methods.insert(exempt.to_string(), ValidationMethod::Skipped);
    }
    methods.insert("pipes".to_string(), ValidationMethod::SyntaxAndSemantic);
    methods
}

fn default_compliance_threshold() -> f64 {
    70.0
}

fn default_best_practice_threshold() -> f64 {
    50.0
}

fn default_judge_batch_size() -> usize {
    5
}

fn default_output_dir() -> String {
    "./ddl_output".to_string()
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if sqlparser::dialect::dialect_from_str(&self.target_dialect).is_none() {
            return Err(anyhow!("Unsupported target dialect: {}", self.target_dialect));
        }

        if self.processing.batch_size == 0 {
            return Err(anyhow!("processing.batch_size must be greater than zero"));
        }
        if self.processing.max_concurrent_batches == 0 {
            return Err(anyhow!("processing.max_concurrent_batches must be greater than zero"));
        }
        if self.processing.call_timeout_secs == 0 {
            return Err(anyhow!("processing.call_timeout_secs must be greater than zero"));
        }

        for (role, retry) in [("translator", &self.retry.translator), ("judge", &self.retry.judge)] {
            if retry.max_attempts == 0 {
                return Err(anyhow!("retry.{}.max_attempts must be at least 1", role));
            }
            if retry.max_backoff_ms < retry.backoff_base_ms {
                return Err(anyhow!("retry.{}.max_backoff_ms must not be below backoff_base_ms", role));
            }
        }

        for (name, threshold) in [
            ("compliance_threshold", self.validation.compliance_threshold),
            ("best_practice_threshold", self.validation.best_practice_threshold),
        ] {
            if !(0.0..=100.0).contains(&threshold) {
                return Err(anyhow!("validation.{} must be between 0 and 100", name));
            }
        }
        if self.validation.judge_batch_size == 0 {
            return Err(anyhow!("validation.judge_batch_size must be greater than zero"));
        }
        if let Some(unknown) = self
            .validation
            .methods
            .keys()
            .find(|artifact_type| !is_known_artifact_type(artifact_type))
        {
            return Err(anyhow!("validation.methods names an unknown artifact type: {}", unknown));
        }

        self.llm.translator.validate("translator")?;
        self.llm.judge.validate("judge")?;

        Ok(())
    }

    /// Check that the LLM capabilities can actually be reached.
    ///
    /// The judge is only checked when some artifact type uses semantic validation.
    pub fn validate_credentials(&self) -> Result<()> {
        self.llm.translator.validate_credentials("translator")?;
        if self.uses_semantic_validation() {
            self.llm.judge.validate_credentials("judge")?;
        }
        Ok(())
    }

    /// Whether any artifact type is configured for semantic validation
    pub fn uses_semantic_validation(&self) -> bool {
        self.validation.default_method == ValidationMethod::SyntaxAndSemantic
            || self
                .validation
                .methods
                .values()
                .any(|method| *method == ValidationMethod::SyntaxAndSemantic)
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_dialect: default_source_dialect(),
            target_dialect: default_target_dialect(),
            llm: LlmConfig::default(),
            processing: ProcessingConfig::default(),
            retry: RetryConfig::default(),
            validation: ValidationConfig::default(),
            output: OutputConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
