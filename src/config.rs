use serde::{ Deserialize, Serialize };
use std::collections::HashMap;
use std::fs;
use std::path::{ Path, PathBuf };
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Missing required API key: {0}")]
    MissingApiKey(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Wire format spoken by the completion endpoint
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI-compatible chat completions (also Ollama's `/v1` endpoint)
    OpenAi,
    Anthropic,
    Ollama,
}

impl Provider {
    pub fn env_var(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("OPENAI_API_KEY"),
            Provider::Anthropic => Some("ANTHROPIC_API_KEY"),
            Provider::Ollama => None,
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1/chat/completions",
            Provider::Anthropic => "https://api.anthropic.com/v1/messages",
            Provider::Ollama => "http://localhost:11434/v1/chat/completions",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o",
            Provider::Anthropic => "claude-3-5-sonnet-latest",
            Provider::Ollama => "qwen2.5-coder:7b",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    /// Which wire format to use
    pub provider: Provider,

    /// API key for LLM service
    pub api_key: Option<String>,

    /// API endpoint for LLM service
    pub api_endpoint: Option<String>,

    /// API model to use
    pub model: Option<String>,

    /// Temperature for generation (0.0-1.0)
    pub temperature: Option<f32>,

    /// Maximum tokens for API calls
    pub max_tokens: Option<usize>,

    /// HTTP request timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

impl ApiConfig {
    /// Get the API key, checking the provider's environment variable if not in config
    pub fn get_api_key(&self) -> Result<Option<String>, ConfigError> {
        use log::debug;

        if let Some(api_key) = &self.api_key {
            debug!("Using API key from config");
            return Ok(Some(api_key.clone()));
        }

        match self.provider.env_var() {
            Some(var) =>
                match std::env::var(var) {
                    Ok(key) => {
                        debug!("Using API key from {}", var);
                        Ok(Some(key))
                    }
                    Err(_) => Err(ConfigError::MissingApiKey(var.to_string())),
                }
            // Local servers do not authenticate
            None => Ok(None),
        }
    }

    pub fn endpoint(&self) -> String {
        self.api_endpoint.clone().unwrap_or_else(|| self.provider.default_endpoint().to_string())
    }

    pub fn model_name(&self) -> String {
        self.model.clone().unwrap_or_else(|| self.provider.default_model().to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(120))
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            provider: Provider::OpenAi,
            api_key: None,
            api_endpoint: None,
            model: None,
            temperature: Some(0.2),
            max_tokens: Some(4096),
            request_timeout_secs: Some(120),
        }
    }
}

/// Resource envelope and runtime image of the sandbox
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SandboxConfig {
    /// Interpreter that runs the verification harness
    pub interpreter: PathBuf,

    /// Arguments placed before the harness path
    pub interpreter_args: Vec<String>,

    /// Wall-clock limit per execution
    pub timeout_secs: u64,

    /// Address-space ceiling per execution
    pub memory_limit_mb: u64,

    /// Cap on captured bytes per output stream
    pub max_output_bytes: usize,

    /// Top-level modules the verification code may import
    pub allowed_modules: Vec<String>,

    /// Builtins visible to the verification code
    pub allowed_builtins: Vec<String>,

    /// Run each execution in private user, mount and network namespaces
    /// when the kernel allows it
    pub isolate_namespaces: bool,
}

impl SandboxConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn memory_limit_bytes(&self) -> u64 {
        self.memory_limit_mb * 1024 * 1024
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        let modules = ["sympy", "json", "math", "itertools", "functools", "operator", "collections"];
        let builtins = [
            // Data types
            "str", "int", "float", "bool", "list", "dict", "tuple", "set", "frozenset", "complex",
            // Math and data manipulation
            "print", "len", "abs", "max", "min", "round", "sum", "divmod", "pow", "isinstance",
            // Iteration
            "range", "enumerate", "zip", "map", "filter", "sorted", "reversed", "all", "any",
            // Exceptions
            "Exception", "ValueError", "TypeError", "NameError", "IndexError", "KeyError",
            "ZeroDivisionError", "ArithmeticError", "AssertionError",
        ];

        SandboxConfig {
            interpreter: PathBuf::from("python3"),
            interpreter_args: vec!["-I".to_string(), "-B".to_string(), "-u".to_string()],
            timeout_secs: 30,
            memory_limit_mb: 512,
            max_output_bytes: 1024 * 1024,
            allowed_modules: modules.iter().map(|m| m.to_string()).collect(),
            allowed_builtins: builtins.iter().map(|b| b.to_string()).collect(),
            isolate_namespaces: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct VerificationConfig {
    /// Temperature for the single code-repair call
    pub repair_temperature: f32,

    /// Default reasoning-repair budget when the caller does not pass one
    pub max_reasoning_attempts: u32,

    /// Only accept code inside fenced blocks
    pub strict_code_fences: bool,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        VerificationConfig {
            repair_temperature: 0.1,
            max_reasoning_attempts: 2,
            strict_code_fences: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ReasoningRepairConfig {
    pub temperature: f32,
}

impl Default for ReasoningRepairConfig {
    fn default() -> Self {
        ReasoningRepairConfig { temperature: 0.3 }
    }
}

/// Configuration for the verification core
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct VerifierConfig {
    pub llm: ApiConfig,
    pub sandbox: SandboxConfig,
    pub verification: VerificationConfig,
    pub reasoning_repair: ReasoningRepairConfig,

    /// Prompt templates with `{{name}}` placeholders
    pub prompt_templates: HashMap<String, String>,
}

impl VerifierConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let mut config: VerifierConfig = serde_yaml::from_str(&contents)?;

        // Files may override a subset of templates
        for (name, template) in default_prompt_templates() {
            config.prompt_templates.entry(name).or_insert(template);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sandbox.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue("sandbox.timeout_secs must be positive".to_string()));
        }
        if self.sandbox.memory_limit_mb == 0 {
            return Err(
                ConfigError::InvalidValue("sandbox.memory_limit_mb must be positive".to_string())
            );
        }
        if self.sandbox.allowed_modules.is_empty() {
            return Err(
                ConfigError::InvalidValue("sandbox.allowed_modules must not be empty".to_string())
            );
        }
        Ok(())
    }

    /// Get the template for a specific task
    pub fn get_template(&self, template_name: &str) -> Option<String> {
        self.prompt_templates.get(template_name).cloned()
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        VerifierConfig {
            llm: ApiConfig::default(),
            sandbox: SandboxConfig::default(),
            verification: VerificationConfig::default(),
            reasoning_repair: ReasoningRepairConfig::default(),
            prompt_templates: default_prompt_templates(),
        }
    }
}

/// Replace every `{{key}}` placeholder in `template` in one pass.
/// Substituted values are never scanned again; unknown placeholders stay as written.
pub fn render_template(template: &str, params: &[(&str, &str)]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        result.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            rest = &rest[open..];
            break;
        };
        let key = &after[..close];
        match params.iter().find(|(name, _)| *name == key) {
            Some((_, value)) => result.push_str(value),
            None => {
                result.push_str("{{");
                result.push_str(key);
                result.push_str("}}");
            }
        }
        rest = &after[close + 2..];
    }

    result.push_str(rest);
    result
}

pub fn default_prompt_templates() -> HashMap<String, String> {
    let mut templates = HashMap::new();

    templates.insert(
        "codegen_system".to_string(),
        r#"You translate a worked mathematical solution into a standalone Python verification script that uses SymPy.

The script MUST follow this output contract exactly:
1. For every step of the solution print ONE line of JSON:
   {"step": <int>, "description": "<what was checked>", "verified": <true|false>}
2. Finish with ONE line of JSON:
   {"final_answer_verified": <true|false>, "computed": "<value you computed>", "claimed": "<value the solution claims>"}
3. Print nothing else. Use json.dumps for every line.

Only these modules can be imported: sympy, json, math, itertools, functools, operator, collections.
Do not read files, use the network, or define classes that depend on other modules.
Return the script in a single ```python fenced block."#.to_string(),
    );

    templates.insert(
        "codegen_user".to_string(),
        r#"Problem:
{{problem}}

Worked solution:
{{solution}}

Claimed final answer:
{{final_answer}}

Write the verification script."#.to_string(),
    );

    templates.insert(
        "codegen_repair".to_string(),
        r#"The following Python code failed to execute or violated the verification contract.
Error:
---
{{error}}
---

Original Code:
---
{{code}}
---
The code MUST adhere to the contract (printing step-by-step JSON results and a final JSON verdict).
Fix the Python code so it is syntactically correct and strictly follows the contract. Do not change the underlying mathematical logic."#.to_string(),
    );

    templates.insert(
        "reasoning_repair_system".to_string(),
        r#"You are a careful mathematician. A symbolic verifier found errors in a solution.
Think inside <think></think> tags, then write a corrected step-by-step solution and put the final answer in \boxed{}."#.to_string(),
    );

    templates.insert(
        "reasoning_repair".to_string(),
        r#"Problem:
{{original_problem}}

Previous solution:
{{failed_solution}}

Verification feedback:
{{verification_feedback}}

Write a corrected solution."#.to_string(),
    );

    templates
}
