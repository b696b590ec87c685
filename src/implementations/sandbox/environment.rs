use std::time::Duration;

use log::{ info, warn };
use serde::Serialize;

use crate::implementations::sandbox::executor::SandboxExecutor;
use crate::traits::executor::CodeExecutor;

/// Oldest symbolic library release the verification prompts are written for
pub const MIN_SYMPY_VERSION: (u32, u32) = (1, 9);

/// Importing the symbolic library cold can take several seconds
const CHECK_TIMEOUT: Duration = Duration::from_secs(60);

const INTERPRETER_CHECK: &str = "import json\nprint(json.dumps({\"ok\": True}))\n";
const SYMPY_CHECK: &str =
    "import json\nimport sympy\nprint(json.dumps({\"sympy\": sympy.__version__}))\n";

#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentCheck {
    pub name: String,
    pub status: bool,
    pub message: String,
    /// Failed optional checks are reported without failing the environment
    pub required: bool,
}

impl EnvironmentCheck {
    fn new(name: &str, status: bool, message: String) -> Self {
        Self { name: name.to_string(), status, message, required: true }
    }

    fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Capabilities of the sandbox on this host
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentReport {
    pub interpreter: String,
    pub sympy_version: Option<String>,
    pub memory_limit_supported: bool,
    pub namespace_isolation: bool,
    pub checks: Vec<EnvironmentCheck>,
    pub overall_status: bool,
}

impl EnvironmentReport {
    pub fn check(&self, name: &str) -> Option<&EnvironmentCheck> {
        self.checks.iter().find(|c| c.name == name)
    }
}

impl SandboxExecutor {
    /// Validate that this host can run verification code safely, by running
    /// small scripts through the sandbox itself.
    pub async fn check_environment(&self) -> EnvironmentReport {
        let memory_limit = self.config().memory_limit_bytes();
        let mut checks = Vec::new();

        let basic = self.execute(INTERPRETER_CHECK, CHECK_TIMEOUT, memory_limit).await;
        checks.push(
            EnvironmentCheck::new("interpreter", basic.succeeded, if basic.succeeded {
                format!("{} starts inside the sandbox", self.config().interpreter.display())
            } else {
                format!(
                    "Interpreter failed to start: {}",
                    basic.exception_message.clone().unwrap_or_default()
                )
            })
        );

        let mut sympy_version = None;
        if basic.succeeded {
            let outcome = self.execute(SYMPY_CHECK, CHECK_TIMEOUT, memory_limit).await;
            sympy_version = extract_version(&outcome.stdout);
            let (status, message) = match &sympy_version {
                Some(version) if version_is_compatible(version) =>
                    (true, format!("SymPy version {} is compatible.", version)),
                Some(version) =>
                    (
                        false,
                        format!(
                            "SymPy version {} is too old. Recommend >= {}.{}.",
                            version,
                            MIN_SYMPY_VERSION.0,
                            MIN_SYMPY_VERSION.1
                        ),
                    ),
                None =>
                    (
                        false,
                        format!(
                            "Could not determine SymPy version: {}",
                            outcome.exception_message.clone().unwrap_or_else(|| outcome.stderr.clone())
                        ),
                    ),
            };
            checks.push(EnvironmentCheck::new("sympy_version", status, message));
        }

        let memory_limit_supported = self.memory_limit_supported();
        checks.push(
            EnvironmentCheck::new("resource_limits", memory_limit_supported, if memory_limit_supported {
                format!("Address-space limit of {} MiB is enforced.", self.config().memory_limit_mb)
            } else {
                "Memory limits are not available on this platform.".to_string()
            })
        );

        let namespace_isolation = self.namespace_isolation();
        let namespace_message = if namespace_isolation {
            "Runs in private user, mount and network namespaces with a read-only host filesystem.".to_string()
        } else if !self.config().isolate_namespaces {
            "Namespace isolation is disabled in the sandbox configuration.".to_string()
        } else {
            "The kernel refused unprivileged namespaces; code keeps host filesystem and network access.".to_string()
        };
        checks.push(EnvironmentCheck::new("namespaces", namespace_isolation, namespace_message).optional());

        checks.push(
            EnvironmentCheck::new(
                "timeout",
                true,
                "Wall-clock watchdog kills the sandbox process group on deadline.".to_string()
            )
        );

        let overall_status = checks.iter().all(|c| c.status || !c.required);
        if overall_status {
            info!("Sandbox environment is fully configured for safe execution");
        } else {
            warn!("Sandbox environment has configuration issues");
        }

        EnvironmentReport {
            interpreter: self.config().interpreter.display().to_string(),
            sympy_version,
            memory_limit_supported,
            namespace_isolation,
            checks,
            overall_status,
        }
    }
}

fn extract_version(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(line.trim()).ok())
        .find_map(|value| value.get("sympy").and_then(|v| v.as_str()).map(str::to_string))
}

/// `1.9`, `1.12.1`, `2.0.dev0` style versions; anything unparsable is rejected
pub fn version_is_compatible(version: &str) -> bool {
    let mut parts = version.split('.');
    let major = parts.next().and_then(|p| p.parse::<u32>().ok());
    let minor = parts.next().map(|p| {
        p.chars()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse::<u32>()
            .unwrap_or(0)
    });

    match (major, minor) {
        (Some(major), Some(minor)) => (major, minor) >= MIN_SYMPY_VERSION,
        (Some(major), None) => major > MIN_SYMPY_VERSION.0,
        _ => false,
    }
}
