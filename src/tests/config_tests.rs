#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use crate::config::{ render_template, ConfigError, Provider, VerifierConfig };

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = VerifierConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.sandbox.timeout(), Duration::from_secs(30));
        assert_eq!(config.sandbox.memory_limit_bytes(), 512 * 1024 * 1024);
        assert!(config.sandbox.allowed_modules.iter().any(|m| m == "sympy"));
        assert!(!config.sandbox.allowed_builtins.iter().any(|b| b == "open"));
        assert_eq!(config.verification.max_reasoning_attempts, 2);
        assert!(!config.verification.strict_code_fences);
        for name in ["codegen_system", "codegen_user", "codegen_repair", "reasoning_repair_system", "reasoning_repair"] {
            assert!(config.get_template(name).is_some(), "missing template {}", name);
        }
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_config(
            r#"
llm:
  provider: anthropic
  model: claude-test
sandbox:
  timeout_secs: 5
prompt_templates:
  codegen_user: "Check {{problem}}"
"#
        );

        let config = VerifierConfig::from_file(file.path()).unwrap();

        assert_eq!(config.llm.provider, Provider::Anthropic);
        assert_eq!(config.llm.model_name(), "claude-test");
        assert_eq!(config.llm.endpoint(), "https://api.anthropic.com/v1/messages");
        assert_eq!(config.sandbox.timeout_secs, 5);
        assert_eq!(config.sandbox.memory_limit_mb, 512);
        assert_eq!(config.get_template("codegen_user").as_deref(), Some("Check {{problem}}"));
        assert!(config.get_template("codegen_repair").is_some());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let file = write_config("sandbox:\n  timeout_secs: 0\n");
        assert!(matches!(VerifierConfig::from_file(file.path()), Err(ConfigError::InvalidValue(_))));

        let file = write_config("sandbox:\n  allowed_modules: []\n");
        assert!(matches!(VerifierConfig::from_file(file.path()), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let file = write_config("sandbox: [unclosed\n");
        assert!(matches!(VerifierConfig::from_file(file.path()), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = VerifierConfig::from_file(std::path::Path::new("/nonexistent/mathverify.yaml"));
        assert!(matches!(result, Err(ConfigError::FileReadError(_))));
    }

    #[test]
    fn test_api_key_resolution() {
        let mut config = VerifierConfig::default();
        config.llm.api_key = Some("from-config".to_string());
        assert_eq!(config.llm.get_api_key().unwrap().as_deref(), Some("from-config"));

        // Local servers need no key
        config.llm.api_key = None;
        config.llm.provider = Provider::Ollama;
        assert_eq!(config.llm.get_api_key().unwrap(), None);
    }

    #[test]
    fn test_render_template() {
        let rendered = render_template("{{a}} + {{b}} = {{c}}, {{a}}", &[
            ("a", "1"),
            ("b", "2"),
            ("c", "3"),
        ]);
        assert_eq!(rendered, "1 + 2 = 3, 1");
        assert_eq!(render_template("{{unknown}}", &[]), "{{unknown}}");
        assert_eq!(render_template("open {{ brace", &[("a", "1")]), "open {{ brace");
    }

    #[test]
    fn test_render_template_does_not_rescan_values() {
        let rendered = render_template("P: {{problem}}\nS: {{solution}}", &[
            ("problem", "Show {{solution}} is literal"),
            ("solution", "SOL"),
        ]);
        assert_eq!(rendered, "P: Show {{solution}} is literal\nS: SOL");

        // Repair feedback may quote template syntax from stderr
        let rendered = render_template("{{error}} / {{code}}", &[
            ("error", "KeyError: '{{code}}'"),
            ("code", "print(1)"),
        ]);
        assert_eq!(rendered, "KeyError: '{{code}}' / print(1)");
    }

    #[test]
    fn test_isolation_is_on_by_default() {
        let config = VerifierConfig::default();
        assert!(config.sandbox.isolate_namespaces);

        let file = write_config("sandbox:\n  isolate_namespaces: false\n");
        assert!(!VerifierConfig::from_file(file.path()).unwrap().sandbox.isolate_namespaces);
    }
}
