#[cfg(test)]
mod tests {
    use tokio::test;

    use crate::config::VerifierConfig;
    use crate::errors::OracleError;
    use crate::implementations::reasoning_parser::{
        extract_final_answer,
        parse_reasoning_response,
        NO_FINAL_ANSWER,
    };
    use crate::implementations::reasoning_repairer::LlmReasoningRepairer;
    use crate::traits::oracle::ReasoningOracle;
    use crate::tests::support::{ setup, ScriptedBackend };

    #[test]
    async fn test_think_block_is_split_out() {
        let parsed = parse_reasoning_response(
            "<think>\nlet me differentiate\n</think>\nf'(x) = 6x + 2, so the answer is \\boxed{6x + 2}."
        );

        assert_eq!(parsed.internal_reasoning, "let me differentiate");
        assert_eq!(parsed.worked_solution, "f'(x) = 6x + 2, so the answer is \\boxed{6x + 2}.");
        assert_eq!(parsed.final_answer, "6x + 2");
    }

    #[test]
    async fn test_boxed_answer_keeps_nested_braces() {
        assert_eq!(extract_final_answer("Thus \\boxed{\\frac{1}{2}} is the probability."), "\\frac{1}{2}");
    }

    #[test]
    async fn test_answer_patterns_in_order() {
        assert_eq!(extract_final_answer("We get \\box{7}"), "7");
        assert_eq!(extract_final_answer("Work...\nanswer: 12\nDone"), "12");
        assert_eq!(extract_final_answer("Work...\nFinal answer: x = 3"), "x = 3");
        assert_eq!(extract_final_answer("Step one.\nTherefore, the sum is 10.\nCheck."), "the sum is 10.");
    }

    #[test]
    async fn test_last_line_fallback() {
        assert_eq!(extract_final_answer("First line\nsecond line\n\n  x = 9  \n"), "x = 9");
        assert_eq!(extract_final_answer("   \n"), NO_FINAL_ANSWER);
    }

    #[test]
    async fn test_repairer_builds_new_artifact() {
        setup();
        let backend = ScriptedBackend::replying(&["<think>recheck</think>\n2 + 2 = 4\nFinal answer: 4"]);
        let repairer = LlmReasoningRepairer::new(backend.clone(), &VerifierConfig::default()).unwrap();

        let artifact = repairer
            .generate_reasoning_repair("What is 2 + 2?", "2 + 2 = 5", "- Final answer mismatch").await
            .unwrap();

        assert_eq!(artifact.original_problem, "What is 2 + 2?");
        assert_eq!(artifact.worked_solution, "2 + 2 = 4\nFinal answer: 4");
        assert_eq!(artifact.final_answer, "4");
        assert_eq!(artifact.internal_reasoning, "recheck");
        assert_eq!(artifact.metadata.get("source").and_then(|v| v.as_str()), Some("reasoning_repair"));

        let request = &backend.requests()[0];
        assert_eq!(request.task, "reasoning_repair");
        assert_eq!(request.temperature, Some(0.3));
        let prompt = &request.messages[1].content;
        assert!(prompt.contains("2 + 2 = 5"));
        assert!(prompt.contains("- Final answer mismatch"));
    }

    #[test]
    async fn test_repairer_rejects_empty_solution() {
        setup();
        let backend = ScriptedBackend::replying(&["<think>only thoughts</think>   "]);
        let repairer = LlmReasoningRepairer::new(backend, &VerifierConfig::default()).unwrap();

        let result = repairer.generate_reasoning_repair("p", "s", "f").await;
        assert!(matches!(result, Err(OracleError::Unusable(_))));
    }
}
