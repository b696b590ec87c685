#[cfg(test)]
mod tests {
    use serde_json::Value;
    use tokio::test;

    use crate::errors::OracleError;
    use crate::implementations::pipeline::confidence_score;
    use crate::models::verification::{
        ErrorKind,
        FinalVerdict,
        StepVerification,
        VerificationStatus,
    };
    use crate::models::repair::RepairKind;
    use crate::tests::support::*;

    #[test]
    async fn test_clean_contract_output_is_verified() {
        setup();
        let backend = ScriptedBackend::replying(&[&fenced(SCRIPT)]);
        let executor = ScriptedExecutor::new(vec![clean(VERIFIED_STDOUT)]);

        let outcome = pipeline(&backend, &executor).verify(&sample_artifact()).await;

        assert_eq!(outcome.status, VerificationStatus::Verified);
        assert_eq!(outcome.confidence, 1.0);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.steps.len(), 1);
        assert_eq!(outcome.source_code, SCRIPT);
        assert!(outcome.codegen_repair.is_none());
        assert_eq!(outcome.metadata.get("repaired_from_codegen_fault"), Some(&Value::Bool(false)));
        assert_eq!(executor.calls(), 1);
        assert_eq!(backend.requests().len(), 1);
    }

    #[test]
    async fn test_codegen_prompt_carries_the_artifact() {
        setup();
        let backend = ScriptedBackend::replying(&[&fenced(SCRIPT)]);
        let executor = ScriptedExecutor::new(vec![clean(VERIFIED_STDOUT)]);

        pipeline(&backend, &executor).verify(&sample_artifact()).await;

        let request = &backend.requests()[0];
        assert_eq!(request.temperature, None);
        let user = &request.messages[1].content;
        assert!(user.contains("What is 2 + 2?"));
        assert!(user.contains("Adding 2 and 2 gives 5."));
        assert!(request.messages[0].content.contains("final_answer_verified"));
    }

    #[test]
    async fn test_false_verdict_without_steps_is_reasoning_fault() {
        setup();
        let backend = ScriptedBackend::replying(&[&fenced(SCRIPT)]);
        let executor = ScriptedExecutor::new(vec![clean(REFUTED_STDOUT)]);

        let outcome = pipeline(&backend, &executor).verify(&sample_artifact()).await;

        assert_eq!(outcome.status, VerificationStatus::FailedReasoning);
        let verdict = outcome.verdict.as_ref().unwrap();
        assert!(!verdict.answer_verified);
        assert_eq!(outcome.confidence, 0.75);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].kind, ErrorKind::AnswerMismatch);
        assert_eq!(outcome.errors[0].message, "Final answer mismatch. Computed: 5, Claimed: 4");
        // Reasoning faults are never repaired by the pipeline
        assert_eq!(executor.calls(), 1);
        assert!(outcome.codegen_repair.is_none());
    }

    #[test]
    async fn test_failed_step_reports_first_mismatch() {
        setup();
        let stdout = concat!(
            "{\"step\":1,\"description\":\"expand\",\"verified\":true}\n",
            "{\"step\":2,\"description\":\"differentiate\",\"verified\":false}\n",
            "{\"step\":3,\"description\":\"simplify\",\"verified\":false}\n",
            "{\"final_answer_verified\":true,\"computed\":\"6*x + 2\",\"claimed\":\"6*x + 2\"}"
        );
        let backend = ScriptedBackend::replying(&[&fenced(SCRIPT)]);
        let executor = ScriptedExecutor::new(vec![clean(stdout)]);

        let outcome = pipeline(&backend, &executor).verify(&sample_artifact()).await;

        assert_eq!(outcome.status, VerificationStatus::FailedReasoning);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].kind, ErrorKind::StepMismatch);
        assert_eq!(outcome.errors[0].message, "Step 2 failed verification: differentiate");
        assert_eq!(outcome.failed_steps().count(), 2);
        assert_eq!(outcome.confidence, 0.8333);
    }

    #[test]
    async fn test_contract_violation_triggers_one_repair() {
        setup();
        let backend = ScriptedBackend::replying(&[&fenced(SCRIPT), &fenced(REPAIRED_SCRIPT)]);
        let executor = ScriptedExecutor::new(vec![clean("not-json"), clean(VERIFIED_STDOUT)]);

        let outcome = pipeline(&backend, &executor).verify(&sample_artifact()).await;

        assert_eq!(outcome.status, VerificationStatus::Verified);
        assert_eq!(outcome.source_code, REPAIRED_SCRIPT);
        assert_eq!(outcome.metadata.get("repaired_from_codegen_fault"), Some(&Value::Bool(true)));

        let repair = outcome.codegen_repair.as_ref().unwrap();
        assert_eq!(repair.kind, RepairKind::Codegen);
        assert_eq!(repair.attempt_number, 1);
        assert!(repair.succeeded);

        let requests = backend.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].temperature, Some(0.1));
        let repair_prompt = &requests[1].messages[1].content;
        assert!(repair_prompt.contains("Output parsing failed"));
        assert!(repair_prompt.contains(SCRIPT));
        // Same system contract on the repair turn
        assert_eq!(requests[0].messages[0], requests[1].messages[0]);
        assert_eq!(executor.sources(), vec![SCRIPT.to_string(), REPAIRED_SCRIPT.to_string()]);
    }

    #[test]
    async fn test_repeated_timeout_is_pipeline_failure() {
        setup();
        let backend = ScriptedBackend::replying(&[&fenced(SCRIPT), &fenced(REPAIRED_SCRIPT)]);
        let executor = ScriptedExecutor::new(
            vec![
                fault("TimeoutFault", "Execution exceeded the time limit of 30.0s"),
                fault("TimeoutFault", "Execution exceeded the time limit of 30.0s")
            ]
        );

        let outcome = pipeline(&backend, &executor).verify(&sample_artifact()).await;

        assert_eq!(outcome.status, VerificationStatus::FailedPipeline);
        assert_eq!(outcome.confidence, 0.0);
        assert!(outcome.execution.is_none());
        assert!(outcome.steps.is_empty());
        assert!(outcome.verdict.is_none());
        assert!(outcome.source_code.is_empty());
        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome.errors.iter().all(|e| e.kind == ErrorKind::TimeoutFault));
        assert!(outcome.codegen_repair.is_none());
        assert!(outcome.metadata.is_empty());
        assert_eq!(executor.calls(), 2);
        assert_eq!(backend.requests().len(), 2);
    }

    #[test]
    async fn test_repaired_run_is_diagnosed_normally() {
        setup();
        let backend = ScriptedBackend::replying(&[&fenced(SCRIPT), &fenced(REPAIRED_SCRIPT)]);
        let executor = ScriptedExecutor::new(
            vec![fault("RuntimeFault", "NameError: name 'x' is not defined"), clean(REFUTED_STDOUT)]
        );

        let outcome = pipeline(&backend, &executor).verify(&sample_artifact()).await;

        assert_eq!(outcome.status, VerificationStatus::FailedReasoning);
        assert_eq!(outcome.errors[0].kind, ErrorKind::AnswerMismatch);
        assert!(outcome.codegen_repair.as_ref().unwrap().succeeded);

        let repair_prompt = &backend.requests()[1].messages[1].content;
        assert!(repair_prompt.contains("RuntimeFault: NameError: name 'x' is not defined"));
    }

    #[test]
    async fn test_import_fault_is_codegen_fault() {
        setup();
        let backend = ScriptedBackend::replying(&[&fenced(SCRIPT), &fenced(REPAIRED_SCRIPT)]);
        let executor = ScriptedExecutor::new(
            vec![fault("ImportFault", "_ImportDenied: Import of module 'os' is not allowed."), clean(VERIFIED_STDOUT)]
        );

        let outcome = pipeline(&backend, &executor).verify(&sample_artifact()).await;

        assert_eq!(outcome.status, VerificationStatus::Verified);
        assert_eq!(executor.calls(), 2);
    }

    #[test]
    async fn test_missing_verdict_then_unusable_repair() {
        setup();
        let backend = ScriptedBackend::replying(&[&fenced(SCRIPT), "Sorry, I cannot fix this."]);
        let executor = ScriptedExecutor::new(
            vec![clean("{\"step\":1,\"description\":\"ok\",\"verified\":true}")]
        );

        let outcome = pipeline(&backend, &executor).verify(&sample_artifact()).await;

        assert_eq!(outcome.status, VerificationStatus::FailedPipeline);
        let kinds: Vec<_> = outcome.errors.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![ErrorKind::IncompleteOutput, ErrorKind::GenerationFault]);
        assert!(outcome.errors[1].message.starts_with("Codegen fault repair failed: "));
        assert!(outcome.steps.is_empty());
        assert!(outcome.execution.is_none());
        assert!(outcome.codegen_repair.is_none());
        assert!(outcome.metadata.is_empty());
        // The unusable repair never reaches the sandbox
        assert_eq!(executor.calls(), 1);
    }

    #[test]
    async fn test_prose_response_fails_generation() {
        setup();
        let backend = ScriptedBackend::replying(&["I think the answer is probably right."]);
        let executor = ScriptedExecutor::new(vec![]);

        let outcome = pipeline(&backend, &executor).verify(&sample_artifact()).await;

        assert_eq!(outcome.status, VerificationStatus::FailedPipeline);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].kind, ErrorKind::GenerationFault);
        assert!(outcome.codegen_repair.is_none());
        assert_eq!(executor.calls(), 0);
    }

    #[test]
    async fn test_oracle_error_fails_generation() {
        setup();
        let backend = ScriptedBackend::new(vec![Err(OracleError::Network("connection refused".to_string()))]);
        let executor = ScriptedExecutor::new(vec![]);

        let outcome = pipeline(&backend, &executor).verify(&sample_artifact()).await;

        assert_eq!(outcome.status, VerificationStatus::FailedPipeline);
        assert_eq!(outcome.errors[0].kind, ErrorKind::GenerationFault);
        assert!(outcome.errors[0].message.starts_with("Initial code generation failed"));
        assert!(outcome.errors[0].message.contains("connection refused"));
        assert_eq!(executor.calls(), 0);
    }

    #[test]
    async fn test_confidence_score_weights() {
        let verdict = |ok: bool| FinalVerdict { answer_verified: ok, computed_value: None, claimed_value: None };
        let step = |n: i64, ok: bool| StepVerification {
            step_number: n,
            description: String::new(),
            verified: ok,
        };

        assert_eq!(confidence_score(&[], &verdict(true)), 1.0);
        assert_eq!(confidence_score(&[], &verdict(false)), 0.75);
        assert_eq!(confidence_score(&[step(1, false)], &verdict(false)), 0.5);
        assert_eq!(confidence_score(&[step(1, true), step(2, false)], &verdict(true)), 0.875);
        assert_eq!(
            confidence_score(&[step(1, true), step(2, false), step(3, false)], &verdict(false)),
            0.5833
        );
    }
}
