#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::test;

    use crate::implementations::process_backend::{
        classify_diagnostic,
        parse_backend_output,
        ProcessBackend,
        ProcessBackendConfig,
    };
    use crate::models::common::{ BackendKind, ComplexityClass, ResourceUsage };
    use crate::models::result::ProofErrorKind;
    use crate::traits::backend_adapter::{ BackendAdapter, DialectConfig, QuickCheckOutcome, Submission };
    use crate::tests::support::setup;

    fn shell_backend() -> ProcessBackend {
        ProcessBackend::new(ProcessBackendConfig::new(BackendKind::Custom("sh".to_string()), "sh"))
    }

    fn script(id: &str, body: &str) -> Submission {
        Submission {
            statement_id: id.to_string(),
            backend: BackendKind::Custom("sh".to_string()),
            dialect_text: body.to_string(),
            hypotheses: Vec::new(),
            conclusion: String::new(),
            dialect: DialectConfig::default(),
            memory_limit_mb: 0,
        }
    }

    #[test]
    async fn test_classify_diagnostic() {
        setup();
        assert_eq!(classify_diagnostic("error: parse error at line 3"), ProofErrorKind::Syntax);
        assert_eq!(classify_diagnostic("Syntax error: unexpected token ')'"), ProofErrorKind::Syntax);
        assert_eq!(classify_diagnostic("error: type mismatch, h has type ℕ"), ProofErrorKind::Type);
        assert_eq!(classify_diagnostic("error: unsolved goals"), ProofErrorKind::Incomplete);
        assert_eq!(classify_diagnostic("error: maximum heartbeats exceeded"), ProofErrorKind::Timeout);
        assert_eq!(classify_diagnostic("error: linarith failed"), ProofErrorKind::Logic);
    }

    #[test]
    async fn test_parse_output_with_reports() {
        setup();
        let stdout = "confidence: 0.93\ncomplexity: polynomial\naxioms: [propext, Classical.choice, propext]\n";
        let result = parse_backend_output(stdout, "", true, Some(0), Duration::from_millis(40), ResourceUsage::default());

        assert!(result.valid);
        assert_eq!(result.confidence, 0.93);
        assert_eq!(result.reported_complexity, Some(ComplexityClass::Polynomial));
        assert_eq!(result.axioms_used, vec!["Classical.choice".to_string(), "propext".to_string()]);
        assert!(result.proof_text.is_none());
        assert_eq!(result.verification_time, Duration::from_millis(40));
    }

    #[test]
    async fn test_parse_output_axioms_after_non_ascii_text() {
        setup();
        // Lower-casing İ changes its byte length
        let result = parse_backend_output(
            "İaxioms:é\n'main' depends on AXIOMS: [propext, Quot.sound]\nİİİ ‖ ∀ x, x = x\n",
            "",
            true,
            Some(0),
            Duration::ZERO,
            ResourceUsage::default()
        );

        assert!(result.valid);
        assert_eq!(
            result.axioms_used,
            vec!["Quot.sound".to_string(), "propext".to_string(), "é".to_string()]
        );
        assert_eq!(result.proof_text.as_deref(), Some("İİİ ‖ ∀ x, x = x"));
    }

    #[cfg(unix)]
    #[test]
    async fn test_quick_check_survives_non_ascii_output() {
        setup();
        let mut config = ProcessBackendConfig::new(BackendKind::Custom("sh".to_string()), "sh");
        config.parse_args = Some(vec!["{file}".to_string()]);
        let parsing = ProcessBackend::new(config);

        let submission = script("unicode", "echo 'İaxioms:é'\necho 'İ syntax error near ∀' >&2\nexit 1\n");
        match parsing.quick_check(&submission, Duration::from_secs(5)).await {
            QuickCheckOutcome::Rejected(result) => assert!(result.has_error(ProofErrorKind::Syntax)),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    async fn test_parse_output_warnings_lower_confidence() {
        setup();
        let result = parse_backend_output(
            "intro n\nsimp\n",
            "warning: unused variable h\nwarning: deprecated lemma\n",
            true,
            Some(0),
            Duration::ZERO,
            ResourceUsage::default()
        );

        assert!(result.valid);
        assert!((result.confidence - 0.9).abs() < 1e-12);
        assert_eq!(result.warnings.len(), 2);
        assert_eq!(result.proof_text.as_deref(), Some("intro n\nsimp"));
    }

    #[test]
    async fn test_parse_output_sorry_is_incomplete() {
        setup();
        let result = parse_backend_output(
            "Main.lean:4:8: warning: declaration uses 'sorry'\n",
            "",
            true,
            Some(0),
            Duration::ZERO,
            ResourceUsage::default()
        );

        assert!(!result.valid);
        assert_eq!(result.confidence, 0.0);
        assert!(result.has_error(ProofErrorKind::Incomplete));
        assert_eq!(result.errors[0].line, Some(4));
    }

    #[test]
    async fn test_parse_output_silent_failure_is_logic_error() {
        setup();
        let result = parse_backend_output("", "", false, Some(1), Duration::ZERO, ResourceUsage::default());

        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ProofErrorKind::Logic);
    }

    #[test]
    async fn test_parse_output_ignores_error_free_summaries() {
        setup();
        let result = parse_backend_output(
            "checked 12 declarations, no errors\n",
            "",
            true,
            Some(0),
            Duration::ZERO,
            ResourceUsage::default()
        );
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[cfg(unix)]
    #[test]
    async fn test_submit_reports_confidence() {
        setup();
        let backend = shell_backend();
        let submission = script("s1", "echo 'confidence: 0.88'\necho 'complexity: trivial'\nexit 0\n");

        let result = backend.submit(&submission, Duration::from_secs(10)).await;

        assert!(result.valid, "errors: {:?}", result.errors);
        assert_eq!(result.confidence, 0.88);
        assert_eq!(result.reported_complexity, Some(ComplexityClass::Trivial));
        assert!(!result.is_timeout());
    }

    #[cfg(unix)]
    #[test]
    async fn test_submit_kills_process_on_timeout() {
        setup();
        let backend = shell_backend();
        let submission = script("slow", "sleep 10\n");

        let started = std::time::Instant::now();
        let result = backend.submit(&submission, Duration::from_millis(200)).await;

        assert!(result.is_timeout());
        assert!(result.has_error(ProofErrorKind::Timeout));
        assert!(!result.valid);
        assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
    }

    #[cfg(target_os = "linux")]
    #[test]
    async fn test_timeout_kills_grandchildren() {
        setup();
        let backend = shell_backend();
        let pid_file = std::env::temp_dir().join(format!("proofmesh-grandchild-{}.pid", std::process::id()));
        let body = format!("sleep 30 &\necho $! > {}\nwait\n", pid_file.display());

        let result = backend.submit(&script("wrapper", &body), Duration::from_millis(300)).await;
        assert!(result.is_timeout());

        let pid: u32 = std::fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        let _ = std::fs::remove_file(&pid_file);

        // Gone, or a zombie waiting to be reaped
        let mut alive = true;
        for _ in 0..20 {
            alive = match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
                Ok(stat) => stat.rsplit(')').next().map(|rest| rest.trim_start().starts_with('Z')) != Some(true),
                Err(_) => false,
            };
            if !alive {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(!alive, "sleep {} outlived the timed-out wrapper", pid);
    }

    #[cfg(unix)]
    #[test]
    async fn test_submit_classifies_type_error() {
        setup();
        let backend = shell_backend();
        let submission = script("bad", "echo 'Main.v:3:1: error: type mismatch' >&2\nexit 1\n");

        let result = backend.submit(&submission, Duration::from_secs(10)).await;

        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ProofErrorKind::Type);
        assert_eq!(result.errors[0].line, Some(3));
    }

    #[test]
    async fn test_missing_program_is_incomplete() {
        setup();
        let backend = ProcessBackend::new(
            ProcessBackendConfig::new(BackendKind::Lean, "proofmesh-no-such-prover")
        );

        let result = backend.submit(&script("s1", "theorem t : True := trivial"), Duration::from_secs(5)).await;
        assert!(!result.valid);
        assert!(result.has_error(ProofErrorKind::Incomplete));
        assert!(result.errors[0].message.contains("proofmesh-no-such-prover"));

        let availability = backend.check_availability().await.unwrap();
        assert!(!availability.available);
        assert!(availability.detail.is_some());
    }

    #[cfg(unix)]
    #[test]
    async fn test_check_availability_reads_version() {
        setup();
        let mut config = ProcessBackendConfig::new(BackendKind::Custom("sh".to_string()), "sh");
        config.version_args = vec!["-c".to_string(), "echo 'toy prover 1.2'".to_string()];
        let backend = ProcessBackend::new(config);

        let availability = backend.check_availability().await.unwrap();
        assert!(availability.available);
        assert_eq!(availability.version.as_deref(), Some("toy prover 1.2"));
    }

    #[cfg(unix)]
    #[test]
    async fn test_quick_check_modes() {
        setup();
        let backend = shell_backend();
        let submission = script("q", "echo 'syntax error: unexpected token' >&2\nexit 1\n");
        assert_eq!(backend.quick_check(&submission, Duration::from_secs(5)).await, QuickCheckOutcome::Skipped);

        let mut config = ProcessBackendConfig::new(BackendKind::Custom("sh".to_string()), "sh");
        config.parse_args = Some(vec!["{file}".to_string()]);
        let parsing = ProcessBackend::new(config);

        match parsing.quick_check(&submission, Duration::from_secs(5)).await {
            QuickCheckOutcome::Rejected(result) => assert!(result.has_error(ProofErrorKind::Syntax)),
            other => panic!("expected rejection, got {:?}", other),
        }
        let fine = script("ok", "exit 0\n");
        assert_eq!(parsing.quick_check(&fine, Duration::from_secs(5)).await, QuickCheckOutcome::Parsed);
    }

    #[test]
    async fn test_default_extensions() {
        setup();
        assert_eq!(ProcessBackendConfig::new(BackendKind::Coq, "coqc").file_extension, "v");
        assert_eq!(ProcessBackendConfig::new(BackendKind::Z3, "z3").file_extension, "smt2");
        assert_eq!(ProcessBackendConfig::new(BackendKind::Lean, "lean").args, vec!["{file}".to_string()]);
    }
}
