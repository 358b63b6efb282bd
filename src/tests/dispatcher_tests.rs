#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::{ Duration, Instant };

    use tokio::test;

    use crate::errors::EngineError;
    use crate::implementations::dispatcher::{ BackendRun, RequestBudget };
    use crate::models::common::{ BackendKind, MathDomain };
    use crate::models::result::ProofErrorKind;
    use crate::traits::backend_adapter::QuickCheckOutcome;
    use crate::tests::support::*;

    fn three_backends(lean: Script, coq: Script, isabelle: Script) -> [Arc<ScriptedBackend>; 3] {
        [
            Arc::new(ScriptedBackend::new(BackendKind::Lean, lean)),
            Arc::new(ScriptedBackend::new(BackendKind::Coq, coq)),
            Arc::new(ScriptedBackend::new(BackendKind::Isabelle, isabelle)),
        ]
    }

    fn kinds(runs: &[BackendRun]) -> Vec<BackendKind> {
        runs.iter().map(|run| run.backend.clone()).collect()
    }

    #[test]
    async fn test_plan_honors_domain_override_and_skips_unusable() {
        setup();
        let backends = three_backends(Script::verified(0.9), Script::verified(0.9), Script::verified(0.9));
        let dispatcher = dispatcher(&backends);

        let mut config = fast_config();
        config.domain_overrides.insert(MathDomain::NumberTheory, BackendKind::Coq);
        config.fallbacks = vec![BackendKind::Z3, BackendKind::Isabelle, BackendKind::Coq];

        let mut stmt = statement("s1", "n + 0 = n");
        stmt.dialects.remove(&BackendKind::Isabelle);

        let plan = dispatcher.plan(&stmt, &config).unwrap();
        assert_eq!(plan.primary, BackendKind::Coq);
        assert_eq!(plan.fallbacks, vec![BackendKind::Lean]);
        // Z3 has no adapter, Isabelle has no dialect text
        assert_eq!(plan.skipped, vec![BackendKind::Z3, BackendKind::Isabelle]);
    }

    #[test]
    async fn test_plan_promotes_first_usable_fallback() {
        setup();
        let backends = three_backends(Script::verified(0.9), Script::verified(0.9), Script::verified(0.9));
        let dispatcher = dispatcher(&backends);

        let mut stmt = statement("s1", "n + 0 = n");
        stmt.dialects.insert(BackendKind::Lean, "   ".to_string());

        let plan = dispatcher.plan(&stmt, &fast_config()).unwrap();
        assert_eq!(plan.primary, BackendKind::Coq);
        assert_eq!(plan.fallbacks, vec![BackendKind::Isabelle]);
        assert_eq!(plan.skipped, vec![BackendKind::Lean]);
    }

    #[test]
    async fn test_no_usable_backend() {
        setup();
        let backends = three_backends(Script::verified(0.9), Script::verified(0.9), Script::verified(0.9));
        let dispatcher = dispatcher(&backends);

        let mut stmt = statement("s1", "n + 0 = n");
        stmt.dialects = BTreeMap::new();
        stmt.dialects.insert(BackendKind::Z3, "(assert (= n n))".to_string());

        let err = dispatcher.dispatch_single(&stmt, &fast_config()).await.unwrap_err();
        assert!(matches!(err, EngineError::NoUsableBackend(ref id) if id == "s1"));
        assert!(backends.iter().all(|b| b.calls() == 0));
    }

    #[test]
    async fn test_parallel_runs_reported_in_launch_order() {
        setup();
        let backends = three_backends(
            Script::verified(0.9).with_delay(Duration::from_millis(120)),
            Script::verified(0.85).with_delay(Duration::from_millis(10)),
            Script::verified(0.8).with_delay(Duration::from_millis(60))
        );
        let dispatcher = dispatcher(&backends);

        let outcome = dispatcher.dispatch_single(&statement("s1", "n + 0 = n"), &fast_config()).await.unwrap();

        assert_eq!(kinds(&outcome.runs), vec![BackendKind::Lean, BackendKind::Coq, BackendKind::Isabelle]);
        assert_eq!(outcome.primary, BackendKind::Lean);
        assert_eq!(outcome.primary_run().map(|r| r.result.confidence), Some(0.9));
        assert_eq!(outcome.secondary_runs().count(), 2);
        assert!(backends.iter().all(|b| b.calls() == 1));
        // Ran side by side, not one after another
        assert!(outcome.elapsed < Duration::from_millis(180), "took {:?}", outcome.elapsed);
    }

    #[test]
    async fn test_sequential_stops_at_first_confident_result() {
        setup();
        let backends = three_backends(Script::verified(0.95), Script::verified(0.9), Script::verified(0.9));
        let dispatcher = dispatcher(&backends);
        let mut config = fast_config();
        config.performance.enable_parallel = false;

        let outcome = dispatcher.dispatch_single(&statement("s1", "n + 0 = n"), &config).await.unwrap();

        assert_eq!(kinds(&outcome.runs), vec![BackendKind::Lean]);
        assert_eq!(backends[1].calls(), 0);
        assert_eq!(backends[2].calls(), 0);
    }

    #[test]
    async fn test_sequential_falls_back_in_order() {
        setup();
        let backends = three_backends(
            Script::refuted(ProofErrorKind::Logic),
            Script::verified(0.6),
            Script::verified(0.9)
        );
        let dispatcher = dispatcher(&backends);
        let mut config = fast_config();
        config.performance.enable_parallel = false;

        let outcome = dispatcher.dispatch_single(&statement("s1", "n + 0 = n"), &config).await.unwrap();

        // Coq verified below minimum confidence, so Isabelle still runs
        assert_eq!(kinds(&outcome.runs), vec![BackendKind::Lean, BackendKind::Coq, BackendKind::Isabelle]);
    }

    #[test]
    async fn test_sequential_with_cross_validation_runs_everything() {
        setup();
        let backends = three_backends(Script::verified(0.95), Script::verified(0.9), Script::verified(0.9));
        let dispatcher = dispatcher(&backends);
        let mut config = fast_config();
        config.performance.enable_parallel = false;
        config.thresholds.require_cross_validation = true;

        let outcome = dispatcher.dispatch_single(&statement("s1", "n + 0 = n"), &config).await.unwrap();

        assert_eq!(outcome.runs.len(), 3);
        assert!(backends.iter().all(|b| b.calls() == 1));
    }

    #[test]
    async fn test_per_backend_timeout() {
        setup();
        let backends = three_backends(
            Script::verified(0.95).with_delay(Duration::from_secs(5)),
            Script::verified(0.9),
            Script::verified(0.9)
        );
        let dispatcher = dispatcher(&backends);
        let mut config = fast_config();
        config.timeouts.full_verification = Duration::from_millis(100);

        let outcome = dispatcher.dispatch_single(&statement("s1", "n + 0 = n"), &config).await.unwrap();

        let primary = &outcome.primary_run().unwrap().result;
        assert!(primary.is_timeout());
        assert!(primary.has_error(ProofErrorKind::Timeout));
        assert!(!primary.valid);
        assert!(outcome.secondary_runs().all(|run| run.result.valid));
        assert!(outcome.elapsed < Duration::from_secs(1));
    }

    #[test]
    async fn test_global_deadline_cancels_stubborn_backend() {
        setup();
        let backends = three_backends(
            Script::verified(0.95).with_delay(Duration::from_secs(30)).ignoring_timeout(),
            Script::verified(0.9),
            Script::verified(0.9)
        );
        let dispatcher = dispatcher(&backends);
        let mut config = fast_config();
        config.timeouts.full_verification = Duration::from_millis(200);
        config.timeouts.cross_validation = Duration::from_millis(200);
        config.timeouts.max_total_time = Duration::from_millis(300);

        let started = Instant::now();
        let outcome = dispatcher.dispatch_single(&statement("s1", "n + 0 = n"), &config).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
        let primary = &outcome.primary_run().unwrap().result;
        assert!(primary.is_timeout());
        assert!(primary.errors[0].message.contains("max_total_time"));
        assert_eq!(outcome.runs.len(), 3);
    }

    #[test]
    async fn test_panicking_backend_is_isolated() {
        setup();
        let backends = three_backends(Script::verified(0.95), Script::panicking(), Script::verified(0.9));
        let dispatcher = dispatcher(&backends);

        let outcome = dispatcher.dispatch_single(&statement("s1", "n + 0 = n"), &fast_config()).await.unwrap();

        let coq = outcome.runs
            .iter()
            .find(|run| run.backend == BackendKind::Coq)
            .unwrap();
        assert!(!coq.result.valid);
        assert!(coq.result.has_error(ProofErrorKind::Incomplete));
        assert!(outcome.primary_run().unwrap().result.valid);
        assert!(outcome.runs.iter().any(|run| run.backend == BackendKind::Isabelle && run.result.valid));
    }

    #[test]
    async fn test_second_dispatch_served_from_cache() {
        setup();
        let backends = three_backends(Script::verified(0.95), Script::verified(0.9), Script::verified(0.85));
        let dispatcher = dispatcher(&backends);
        let stmt = statement("s1", "n + 0 = n");
        let config = fast_config();

        let first = dispatcher.dispatch_single(&stmt, &config).await.unwrap();
        let second = dispatcher.dispatch_single(&stmt, &config).await.unwrap();

        assert!(first.cached_backends().is_empty());
        assert_eq!(second.cached_backends().len(), 3);
        assert!(second.runs.iter().all(|run| run.from_cache && run.result.verification_time.is_zero()));
        assert!(backends.iter().all(|b| b.calls() == 1));

        for (a, b) in first.runs.iter().zip(second.runs.iter()) {
            assert_eq!(a.backend, b.backend);
            assert_eq!(a.result.valid, b.result.valid);
            assert_eq!(a.result.confidence, b.result.confidence);
        }
    }

    #[test]
    async fn test_cache_bypassed_when_disabled() {
        setup();
        let backends = three_backends(Script::verified(0.95), Script::verified(0.9), Script::verified(0.85));
        let dispatcher = dispatcher(&backends);
        let stmt = statement("s1", "n + 0 = n");
        let mut config = fast_config();
        config.performance.enable_cache = false;

        dispatcher.dispatch_single(&stmt, &config).await.unwrap();
        dispatcher.dispatch_single(&stmt, &config).await.unwrap();

        assert!(backends.iter().all(|b| b.calls() == 2));
        assert_eq!(dispatcher.cache().stats().entries, 0);
    }

    #[test]
    async fn test_timed_out_results_are_retried() {
        setup();
        let backends = three_backends(
            Script::verified(0.95).with_delay(Duration::from_secs(5)),
            Script::verified(0.9),
            Script::verified(0.9)
        );
        let dispatcher = dispatcher(&backends);
        let mut config = fast_config();
        config.timeouts.full_verification = Duration::from_millis(50);
        let stmt = statement("s1", "n + 0 = n");

        dispatcher.dispatch_single(&stmt, &config).await.unwrap();
        let second = dispatcher.dispatch_single(&stmt, &config).await.unwrap();

        assert_eq!(backends[0].calls(), 2);
        assert_eq!(second.cached_backends(), vec![BackendKind::Coq, BackendKind::Isabelle]);
    }

    #[test]
    async fn test_quick_check_rejection_stops_dispatch() {
        setup();
        let lean = Arc::new(ScriptedBackend::new(BackendKind::Lean, Script::verified(0.95)).rejecting_syntax());
        let coq = Arc::new(ScriptedBackend::new(BackendKind::Coq, Script::verified(0.9)));
        let dispatcher = dispatcher(&[lean.clone(), coq.clone()]);
        let mut config = fast_config();
        config.timeouts.quick_check = Duration::from_millis(100);

        let outcome = dispatcher.dispatch_single(&statement("s1", "n + 0 = n"), &config).await.unwrap();

        assert!(outcome.rejected_by_quick_check);
        assert_eq!(outcome.runs.len(), 1);
        assert!(outcome.runs[0].result.has_error(ProofErrorKind::Syntax));
        assert_eq!(lean.quick_calls(), 1);
        assert_eq!(lean.calls(), 0);
        assert_eq!(coq.calls(), 0);
    }

    #[test]
    async fn test_quick_check_pass_continues() {
        setup();
        let lean = Arc::new(
            ScriptedBackend::new(BackendKind::Lean, Script::verified(0.95)).with_quick_check(QuickCheckOutcome::Parsed)
        );
        let coq = Arc::new(ScriptedBackend::new(BackendKind::Coq, Script::verified(0.9)));
        let dispatcher = dispatcher(&[lean.clone(), coq.clone()]);
        let mut config = fast_config();
        config.timeouts.quick_check = Duration::from_millis(100);

        let outcome = dispatcher.dispatch_single(&statement("s1", "n + 0 = n"), &config).await.unwrap();

        assert!(!outcome.rejected_by_quick_check);
        assert_eq!(outcome.runs.len(), 2);
        assert_eq!(lean.quick_calls(), 1);
        assert_eq!(lean.calls(), 1);
    }

    #[test]
    async fn test_quick_check_panic_falls_through_to_verification() {
        setup();
        let lean = Arc::new(
            ScriptedBackend::new(BackendKind::Lean, Script::verified(0.95)).panicking_on_quick_check()
        );
        let coq = Arc::new(ScriptedBackend::new(BackendKind::Coq, Script::verified(0.9)));
        let dispatcher = dispatcher(&[lean.clone(), coq.clone()]);
        let mut config = fast_config();
        config.timeouts.quick_check = Duration::from_millis(100);

        let outcome = dispatcher.dispatch_single(&statement("s1", "n + 0 = n"), &config).await.unwrap();

        assert!(!outcome.rejected_by_quick_check);
        assert_eq!(lean.quick_calls(), 1);
        assert_eq!(lean.calls(), 1);
        assert_eq!(coq.calls(), 1);
        assert!(outcome.primary_run().unwrap().result.valid);
    }

    #[test]
    async fn test_quick_check_skipped_when_disabled() {
        setup();
        let lean = Arc::new(ScriptedBackend::new(BackendKind::Lean, Script::verified(0.95)).rejecting_syntax());
        let dispatcher = dispatcher(&[lean.clone()]);

        let outcome = dispatcher.dispatch_single(&statement("s1", "n + 0 = n"), &fast_config()).await.unwrap();

        assert!(!outcome.rejected_by_quick_check);
        assert_eq!(lean.quick_calls(), 0);
        assert!(outcome.primary_run().unwrap().result.valid);
    }

    #[test]
    async fn test_session_pool_limits_concurrency() {
        setup();
        let gauge = Arc::new(ConcurrencyGauge::default());
        let slow = Script::verified(0.9).with_delay(Duration::from_millis(40));
        let backends: Vec<Arc<ScriptedBackend>> = [BackendKind::Lean, BackendKind::Coq, BackendKind::Isabelle]
            .into_iter()
            .map(|kind| Arc::new(ScriptedBackend::new(kind, slow.clone()).sharing_gauge(gauge.clone())))
            .collect();
        let dispatcher = dispatcher(&backends);
        let mut config = fast_config();
        config.performance.max_concurrent = 1;

        let outcome = dispatcher.dispatch_single(&statement("s1", "n + 0 = n"), &config).await.unwrap();

        assert_eq!(outcome.runs.len(), 3);
        assert_eq!(gauge.peak(), 1);
        assert!(outcome.elapsed >= Duration::from_millis(110), "took {:?}", outcome.elapsed);
    }

    #[test]
    async fn test_unbounded_pool_runs_backends_together() {
        setup();
        let gauge = Arc::new(ConcurrencyGauge::default());
        let slow = Script::verified(0.9).with_delay(Duration::from_millis(40));
        let backends: Vec<Arc<ScriptedBackend>> = [BackendKind::Lean, BackendKind::Coq, BackendKind::Isabelle]
            .into_iter()
            .map(|kind| Arc::new(ScriptedBackend::new(kind, slow.clone()).sharing_gauge(gauge.clone())))
            .collect();
        let dispatcher = dispatcher(&backends);

        dispatcher.dispatch_single(&statement("s1", "n + 0 = n"), &fast_config()).await.unwrap();

        assert_eq!(gauge.peak(), 3);
        assert_eq!(backends[0].peak_concurrency(), 3);
    }

    #[test]
    async fn test_exhausted_budget_records_primary_timeout() {
        setup();
        let backends = three_backends(Script::verified(0.95), Script::verified(0.9), Script::verified(0.9));
        let dispatcher = dispatcher(&backends);
        let mut config = fast_config();
        config.timeouts.full_verification = Duration::from_millis(20);
        config.timeouts.cross_validation = Duration::from_millis(20);
        config.timeouts.max_total_time = Duration::from_millis(20);

        let budget = RequestBudget::new(&config);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(budget.expired());

        let outcome = dispatcher.dispatch(&statement("s1", "n + 0 = n"), &config, &budget).await.unwrap();

        assert_eq!(outcome.runs.len(), 1);
        assert!(outcome.primary_run().unwrap().result.is_timeout());
        assert!(backends.iter().all(|b| b.calls() == 0));
    }

    #[test]
    async fn test_registered_backends_sorted() {
        setup();
        let backends = three_backends(Script::verified(0.9), Script::verified(0.9), Script::verified(0.9));
        let dispatcher = dispatcher(&backends);

        assert_eq!(
            dispatcher.registered_backends(),
            vec![BackendKind::Lean, BackendKind::Coq, BackendKind::Isabelle]
        );
        assert!(dispatcher.adapter(&BackendKind::Z3).is_none());
    }
}
