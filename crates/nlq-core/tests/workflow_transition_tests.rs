use nlq_core::{Evidence, IngestState, Orchestrator, OrchestratorConfig, OrchestratorError};
use nlq_adapters::{default_collaborators, CannedSqlExecutor, ScriptedPlanner};

fn orchestrator() -> Orchestrator {
    Orchestrator::new(default_collaborators(ScriptedPlanner::new(vec![]), CannedSqlExecutor::new()),
                      OrchestratorConfig::default())
}

#[test]
fn skipping_a_stage_is_rejected_and_history_untouched() {
    let orch = orchestrator();
    let instance = orch.upload_dataset(b"a,b\n1,2\n");

    // FileDropped -> Profiled skips Classified
    let err = orch.advance_workflow(instance.id, IngestState::Profiled, Evidence::new("jump", None))
                  .unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));

    let after = orch.workflow(instance.id).unwrap();
    assert_eq!(after.state, IngestState::FileDropped);
    assert!(after.history.is_empty());

    // the immediate successor is accepted and appends exactly one record
    let after = orch.advance_workflow(instance.id, IngestState::Classified, Evidence::new("ok", None))
                    .unwrap();
    assert_eq!(after.state, IngestState::Classified);
    assert_eq!(after.history.len(), 1);
}

#[test]
fn history_is_always_a_prefix_of_the_linear_order() {
    let orch = orchestrator();
    let instance = orch.upload_dataset(b"a\n1\n");

    for target in IngestState::ORDERED.iter().skip(1) {
        orch.advance_workflow(instance.id, *target, Evidence::new("step", None)).unwrap();
        let snapshot = orch.workflow(instance.id).unwrap();
        for (i, record) in snapshot.history.iter().enumerate() {
            assert_eq!(record.from, IngestState::ORDERED[i]);
            assert_eq!(record.to, IngestState::ORDERED[i + 1]);
        }
    }
    assert_eq!(orch.workflow(instance.id).unwrap().state, IngestState::Done);
}

#[test]
fn terminal_states_accept_no_transitions() {
    let orch = orchestrator();
    let instance = orch.upload_dataset(b"a\n1\n");

    orch.advance_workflow(instance.id, IngestState::Failed, Evidence::new("broken upload", None))
        .unwrap();
    let err = orch.advance_workflow(instance.id, IngestState::Classified, Evidence::new("retry", None))
                  .unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));
    // Failed is terminal even for Failed itself
    let err = orch.advance_workflow(instance.id, IngestState::Failed, Evidence::new("again", None))
                  .unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));
}

#[test]
fn failed_is_reachable_from_any_intermediate_state() {
    let orch = orchestrator();
    let instance = orch.upload_dataset(b"a\n1\n");

    orch.advance_workflow(instance.id, IngestState::Classified, Evidence::new("ok", None)).unwrap();
    orch.advance_workflow(instance.id, IngestState::Profiled, Evidence::new("ok", None)).unwrap();
    let after = orch.advance_workflow(instance.id, IngestState::Failed, Evidence::new("profiler crash", None))
                    .unwrap();
    assert_eq!(after.state, IngestState::Failed);
    assert_eq!(after.history.last().unwrap().from, IngestState::Profiled);
}

#[test]
fn clear_instance_removes_it() {
    let orch = orchestrator();
    let instance = orch.upload_dataset(b"a\n1\n");

    orch.clear_instance(instance.id).unwrap();
    assert!(matches!(orch.workflow(instance.id), Err(OrchestratorError::NotFound(_))));
    assert!(matches!(orch.clear_instance(instance.id), Err(OrchestratorError::NotFound(_))));
}

#[test]
fn racing_advances_on_one_instance_have_exactly_one_winner() {
    let orch = orchestrator();
    let instance = orch.upload_dataset(b"a\n1\n");

    let results: Vec<Result<_, _>> = std::thread::scope(|s| {
        let handles: Vec<_> =
            (0..2).map(|_| {
                      s.spawn(|| {
                           orch.advance_workflow(instance.id,
                                                 IngestState::Classified,
                                                 Evidence::new("race", None))
                       })
                  })
                  .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one concurrent advance may win");
    assert!(results.iter()
                   .filter(|r| r.is_err())
                   .all(|r| matches!(r, Err(OrchestratorError::InvalidTransition { .. }))));

    let after = orch.workflow(instance.id).unwrap();
    assert_eq!(after.state, IngestState::Classified);
    assert_eq!(after.history.len(), 1);
}

#[test]
fn concurrent_puts_of_identical_content_store_one_copy() {
    let orch = orchestrator();
    let registry = orch.registry().clone();

    let hashes: Vec<String> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8).map(|_| {
                                        let registry = registry.clone();
                                        s.spawn(move || {
                                             registry.put(nlq_core::ArtifactKind::RowSet,
                                                          serde_json::json!({ "rows": [[1, 2]] }),
                                                          "writer")
                                         })
                                    })
                                    .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(hashes.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(registry.len(), 1);
}

#[test]
fn identical_uploads_share_the_raw_artifact() {
    let orch = orchestrator();
    let a = orch.upload_dataset(b"x,y\n1,2\n");
    let b = orch.upload_dataset(b"x,y\n1,2\n");

    assert_ne!(a.id, b.id);
    assert_eq!(a.latest_artifact(), b.latest_artifact());
    assert_eq!(orch.registry().len(), 1);
}
