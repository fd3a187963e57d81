//! End-to-end pipeline tests over the in-process queue.
//!
//! Stub planners and judges stand in for the reasoning capability; workers
//! run in-process through `AgentWorker`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use ensemble_bus::{MemoryQueue, QueueBackend, QueueClient};
use ensemble_core::{
    ApprovalMessage, DispatchMessage, EnsembleError, EnsembleResult, ErrorKind, IncomingTask,
    Judgement, PlannedSubtask, ResultMessage, SubtaskStatus, Task, TaskId, TaskResult, TaskStatus,
    WireMessage,
};
use ensemble_orchestrator::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Stubs
// ---------------------------------------------------------------------------

/// Returns the plan stored in the task payload under `plan`.
struct PayloadPlanner;

#[async_trait]
impl Planner for PayloadPlanner {
    async fn plan(&self, task: &Task) -> EnsembleResult<Vec<PlannedSubtask>> {
        let raw = task.payload.get("plan").cloned().unwrap_or(serde_json::json!([]));
        parse_plan(&raw.to_string())
    }
}

/// Always answers with the given raw text.
struct RawPlanner(&'static str);

#[async_trait]
impl Planner for RawPlanner {
    async fn plan(&self, _task: &Task) -> EnsembleResult<Vec<PlannedSubtask>> {
        parse_plan(self.0)
    }
}

#[derive(Debug, Clone)]
struct JudgeCall {
    task_id: TaskId,
    results: Vec<TaskResult>,
    missing: Vec<String>,
}

#[derive(Default)]
struct RecordingJudge {
    calls: Mutex<Vec<JudgeCall>>,
}

#[async_trait]
impl Judge for RecordingJudge {
    async fn judge(
        &self,
        task: &Task,
        results: &[TaskResult],
        missing: &[String],
    ) -> EnsembleResult<Judgement> {
        self.calls.lock().push(JudgeCall {
            task_id: task.id.clone(),
            results: results.to_vec(),
            missing: missing.to_vec(),
        });
        let mut bundle = serde_json::Map::new();
        bundle.insert("task".into(), serde_json::json!(task.id));
        bundle.insert("results".into(), serde_json::json!(results.len()));
        Ok(Judgement {
            report: format!("# Report for {}\n\n{} results", task.id, results.len()),
            bundle,
            score: Some(1.0),
        })
    }
}

/// A transactional batch that fails on item `fail_at`, after the items
/// before it were staged. Nothing staged is applied.
struct FailOnItem {
    inner: MemoryQueue,
    fail_at: usize,
    staged_before_failure: AtomicUsize,
}

#[async_trait]
impl QueueBackend for FailOnItem {
    async fn push(&self, queue: &str, payload: String) -> EnsembleResult<()> {
        self.inner.push(queue, payload).await
    }
    async fn push_batch(&self, clear: &[String], items: Vec<(String, String)>) -> EnsembleResult<()> {
        let mut staged = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            if i == self.fail_at {
                self.staged_before_failure.store(staged.len(), Ordering::SeqCst);
                return Err(EnsembleError::Connection(format!("write failed on item {i}")));
            }
            staged.push(item);
        }
        self.inner.push_batch(clear, staged).await
    }
    async fn pop(&self, queue: &str) -> EnsembleResult<String> {
        self.inner.pop(queue).await
    }
    async fn pop_timeout(&self, queue: &str, timeout: Duration) -> EnsembleResult<Option<String>> {
        self.inner.pop_timeout(queue, timeout).await
    }
    async fn purge(&self, queue: &str) -> EnsembleResult<()> {
        self.inner.purge(queue).await
    }
    async fn len(&self, queue: &str) -> EnsembleResult<usize> {
        self.inner.len(queue).await
    }
    async fn ping(&self) -> EnsembleResult<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    backend: Arc<MemoryQueue>,
    judge: Arc<RecordingJudge>,
    artifacts: Arc<InMemoryArtifactStore>,
    orchestrator: Orchestrator,
}

fn harness(planner: Arc<dyn Planner>, deadline: Duration) -> Harness {
    let backend = Arc::new(MemoryQueue::new());
    let judge = Arc::new(RecordingJudge::default());
    let artifacts = Arc::new(InMemoryArtifactStore::new());
    let orchestrator = Orchestrator::builder(backend.clone(), planner, judge.clone())
        .artifacts(artifacts.clone())
        .config(OrchestratorConfig::default().with_collect_deadline(deadline))
        .build();
    Harness {
        backend,
        judge,
        artifacts,
        orchestrator,
    }
}

fn incoming(id: &str, payload: serde_json::Value) -> IncomingTask {
    IncomingTask {
        id: TaskId::from(id),
        payload,
    }
}

/// Spawn a worker for `agent` that answers every subtask with `output`.
fn spawn_worker(
    client: QueueClient,
    agent: &str,
    output: &'static str,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let worker = AgentWorker::new(
        agent,
        client,
        Arc::new(move |_d: DispatchMessage| async move {
            Ok::<_, EnsembleError>(serde_json::json!(output))
        }),
    );
    tokio::spawn(async move {
        worker.run(shutdown).await.unwrap();
    })
}

async fn wait_for_status(orchestrator: &Orchestrator, id: &str, status: TaskStatus) {
    let id = TaskId::from(id);
    for _ in 0..200 {
        if orchestrator.status(&id).await.unwrap() == Some(status) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("task {id} never reached {status}");
}

// ---------------------------------------------------------------------------
// 1. Happy path: one subtask, one worker
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_single_subtask_end_to_end() {
    let h = harness(
        Arc::new(RawPlanner(r#"[{"agent":"solidity","name":"tests"}]"#)),
        Duration::from_secs(10),
    );
    let client = h.orchestrator.client().clone();

    // Play the worker by hand to check the exact wire messages.
    let worker_client = client.clone();
    let worker = tokio::spawn(async move {
        let dispatch: DispatchMessage = worker_client.recv("queue:solidity").await.unwrap();
        assert_eq!(dispatch.task_id.as_str(), "T1");
        assert_eq!(dispatch.subtask_name, "tests");
        assert_eq!(dispatch.agent, "solidity");
        let result = ResultMessage::decode(
            r#"{"taskId":"T1","subtaskName":"tests","success":true,"output":"42/42 passed"}"#,
        )
        .unwrap();
        worker_client.send("artifacts:T1", &result).await.unwrap();
    });

    let record = h
        .orchestrator
        .process(incoming("T1", serde_json::json!({"repo": "x"})))
        .await
        .unwrap();
    worker.await.unwrap();

    assert_eq!(record.task.status, TaskStatus::Approved);
    assert_eq!(record.task.subtasks[0].status, SubtaskStatus::Completed);

    let calls = h.judge.calls.lock().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].results.len(), 1);
    assert_eq!(calls[0].results[0].output, "42/42 passed");
    assert!(calls[0].missing.is_empty());

    let report = h.artifacts.get(&TaskId::from("T1"), "report.md").unwrap();
    assert!(report.content.starts_with("# Report for T1"));
    assert!(h.artifacts.get(&TaskId::from("T1"), "bundle.json").is_some());

    let approvals = h.backend.snapshot("tasks:approval");
    assert_eq!(approvals.len(), 1);
    let approval = ApprovalMessage::decode(&approvals[0]).unwrap();
    assert_eq!(approval.id.as_str(), "T1");
    assert_eq!(approval.bundle["results"], 1);
}

// ---------------------------------------------------------------------------
// 2. Deadline: one of two workers stays silent
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_deadline_judges_partial_results() {
    let h = harness(
        Arc::new(RawPlanner(
            r#"[{"agent":"solidity","name":"tests"},{"agent":"slither","name":"audit"}]"#,
        )),
        Duration::from_millis(5000),
    );
    let shutdown = CancellationToken::new();
    let worker = spawn_worker(
        h.orchestrator.client().clone(),
        "solidity",
        "42/42 passed",
        shutdown.clone(),
    );

    let record = h
        .orchestrator
        .process(incoming("T1", serde_json::json!({})))
        .await
        .unwrap();
    shutdown.cancel();
    worker.await.unwrap();

    assert_eq!(record.task.status, TaskStatus::Approved);
    let verdict = record.verdict.unwrap();
    assert!(verdict.is_partial());
    assert_eq!(verdict.missing_subtasks, vec!["audit".to_string()]);

    let statuses: Vec<_> = record
        .task
        .subtasks
        .iter()
        .map(|s| (s.name.as_str(), s.status))
        .collect();
    assert!(statuses.contains(&("tests", SubtaskStatus::Completed)));
    assert!(statuses.contains(&("audit", SubtaskStatus::TimedOut)));

    let calls = h.judge.calls.lock().clone();
    assert_eq!(calls[0].missing, vec!["audit".to_string()]);
    assert_eq!(calls[0].results.len(), 1);
    assert_eq!(h.orchestrator.tracker().metrics().await.partial, 1);
}

// ---------------------------------------------------------------------------
// 3. Failure paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_dispatch_failure_delivers_nothing() {
    let backend = Arc::new(FailOnItem {
        inner: MemoryQueue::new(),
        fail_at: 2,
        staged_before_failure: AtomicUsize::new(0),
    });
    backend
        .push("artifacts:T1", "left over".into())
        .await
        .unwrap();
    let judge = Arc::new(RecordingJudge::default());
    let ledger = Arc::new(MemoryTaskStore::new());
    let orchestrator = Orchestrator::builder(
        backend.clone(),
        Arc::new(RawPlanner(
            r#"[
                {"agent":"solidity","name":"tests"},
                {"agent":"slither","name":"audit"},
                {"agent":"solidity","name":"coverage"},
                {"agent":"docs","name":"readme"}
            ]"#,
        )),
        judge.clone(),
    )
    .ledger(ledger.clone())
    .build();

    let record = orchestrator
        .process(incoming("T1", serde_json::json!({})))
        .await
        .unwrap();

    assert_eq!(record.task.status, TaskStatus::Failed);
    assert_eq!(record.task.failure.as_ref().unwrap().kind, ErrorKind::Dispatch);
    // Subtasks 0 and 1 were accepted before subtask 2 failed; none arrived.
    assert_eq!(backend.staged_before_failure.load(Ordering::SeqCst), 2);
    for queue in ["queue:solidity", "queue:slither", "queue:docs"] {
        assert_eq!(backend.len(queue).await.unwrap(), 0, "{queue} got a subtask");
    }
    // Clearing the result queue is part of the same failed step.
    assert_eq!(backend.len("artifacts:T1").await.unwrap(), 1);
    assert!(judge.calls.lock().is_empty());

    let stored = ledger.get(&TaskId::from("T1")).await.unwrap().unwrap();
    assert_eq!(stored.task.status, TaskStatus::Failed);
}

#[tokio::test]
async fn test_malformed_plan_fails_only_that_task() {
    let h = harness(Arc::new(RawPlanner(r#"{"not":"a list"}"#)), Duration::from_secs(1));
    let record = h
        .orchestrator
        .process(incoming("T1", serde_json::json!({})))
        .await
        .unwrap();

    assert_eq!(record.task.status, TaskStatus::Failed);
    let failure = record.task.failure.unwrap();
    assert_eq!(failure.kind, ErrorKind::Schema);
    assert!(failure.reason.contains("plan"));
    assert_eq!(h.backend.len("tasks:approval").await.unwrap(), 0);
    assert_eq!(
        h.orchestrator
            .tracker()
            .metrics()
            .await
            .failures_by_kind[&ErrorKind::Schema],
        1
    );
}

#[tokio::test]
async fn test_failed_worker_result_still_judged() {
    let h = harness(
        Arc::new(RawPlanner(r#"[{"agent":"solidity","name":"tests"}]"#)),
        Duration::from_secs(10),
    );
    let worker = AgentWorker::new(
        "solidity",
        h.orchestrator.client().clone(),
        Arc::new(|_d: DispatchMessage| async {
            Err::<serde_json::Value, _>(EnsembleError::Config("forge not installed".into()))
        }),
    );
    let worker = tokio::spawn(async move {
        worker.process_one(Duration::from_secs(5)).await.unwrap();
    });

    let record = h
        .orchestrator
        .process(incoming("T1", serde_json::json!({})))
        .await
        .unwrap();
    worker.await.unwrap();

    assert_eq!(record.task.status, TaskStatus::Approved);
    assert_eq!(record.task.subtasks[0].status, SubtaskStatus::Failed);
    let calls = h.judge.calls.lock().clone();
    assert!(!calls[0].results[0].success);
    assert!(calls[0].missing.is_empty());
}

// ---------------------------------------------------------------------------
// 4. Late results and operator actions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_late_result_does_not_change_finalized_task() {
    let h = harness(
        Arc::new(RawPlanner(r#"[{"agent":"solidity","name":"tests"}]"#)),
        Duration::from_secs(10),
    );
    let shutdown = CancellationToken::new();
    let worker = spawn_worker(
        h.orchestrator.client().clone(),
        "solidity",
        "first",
        shutdown.clone(),
    );
    let record = h
        .orchestrator
        .process(incoming("T1", serde_json::json!({})))
        .await
        .unwrap();
    shutdown.cancel();
    worker.await.unwrap();

    let late = ResultMessage::decode(
        r#"{"taskId":"T1","subtaskName":"tests","success":true,"output":"late"}"#,
    )
    .unwrap();
    h.orchestrator
        .client()
        .send("artifacts:T1", &late)
        .await
        .unwrap();

    let calls = h.judge.calls.lock().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].results[0].output, "first");
    assert_eq!(record.task.status, TaskStatus::Approved);
    assert_eq!(
        h.orchestrator.status(&TaskId::from("T1")).await.unwrap(),
        Some(TaskStatus::Approved)
    );
    assert_eq!(h.backend.len("tasks:approval").await.unwrap(), 1);
}

#[tokio::test]
async fn test_resubmitted_task_ignores_results_from_earlier_run() {
    let h = harness(
        Arc::new(RawPlanner(r#"[{"agent":"solidity","name":"tests"}]"#)),
        Duration::from_millis(600),
    );

    // First run: nobody answers.
    let first = h
        .orchestrator
        .process(incoming("T1", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(first.task.status, TaskStatus::Approved);
    assert_eq!(first.verdict.as_ref().unwrap().missing_subtasks, vec!["tests"]);

    // The first run's worker answers after collection ended.
    let late = ResultMessage::decode(
        r#"{"taskId":"T1","subtaskName":"tests","success":true,"output":"stale from run 1"}"#,
    )
    .unwrap();
    h.orchestrator
        .client()
        .send("artifacts:T1", &late)
        .await
        .unwrap();

    // A slow worker picks up the first run's dispatch while the second runs.
    let slow = AgentWorker::new(
        "solidity",
        h.orchestrator.client().clone(),
        Arc::new(|_d: DispatchMessage| async {
            tokio::time::sleep(Duration::from_millis(150)).await;
            Ok::<_, EnsembleError>(serde_json::json!("stale from run 1"))
        }),
    );
    let slow = tokio::spawn(async move {
        assert!(slow.process_one(Duration::from_secs(1)).await.unwrap());
    });

    let second = h
        .orchestrator
        .process(incoming("T1", serde_json::json!({})))
        .await
        .unwrap();
    slow.await.unwrap();

    assert_ne!(first.task.attempt, second.task.attempt);
    assert_eq!(second.task.subtasks[0].status, SubtaskStatus::TimedOut);
    let calls = h.judge.calls.lock().clone();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].results.is_empty(), "stale results: {:?}", calls[1].results);
    assert_eq!(calls[1].missing, vec!["tests".to_string()]);
    // The second run's own subtask is still waiting for a worker.
    assert_eq!(h.backend.len("queue:solidity").await.unwrap(), 1);
}

#[tokio::test]
async fn test_cancel_collecting_task() {
    let h = harness(
        Arc::new(RawPlanner(r#"[{"agent":"silent","name":"tests"}]"#)),
        Duration::from_secs(60),
    );
    let orchestrator = h.orchestrator.clone();
    let handle = tokio::spawn(async move {
        orchestrator
            .process(incoming("T1", serde_json::json!({})))
            .await
            .unwrap()
    });

    wait_for_status(&h.orchestrator, "T1", TaskStatus::Collecting).await;
    assert!(h.orchestrator.cancel(&TaskId::from("T1")));

    let record = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("cancelled task did not finish")
        .unwrap();
    assert_eq!(record.task.status, TaskStatus::Failed);
    assert_eq!(record.task.failure.unwrap().kind, ErrorKind::Cancelled);
    assert!(h.judge.calls.lock().is_empty());
}

#[tokio::test]
async fn test_duplicate_in_flight_task_rejected() {
    let h = harness(
        Arc::new(RawPlanner(r#"[{"agent":"silent","name":"tests"}]"#)),
        Duration::from_millis(300),
    );
    let orchestrator = h.orchestrator.clone();
    let first = tokio::spawn(async move {
        orchestrator
            .process(incoming("T1", serde_json::json!({})))
            .await
            .unwrap()
    });
    wait_for_status(&h.orchestrator, "T1", TaskStatus::Collecting).await;

    let err = h
        .orchestrator
        .process(incoming("T1", serde_json::json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, EnsembleError::DuplicateTask(_)));

    let record = first.await.unwrap();
    assert_eq!(record.task.status, TaskStatus::Approved);
}

// ---------------------------------------------------------------------------
// 5. The ingestion loop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_run_loop_isolates_slow_tasks() {
    let h = harness(Arc::new(PayloadPlanner), Duration::from_secs(3));
    let shutdown = CancellationToken::new();
    let worker = spawn_worker(
        h.orchestrator.client().clone(),
        "fast",
        "done",
        shutdown.clone(),
    );

    let orchestrator = h.orchestrator.clone();
    let loop_shutdown = shutdown.clone();
    let run = tokio::spawn(async move { orchestrator.run(loop_shutdown).await });

    // A task whose agent never answers, then one that completes right away.
    h.orchestrator
        .submit(
            TaskId::from("slow"),
            serde_json::json!({"plan": [{"agent": "silent", "name": "wait"}]}),
        )
        .await
        .unwrap();
    h.backend
        .push("tasks:incoming", "{\"no\": \"id\"}".into())
        .await
        .unwrap();
    h.orchestrator
        .submit(
            TaskId::from("fast"),
            serde_json::json!({"plan": [{"agent": "fast", "name": "work"}]}),
        )
        .await
        .unwrap();

    wait_for_status(&h.orchestrator, "fast", TaskStatus::Approved).await;
    assert_eq!(
        h.orchestrator.status(&TaskId::from("slow")).await.unwrap(),
        Some(TaskStatus::Collecting)
    );

    // Shutdown drains the slow task through its deadline.
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("loop did not stop")
        .unwrap()
        .unwrap();
    worker.await.unwrap();

    assert_eq!(
        h.orchestrator.status(&TaskId::from("slow")).await.unwrap(),
        Some(TaskStatus::Approved)
    );
    let approvals: Vec<String> = h
        .backend
        .snapshot("tasks:approval")
        .iter()
        .map(|raw| ApprovalMessage::decode(raw).unwrap().id.to_string())
        .collect();
    assert_eq!(approvals, vec!["fast".to_string(), "slow".to_string()]);
    assert_eq!(h.judge.calls.lock().len(), 2);
}

#[tokio::test]
async fn test_run_fails_when_backend_unreachable() {
    struct Down;

    #[async_trait]
    impl QueueBackend for Down {
        async fn push(&self, _: &str, _: String) -> EnsembleResult<()> {
            Err(EnsembleError::Connection("refused".into()))
        }
        async fn push_batch(&self, _: &[String], _: Vec<(String, String)>) -> EnsembleResult<()> {
            Err(EnsembleError::Connection("refused".into()))
        }
        async fn pop(&self, _: &str) -> EnsembleResult<String> {
            Err(EnsembleError::Connection("refused".into()))
        }
        async fn pop_timeout(&self, _: &str, _: Duration) -> EnsembleResult<Option<String>> {
            Err(EnsembleError::Connection("refused".into()))
        }
        async fn purge(&self, _: &str) -> EnsembleResult<()> {
            Err(EnsembleError::Connection("refused".into()))
        }
        async fn len(&self, _: &str) -> EnsembleResult<usize> {
            Err(EnsembleError::Connection("refused".into()))
        }
        async fn ping(&self) -> EnsembleResult<()> {
            Err(EnsembleError::Connection("refused".into()))
        }
    }

    let orchestrator = Orchestrator::builder(
        Arc::new(Down),
        Arc::new(PayloadPlanner),
        Arc::new(RecordingJudge::default()),
    )
    .build();
    let err = orchestrator.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, EnsembleError::Connection(_)));
}

#[tokio::test]
async fn test_sequential_mode_processes_in_order() {
    let backend = Arc::new(MemoryQueue::new());
    let judge = Arc::new(RecordingJudge::default());
    let orchestrator = Orchestrator::builder(backend.clone(), Arc::new(PayloadPlanner), judge.clone())
        .config(OrchestratorConfig::default().with_max_concurrent_tasks(1))
        .build();

    for id in ["A", "B", "C"] {
        orchestrator
            .submit(TaskId::from(id), serde_json::json!({}))
            .await
            .unwrap();
    }
    let shutdown = CancellationToken::new();
    let run = {
        let orchestrator = orchestrator.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { orchestrator.run(shutdown).await })
    };
    wait_for_status(&orchestrator, "C", TaskStatus::Approved).await;
    shutdown.cancel();
    run.await.unwrap().unwrap();

    let order: Vec<String> = judge
        .calls
        .lock()
        .iter()
        .map(|c| c.task_id.to_string())
        .collect();
    assert_eq!(order, vec!["A", "B", "C"]);
    let metrics = orchestrator.tracker().metrics().await;
    assert_eq!(metrics.approved, 3);
    assert_eq!(metrics.started, 3);
}

#[tokio::test]
async fn test_subtask_counter_sanity() {
    // Many subtasks across several agents, all answered.
    let plan: Vec<_> = (0..12)
        .map(|i| serde_json::json!({"agent": format!("a{}", i % 3), "name": format!("s{i}")}))
        .collect();
    let h = harness(Arc::new(PayloadPlanner), Duration::from_secs(10));
    let shutdown = CancellationToken::new();
    let handled = Arc::new(AtomicUsize::new(0));
    let mut workers = Vec::new();
    for agent in ["a0", "a1", "a2"] {
        let handled = handled.clone();
        let worker = AgentWorker::new(
            agent,
            h.orchestrator.client().clone(),
            Arc::new(move |d: DispatchMessage| {
                let handled = handled.clone();
                async move {
                    handled.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, EnsembleError>(serde_json::json!(d.subtask_name))
                }
            }),
        );
        let shutdown = shutdown.clone();
        workers.push(tokio::spawn(async move { worker.run(shutdown).await.unwrap() }));
    }

    let record = h
        .orchestrator
        .process(incoming("T1", serde_json::json!({"plan": plan})))
        .await
        .unwrap();
    shutdown.cancel();
    for worker in workers {
        worker.await.unwrap();
    }

    assert_eq!(record.task.status, TaskStatus::Approved);
    assert_eq!(handled.load(Ordering::SeqCst), 12);
    assert!(record
        .task
        .subtasks
        .iter()
        .all(|s| s.status == SubtaskStatus::Completed));
    assert!(!record.verdict.unwrap().is_partial());
}
