//! Batch scenarios: admission, mixed outcomes and the invariants that hold
//! across any sequence of run/cancel/clear calls.

use std::sync::Arc;
use upload_orchestrator::{
    BatchStats, MemoryMetadata, MemoryStorage, TaskFailure, TaskState, TaskStatus, UploadFile,
    UploadOrchestrator, UploadTask, UploaderConfig, ValidationError,
};

const MB: usize = 1024 * 1024;

fn setup(
    config: UploaderConfig,
    storage: MemoryStorage,
    metadata: MemoryMetadata,
) -> (UploadOrchestrator, Arc<MemoryStorage>, Arc<MemoryMetadata>) {
    let storage = Arc::new(storage);
    let metadata = Arc::new(metadata);
    let orchestrator = UploadOrchestrator::new(
        config.owner_id("user").container_id("subject"),
        storage.clone(),
        metadata.clone(),
    )
    .expect("Failed to create orchestrator");
    (orchestrator, storage, metadata)
}

fn file(name: &str, size: usize) -> UploadFile {
    UploadFile::from_bytes(name, vec![7u8; size])
}

fn assert_stats_consistent(stats: &BatchStats) {
    assert_eq!(
        stats.total,
        stats.pending + stats.uploading + stats.processing + stats.completed + stats.failed
    );
}

fn assert_terminal_payloads(task: &UploadTask) {
    match task.status() {
        TaskStatus::Completed => {
            assert!(task.result().is_some());
            assert!(task.error().is_none());
            assert_eq!(task.progress(), 100);
        }
        TaskStatus::Error => {
            assert!(task.error().is_some());
            assert!(task.result().is_none());
        }
        _ => {
            assert!(task.error().is_none());
            assert!(task.result().is_none());
        }
    }
}

#[tokio::test]
async fn test_oversized_file_rejected_at_admission() {
    let (orchestrator, storage, metadata) = setup(
        UploaderConfig::new().max_file_size(10 * MB as u64),
        MemoryStorage::new(),
        MemoryMetadata::new(),
    );

    let ids = orchestrator.admit(vec![
        file("one.pdf", MB),
        file("twenty.pdf", 20 * MB),
        file("two.pdf", 2 * MB),
    ]);

    let statuses: Vec<_> = ids
        .iter()
        .map(|id| orchestrator.task(id).unwrap().status())
        .collect();
    assert_eq!(
        statuses,
        vec![TaskStatus::Pending, TaskStatus::Error, TaskStatus::Pending]
    );
    assert!(matches!(
        orchestrator.task(&ids[1]).unwrap().error(),
        Some(TaskFailure::Validation(ValidationError::FileTooLarge { size, max, .. }))
            if *size == 20 * MB as u64 && *max == 10 * MB as u64
    ));
    assert_eq!(orchestrator.stats().failed, 1);

    let summary = orchestrator.run().await.unwrap();
    assert_eq!(summary.launched, 2);

    // rejected files never reach a collaborator
    assert_eq!(storage.upload_count(), 2);
    assert_eq!(metadata.create_count(), 2);
    assert!(metadata.manifests().iter().all(|m| m.name != "twenty.pdf"));
}

#[tokio::test]
async fn test_unsupported_type_rejected_at_admission() {
    let (orchestrator, storage, _) = setup(
        UploaderConfig::new().accepted_kinds(["application/pdf", "image/*"]),
        MemoryStorage::new(),
        MemoryMetadata::new(),
    );

    let ids = orchestrator.admit(vec![file("photo.png", 10), file("script.sh", 10)]);
    orchestrator.run().await.unwrap();

    assert_eq!(orchestrator.task(&ids[0]).unwrap().status(), TaskStatus::Completed);
    assert!(matches!(
        orchestrator.task(&ids[1]).unwrap().error(),
        Some(TaskFailure::Validation(ValidationError::UnsupportedType { .. }))
    ));
    assert_eq!(storage.upload_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_transfer_failure_is_isolated() {
    let _ = env_logger::try_init();

    // Try both admission orders: outcomes must not depend on launch order
    for names in [["a.pdf", "b.pdf"], ["b.pdf", "a.pdf"]] {
        let (orchestrator, _, metadata) = setup(
            UploaderConfig::new(),
            MemoryStorage::new().fail_for("b.pdf", "connection reset"),
            MemoryMetadata::new(),
        );

        let ids = orchestrator.admit(names.iter().map(|name| file(name, 64)).collect());
        let summary = orchestrator.run().await.unwrap();
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 1);

        for (id, name) in ids.iter().zip(names) {
            let task = orchestrator.task(id).unwrap();
            if name == "a.pdf" {
                assert_eq!(task.status(), TaskStatus::Completed);
                assert!(task.result().is_some());
            } else {
                match task.error() {
                    Some(TaskFailure::Transfer { message }) => {
                        assert!(message.contains("connection reset"))
                    }
                    other => panic!("Unexpected failure: {:?}", other),
                }
            }
            assert_terminal_payloads(&task);
        }

        assert_eq!(metadata.create_count(), 1);
    }
}

#[tokio::test]
async fn test_cancel_before_run_skips_execution() {
    let (orchestrator, storage, _) = setup(
        UploaderConfig::new(),
        MemoryStorage::new(),
        MemoryMetadata::new(),
    );

    let ids = orchestrator.admit(vec![file("keep.pdf", 10), file("drop.pdf", 10)]);
    assert!(orchestrator.cancel(&ids[1]));
    assert_eq!(
        orchestrator.task(&ids[1]).unwrap().error(),
        Some(&TaskFailure::Cancelled)
    );

    let summary = orchestrator.run().await.unwrap();
    assert_eq!(summary.launched, 1);
    assert_eq!(storage.upload_count(), 1);
    assert_eq!(orchestrator.task(&ids[1]).unwrap().status(), TaskStatus::Error);
    assert_eq!(orchestrator.stats().cancelled, 1);
}

#[tokio::test]
async fn test_missing_record_fails_task_after_transfer() {
    let (orchestrator, storage, _) = setup(
        UploaderConfig::new(),
        MemoryStorage::new(),
        MemoryMetadata::new().no_record_for("ghost.pdf"),
    );

    let id = orchestrator.admit_one(file("ghost.pdf", 32));
    let summary = orchestrator.run().await.unwrap();
    assert_eq!(summary.failed, 1);

    let task = orchestrator.task(&id).unwrap();
    assert!(matches!(
        task.error(),
        Some(TaskFailure::RecordCreation { .. })
    ));
    // the bytes were stored before the record call failed
    assert_eq!(storage.paths().len(), 1);
    assert_terminal_payloads(&task);
}

#[tokio::test]
async fn test_metadata_error_fails_task() {
    let (orchestrator, _, _) = setup(
        UploaderConfig::new(),
        MemoryStorage::new(),
        MemoryMetadata::new().fail_for("dup.pdf", "unique constraint"),
    );

    let id = orchestrator.admit_one(file("dup.pdf", 32));
    orchestrator.run().await.unwrap();

    match orchestrator.task(&id).unwrap().error() {
        Some(TaskFailure::RecordCreation { message }) => {
            assert!(message.contains("unique constraint"))
        }
        other => panic!("Unexpected failure: {:?}", other),
    }
}

#[tokio::test]
async fn test_terminal_states_are_final() {
    let (orchestrator, storage, _) = setup(
        UploaderConfig::new().max_file_size(100),
        MemoryStorage::new().fail_for("bad.pdf", "denied"),
        MemoryMetadata::new(),
    );

    let ids = orchestrator.admit(vec![
        file("good.pdf", 10),
        file("bad.pdf", 10),
        file("huge.pdf", 1000),
    ]);
    orchestrator.run().await.unwrap();

    let before: Vec<TaskState> = orchestrator
        .tasks()
        .iter()
        .map(|task| task.state().clone())
        .collect();

    for _ in 0..3 {
        for id in &ids {
            assert!(!orchestrator.cancel(id));
        }
        assert_eq!(orchestrator.run().await.unwrap().launched, 0);

        let after: Vec<TaskState> = orchestrator
            .tasks()
            .iter()
            .map(|task| task.state().clone())
            .collect();
        assert_eq!(after, before);
        assert_stats_consistent(&orchestrator.stats());
    }

    assert_eq!(storage.upload_count(), 2);
    for task in orchestrator.tasks() {
        assert_terminal_payloads(&task);
    }
}

#[tokio::test]
async fn test_stats_total_holds_at_every_step() {
    let (orchestrator, _, _) = setup(
        UploaderConfig::new().max_file_size(100),
        MemoryStorage::new(),
        MemoryMetadata::new().no_record_for("c.pdf"),
    );

    assert_stats_consistent(&orchestrator.stats());
    let ids = orchestrator.admit(vec![
        file("a.pdf", 10),
        file("b.pdf", 500),
        file("c.pdf", 20),
        file("d.pdf", 30),
    ]);
    assert_stats_consistent(&orchestrator.stats());

    orchestrator.cancel(&ids[3]);
    assert_stats_consistent(&orchestrator.stats());

    orchestrator.run().await.unwrap();
    let stats = orchestrator.stats();
    assert_stats_consistent(&stats);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 3);
    assert_eq!(stats.cancelled, 1);

    orchestrator.remove(&ids[0]);
    assert_stats_consistent(&orchestrator.stats());
    assert_eq!(orchestrator.stats().total, 3);
}

#[tokio::test]
async fn test_clear_all_twice() {
    let (orchestrator, _, _) = setup(
        UploaderConfig::new(),
        MemoryStorage::new(),
        MemoryMetadata::new(),
    );

    orchestrator.admit(vec![file("a.pdf", 1), file("b.pdf", 2)]);
    orchestrator.run().await.unwrap();
    orchestrator.admit_one(file("c.pdf", 3));

    assert_eq!(orchestrator.clear_all(), 3);
    assert!(orchestrator.tasks().is_empty());
    assert_eq!(orchestrator.clear_all(), 0);
    assert!(orchestrator.tasks().is_empty());
    assert_eq!(orchestrator.stats(), BatchStats::default());
}

#[tokio::test]
async fn test_resubmit_after_transfer_failure() {
    let (orchestrator, storage, _) = setup(
        UploaderConfig::new(),
        MemoryStorage::new().fail_for("flaky.pdf", "timeout"),
        MemoryMetadata::new(),
    );

    let id = orchestrator.admit_one(file("flaky.pdf", 10));
    orchestrator.run().await.unwrap();
    assert_eq!(orchestrator.task(&id).unwrap().status(), TaskStatus::Error);

    let retry = orchestrator.resubmit(&id).unwrap();
    let summary = orchestrator.run().await.unwrap();
    assert_eq!(summary.launched, 1);
    assert_eq!(storage.upload_count(), 2);
    assert_eq!(orchestrator.task(&retry).unwrap().status(), TaskStatus::Error);
    assert_eq!(orchestrator.len(), 2);
}
