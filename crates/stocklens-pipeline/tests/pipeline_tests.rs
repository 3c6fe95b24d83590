//! End-to-end pipeline tests against the in-memory adapters

use std::sync::Arc;

use stocklens_pipeline::model::{DatasetStatus, NewDataset, WorkflowKind};
use stocklens_pipeline::service::PipelineService;
use stocklens_pipeline::storage::MemoryStorage;
use stocklens_pipeline::store::{MemoryStateStore, StateStore};
use stocklens_pipeline::worker::WorkerConfig;
use stocklens_pipeline::WorkflowError;
use uuid::Uuid;

const INVENTORY_CSV: &[u8] = b"product,qty,price,reorder,supplier\n\
Widget,10,2.50,50,Acme\n\
Widget,10,2.50,50,Acme\n\
Gadget,0,5.00,25,Acme\n\
Sprocket,100,1.25,50,Globex\n";

struct Harness {
    store: Arc<MemoryStateStore>,
    storage: Arc<MemoryStorage>,
    service: PipelineService,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStateStore::new());
    let storage = Arc::new(MemoryStorage::new());
    let service = PipelineService::new(store.clone(), storage.clone(), WorkerConfig::default());
    Harness {
        store,
        storage,
        service,
    }
}

#[tokio::test]
async fn duplicate_clean_workflow_executes_the_chain_once() {
    let h = harness();
    let (dataset, handle) = h
        .service
        .upload_dataset("inventory.csv", INVENTORY_CSV.to_vec())
        .await
        .unwrap();
    assert_eq!(handle.join().await.unwrap(), "CLEAN_SUCCESS");

    let logs_after_first = h.store.log_count().await;
    let owner_after_first = h
        .store
        .get_dataset(dataset.id)
        .await
        .unwrap()
        .unwrap()
        .workflow_id;

    // Duplicate trigger under a fresh idempotency key: same result, no
    // re-execution, no new side effects
    let handle = h
        .service
        .start(WorkflowKind::Clean, "clean-duplicate", dataset.id, Vec::new());
    assert_eq!(handle.join().await.unwrap(), "CLEAN_SUCCESS");

    assert_eq!(h.store.log_count().await, logs_after_first);
    let after = h.store.get_dataset(dataset.id).await.unwrap().unwrap();
    assert_eq!(after.workflow_id, owner_after_first);
    assert_eq!(after.status, DatasetStatus::Ready);
}

#[tokio::test]
async fn duplicate_transform_workflow_short_circuits() {
    let h = harness();
    let (dataset, handle) = h
        .service
        .upload_dataset("inventory.csv", INVENTORY_CSV.to_vec())
        .await
        .unwrap();
    handle.join().await.unwrap();

    let handle = h
        .service
        .request_transform(dataset.id, Vec::new())
        .await
        .unwrap();
    assert_eq!(handle.join().await.unwrap(), "EDA_SUCCESS");
    let logs_after_first = h.store.log_count().await;

    let handle = h.service.start(
        WorkflowKind::Transform,
        "transform-duplicate",
        dataset.id,
        Vec::new(),
    );
    assert_eq!(handle.join().await.unwrap(), "EDA_SUCCESS");
    assert_eq!(h.store.log_count().await, logs_after_first);
}

#[tokio::test]
async fn analysis_payload_matches_contract() {
    let h = harness();
    let (dataset, handle) = h
        .service
        .upload_dataset("inventory.csv", INVENTORY_CSV.to_vec())
        .await
        .unwrap();
    handle.join().await.unwrap();
    h.service
        .request_transform(dataset.id, Vec::new())
        .await
        .unwrap()
        .join()
        .await
        .unwrap();

    let progress = h.service.query_progress(dataset.id).await.unwrap();
    let results = progress.latest_analysis.unwrap();

    // One duplicate row removed; three distinct products analyzed from the
    // raw file (4 raw rows)
    assert_eq!(results["summary"]["total_products"], 4);
    assert_eq!(results["summary"]["duplicates_removed"], 1);
    assert_eq!(results["summary"]["total_rows"], 3);
    // Raw rows: two Widgets (10 x 2.50 each) and one Sprocket (100 x 1.25);
    // the out-of-stock Gadget contributes nothing
    assert_eq!(results["summary"]["total_inventory_value"], 175);
    assert_eq!(results["stock_status"]["out_of_stock"], 1);
    assert_eq!(results["supplier_distribution"]["Acme"], 3);
    assert_eq!(results["supplier_distribution"]["Globex"], 1);

    let metadata = h
        .store
        .get_dataset(dataset.id)
        .await
        .unwrap()
        .unwrap()
        .metadata
        .unwrap();
    assert_eq!(metadata["duplicatesRemoved"], 1);
}

#[tokio::test]
async fn eda_failure_rolls_back_to_eda_failed() {
    let h = harness();
    // Header-only file: the transform stage succeeds over zero rows, the
    // analysis stage has nothing to analyze
    let (dataset, handle) = h
        .service
        .upload_dataset("empty.csv", b"qty,price\n".to_vec())
        .await
        .unwrap();
    handle.join().await.unwrap();

    let err = h
        .service
        .start(WorkflowKind::Transform, "transform-empty", dataset.id, Vec::new())
        .join()
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Permanent { .. }));

    let after = h.store.get_dataset(dataset.id).await.unwrap().unwrap();
    assert_eq!(after.status, DatasetStatus::EdaFailed);
}

#[tokio::test]
async fn transform_failure_rolls_back_to_transform_failed() {
    let h = harness();
    let (dataset, handle) = h
        .service
        .upload_dataset("inventory.csv", INVENTORY_CSV.to_vec())
        .await
        .unwrap();
    handle.join().await.unwrap();

    // The object behind the dataset turns unparseable before the transform
    let key = dataset
        .source_location
        .strip_prefix("mem://")
        .unwrap()
        .to_string();
    h.storage.put(&key, b"\xff\xfe\x00 garbage".to_vec()).await;

    let err = h
        .service
        .request_transform(dataset.id, Vec::new())
        .await
        .unwrap()
        .join()
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Permanent { .. }));

    let after = h.store.get_dataset(dataset.id).await.unwrap().unwrap();
    assert_eq!(after.status, DatasetStatus::TransformFailed);

    let logs = h.store.recent_logs(dataset.id, 2).await.unwrap();
    assert_eq!(logs[0].step, "ROLLBACK");
    assert_eq!(logs[1].step, "TRANSFORM_ERROR");
}

#[tokio::test]
async fn clean_on_missing_dataset_is_a_permanent_failure() {
    let h = harness();
    let err = h
        .service
        .start(WorkflowKind::Clean, "clean-missing", Uuid::new_v4(), Vec::new())
        .join()
        .await
        .unwrap_err();

    match err {
        WorkflowError::Permanent { message } => {
            assert!(message.contains("not found"));
        }
        other => panic!("expected permanent failure, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn retrigger_recovers_a_failed_dataset() {
    let h = harness();
    let dataset = h
        .store
        .create_dataset(NewDataset {
            file_name: "late.csv".into(),
            source_location: "mem://late.csv".into(),
            size_bytes: 0,
        })
        .await
        .unwrap();

    // First clean attempt fails: the object does not exist yet
    let err = h
        .service
        .start(WorkflowKind::Clean, "clean-early", dataset.id, Vec::new())
        .join()
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Failed { .. }));
    assert_eq!(
        h.store
            .get_dataset(dataset.id)
            .await
            .unwrap()
            .unwrap()
            .status,
        DatasetStatus::Failed
    );

    // The file arrives; an operator retrigger drives the dataset to READY
    h.storage.put("late.csv", INVENTORY_CSV.to_vec()).await;
    let handle = h
        .service
        .retrigger(dataset.id, WorkflowKind::Clean)
        .await
        .unwrap();
    assert_eq!(handle.join().await.unwrap(), "CLEAN_SUCCESS");
    assert_eq!(
        h.store
            .get_dataset(dataset.id)
            .await
            .unwrap()
            .unwrap()
            .status,
        DatasetStatus::Ready
    );
}

#[tokio::test]
async fn progress_query_is_usable_mid_pipeline() {
    let h = harness();
    let (dataset, handle) = h
        .service
        .upload_dataset("inventory.csv", INVENTORY_CSV.to_vec())
        .await
        .unwrap();

    // Valid at any time, whatever the pipeline is doing right now
    let progress = h.service.query_progress(dataset.id).await.unwrap();
    assert!(["UPLOADED", "CLEANING", "READY"].contains(&progress.status.as_str()));

    handle.join().await.unwrap();
    let progress = h.service.query_progress(dataset.id).await.unwrap();
    assert_eq!(progress.status, "READY");
    assert!(progress.latest_analysis.is_none());
    assert!(!progress.recent_logs.is_empty());
}
