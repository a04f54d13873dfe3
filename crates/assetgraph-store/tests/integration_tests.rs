//! Integration tests for store backends
//!
//! Both backends are exercised through the `Store` trait object so the
//! resolver-facing contract is checked the same way for each.
//!
//! ```bash
//! cargo test -p assetgraph-store --test integration_tests
//! ```

use assetgraph_core::{AssetIdentity, File};
use assetgraph_store::{CommitBatch, DiskStore, FileFetcher, MemoryStore, Store, StoreError};

const CLUSTER_ID: AssetIdentity = AssetIdentity::new("cluster-id");
const METADATA: AssetIdentity = AssetIdentity::new("metadata");

// =============================================================================
// Helper Functions
// =============================================================================

fn sample_batch() -> CommitBatch {
    CommitBatch {
        files: vec![
            File::new("metadata.json", br#"{"clusterName":"ostest"}"#.to_vec()),
            File::new("openshift/master-0.yaml", b"kind: Machine\n".to_vec()),
        ],
        states: vec![
            (CLUSTER_ID, br#"{"uuid":"abc"}"#.to_vec()),
            (METADATA, b"{}".to_vec()),
        ],
    }
}

async fn check_contract(store: &dyn Store) {
    assert_eq!(store.load(&CLUSTER_ID).await.unwrap(), None);
    assert!(store.fetch_by_name("metadata.json").await.unwrap().is_none());

    store.commit(sample_batch()).await.unwrap();

    assert_eq!(
        store.load(&CLUSTER_ID).await.unwrap(),
        Some(br#"{"uuid":"abc"}"#.to_vec())
    );

    let file = store
        .as_fetcher()
        .fetch_by_name("metadata.json")
        .await
        .unwrap()
        .expect("metadata.json should be committed");
    assert_eq!(file.as_str(), Some(r#"{"clusterName":"ostest"}"#));

    let manifests = store.fetch_by_pattern("openshift/*.yaml").await.unwrap();
    assert_eq!(manifests.len(), 1);
    assert_eq!(manifests[0].path, "openshift/master-0.yaml");
}

// =============================================================================
// Contract Tests
// =============================================================================

#[tokio::test]
async fn test_disk_store_contract() {
    let temp = tempfile::tempdir().unwrap();
    let store = DiskStore::new(temp.path().join("cluster"));
    check_contract(&store).await;
    assert!(temp.path().join("cluster/.assetgraph/cluster-id.state").exists());
}

#[tokio::test]
async fn test_memory_store_contract() {
    let store = MemoryStore::new();
    check_contract(&store).await;
    assert_eq!(store.commit_count(), 1);
}

#[tokio::test]
async fn test_disk_store_rejects_escaping_path() {
    let temp = tempfile::tempdir().unwrap();
    let store = DiskStore::new(temp.path().join("cluster"));

    let batch = CommitBatch {
        files: vec![File::new("../outside.json", b"{}".to_vec())],
        states: vec![],
    };

    let result = store.commit(batch).await;
    assert!(matches!(result, Err(StoreError::InvalidPath(_))));
    assert!(!temp.path().join("outside.json").exists());
    assert!(!temp.path().join("cluster").exists());
}

#[tokio::test]
async fn test_disk_store_second_commit_overwrites() {
    let temp = tempfile::tempdir().unwrap();
    let store = DiskStore::new(temp.path());

    store.commit(sample_batch()).await.unwrap();
    store
        .commit(CommitBatch {
            files: vec![File::new("metadata.json", b"{}".to_vec())],
            states: vec![],
        })
        .await
        .unwrap();

    let file = store.fetch_by_name("metadata.json").await.unwrap().unwrap();
    assert_eq!(file.data, b"{}".to_vec());
    assert!(store.fetch_by_name("openshift/master-0.yaml").await.unwrap().is_some());
}
