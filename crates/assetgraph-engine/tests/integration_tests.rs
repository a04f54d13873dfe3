//! Integration tests for the graph engine
//!
//! Every test builds a small graph of recording assets that record what the
//! engine asked them to do, then checks the ordering and at-most-once
//! guarantees against that record.
//!
//! ```bash
//! cargo test -p assetgraph-engine --test integration_tests
//! ```

use anyhow::Context;
use assetgraph_core::{AssetIdentity, ErrorKind, File, ResolutionState};
use assetgraph_engine::{
    AsAny, Asset, AssetContext, AssetRegistry, CancelSignal, Engine, GraphError, ParentSet,
};
use assetgraph_store::{DiskStore, FileFetcher, MemoryStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const INSTALL_CONFIG: AssetIdentity = AssetIdentity::new("install-config");
const CLUSTER_ID: AssetIdentity = AssetIdentity::new("cluster-id");
const BOOTSTRAP: AssetIdentity = AssetIdentity::new("bootstrap");
const METADATA: AssetIdentity = AssetIdentity::new("metadata");

// =============================================================================
// Recording Assets
// =============================================================================

/// Shared record of everything the engine asked the assets to do
#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
    generated: Arc<Mutex<HashMap<AssetIdentity, usize>>>,
}

impl Recorder {
    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    fn generate_count(&self, identity: AssetIdentity) -> usize {
        self.generated.lock().unwrap().get(&identity).copied().unwrap_or(0)
    }

    fn total_generates(&self) -> usize {
        self.generated.lock().unwrap().values().sum()
    }
}

#[derive(Clone)]
struct Node {
    id: AssetIdentity,
    deps: Vec<AssetIdentity>,
    outputs: Vec<String>,
    fail: bool,
    persist: bool,
    input: Option<String>,
    peek: Option<AssetIdentity>,
    delay: Duration,
    value: Option<String>,
    recorder: Recorder,
}

impl Node {
    fn new(id: AssetIdentity, deps: &[AssetIdentity], recorder: &Recorder) -> Self {
        Self {
            id,
            deps: deps.to_vec(),
            outputs: Vec::new(),
            fail: false,
            persist: false,
            input: None,
            peek: None,
            delay: Duration::ZERO,
            value: None,
            recorder: recorder.clone(),
        }
    }

    fn output(mut self, path: &str) -> Self {
        self.outputs.push(path.to_string());
        self
    }

    fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    fn persisted(mut self) -> Self {
        self.persist = true;
        self
    }

    fn input(mut self, path: &str) -> Self {
        self.input = Some(path.to_string());
        self
    }

    fn peeking_at(mut self, identity: AssetIdentity) -> Self {
        self.peek = Some(identity);
        self
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait::async_trait]
impl Asset for Node {
    fn identity(&self) -> AssetIdentity {
        self.id
    }

    fn name(&self) -> &str {
        self.id.as_str()
    }

    fn dependencies(&self) -> Vec<AssetIdentity> {
        self.deps.clone()
    }

    async fn generate(&mut self, _ctx: &AssetContext, parents: &ParentSet) -> anyhow::Result<()> {
        self.recorder.record(format!("generate:{}", self.id));
        *self.recorder.generated.lock().unwrap().entry(self.id).or_insert(0) += 1;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(peek) = self.peek {
            parents.get_dyn(peek)?;
        }

        let mut inputs = Vec::new();
        for dep in &self.deps {
            let parent = parents.get_dyn(*dep)?;
            let node = <dyn Asset as AsAny>::as_any(parent)
                .downcast_ref::<Node>()
                .context("parent is not a recorder")?;
            inputs.push(node.value.clone().context("parent has no value")?);
        }

        if self.fail {
            anyhow::bail!("{} refused to generate", self.id);
        }

        self.value = Some(format!("{}[{}]", self.id, inputs.join(",")));
        self.recorder.record(format!("done:{}", self.id));
        Ok(())
    }

    async fn load(&mut self, _ctx: &AssetContext, fetcher: &dyn FileFetcher) -> anyhow::Result<bool> {
        let Some(path) = &self.input else {
            return Ok(false);
        };
        match fetcher.fetch_by_name(path).await? {
            Some(file) => {
                self.value = Some(file.as_str().context("input is not UTF-8")?.to_string());
                self.recorder.record(format!("done:{}", self.id));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn files(&self) -> Vec<File> {
        let value = self.value.clone().unwrap_or_default();
        self.outputs
            .iter()
            .map(|path| File::new(path.clone(), value.clone().into_bytes()))
            .collect()
    }

    fn encode_state(&self) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self
            .persist
            .then(|| self.value.clone().unwrap_or_default().into_bytes()))
    }

    fn decode_state(&mut self, _ctx: &AssetContext, bytes: &[u8]) -> anyhow::Result<()> {
        if bytes == b"corrupt" {
            anyhow::bail!("unexpected state format");
        }
        self.value = Some(String::from_utf8(bytes.to_vec())?);
        self.recorder.record(format!("done:{}", self.id));
        Ok(())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn registry_of(nodes: Vec<Node>) -> AssetRegistry {
    let mut registry = AssetRegistry::new();
    for node in nodes {
        registry
            .register_factory(move || Box::new(node.clone()) as Box<dyn Asset>)
            .unwrap();
    }
    registry
}

/// The installer-shaped graph: metadata needs cluster id, install config and
/// bootstrap; bootstrap needs install config and cluster id.
fn installer_nodes(recorder: &Recorder) -> Vec<Node> {
    vec![
        Node::new(INSTALL_CONFIG, &[], recorder).persisted(),
        Node::new(CLUSTER_ID, &[INSTALL_CONFIG], recorder).persisted(),
        Node::new(BOOTSTRAP, &[INSTALL_CONFIG, CLUSTER_ID], recorder).persisted(),
        Node::new(METADATA, &[CLUSTER_ID, INSTALL_CONFIG, BOOTSTRAP], recorder)
            .persisted()
            .output("metadata.json"),
    ]
}

fn assert_dependencies_first(recorder: &Recorder, registry: &AssetRegistry) {
    for identity in registry.identities() {
        let Some(start) = recorder.position(&format!("generate:{identity}")) else {
            continue;
        };
        for dep in registry.dependencies(&identity).unwrap() {
            let done = recorder
                .position(&format!("done:{dep}"))
                .unwrap_or_else(|| panic!("{dep} never completed"));
            assert!(done < start, "{dep} completed after {identity} started");
        }
    }
}

// =============================================================================
// Ordering and At-Most-Once
// =============================================================================

#[tokio::test]
async fn test_metadata_example_sequential() {
    let recorder = Recorder::default();
    let store = MemoryStore::new();
    let engine = Engine::new(registry_of(installer_nodes(&recorder)), Arc::new(store.clone()));

    let outcome = engine.create(&[METADATA]).await.unwrap();

    assert_eq!(outcome.resolution.order().last(), Some(&METADATA));
    assert_eq!(outcome.resolution.generated().len(), 4);
    assert_dependencies_first(&recorder, engine.registry());
    for identity in [INSTALL_CONFIG, CLUSTER_ID, BOOTSTRAP, METADATA] {
        assert_eq!(recorder.generate_count(identity), 1, "{identity}");
    }

    assert_eq!(store.file_paths().await, vec!["metadata.json".to_string()]);
    let metadata = store.file("metadata.json").await.unwrap();
    assert_eq!(
        metadata.as_str(),
        Some("metadata[cluster-id[install-config[]],install-config[],bootstrap[install-config[],cluster-id[install-config[]]]]")
    );

    assert_eq!(outcome.report.summary.generated, 4);
    assert_eq!(outcome.report.summary.files_written, 1);
}

#[tokio::test]
async fn test_metadata_example_concurrent() {
    let recorder = Recorder::default();
    let nodes = installer_nodes(&recorder)
        .into_iter()
        .map(|node| node.slow(Duration::from_millis(5)))
        .collect();
    let store = MemoryStore::new();
    let engine = Engine::new(registry_of(nodes), Arc::new(store.clone())).concurrent(true);

    let outcome = engine.create(&[METADATA, BOOTSTRAP, METADATA]).await.unwrap();

    assert_eq!(recorder.total_generates(), 4);
    assert_dependencies_first(&recorder, engine.registry());
    assert_eq!(outcome.resolution.state(&BOOTSTRAP), ResolutionState::Generated);
    assert_eq!(store.file_paths().await, vec!["metadata.json".to_string()]);
}

#[tokio::test]
async fn test_shared_dependency_generated_once() {
    let recorder = Recorder::default();
    let leaf = AssetIdentity::new("leaf");
    let left = AssetIdentity::new("left");
    let right = AssetIdentity::new("right");
    let top = AssetIdentity::new("top");
    let nodes = vec![
        Node::new(leaf, &[], &recorder).slow(Duration::from_millis(10)),
        Node::new(left, &[leaf], &recorder),
        Node::new(right, &[leaf], &recorder),
        Node::new(top, &[left, right, leaf], &recorder),
    ];

    for concurrent in [false, true] {
        let recorder_before = recorder.generate_count(leaf);
        let engine = Engine::new(registry_of(nodes.clone()), Arc::new(MemoryStore::new()))
            .concurrent(concurrent);

        engine.create(&[top, left]).await.unwrap();

        assert_eq!(recorder.generate_count(leaf) - recorder_before, 1);
    }
}

#[tokio::test]
async fn test_rerun_against_populated_store_generates_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let first = Recorder::default();
    let engine = Engine::new(
        registry_of(installer_nodes(&first)),
        Arc::new(DiskStore::new(temp.path())),
    );
    engine.create(&[METADATA]).await.unwrap();
    assert_eq!(first.total_generates(), 4);

    let second = Recorder::default();
    let engine = Engine::new(
        registry_of(installer_nodes(&second)),
        Arc::new(DiskStore::new(temp.path())),
    );
    let outcome = engine.create(&[METADATA]).await.unwrap();

    assert_eq!(second.total_generates(), 0);
    assert_eq!(outcome.resolution.loaded(), vec![METADATA]);
    assert_eq!(outcome.resolution.state(&CLUSTER_ID), ResolutionState::Unvisited);
    assert!(temp.path().join("metadata.json").exists());
}

#[tokio::test]
async fn test_user_input_skips_dependencies() {
    let recorder = Recorder::default();
    let nodes = vec![
        Node::new(INSTALL_CONFIG, &[], &recorder),
        Node::new(CLUSTER_ID, &[INSTALL_CONFIG], &recorder).input("cluster-id.txt"),
    ];
    let store = MemoryStore::new();
    store.add_file(File::new("cluster-id.txt", b"from-disk".to_vec())).await;

    let engine = Engine::new(registry_of(nodes), Arc::new(store));
    let resolution = engine.resolve(&[CLUSTER_ID]).await.unwrap();

    assert_eq!(resolution.state(&CLUSTER_ID), ResolutionState::Loaded);
    assert_eq!(resolution.state(&INSTALL_CONFIG), ResolutionState::Unvisited);
    assert_eq!(recorder.total_generates(), 0);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_cycle_is_detected() {
    let recorder = Recorder::default();
    let a = AssetIdentity::new("a");
    let b = AssetIdentity::new("b");

    for concurrent in [false, true] {
        let nodes = vec![Node::new(a, &[b], &recorder), Node::new(b, &[a], &recorder)];
        let store = MemoryStore::new();
        let engine = Engine::new(registry_of(nodes), Arc::new(store.clone())).concurrent(concurrent);

        let result = tokio::time::timeout(Duration::from_secs(5), engine.create(&[a]))
            .await
            .expect("cycle detection must not hang");
        let err = result.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CycleDetected);
        match err.root_cause() {
            GraphError::CycleDetected { path } => {
                assert_eq!(path.first(), path.last());
                assert_eq!(path.len(), 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.file_paths().await.is_empty());
    }
    assert_eq!(recorder.total_generates(), 0);
}

#[tokio::test]
async fn test_duplicate_artifact_writes_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let out = temp.path().join("cluster");
    let recorder = Recorder::default();
    let nodes = vec![
        Node::new(INSTALL_CONFIG, &[], &recorder).output("foo.yaml"),
        Node::new(CLUSTER_ID, &[INSTALL_CONFIG], &recorder)
            .output("foo.yaml")
            .persisted(),
    ];
    let engine = Engine::new(registry_of(nodes), Arc::new(DiskStore::new(&out)));

    let err = engine.create(&[CLUSTER_ID]).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DuplicateArtifact);
    match err {
        GraphError::DuplicateArtifact { path, first, second } => {
            assert_eq!(path, "foo.yaml");
            assert_eq!(first, INSTALL_CONFIG);
            assert_eq!(second, CLUSTER_ID);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!out.exists());
}

#[tokio::test]
async fn test_duplicate_artifact_under_different_spellings() {
    let temp = tempfile::tempdir().unwrap();
    let out = temp.path().join("cluster");
    let recorder = Recorder::default();
    let nodes = vec![
        Node::new(INSTALL_CONFIG, &[], &recorder).output("foo.yaml"),
        Node::new(CLUSTER_ID, &[INSTALL_CONFIG], &recorder).output("./foo.yaml"),
    ];
    let engine = Engine::new(registry_of(nodes), Arc::new(DiskStore::new(&out)));

    let err = engine.create(&[CLUSTER_ID]).await.unwrap_err();
    match err {
        GraphError::DuplicateArtifact { path, first, second } => {
            assert_eq!(path, "foo.yaml");
            assert_eq!(first, INSTALL_CONFIG);
            assert_eq!(second, CLUSTER_ID);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!out.exists());
}

#[tokio::test]
async fn test_generation_failure_is_wrapped_and_aborts() {
    let recorder = Recorder::default();
    let mut nodes = installer_nodes(&recorder);
    nodes[1] = Node::new(CLUSTER_ID, &[INSTALL_CONFIG], &recorder).failing();
    let store = MemoryStore::new();
    let engine = Engine::new(registry_of(nodes), Arc::new(store.clone()));

    let err = engine.create(&[METADATA]).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::GenerationFailure);
    assert_eq!(err.chain(), vec![METADATA, CLUSTER_ID]);
    let msg = err.to_string();
    assert!(msg.starts_with("metadata: "), "{msg}");
    assert!(msg.contains("cluster-id refused to generate"), "{msg}");

    assert_eq!(recorder.generate_count(METADATA), 0);
    assert_eq!(store.commit_count(), 0);
    assert_eq!(store.state_count().await, 0);
}

#[tokio::test]
async fn test_store_failure_is_not_treated_as_missing() {
    let recorder = Recorder::default();
    let store = MemoryStore::new();
    store.add_load_error(BOOTSTRAP, "permission denied").await;
    let engine = Engine::new(registry_of(installer_nodes(&recorder)), Arc::new(store.clone()));

    let err = engine.create(&[METADATA]).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::IoFailure);
    assert!(err.to_string().contains("permission denied"));
    assert_eq!(recorder.generate_count(BOOTSTRAP), 0);
    assert!(store.file_paths().await.is_empty());
}

#[tokio::test]
async fn test_corrupt_state_is_io_failure() {
    let recorder = Recorder::default();
    let store = MemoryStore::new();
    store.add_state(CLUSTER_ID, b"corrupt".to_vec()).await;
    let engine = Engine::new(registry_of(installer_nodes(&recorder)), Arc::new(store));

    let err = engine.create(&[CLUSTER_ID]).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::IoFailure);
    assert!(matches!(err.root_cause(), GraphError::Decode { .. }));
    assert_eq!(recorder.total_generates(), 0);
}

#[tokio::test]
async fn test_undeclared_parent_lookup_fails() {
    let recorder = Recorder::default();
    let nodes = vec![
        Node::new(INSTALL_CONFIG, &[], &recorder),
        Node::new(CLUSTER_ID, &[], &recorder).peeking_at(INSTALL_CONFIG),
    ];
    let engine = Engine::new(registry_of(nodes), Arc::new(MemoryStore::new()));

    let err = engine.create(&[INSTALL_CONFIG, CLUSTER_ID]).await.unwrap_err();

    assert!(matches!(err.root_cause(), GraphError::Parent { .. }));
    assert_eq!(err.kind(), ErrorKind::GenerationFailure);
}

#[tokio::test]
async fn test_unknown_root() {
    let engine = Engine::new(AssetRegistry::new(), Arc::new(MemoryStore::new()));

    let err = engine.create(&[METADATA]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn test_commit_failure_surfaces_as_io() {
    let recorder = Recorder::default();
    let store = MemoryStore::new().with_commit_failure("disk full");
    let engine = Engine::new(registry_of(installer_nodes(&recorder)), Arc::new(store));

    let err = engine.create(&[METADATA]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
    assert!(matches!(err, GraphError::Commit(_)));
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_cancelled_before_start() {
    let recorder = Recorder::default();
    let signal = CancelSignal::new();
    signal.cancel();
    let engine = Engine::new(registry_of(installer_nodes(&recorder)), Arc::new(MemoryStore::new()))
        .with_cancel_signal(signal);

    let err = engine.create(&[METADATA]).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(recorder.total_generates(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_interrupts_generate() {
    let recorder = Recorder::default();
    let nodes = vec![Node::new(INSTALL_CONFIG, &[], &recorder).slow(Duration::from_secs(3600))];
    let engine = Engine::new(registry_of(nodes), Arc::new(MemoryStore::new()))
        .with_deadline(Duration::from_millis(100));

    let err = engine.create(&[INSTALL_CONFIG]).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(recorder.position("done:install-config").is_none());
}

#[tokio::test]
async fn test_sibling_failure_stops_concurrent_work() {
    let recorder = Recorder::default();
    let slow = AssetIdentity::new("slow");
    let broken = AssetIdentity::new("broken");
    let top = AssetIdentity::new("top");
    let nodes = vec![
        Node::new(slow, &[], &recorder).slow(Duration::from_secs(3600)),
        Node::new(broken, &[], &recorder).failing(),
        Node::new(top, &[slow, broken], &recorder),
    ];
    let signal = CancelSignal::new();
    let engine = Engine::new(registry_of(nodes), Arc::new(MemoryStore::new()))
        .concurrent(true)
        .with_cancel_signal(signal.clone());

    let err = tokio::time::timeout(Duration::from_secs(5), engine.create(&[top]))
        .await
        .expect("failure must stop in-flight siblings")
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::GenerationFailure);
    assert!(recorder.position("done:slow").is_none());
    assert!(!signal.is_cancelled());
}
