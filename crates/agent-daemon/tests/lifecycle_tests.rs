//! Integration tests for the long-running plugin manager lifecycle

use host_agent_core::config::Config;
use host_agent_core::context::{Platform, SystemContext};
use host_agent_core::io::MemoryStore;
use host_agent_core::schema::{PluginInfo, RunningPluginSet, StopType};
use host_agent_daemon::longrunning::{
    LifecyclePhase, LongRunningFactory, Manager, ManagerCell, ManagerDeps, ManagerError,
};
use host_agent_daemon::plugin::{
    LongRunningPlugin, PluginContext, PluginError, SharedLongRunningPlugin,
};
use host_agent_daemon::task::CancelFlag;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ============================================================================
// Mock plugin
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
enum Behavior {
    /// Run until the cancel flag fires
    #[default]
    UntilCancelled,
    /// Return right away, as if the process died
    Exit,
    /// Die on the first start, then run until cancelled
    ExitOnce,
    /// Never look at the cancel flag
    IgnoreCancel,
}

#[derive(Default)]
struct MockPlugin {
    behavior: Behavior,
    starts: AtomicUsize,
    running: AtomicBool,
    stubbed_running: std::sync::Mutex<Option<bool>>,
    last_configuration: std::sync::Mutex<Option<String>>,
}

impl MockPlugin {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            ..Default::default()
        })
    }

    fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    fn stub_running(&self, running: bool) {
        *self.stubbed_running.lock().unwrap() = Some(running);
    }
}

impl LongRunningPlugin for MockPlugin {
    async fn start(
        &self,
        _ctx: &PluginContext,
        configuration: &str,
        _orchestration_dir: &Path,
        cancel: CancelFlag,
    ) -> Result<(), PluginError> {
        let attempt = self.starts.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_configuration.lock().unwrap() = Some(configuration.to_string());
        self.running.store(true, Ordering::SeqCst);

        match self.behavior {
            Behavior::UntilCancelled => {
                cancel.wait().await;
            }
            Behavior::Exit => {}
            Behavior::ExitOnce => {
                if attempt > 1 {
                    cancel.wait().await;
                }
            }
            Behavior::IgnoreCancel => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self, _ctx: &PluginContext) -> bool {
        let stubbed = *self.stubbed_running.lock().unwrap();
        stubbed.unwrap_or_else(|| self.running.load(Ordering::SeqCst))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn context(config: Config) -> PluginContext {
    PluginContext::new(
        Arc::new(SystemContext::new(
            "test-host".to_string(),
            Platform::Linux,
            PathBuf::from("/tmp/host-agent-tests"),
            "test".to_string(),
        )),
        Arc::new(config),
    )
}

fn persisted(names: &[&str]) -> RunningPluginSet {
    names
        .iter()
        .map(|name| (name.to_string(), PluginInfo::new(*name)))
        .collect()
}

fn manager_with(
    config: Config,
    store: Arc<MemoryStore>,
    plugins: &[(&str, &Arc<MockPlugin>)],
) -> Arc<Manager> {
    let factories = plugins
        .iter()
        .map(|(name, plugin)| {
            LongRunningFactory::from_handler(
                PluginInfo::new(*name),
                Arc::clone(*plugin) as SharedLongRunningPlugin,
            )
        })
        .collect();

    let cell = ManagerCell::new(ManagerDeps::new(store, factories));
    cell.ensure_initialized(&context(config)).unwrap()
}

async fn wait_until<F: Fn() -> bool>(cond: F) -> bool {
    for _ in 0..500 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

// ============================================================================
// Startup
// ============================================================================

#[tokio::test]
async fn test_execute_submits_one_start_job_per_persisted_plugin() {
    let plugin = MockPlugin::new(Behavior::UntilCancelled);
    let store = Arc::new(MemoryStore::new(persisted(&["aws:cloudWatch"])));
    let manager = manager_with(Config::default(), store, &[("aws:cloudWatch", &plugin)]);

    manager.execute().unwrap();

    assert_eq!(manager.start_pool().job_ids(), vec!["aws:cloudWatch"]);
    assert!(wait_until(|| plugin.starts() == 1).await);
    assert!(manager.is_reconciliation_scheduled());
    assert!(manager.running_plugins().contains_key("aws:cloudWatch"));
}

#[tokio::test]
async fn test_double_execute_does_not_duplicate_start_jobs() {
    let plugin = MockPlugin::new(Behavior::UntilCancelled);
    let store = Arc::new(MemoryStore::new(persisted(&["aws:cloudWatch"])));
    let manager = manager_with(Config::default(), store, &[("aws:cloudWatch", &plugin)]);

    manager.execute().unwrap();
    manager.execute().unwrap();

    assert_eq!(manager.start_pool().job_ids().len(), 1);
    assert!(wait_until(|| plugin.starts() >= 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(plugin.starts(), 1);
}

#[tokio::test]
async fn test_unknown_persisted_plugin_is_skipped() {
    let plugin = MockPlugin::new(Behavior::UntilCancelled);
    let store = Arc::new(MemoryStore::new(persisted(&["unknown:plugin"])));
    let manager = manager_with(Config::default(), store, &[("aws:cloudWatch", &plugin)]);

    manager.execute().unwrap();

    assert!(manager.start_pool().job_ids().is_empty());
    assert_eq!(plugin.starts(), 0);
}

#[tokio::test]
async fn test_store_read_failure_aborts_execute() {
    let plugin = MockPlugin::new(Behavior::UntilCancelled);
    let store = Arc::new(MemoryStore::failing());
    let manager = manager_with(Config::default(), store, &[("aws:cloudWatch", &plugin)]);

    let err = manager.execute().unwrap_err();

    assert!(matches!(err, ManagerError::Store(_)));
    assert!(manager.start_pool().job_ids().is_empty());
    assert!(!manager.is_reconciliation_scheduled());
}

// ============================================================================
// Reconciliation
// ============================================================================

#[tokio::test]
async fn test_reconcile_after_execute_skips_running_plugin() {
    let plugin = MockPlugin::new(Behavior::UntilCancelled);
    let store = Arc::new(MemoryStore::new(persisted(&["aws:cloudWatch"])));
    let manager = manager_with(Config::default(), store, &[("aws:cloudWatch", &plugin)]);

    manager.execute().unwrap();
    plugin.stub_running(true);

    assert_eq!(manager.ensure_plugins_are_running(), 0);
    assert_eq!(manager.start_pool().job_ids().len(), 1);
}

#[tokio::test]
async fn test_reconcile_restarts_plugin_that_exited() {
    let plugin = MockPlugin::new(Behavior::Exit);
    let store = Arc::new(MemoryStore::new(persisted(&["aws:cloudWatch"])));
    let manager = manager_with(Config::default(), store, &[("aws:cloudWatch", &plugin)]);

    manager.execute().unwrap();
    assert!(wait_until(|| plugin.starts() == 1 && !manager.start_pool().has_job("aws:cloudWatch")).await);

    assert_eq!(manager.ensure_plugins_are_running(), 1);
    assert!(wait_until(|| plugin.starts() == 2).await);
}

#[tokio::test]
async fn test_reconcile_with_empty_running_set_does_nothing() {
    let plugin = MockPlugin::new(Behavior::UntilCancelled);
    let store = Arc::new(MemoryStore::default());
    let manager = manager_with(Config::default(), store, &[("aws:cloudWatch", &plugin)]);

    manager.execute().unwrap();

    assert_eq!(manager.ensure_plugins_are_running(), 0);
    assert_eq!(plugin.starts(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reconcile_deduplicates_against_in_flight_job() {
    let plugin = MockPlugin::new(Behavior::UntilCancelled);
    let store = Arc::new(MemoryStore::new(persisted(&["aws:cloudWatch"])));
    let manager = manager_with(Config::default(), store, &[("aws:cloudWatch", &plugin)]);

    manager.execute().unwrap();
    plugin.stub_running(false);

    assert_eq!(manager.ensure_plugins_are_running(), 0);
    assert_eq!(manager.start_pool().job_ids().len(), 1);

    manager.request_stop(StopType::SoftStop).await.unwrap();
    assert_eq!(plugin.starts(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reconcile_submits_once() {
    let plugin = MockPlugin::new(Behavior::ExitOnce);
    let store = Arc::new(MemoryStore::new(persisted(&["aws:cloudWatch"])));
    let manager = manager_with(Config::default(), store, &[("aws:cloudWatch", &plugin)]);

    manager.execute().unwrap();
    assert!(wait_until(|| plugin.starts() == 1 && !manager.start_pool().has_job("aws:cloudWatch")).await);
    plugin.stub_running(false);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::task::spawn_blocking(move || manager.ensure_plugins_are_running())
        })
        .collect();

    let mut submitted = 0;
    for handle in handles {
        submitted += handle.await.unwrap();
    }

    assert_eq!(submitted, 1);
    assert!(wait_until(|| plugin.starts() == 2).await);

    manager.request_stop(StopType::SoftStop).await.unwrap();
    assert_eq!(plugin.starts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reconciliation_runs_on_poll_interval() {
    let plugin = MockPlugin::new(Behavior::Exit);
    let store = Arc::new(MemoryStore::new(persisted(&["aws:cloudWatch"])));
    let manager = manager_with(Config::default(), store, &[("aws:cloudWatch", &plugin)]);

    manager.execute().unwrap();
    assert!(wait_until(|| plugin.starts() == 1).await);

    let poll = Config::default().longrunning.poll_interval();
    tokio::time::sleep(poll + Duration::from_secs(1)).await;
    assert!(wait_until(|| plugin.starts() == 2).await);
}

// ============================================================================
// Explicit start / stop
// ============================================================================

#[tokio::test]
async fn test_start_plugin_persists_and_starts() {
    let plugin = MockPlugin::new(Behavior::UntilCancelled);
    let store = Arc::new(MemoryStore::default());
    let manager = manager_with(
        Config::default(),
        Arc::clone(&store),
        &[("aws:cloudWatch", &plugin)],
    );
    manager.execute().unwrap();

    manager
        .start_plugin("aws:cloudWatch", r#"{"metrics":{}}"#.to_string())
        .unwrap();

    let saved = store.snapshot();
    assert_eq!(saved["aws:cloudWatch"].configuration, r#"{"metrics":{}}"#);
    assert!(saved["aws:cloudWatch"].state.is_enabled);
    assert!(wait_until(|| plugin.starts() == 1).await);
    assert_eq!(
        plugin.last_configuration.lock().unwrap().as_deref(),
        Some(r#"{"metrics":{}}"#)
    );
}

#[tokio::test]
async fn test_stop_plugin_forgets_and_cancels() {
    let plugin = MockPlugin::new(Behavior::UntilCancelled);
    let store = Arc::new(MemoryStore::new(persisted(&["aws:cloudWatch"])));
    let manager = manager_with(
        Config::default(),
        Arc::clone(&store),
        &[("aws:cloudWatch", &plugin)],
    );
    manager.execute().unwrap();
    assert!(wait_until(|| plugin.is_running(&context(Config::default()))).await);

    manager.stop_plugin("aws:cloudWatch").unwrap();

    assert!(store.snapshot().is_empty());
    assert!(!manager.running_plugins().contains_key("aws:cloudWatch"));
    assert!(wait_until(|| !manager.start_pool().has_job("aws:cloudWatch")).await);
    assert!(!plugin.running.load(Ordering::SeqCst));

    // Reconciliation no longer revives it
    assert_eq!(manager.ensure_plugins_are_running(), 0);
}

#[tokio::test]
async fn test_start_right_after_stop_restarts_with_new_configuration() {
    let plugin = MockPlugin::new(Behavior::UntilCancelled);
    let store = Arc::new(MemoryStore::new(persisted(&["aws:cloudWatch"])));
    let manager = manager_with(
        Config::default(),
        Arc::clone(&store),
        &[("aws:cloudWatch", &plugin)],
    );
    manager.execute().unwrap();
    assert!(wait_until(|| plugin.starts() == 1).await);

    // The stop job has not run yet when the enable request arrives
    manager.stop_plugin("aws:cloudWatch").unwrap();
    manager
        .start_plugin("aws:cloudWatch", "new".to_string())
        .unwrap();

    assert!(wait_until(|| plugin.starts() == 2 && plugin.running.load(Ordering::SeqCst)).await);
    assert!(wait_until(|| !manager.stop_pool().has_job("aws:cloudWatch")).await);
    assert!(manager.start_pool().has_job("aws:cloudWatch"));
    assert_eq!(
        plugin.last_configuration.lock().unwrap().as_deref(),
        Some("new")
    );
    assert_eq!(store.snapshot()["aws:cloudWatch"].configuration, "new");
}

#[tokio::test]
async fn test_start_unknown_plugin_rejected() {
    let store = Arc::new(MemoryStore::default());
    let manager = manager_with(Config::default(), Arc::clone(&store), &[]);

    let err = manager
        .start_plugin("unknown:plugin", String::new())
        .unwrap_err();

    assert!(matches!(err, ManagerError::UnknownPlugin { .. }));
    assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn test_persisted_configuration_used_on_revival() {
    let plugin = MockPlugin::new(Behavior::UntilCancelled);
    let mut set = RunningPluginSet::new();
    set.insert(
        "aws:cloudWatch".to_string(),
        PluginInfo::new("aws:cloudWatch").with_configuration("saved"),
    );
    let manager = manager_with(
        Config::default(),
        Arc::new(MemoryStore::new(set)),
        &[("aws:cloudWatch", &plugin)],
    );

    manager.execute().unwrap();

    assert!(wait_until(|| plugin.starts() == 1).await);
    assert_eq!(
        plugin.last_configuration.lock().unwrap().as_deref(),
        Some("saved")
    );
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_default_stop_timeouts() {
    let manager = manager_with(Config::default(), Arc::new(MemoryStore::default()), &[]);

    assert_eq!(manager.stop_timeout(StopType::SoftStop), Duration::from_secs(20));
    assert_eq!(manager.stop_timeout(StopType::HardStop), Duration::from_secs(4));
}

#[tokio::test]
async fn test_soft_stop_drains_cooperative_plugins() {
    let plugin = MockPlugin::new(Behavior::UntilCancelled);
    let store = Arc::new(MemoryStore::new(persisted(&["aws:cloudWatch"])));
    let manager = manager_with(Config::default(), store, &[("aws:cloudWatch", &plugin)]);
    manager.execute().unwrap();
    assert!(wait_until(|| plugin.starts() == 1).await);

    let started = Instant::now();
    manager.request_stop(StopType::SoftStop).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!plugin.running.load(Ordering::SeqCst));
    assert_eq!(manager.phase(), LifecyclePhase::Stopped);
    assert!(!manager.is_reconciliation_scheduled());
    assert!(manager.start_pool().is_shut_down());
    assert!(manager.stop_pool().is_shut_down());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_hard_stop_is_bounded_when_job_ignores_cancellation() {
    let plugin = MockPlugin::new(Behavior::IgnoreCancel);
    let store = Arc::new(MemoryStore::new(persisted(&["aws:cloudWatch"])));
    let manager = manager_with(Config::default(), store, &[("aws:cloudWatch", &plugin)]);
    manager.execute().unwrap();
    assert!(wait_until(|| plugin.starts() == 1).await);

    let started = Instant::now();
    let result = manager.request_stop(StopType::HardStop).await;
    let elapsed = started.elapsed();

    assert!(result.is_ok());
    assert!(elapsed < Duration::from_secs(5), "hard stop took {elapsed:?}");
    assert_eq!(manager.phase(), LifecyclePhase::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_hard_stop_drains_both_pools_within_one_deadline() {
    let plugin = MockPlugin::new(Behavior::IgnoreCancel);
    let store = Arc::new(MemoryStore::new(persisted(&["aws:cloudWatch"])));
    let manager = manager_with(Config::default(), store, &[("aws:cloudWatch", &plugin)]);
    manager.execute().unwrap();
    assert!(wait_until(|| plugin.starts() == 1).await);

    // The stop job waits out the 10s cancel wait on a plugin that never exits
    manager.stop_plugin("aws:cloudWatch").unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(manager.stop_pool().has_job("aws:cloudWatch"));
    assert!(manager.start_pool().has_job("aws:cloudWatch"));

    let started = Instant::now();
    manager.request_stop(StopType::HardStop).await.unwrap();
    let elapsed = started.elapsed();

    let deadline = manager.stop_timeout(StopType::HardStop);
    assert!(elapsed < deadline + Duration::from_secs(1), "hard stop took {elapsed:?}");
    assert!(wait_until(|| manager.start_pool().job_ids().is_empty()).await);
    assert!(wait_until(|| manager.stop_pool().job_ids().is_empty()).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_soft_stop_is_bounded_when_job_ignores_cancellation() {
    let plugin = MockPlugin::new(Behavior::IgnoreCancel);
    let store = Arc::new(MemoryStore::new(persisted(&["aws:cloudWatch"])));
    let mut config = Config::default();
    config.longrunning.soft_stop_timeout_secs = 2;
    config.longrunning.hard_stop_timeout_secs = 1;
    let manager = manager_with(config, store, &[("aws:cloudWatch", &plugin)]);
    manager.execute().unwrap();
    assert!(wait_until(|| plugin.starts() == 1).await);

    let started = Instant::now();
    manager.request_stop(StopType::SoftStop).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_requests_rejected_after_stop() {
    let plugin = MockPlugin::new(Behavior::UntilCancelled);
    let manager = manager_with(
        Config::default(),
        Arc::new(MemoryStore::default()),
        &[("aws:cloudWatch", &plugin)],
    );
    manager.request_stop(StopType::SoftStop).await.unwrap();

    assert!(matches!(manager.execute(), Err(ManagerError::Stopped)));
    assert!(matches!(
        manager.start_plugin("aws:cloudWatch", String::new()),
        Err(ManagerError::Stopped)
    ));
    assert_eq!(plugin.starts(), 0);
}
