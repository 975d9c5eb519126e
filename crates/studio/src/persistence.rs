//! Best-effort project persistence.
//!
//! Local state is always authoritative. Saves race a fixed timeout; a save
//! that times out or fails is reported, but nothing local is rolled back.
//! [`DebouncedSync`] coalesces bursts of edits into one save per quiet window.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use studioconf::EngineConfig;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::notify::{NotificationSink, StudioEvent};
use crate::project::Project;

#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Insert or replace the project (matched by id) for this user.
    async fn save_project(&self, user_id: &str, project: &Project) -> Result<()>;

    async fn load_projects(&self, user_id: &str) -> Result<Vec<Project>>;
}

fn upsert(projects: &mut Vec<Project>, project: &Project) {
    match projects.iter_mut().find(|p| p.id == project.id) {
        Some(existing) => *existing = project.clone(),
        None => projects.push(project.clone()),
    }
}

/// In-memory project store
#[derive(Debug, Default)]
pub struct InMemoryProjectStore {
    projects: RwLock<HashMap<String, Vec<Project>>>,
}

impl InMemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn save_project(&self, user_id: &str, project: &Project) -> Result<()> {
        let mut projects = self
            .projects
            .write()
            .map_err(|_| anyhow::anyhow!("project store lock poisoned"))?;
        upsert(projects.entry(user_id.to_string()).or_default(), project);
        Ok(())
    }

    async fn load_projects(&self, user_id: &str) -> Result<Vec<Project>> {
        let projects = self
            .projects
            .read()
            .map_err(|_| anyhow::anyhow!("project store lock poisoned"))?;
        Ok(projects.get(user_id).cloned().unwrap_or_default())
    }
}

/// File-backed project store: one JSON array per user.
pub struct FileProjectStore {
    dir: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileProjectStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Store under `<state_dir>/projects`.
    pub fn from_state_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join("projects"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, user_id: &str) -> PathBuf {
        let safe: String = user_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }

    async fn read(&self, path: &Path) -> Result<Vec<Project>> {
        match tokio::fs::read_to_string(path).await {
            Ok(json) => serde_json::from_str(&json)
                .with_context(|| format!("Failed to parse projects from {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }
}

#[async_trait]
impl ProjectStore for FileProjectStore {
    #[tracing::instrument(name = "studio.save_project", skip(self, project), fields(project.id = %project.id))]
    async fn save_project(&self, user_id: &str, project: &Project) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(user_id);

        let mut projects = self.read(&path).await?;
        upsert(&mut projects, project);
        let json = serde_json::to_string_pretty(&projects)?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        // Atomic write: write to temp, then rename
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json)
            .await
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        tokio::fs::rename(&temp_path, &path)
            .await
            .with_context(|| format!("Failed to move {} into place", path.display()))?;

        debug!(path = %path.display(), projects = projects.len(), "Projects written");
        Ok(())
    }

    async fn load_projects(&self, user_id: &str) -> Result<Vec<Project>> {
        self.read(&self.path_for(user_id)).await
    }
}

/// How a save attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Confirmed,
    /// No confirmation in time. The save was abandoned; local state stands.
    TimedOut,
    Failed(String),
}

impl SaveOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, SaveOutcome::Confirmed)
    }

    pub fn to_event(&self, project_id: &str) -> StudioEvent {
        let project_id = project_id.to_string();
        match self {
            SaveOutcome::Confirmed => StudioEvent::SaveConfirmed { project_id },
            SaveOutcome::TimedOut => StudioEvent::SaveTimedOut { project_id },
            SaveOutcome::Failed(reason) => StudioEvent::SaveFailed {
                project_id,
                reason: reason.clone(),
            },
        }
    }
}

/// Save, giving up on confirmation after `timeout`.
pub async fn save_with_timeout(
    store: &dyn ProjectStore,
    user_id: &str,
    project: &Project,
    timeout: Duration,
) -> SaveOutcome {
    match tokio::time::timeout(timeout, store.save_project(user_id, project)).await {
        Ok(Ok(())) => {
            info!(project.id = %project.id, "Project saved");
            SaveOutcome::Confirmed
        }
        Ok(Err(e)) => {
            warn!(project.id = %project.id, error = %format!("{:#}", e), "Project save failed");
            SaveOutcome::Failed(format!("{:#}", e))
        }
        Err(_) => {
            warn!(
                project.id = %project.id,
                timeout_secs = timeout.as_secs_f64(),
                "Project save timed out, keeping local state"
            );
            SaveOutcome::TimedOut
        }
    }
}

enum SyncCommand {
    Changed(Box<Project>),
    Flush(oneshot::Sender<Option<SaveOutcome>>),
}

/// Background sync of the latest project snapshot.
///
/// Each [`schedule`](Self::schedule) replaces the pending snapshot and
/// restarts the quiet window; a save fires only once the window passes with no
/// further change.
pub struct DebouncedSync {
    tx: mpsc::UnboundedSender<SyncCommand>,
    handle: JoinHandle<()>,
}

struct SyncWorker {
    store: Arc<dyn ProjectStore>,
    user_id: String,
    save_timeout: Duration,
    sink: Arc<dyn NotificationSink>,
}

impl SyncWorker {
    async fn save(&self, project: &Project) -> SaveOutcome {
        let outcome =
            save_with_timeout(self.store.as_ref(), &self.user_id, project, self.save_timeout).await;
        self.sink.notify(outcome.to_event(&project.id).into());
        outcome
    }
}

impl DebouncedSync {
    pub fn spawn(
        store: Arc<dyn ProjectStore>,
        user_id: impl Into<String>,
        quiet_period: Duration,
        save_timeout: Duration,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = SyncWorker {
            store,
            user_id: user_id.into(),
            save_timeout,
            sink,
        };
        let handle = tokio::spawn(Self::run(worker, rx, quiet_period));
        Self { tx, handle }
    }

    /// Quiet period and save timeout from the engine config.
    pub fn from_config(
        store: Arc<dyn ProjectStore>,
        user_id: impl Into<String>,
        engine: &EngineConfig,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self::spawn(store, user_id, engine.sync_debounce(), engine.save_timeout(), sink)
    }

    async fn run(worker: SyncWorker, mut rx: mpsc::UnboundedReceiver<SyncCommand>, quiet: Duration) {
        let mut pending: Option<Box<Project>> = None;
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(SyncCommand::Changed(project)) => {
                        debug!(project.id = %project.id, "Change scheduled for sync");
                        pending = Some(project);
                        deadline = Some(Instant::now() + quiet);
                    }
                    Some(SyncCommand::Flush(reply)) => {
                        deadline = None;
                        let outcome = match pending.take() {
                            Some(project) => Some(worker.save(&project).await),
                            None => None,
                        };
                        let _ = reply.send(outcome);
                    }
                    None => {
                        if let Some(project) = pending.take() {
                            worker.save(&project).await;
                        }
                        debug!("Sync worker stopped");
                        break;
                    }
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    if let Some(project) = pending.take() {
                        worker.save(&project).await;
                    }
                }
            }
        }
    }

    /// Record a change; restarts the quiet window.
    pub fn schedule(&self, project: Project) {
        if self.tx.send(SyncCommand::Changed(Box::new(project))).is_err() {
            warn!("Sync worker gone, change not scheduled");
        }
    }

    /// Save any pending change now. `None` when nothing was pending.
    pub async fn flush(&self) -> Option<SaveOutcome> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SyncCommand::Flush(reply)).ok()?;
        rx.await.ok().flatten()
    }

    /// Save whatever is pending and stop the worker.
    pub async fn shutdown(self) {
        let DebouncedSync { tx, handle } = self;
        drop(tx);
        if let Err(e) = handle.await {
            warn!(error = %e, "Sync worker ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{ChannelSink, NoticeLevel};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileProjectStore::from_state_dir(dir.path());

        let mut project = Project::new("user/1", "First").with_id("p1");
        store.save_project("user/1", &project).await.unwrap();

        project.name = "Renamed".to_string();
        store.save_project("user/1", &project).await.unwrap();
        store
            .save_project("user/1", &Project::new("user/1", "Second").with_id("p2"))
            .await
            .unwrap();

        let loaded = store.load_projects("user/1").await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].name, "Renamed");
        assert!(dir.path().join("projects/user_1.json").exists());
        assert!(!dir.path().join("projects/user_1.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_store_missing_user_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileProjectStore::new(dir.path());
        assert!(store.load_projects("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_errors() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("u.json"), "not json").unwrap();
        let store = FileProjectStore::new(dir.path());

        let err = store.load_projects("u").await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse"));
    }

    #[tokio::test]
    async fn test_save_with_timeout_confirms() {
        let store = InMemoryProjectStore::new();
        let project = Project::new("u", "P");
        let outcome = save_with_timeout(&store, "u", &project, Duration::from_secs(1)).await;
        assert_eq!(outcome, SaveOutcome::Confirmed);
        assert_eq!(store.load_projects("u").await.unwrap(), vec![project]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_coalesces_changes() {
        let store = Arc::new(InMemoryProjectStore::new());
        let (sink, mut notices) = ChannelSink::new();
        let sync = DebouncedSync::spawn(
            store.clone(),
            "u",
            Duration::from_secs(3),
            Duration::from_secs(180),
            Arc::new(sink),
        );

        let mut project = Project::new("u", "v1").with_id("p");
        sync.schedule(project.clone());
        tokio::time::sleep(Duration::from_secs(2)).await;
        project.name = "v2".to_string();
        sync.schedule(project.clone());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(store.load_projects("u").await.unwrap().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let saved = store.load_projects("u").await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].name, "v2");

        let notice = notices.recv().await.unwrap();
        assert_eq!(notice.level, NoticeLevel::Success);
        assert!(notices.try_recv().is_err());

        sync.shutdown().await;
    }

    #[tokio::test]
    async fn test_flush_and_shutdown() {
        let store = Arc::new(InMemoryProjectStore::new());
        let (sink, _notices) = ChannelSink::new();
        let sync = DebouncedSync::spawn(
            store.clone(),
            "u",
            Duration::from_secs(3600),
            Duration::from_secs(5),
            Arc::new(sink),
        );

        assert_eq!(sync.flush().await, None);

        sync.schedule(Project::new("u", "a").with_id("a"));
        assert_eq!(sync.flush().await, Some(SaveOutcome::Confirmed));

        sync.schedule(Project::new("u", "b").with_id("b"));
        sync.shutdown().await;
        assert_eq!(store.load_projects("u").await.unwrap().len(), 2);
    }
}
