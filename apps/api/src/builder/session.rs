//! Builder sessions: one store and one preview per mounted builder.
//!
//! Every document edit goes through the session so the preview (once mounted) is
//! re-rendered for exactly the sections the edit touched. Sessions live in an explicit
//! registry owned by `AppState`; each one sits behind its own mutex, so operations on a
//! session run one at a time while different sessions proceed independently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};
use uuid::Uuid;

use crate::builder::editable::{self, CommitOutcome};
use crate::builder::preview::{labels_for, settled, Frame, Labels, Preview, Refresh, RenderMode};
use crate::builder::store::{BuilderStore, Change};
use crate::cv::path::PathError;
use crate::cv::schema::{Customization, CustomizationPatch, CvDocument};
use crate::errors::AppError;
use crate::export::raster::export_raster;
use crate::export::{ExportArtifact, Rasterizer};

/// Knobs for one raster export.
#[derive(Debug, Clone, Copy)]
pub struct RasterOptions {
    /// Render in ATS mode for the capture, whatever the current flag says.
    pub force_ats: bool,
    pub scale: f32,
    /// Upper bound on waiting for the preview to publish the frame to capture.
    pub settle_timeout: Duration,
}

pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    locale: String,
    store: BuilderStore,
    preview: Preview,
}

impl Session {
    pub fn new(locale: impl Into<String>, document: CvDocument, customization: Customization) -> Self {
        let locale = locale.into();
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            preview: Preview::new(&locale),
            store: BuilderStore::with_customization(document, customization),
            locale,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn labels(&self) -> &'static Labels {
        labels_for(&self.locale)
    }

    pub fn store(&self) -> &BuilderStore {
        &self.store
    }

    pub fn preview(&self) -> &Preview {
        &self.preview
    }

    // ── Document edits ──────────────────────────────────────────────────────

    /// Editable Field commit: applies `value` only when it differs from what is stored.
    pub fn commit_field(&mut self, path: &str, value: &str) -> Result<CommitOutcome, PathError> {
        let outcome = editable::commit(&mut self.store, path, value)?;
        if let CommitOutcome::Applied(change) = &outcome {
            self.preview.refresh(&self.store, Refresh::Document(change))?;
        }
        Ok(outcome)
    }

    pub fn update_list(&mut self, path: &str, items: Vec<String>) -> Result<Change, PathError> {
        self.edit(|store| store.update_list(path, items))
    }

    pub fn update_list_item(&mut self, path: &str, index: usize, value: String) -> Result<Change, PathError> {
        self.edit(|store| store.update_list_item(path, index, value))
    }

    pub fn add_list_item(&mut self, path: &str, value: String) -> Result<Change, PathError> {
        self.edit(|store| store.add_list_item(path, value))
    }

    pub fn add_entry(&mut self, path: &str) -> Result<Change, PathError> {
        self.edit(|store| store.add_entry(path))
    }

    pub fn remove_list_item(&mut self, path: &str, index: usize) -> Result<Change, PathError> {
        self.edit(|store| store.remove_list_item(path, index))
    }

    /// Removes the element an item path (`experience[#4]`, `skills[0]`) points at.
    pub fn remove_item(&mut self, item_path: &str) -> Result<Change, PathError> {
        self.edit(|store| store.remove_item(item_path))
    }

    pub fn reset(&mut self) -> Result<(), PathError> {
        self.store.reset_to_original();
        self.preview.refresh(&self.store, Refresh::Everything)?;
        Ok(())
    }

    fn edit<F>(&mut self, op: F) -> Result<Change, PathError>
    where
        F: FnOnce(&mut BuilderStore) -> Result<Change, PathError>,
    {
        let change = op(&mut self.store)?;
        self.preview.refresh(&self.store, Refresh::Document(&change))?;
        Ok(change)
    }

    // ── Presentation ────────────────────────────────────────────────────────

    pub fn set_editing(&mut self, editing: bool) -> Result<(), PathError> {
        self.store.set_editing(editing);
        self.preview.refresh(&self.store, Refresh::Presentation)?;
        Ok(())
    }

    pub fn set_ats_mode(&mut self, ats_mode: bool) -> Result<(), PathError> {
        self.store.set_ats_mode(ats_mode);
        self.preview.refresh(&self.store, Refresh::Presentation)?;
        Ok(())
    }

    pub fn update_customization(&mut self, patch: CustomizationPatch) -> Result<(), PathError> {
        self.store.update_customization(patch);
        self.preview.refresh(&self.store, Refresh::Presentation)?;
        Ok(())
    }

    /// Mounts the preview on first use; afterwards returns the latest frame.
    pub fn mount_preview(&mut self) -> Result<Frame, PathError> {
        match self.preview.latest() {
            Some(frame) if self.preview.is_mounted() => Ok(frame),
            _ => self.preview.mount(&self.store),
        }
    }

    // ── Raster export ───────────────────────────────────────────────────────

    /// Captures the mounted preview through `rasterizer` and assembles the raster PDF.
    ///
    /// Returns `Ok(None)` without doing anything when the preview was never mounted.
    /// When ATS is forced the previous flag is restored afterwards, on failure too.
    pub async fn export_raster_pdf(
        &mut self,
        rasterizer: &dyn Rasterizer,
        options: RasterOptions,
    ) -> Result<Option<ExportArtifact>, AppError> {
        if !self.preview.is_mounted() {
            info!("Session {}: raster export skipped, preview not mounted", self.id);
            return Ok(None);
        }

        let previous = self.store.ats_mode();
        let forced = options.force_ats && !previous;
        let mode = RenderMode::from_ats(previous || options.force_ats);

        let result = self.capture(rasterizer, &options, mode, forced).await;

        if forced {
            self.store.set_ats_mode(previous);
            self.preview.refresh(&self.store, Refresh::Presentation)?;
        }

        let artifact = result?;
        info!(
            "Session {}: exported {} ({} bytes)",
            self.id,
            artifact.file_name,
            artifact.bytes.len()
        );
        Ok(Some(artifact))
    }

    async fn capture(
        &mut self,
        rasterizer: &dyn Rasterizer,
        options: &RasterOptions,
        mode: RenderMode,
        forced: bool,
    ) -> Result<ExportArtifact, AppError> {
        let frames = self.preview.subscribe();
        // Without a toggle the frame already on the channel is the one to capture.
        let after = if forced {
            self.preview.generation()
        } else {
            self.preview.generation().saturating_sub(1)
        };

        if forced {
            self.store.set_ats_mode(true);
            self.preview.refresh(&self.store, Refresh::Presentation)?;
        }

        let frame = settled(frames, mode, after, options.settle_timeout)
            .await
            .inspect_err(|e| warn!("Session {}: {e}", self.id))?;
        let bitmap = rasterizer.rasterize(&frame.root, options.scale).await?;
        let name = self.store.current().personal_info.name.clone();
        Ok(export_raster(bitmap, &name, mode == RenderMode::Ats).await?)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Registry
// ────────────────────────────────────────────────────────────────────────────

pub type SharedSession = Arc<Mutex<Session>>;

struct Entry {
    session: SharedSession,
    last_used: Instant,
}

/// All mounted builders, keyed by session id.
///
/// A session not looked up for `idle_ttl` is evicted, either by the periodic sweep or
/// by the next `create` that needs room.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Entry>>>,
    max_sessions: usize,
    idle_ttl: Duration,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize, idle_ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_sessions,
            idle_ttl,
        }
    }

    /// Registers `session`. Fails with `Conflict` once `max_sessions` live sessions are mounted.
    pub async fn create(&self, session: Session) -> Result<SharedSession, AppError> {
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            self.evict_locked(&mut sessions, Instant::now());
        }
        if sessions.len() >= self.max_sessions {
            warn!("Session limit of {} reached", self.max_sessions);
            return Err(AppError::Conflict(format!(
                "session limit of {} reached",
                self.max_sessions
            )));
        }
        let id = session.id();
        info!("Mounted builder session {id} (locale {})", session.locale());
        let shared = Arc::new(Mutex::new(session));
        sessions.insert(
            id,
            Entry {
                session: shared.clone(),
                last_used: Instant::now(),
            },
        );
        Ok(shared)
    }

    /// Looks up a session and marks it as used.
    pub async fn get(&self, id: Uuid) -> Result<SharedSession, AppError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))?;
        entry.last_used = Instant::now();
        Ok(entry.session.clone())
    }

    pub async fn remove(&self, id: Uuid) -> Result<(), AppError> {
        match self.sessions.write().await.remove(&id) {
            Some(_) => {
                info!("Unmounted builder session {id}");
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Session {id} not found"))),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops every session idle for longer than the TTL. Returns how many were dropped.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        self.evict_locked(&mut sessions, Instant::now())
    }

    /// Runs `evict_idle` every `period` until the runtime shuts down.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                registry.evict_idle().await;
            }
        })
    }

    fn evict_locked(&self, sessions: &mut HashMap<Uuid, Entry>, now: Instant) -> usize {
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let idle = now.saturating_duration_since(entry.last_used);
            let keep = idle < self.idle_ttl;
            if !keep {
                info!("Evicted builder session {id} after {}s idle", idle.as_secs());
            }
            keep
        });
        before - sessions.len()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use image::RgbImage;

    use super::*;
    use crate::builder::dom::Element;
    use crate::cv::mutator::FieldValue;
    use crate::cv::schema::sample_document;
    use crate::export::ExportError;

    /// Records the mode of every root it is asked to capture.
    #[derive(Default)]
    struct ModeRecorder {
        seen: StdMutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Rasterizer for ModeRecorder {
        async fn rasterize(&self, root: &Element, _scale: f32) -> Result<RgbImage, ExportError> {
            let mode = root.get_attr("data-mode").unwrap_or_default().to_string();
            self.seen.lock().unwrap().push(mode);
            if self.fail {
                return Err(ExportError::MissingCapture("ats"));
            }
            Ok(RgbImage::from_pixel(20, 30, image::Rgb([255, 255, 255])))
        }
    }

    const IDLE_TTL: Duration = Duration::from_secs(600);

    fn make_session() -> Session {
        Session::new("en", sample_document(), Customization::default())
    }

    fn make_options(force_ats: bool) -> RasterOptions {
        RasterOptions {
            force_ats,
            scale: 2.0,
            settle_timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn test_edits_before_mount_do_not_publish() {
        let mut session = make_session();
        session.update_list("experience[0].achievements", vec!["Only".into()]).unwrap();
        assert!(!session.preview().is_mounted());
        assert!(session.preview().latest().is_none());
    }

    #[test]
    fn test_edits_after_mount_publish_new_frames() {
        let mut session = make_session();
        let first = session.mount_preview().unwrap();
        assert_eq!(first.generation, 1);

        session.commit_field("personalInfo.name", "Ada King").unwrap();
        let frame = session.preview().latest().unwrap();
        assert_eq!(frame.generation, 2);
        assert!(frame.root.text_content().contains("Ada King"));
    }

    #[test]
    fn test_unchanged_commit_publishes_nothing() {
        let mut session = make_session();
        session.mount_preview().unwrap();
        let outcome = session.commit_field("personalInfo.name", "Ada Lovelace").unwrap();
        assert!(matches!(outcome, CommitOutcome::Unchanged));
        assert_eq!(session.preview().generation(), 1);
    }

    #[test]
    fn test_mount_twice_reuses_the_frame() {
        let mut session = make_session();
        session.mount_preview().unwrap();
        let again = session.mount_preview().unwrap();
        assert_eq!(again.generation, 1);
    }

    #[test]
    fn test_failed_edit_leaves_preview_alone() {
        let mut session = make_session();
        session.mount_preview().unwrap();
        assert!(session.remove_list_item("experience[0].achievements", 9).is_err());
        assert_eq!(session.preview().generation(), 1);
        assert_eq!(session.store().revision(), 0);
    }

    #[test]
    fn test_reset_restores_content_and_rerenders() {
        let mut session = make_session();
        session.mount_preview().unwrap();
        session.add_entry("projects").unwrap();
        session.reset().unwrap();
        assert_eq!(**session.store().current(), sample_document());
        assert_eq!(session.preview().generation(), 3);
    }

    #[test]
    fn test_remove_item_by_stable_id() {
        let mut session = make_session();
        let ids = session.store().item_ids("experience").unwrap();
        session.remove_item(&format!("experience[{}]", ids[0])).unwrap();
        assert_eq!(
            session.store().value_at("experience[0].title").unwrap(),
            FieldValue::Text("Intern".to_string())
        );
    }

    #[tokio::test]
    async fn test_raster_export_without_mount_is_a_no_op() {
        let mut session = make_session();
        let recorder = ModeRecorder::default();
        let result = session.export_raster_pdf(&recorder, make_options(true)).await.unwrap();
        assert!(result.is_none());
        assert!(recorder.seen.lock().unwrap().is_empty());
        assert!(!session.store().ats_mode());
    }

    #[tokio::test]
    async fn test_forced_ats_export_captures_ats_and_restores() {
        let mut session = make_session();
        session.mount_preview().unwrap();
        let recorder = ModeRecorder::default();

        let artifact = session
            .export_raster_pdf(&recorder, make_options(true))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(artifact.file_name, "Ada_Lovelace_ATS_CV.pdf");
        assert_eq!(*recorder.seen.lock().unwrap(), vec!["ats".to_string()]);
        assert!(!session.store().ats_mode());
        assert_eq!(session.preview().latest().unwrap().mode, RenderMode::Standard);
    }

    #[tokio::test]
    async fn test_standard_export_captures_current_mode() {
        let mut session = make_session();
        session.mount_preview().unwrap();
        let recorder = ModeRecorder::default();

        let artifact = session
            .export_raster_pdf(&recorder, make_options(false))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(artifact.file_name, "Ada_Lovelace_CV.pdf");
        assert_eq!(*recorder.seen.lock().unwrap(), vec!["standard".to_string()]);
        assert_eq!(session.preview().generation(), 1);
    }

    #[tokio::test]
    async fn test_already_ats_export_keeps_flag() {
        let mut session = make_session();
        session.set_ats_mode(true).unwrap();
        session.mount_preview().unwrap();
        let recorder = ModeRecorder::default();

        session.export_raster_pdf(&recorder, make_options(true)).await.unwrap();
        assert!(session.store().ats_mode());
        assert_eq!(*recorder.seen.lock().unwrap(), vec!["ats".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_export_still_restores_flag() {
        let mut session = make_session();
        session.mount_preview().unwrap();
        let recorder = ModeRecorder {
            fail: true,
            ..Default::default()
        };

        let err = session.export_raster_pdf(&recorder, make_options(true)).await.unwrap_err();
        assert!(matches!(err, AppError::Export(ExportError::MissingCapture(_))));
        assert!(!session.store().ats_mode());
        assert_eq!(session.preview().latest().unwrap().mode, RenderMode::Standard);
    }

    #[tokio::test]
    async fn test_registry_enforces_limit() {
        let registry = SessionRegistry::new(1, IDLE_TTL);
        let first = registry.create(make_session()).await.unwrap();
        let id = first.lock().await.id();

        let err = registry.create(make_session()).await.err().unwrap();
        assert!(matches!(err, AppError::Conflict(_)));

        registry.remove(id).await.unwrap();
        assert_eq!(registry.len().await, 0);
        assert!(registry.create(make_session()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_evicts_idle_sessions_when_full() {
        let registry = SessionRegistry::new(2, IDLE_TTL);
        let stale = registry.create(make_session()).await.unwrap();
        let stale_id = stale.lock().await.id();
        tokio::time::advance(Duration::from_secs(300)).await;
        let fresh = registry.create(make_session()).await.unwrap();
        let fresh_id = fresh.lock().await.id();

        // Full, and nothing idle long enough yet.
        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(matches!(
            registry.create(make_session()).await.err(),
            Some(AppError::Conflict(_))
        ));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(registry.create(make_session()).await.is_ok());
        assert!(matches!(registry.get(stale_id).await.err(), Some(AppError::NotFound(_))));
        assert!(registry.get(fresh_id).await.is_ok());
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_keeps_session_alive() {
        let registry = SessionRegistry::new(4, IDLE_TTL);
        let session = registry.create(make_session()).await.unwrap();
        let id = session.lock().await.id();

        tokio::time::advance(Duration::from_secs(500)).await;
        registry.get(id).await.unwrap();
        tokio::time::advance(Duration::from_secs(500)).await;
        assert_eq!(registry.evict_idle().await, 0);

        tokio::time::advance(Duration::from_secs(101)).await;
        assert_eq!(registry.evict_idle().await, 1);
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_without_new_sessions() {
        let registry = SessionRegistry::new(4, IDLE_TTL);
        registry.create(make_session()).await.unwrap();
        let sweeper = registry.spawn_sweeper(Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(700)).await;
        assert_eq!(registry.len().await, 0);
        sweeper.abort();
    }

    #[tokio::test]
    async fn test_registry_unknown_session() {
        let registry = SessionRegistry::new(4, IDLE_TTL);
        let id = Uuid::new_v4();
        assert!(matches!(registry.get(id).await.err(), Some(AppError::NotFound(_))));
        assert!(matches!(registry.remove(id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let registry = SessionRegistry::new(4, IDLE_TTL);
        let a = registry.create(make_session()).await.unwrap();
        let b = registry.create(make_session()).await.unwrap();

        a.lock().await.commit_field("summary", "Changed").unwrap();
        let b = b.lock().await;
        assert_eq!(
            b.store().value_at("summary").unwrap(),
            FieldValue::Text("Engineer who enjoys analytical engines.".to_string())
        );
    }
}
