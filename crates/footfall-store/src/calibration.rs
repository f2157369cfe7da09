//! Per-camera calibration with draft/commit separation.
//!
//! Running engines only ever see committed snapshots, published through a
//! `watch` channel as `Arc<CalibrationSnapshot>`. Edits accumulate in a
//! private draft that may hold incomplete polygons; `commit` validates the
//! draft and swaps it in as one new snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};

use footfall_models::{CalibrationLine, CalibrationSnapshot, CameraId, Point, Zone, ZoneId};

use crate::error::{StoreError, StoreResult};
use crate::sink::CalibrationSink;

/// An in-progress calibration edit.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CalibrationDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<CalibrationLine>,
    pub zones: Vec<Zone>,
    /// Committed version the draft was started from
    pub base_version: u64,
}

impl CalibrationDraft {
    fn from_snapshot(snapshot: &CalibrationSnapshot) -> Self {
        Self {
            line: snapshot.line,
            zones: snapshot.zones.clone(),
            base_version: snapshot.version,
        }
    }

    fn zone_mut(&mut self, zone_id: &ZoneId) -> StoreResult<&mut Zone> {
        self.zones
            .iter_mut()
            .find(|z| &z.id == zone_id)
            .ok_or_else(|| StoreError::ZoneNotFound(zone_id.to_string()))
    }
}

struct CameraCalibration {
    committed: watch::Sender<Arc<CalibrationSnapshot>>,
    draft: Option<CalibrationDraft>,
}

impl CameraCalibration {
    fn new(snapshot: CalibrationSnapshot) -> Self {
        let (committed, _) = watch::channel(Arc::new(snapshot));
        Self {
            committed,
            draft: None,
        }
    }
}

/// Calibration for every known camera.
pub struct CalibrationStore {
    cameras: RwLock<HashMap<CameraId, CameraCalibration>>,
    sink: Option<Arc<dyn CalibrationSink>>,
}

impl Default for CalibrationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationStore {
    pub fn new() -> Self {
        Self {
            cameras: RwLock::new(HashMap::new()),
            sink: None,
        }
    }

    /// Persist every commit through `sink`.
    pub fn with_sink(sink: Arc<dyn CalibrationSink>) -> Self {
        Self {
            cameras: RwLock::new(HashMap::new()),
            sink: Some(sink),
        }
    }

    /// Current committed snapshot; empty for unknown cameras.
    pub async fn get(&self, camera_id: &CameraId) -> Arc<CalibrationSnapshot> {
        self.cameras
            .read()
            .await
            .get(camera_id)
            .map(|c| c.committed.borrow().clone())
            .unwrap_or_default()
    }

    /// Watch committed snapshots for a camera, registering it if unknown.
    ///
    /// Registration happens here and in `load`; writes and drafts for
    /// cameras that were never registered (or were removed) are refused.
    pub async fn subscribe(&self, camera_id: &CameraId) -> watch::Receiver<Arc<CalibrationSnapshot>> {
        let mut cameras = self.cameras.write().await;
        cameras
            .entry(camera_id.clone())
            .or_insert_with(|| CameraCalibration::new(CalibrationSnapshot::default()))
            .committed
            .subscribe()
    }

    /// Seed a camera with an already-persisted calibration.
    ///
    /// Not forwarded to the sink.
    pub async fn load(
        &self,
        camera_id: &CameraId,
        snapshot: CalibrationSnapshot,
    ) -> StoreResult<Arc<CalibrationSnapshot>> {
        snapshot.validate()?;
        let snapshot = Arc::new(snapshot);

        let mut cameras = self.cameras.write().await;
        let entry = cameras
            .entry(camera_id.clone())
            .or_insert_with(|| CameraCalibration::new(CalibrationSnapshot::default()));
        entry.committed.send_replace(snapshot.clone());
        Ok(snapshot)
    }

    /// Replace the crossing line, keeping the committed zones.
    pub async fn set_line(
        &self,
        camera_id: &CameraId,
        line: Option<CalibrationLine>,
    ) -> StoreResult<Arc<CalibrationSnapshot>> {
        if let Some(line) = &line {
            line.validate()?;
        }
        self.write_committed(camera_id, |current| CalibrationSnapshot {
            line,
            zones: current.zones.clone(),
            ..Default::default()
        })
        .await
    }

    /// Replace the whole zone set.
    ///
    /// Rejected with `InvalidPolygon` if any zone has fewer than three
    /// points; nothing is changed in that case.
    pub async fn set_zones(
        &self,
        camera_id: &CameraId,
        zones: Vec<Zone>,
    ) -> StoreResult<Arc<CalibrationSnapshot>> {
        for zone in &zones {
            zone.validate()?;
        }
        self.write_committed(camera_id, |current| CalibrationSnapshot {
            line: current.line,
            zones,
            ..Default::default()
        })
        .await
    }

    /// Start (or restart) a draft from the committed snapshot.
    pub async fn begin_draft(&self, camera_id: &CameraId) -> StoreResult<CalibrationDraft> {
        let mut cameras = self.cameras.write().await;
        let entry = cameras
            .get_mut(camera_id)
            .ok_or_else(|| StoreError::UnknownCamera(camera_id.to_string()))?;
        let draft = CalibrationDraft::from_snapshot(&entry.committed.borrow());
        entry.draft = Some(draft.clone());
        Ok(draft)
    }

    pub async fn draft(&self, camera_id: &CameraId) -> Option<CalibrationDraft> {
        self.cameras
            .read()
            .await
            .get(camera_id)
            .and_then(|c| c.draft.clone())
    }

    /// Apply an edit to the open draft. Drafts may hold incomplete zones.
    pub async fn edit_draft<F>(&self, camera_id: &CameraId, edit: F) -> StoreResult<CalibrationDraft>
    where
        F: FnOnce(&mut CalibrationDraft) -> StoreResult<()>,
    {
        let mut cameras = self.cameras.write().await;
        let draft = cameras
            .get_mut(camera_id)
            .and_then(|c| c.draft.as_mut())
            .ok_or_else(|| StoreError::NoDraft(camera_id.to_string()))?;
        edit(draft)?;
        Ok(draft.clone())
    }

    pub async fn draft_set_line(
        &self,
        camera_id: &CameraId,
        line: Option<CalibrationLine>,
    ) -> StoreResult<CalibrationDraft> {
        self.edit_draft(camera_id, |draft| {
            draft.line = line;
            Ok(())
        })
        .await
    }

    /// Add or replace a zone in the draft.
    pub async fn draft_upsert_zone(&self, camera_id: &CameraId, zone: Zone) -> StoreResult<CalibrationDraft> {
        self.edit_draft(camera_id, |draft| {
            match draft.zones.iter_mut().find(|z| z.id == zone.id) {
                Some(existing) => *existing = zone,
                None => draft.zones.push(zone),
            }
            Ok(())
        })
        .await
    }

    /// Append a vertex to a draft zone.
    pub async fn draft_add_point(
        &self,
        camera_id: &CameraId,
        zone_id: &ZoneId,
        point: Point,
    ) -> StoreResult<CalibrationDraft> {
        self.edit_draft(camera_id, |draft| {
            draft.zone_mut(zone_id)?.points.push(point);
            Ok(())
        })
        .await
    }

    pub async fn draft_remove_zone(&self, camera_id: &CameraId, zone_id: &ZoneId) -> StoreResult<CalibrationDraft> {
        self.edit_draft(camera_id, |draft| {
            let before = draft.zones.len();
            draft.zones.retain(|z| &z.id != zone_id);
            if draft.zones.len() == before {
                return Err(StoreError::ZoneNotFound(zone_id.to_string()));
            }
            Ok(())
        })
        .await
    }

    /// Drop the draft without touching the committed snapshot.
    pub async fn discard_draft(&self, camera_id: &CameraId) -> bool {
        self.cameras
            .write()
            .await
            .get_mut(camera_id)
            .and_then(|c| c.draft.take())
            .is_some()
    }

    /// Validate the draft and publish it as the new committed snapshot.
    ///
    /// On validation failure the draft is kept so the operator can fix it.
    pub async fn commit(&self, camera_id: &CameraId) -> StoreResult<Arc<CalibrationSnapshot>> {
        let snapshot = {
            let mut cameras = self.cameras.write().await;
            let entry = cameras
                .get_mut(camera_id)
                .ok_or_else(|| StoreError::NoDraft(camera_id.to_string()))?;
            let draft = entry
                .draft
                .as_ref()
                .ok_or_else(|| StoreError::NoDraft(camera_id.to_string()))?;

            let candidate = CalibrationSnapshot {
                line: draft.line,
                zones: draft.zones.clone(),
                version: entry.committed.borrow().version + 1,
                committed_at: Some(Utc::now()),
            };
            candidate.validate()?;

            if draft.base_version != entry.committed.borrow().version {
                warn!(
                    camera_id = %camera_id,
                    base_version = draft.base_version,
                    "Committing draft over a newer calibration"
                );
            }

            let snapshot = Arc::new(candidate);
            entry.committed.send_replace(snapshot.clone());
            entry.draft = None;
            snapshot
        };

        info!(
            camera_id = %camera_id,
            version = snapshot.version,
            zones = snapshot.zones.len(),
            calibrated = snapshot.is_calibrated(),
            "Committed calibration"
        );

        self.persist(camera_id, &snapshot).await;
        Ok(snapshot)
    }

    /// Forget a camera; subscribers see the channel close.
    pub async fn remove(&self, camera_id: &CameraId) -> bool {
        self.cameras.write().await.remove(camera_id).is_some()
    }

    async fn write_committed<F>(&self, camera_id: &CameraId, build: F) -> StoreResult<Arc<CalibrationSnapshot>>
    where
        F: FnOnce(&CalibrationSnapshot) -> CalibrationSnapshot,
    {
        let snapshot = {
            let mut cameras = self.cameras.write().await;
            let entry = cameras
                .get_mut(camera_id)
                .ok_or_else(|| StoreError::UnknownCamera(camera_id.to_string()))?;

            let current = entry.committed.borrow().clone();
            let mut next = build(current.as_ref());
            next.version = current.version + 1;
            next.committed_at = Some(Utc::now());

            let snapshot = Arc::new(next);
            entry.committed.send_replace(snapshot.clone());
            snapshot
        };

        self.persist(camera_id, &snapshot).await;
        Ok(snapshot)
    }

    /// The local commit stands even if persistence fails.
    async fn persist(&self, camera_id: &CameraId, snapshot: &CalibrationSnapshot) {
        let Some(sink) = &self.sink else {
            return;
        };
        if let Err(e) = sink.save_calibration(camera_id, snapshot).await {
            warn!(
                camera_id = %camera_id,
                version = snapshot.version,
                "Failed to persist calibration: {}",
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use footfall_models::{EntryDirection, ZoneType};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        saved: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl CalibrationSink for RecordingSink {
        async fn save_calibration(&self, _camera_id: &CameraId, snapshot: &CalibrationSnapshot) -> StoreResult<()> {
            self.saved.lock().unwrap().push(snapshot.version);
            Ok(())
        }
    }

    fn cam() -> CameraId {
        CameraId::from("cam-1")
    }

    async fn registered(store: CalibrationStore) -> CalibrationStore {
        let _ = store.subscribe(&cam()).await;
        store
    }

    fn line() -> CalibrationLine {
        CalibrationLine::new(Point::new(0.0, 360.0), Point::new(1280.0, 360.0), EntryDirection::UpToDown)
    }

    fn square(name: &str) -> Zone {
        Zone::new(
            name,
            ZoneType::Shelf,
            vec![
                Point::new(100.0, 100.0),
                Point::new(200.0, 100.0),
                Point::new(200.0, 200.0),
                Point::new(100.0, 200.0),
            ],
        )
    }

    #[tokio::test]
    async fn test_unknown_camera_is_empty() {
        let store = CalibrationStore::new();
        let snapshot = store.get(&cam()).await;
        assert!(!snapshot.is_calibrated());
        assert!(snapshot.zones.is_empty());
    }

    #[tokio::test]
    async fn test_set_line_and_zones() {
        let store = registered(CalibrationStore::new()).await;
        store.set_line(&cam(), Some(line())).await.unwrap();
        let snapshot = store.set_zones(&cam(), vec![square("A")]).await.unwrap();

        assert_eq!(snapshot.version, 2);
        assert_eq!(snapshot.line, Some(line()));
        assert_eq!(snapshot.zones.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_zone_set_rejected_atomically() {
        let store = registered(CalibrationStore::new()).await;
        store.set_zones(&cam(), vec![square("A")]).await.unwrap();

        let mut two_points = square("B");
        two_points.points.truncate(2);
        let err = store
            .set_zones(&cam(), vec![square("C"), two_points])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidPolygon { points: 2, .. }));

        let snapshot = store.get(&cam()).await;
        assert_eq!(snapshot.zones.len(), 1);
        assert_eq!(snapshot.zones[0].name, "A");
    }

    #[tokio::test]
    async fn test_draft_invisible_until_commit() {
        let sink = Arc::new(RecordingSink::default());
        let store = CalibrationStore::with_sink(sink.clone());
        let mut rx = store.subscribe(&cam()).await;

        store.begin_draft(&cam()).await.unwrap();
        let zone = Zone::new("Queue", ZoneType::Queue, vec![Point::new(0.0, 0.0)]);
        let zone_id = zone.id.clone();
        store.draft_upsert_zone(&cam(), zone).await.unwrap();
        store.draft_add_point(&cam(), &zone_id, Point::new(50.0, 0.0)).await.unwrap();

        // Two-point draft cannot be committed and is not visible
        assert!(matches!(store.commit(&cam()).await, Err(StoreError::InvalidPolygon { .. })));
        assert!(rx.borrow_and_update().zones.is_empty());
        assert!(store.draft(&cam()).await.is_some());

        store.draft_add_point(&cam(), &zone_id, Point::new(50.0, 50.0)).await.unwrap();
        store.draft_set_line(&cam(), Some(line())).await.unwrap();
        let snapshot = store.commit(&cam()).await.unwrap();

        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen.version, 1);
        assert_eq!(seen.zones[0].points.len(), 3);
        assert!(Arc::ptr_eq(&seen, &snapshot));
        assert!(store.draft(&cam()).await.is_none());
        assert_eq!(*sink.saved.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_edit_without_draft() {
        let store = CalibrationStore::new();
        let err = store.draft_set_line(&cam(), None).await.unwrap_err();
        assert!(matches!(err, StoreError::NoDraft(_)));
        assert!(matches!(store.commit(&cam()).await, Err(StoreError::NoDraft(_))));
    }

    #[tokio::test]
    async fn test_discard_draft_keeps_committed() {
        let store = registered(CalibrationStore::new()).await;
        store.set_line(&cam(), Some(line())).await.unwrap();
        store.begin_draft(&cam()).await.unwrap();
        store.draft_set_line(&cam(), None).await.unwrap();

        assert!(store.discard_draft(&cam()).await);
        assert!(store.get(&cam()).await.is_calibrated());
    }

    #[tokio::test]
    async fn test_remove_zone_from_draft() {
        let store = registered(CalibrationStore::new()).await;
        let zone = square("A");
        let id = zone.id.clone();
        store.set_zones(&cam(), vec![zone]).await.unwrap();

        store.begin_draft(&cam()).await.unwrap();
        let draft = store.draft_remove_zone(&cam(), &id).await.unwrap();
        assert!(draft.zones.is_empty());
        assert!(matches!(
            store.draft_remove_zone(&cam(), &id).await,
            Err(StoreError::ZoneNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_writes_refused_for_unregistered_camera() {
        let store = CalibrationStore::new();
        assert!(matches!(
            store.set_line(&cam(), Some(line())).await,
            Err(StoreError::UnknownCamera(_))
        ));
        assert!(matches!(
            store.set_zones(&cam(), vec![square("A")]).await,
            Err(StoreError::UnknownCamera(_))
        ));
        assert!(matches!(store.begin_draft(&cam()).await, Err(StoreError::UnknownCamera(_))));
        assert!(store.cameras.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_removed_camera_is_not_recreated_by_writes() {
        let store = registered(CalibrationStore::new()).await;
        store.set_line(&cam(), Some(line())).await.unwrap();
        assert!(store.remove(&cam()).await);

        let err = store.set_line(&cam(), Some(line())).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownCamera(_)));
        assert!(!store.cameras.read().await.contains_key(&cam()));
        assert!(!store.get(&cam()).await.is_calibrated());
    }
}
