//! Gateway behaviour against a backend that can be made to fail or stall

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex, Notify};

use cascade_node::demo;
use cascade_node::gateway::{
    Backend, BackendError, BackendKind, Gateway, GatewayError, InMemoryBackend, Loaded,
    PlanFields, SnapshotSource,
};
use cascade_node::model::{
    Dataset, Gender, IndicatorDraft, NewStaff, PlanDraft, PlanId, Role, StaffId, StaffMember,
};

/// In-memory data behind a switchable failure mode
struct FlakyBackend {
    inner: InMemoryBackend,
    fail_loads: AtomicBool,
    fail_writes: AtomicBool,
    loads: AtomicUsize,
    /// Next load waits on this after signalling `entered`
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    entered: Notify,
}

impl FlakyBackend {
    fn new(seed: Dataset) -> Self {
        Self {
            inner: InMemoryBackend::new(seed),
            fail_loads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            loads: AtomicUsize::new(0),
            gate: Mutex::new(None),
            entered: Notify::new(),
        }
    }

    fn write_guard(&self) -> Result<(), BackendError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BackendError::Status {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Backend for FlakyBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn load_all(&self) -> Result<Loaded, BackendError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(BackendError::Network("connection refused".to_string()));
        }
        let gate = self.gate.lock().await.take();
        if let Some(rx) = gate {
            self.entered.notify_one();
            let _ = rx.await;
        }
        self.inner.load_all().await
    }

    async fn insert_staff(&self, staff: &[NewStaff]) -> Result<Vec<StaffId>, BackendError> {
        self.write_guard()?;
        self.inner.insert_staff(staff).await
    }

    async fn update_staff(&self, member: &StaffMember) -> Result<(), BackendError> {
        self.write_guard()?;
        self.inner.update_staff(member).await
    }

    async fn delete_staff(&self, id: &str) -> Result<(), BackendError> {
        self.write_guard()?;
        self.inner.delete_staff(id).await
    }

    async fn insert_plan(&self, fields: &PlanFields) -> Result<PlanId, BackendError> {
        self.write_guard()?;
        self.inner.insert_plan(fields).await
    }

    async fn update_plan(&self, id: &str, fields: &PlanFields) -> Result<(), BackendError> {
        self.write_guard()?;
        self.inner.update_plan(id, fields).await
    }

    async fn replace_indicators(
        &self,
        plan_id: &str,
        indicators: &[IndicatorDraft],
    ) -> Result<(), BackendError> {
        self.write_guard()?;
        self.inner.replace_indicators(plan_id, indicators).await
    }

    async fn delete_plans(&self, ids: &[PlanId]) -> Result<(), BackendError> {
        self.write_guard()?;
        self.inner.delete_plans(ids).await
    }
}

fn new_staff(key: &str, superior: Option<&str>) -> NewStaff {
    NewStaff {
        business_key: key.to_string(),
        name: format!("Staff {}", key),
        position: "Analis".to_string(),
        role: Role::Pelaksana,
        gender: Gender::Female,
        superior_id: superior.map(str::to_string),
        is_part_time: false,
    }
}

#[tokio::test]
async fn test_failed_first_load_falls_back_to_demo() {
    let backend = Arc::new(FlakyBackend::new(Dataset::default()));
    backend.fail_loads.store(true, Ordering::SeqCst);

    let gateway = Gateway::connect(backend.clone()).await;
    let snap = gateway.snapshot().await;

    assert_eq!(snap.source, SnapshotSource::DemoFallback);
    assert_eq!(snap.org.len(), demo::staff().len());
    assert!(gateway.fallback_notice().is_some());
    assert!(snap.warnings[0].contains("demo data"));
    // Writes now go to the local demo store, not the broken backend
    assert_eq!(gateway.backend_kind(), BackendKind::InMemory);

    gateway.create_staff(new_staff("777", Some("5"))).await.unwrap();
    let snap = gateway.snapshot().await;
    assert!(snap.org.find_by_business_key("777").is_some());
    assert_eq!(snap.source, SnapshotSource::DemoFallback);
}

#[tokio::test]
async fn test_strict_constructor_surfaces_load_failure() {
    let backend = Arc::new(FlakyBackend::new(Dataset::default()));
    backend.fail_loads.store(true, Ordering::SeqCst);

    let result = Gateway::new(backend).await;
    assert!(matches!(
        result,
        Err(GatewayError::Backend(BackendError::Network(_)))
    ));
}

#[tokio::test]
async fn test_failed_write_still_reloads_once() {
    let backend = Arc::new(FlakyBackend::new(demo::dataset()));
    let gateway = Gateway::new(backend.clone()).await.unwrap();
    assert_eq!(gateway.snapshot().await.source, SnapshotSource::Remote);
    let loads_before = backend.loads.load(Ordering::SeqCst);

    backend.fail_writes.store(true, Ordering::SeqCst);
    let err = gateway
        .create_staff(new_staff("888", Some("5")))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GatewayError::Backend(BackendError::Status { status: 500, .. })
    ));
    assert_eq!(backend.loads.load(Ordering::SeqCst), loads_before + 1);
    let snap = gateway.snapshot().await;
    assert_eq!(snap.generation, 2);
    assert!(snap.org.find_by_business_key("888").is_none());
}

#[tokio::test]
async fn test_failed_reload_keeps_current_snapshot() {
    let backend = Arc::new(FlakyBackend::new(demo::dataset()));
    let gateway = Gateway::new(backend.clone()).await.unwrap();

    backend.fail_loads.store(true, Ordering::SeqCst);
    assert!(gateway.reload().await.is_err());

    let snap = gateway.snapshot().await;
    assert_eq!(snap.generation, 1);
    assert_eq!(snap.goals.len(), 1);
}

#[tokio::test]
async fn test_write_succeeds_even_if_reload_fails() {
    let backend = Arc::new(FlakyBackend::new(demo::dataset()));
    let gateway = Gateway::new(backend.clone()).await.unwrap();

    backend.fail_loads.store(true, Ordering::SeqCst);
    let id = gateway
        .create_staff(new_staff("999", Some("5")))
        .await
        .unwrap();
    assert!(!gateway.snapshot().await.org.contains(&id));

    backend.fail_loads.store(false, Ordering::SeqCst);
    let snap = gateway.reload().await.unwrap();
    assert!(snap.org.contains(&id));
}

#[tokio::test]
async fn test_backend_conflict_is_duplicate_business_key() {
    let backend = Arc::new(FlakyBackend::new(demo::dataset()));
    let gateway = Gateway::new(backend.clone()).await.unwrap();

    // Another session took the key after our snapshot was loaded
    backend
        .inner
        .insert_staff(&[new_staff("555", None)])
        .await
        .unwrap();

    let err = gateway
        .create_staff(new_staff("555", Some("5")))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::DuplicateBusinessKey(_)));
    // The reconciling reload picked up the other session's record
    assert!(gateway.snapshot().await.org.find_by_business_key("555").is_some());
}

#[tokio::test]
async fn test_stale_reload_is_discarded() {
    let backend = Arc::new(FlakyBackend::new(demo::dataset()));
    let gateway = Arc::new(Gateway::new(backend.clone()).await.unwrap());

    let (release, gate) = oneshot::channel();
    *backend.gate.lock().await = Some(gate);

    let slow = {
        let gateway = gateway.clone();
        tokio::spawn(async move { gateway.reload().await })
    };
    backend.entered.notified().await;

    let fast = gateway.reload().await.unwrap();
    assert_eq!(fast.generation, 3);

    release.send(()).unwrap();
    let slow = slow.await.unwrap().unwrap();
    assert_eq!(slow.generation, 3);
    assert_eq!(gateway.snapshot().await.generation, 3);
}

#[tokio::test]
async fn test_reload_after_write_keeps_unrelated_records() {
    let backend = Arc::new(FlakyBackend::new(demo::dataset()));
    let gateway = Gateway::new(backend).await.unwrap();
    let before = gateway.snapshot().await;

    let draft = PlanDraft {
        title: "Intervensi".to_string(),
        ..Default::default()
    };
    gateway
        .upsert_plan(draft, "2", Some("rhk-1"))
        .await
        .unwrap();

    let after = gateway.snapshot().await;
    assert_eq!(after.org.members(), before.org.members());
    assert_eq!(after.goals.get("rhk-1"), before.goals.get("rhk-1"));
    assert_eq!(after.goals.len(), 2);
}
