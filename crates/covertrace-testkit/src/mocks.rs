//! Instrumented test doubles.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use covertrace_core::{
    AuthorizationStatus, ExposureConfiguration, ExposureDetectionSummary,
    ExposureDetectionSummaryData, ExposureInfo, TemporaryExposureKey,
};
use covertrace_detect::{DetectError, ExposureNotificationProvider, Result};
use covertrace_store::ChunkLocation;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Records whether two critical sections ever overlapped.
///
/// Unlike a real lock it never blocks: a second `enter` while a guard is
/// alive is counted as an overlap.
#[derive(Debug, Default)]
pub struct AssertingLock {
    busy: AtomicBool,
    entries: AtomicUsize,
    overlaps: AtomicUsize,
}

impl AssertingLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> AssertingGuard<'_> {
        self.entries.fetch_add(1, Ordering::SeqCst);
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        AssertingGuard { lock: self }
    }

    pub fn entries(&self) -> usize {
        self.entries.load(Ordering::SeqCst)
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }
}

/// Leaves the critical section when dropped.
#[derive(Debug)]
pub struct AssertingGuard<'a> {
    lock: &'a AssertingLock,
}

impl Drop for AssertingGuard<'_> {
    fn drop(&mut self) {
        self.lock.busy.store(false, Ordering::SeqCst);
    }
}

/// A scriptable matching capability.
///
/// Every call enters an [`AssertingLock`], optionally sleeps, and is
/// recorded by name.
#[derive(Debug)]
pub struct MockExposureProvider {
    lock: AssertingLock,
    call_delay: Duration,
    status: Mutex<AuthorizationStatus>,
    summary: Mutex<Option<ExposureDetectionSummary>>,
    exposure_info: Mutex<Option<Vec<ExposureInfo>>>,
    diagnosis_keys: Mutex<Vec<TemporaryExposureKey>>,
    calls: Mutex<Vec<&'static str>>,
    detected: Mutex<Vec<Vec<ChunkLocation>>>,
}

impl MockExposureProvider {
    /// Provider reporting `status`, finding no matches.
    pub fn new(status: AuthorizationStatus) -> Self {
        Self {
            lock: AssertingLock::new(),
            call_delay: Duration::ZERO,
            status: Mutex::new(status),
            summary: Mutex::new(Some(ExposureDetectionSummary::NoMatch)),
            exposure_info: Mutex::new(Some(Vec::new())),
            diagnosis_keys: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            detected: Mutex::new(Vec::new()),
        }
    }

    pub fn authorized() -> Self {
        Self::new(AuthorizationStatus::Authorized)
    }

    /// Sleep this long inside every call.
    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    pub fn with_summary(self, summary: ExposureDetectionSummary) -> Self {
        *locked(&self.summary) = Some(summary);
        self
    }

    /// Make `detect_exposures` fail.
    pub fn failing_detection(self) -> Self {
        *locked(&self.summary) = None;
        self
    }

    pub fn with_exposure_info(self, infos: Vec<ExposureInfo>) -> Self {
        *locked(&self.exposure_info) = Some(infos);
        self
    }

    /// Make `get_exposure_info` fail.
    pub fn failing_exposure_info(self) -> Self {
        *locked(&self.exposure_info) = None;
        self
    }

    pub fn with_diagnosis_keys(self, keys: Vec<TemporaryExposureKey>) -> Self {
        *locked(&self.diagnosis_keys) = keys;
        self
    }

    pub fn set_status(&self, status: AuthorizationStatus) {
        *locked(&self.status) = status;
    }

    pub fn lock(&self) -> &AssertingLock {
        &self.lock
    }

    /// Names of the calls received, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        locked(&self.calls).clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        locked(&self.calls).iter().filter(|c| **c == name).count()
    }

    /// Locations handed to each `detect_exposures` call.
    pub fn detected_locations(&self) -> Vec<Vec<ChunkLocation>> {
        locked(&self.detected).clone()
    }

    async fn record(&self, name: &'static str) {
        locked(&self.calls).push(name);
        if !self.call_delay.is_zero() {
            tokio::time::sleep(self.call_delay).await;
        }
    }
}

#[async_trait]
impl ExposureNotificationProvider for MockExposureProvider {
    async fn activate(&self) -> Result<()> {
        let _guard = self.lock.enter();
        self.record("activate").await;
        Ok(())
    }

    async fn status(&self) -> Result<AuthorizationStatus> {
        let _guard = self.lock.enter();
        self.record("status").await;
        Ok(*locked(&self.status))
    }

    async fn set_exposure_notification_enabled(&self, enabled: bool) -> Result<()> {
        let _guard = self.lock.enter();
        self.record("set_exposure_notification_enabled").await;
        let mut status = locked(&self.status);
        if enabled && *status == AuthorizationStatus::Unknown {
            *status = AuthorizationStatus::Authorized;
        }
        Ok(())
    }

    async fn detect_exposures(
        &self,
        _configuration: &ExposureConfiguration,
        key_locations: &[ChunkLocation],
    ) -> Result<ExposureDetectionSummary> {
        let _guard = self.lock.enter();
        self.record("detect_exposures").await;
        locked(&self.detected).push(key_locations.to_vec());
        locked(&self.summary)
            .clone()
            .ok_or_else(|| DetectError::Provider("scripted detection failure".into()))
    }

    async fn get_exposure_info(
        &self,
        _summary: &ExposureDetectionSummaryData,
        _user_explanation: &str,
    ) -> Result<Vec<ExposureInfo>> {
        let _guard = self.lock.enter();
        self.record("get_exposure_info").await;
        locked(&self.exposure_info)
            .clone()
            .ok_or_else(|| DetectError::Provider("scripted exposure info failure".into()))
    }

    async fn get_diagnosis_keys(&self) -> Result<Vec<TemporaryExposureKey>> {
        let _guard = self.lock.enter();
        self.record("get_diagnosis_keys").await;
        Ok(locked(&self.diagnosis_keys).clone())
    }

    async fn deactivate(&self) -> Result<()> {
        let _guard = self.lock.enter();
        self.record("deactivate").await;
        Ok(())
    }
}
