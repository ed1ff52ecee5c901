use crate::session::SessionReport;
use crate::store::{newest_first, ReportStore, StoreError};
use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// In-process store for offline runs.
#[derive(Default)]
pub struct MemoryReportStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    reports: HashMap<String, Vec<SessionReport>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl ReportStore for MemoryReportStore {
    fn save<'a>(
        &'a self,
        uid: &'a str,
        report: &'a SessionReport,
    ) -> BoxFuture<'a, Result<String, StoreError>> {
        async move {
            let mut inner = self.lock();
            inner.next_id += 1;
            let id = format!("report-{}", inner.next_id);
            let stored = report.clone().persisted(id.clone(), Utc::now());
            inner.reports.entry(uid.to_owned()).or_default().push(stored);
            Ok(id)
        }
        .boxed()
    }

    fn history<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, Result<Vec<SessionReport>, StoreError>> {
        async move {
            // Reversed first so reports saved within the same clock tick still list newest first.
            let mut reports: Vec<_> = self
                .lock()
                .reports
                .get(uid)
                .map(|r| r.iter().rev().cloned().collect())
                .unwrap_or_default();
            newest_first(&mut reports);
            Ok(reports)
        }
        .boxed()
    }

    fn clear<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, Result<usize, StoreError>> {
        async move { Ok(self.lock().reports.remove(uid).map(|r| r.len()).unwrap_or(0)) }.boxed()
    }
}
