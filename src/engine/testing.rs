//! In-memory fakes for engine tests

use super::traits::{Notifier, VendorDirectory};
use crate::directory::VendorProfile;
use crate::notify::NotifyError;
use crate::state_machine::NoticeDraft;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Records every notice it is asked to deliver; can be told to start failing.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<NoticeDraft>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<NoticeDraft> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    /// All subsequent sends fail until cleared
    pub fn fail_next_sends(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notice: &NoticeDraft) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Rejected { status: 502 });
        }
        self.sent.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

/// Fixed set of vendor profiles
pub struct StaticDirectory {
    vendors: HashMap<i64, VendorProfile>,
}

impl StaticDirectory {
    pub fn new(profiles: impl IntoIterator<Item = VendorProfile>) -> Self {
        Self {
            vendors: profiles.into_iter().map(|v| (v.id, v)).collect(),
        }
    }
}

impl VendorDirectory for StaticDirectory {
    fn vendor(&self, id: i64) -> Option<VendorProfile> {
        self.vendors.get(&id).cloned()
    }
}
