//! Trait seams for the engine's collaborators
//!
//! Allows tests to substitute in-memory fakes for the webhook notifier and
//! the JSON-backed vendor directory.

use crate::directory::{JsonVendorDirectory, VendorProfile};
use crate::notify::NotifyError;
use crate::state_machine::NoticeDraft;
use async_trait::async_trait;
use std::sync::Arc;

/// Outbound notification delivery
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notice: &NoticeDraft) -> Result<(), NotifyError>;
}

#[async_trait]
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    async fn send(&self, notice: &NoticeDraft) -> Result<(), NotifyError> {
        (**self).send(notice).await
    }
}

/// Vendor contact lookup
pub trait VendorDirectory: Send + Sync {
    fn vendor(&self, id: i64) -> Option<VendorProfile>;
}

impl VendorDirectory for JsonVendorDirectory {
    fn vendor(&self, id: i64) -> Option<VendorProfile> {
        self.get(id).cloned()
    }
}

impl<T: VendorDirectory + ?Sized> VendorDirectory for Arc<T> {
    fn vendor(&self, id: i64) -> Option<VendorProfile> {
        (**self).vendor(id)
    }
}
