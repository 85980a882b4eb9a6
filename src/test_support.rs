//! In-memory fakes for unit tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{DispatchError, FetchError};
use crate::fetch::Fetch;
use crate::sink::{Message, NotificationSink};

/// Serves canned documents per URL; unknown URLs fail like a timeout.
#[derive(Default)]
pub struct ScriptedFetch {
    documents: Mutex<HashMap<String, Option<String>>>,
}

impl ScriptedFetch {
    pub fn set(&self, url: &str, document: &str) {
        self.documents
            .lock()
            .insert(url.to_string(), Some(document.to_string()));
    }

    pub fn set_error(&self, url: &str) {
        self.documents.lock().insert(url.to_string(), None);
    }
}

#[async_trait]
impl Fetch for ScriptedFetch {
    async fn fetch(&self, target: &str) -> Result<String, FetchError> {
        self.documents
            .lock()
            .get(target)
            .cloned()
            .flatten()
            .ok_or_else(|| FetchError::Request {
                target: target.to_string(),
                reason: "operation timed out".to_string(),
            })
    }
}

/// Records every message; optionally rejects them after recording.
#[derive(Default)]
pub struct RecordingSink {
    pub sent: Mutex<Vec<Message>>,
    pub reject: bool,
}

impl RecordingSink {
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, message: &Message) -> Result<(), DispatchError> {
        self.sent.lock().push(message.clone());
        if self.reject {
            return Err(DispatchError::Rejected {
                status: 500,
                body: "internal_error".to_string(),
            });
        }
        Ok(())
    }
}
