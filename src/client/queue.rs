use parking_lot::RwLock;
use tracing::{debug, info};

use crate::network::messages::SongQueueItem;

/// Backend queue capacity
pub const MAX_QUEUE_LENGTH: usize = 10;

/// Song request queue as last reported by the backend
pub struct SongQueue {
    items: RwLock<Vec<SongQueueItem>>,
    error: RwLock<Option<String>>,
    action_loading: RwLock<bool>,
}

impl SongQueue {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            error: RwLock::new(None),
            action_loading: RwLock::new(false),
        }
    }

    /// Replace the queue, keeping only the first [`MAX_QUEUE_LENGTH`] entries
    pub fn set_items(&self, mut items: Vec<SongQueueItem>) {
        if items.len() > MAX_QUEUE_LENGTH {
            debug!(
                "Truncating song queue from {} to {} entries",
                items.len(),
                MAX_QUEUE_LENGTH
            );
            items.truncate(MAX_QUEUE_LENGTH);
        }
        info!("Song queue updated with {} items", items.len());
        *self.items.write() = items;
    }

    pub fn get_items(&self) -> Vec<SongQueueItem> {
        self.items.read().clone()
    }

    pub fn head(&self) -> Option<SongQueueItem> {
        self.items.read().first().cloned()
    }

    /// Drop the head entry if it still has the given id
    pub fn remove_head_if(&self, id: &str) -> bool {
        let mut items = self.items.write();
        if items.first().map(|item| item.id == id).unwrap_or(false) {
            items.remove(0);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn clear(&self) {
        self.items.write().clear();
    }

    pub fn get_error(&self) -> Option<String> {
        self.error.read().clone()
    }

    pub fn set_error(&self, error: Option<String>) {
        *self.error.write() = error;
    }

    pub fn is_action_loading(&self) -> bool {
        *self.action_loading.read()
    }

    pub fn set_action_loading(&self, loading: bool) {
        *self.action_loading.write() = loading;
    }
}

impl Default for SongQueue {
    fn default() -> Self {
        Self::new()
    }
}
