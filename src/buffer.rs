use crate::models::QuickPulseDocument;
use std::{
    collections::VecDeque,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

/// Default number of documents kept between two posts.
pub const DEFAULT_DOCUMENT_CAPACITY: usize = 1000;

/// Bounded queue of documents waiting for the next post.
///
/// Clones refer to the same queue. When full, the oldest document is dropped.
#[derive(Clone)]
pub struct DocumentBuffer {
    inner: Arc<Mutex<VecDeque<QuickPulseDocument>>>,
    capacity: usize,
}

impl DocumentBuffer {
    /// Create an empty buffer holding at most `capacity` documents.
    pub fn new(capacity: usize) -> Self {
        DocumentBuffer {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(64)))),
            capacity,
        }
    }

    /// Queue a document.
    pub fn append(&self, document: QuickPulseDocument) {
        if self.capacity == 0 {
            return;
        }
        let mut queue = self.lock();
        while queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(document);
    }

    /// Take all queued documents, oldest first.
    pub fn drain(&self) -> Vec<QuickPulseDocument> {
        self.lock().drain(..).collect()
    }

    /// Number of queued documents.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no document is queued.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Maximum number of queued documents.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<QuickPulseDocument>> {
        // A panic while holding the lock leaves the queue in a valid state.
        self.inner.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl Default for DocumentBuffer {
    fn default() -> Self {
        DocumentBuffer::new(DEFAULT_DOCUMENT_CAPACITY)
    }
}

impl fmt::Debug for DocumentBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentBuffer")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
