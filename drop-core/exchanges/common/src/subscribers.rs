use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

/// Registry of event subscribers keyed by their id.
///
/// Registering a second subscriber under an existing id replaces the first.
/// A panicking subscriber poisons the lock but does not stop delivery to the
/// others.
pub struct Subscribers<T: ?Sized> {
    inner: RwLock<HashMap<String, Arc<T>>>,
}

impl<T: ?Sized> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, id: String, subscriber: Arc<T>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, subscriber);
    }

    pub fn remove(&self, id: &str) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls `f` once per registered subscriber.
    pub fn for_each(&self, mut f: impl FnMut(&T)) {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .for_each(|s| f(s.as_ref()));
    }
}

impl<T: ?Sized> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Counter: Send + Sync {
        fn hit(&self);
    }

    struct Hits(AtomicUsize);

    impl Counter for Hits {
        fn hit(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn same_id_replaces_previous() {
        let subscribers: Subscribers<dyn Counter> = Subscribers::new();
        let first = Arc::new(Hits(AtomicUsize::new(0)));
        let second = Arc::new(Hits(AtomicUsize::new(0)));

        subscribers.insert("progress".into(), first.clone());
        subscribers.insert("progress".into(), second.clone());
        subscribers.for_each(|s| s.hit());

        assert_eq!(subscribers.len(), 1);
        assert_eq!(first.0.load(Ordering::SeqCst), 0);
        assert_eq!(second.0.load(Ordering::SeqCst), 1);

        subscribers.remove("progress");
        assert!(subscribers.is_empty());
    }
}
