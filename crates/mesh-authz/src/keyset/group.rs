//! Per-key deduplication of in-flight requests
//!
//! Concurrent callers asking for the same key while a request is running
//! share that request's future and observe the same result.

use std::collections::HashMap;
use std::future::Future;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;

type InFlight<T> = Shared<BoxFuture<'static, T>>;

/// Table of in-flight requests keyed by string
pub struct RequestGroup<T: Clone> {
    calls: Mutex<HashMap<String, InFlight<T>>>,
}

impl<T: Clone> std::fmt::Debug for RequestGroup<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGroup")
            .field("in_flight", &self.calls.lock().len())
            .finish()
    }
}

impl<T> Default for RequestGroup<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RequestGroup<T>
where
    T: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Run `request` unless one is already in flight for `key`, in which case
    /// wait for that one instead.
    pub async fn run<F>(&self, key: &str, request: F) -> T
    where
        F: Future<Output = T> + Send + 'static,
    {
        let call = {
            let mut calls = self.calls.lock();
            if let Some(call) = calls.get(key) {
                tracing::debug!(key, "Joining in-flight request");
                call.clone()
            } else {
                let call = request.boxed().shared();
                calls.insert(key.to_owned(), call.clone());
                call
            }
        };

        let result = call.clone().await;

        let mut calls = self.calls.lock();
        if calls.get(key).is_some_and(|current| current.ptr_eq(&call)) {
            calls.remove(key);
        }
        result
    }

    /// Number of keys with a request in flight
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}
