use std::fmt;

/// Handle to an active subscription.
///
/// Dropping the handle unsubscribes. Keep it alive for as long as the
/// callback should keep receiving values.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Wrap an unsubscribe action.
    pub fn new<F>(unsubscribe: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Stop receiving values now.
    pub fn unsubscribe(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }

    /// Keep the subscription alive for the rest of the store's life.
    pub fn detach(mut self) {
        self.unsubscribe = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

/// Teardown returned by asynchronous callbacks and start notifiers.
///
/// The owner runs it exactly once: before the next invocation of the
/// callback that produced it, or when the owning subscription stops.
pub struct Cleanup(Box<dyn FnOnce()>);

impl Cleanup {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self(Box::new(f))
    }

    /// Consume and run the cleanup.
    pub fn run(self) {
        (self.0)()
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cleanup")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn drop_unsubscribes_once() {
        let calls = Rc::new(Cell::new(0));
        let calls_clone = calls.clone();
        let subscription = Subscription::new(move || calls_clone.set(calls_clone.get() + 1));
        drop(subscription);
        assert_eq!(calls.get(), 1);

        let calls_clone = calls.clone();
        Subscription::new(move || calls_clone.set(calls_clone.get() + 1)).unsubscribe();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn detach_keeps_subscription() {
        let calls = Rc::new(Cell::new(0));
        let calls_clone = calls.clone();
        Subscription::new(move || calls_clone.set(1)).detach();
        assert_eq!(calls.get(), 0);
    }
}
