use std::cell::RefCell;
use std::collections::VecDeque;

/// A deferred subscriber delivery.
pub(crate) type Job = Box<dyn FnOnce()>;

/// Pending deliveries for the current thread.
struct NotifyQueue {
    jobs: VecDeque<Job>,
    // True while the outermost `set` is draining the queue
    flushing: bool,
}

impl NotifyQueue {
    fn new() -> Self {
        Self {
            jobs: VecDeque::new(),
            flushing: false,
        }
    }
}

thread_local! {
    static NOTIFY_QUEUE: RefCell<NotifyQueue> = RefCell::new(NotifyQueue::new());
}

/// Delivery scheduler shared by every store on a thread.
///
/// Stores never call their subscribers directly when a value changes.
/// They enqueue one job per subscriber and the outermost `set` on the
/// call stack drains the queue in FIFO order. A `set` issued from inside
/// a subscriber only appends to the queue, so every subscriber of the
/// first change hears about it before anyone hears about the second.
/// This is what lets a derivation with several sources wait until all
/// of them have settled.
///
/// # Examples
///
/// ```
/// use backflow::runtime::NotifyRuntime;
///
/// assert!(!NotifyRuntime::is_flushing());
/// ```
pub struct NotifyRuntime;

impl NotifyRuntime {
    /// Queue `jobs` and drain the queue unless a drain is already running
    /// further up the stack.
    pub(crate) fn schedule<I>(jobs: I)
    where
        I: IntoIterator<Item = Job>,
    {
        let start_flush = NOTIFY_QUEUE.with(|queue| {
            let mut queue = queue.borrow_mut();
            queue.jobs.extend(jobs);
            if queue.flushing || queue.jobs.is_empty() {
                false
            } else {
                queue.flushing = true;
                true
            }
        });

        if start_flush {
            Self::flush();
        }
    }

    /// Whether deliveries are currently being drained on this thread.
    pub fn is_flushing() -> bool {
        NOTIFY_QUEUE.with(|queue| queue.borrow().flushing)
    }

    fn flush() {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| loop {
            // The borrow must end before the job runs: jobs schedule more jobs.
            let job = NOTIFY_QUEUE.with(|queue| queue.borrow_mut().jobs.pop_front());
            match job {
                Some(job) => job(),
                None => break,
            }
        }));

        NOTIFY_QUEUE.with(|queue| {
            let mut queue = queue.borrow_mut();
            queue.flushing = false;
            if result.is_err() {
                let dropped = queue.jobs.len();
                queue.jobs.clear();
                tracing::trace!(dropped, "notify queue cleared after panic");
            }
        });

        if let Err(e) = result {
            std::panic::resume_unwind(e);
        }
    }
}
