//! Phase deadlines.
//!
//! A [`Deadline`] is armed when a proxy phase begins and dropped when the
//! phase completes or transitions; [`bounded`] races a phase's future
//! against it. The wake-up comes from a helper thread that sleeps until
//! the expiry instant, so no runtime timer facility is required.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

/// A one-shot deadline.
///
/// Dropping it disarms it: the helper thread, if already spawned, wakes
/// a waker whose task has moved on, which is a no-op.
#[derive(Debug)]
pub(crate) struct Deadline {
    at: Instant,
    waker: Option<Arc<Mutex<Waker>>>,
}

impl Deadline {
    /// Arms a deadline `timeout` from now.
    pub(crate) fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
            waker: None,
        }
    }

    /// Ready once the deadline has passed.
    ///
    /// The first pending poll spawns the wake-up thread; later polls
    /// keep the stored waker current.
    pub(crate) fn poll_expired(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        if Instant::now() >= self.at {
            return Poll::Ready(());
        }

        match &self.waker {
            Some(shared) => {
                if let Ok(mut waker) = shared.lock() {
                    if !waker.will_wake(cx.waker()) {
                        *waker = cx.waker().clone();
                    }
                }
            }
            None => {
                let shared = Arc::new(Mutex::new(cx.waker().clone()));
                self.waker = Some(Arc::clone(&shared));
                let at = self.at;
                std::thread::spawn(move || {
                    loop {
                        let now = Instant::now();
                        if now >= at {
                            break;
                        }
                        std::thread::sleep(at - now);
                    }
                    if let Ok(waker) = shared.lock() {
                        waker.wake_by_ref();
                    }
                });
            }
        }

        Poll::Pending
    }
}

/// Drives `fut` to completion unless the deadline fires first.
///
/// Returns `None` when the deadline fired; `deadline: None` runs the
/// future unbounded. The deadline is checked before each poll of the
/// future, so an already-expired deadline wins even over a future that
/// would be ready immediately.
pub(crate) async fn bounded<F: Future>(
    mut deadline: Option<&mut Deadline>,
    fut: F,
) -> Option<F::Output> {
    let mut fut = std::pin::pin!(fut);
    std::future::poll_fn(move |cx| {
        if let Some(deadline) = deadline.as_mut() {
            if deadline.poll_expired(cx).is_ready() {
                return Poll::Ready(None);
            }
        }
        fut.as_mut().poll(cx).map(Some)
    })
    .await
}
