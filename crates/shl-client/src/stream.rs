// ── Reactive entity state streams ──
//
// Every entity publishes its observed state through a `watch` channel:
// the last value is retained, new subscribers see it immediately, and
// later updates fan out to all of them. Publishers are never completed;
// a subscriber held across a reconnect keeps receiving.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// A subscription to one entity's observed state.
///
/// `None` means the bridge has not reported a state yet; the stream
/// only ever yields values once one exists.
pub struct StateStream<T: Clone + Send + Sync + 'static> {
    current: Option<T>,
    receiver: watch::Receiver<Option<T>>,
}

impl<T: Clone + Send + Sync + 'static> StateStream<T> {
    pub(crate) fn new(receiver: watch::Receiver<Option<T>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The state captured when this subscription was created.
    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    /// The latest published state (may be newer than [`current`](Self::current)).
    pub fn latest(&self) -> Option<T> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next published state.
    ///
    /// Returns `None` only when the entity's publisher is gone, which
    /// outlives every ordinary bridge lifecycle.
    pub async fn changed(&mut self) -> Option<T> {
        loop {
            self.receiver.changed().await.ok()?;
            if let Some(value) = self.receiver.borrow_and_update().clone() {
                self.current = Some(value.clone());
                return Some(value);
            }
        }
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> StateWatchStream<T> {
        StateWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by the entity's `watch` channel; yields each
/// published state, skipping the not-yet-observed placeholder.
pub struct StateWatchStream<T: Clone + Send + Sync + 'static> {
    inner: WatchStream<Option<T>>,
}

impl<T: Clone + Send + Sync + 'static> Stream for StateWatchStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Some(value))) => return Poll::Ready(Some(value)),
                Poll::Ready(Some(None)) => continue,
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
