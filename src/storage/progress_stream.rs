use std::pin::Pin;
use std::task::{Context, Poll};
use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use crate::core::ProgressFn;

pin_project! {
    /// Body stream that reports how many bytes have been handed to the transport.
    pub struct ProgressStream<S> {
        #[pin]
        inner: S,
        on_progress: ProgressFn,
        transferred: u64,
        total: u64,
    }
}

impl<S> ProgressStream<S> {
    pub fn new(inner: S, total: u64, on_progress: ProgressFn) -> Self {
        Self {
            inner,
            on_progress,
            transferred: 0,
            total,
        }
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = std::io::Result<Bytes>>
{
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if !chunk.is_empty() {
                    *this.transferred += chunk.len() as u64;
                    (this.on_progress)(*this.transferred, *this.total);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            other => other,
        }
    }
}
