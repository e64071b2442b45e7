use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use metrics::{histogram, KeyName};
use pin_project_lite::pin_project;
use tracing::Span;

pub(crate) trait Measure: Sized {
    fn measure_execution_time<M>(self, metric: M, span: Span) -> TimeInstrumented<Self>
    where
        M: Into<KeyName>,
    {
        TimeInstrumented {
            inner: self,
            started_at: None,
            key_name: metric.into(),
            span,
        }
    }
}

impl<T: Future> Measure for T {}

pin_project! {
    /// Records the time from the first poll to completion into a histogram.
    #[derive(Debug)]
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub(crate) struct TimeInstrumented<T> {
        #[pin]
        inner: T,
        started_at: Option<Instant>,
        key_name: KeyName,
        span: Span,
    }
}

impl<T: Future> Future for TimeInstrumented<T> {
    type Output = T::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _enter = this.span.enter();

        let started_at = *this.started_at.get_or_insert_with(Instant::now);
        let res = this.inner.poll(cx);

        if res.is_ready() {
            histogram!(this.key_name.clone()).record(started_at.elapsed().as_millis() as f64);
        }
        res
    }
}
