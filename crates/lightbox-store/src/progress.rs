use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use lightbox_core::progress::clamp_percent;

/// Upload progress callback, receiving a percentage in 0.0..=100.0.
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// Forwards progress to a callback, dropping any report that does not move
/// the percentage forward.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: ProgressFn,
    last: Arc<Mutex<Option<f64>>>,
}

impl ProgressReporter {
    pub fn new(callback: ProgressFn) -> Self {
        Self {
            callback,
            last: Arc::new(Mutex::new(None)),
        }
    }

    pub fn report(&self, percentage: f64) {
        let pct = clamp_percent(percentage);
        {
            let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
            if matches!(*last, Some(prev) if pct <= prev) {
                return;
            }
            *last = Some(pct);
        }
        // Invoke outside the lock; callbacks may take their own locks.
        (self.callback)(pct);
    }
}

/// Chunked body for an upload. Each chunk handed to the transport reports
/// the share of bytes sent so far; the final chunk reports 100.
pub struct TransferStream {
    data: Bytes,
    offset: usize,
    chunk_size: usize,
    reporter: Option<ProgressReporter>,
    finished: bool,
}

impl TransferStream {
    pub fn new(data: Bytes, chunk_size: usize, reporter: Option<ProgressReporter>) -> Self {
        Self {
            data,
            offset: 0,
            chunk_size: chunk_size.max(1),
            reporter,
            finished: false,
        }
    }

    /// Total bytes this stream will yield.
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Drain the stream, collecting every chunk. Progress is reported as
    /// chunks are consumed, same as a network transport would.
    pub async fn collect_bytes(mut self) -> Bytes {
        use futures::StreamExt;

        let mut out = Vec::with_capacity(self.data.len());
        while let Some(Ok(chunk)) = self.next().await {
            out.extend_from_slice(&chunk);
        }
        Bytes::from(out)
    }

    fn report(&self, percentage: f64) {
        if let Some(reporter) = &self.reporter {
            reporter.report(percentage);
        }
    }
}

impl Stream for TransferStream {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let total = this.data.len();

        if this.offset >= total {
            if !this.finished {
                this.finished = true;
                if total == 0 {
                    this.report(100.0);
                }
            }
            return Poll::Ready(None);
        }

        let end = (this.offset + this.chunk_size).min(total);
        let chunk = this.data.slice(this.offset..end);
        this.offset = end;
        this.report(end as f64 / total as f64 * 100.0);
        Poll::Ready(Some(Ok(chunk)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.data.len().saturating_sub(self.offset);
        let chunks = remaining.div_ceil(self.chunk_size);
        (chunks, Some(chunks))
    }
}
