//! Downstream emission interface.

use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::error::EmitError;
use crate::record::Record;

/// Receives every record produced by a poll cycle.
///
/// Implementations must not panic on bad input; a returned error is logged
/// by the poller and the next record is processed normally.
pub trait EventSink: Send + Sync {
    /// Emit one record under `tag` at `time` (epoch milliseconds).
    fn emit(
        &self,
        tag: &str,
        time: i64,
        record: Record,
    ) -> impl Future<Output = Result<(), EmitError>> + Send;
}

impl<S: EventSink> EventSink for Arc<S> {
    fn emit(
        &self,
        tag: &str,
        time: i64,
        record: Record,
    ) -> impl Future<Output = Result<(), EmitError>> + Send {
        (**self).emit(tag, time, record)
    }
}

/// An emitted event as captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedEvent {
    /// Routing tag.
    pub tag: String,
    /// Event time in epoch milliseconds.
    pub time: i64,
    /// Emitted fields.
    pub record: Record,
}

/// Sink that keeps every record in memory.
///
/// Backs the bridge's `--dry-run` mode.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<CapturedEvent>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Remove and return the events received so far.
    pub fn take(&self) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    async fn emit(&self, tag: &str, time: i64, record: Record) -> Result<(), EmitError> {
        let mut events = self.events.lock().map_err(|_| EmitError::Publish {
            key: tag.to_string(),
            message: "memory sink poisoned".to_string(),
        })?;
        events.push(CapturedEvent {
            tag: tag.to_string(),
            time,
            record,
        });
        Ok(())
    }
}
