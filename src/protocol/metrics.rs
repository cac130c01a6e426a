use std::sync::atomic::{AtomicU64, Ordering};

use super::MessageType;

/// Track display protocol metrics without external dependencies.
pub(crate) struct Metrics;

static SESSIONS_ACCEPTED: AtomicU64 = AtomicU64::new(0);
static ACTIVE_SESSIONS: AtomicU64 = AtomicU64::new(0);
static SENT_MESSAGES: AtomicU64 = AtomicU64::new(0);
static RECEIVED_BYTES: AtomicU64 = AtomicU64::new(0);
static PROTOCOL_ERRORS: AtomicU64 = AtomicU64::new(0);
static APPLICATION_ERRORS: AtomicU64 = AtomicU64::new(0);

struct MessageTypeCounters {
    open: AtomicU64,
    data: AtomicU64,
    close: AtomicU64,
    exception: AtomicU64,
}

static RECEIVED_MESSAGES: MessageTypeCounters = MessageTypeCounters::new();

impl MessageTypeCounters {
    const fn new() -> Self {
        Self {
            open: AtomicU64::new(0),
            data: AtomicU64::new(0),
            close: AtomicU64::new(0),
            exception: AtomicU64::new(0),
        }
    }

    fn counter(&self, msg_type: MessageType) -> &AtomicU64 {
        match msg_type {
            MessageType::Open => &self.open,
            MessageType::Data => &self.data,
            MessageType::Close => &self.close,
            MessageType::Exception => &self.exception,
        }
    }
}

impl Metrics {
    #[inline]
    pub(crate) fn record_session_open() {
        SESSIONS_ACCEPTED.fetch_add(1, Ordering::Relaxed);
        ACTIVE_SESSIONS.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_session_close() {
        ACTIVE_SESSIONS.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_received(msg_type: MessageType, payload_len: usize) {
        RECEIVED_MESSAGES
            .counter(msg_type)
            .fetch_add(1, Ordering::Relaxed);
        RECEIVED_BYTES.fetch_add(payload_len as u64, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_sent() {
        SENT_MESSAGES.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_protocol_error() {
        PROTOCOL_ERRORS.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_application_error() {
        APPLICATION_ERRORS.fetch_add(1, Ordering::Relaxed);
    }
}

/// Read the process-wide protocol counters
#[must_use]
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        sessions_accepted: SESSIONS_ACCEPTED.load(Ordering::Relaxed),
        active_sessions: ACTIVE_SESSIONS.load(Ordering::Relaxed),
        open_received: RECEIVED_MESSAGES.open.load(Ordering::Relaxed),
        data_received: RECEIVED_MESSAGES.data.load(Ordering::Relaxed),
        close_received: RECEIVED_MESSAGES.close.load(Ordering::Relaxed),
        exception_received: RECEIVED_MESSAGES.exception.load(Ordering::Relaxed),
        received_bytes: RECEIVED_BYTES.load(Ordering::Relaxed),
        sent_messages: SENT_MESSAGES.load(Ordering::Relaxed),
        protocol_errors: PROTOCOL_ERRORS.load(Ordering::Relaxed),
        application_errors: APPLICATION_ERRORS.load(Ordering::Relaxed),
    }
}

/// Lightweight snapshot of critical counters.
#[derive(Default, Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct MetricsSnapshot {
    pub sessions_accepted: u64,
    pub active_sessions: u64,
    pub open_received: u64,
    pub data_received: u64,
    pub close_received: u64,
    pub exception_received: u64,
    pub received_bytes: u64,
    pub sent_messages: u64,
    pub protocol_errors: u64,
    pub application_errors: u64,
}

impl MetricsSnapshot {
    /// Messages received across all types
    #[must_use]
    pub fn received_messages(&self) -> u64 {
        self.open_received + self.data_received + self.close_received + self.exception_received
    }

    /// Errors of either class
    #[must_use]
    pub fn total_errors(&self) -> u64 {
        self.protocol_errors + self.application_errors
    }
}
