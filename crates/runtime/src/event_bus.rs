/// Ordered trace of workflow events.
///
/// Each event records the sequence number it was emitted at, so consumers can
/// assert "A happened before B" without relying on wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub seq: u64,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct EventBus {
    next_seq: u64,
    events: Vec<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, kind: &'static str, message: impl Into<String>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(Event {
            seq,
            kind,
            message: message.into(),
        });
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Sequence number of the first event matching `kind` and `message`.
    pub fn position(&self, kind: &str, message: &str) -> Option<u64> {
        self.events
            .iter()
            .find(|e| e.kind == kind && e.message == message)
            .map(|e| e.seq)
    }
}
