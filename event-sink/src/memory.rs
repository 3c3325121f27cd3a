// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::collections::VecDeque;

use core_types::SaleEvent;
use parking_lot::Mutex;

use crate::{EventSink, SinkError};

pub struct EventLog {
    capacity: usize,
    events: Mutex<VecDeque<SaleEvent>>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Newest first.
    pub fn recent(&self) -> Vec<SaleEvent> {
        self.events.lock().iter().cloned().collect()
    }

    fn push(&self, event: SaleEvent) {
        let mut guard = self.events.lock();
        guard.push_front(event);
        guard.truncate(self.capacity);
    }
}

impl EventSink for EventLog {
    fn record(&self, event: SaleEvent) -> Result<(), SinkError> {
        self.push(event);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "event_log"
    }
}
