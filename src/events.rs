//! Inbound event queue for the control thread.
//!
//! Audio and probe threads hold an `EventSender`; the controller drains the
//! queue in `Controller::process_events`, so every state change happens on
//! the thread that owns the controller.

use crate::resource::ResourceEvent;
use std::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Resource(ResourceEvent),
    /// Best-effort duration from the metadata probe.
    DurationProbed { track_id: String, duration_secs: f64 },
}

/// Cloneable, `Send` handle for posting events.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<ControllerEvent>,
}

impl EventSender {
    pub fn resource(&self, event: ResourceEvent) {
        self.send(ControllerEvent::Resource(event));
    }

    pub fn duration_probed(&self, track_id: String, duration_secs: f64) {
        self.send(ControllerEvent::DurationProbed {
            track_id,
            duration_secs,
        });
    }

    fn send(&self, event: ControllerEvent) {
        // The controller is gone; nobody is left to care.
        let _ = self.tx.send(event);
    }
}

pub struct EventQueue {
    tx: mpsc::Sender<ControllerEvent>,
    rx: mpsc::Receiver<ControllerEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        EventQueue { tx, rx }
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    /// Take everything queued so far without blocking.
    pub fn drain(&self) -> Vec<ControllerEvent> {
        self.rx.try_iter().collect()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<EventSender>();
    }

    #[test]
    fn drain_preserves_order() {
        let queue = EventQueue::new();
        let sender = queue.sender();
        sender.resource(ResourceEvent::Ended { generation: 1 });
        sender.duration_probed("t".into(), 3.0);
        let events = queue.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ControllerEvent::Resource(ResourceEvent::Ended { generation: 1 })));
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn events_cross_threads() {
        let queue = EventQueue::new();
        let sender = queue.sender();
        std::thread::spawn(move || sender.duration_probed("x".into(), 1.0))
            .join()
            .unwrap();
        assert_eq!(queue.drain().len(), 1);
    }
}
