//! Bake event hooks.
//!
//! Handlers are registered per [`BakeEventKind`] and run synchronously, in
//! registration order, from inside the baker call that raised the event.

use std::collections::HashMap;

/// Something that happened during a bake.
#[derive(Debug, Clone, PartialEq)]
pub enum BakeEvent {
    /// Resources allocated, stepping can begin.
    Started { jobs: usize, probes: usize },
    /// One step finished its sample batch for `job`.
    StepCompleted { job: usize, sample_index: u32, dispatches: u32 },
    /// All samples of `job` are done.
    JobCompleted { job: usize, completed_probes: usize },
    /// Results were aggregated.
    Finished { probes: usize },
    /// Resources were released.
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BakeEventKind {
    Started,
    StepCompleted,
    JobCompleted,
    Finished,
    Disposed,
}

impl BakeEvent {
    pub fn kind(&self) -> BakeEventKind {
        match self {
            Self::Started { .. } => BakeEventKind::Started,
            Self::StepCompleted { .. } => BakeEventKind::StepCompleted,
            Self::JobCompleted { .. } => BakeEventKind::JobCompleted,
            Self::Finished { .. } => BakeEventKind::Finished,
            Self::Disposed => BakeEventKind::Disposed,
        }
    }
}

type Handler = Box<dyn FnMut(&BakeEvent)>;

/// Dispatch table from event kind to handlers.
#[derive(Default)]
pub struct EventHooks {
    table: HashMap<BakeEventKind, Vec<Handler>>,
}

impl EventHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind.
    pub fn on(&mut self, kind: BakeEventKind, handler: impl FnMut(&BakeEvent) + 'static) {
        self.table.entry(kind).or_default().push(Box::new(handler));
    }

    /// Remove every handler of `kind`.
    pub fn clear(&mut self, kind: BakeEventKind) {
        self.table.remove(&kind);
    }

    pub fn emit(&mut self, event: &BakeEvent) {
        if let Some(handlers) = self.table.get_mut(&event.kind()) {
            for handler in handlers.iter_mut() {
                handler(event);
            }
        }
    }
}

impl std::fmt::Debug for EventHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<_, _> = self.table.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("EventHooks").field("handlers", &counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_handlers_run_in_order_for_their_kind() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = EventHooks::new();

        let l = log.clone();
        hooks.on(BakeEventKind::Finished, move |_| l.borrow_mut().push("first"));
        let l = log.clone();
        hooks.on(BakeEventKind::Finished, move |_| l.borrow_mut().push("second"));
        let l = log.clone();
        hooks.on(BakeEventKind::Disposed, move |_| l.borrow_mut().push("disposed"));

        hooks.emit(&BakeEvent::Finished { probes: 3 });
        assert_eq!(*log.borrow(), vec!["first", "second"]);

        hooks.clear(BakeEventKind::Finished);
        hooks.emit(&BakeEvent::Finished { probes: 3 });
        hooks.emit(&BakeEvent::Disposed);
        assert_eq!(*log.borrow(), vec!["first", "second", "disposed"]);
    }
}
