use std::sync::Mutex;

use dagrun::exec::{EventSink, LifecycleEvent, LifecycleKind};

/// Event sink that keeps every lifecycle event in emission order.
///
/// Emission order is causal: a job's `Completed` is recorded before any of
/// its dependents can record `Started`, so ordering assertions use positions
/// in this log rather than timestamps (which can tie).
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Display form of every event, e.g. `"Job A started"`.
    pub fn messages(&self) -> Vec<String> {
        self.events().iter().map(|e| e.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, kind: LifecycleKind) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }

    /// Jobs with an event of `kind`, in emission order.
    pub fn jobs_with(&self, kind: LifecycleKind) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.job.clone())
            .collect()
    }

    /// Index of the first `kind` event for `job`.
    pub fn position(&self, job: &str, kind: LifecycleKind) -> Option<usize> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .position(|e| e.job == job && e.kind == kind)
    }

    /// Assert that `before` completed before `after` started.
    #[track_caller]
    pub fn assert_finished_before(&self, before: &str, after: &str) {
        let done = self
            .position(before, LifecycleKind::Completed)
            .unwrap_or_else(|| panic!("{before} never completed: {:?}", self.messages()));
        let start = self
            .position(after, LifecycleKind::Started)
            .unwrap_or_else(|| panic!("{after} never started: {:?}", self.messages()));
        assert!(
            done < start,
            "{before} completed at #{done}, but {after} started at #{start}: {:?}",
            self.messages()
        );
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: LifecycleEvent) {
        self.events.lock().unwrap().push(event);
    }
}
