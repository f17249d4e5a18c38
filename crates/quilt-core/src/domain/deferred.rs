//! Deferred action queue.
//!
//! `defer` actions are not executed where they appear; their bodies are queued
//! here and run once the whole fragment tree has been applied, strictly in
//! registration order.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use super::fragment::Action;

/// A queued body of actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredAction {
    ordinal: usize,
    label: Option<String>,
    actions: Vec<Action>,
    source_root: PathBuf,
}

impl DeferredAction {
    /// Registration order, starting at 1.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Display label, falling back to `#<ordinal>`.
    pub fn describe(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| format!("#{}", self.ordinal))
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Root of the fragment that registered this action; verbatim copies and
    /// relative `apply` sources resolve against it.
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }
}

/// FIFO of deferred actions for a single run.
#[derive(Debug, Default)]
pub struct DeferredQueue {
    pending: VecDeque<DeferredAction>,
    registered: usize,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `actions`; returns the ordinal assigned.
    pub fn register(
        &mut self,
        label: Option<String>,
        actions: Vec<Action>,
        source_root: impl Into<PathBuf>,
    ) -> usize {
        self.registered += 1;
        self.pending.push_back(DeferredAction {
            ordinal: self.registered,
            label,
            actions,
            source_root: source_root.into(),
        });
        self.registered
    }

    /// Next action in registration order.
    ///
    /// Actions registered while draining land behind everything already
    /// queued, so a pop loop drains them in the same pass.
    pub fn pop(&mut self) -> Option<DeferredAction> {
        self.pending.pop_front()
    }

    /// Total registrations over the queue's lifetime.
    pub fn registered(&self) -> usize {
        self.registered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(label: &str) -> Vec<Action> {
        vec![Action::Run {
            program: label.into(),
            args: vec![],
            label: None,
        }]
    }

    #[test]
    fn pops_in_registration_order() {
        let mut queue = DeferredQueue::new();
        assert_eq!(queue.register(None, run("a"), "/src"), 1);
        assert_eq!(queue.register(Some("b".into()), run("b"), "/src"), 2);

        let first = queue.pop().unwrap();
        assert_eq!(first.ordinal(), 1);
        assert_eq!(first.describe(), "#1");

        let second = queue.pop().unwrap();
        assert_eq!(second.describe(), "b");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn registration_while_draining_is_appended() {
        let mut queue = DeferredQueue::new();
        queue.register(None, run("a"), "/src");
        queue.register(None, run("b"), "/src");

        let mut seen = Vec::new();
        while let Some(item) = queue.pop() {
            if item.ordinal() == 1 {
                queue.register(None, run("c"), "/src");
            }
            seen.push(item.ordinal());
        }
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(queue.registered(), 3);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn keeps_source_root() {
        let mut queue = DeferredQueue::new();
        queue.register(None, vec![], "/tmp/quilt-abc");
        assert_eq!(queue.pop().unwrap().source_root(), Path::new("/tmp/quilt-abc"));
    }
}
