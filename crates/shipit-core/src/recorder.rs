//! Command recording: an observer list notified for every executed command.
//!
//! Top-level operations (push flow, remediation) subscribe for their lifetime
//! through [`CommandTrail`]. The subscription is a guard that unsubscribes on
//! `Drop`, so it is released on every exit path.
//!
//! The list is thread-local. The CLI runs on a single thread, so this is the
//! whole process there, while parallel test threads stay isolated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// One executed shell command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub command: String,
    pub label: String,
    pub ok: bool,
    pub exit_code: i32,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

type Callback = Rc<dyn Fn(&CommandRecord)>;

thread_local! {
    static SUBSCRIBERS: RefCell<Vec<(u64, Callback)>> = const { RefCell::new(Vec::new()) };
    static NEXT_ID: Cell<u64> = const { Cell::new(0) };
}

/// Guard returned by [`subscribe`]; dropping it removes the subscriber.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let id = self.id;
        SUBSCRIBERS.with(|subs| subs.borrow_mut().retain(|(sid, _)| *sid != id));
    }
}

pub fn subscribe(callback: impl Fn(&CommandRecord) + 'static) -> Subscription {
    let id = NEXT_ID.with(|n| {
        let id = n.get();
        n.set(id + 1);
        id
    });
    SUBSCRIBERS.with(|subs| subs.borrow_mut().push((id, Rc::new(callback))));
    Subscription { id }
}

/// Deliver `record` to every current subscriber.
pub fn notify(record: &CommandRecord) {
    // Clone the callbacks out so a subscriber may (un)subscribe re-entrantly.
    let callbacks: Vec<Callback> =
        SUBSCRIBERS.with(|subs| subs.borrow().iter().map(|(_, cb)| cb.clone()).collect());
    for cb in callbacks {
        cb(record);
    }
}

pub fn subscriber_count() -> usize {
    SUBSCRIBERS.with(|subs| subs.borrow().len())
}

// ---------------------------------------------------------------------------
// CommandTrail
// ---------------------------------------------------------------------------

/// Collects every command executed while it is alive.
pub struct CommandTrail {
    records: Rc<RefCell<Vec<CommandRecord>>>,
    _subscription: Subscription,
}

impl CommandTrail {
    pub fn start() -> Self {
        let records = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&records);
        let subscription = subscribe(move |r| sink.borrow_mut().push(r.clone()));
        Self {
            records,
            _subscription: subscription,
        }
    }

    pub fn records(&self) -> Vec<CommandRecord> {
        self.records.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Successful commands, deduplicated by command text in first-seen order.
/// Repeats get an `(xN)` suffix.
pub fn summarize_commands(records: &[CommandRecord]) -> Vec<String> {
    let mut order: Vec<(&str, usize)> = Vec::new();
    for r in records.iter().filter(|r| r.ok) {
        match order.iter_mut().find(|(cmd, _)| *cmd == r.command) {
            Some((_, n)) => *n += 1,
            None => order.push((r.command.as_str(), 1)),
        }
    }
    order
        .into_iter()
        .map(|(cmd, n)| {
            if n > 1 {
                format!("{cmd} (x{n})")
            } else {
                cmd.to_string()
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn record(command: &str, ok: bool) -> CommandRecord {
        CommandRecord {
            command: command.to_string(),
            label: "test".to_string(),
            ok,
            exit_code: if ok { 0 } else { 1 },
            duration_ms: 5,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn trail_collects_while_alive() {
        let before = subscriber_count();
        {
            let trail = CommandTrail::start();
            assert_eq!(subscriber_count(), before + 1);
            notify(&record("git fetch", true));
            notify(&record("npm run build", false));
            assert_eq!(trail.len(), 2);
        }
        assert_eq!(subscriber_count(), before);
    }

    #[test]
    fn subscription_released_on_early_return() {
        fn failing_operation() -> Result<(), String> {
            let _trail = CommandTrail::start();
            notify(&record("git push", false));
            Err("push rejected".into())
        }
        let before = subscriber_count();
        assert!(failing_operation().is_err());
        assert_eq!(subscriber_count(), before);
    }

    #[test]
    fn subscription_released_on_panic() {
        let before = subscriber_count();
        let result = std::panic::catch_unwind(|| {
            let _trail = CommandTrail::start();
            panic!("boom");
        });
        assert!(result.is_err());
        assert_eq!(subscriber_count(), before);
    }

    #[test]
    fn nested_trails_both_receive() {
        let outer = CommandTrail::start();
        let inner = CommandTrail::start();
        notify(&record("git status", true));
        drop(inner);
        notify(&record("git push", true));
        assert_eq!(outer.len(), 2);
    }

    #[test]
    fn summary_keeps_successes_dedupes_and_counts() {
        let records = vec![
            record("git fetch --prune origin", true),
            record("npm run build", false),
            record("npm run build", true),
            record("npm run build", true),
            record("git push -u origin a/feat/x", true),
        ];
        assert_eq!(
            summarize_commands(&records),
            vec![
                "git fetch --prune origin".to_string(),
                "npm run build (x2)".to_string(),
                "git push -u origin a/feat/x".to_string(),
            ]
        );
    }
}
