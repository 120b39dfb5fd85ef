//! Correlation tables: pending requests awaiting their server replies.

use std::collections::{HashMap, VecDeque};

use crate::roster::{WhoResult, WhoisResult};

/// An error numeric that answered a pending request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Rejection {
    pub numeric: u16,
    pub message: String,
}

#[derive(Debug)]
enum Slot<T> {
    Waiting(T),
    Ready(Result<T, Rejection>),
}

/// Pending requests of one kind, keyed by case-folded target.
#[derive(Debug)]
pub(crate) struct Table<T> {
    slots: HashMap<String, Slot<T>>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }
}

impl<T> Table<T> {
    /// Start waiting on `key`, replacing any earlier record.
    pub fn register(&mut self, key: String, initial: T) {
        self.slots.insert(key, Slot::Waiting(initial));
    }

    pub fn is_pending(&self, key: &str) -> bool {
        matches!(self.slots.get(key), Some(Slot::Waiting(_)))
    }

    /// Partial value of a waiting request.
    pub fn get(&self, key: &str) -> Option<&T> {
        match self.slots.get(key)? {
            Slot::Waiting(value) => Some(value),
            Slot::Ready(_) => None,
        }
    }

    /// Keys still waiting for a reply.
    pub fn waiting_keys(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().filter_map(|(k, slot)| match slot {
            Slot::Waiting(_) => Some(k.as_str()),
            Slot::Ready(_) => None,
        })
    }

    /// Update the partial value of a waiting request.
    pub fn accumulate(&mut self, key: &str, f: impl FnOnce(&mut T)) -> bool {
        match self.slots.get_mut(key) {
            Some(Slot::Waiting(value)) => {
                f(value);
                true
            }
            _ => false,
        }
    }

    /// Complete a waiting request with what it accumulated.
    pub fn resolve(&mut self, key: &str) -> bool {
        match self.slots.remove(key) {
            Some(Slot::Waiting(value)) => {
                self.slots.insert(key.to_owned(), Slot::Ready(Ok(value)));
                true
            }
            Some(ready) => {
                self.slots.insert(key.to_owned(), ready);
                false
            }
            None => false,
        }
    }

    /// Complete a waiting request with `value`.
    pub fn resolve_with(&mut self, key: &str, value: T) -> bool {
        if !self.is_pending(key) {
            return false;
        }
        self.slots.insert(key.to_owned(), Slot::Ready(Ok(value)));
        true
    }

    /// Fail a waiting request.
    pub fn reject(&mut self, key: &str, rejection: Rejection) -> bool {
        if !self.is_pending(key) {
            return false;
        }
        self.slots.insert(key.to_owned(), Slot::Ready(Err(rejection)));
        true
    }

    /// Remove and return the outcome if the request has completed.
    pub fn take_ready(&mut self, key: &str) -> Option<Result<T, Rejection>> {
        if matches!(self.slots.get(key), Some(Slot::Ready(_))) {
            return self.remove(key);
        }
        None
    }

    /// Drop the record. An outcome that landed in the meantime is returned.
    pub fn remove(&mut self, key: &str) -> Option<Result<T, Rejection>> {
        match self.slots.remove(key)? {
            Slot::Ready(outcome) => Some(outcome),
            Slot::Waiting(_) => None,
        }
    }
}

/// All correlation tables of one session.
#[derive(Debug, Default)]
pub(crate) struct Correlations {
    /// Channel → own JOIN seen.
    joins: Table<bool>,
    parts: Table<()>,
    /// Requested nick.
    nicks: Table<()>,
    /// WHO mask → rows so far.
    who: Table<Vec<WhoResult>>,
    whois: Table<Option<WhoisResult>>,
    /// ISON requests by sequence key; replies carry no target.
    ison: Table<Vec<String>>,
    ison_order: VecDeque<String>,
    ison_seq: u64,
}

impl Correlations {
    pub fn joins(&mut self) -> &mut Table<bool> {
        &mut self.joins
    }

    pub fn parts(&mut self) -> &mut Table<()> {
        &mut self.parts
    }

    pub fn nicks(&mut self) -> &mut Table<()> {
        &mut self.nicks
    }

    pub fn who(&mut self) -> &mut Table<Vec<WhoResult>> {
        &mut self.who
    }

    pub fn whois(&mut self) -> &mut Table<Option<WhoisResult>> {
        &mut self.whois
    }

    pub fn ison(&mut self) -> &mut Table<Vec<String>> {
        &mut self.ison
    }

    /// Reserve the key for a new ISON request, queued behind earlier ones.
    pub fn next_ison_key(&mut self) -> String {
        self.ison_seq += 1;
        let key = format!("ison-{}", self.ison_seq);
        self.ison_order.push_back(key.clone());
        key
    }

    /// Take an ISON request that is no longer waiting out of the queue.
    pub fn forget_ison(&mut self, key: &str) {
        if !self.ison.is_pending(key) {
            self.ison_order.retain(|queued| queued != key);
        }
    }

    /// Hand a 303 reply to the oldest ISON still waiting.
    pub fn resolve_oldest_ison(&mut self, nicks: Vec<String>) -> bool {
        while let Some(key) = self.ison_order.pop_front() {
            if self.ison.is_pending(&key) {
                return self.ison.resolve_with(&key, nicks);
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut table: Table<Vec<u32>> = Table::default();
        table.register("#a".into(), Vec::new());
        assert!(table.is_pending("#a"));
        assert!(table.take_ready("#a").is_none());

        assert!(table.accumulate("#a", |v| v.push(1)));
        assert!(table.resolve("#a"));
        assert!(!table.accumulate("#a", |v| v.push(2)));

        assert_eq!(table.take_ready("#a"), Some(Ok(vec![1])));
        assert!(table.take_ready("#a").is_none());
    }

    #[test]
    fn test_reject() {
        let mut table: Table<()> = Table::default();
        assert!(!table.reject("#a", Rejection { numeric: 473, message: "no".into() }));
        table.register("#a".into(), ());
        assert!(table.reject("#a", Rejection { numeric: 473, message: "no".into() }));
        assert!(!table.resolve("#a"));
        assert_eq!(
            table.take_ready("#a"),
            Some(Err(Rejection { numeric: 473, message: "no".into() }))
        );
    }

    #[test]
    fn test_remove_keeps_late_outcome() {
        let mut table: Table<()> = Table::default();
        table.register("x".into(), ());
        assert_eq!(table.remove("x"), None);

        table.register("x".into(), ());
        table.resolve("x");
        assert_eq!(table.remove("x"), Some(Ok(())));
    }

    #[test]
    fn test_ison_fifo_skips_abandoned() {
        let mut c = Correlations::default();
        let first = c.next_ison_key();
        c.ison.register(first.clone(), Vec::new());
        let second = c.next_ison_key();
        c.ison.register(second.clone(), Vec::new());

        // The first request timed out and was dropped.
        c.ison.remove(&first);
        assert!(c.resolve_oldest_ison(vec!["a".into()]));
        assert_eq!(c.ison.take_ready(&second), Some(Ok(vec!["a".to_string()])));
        assert!(!c.resolve_oldest_ison(Vec::new()));
    }

    #[test]
    fn test_forgotten_ison_leaves_queue() {
        let mut c = Correlations::default();
        for _ in 0..3 {
            let key = c.next_ison_key();
            c.ison.register(key.clone(), Vec::new());
            c.ison.remove(&key);
            c.forget_ison(&key);
        }
        assert!(c.ison_order.is_empty());

        // A request still waiting stays queued.
        let live = c.next_ison_key();
        c.ison.register(live.clone(), Vec::new());
        c.forget_ison(&live);
        assert_eq!(c.ison_order.len(), 1);
    }
}
