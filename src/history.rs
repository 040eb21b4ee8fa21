//! History API

use log::debug;

use crate::string_list::StringList;

/// Bound on the number of retained history entries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HistoryLimit {
    /// Keep everything.
    #[default]
    Unlimited,
    /// Keep nothing; `add` is a no-op.
    Disabled,
    /// Keep at most this many entries, dropping the oldest.
    Capped(usize),
}

/// In-memory history with adjacent-duplicate suppression and a browse index.
///
/// While browsing, `index` points at the entry currently loaded into the
/// live buffer; `None` means the user is editing their own line.
#[derive(Debug, Default)]
pub struct History {
    entries: StringList,
    limit: HistoryLimit,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&str> {
        self.entries.get(i)
    }

    /// Change the bound, trimming the oldest entries to fit.
    /// `Capped(0)` is normalized to `Disabled` and clears the list.
    pub fn set_limit(&mut self, limit: HistoryLimit) {
        self.limit = match limit {
            HistoryLimit::Capped(0) => HistoryLimit::Disabled,
            other => other,
        };
        match self.limit {
            HistoryLimit::Capped(max) => {
                while self.entries.len() > max {
                    self.entries.pop_front();
                }
            }
            HistoryLimit::Disabled => self.entries.clear(),
            HistoryLimit::Unlimited => {}
        }
    }

    /// Append `entry`, skipping empty lines, duplicates of the previous
    /// entry, and the disabled state. Returns whether it was added.
    pub fn add(&mut self, entry: &str) -> bool {
        if entry.is_empty() || self.limit == HistoryLimit::Disabled {
            return false;
        }
        if self.entries.last() == Some(entry) {
            return false;
        }
        self.entries.push(entry);
        if let HistoryLimit::Capped(max) = self.limit {
            while self.entries.len() > max {
                self.entries.pop_front();
            }
        }
        debug!(target: "rawline", "history: {} entries", self.entries.len());
        true
    }

    // -- browsing ----------------------------------------------------------

    pub fn is_browsing(&self) -> bool {
        self.entries.index().is_some()
    }

    /// Step the browse position by `delta` without wrapping. The first step
    /// from a non-browsing state lands on the most recent entry. Returns the
    /// entry to load into the live buffer, or `None` when the history is
    /// empty.
    pub fn browse(&mut self, delta: isize) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        if self.entries.index().is_none() {
            self.entries.set_index(Some(self.entries.len() - 1));
        } else {
            self.entries.advance(delta, false);
        }
        self.entries.current()
    }

    /// Leave browse mode; the buffer keeps whatever it holds.
    pub fn end_browsing(&mut self) {
        self.entries.set_index(None);
    }
}

#[cfg(test)]
mod test {
    use super::{History, HistoryLimit};

    #[test]
    fn add_skips_empty_and_adjacent_duplicates() {
        let mut history = History::new();
        assert!(!history.add(""));
        assert!(history.add("one"));
        assert!(!history.add("one"));
        assert!(history.add("two"));
        assert!(history.add("one")); // non-adjacent duplicate is fine
        assert_eq!(3, history.len());
    }

    #[test]
    fn capped_drops_oldest() {
        let mut history = History::new();
        history.set_limit(HistoryLimit::Capped(2));
        history.add("one");
        history.add("two");
        history.add("three");
        assert_eq!(2, history.len());
        assert_eq!(Some("two"), history.get(0));
        assert_eq!(Some("three"), history.get(1));
    }

    #[test]
    fn shrinking_limit_trims_front() {
        let mut history = History::new();
        for s in ["a", "b", "c", "d"] {
            history.add(s);
        }
        history.set_limit(HistoryLimit::Capped(2));
        assert_eq!(2, history.len());
        assert_eq!(Some("c"), history.get(0));
    }

    #[test]
    fn zero_cap_disables() {
        let mut history = History::new();
        history.add("one");
        history.set_limit(HistoryLimit::Capped(0));
        assert!(history.is_empty());
        assert!(!history.add("two"));
    }

    #[test]
    fn browse_enters_at_last_entry() {
        let mut history = History::new();
        history.add("one");
        history.add("two");
        assert_eq!(Some("two"), history.browse(-1));
        assert_eq!(Some("one"), history.browse(-1));
        // clamped at the oldest entry
        assert_eq!(Some("one"), history.browse(-1));
        assert_eq!(Some("two"), history.browse(1));
        assert!(history.is_browsing());
        history.end_browsing();
        assert!(!history.is_browsing());
    }

    #[test]
    fn browse_empty_history() {
        let mut history = History::new();
        assert_eq!(None, history.browse(-1));
        assert!(!history.is_browsing());
    }
}
