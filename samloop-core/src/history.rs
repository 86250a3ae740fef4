//! Version history
//!
//! An ordered log of state snapshots plus a cursor pointing at the current
//! entry. Undo and redo move the cursor; they never replay actions.
//! Recording after an undo drops every entry beyond the cursor first, the
//! usual linear-history rule.
//!
//! The history is never empty: the initial state is entry zero, so the
//! cursor always lies in `[0, len - 1]`.

use crate::codec::{PersistedEntry, PersistedHistory, StateCodec};
use crate::error::{CodecError, HistoryBoundsError};
use crate::state::{Fingerprint, State};
use chrono::{DateTime, Utc};
use samloop_types::Sequence;
use serde::Serialize;
use std::collections::VecDeque;

/// One recorded snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct VersionEntry {
    pub sequence: Sequence,
    pub state: State,
    pub timestamp: DateTime<Utc>,
}

impl VersionEntry {
    pub fn fingerprint(&self) -> Fingerprint {
        self.state.fingerprint()
    }
}

/// Introspection record for one entry, without the state payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionSummary {
    pub sequence: Sequence,
    pub timestamp: DateTime<Utc>,
    /// True for the entry under the cursor
    pub current: bool,
}

/// Snapshot log with an undo/redo cursor
#[derive(Debug, Clone)]
pub struct VersionHistory {
    entries: VecDeque<VersionEntry>,
    cursor: usize,
    next_sequence: Sequence,
    limit: Option<usize>,
}

impl VersionHistory {
    /// Start a history whose first entry is `initial`
    pub fn new(initial: State) -> Self {
        Self::with_limit(initial, None)
    }

    /// Start a history that keeps at most `limit` entries
    ///
    /// A limit of zero is treated as one: the current entry is always kept.
    pub fn with_limit(initial: State, limit: Option<usize>) -> Self {
        let mut entries = VecDeque::new();
        entries.push_back(VersionEntry {
            sequence: Sequence::GENESIS,
            state: initial,
            timestamp: Utc::now(),
        });
        Self {
            entries,
            cursor: 0,
            next_sequence: Sequence::GENESIS.next(),
            limit: limit.map(|n| n.max(1)),
        }
    }

    /// Append `state` after truncating any redoable entries
    pub fn record(&mut self, state: State) -> Sequence {
        let truncated = self.entries.len() - (self.cursor + 1);
        if truncated > 0 {
            self.entries.truncate(self.cursor + 1);
            tracing::debug!(truncated, "discarded redo branch");
        }

        let sequence = self.next_sequence;
        self.next_sequence = sequence.next();
        self.entries.push_back(VersionEntry {
            sequence,
            state,
            timestamp: Utc::now(),
        });
        self.cursor = self.entries.len() - 1;
        self.enforce_limit();
        sequence
    }

    /// Evict the oldest entries, then redoable ones, until the limit holds
    ///
    /// The entry under the cursor is never evicted.
    fn enforce_limit(&mut self) {
        let Some(limit) = self.limit else {
            return;
        };
        while self.entries.len() > limit && self.cursor > 0 {
            self.entries.pop_front();
            self.cursor -= 1;
        }
        if self.entries.len() > limit {
            let dropped = self.entries.len() - limit;
            self.entries.truncate(limit);
            tracing::debug!(dropped, "evicted redoable entries to honor history limit");
        }
    }

    /// Step back one entry
    pub fn undo(&mut self) -> Result<&State, HistoryBoundsError> {
        if self.cursor == 0 {
            return Err(HistoryBoundsError::AtOldest);
        }
        self.cursor -= 1;
        Ok(&self.entries[self.cursor].state)
    }

    /// Step forward one entry
    pub fn redo(&mut self) -> Result<&State, HistoryBoundsError> {
        if self.cursor + 1 >= self.entries.len() {
            return Err(HistoryBoundsError::AtNewest);
        }
        self.cursor += 1;
        Ok(&self.entries[self.cursor].state)
    }

    /// Move the cursor to the entry with `sequence`
    pub fn goto(&mut self, sequence: Sequence) -> Option<&State> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.sequence == sequence)?;
        self.cursor = index;
        Some(&self.entries[index].state)
    }

    /// Entry under the cursor
    pub fn current(&self) -> &VersionEntry {
        &self.entries[self.cursor]
    }

    pub fn current_state(&self) -> &State {
        &self.current().state
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn entries(&self) -> impl Iterator<Item = &VersionEntry> {
        self.entries.iter()
    }

    /// Sequence numbers and timestamps, oldest first
    pub fn summaries(&self) -> Vec<VersionSummary> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| VersionSummary {
                sequence: entry.sequence,
                timestamp: entry.timestamp,
                current: i == self.cursor,
            })
            .collect()
    }

    /// Serialize every entry with `codec`
    pub fn export<C: StateCodec + ?Sized>(&self, codec: &C) -> Result<PersistedHistory, CodecError> {
        let entries = self
            .entries
            .iter()
            .map(|entry| {
                Ok(PersistedEntry {
                    sequence: entry.sequence,
                    timestamp: entry.timestamp,
                    bytes: codec.encode(&entry.state)?,
                })
            })
            .collect::<Result<Vec<_>, CodecError>>()?;
        Ok(PersistedHistory {
            cursor: self.cursor,
            entries,
        })
    }

    /// Rebuild a history from persisted entries
    ///
    /// Sequence numbers must be strictly increasing and the cursor must
    /// point at an existing entry. New records continue after the last
    /// persisted sequence number.
    pub fn restore<C: StateCodec + ?Sized>(
        persisted: &PersistedHistory,
        codec: &C,
        limit: Option<usize>,
    ) -> Result<Self, CodecError> {
        let len = persisted.entries.len();
        if len == 0 {
            return Err(CodecError::Empty);
        }
        if persisted.cursor >= len {
            return Err(CodecError::CursorOutOfRange {
                cursor: persisted.cursor,
                len,
            });
        }

        let mut entries = VecDeque::with_capacity(len);
        let mut previous: Option<Sequence> = None;
        for record in &persisted.entries {
            if let Some(prev) = previous {
                if record.sequence <= prev {
                    return Err(CodecError::OutOfOrder {
                        previous: prev.as_u64(),
                        found: record.sequence.as_u64(),
                    });
                }
            }
            previous = Some(record.sequence);
            entries.push_back(VersionEntry {
                sequence: record.sequence,
                state: codec.decode(&record.bytes)?,
                timestamp: record.timestamp,
            });
        }

        let next_sequence = previous.unwrap_or(Sequence::GENESIS).next();
        let mut history = Self {
            entries,
            cursor: persisted.cursor,
            next_sequence,
            limit: limit.map(|n| n.max(1)),
        };
        history.enforce_limit();
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use serde_json::json;

    fn count(n: i64) -> State {
        State::from_fields([("count", json!(n))])
    }

    fn counts(history: &VersionHistory) -> Vec<i64> {
        history
            .entries()
            .map(|e| e.state.get_i64("count").unwrap())
            .collect()
    }

    #[test]
    fn test_initial_entry() {
        let history = VersionHistory::new(count(0));
        assert_eq!(history.len(), 1);
        assert_eq!(history.cursor(), 0);
        assert_eq!(history.current().sequence, Sequence::GENESIS);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_undo_redo_bounds() {
        let mut history = VersionHistory::new(count(0));
        assert_eq!(history.undo(), Err(HistoryBoundsError::AtOldest));
        assert_eq!(history.redo(), Err(HistoryBoundsError::AtNewest));

        history.record(count(1));
        assert_eq!(history.undo().unwrap().get_i64("count"), Some(0));
        assert_eq!(history.redo().unwrap().get_i64("count"), Some(1));
        assert_eq!(history.redo(), Err(HistoryBoundsError::AtNewest));
    }

    #[test]
    fn test_record_after_undo_truncates() {
        let mut history = VersionHistory::new(count(0));
        for n in 1..=3 {
            history.record(count(n));
        }
        history.undo().unwrap();
        history.undo().unwrap();
        assert_eq!(history.current_state().get_i64("count"), Some(1));

        let seq = history.record(count(0));
        assert_eq!(counts(&history), vec![0, 1, 0]);
        assert!(!history.can_redo());
        // sequence numbers are not reused after truncation
        assert_eq!(seq, Sequence(4));
    }

    #[test]
    fn test_summaries_mark_cursor() {
        let mut history = VersionHistory::new(count(0));
        history.record(count(1));
        history.record(count(2));
        history.undo().unwrap();

        let summaries = history.summaries();
        let current: Vec<bool> = summaries.iter().map(|s| s.current).collect();
        assert_eq!(current, vec![false, true, false]);
        assert!(summaries.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }

    #[test]
    fn test_limit_evicts_oldest() {
        let mut history = VersionHistory::with_limit(count(0), Some(3));
        for n in 1..=5 {
            history.record(count(n));
        }
        assert_eq!(counts(&history), vec![3, 4, 5]);
        assert_eq!(history.cursor(), 2);
        assert_eq!(history.entries().next().unwrap().sequence, Sequence(3));
    }

    #[test]
    fn test_goto() {
        let mut history = VersionHistory::new(count(0));
        history.record(count(1));
        history.record(count(2));

        assert_eq!(history.goto(Sequence(1)).unwrap().get_i64("count"), Some(1));
        assert_eq!(history.cursor(), 1);
        assert!(history.goto(Sequence(42)).is_none());
        assert_eq!(history.cursor(), 1);
    }

    #[test]
    fn test_export_restore() {
        let mut history = VersionHistory::new(count(0));
        history.record(count(1));
        history.record(count(2));
        history.undo().unwrap();

        let persisted = history.export(&JsonCodec).unwrap();
        let mut restored = VersionHistory::restore(&persisted, &JsonCodec, None).unwrap();

        assert_eq!(counts(&restored), vec![0, 1, 2]);
        assert_eq!(restored.cursor(), 1);
        assert_eq!(restored.summaries(), history.summaries());

        restored.redo().unwrap();
        assert_eq!(restored.record(count(3)), Sequence(3));
    }

    #[test]
    fn test_restore_with_limit_keeps_current_entry() {
        let mut history = VersionHistory::new(count(0));
        for n in 1..=4 {
            history.record(count(n));
        }
        for _ in 0..4 {
            history.undo().unwrap();
        }
        let persisted = history.export(&JsonCodec).unwrap();

        let mut restored = VersionHistory::restore(&persisted, &JsonCodec, Some(2)).unwrap();
        assert_eq!(restored.current_state().get_i64("count"), Some(0));
        assert_eq!(restored.current().sequence, Sequence::GENESIS);
        assert_eq!(counts(&restored), vec![0, 1]);
        assert_eq!(restored.cursor(), 0);

        // numbering continues past the evicted tail
        restored.redo().unwrap();
        assert_eq!(restored.record(count(9)), Sequence(5));
    }

    #[test]
    fn test_restore_with_limit_drops_oldest_before_cursor() {
        let mut history = VersionHistory::new(count(0));
        for n in 1..=4 {
            history.record(count(n));
        }
        history.undo().unwrap();
        let persisted = history.export(&JsonCodec).unwrap();

        let restored = VersionHistory::restore(&persisted, &JsonCodec, Some(2)).unwrap();
        assert_eq!(counts(&restored), vec![3, 4]);
        assert_eq!(restored.current_state().get_i64("count"), Some(3));
        assert!(!restored.can_undo());
        assert!(restored.can_redo());
    }

    #[test]
    fn test_restore_rejects_bad_logs() {
        let empty = PersistedHistory {
            cursor: 0,
            entries: vec![],
        };
        assert_eq!(
            VersionHistory::restore(&empty, &JsonCodec, None).unwrap_err(),
            CodecError::Empty
        );

        let mut history = VersionHistory::new(count(0));
        history.record(count(1));
        let mut persisted = history.export(&JsonCodec).unwrap();
        persisted.entries.swap(0, 1);
        assert!(matches!(
            VersionHistory::restore(&persisted, &JsonCodec, None),
            Err(CodecError::OutOfOrder { previous: 1, found: 0 })
        ));

        let mut persisted = history.export(&JsonCodec).unwrap();
        persisted.cursor = 9;
        assert!(matches!(
            VersionHistory::restore(&persisted, &JsonCodec, None),
            Err(CodecError::CursorOutOfRange { cursor: 9, len: 2 })
        ));
    }
}
