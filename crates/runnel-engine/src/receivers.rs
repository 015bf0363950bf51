//! Weighted receiver list: an associative, self-pruning singly-linked
//! structure mapping receiver identities to integer weights.
//!
//! The list is an intrusive chain over a `HashMap` arena, rooted at the
//! sentinel [`AccountId::ROOT`]. Inserts splice right after the sentinel in
//! O(1); traversal order is undefined and irrelevant. A weight of zero
//! logically removes an entry, but the entry stays in the arena until a
//! pruning traversal walks past it — this keeps every write O(1) while
//! restoring O(live) iteration lazily.

use std::collections::HashMap;

use runnel_core::error::ListError;
use runnel_core::types::AccountId;

#[derive(Clone, Copy, Debug)]
struct WeightEntry {
    weight: u32,
    next: AccountId,
}

/// A weighted receiver list owned by one sender or proxy.
///
/// Invariant: every attached entry is reachable from the sentinel, and
/// `total_weight` equals the sum of all attached weights (including
/// zero-weight entries awaiting pruning, which contribute nothing).
#[derive(Clone, Debug)]
pub struct WeightedList {
    entries: HashMap<AccountId, WeightEntry>,
    /// Next pointer of the sentinel. `ROOT` when the list is empty.
    root_next: AccountId,
    total_weight: u64,
}

impl Default for WeightedList {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            root_next: AccountId::ROOT,
            total_weight: 0,
        }
    }
}

impl WeightedList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of all stored weights.
    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Whether no live (non-zero-weight) entry exists.
    pub fn is_empty(&self) -> bool {
        self.total_weight == 0
    }

    /// Number of physically attached entries, pruned or not.
    pub fn attached_len(&self) -> usize {
        self.entries.len()
    }

    /// Assign `weight` to `receiver`, returning the previous weight
    /// (0 if the receiver was not attached).
    ///
    /// A previously-unattached receiver is spliced in right after the
    /// sentinel on its first non-zero assignment; assigning 0 to an
    /// unattached receiver is a no-op.
    ///
    /// # Errors
    ///
    /// [`ListError::InvalidIdentity`] if `receiver` is the sentinel.
    pub fn set_weight(&mut self, receiver: AccountId, weight: u32) -> Result<u32, ListError> {
        if receiver.is_root() {
            return Err(ListError::InvalidIdentity);
        }
        if let Some(entry) = self.entries.get_mut(&receiver) {
            let prev = entry.weight;
            let new_total = (self.total_weight - u64::from(prev))
                .checked_add(u64::from(weight))
                .ok_or(ListError::ArithmeticOverflow)?;
            entry.weight = weight;
            self.total_weight = new_total;
            return Ok(prev);
        }
        if weight == 0 {
            return Ok(0);
        }
        self.total_weight = self
            .total_weight
            .checked_add(u64::from(weight))
            .ok_or(ListError::ArithmeticOverflow)?;
        self.entries.insert(
            receiver,
            WeightEntry {
                weight,
                next: self.root_next,
            },
        );
        self.root_next = receiver;
        Ok(0)
    }

    /// Current weight of `receiver` (0 if not attached).
    pub fn weight_of(&self, receiver: &AccountId) -> u32 {
        self.entries.get(receiver).map(|e| e.weight).unwrap_or(0)
    }

    fn next_of(&self, cursor: &AccountId) -> Result<AccountId, ListError> {
        if cursor.is_root() {
            return Ok(self.root_next);
        }
        self.entries
            .get(cursor)
            .map(|e| e.next)
            .ok_or_else(|| ListError::UnknownCursor(cursor.to_string()))
    }

    fn link_next(&mut self, at: &AccountId, to: AccountId) {
        if at.is_root() {
            self.root_next = to;
        } else if let Some(entry) = self.entries.get_mut(at) {
            entry.next = to;
        }
    }

    /// Advance from `cursor` to the next entry with non-zero weight,
    /// read-only. Returns the sentinel to signal end-of-list.
    ///
    /// # Errors
    ///
    /// [`ListError::UnknownCursor`] if `cursor` is neither the sentinel nor
    /// an attached entry.
    pub fn next_weight(&self, cursor: &AccountId) -> Result<(AccountId, u32), ListError> {
        let mut current = self.next_of(cursor)?;
        while !current.is_root() {
            let entry = self
                .entries
                .get(&current)
                .ok_or_else(|| ListError::UnknownCursor(current.to_string()))?;
            if entry.weight != 0 {
                return Ok((current, entry.weight));
            }
            current = entry.next;
        }
        Ok((AccountId::ROOT, 0))
    }

    /// Same traversal as [`next_weight`](Self::next_weight), but unlinks and
    /// deletes every zero-weight entry encountered along the way.
    ///
    /// A full traversal from sentinel to sentinel removes every
    /// currently-zero-weighted entry. Partial traversals must hand their
    /// exact cursor to the next caller; two pruning traversals never run
    /// concurrently over the same list.
    pub fn next_weight_pruning(
        &mut self,
        cursor: &AccountId,
    ) -> Result<(AccountId, u32), ListError> {
        let prev = *cursor;
        let mut current = self.next_of(&prev)?;
        while !current.is_root() {
            let entry = *self
                .entries
                .get(&current)
                .ok_or_else(|| ListError::UnknownCursor(current.to_string()))?;
            if entry.weight != 0 {
                return Ok((current, entry.weight));
            }
            self.entries.remove(&current);
            self.link_next(&prev, entry.next);
            current = entry.next;
        }
        Ok((AccountId::ROOT, 0))
    }

    /// All live entries, read-only, in traversal order.
    pub fn live(&self) -> Vec<(AccountId, u32)> {
        let mut out = Vec::new();
        let mut cursor = AccountId::ROOT;
        // Structure invariants make the traversal infallible from ROOT.
        while let Ok((id, weight)) = self.next_weight(&cursor) {
            if id.is_root() {
                break;
            }
            out.push((id, weight));
            cursor = id;
        }
        out
    }

    /// All live entries, pruning every zero-weight entry on the way.
    pub fn live_pruning(&mut self) -> Vec<(AccountId, u32)> {
        let mut out = Vec::new();
        let mut cursor = AccountId::ROOT;
        while let Ok((id, weight)) = self.next_weight_pruning(&cursor) {
            if id.is_root() {
                break;
            }
            out.push((id, weight));
            cursor = id;
        }
        out
    }
}
