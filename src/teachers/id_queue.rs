//! Owned id permutation with a consumption cursor.
//!
//! `order[..cursor]` holds the ids already sent for training, in send order.
//! `order[cursor..]` holds the unconsumed ids in future draw order. Batches
//! are always taken from the head of the unconsumed part.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdQueue {
    order: Vec<usize>,
    cursor: usize,
}

impl IdQueue {
    pub fn new(order: Vec<usize>) -> Self {
        IdQueue { order, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn consumed(&self) -> &[usize] {
        &self.order[..self.cursor]
    }

    pub fn remaining(&self) -> usize {
        self.order.len() - self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.order.len()
    }

    /// Move `front` to the head of the unconsumed ids, keeping the others in
    /// their current relative order.
    pub fn front_load(&mut self, front: &[usize]) {
        let tail = crate::sampler::front_load(front, &self.order[self.cursor..]);
        self.order.truncate(self.cursor);
        self.order.extend(tail);
    }

    /// Consume up to `n` ids.
    pub fn take(&mut self, n: usize) -> Vec<usize> {
        let end = self.cursor.saturating_add(n).min(self.order.len());
        let batch = self.order[self.cursor..end].to_vec();
        self.cursor = end;
        batch
    }

    /// Unconsumed ids between offsets `from` and `to` past the cursor,
    /// clipped to the queue. Nothing is consumed.
    pub fn peek(&self, from: usize, to: usize) -> &[usize] {
        let start = self.cursor.saturating_add(from).min(self.order.len());
        let end = self.cursor.saturating_add(to).min(self.order.len());
        if end <= start {
            return &[];
        }
        &self.order[start..end]
    }

    /// Resolve a query over the first `queried` unconsumed ids: `selected`
    /// is consumed now, the rest of the queue keeps its order, and
    /// `unselected` moves to the very end.
    pub fn commit_query(
        &mut self,
        selected: &[usize],
        queried: usize,
        unselected: &[usize],
    ) -> Vec<usize> {
        let queried = queried.min(self.remaining());
        debug_assert_eq!(selected.len() + unselected.len(), queried);
        let rest = self.order[self.cursor + queried..].to_vec();
        self.order.truncate(self.cursor);
        self.order.extend_from_slice(selected);
        self.order.extend(rest);
        self.order.extend_from_slice(unselected);
        self.take(selected.len())
    }
}
