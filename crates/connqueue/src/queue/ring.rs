/// A fixed-capacity circular buffer.
///
/// Slots are allocated once at construction; `head` is the read index and the
/// write index is derived from `head + len`.
pub(crate) struct Ring<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    len: usize,
}

impl<T> Ring<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
        }
    }

    pub(crate) const fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) const fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// Appends at the tail. Hands the item back if there is no room.
    pub(crate) fn push_back(&mut self, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        let tail = (self.head + self.len) % self.capacity();
        debug_assert!(self.slots[tail].is_none());
        self.slots[tail] = Some(item);
        self.len += 1;
        Ok(())
    }

    /// Removes the head, if any.
    pub(crate) fn pop_front(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let item = self.slots[self.head].take();
        debug_assert!(item.is_some());
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        item
    }

    /// Empties the ring, returning the remaining items in FIFO order.
    pub(crate) fn drain(&mut self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.len);
        while let Some(item) = self.pop_front() {
            items.push(item);
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::Ring;

    #[test]
    fn wraps_around_without_losing_order() {
        let mut ring = Ring::with_capacity(3);
        for round in 0..5 {
            let base = round * 10;
            assert!(ring.push_back(base).is_ok());
            assert!(ring.push_back(base + 1).is_ok());
            assert_eq!(ring.pop_front(), Some(base));
            assert!(ring.push_back(base + 2).is_ok());
            assert_eq!(ring.pop_front(), Some(base + 1));
            assert_eq!(ring.pop_front(), Some(base + 2));
            assert!(ring.is_empty());
        }
    }

    #[test]
    fn rejects_push_when_full() {
        let mut ring = Ring::with_capacity(2);
        assert!(ring.push_back('a').is_ok());
        assert!(ring.push_back('b').is_ok());
        assert!(ring.is_full());
        assert_eq!(ring.push_back('c'), Err('c'));
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn drain_returns_remaining_in_order() {
        let mut ring = Ring::with_capacity(4);
        for i in 0..4 {
            assert!(ring.push_back(i).is_ok());
        }
        assert_eq!(ring.pop_front(), Some(0));
        assert!(ring.push_back(4).is_ok());
        assert_eq!(ring.drain(), vec![1, 2, 3, 4]);
        assert!(ring.is_empty());
        assert_eq!(ring.capacity(), 4);
    }
}
