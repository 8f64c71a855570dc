//! Pull-based sequence iteration and the growable item buffer.

use crate::runtime::{Error, QueryContext};
use crate::serialize::Serializer;
use crate::xdm::{Item, Sequence};

/// Lazy item sequence: single-pass, forward-only, no suspension points.
pub trait ItemIter {
    /// Next item, or `None` at the end of the sequence.
    fn next(&mut self) -> Result<Option<Item>, Error>;

    /// Declared or computed cardinality. A capacity hint only; unmaterialized
    /// sources may return `None` or an estimate.
    fn size_hint(&self) -> Option<usize> {
        None
    }

    /// Rewind to the first item. Returns false for sources that cannot be
    /// restarted (anything not backed by a materialized buffer).
    fn reset(&mut self) -> bool {
        false
    }

    /// The single admission point where a lazy source becomes an indexable,
    /// reusable structure. A source that already is a buffer returns itself.
    fn into_buffer(mut self: Box<Self>) -> Result<ItemBuffer, Error> {
        let mut buf = ItemBuffer::with_capacity(self.size_hint().unwrap_or(1));
        while let Some(it) = self.next()? {
            buf.add(it);
        }
        Ok(buf)
    }
}

/// Materialized item sequence with insertion-ordered append, geometric
/// capacity growth and a forward read cursor.
#[derive(Debug, Clone, Default)]
pub struct ItemBuffer {
    items: Vec<Item>,
    pos: usize,
}

impl ItemBuffer {
    pub fn new() -> Self {
        Self::with_capacity(1)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity.max(1)),
            pos: 0,
        }
    }

    pub fn from_items(items: Vec<Item>) -> Self {
        Self { items, pos: 0 }
    }

    pub fn add(&mut self, item: Item) {
        self.items.push(item);
    }

    /// Drains an iterator into this buffer.
    pub fn add_iter(&mut self, iter: &mut dyn ItemIter) -> Result<(), Error> {
        while let Some(it) = iter.next()? {
            self.add(it);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Random access; indices at or beyond `len()` are invalid.
    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    /// Structural equality: equal lengths and pairwise identical type tags
    /// with `eq`-equal values. A comparison failure counts as "not equal" —
    /// equality-testing code stays total.
    pub fn same(&self, other: &ItemBuffer) -> bool {
        self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(&other.items)
                .all(|(a, b)| a.same_type(b) && a.eq(b).unwrap_or(false))
    }

    /// Freeze into an immutable sequence.
    pub fn finish(self) -> Sequence {
        Sequence::from_items(self.items)
    }

    /// Emit every item between result boundaries, stopping early when the
    /// serializer reports it is finished.
    pub fn serialize(&self, ctx: &QueryContext, ser: &mut dyn Serializer) -> Result<(), Error> {
        for item in &self.items {
            if ser.finished() {
                break;
            }
            ser.open_result()?;
            item.serialize(ctx, ser)?;
            ser.close_result()?;
        }
        Ok(())
    }
}

impl ItemIter for ItemBuffer {
    fn next(&mut self) -> Result<Option<Item>, Error> {
        let item = self.items.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        Ok(item)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }

    fn reset(&mut self) -> bool {
        self.pos = 0;
        true
    }

    fn into_buffer(self: Box<Self>) -> Result<ItemBuffer, Error> {
        Ok(*self)
    }
}
