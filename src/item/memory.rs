use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
};

use crate::core::item::{ItemReader, ItemReaderResult, ItemWriter, ItemWriterResult};

/// Reads items from a list held in memory.
///
/// Used to hand the rows of an upstream step to a tasklet.
pub struct InMemoryItemReader<T> {
    items: RefCell<VecDeque<T>>,
}

impl<T> InMemoryItemReader<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: RefCell::new(items.into()),
        }
    }

    /// Number of items not read yet.
    pub fn remaining(&self) -> usize {
        self.items.borrow().len()
    }
}

impl<T> ItemReader<T> for InMemoryItemReader<T> {
    fn read(&self) -> ItemReaderResult<T> {
        Ok(self.items.borrow_mut().pop_front())
    }
}

/// Collects written items in memory.
pub struct InMemoryItemWriter<T> {
    items: RefCell<Vec<T>>,
    opened: Cell<u32>,
    closed: Cell<u32>,
}

impl<T: Clone> Default for InMemoryItemWriter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> InMemoryItemWriter<T> {
    pub fn new() -> Self {
        Self {
            items: RefCell::new(Vec::new()),
            opened: Cell::new(0),
            closed: Cell::new(0),
        }
    }

    /// Copy of every item written so far.
    pub fn items(&self) -> Vec<T> {
        self.items.borrow().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.opened.get() > 0 && self.opened.get() == self.closed.get()
    }
}

impl<T: Clone> ItemWriter<T> for InMemoryItemWriter<T> {
    fn write(&self, items: &[T]) -> ItemWriterResult {
        self.items.borrow_mut().extend_from_slice(items);
        Ok(())
    }

    fn open(&self) -> ItemWriterResult {
        self.opened.set(self.opened.get() + 1);
        Ok(())
    }

    fn close(&self) -> ItemWriterResult {
        self.closed.set(self.closed.get() + 1);
        Ok(())
    }
}
