//! In-memory ledger for tests and embedding

use crate::error::Result;
use crate::ledger::{Ledger, LedgerRecord};
use std::cell::RefCell;

/// Ledger that keeps its rows in a `Vec`
#[derive(Debug)]
pub struct MemoryLedger<R> {
    rows: RefCell<Vec<R>>,
}

impl<R> Default for MemoryLedger<R> {
    fn default() -> Self {
        Self {
            rows: RefCell::new(Vec::new()),
        }
    }
}

impl<R: Clone> MemoryLedger<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<R>) -> Self {
        Self {
            rows: RefCell::new(rows),
        }
    }

    pub fn rows(&self) -> Vec<R> {
        self.rows.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.rows.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.borrow().is_empty()
    }
}

impl<R: LedgerRecord + Clone> Ledger<R> for MemoryLedger<R> {
    fn scan(&self, visit: &mut dyn FnMut(R)) -> Result<()> {
        // Clone first so a visitor may append without a double borrow
        let rows = self.rows.borrow().clone();
        rows.into_iter().for_each(|row| visit(row));
        Ok(())
    }

    fn append(&self, record: &R) -> Result<()> {
        self.rows.borrow_mut().push(record.clone());
        Ok(())
    }
}
