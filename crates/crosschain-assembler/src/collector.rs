use crate::error::{Error, Result};
use ckb_types::{bytes::Bytes, packed::Script};
use crosschain_traits::{Ledger, LedgerError, LiveCell};
use log::debug;
use std::collections::VecDeque;

pub const DEFAULT_PAGE_SIZE: u32 = 64;

/// Lazy stream over the plain cells of a lock. Pages are fetched only when
/// the buffered ones run out.
pub struct LiveCells<'a, L: Ledger> {
    ledger: &'a L,
    lock: Script,
    page_size: u32,
    buffer: VecDeque<LiveCell>,
    cursor: Option<Bytes>,
    exhausted: bool,
}

impl<'a, L: Ledger> LiveCells<'a, L> {
    pub fn new(ledger: &'a L, lock: Script, page_size: u32) -> Self {
        Self {
            ledger,
            lock,
            page_size,
            buffer: VecDeque::new(),
            cursor: None,
            exhausted: false,
        }
    }
}

impl<'a, L: Ledger> Iterator for LiveCells<'a, L> {
    type Item = Result<LiveCell, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(cell) = self.buffer.pop_front() {
            return Some(Ok(cell));
        }
        if self.exhausted {
            return None;
        }
        let page = match self
            .ledger
            .live_cells_by_lock(&self.lock, self.page_size, self.cursor.take())
        {
            Ok(page) => page,
            Err(e) => {
                self.exhausted = true;
                return Some(Err(e));
            }
        };
        debug!("fetched a page of {} live cells", page.cells.len());
        if page.cells.is_empty() || page.cursor.is_none() {
            self.exhausted = true;
        }
        self.cursor = page.cursor;
        self.buffer.extend(page.cells);
        self.buffer.pop_front().map(Ok)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collected {
    pub cells: Vec<LiveCell>,
    pub capacity: u64,
}

/// Takes cells in stream order until their capacity reaches `target`, and
/// not a single cell more.
pub fn collect_capacity<I>(cells: I, target: u64) -> Result<Collected>
where
    I: IntoIterator<Item = Result<LiveCell, LedgerError>>,
{
    let mut collected = Collected::default();
    if target == 0 {
        return Ok(collected);
    }
    for cell in cells {
        let cell = cell?;
        collected.capacity = collected
            .capacity
            .checked_add(cell.capacity())
            .ok_or(Error::CapacityOverflow)?;
        collected.cells.push(cell);
        if collected.capacity >= target {
            return Ok(collected);
        }
    }
    Err(Error::InsufficientBalance {
        required: target,
        collected: collected.capacity,
        shortfall: target - collected.capacity,
    })
}

pub struct CellCollector<'a, L: Ledger> {
    ledger: &'a L,
    page_size: u32,
}

impl<'a, L: Ledger> CellCollector<'a, L> {
    pub fn new(ledger: &'a L, page_size: u32) -> Self {
        Self { ledger, page_size }
    }

    pub fn collect(&self, lock: &Script, target: u64) -> Result<Collected> {
        let collected = collect_capacity(
            LiveCells::new(self.ledger, lock.clone(), self.page_size),
            target,
        )?;
        debug!(
            "collected {} cells holding {} shannons for a target of {}",
            collected.cells.len(),
            collected.capacity,
            target
        );
        Ok(collected)
    }
}
