//! Stock number allocation and the uniqueness gate.
//!
//! Stock numbers are `REGION-NNNNN`, numbered per region from `00001`. A new
//! number is one past the highest sequence already issued for that region.
//! Within a batch the allocator keeps a running counter, so several new rows
//! get strictly increasing numbers without rescanning the store.

use std::collections::HashSet;

use landscout_common::{Record, StockNumber, StockNumberError, MAX_SEQUENCE, STOCK_NUMBER};

use crate::error::{Result, StoreError};

#[derive(Debug, Clone)]
pub struct IdentifierAllocator {
    region: String,
    last: u32,
}

impl IdentifierAllocator {
    /// Allocator seeded from the highest sequence issued for `region` in `existing`.
    pub fn seeded<'a>(region: &str, existing: impl IntoIterator<Item = &'a Record>) -> Self {
        let mut allocator = Self {
            region: region.to_string(),
            last: 0,
        };
        for record in existing {
            if let Some(sn) = record.stock_number() {
                allocator.observe(&sn);
            }
        }
        allocator
    }

    /// Next stock number for `region` given the records already stored.
    pub fn next(region: &str, existing: &[Record]) -> Result<StockNumber> {
        Self::seeded(region, existing).allocate()
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Account for a number issued elsewhere (e.g. supplied in the batch).
    pub fn observe(&mut self, stock_number: &StockNumber) {
        if stock_number.region() == self.region {
            self.last = self.last.max(stock_number.sequence());
        }
    }

    /// Issue the next number and advance the counter.
    pub fn allocate(&mut self) -> Result<StockNumber> {
        let sequence = self.last + 1;
        if sequence > MAX_SEQUENCE {
            return Err(StockNumberError::SequenceOverflow(sequence).into());
        }
        let stock_number = StockNumber::new(&self.region, sequence)?;
        self.last = sequence;
        Ok(stock_number)
    }
}

/// True when no two records share a stock number or identity key and every
/// stock number present is well formed.
pub fn validate_uniqueness(records: &[Record]) -> bool {
    check_uniqueness(records).is_ok()
}

/// Hard gate run before any table write. The first violation found is
/// returned; nothing is repaired.
pub fn check_uniqueness(records: &[Record]) -> Result<()> {
    let mut stock_numbers = HashSet::new();
    let mut keys = HashSet::new();

    for record in records {
        if let Some(raw) = record.get(STOCK_NUMBER) {
            let stock_number: StockNumber = raw.parse()?;
            if !stock_numbers.insert(stock_number.clone()) {
                return Err(StoreError::DuplicateIdentifier(stock_number.to_string()));
            }
        }
        if let Some(key) = record.identity_key() {
            if !keys.insert(key.clone()) {
                return Err(StoreError::DuplicateIdentityKey(key.to_string()));
            }
        }
    }
    Ok(())
}
