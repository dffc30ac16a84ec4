use thiserror::Error;

/// A cell that is neither a number nor a recognised "not available" marker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unparseable numeric value: {raw:?}")]
pub struct CoercionError {
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockNumberError {
    #[error("stock number {0:?} does not match REGION-NNNNN")]
    Malformed(String),

    #[error("region code {0:?} must be non-empty and alphanumeric")]
    InvalidRegion(String),

    #[error("sequence {0} does not fit in five digits")]
    SequenceOverflow(u32),
}
