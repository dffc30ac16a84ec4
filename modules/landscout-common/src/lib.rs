pub mod coercion;
pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

pub use coercion::{coerce_number, format_number, parse_number};
pub use config::{AppConfig, FileConfig};
pub use error::{CoercionError, StockNumberError};
pub use metrics::{BaseMetric, RadiusBand, BASE_METRICS};
pub use types::*;
