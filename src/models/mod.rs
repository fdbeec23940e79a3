mod price_point;
mod technical_record;

pub use price_point::{sort_descending, ImportPrices, PricePoint};
pub use technical_record::{DateFailure, RefreshSummary, TechnicalBatch, TechnicalRecord};
