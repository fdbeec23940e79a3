pub mod price_queries;
pub mod technical_queries;
