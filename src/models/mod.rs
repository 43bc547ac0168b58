pub mod analytics;
pub mod query_options;
pub mod response;
pub mod row;
pub mod wide_record;

pub use analytics::*;
pub use query_options::*;
pub use response::*;
pub use row::*;
pub use wide_record::*;
