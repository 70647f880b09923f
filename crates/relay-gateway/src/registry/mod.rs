//! Instance registry - the set of live sessions and their persisted records

mod manager;
mod normalize;
mod records;

pub use manager::{InstanceRegistry, StatusCounts};
pub use normalize::normalize_webhook_url;
pub use records::{LocalRecordFile, RecordOrigin, RecordStore};
