//! Database models with SQLx `FromRow` derives

mod credential;
mod session_record;

pub use credential::CredentialModel;
pub use session_record::SessionRecordModel;
