//! Entity <-> Model mappers

mod credential;
mod session_record;

pub use session_record::SessionRecordInsert;
