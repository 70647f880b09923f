//! Value objects - immutable types that represent domain concepts

mod tenant_id;

pub use tenant_id::{TenantId, TenantIdError};
