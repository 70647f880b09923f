//! Webhook URL normalization

use relay_core::TenantId;

/// Canonical webhook URL of a tenant: `<base>/<tenantId>`
#[must_use]
pub fn normalize_webhook_url(base: &str, tenant_id: &TenantId) -> String {
    format!("{}/{}", base.trim_end_matches('/'), tenant_id.as_str())
}
