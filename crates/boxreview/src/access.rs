//! Tenant gate for page images.
//!
//! Group memberships come from the identity provider. A caller sees a
//! tenant's images through the `admin` group or one of the tenant's
//! `tenant_<id>_viewer` / `tenant_<id>_reviewer` groups.

use std::time::Duration;

use crate::error::ReviewError;
use crate::review::Page;

pub const ADMIN_GROUP: &str = "admin";

/// Lifetime of a signed image URL.
pub const IMAGE_URL_TTL: Duration = Duration::from_secs(300);

/// Issues short-lived retrieval URLs for stored page images.
pub trait ImageUrlSigner: Send + Sync {
    fn signed_url(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

/// Returns true if `groups` grant access to `tenant_id`'s images.
pub fn has_tenant_access(groups: &[String], tenant_id: &str) -> bool {
    let viewer = format!("tenant_{tenant_id}_viewer");
    let reviewer = format!("tenant_{tenant_id}_reviewer");
    groups
        .iter()
        .any(|g| g == ADMIN_GROUP || *g == viewer || *g == reviewer)
}

/// Checks group membership and that `key` lives under the tenant prefix.
pub fn check_image_access(
    groups: &[String],
    tenant_id: &str,
    key: &str,
) -> Result<(), ReviewError> {
    if !has_tenant_access(groups, tenant_id) {
        return Err(ReviewError::AccessDenied(format!(
            "no group grants access to tenant {tenant_id}"
        )));
    }
    // Keys of every tenant share one namespace.
    if tenant_id.is_empty() || !key.starts_with(&format!("{tenant_id}/")) {
        return Err(ReviewError::AccessDenied(format!(
            "key {key} does not belong to tenant {tenant_id}"
        )));
    }
    Ok(())
}

/// Signs the image URL of `page` after checking access.
pub fn page_image_url(
    signer: &dyn ImageUrlSigner,
    page: &Page,
    groups: &[String],
) -> Result<String, ReviewError> {
    check_image_access(groups, &page.tenant_id, &page.image_key)?;
    signer
        .signed_url(&page.image_key, IMAGE_URL_TTL)
        .map_err(|e| {
            log::error!("Failed to sign image URL for page {}: {}", page.id, e);
            ReviewError::ImageUrl(e.to_string())
        })
}
