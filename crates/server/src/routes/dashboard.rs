//! Dashboard page.
//!
//! Gated by [`require_dashboard_auth`](crate::middleware::require_dashboard_auth).
//! With gating skipped the page still renders for anonymous visitors, just
//! without any sites.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;

use crate::error::Result;
use crate::middleware::OptionalAuth;
use crate::state::AppState;

/// Site display data for templates.
#[derive(Clone)]
pub struct SiteView {
    pub site_name: String,
    pub address: String,
    pub created_at: String,
}

/// Dashboard page template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard/index.html")]
pub struct DashboardTemplate {
    pub email: Option<String>,
    pub signed_in: bool,
    pub sites: Vec<SiteView>,
}

/// Display the dashboard.
///
/// GET /dashboard
pub async fn index(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
) -> Result<DashboardTemplate> {
    let Some(user) = user else {
        return Ok(DashboardTemplate {
            email: None,
            signed_in: false,
            sites: Vec::new(),
        });
    };

    let store = state.store();
    let mut sites = Vec::new();
    for site in store.list_sites_for_user(&user.id).await? {
        let address = store
            .get_address(&site.address_id)
            .await?
            .map(|a| a.label())
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| site.address_id.to_string());
        sites.push(SiteView {
            site_name: site.site_name,
            address,
            created_at: site.created_at.format("%d %b %Y").to_string(),
        });
    }

    Ok(DashboardTemplate {
        email: user.email,
        signed_in: true,
        sites,
    })
}
