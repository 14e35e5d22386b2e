//! Reconcile engine
//!
//! One call converges one resource. Every pass starts from a fresh read of
//! the server; nothing computed by an earlier pass is reused.

use super::client::ClientPass;
use super::realm::RealmPass;
use super::secrets::SecretProbe;
use crate::domain::{ClientResource, PassReport, RealmResource, ReconcileOutcome};
use crate::error::{AppError, Result};
use crate::keycloak::KeycloakAdmin;
use crate::telemetry::metrics as kc_metrics;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub struct ReconcileEngine {
    admin: Arc<dyn KeycloakAdmin>,
    secrets: Arc<dyn SecretProbe>,
}

fn finish(
    kind: &'static str,
    result: Result<()>,
    report: PassReport,
    secondary_resources: BTreeMap<String, Vec<String>>,
    unmanaged: Vec<String>,
) -> ReconcileOutcome {
    kc_metrics::record_mutations(&report);
    let report = match result {
        Ok(()) => {
            kc_metrics::record_reconcile_pass(kind, "reconciled");
            info!(mutations = report.mutations(), "Reconcile pass succeeded");
            Ok(report)
        }
        Err(e) => {
            kc_metrics::record_reconcile_pass(kind, "failing");
            warn!(error = %e, mutations = report.mutations(), "Reconcile pass failed");
            Err(e)
        }
    };
    ReconcileOutcome {
        report,
        secondary_resources,
        unmanaged,
    }
}

impl ReconcileEngine {
    pub fn new(admin: Arc<dyn KeycloakAdmin>, secrets: Arc<dyn SecretProbe>) -> Self {
        Self { admin, secrets }
    }

    /// Converge one client of `realm` to its desired state
    #[instrument(skip_all, fields(realm = %realm, client_id = %resource.client_id()))]
    pub async fn reconcile_client(&self, realm: &str, resource: &ClientResource) -> ReconcileOutcome {
        let mut pass = ClientPass::new(self.admin.as_ref(), self.secrets.as_ref(), realm, resource);
        let result = pass.run().await;
        finish(
            "client",
            result,
            pass.report,
            pass.secondary_resources,
            pass.unmanaged,
        )
    }

    /// Remove the client; an absent client is already deleted
    #[instrument(skip_all, fields(realm = %realm, client_id = %resource.client_id()))]
    pub async fn delete_client(&self, realm: &str, resource: &ClientResource) -> Result<PassReport> {
        let mut report = PassReport::default();
        let Some(client) = self.admin.find_client(realm, resource.client_id()).await? else {
            info!("Client already absent");
            return Ok(report);
        };
        let client_uuid = client.id.ok_or_else(|| {
            AppError::from(anyhow::anyhow!("Client {} has no id", resource.client_id()))
        })?;
        self.admin.delete_client(realm, &client_uuid).await?;
        report.deleted += 1;
        kc_metrics::record_mutations(&report);
        info!(%client_uuid, "Deleted client");
        Ok(report)
    }

    /// Converge a realm and, when listed, its realm roles
    #[instrument(skip_all, fields(realm = %resource.realm_name()))]
    pub async fn reconcile_realm(&self, resource: &RealmResource) -> ReconcileOutcome {
        let mut pass = RealmPass::new(self.admin.as_ref(), resource);
        let result = pass.run().await;
        finish(
            "realm",
            result,
            pass.report,
            resource.status.secondary_resources.clone(),
            Vec::new(),
        )
    }

    /// Remove the realm; an absent realm is already deleted
    #[instrument(skip_all, fields(realm = %resource.realm_name()))]
    pub async fn delete_realm(&self, resource: &RealmResource) -> Result<PassReport> {
        let mut report = PassReport::default();
        if self.admin.get_realm(resource.realm_name()).await?.is_none() {
            info!("Realm already absent");
            return Ok(report);
        }
        self.admin.delete_realm(resource.realm_name()).await?;
        report.deleted += 1;
        kc_metrics::record_mutations(&report);
        info!("Deleted realm");
        Ok(report)
    }
}
