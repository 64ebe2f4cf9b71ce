//! Application service: monitoring user provisioning.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! The admin session is closed on every path out of this module.

use anyhow::{Context, Result};

use crate::application::ports::{AdminSession, DatabaseAdmin, ProgressReporter, UserLookup};
use crate::domain::{ExistingUserPolicy, ProvisioningRequest};

/// What user provisioning ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserProvisioning {
    /// The user was created and granted the monitoring privileges.
    Created,
    /// The user was already there with the monitoring role; nothing issued.
    AlreadyPresent,
}

/// Ensure the monitoring user exists with the engine's privilege set.
///
/// # Errors
///
/// Returns an error if the session cannot be opened, a catalog query or the
/// create statement fails, the existing-user policy rejects an existing
/// user, or the session cannot be closed.
pub async fn provision_monitoring_user(
    database: &impl DatabaseAdmin,
    request: &ProvisioningRequest,
    reporter: &impl ProgressReporter,
) -> Result<UserProvisioning> {
    let engine = request.engine();
    let mut session = database
        .open(request)
        .await
        .with_context(|| format!("connecting to {engine} at {}", request.connection().host))?;

    let outcome = provision_in_session(&mut session, request, reporter).await;
    let closed = session.close().await.context("closing admin session");

    let provisioned = outcome?;
    closed?;
    Ok(provisioned)
}

async fn provision_in_session(
    session: &mut impl AdminSession,
    request: &ProvisioningRequest,
    reporter: &impl ProgressReporter,
) -> Result<UserProvisioning> {
    let user = &request.monitoring().username;
    let profile = request.profile();

    match session
        .lookup_user(user)
        .await
        .with_context(|| format!("looking up user \"{user}\""))?
    {
        UserLookup::Absent => {}
        UserLookup::Present { monitoring_role } => {
            return match request.existing_user_policy() {
                ExistingUserPolicy::ExistingIsFailure => {
                    anyhow::bail!("user \"{user}\" already exists")
                }
                ExistingUserPolicy::IdempotentOk if !monitoring_role => anyhow::bail!(
                    "user \"{user}\" exists but does not have the {} role",
                    profile.privileges.join(", ")
                ),
                ExistingUserPolicy::IdempotentOk => {
                    reporter.success(&format!("user \"{user}\" already exists"));
                    Ok(UserProvisioning::AlreadyPresent)
                }
            };
        }
    }

    session
        .create_monitoring_user(request.monitoring())
        .await
        .with_context(|| format!("creating user \"{user}\""))?;
    reporter.success(&format!(
        "user \"{user}\" created with {}",
        profile.privileges.join(", ")
    ));
    Ok(UserProvisioning::Created)
}
