//! Account linking.
//!
//! Email is the identity key across providers: a login either finds the
//! user with that email or creates one. Provider details are written once,
//! by the first federated login that finds them empty, and never replaced.

use std::sync::Arc;
use tracing::{debug, error, info};

use super::models::{FederatedIdentity, User};
use super::store::{InsertOutcome, UserStore};
use crate::common::safe_email_log;
use crate::services::Notifier;

#[derive(Clone)]
pub struct AccountLinker {
    store: UserStore,
    notifier: Arc<dyn Notifier>,
}

impl AccountLinker {
    pub fn new(store: UserStore, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Resolve `identity` to a stored user. The flag is true only when this
    /// call created the record.
    pub async fn link_or_create(
        &self,
        identity: &FederatedIdentity,
    ) -> Result<(User, bool), sqlx::Error> {
        if let Some(user) = self.store.find_by_email(&identity.email).await? {
            return Ok((self.resolve_existing(user, identity).await?, false));
        }

        match self.store.insert(identity).await? {
            InsertOutcome::Created(user) => {
                info!(
                    user_id = %user.id,
                    email = %safe_email_log(&user.email),
                    provider = %identity.provider,
                    "Created new user via federated login"
                );
                self.dispatch_welcome(&user);
                Ok((user, true))
            }
            InsertOutcome::EmailTaken => {
                // A concurrent login created this email first; use its record.
                debug!(
                    email = %safe_email_log(&identity.email),
                    provider = %identity.provider,
                    "Lost user creation race, re-reading winner"
                );
                let user = self
                    .store
                    .find_by_email(&identity.email)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)?;
                Ok((self.resolve_existing(user, identity).await?, false))
            }
        }
    }

    async fn resolve_existing(
        &self,
        user: User,
        identity: &FederatedIdentity,
    ) -> Result<User, sqlx::Error> {
        if user.has_provider_id() {
            debug!(
                user_id = %user.id,
                stored_provider = %user.provider,
                login_provider = %identity.provider,
                "Existing user already linked, keeping stored provider"
            );
            return Ok(user);
        }

        if self.store.backfill_provider(&user.id, identity).await? {
            info!(
                user_id = %user.id,
                provider = %identity.provider,
                "Backfilled provider details on existing user"
            );
        }

        // Re-read so a backfill that lost a race returns the winner's values.
        Ok(self.store.find_by_id(&user.id).await?.unwrap_or(user))
    }

    /// Fire-and-forget; the login never waits on mail delivery.
    fn dispatch_welcome(&self, user: &User) {
        let notifier = Arc::clone(&self.notifier);
        let email = user.email.clone();
        let name = user.name.clone().unwrap_or_else(|| email.clone());
        let user_id = user.id.clone();

        tokio::spawn(async move {
            match notifier.send_welcome(&email, &name).await {
                Ok(()) => debug!(user_id = %user_id, "Welcome notification dispatched"),
                Err(e) => error!(
                    error = %e,
                    user_id = %user_id,
                    email = %safe_email_log(&email),
                    "Failed to send welcome email"
                ),
            }
        });
    }
}
