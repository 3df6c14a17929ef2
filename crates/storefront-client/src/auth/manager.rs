//! The token manager: sole owner of the live credential

use super::{Credential, CredentialStore, RefreshError, TokenRefresher, store};
use crate::error::Result;
use crate::http::RequestDescriptor;
use http::{HeaderValue, header::AUTHORIZATION};
use secrecy::SecretString;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info, warn};

type RefreshOutcome = std::result::Result<(), RefreshError>;
type RefreshSlot = watch::Receiver<Option<RefreshOutcome>>;

/// Which credential a request presented.
///
/// Every change of the live credential (login, refresh, clear) bumps the
/// generation. A request that got `AuthExpired` for an older generation than
/// the current one was answered for a token that has already been replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AuthGeneration(u64);

struct TokenState {
    credential: Option<Credential>,
    generation: u64,
    refresh: Option<RefreshSlot>,
}

/// Holds the process-wide credential and coordinates refreshes.
///
/// All reads and writes of the credential go through the internal mutex,
/// which is never held across an `.await`. At most one refresh runs at a
/// time; every request that observes `AuthExpired` meanwhile joins it and
/// receives the same outcome.
///
/// The refresh itself runs on a spawned task, so dropping or cancelling the
/// request that started it does not abort it for the others.
///
/// Storage writes happen after the in-memory swap, outside the mutex. They
/// are serialized and always write the credential that is live at that
/// moment, so the store converges on the in-memory state.
pub struct TokenManager {
    state: Mutex<TokenState>,
    persist: tokio::sync::Mutex<()>,
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("TokenManager")
            .field("authenticated", &state.credential.is_some())
            .field("generation", &state.generation)
            .field("refreshing", &state.refresh.is_some())
            .finish()
    }
}

impl TokenManager {
    /// Create a manager with no credential.
    pub fn new(store: Arc<dyn CredentialStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            state: Mutex::new(TokenState {
                credential: None,
                generation: 0,
                refresh: None,
            }),
            persist: tokio::sync::Mutex::new(()),
            store,
            refresher,
        }
    }

    /// Create a manager and restore the credential persisted in `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn restore(
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Result<Self> {
        let credential = store::load(store.as_ref()).await?;
        let manager = Self::new(store, refresher);
        if credential.is_some() {
            debug!("restored persisted credential");
            let mut state = manager.lock();
            state.credential = credential;
            state.generation += 1;
        }
        Ok(manager)
    }

    fn lock(&self) -> MutexGuard<'_, TokenState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Install a credential after a successful login and persist it.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential cannot be persisted. The in-memory
    /// credential is installed regardless.
    pub async fn set_credential(&self, credential: Credential) -> Result<()> {
        {
            let mut state = self.lock();
            state.credential = Some(credential);
            state.generation += 1;
        }
        self.persist().await
    }

    /// Drop the credential and purge it from storage (logout).
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be purged. The in-memory credential
    /// is dropped regardless.
    pub async fn clear(&self) -> Result<()> {
        Self::drop_credential(&mut self.lock());
        self.persist().await
    }

    fn drop_credential(state: &mut TokenState) {
        if state.credential.take().is_some() {
            state.generation += 1;
        }
    }

    /// Write the live credential to the store, or purge it when there is none.
    async fn persist(&self) -> Result<()> {
        let _guard = self.persist.lock().await;
        let live = self.lock().credential.clone();
        match live {
            Some(credential) => store::save(self.store.as_ref(), &credential).await,
            None => store::purge(self.store.as_ref()).await,
        }
    }

    async fn persist_or_warn(&self) {
        if let Err(err) = self.persist().await {
            warn!(error = %err, "failed to update stored credential");
        }
    }

    /// Whether a credential is held (expired or not).
    pub fn is_authenticated(&self) -> bool {
        self.lock().credential.is_some()
    }

    /// Snapshot of the current credential.
    pub fn credential(&self) -> Option<Credential> {
        self.lock().credential.clone()
    }

    /// Whether a refresh is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.lock().refresh.is_some()
    }

    /// Set the descriptor's authorization header from the current credential.
    ///
    /// Waits for an in-flight refresh first so requests do not go out with a
    /// token that is being replaced. Without a usable credential (none, or
    /// past its expiry) the header is removed and the request proceeds
    /// unauthenticated.
    pub async fn attach(&self, request: &mut RequestDescriptor) -> AuthGeneration {
        let pending = self.lock().refresh.clone();
        if let Some(slot) = pending {
            let _ = self.join(slot).await;
        }

        let state = self.lock();
        let bearer = state
            .credential
            .as_ref()
            .filter(|c| !c.is_expired())
            .and_then(|c| HeaderValue::try_from(c.bearer()).ok());

        match bearer {
            Some(mut value) => {
                value.set_sensitive(true);
                request.headers.insert(AUTHORIZATION, value);
            }
            None => {
                request.headers.remove(AUTHORIZATION);
            }
        }

        AuthGeneration(state.generation)
    }

    /// React to a request that was rejected with `AuthExpired`.
    ///
    /// `presented` is what [`attach`](Self::attach) returned for that request.
    ///
    /// - If the credential already changed since, return at once.
    /// - If a refresh is in flight, wait for it.
    /// - Otherwise start one and wait for it.
    ///
    /// # Errors
    ///
    /// Returns the refresh failure. On failure the credential has been
    /// cleared and the caller must authenticate again.
    pub async fn handle_auth_expired(
        self: &Arc<Self>,
        presented: AuthGeneration,
    ) -> std::result::Result<(), RefreshError> {
        let slot = {
            let mut state = self.lock();

            if let Some(slot) = &state.refresh {
                Some(slot.clone())
            } else if state.generation != presented.0 {
                return match state.credential {
                    Some(_) => Ok(()),
                    None => Err(RefreshError::NotAuthenticated),
                };
            } else {
                let refresh_token = state
                    .credential
                    .as_ref()
                    .and_then(|c| c.refresh_token().cloned());

                match refresh_token {
                    Some(refresh_token) => {
                        let (tx, slot) = watch::channel(None);
                        state.refresh = Some(slot.clone());

                        let manager = Arc::clone(self);
                        tokio::spawn(async move { manager.run_refresh(refresh_token, tx).await });
                        Some(slot)
                    }
                    None if state.credential.is_none() => {
                        return Err(RefreshError::NotAuthenticated);
                    }
                    None => {
                        warn!("credential rejected and no refresh token stored, clearing");
                        Self::drop_credential(&mut state);
                        None
                    }
                }
            }
        };

        match slot {
            Some(slot) => self.join(slot).await,
            None => {
                self.persist_or_warn().await;
                Err(RefreshError::MissingRefreshToken)
            }
        }
    }

    async fn join(&self, mut slot: RefreshSlot) -> RefreshOutcome {
        let outcome = match slot.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        if let Some(outcome) = outcome {
            return outcome;
        }

        // The refresh task died before publishing. The first waiter to notice
        // frees the slot and drops the credential it was refreshing.
        let abandoned = {
            let mut state = self.lock();
            let current = state
                .refresh
                .as_ref()
                .is_some_and(|s| s.same_channel(&slot));
            if current {
                state.refresh = None;
                Self::drop_credential(&mut state);
            }
            current
        };
        if abandoned {
            warn!("token refresh ended without an outcome, clearing credential");
            self.persist_or_warn().await;
        }
        Err(RefreshError::Interrupted)
    }

    async fn run_refresh(
        self: Arc<Self>,
        refresh_token: SecretString,
        tx: watch::Sender<Option<RefreshOutcome>>,
    ) {
        info!("refreshing access token");
        let result = self.refresher.refresh(&refresh_token).await;

        let outcome = {
            let mut state = self.lock();
            state.refresh = None;
            state.generation += 1;

            match result {
                Ok(mut credential) => {
                    if credential.refresh_token().is_none() {
                        credential.set_refresh_token(refresh_token);
                    }
                    state.credential = Some(credential);
                    info!(generation = state.generation, "access token refreshed");
                    Ok(())
                }
                Err(err) => {
                    warn!(error = %err, "token refresh failed, clearing credential");
                    state.credential = None;
                    Err(err)
                }
            }
        };

        self.persist_or_warn().await;
        tx.send_replace(Some(outcome));
    }
}
