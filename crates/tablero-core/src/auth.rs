// ── Authentication seam ──
//
// The dashboard never acquires credentials itself. An `AuthProvider`
// hands out the current bearer token and is told when the server
// rejected it. Polling halts from that moment until the embedding
// application reports that the session was re-established.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwapOption;
use secrecy::SecretString;
use tokio::sync::watch;
use tracing::{info, warn};

use tablero_api::TokenProvider;

/// Source of the credential attached to every request.
pub trait AuthProvider: Send + Sync {
    /// The current token, or `None` to send requests unauthenticated.
    fn credential_token(&self) -> Option<SecretString>;

    /// Called once each time the server rejects the credential.
    fn on_session_invalid(&self);
}

/// A token held in memory and swappable at runtime.
///
/// The invalidation flag is observable, so a UI can prompt for a new
/// token and then call [`set_token`](Self::set_token).
pub struct StaticCredentials {
    token: ArcSwapOption<SecretString>,
    invalid: watch::Sender<bool>,
}

impl StaticCredentials {
    pub fn new(token: Option<SecretString>) -> Self {
        let (invalid, _) = watch::channel(false);
        Self {
            token: ArcSwapOption::from(token.map(Arc::new)),
            invalid,
        }
    }

    /// Replace the token and clear the invalid flag.
    pub fn set_token(&self, token: Option<SecretString>) {
        self.token.store(token.map(Arc::new));
        self.invalid.send_replace(false);
    }

    pub fn is_invalid(&self) -> bool {
        *self.invalid.borrow()
    }

    pub fn watch_invalid(&self) -> watch::Receiver<bool> {
        self.invalid.subscribe()
    }
}

impl AuthProvider for StaticCredentials {
    fn credential_token(&self) -> Option<SecretString> {
        self.token.load_full().map(|t| SecretString::clone(&t))
    }

    fn on_session_invalid(&self) {
        self.invalid.send_replace(true);
    }
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("has_token", &self.token.load().is_some())
            .field("invalid", &self.is_invalid())
            .finish()
    }
}

// ── Session bookkeeping ──────────────────────────────────────────────

/// Shared between the channels and the mutation gateway: who to ask
/// for a token, and whether polling is halted on an auth failure.
pub(crate) struct Session {
    provider: Arc<dyn AuthProvider>,
    halted: AtomicBool,
}

impl Session {
    pub(crate) fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self {
            provider,
            halted: AtomicBool::new(false),
        }
    }

    /// Record a rejected credential. The provider hears about it once
    /// per halt, however many requests fail.
    pub(crate) fn invalidate(&self, source: &str) {
        if !self.halted.swap(true, Ordering::SeqCst) {
            warn!(source, "credential rejected, halting polling");
            self.provider.on_session_invalid();
        }
    }

    /// Lift the halt. Returns `true` if polling was halted.
    pub(crate) fn resume(&self) -> bool {
        let was = self.halted.swap(false, Ordering::SeqCst);
        if was {
            info!("session re-established, polling resumed");
        }
        was
    }

    pub(crate) fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Adapter for the api crate's token seam.
    pub(crate) fn tokens(&self) -> Arc<dyn TokenProvider> {
        Arc::new(ProviderTokens(Arc::clone(&self.provider)))
    }
}

struct ProviderTokens(Arc<dyn AuthProvider>);

impl TokenProvider for ProviderTokens {
    fn bearer_token(&self) -> Option<SecretString> {
        self.0.credential_token()
    }
}
