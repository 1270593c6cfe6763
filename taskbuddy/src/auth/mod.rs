//! Identity collaborator boundary.
//!
//! The sync core never talks to a concrete identity provider; it consumes
//! the [`IdentityProvider`] trait — the current user, sign-in/sign-out
//! entry points, and an auth-state push feed. Provider internals (OAuth
//! popups, session persistence) stay behind the trait. [`StubIdentity`]
//! is the in-process implementation used by tests and local operation.

use tokio::sync::watch;

use taskbuddy_proto::task::UserId;

/// Errors that can occur during identity operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The sign-in flow failed or was rejected.
    #[error("sign-in failed: {0}")]
    SignIn(String),

    /// The sign-out flow failed.
    #[error("sign-out failed: {0}")]
    SignOut(String),
}

/// External identity collaborator.
///
/// The auth-state feed is the authoritative signal: `Some(user)` means a
/// session should be running for that user, `None` means local task state
/// must be cleared and the subscription cancelled.
pub trait IdentityProvider: Send + Sync {
    /// Returns the currently signed-in user, if any.
    fn current_user(&self) -> Option<UserId>;

    /// Runs the provider's sign-in flow and returns the signed-in user.
    fn sign_in(&self) -> impl std::future::Future<Output = Result<UserId, AuthError>> + Send;

    /// Signs the current user out.
    fn sign_out(&self) -> impl std::future::Future<Output = Result<(), AuthError>> + Send;

    /// Auth-state push feed: yields on every sign-in or sign-out.
    fn watch(&self) -> watch::Receiver<Option<UserId>>;
}

/// In-process identity provider with a fixed user.
///
/// Starts signed out; [`sign_in`](IdentityProvider::sign_in) always
/// succeeds with the configured user.
pub struct StubIdentity {
    user: UserId,
    state: watch::Sender<Option<UserId>>,
}

impl StubIdentity {
    /// Creates a signed-out provider for the given user.
    #[must_use]
    pub fn new(user: UserId) -> Self {
        let (state, _) = watch::channel(None);
        Self { user, state }
    }

    /// Creates a provider that is already signed in.
    #[must_use]
    pub fn signed_in(user: UserId) -> Self {
        let (state, _) = watch::channel(Some(user.clone()));
        Self { user, state }
    }
}

impl IdentityProvider for StubIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.state.borrow().clone()
    }

    async fn sign_in(&self) -> Result<UserId, AuthError> {
        self.state.send_replace(Some(self.user.clone()));
        tracing::info!(user = %self.user, "signed in");
        Ok(self.user.clone())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.state.send_replace(None);
        tracing::info!("signed out");
        Ok(())
    }

    fn watch(&self) -> watch::Receiver<Option<UserId>> {
        self.state.subscribe()
    }
}
