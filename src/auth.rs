//! Visitor identity.
//!
//! The engine only needs to know whether an identity is present and an
//! opaque token to put in the checkout summary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub anonymous: bool,
}

impl Identity {
    pub fn anonymous(uid: impl Into<String>) -> Self { Self { uid: uid.into(), anonymous: true } }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "identity", rename_all = "snake_case")]
pub enum AuthState {
    #[default]
    SignedOut,
    Loading,
    SignedIn(Identity),
}

impl AuthState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthState::SignedIn(identity) => Some(identity),
            _ => None,
        }
    }
    pub fn is_present(&self) -> bool { self.identity().is_some() }
    pub fn is_loading(&self) -> bool { matches!(self, AuthState::Loading) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
    #[error("identity provider rejected the request: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError>;
}

/// Issues random guest identities locally.
#[derive(Clone, Debug, Default)]
pub struct LocalIdentityProvider;

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError> {
        let identity = Identity::anonymous(Uuid::new_v4().simple().to_string());
        info!(uid = %identity.uid, "anonymous identity issued");
        Ok(identity)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub struct RejectingProvider;

    #[async_trait]
    impl IdentityProvider for RejectingProvider {
        async fn sign_in_anonymously(&self) -> Result<Identity, AuthError> {
            Err(AuthError::Unavailable("auth backend offline".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_provider_issues_distinct_ids() {
        let provider = LocalIdentityProvider;
        let a = provider.sign_in_anonymously().await.unwrap();
        let b = provider.sign_in_anonymously().await.unwrap();
        assert!(a.anonymous);
        assert_ne!(a.uid, b.uid);
    }

    #[test]
    fn test_auth_state() {
        assert!(!AuthState::SignedOut.is_present());
        assert!(AuthState::Loading.is_loading());
        assert!(AuthState::SignedIn(Identity::anonymous("u1")).is_present());
    }
}
