//! Bearer credential supply.
//!
//! The session layer owns login and token refresh; this crate only asks for
//! the current token when it needs one.

use std::sync::{PoisonError, RwLock};

use rylie_shared::Credential;

pub trait CredentialProvider: Send + Sync + 'static {
    /// Current bearer token, or `None` when the user is signed out.
    fn credential(&self) -> Option<Credential>;
}

impl<F> CredentialProvider for F
where
    F: Fn() -> Option<Credential> + Send + Sync + 'static,
{
    fn credential(&self) -> Option<Credential> {
        self()
    }
}

/// Token holder the session layer can update in place.
#[derive(Debug, Default)]
pub struct SharedCredentials {
    current: RwLock<Option<Credential>>,
}

impl SharedCredentials {
    pub fn new(credential: Credential) -> Self {
        Self {
            current: RwLock::new(Some(credential)),
        }
    }

    /// Provider with no credential yet.
    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn set(&self, credential: Credential) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(credential);
    }

    pub fn clear(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl CredentialProvider for SharedCredentials {
    fn credential(&self) -> Option<Credential> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .filter(|c| !c.is_empty())
    }
}
