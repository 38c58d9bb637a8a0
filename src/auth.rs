use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::BackendError;

/// The identity behind a session, as supplied by the session provider.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(value: impl Into<String>) -> Self {
        Identity(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Resolves opaque session tokens to identities. Sessions are issued
/// elsewhere; this side only reads them.
pub trait Sessions: Send + Sync {
    fn lookup(&self, token: &str) -> BoxFuture<Result<Option<Identity>, BackendError>>;
}

/// Requires a session to be present before a mutating operation.
pub fn require_login(identity: Option<Identity>) -> Result<Identity, BackendError> {
    identity.ok_or(BackendError::AuthenticationRequired)
}

/// Lets a mutation through only when the session identity owns the
/// resource. Read operations bypass this gate.
pub fn authorize(identity: &Identity, owner: &Identity, id: &Uuid) -> Result<(), BackendError> {
    if identity == owner {
        Ok(())
    } else {
        Err(BackendError::OwnershipViolation { id: *id })
    }
}
