use {async_trait::async_trait, kilo_oauth::CredentialRecord};

use crate::error::Result;

/// Read access to the credential the host stored for the gateway.
///
/// The plugin never writes credentials; persistence belongs to the host.
#[async_trait]
pub trait CredentialAccessor: Send + Sync {
    /// The current record, [`CredentialRecord::None`] when nothing is stored.
    async fn credential(&self) -> Result<CredentialRecord>;
}

/// A fixed record, for hosts that already hold the credential in memory.
#[async_trait]
impl CredentialAccessor for CredentialRecord {
    async fn credential(&self) -> Result<CredentialRecord> {
        Ok(self.clone())
    }
}
