//! Profile directory seam.

use async_trait::async_trait;

use magpie_shared::{AccountId, DirectoryError, Handle, Profile};

/// Shared directory mapping accounts to their generated handles.
///
/// The directory is the authority on handle uniqueness: bootstrap checks
/// candidates with [`handle_exists`](ProfileDirectory::handle_exists) and the
/// write itself rejects a handle that was taken in the meantime.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn profile_for_account(
        &self,
        account: &AccountId,
    ) -> Result<Option<Profile>, DirectoryError>;

    async fn handle_exists(&self, handle: &Handle) -> Result<bool, DirectoryError>;

    /// Persist a new profile. Fails with [`DirectoryError::HandleTaken`] when
    /// another account registered the same handle between the existence check
    /// and this write.
    async fn register_profile(&self, profile: &Profile) -> Result<(), DirectoryError>;

    /// All known profiles, for the peer roster.
    async fn list_profiles(&self) -> Result<Vec<Profile>, DirectoryError>;
}
