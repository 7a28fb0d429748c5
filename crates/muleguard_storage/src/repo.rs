#![forbid(unsafe_code)]

use muleguard_contracts::api_keys::{ApiKeyId, ApiKeyIssueRequest, ApiKeyRecord};
use muleguard_contracts::UnixTimeMs;
use rand::{CryptoRng, RngCore};

use crate::api_keys::{ApiKeyStore, IssuedApiKey, StorageError};

/// Typed repository interface for API-key lifecycle wiring.
pub trait ApiKeyRepo {
    fn issue_api_key_row(
        &mut self,
        req: ApiKeyIssueRequest,
        now: UnixTimeMs,
    ) -> Result<IssuedApiKey, StorageError>;
    fn revoke_api_key_row(
        &mut self,
        id: &ApiKeyId,
        now: UnixTimeMs,
    ) -> Result<ApiKeyRecord, StorageError>;
    fn delete_api_key_row(&mut self, id: &ApiKeyId) -> Result<ApiKeyRecord, StorageError>;

    fn get_api_key_row(&self, id: &ApiKeyId) -> Option<&ApiKeyRecord>;
    fn api_key_rows_newest_first(&self) -> Vec<&ApiKeyRecord>;
    fn api_key_row_count(&self) -> usize;
}

impl<R> ApiKeyRepo for ApiKeyStore<R>
where
    R: RngCore + CryptoRng,
{
    fn issue_api_key_row(
        &mut self,
        req: ApiKeyIssueRequest,
        now: UnixTimeMs,
    ) -> Result<IssuedApiKey, StorageError> {
        self.issue(req, now)
    }

    fn revoke_api_key_row(
        &mut self,
        id: &ApiKeyId,
        now: UnixTimeMs,
    ) -> Result<ApiKeyRecord, StorageError> {
        self.revoke(id, now)
    }

    fn delete_api_key_row(&mut self, id: &ApiKeyId) -> Result<ApiKeyRecord, StorageError> {
        self.delete(id)
    }

    fn get_api_key_row(&self, id: &ApiKeyId) -> Option<&ApiKeyRecord> {
        self.get(id)
    }

    fn api_key_rows_newest_first(&self) -> Vec<&ApiKeyRecord> {
        self.list()
    }

    fn api_key_row_count(&self) -> usize {
        self.len()
    }
}
