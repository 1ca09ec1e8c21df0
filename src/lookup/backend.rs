use async_trait::async_trait;

use super::types::{LookupPayload, LookupRequest, Provenance};
use crate::core::errors::NavigatorError;

/// One tier of the external lookup cascade.
#[async_trait]
pub trait LookupBackend: Send + Sync {
    fn name(&self) -> &str;

    fn provenance(&self) -> Provenance;

    /// Label under which this tier's payload is reported.
    fn source_name(&self, request: &LookupRequest) -> String;

    async fn fetch(&self, request: &LookupRequest) -> Result<LookupPayload, NavigatorError>;
}
