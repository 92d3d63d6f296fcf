pub mod route53;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use log::info;
use thiserror::Error;

use crate::validate::UpdateRequest;

/// TTL in seconds written on every record.
pub const RECORD_TTL: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Upsert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    A,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UPSERT")
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("A")
    }
}

/// A single record mutation scoped to one hosted zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsChangeRequest {
    pub hosted_zone_id: String,
    pub action: ChangeAction,
    pub name: String,
    pub record_type: RecordType,
    pub value: String,
    pub ttl: i64,
    pub comment: String,
}

impl DnsChangeRequest {
    pub fn upsert(req: &UpdateRequest) -> Self {
        Self {
            hosted_zone_id: req.hosted_zone_id.clone(),
            action: ChangeAction::Upsert,
            name: req.target_hostname.clone(),
            record_type: RecordType::A,
            value: req.claimed_ip.clone(),
            ttl: RECORD_TTL,
            comment: format!(
                "Update to {} in hosted zone {} called from {}",
                req.target_hostname, req.hosted_zone_id, req.claimed_ip
            ),
        }
    }
}

/// The provider's acknowledgment that a change was accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeAck {
    pub change_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0}")]
    Api(String),

    #[error("DNS provider did not respond within {0:?}")]
    Timeout(Duration),

    #[error("Invalid change request: {0}")]
    InvalidChange(String),
}

/// A remote DNS record store that can apply one change at a time.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn apply(&self, change: &DnsChangeRequest) -> Result<ChangeAck, ProviderError>;

    fn name(&self) -> &str;
}

/// Issues exactly one upsert for a validated request. Never retries.
pub async fn update(
    store: &dyn RecordStore,
    req: &UpdateRequest,
) -> Result<ChangeAck, ProviderError> {
    let change = DnsChangeRequest::upsert(req);

    info!(
        "Submitting {} {} {} -> {} (ttl {}) to {} zone {}",
        change.action,
        change.record_type,
        change.name,
        change.value,
        change.ttl,
        store.name(),
        change.hosted_zone_id
    );

    store.apply(&change).await
}
