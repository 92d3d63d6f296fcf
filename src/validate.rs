use std::net::Ipv4Addr;

use serde::Deserialize;
use thiserror::Error;

use crate::config::TargetMode;

/// A validated request to point `target_hostname` at `claimed_ip`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub claimed_ip: String,
    pub hosted_zone_id: String,
    pub target_hostname: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no source address was observed for the caller")]
    MissingSourceIp,

    #[error("request body is empty")]
    EmptyBody,

    #[error("{0}")]
    MalformedBody(String),

    #[error("field `{0}` is empty")]
    MissingField(&'static str),

    #[error("claimed address {claimed} does not match observed address {observed}")]
    IdentityMismatch { claimed: String, observed: String },

    #[error("field `{field}` does not match the configured target")]
    TargetMismatch { field: &'static str },

    #[error("not an IPv4 address: {0}")]
    InvalidAddress(String),
}

#[derive(Debug, Deserialize)]
struct UpdateBody {
    ip_address: String,
    hosted_zone: Option<String>,
    target_url: Option<String>,
}

/// Validates a body whose zone and hostname are supplied by the caller.
pub fn validate(body: &[u8], observed_source_ip: &str) -> Result<UpdateRequest, ValidationError> {
    validate_for(body, observed_source_ip, &TargetMode::RequestSupplied)
}

/// Validates a body against the configured target mode.
///
/// The caller may only point a record at the address it is connecting from, so
/// `ip_address` must be string-equal to `observed_source_ip`. This is the only
/// authorization applied.
pub fn validate_for(
    body: &[u8],
    observed_source_ip: &str,
    target: &TargetMode,
) -> Result<UpdateRequest, ValidationError> {
    if observed_source_ip.is_empty() {
        return Err(ValidationError::MissingSourceIp);
    }
    if body.is_empty() {
        return Err(ValidationError::EmptyBody);
    }

    let parsed: UpdateBody = serde_json::from_slice(body)
        .map_err(|e| ValidationError::MalformedBody(e.to_string()))?;

    let (hosted_zone_id, target_hostname) = match target {
        TargetMode::RequestSupplied => (
            required(parsed.hosted_zone.clone(), "hosted_zone")?,
            required(parsed.target_url.clone(), "target_url")?,
        ),
        TargetMode::Fixed {
            hosted_zone,
            hostname,
        } => (hosted_zone.clone(), hostname.clone()),
    };

    if parsed.ip_address.is_empty() {
        return Err(ValidationError::MissingField("ip_address"));
    }
    if hosted_zone_id.is_empty() {
        return Err(ValidationError::MissingField("hosted_zone"));
    }
    if target_hostname.is_empty() {
        return Err(ValidationError::MissingField("target_url"));
    }

    if parsed.ip_address != observed_source_ip {
        return Err(ValidationError::IdentityMismatch {
            claimed: parsed.ip_address,
            observed: observed_source_ip.to_string(),
        });
    }

    if let TargetMode::Fixed { .. } = target {
        pinned(parsed.hosted_zone.as_deref(), &hosted_zone_id, "hosted_zone")?;
        pinned(parsed.target_url.as_deref(), &target_hostname, "target_url")?;
    }

    if parsed.ip_address.parse::<Ipv4Addr>().is_err() {
        return Err(ValidationError::InvalidAddress(parsed.ip_address));
    }

    Ok(UpdateRequest {
        claimed_ip: parsed.ip_address,
        hosted_zone_id,
        target_hostname,
    })
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    value.ok_or_else(|| ValidationError::MalformedBody(format!("missing field `{field}`")))
}

// Absent or empty values defer to the pin.
fn pinned(value: Option<&str>, expected: &str, field: &'static str) -> Result<(), ValidationError> {
    match value {
        Some(v) if !v.is_empty() && v != expected => Err(ValidationError::TargetMismatch { field }),
        _ => Ok(()),
    }
}
