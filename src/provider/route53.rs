use std::time::Duration;

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, ConfigLoader, Region, SdkConfig};
use aws_sdk_route53::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_route53::types::{
    Change, ChangeAction as Route53Action, ChangeBatch, ResourceRecord, ResourceRecordSet, RrType,
};
use aws_sdk_route53::Client;
use log::debug;

use crate::config::Route53Config;
use super::{ChangeAck, ChangeAction, DnsChangeRequest, ProviderError, RecordStore, RecordType};

/// Applies changes through the Route 53 `ChangeResourceRecordSets` API.
///
/// Credentials and region resolve through the standard AWS chain unless the
/// config overrides them. A client is built per call from the shared SDK
/// config so invocations share nothing mutable.
pub struct Route53Store {
    sdk_config: SdkConfig,
    timeout: Duration,
}

impl Route53Store {
    pub async fn from_config(config: &Route53Config) -> Self {
        Self::from_loader(loader(config), config.timeout()).await
    }

    async fn from_loader(loader: ConfigLoader, timeout: Duration) -> Self {
        Self {
            sdk_config: loader.load().await,
            timeout,
        }
    }
}

// The SDK retries by default; one update must be one request.
fn loader(config: &Route53Config) -> ConfigLoader {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).retry_config(RetryConfig::disabled());
    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }
    if let Some(endpoint_url) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint_url);
    }
    loader
}

#[async_trait]
impl RecordStore for Route53Store {
    async fn apply(&self, change: &DnsChangeRequest) -> Result<ChangeAck, ProviderError> {
        let client = Client::new(&self.sdk_config);
        let batch = change_batch(change)?;

        let call = client
            .change_resource_record_sets()
            .hosted_zone_id(&change.hosted_zone_id)
            .change_batch(batch)
            .send();

        let output = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                let message = match (err.code(), err.message()) {
                    (Some(code), Some(message)) => format!("{}: {}", code, message),
                    _ => DisplayErrorContext(&err).to_string(),
                };
                return Err(ProviderError::Api(message));
            }
            Err(_) => return Err(ProviderError::Timeout(self.timeout)),
        };

        debug!("Route 53 response: {:?}", output);

        Ok(match output.change_info() {
            Some(info) => ChangeAck {
                change_id: Some(info.id().to_string()),
                status: Some(info.status().as_str().to_string()),
            },
            None => ChangeAck::default(),
        })
    }

    fn name(&self) -> &str {
        "route53"
    }
}

fn change_batch(change: &DnsChangeRequest) -> Result<ChangeBatch, ProviderError> {
    let invalid = |e: aws_sdk_route53::error::BuildError| ProviderError::InvalidChange(e.to_string());

    let action = match change.action {
        ChangeAction::Upsert => Route53Action::Upsert,
    };
    let record_type = match change.record_type {
        RecordType::A => RrType::A,
    };

    let record_set = ResourceRecordSet::builder()
        .name(&change.name)
        .r#type(record_type)
        .ttl(change.ttl)
        .resource_records(ResourceRecord::builder().value(&change.value).build().map_err(invalid)?)
        .build()
        .map_err(invalid)?;

    ChangeBatch::builder()
        .comment(&change.comment)
        .changes(
            Change::builder()
                .action(action)
                .resource_record_set(record_set)
                .build()
                .map_err(invalid)?,
        )
        .build()
        .map_err(invalid)
}
