use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_route53::error::DisplayErrorContext;
use aws_sdk_route53::types::{
    Change, ChangeAction, ChangeBatch, ChangeStatus, ResourceRecord, ResourceRecordSet, RrType,
};
use aws_sdk_route53domains::types::DomainAvailability;

use super::{DnsProvider, ProviderError};
use crate::config::AwsConfig;

const SERVICE: &str = "route53";
const RECORD_TTL: i64 = 60;

pub struct Route53Dns {
    route53: aws_sdk_route53::Client,
    domains: aws_sdk_route53domains::Client,
}

impl Route53Dns {
    pub async fn new(config: &AwsConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "flapi-env",
        );

        // Route 53 is global, but the SDK cannot resolve its endpoint without a region.
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(credentials)
            .load()
            .await;

        Self {
            route53: aws_sdk_route53::Client::new(&sdk_config),
            domains: aws_sdk_route53domains::Client::new(&sdk_config),
        }
    }

    /// Find the hosted zone serving the registrable domain of `fqdn`.
    async fn hosted_zone_id(&self, fqdn: &str) -> Result<String, ProviderError> {
        let zone_name = format!("{}.", extract_domain(fqdn));
        let mut marker: Option<String> = None;

        loop {
            let out = self
                .route53
                .list_hosted_zones()
                .set_marker(marker.clone())
                .send()
                .await
                .map_err(sdk_error)?;

            if let Some(zone) = out
                .hosted_zones()
                .iter()
                .find(|z| z.name().eq_ignore_ascii_case(&zone_name))
            {
                return Ok(zone.id().trim_start_matches("/hostedzone/").to_string());
            }

            marker = out.next_marker().map(str::to_string);
            if !out.is_truncated() || marker.is_none() {
                break;
            }
        }

        tracing::error!(zone = %zone_name, "Hosted zone not found");
        Err(ProviderError::rejected(
            SERVICE,
            format!("No hosted zone found for {zone_name}"),
        ))
    }
}

#[async_trait]
impl DnsProvider for Route53Dns {
    async fn check_domain_availability(&self, domain: &str) -> Result<bool, ProviderError> {
        let out = self
            .domains
            .check_domain_availability()
            .domain_name(domain)
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(matches!(
            out.availability(),
            Some(DomainAvailability::Available)
        ))
    }

    async fn subdomain_exists(&self, fqdn: &str) -> Result<bool, ProviderError> {
        let zone_id = self.hosted_zone_id(fqdn).await?;
        let record_name = absolute_name(fqdn);

        // Record sets come back sorted by name starting at `start_record_name`,
        // so an existing record is always in the first page.
        let out = self
            .route53
            .list_resource_record_sets()
            .hosted_zone_id(&zone_id)
            .start_record_name(&record_name)
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(out
            .resource_record_sets()
            .iter()
            .any(|r| r.name().eq_ignore_ascii_case(&record_name)))
    }

    async fn create_subdomain(&self, fqdn: &str, target: &str) -> Result<bool, ProviderError> {
        let zone_id = self.hosted_zone_id(fqdn).await?;

        let record = ResourceRecordSet::builder()
            .name(absolute_name(fqdn))
            .r#type(RrType::A)
            .ttl(RECORD_TTL)
            .resource_records(
                ResourceRecord::builder()
                    .value(target)
                    .build()
                    .map_err(build_error)?,
            )
            .build()
            .map_err(build_error)?;

        let change = Change::builder()
            .action(ChangeAction::Create)
            .resource_record_set(record)
            .build()
            .map_err(build_error)?;

        let batch = ChangeBatch::builder()
            .comment(format!("flapi: create {fqdn}"))
            .changes(change)
            .build()
            .map_err(build_error)?;

        let out = self
            .route53
            .change_resource_record_sets()
            .hosted_zone_id(&zone_id)
            .change_batch(batch)
            .send()
            .await
            .map_err(sdk_error)?;

        let accepted = out
            .change_info()
            .map(|info| matches!(info.status(), ChangeStatus::Pending | ChangeStatus::Insync))
            .unwrap_or(false);

        tracing::info!(%fqdn, %target, accepted, "Route 53 record change submitted");
        Ok(accepted)
    }
}

fn sdk_error<E: std::error::Error>(err: E) -> ProviderError {
    ProviderError::rejected(SERVICE, DisplayErrorContext(err).to_string())
}

fn build_error(err: aws_sdk_route53::error::BuildError) -> ProviderError {
    ProviderError::rejected(SERVICE, format!("invalid record change: {err}"))
}

/// Route 53 stores names fully qualified, with a trailing dot.
fn absolute_name(fqdn: &str) -> String {
    format!("{}.", fqdn.trim_end_matches('.'))
}

/// `shop.dev.example.com` -> `example.com`. Names with fewer than two labels
/// are returned unchanged.
pub fn extract_domain(fqdn: &str) -> String {
    let parts: Vec<&str> = fqdn.trim_end_matches('.').split('.').collect();
    if parts.len() < 2 {
        return fqdn.to_string();
    }
    parts[parts.len() - 2..].join(".")
}

/// `shop.example.com` -> `shop`. Names with fewer than two labels are
/// returned unchanged.
pub fn extract_subdomain(fqdn: &str) -> String {
    let parts: Vec<&str> = fqdn.split('.').collect();
    if parts.len() < 2 {
        return fqdn.to_string();
    }
    parts[0].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_domain_keeps_last_two_labels() {
        assert_eq!(extract_domain("shop.flapi.org"), "flapi.org");
        assert_eq!(extract_domain("dev.shop.flapi.org"), "flapi.org");
        assert_eq!(extract_domain("flapi.org"), "flapi.org");
        assert_eq!(extract_domain("flapi.org."), "flapi.org");
        assert_eq!(extract_domain("localhost"), "localhost");
    }

    #[test]
    fn extract_subdomain_takes_first_label() {
        assert_eq!(extract_subdomain("shop.flapi.org"), "shop");
        assert_eq!(extract_subdomain("localhost"), "localhost");
    }

    #[test]
    fn absolute_name_has_single_trailing_dot() {
        assert_eq!(absolute_name("shop.flapi.org"), "shop.flapi.org.");
        assert_eq!(absolute_name("shop.flapi.org."), "shop.flapi.org.");
    }
}
