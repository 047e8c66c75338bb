//! License key validation against the external license service.
//!
//! `validate` never returns an error: every failure becomes a
//! [`LicenseValidation`] with `valid == false` and the least privileged tier.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use growth_core::config::LicenseServiceConfig;
use growth_core::Tier;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::catalog::{self, TierFeatures};
use crate::LicenseError;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
struct ValidateRequest<'a> {
    license_key: &'a str,
    product_id: &'a str,
}

/// Response envelope: `success` tags whether `license` or `message` is set.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationEnvelope {
    pub success: bool,
    #[serde(default)]
    pub license: Option<LicensePayload>,
    #[serde(default)]
    pub message: Option<String>,
}

/// License object returned on success. `custom_fields` and `metadata` are
/// loosely typed; their shape depends on how the license was issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicensePayload {
    pub id: String,
    pub product_id: String,
    pub license_key: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub custom_fields: Option<Value>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Where a tier may be declared in a license payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierSource {
    CustomFields,
    Metadata,
}

/// Lookup order for the tier field. The first source that declares a tier
/// decides it; an unrecognized value there does not fall through.
pub const TIER_PRECEDENCE: [TierSource; 2] = [TierSource::CustomFields, TierSource::Metadata];

impl LicensePayload {
    /// The raw `tier` entry declared by `source`, if any.
    pub fn tier_field(&self, source: TierSource) -> Option<&Value> {
        let fields = match source {
            TierSource::CustomFields => self.custom_fields.as_ref(),
            TierSource::Metadata => self.metadata.as_ref(),
        }?;
        fields.get("tier").filter(|v| !v.is_null())
    }

    /// Resolve the granted tier following [`TIER_PRECEDENCE`]. Missing or
    /// unrecognized values resolve to [`Tier::LEAST_PRIVILEGED`].
    pub fn resolve_tier(&self) -> (Tier, Option<TierSource>) {
        for source in TIER_PRECEDENCE {
            if let Some(value) = self.tier_field(source) {
                let tier = value.as_str().and_then(Tier::parse);
                if tier.is_none() {
                    warn!(license_id = %self.id, ?source, value = %value, "Unrecognized tier in license payload");
                }
                return (tier.unwrap_or(Tier::LEAST_PRIVILEGED), Some(source));
            }
        }
        (Tier::LEAST_PRIVILEGED, None)
    }
}

// ---------------------------------------------------------------------------
// Service seam
// ---------------------------------------------------------------------------

/// Transport to the license-issuing service.
#[async_trait]
pub trait LicenseService: Send + Sync {
    async fn validate_key(
        &self,
        license_key: &str,
        product_id: &str,
    ) -> Result<ValidationEnvelope, LicenseError>;
}

/// HTTP transport: `POST {base_url}/licenses/validate`.
pub struct HttpLicenseService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLicenseService {
    pub fn new(base_url: impl Into<String>) -> Result<Self, LicenseError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("growth-dashboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LicenseError::Network(e.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl LicenseService for HttpLicenseService {
    async fn validate_key(
        &self,
        license_key: &str,
        product_id: &str,
    ) -> Result<ValidationEnvelope, LicenseError> {
        let url = format!("{}/licenses/validate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&ValidateRequest {
                license_key,
                product_id,
            })
            .send()
            .await
            .map_err(|e| LicenseError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LicenseError::Network(e.to_string()))?;
        debug!(%status, bytes = body.len(), "License service responded");

        match serde_json::from_str::<ValidationEnvelope>(&body) {
            Ok(envelope) => Ok(envelope),
            Err(_) if status.is_server_error() => {
                Err(LicenseError::Network(format!("license service returned {status}")))
            }
            Err(e) => Err(LicenseError::Malformed(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Outcome of validating a license key.
#[derive(Debug, Clone, PartialEq)]
pub struct LicenseValidation {
    pub valid: bool,
    pub tier: Tier,
    pub features: TierFeatures,
    pub license: Option<LicensePayload>,
    pub failure: Option<LicenseError>,
}

impl LicenseValidation {
    fn granted(tier: Tier, license: LicensePayload) -> Self {
        Self {
            valid: true,
            tier,
            features: catalog::definition(tier).features,
            license: Some(license),
            failure: None,
        }
    }

    fn denied(failure: LicenseError, license: Option<LicensePayload>) -> Self {
        Self {
            valid: false,
            tier: Tier::LEAST_PRIVILEGED,
            features: catalog::definition(Tier::LEAST_PRIVILEGED).features,
            license,
            failure: Some(failure),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.failure.as_ref().is_some_and(LicenseError::is_timeout)
    }
}

/// Validates license keys for one product within a bounded time budget.
#[derive(Clone)]
pub struct LicenseValidator {
    service: Arc<dyn LicenseService>,
    product_id: String,
    timeout: Duration,
}

impl LicenseValidator {
    pub fn new(
        service: Arc<dyn LicenseService>,
        product_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            service,
            product_id: product_id.into(),
            timeout,
        }
    }

    /// Build an HTTP-backed validator from configuration.
    pub fn from_config(config: &LicenseServiceConfig) -> Result<Self, LicenseError> {
        let service = HttpLicenseService::new(config.base_url.clone())?;
        Ok(Self::new(
            Arc::new(service),
            config.product_id.clone(),
            config.timeout(),
        ))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Validate `license_key`. On expiry of the time budget the in-flight
    /// request is dropped and a timeout failure is returned.
    pub async fn validate(&self, license_key: &str) -> LicenseValidation {
        let key = license_key.trim();
        if key.is_empty() {
            return LicenseValidation::denied(LicenseError::EmptyKey, None);
        }

        let call = self.service.validate_key(key, &self.product_id);
        let envelope = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(envelope)) => envelope,
            Ok(Err(e)) => {
                warn!(error = %e, "License validation failed");
                return LicenseValidation::denied(e, None);
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "License validation timed out");
                return LicenseValidation::denied(LicenseError::Timeout(self.timeout), None);
            }
        };

        let validation = self.evaluate(envelope);
        match &validation.failure {
            None => info!(tier = %validation.tier, "License key validated"),
            Some(e) => warn!(error = %e, "License key not accepted"),
        }
        validation
    }

    fn evaluate(&self, envelope: ValidationEnvelope) -> LicenseValidation {
        if !envelope.success {
            let message = envelope
                .message
                .unwrap_or_else(|| "license key not recognized".to_string());
            return LicenseValidation::denied(LicenseError::Rejected(message), None);
        }
        let Some(license) = envelope.license else {
            return LicenseValidation::denied(
                LicenseError::Malformed("success response without license".to_string()),
                None,
            );
        };
        if license.product_id != self.product_id {
            let failure = LicenseError::WrongProduct {
                expected: self.product_id.clone(),
                actual: license.product_id.clone(),
            };
            return LicenseValidation::denied(failure, Some(license));
        }
        if let Some(expires_at) = license.expires_at {
            if expires_at <= Utc::now() {
                return LicenseValidation::denied(LicenseError::Expired(expires_at), Some(license));
            }
        }

        let (tier, source) = license.resolve_tier();
        debug!(%tier, ?source, "Resolved license tier");
        LicenseValidation::granted(tier, license)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
