//! Payment Provider client.
//!
//! The provider is an opaque collaborator: it opens a hosted checkout page
//! for a package and later reports a completion status plus the purchased
//! credit quantity. The concrete implementation speaks the Stripe
//! checkout-sessions API; the base URL is injectable so tests can point it at
//! a local mock server.

use crate::billing::catalog::CreditPackage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

/// A provider-side checkout session, freshly opened.
#[derive(Debug, Clone)]
pub struct ProviderSession {
    /// Provider session ID.
    pub id: String,
    /// Hosted checkout page the client is redirected to.
    pub redirect_url: Option<String>,
}

/// Completion state of a provider session.
#[derive(Debug, Clone)]
pub struct ProviderStatus {
    /// Provider status string; `"complete"` confirms payment.
    pub status: String,
    /// Credit quantity carried in the session metadata.
    pub credits: u32,
}

/// Opaque payment collaborator.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Open a hosted checkout session for a package.
    async fn create_session(
        &self,
        package: &CreditPackage,
        client_reference: &str,
    ) -> Result<ProviderSession>;

    /// Fetch the completion status of a session.
    async fn session_status(&self, provider_session_id: &str) -> Result<ProviderStatus>;
}

// ── Stripe checkout sessions ─────────────────────────────────────

#[derive(Debug, Deserialize)]
struct StripeSession {
    id: String,
    url: Option<String>,
    status: Option<String>,
    #[serde(default)]
    metadata: StripeMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct StripeMetadata {
    credits: Option<String>,
}

/// Stripe checkout-sessions client.
pub struct StripeCheckout {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
    currency: String,
    success_url: String,
    cancel_url: String,
}

impl StripeCheckout {
    pub fn new(
        api_base: &str,
        secret_key: &str,
        currency: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
            currency: currency.to_string(),
            success_url: success_url.to_string(),
            cancel_url: cancel_url.to_string(),
        }
    }
}

#[async_trait]
impl PaymentProvider for StripeCheckout {
    async fn create_session(
        &self,
        package: &CreditPackage,
        client_reference: &str,
    ) -> Result<ProviderSession> {
        let params: Vec<(&str, String)> = vec![
            ("mode", "payment".into()),
            ("client_reference_id", client_reference.into()),
            ("success_url", self.success_url.clone()),
            ("cancel_url", self.cancel_url.clone()),
            ("line_items[0][quantity]", "1".into()),
            ("line_items[0][price_data][currency]", self.currency.clone()),
            (
                "line_items[0][price_data][unit_amount]",
                package.price_cents.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                package.name.into(),
            ),
            (
                "line_items[0][price_data][product_data][description]",
                package.description.into(),
            ),
            ("metadata[package_id]", package.id.into()),
            ("metadata[credits]", package.credits.to_string()),
        ];

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await
            .context("payment provider unreachable")?;

        if !response.status().is_success() {
            anyhow::bail!("payment provider returned {}", response.status());
        }

        let session: StripeSession = response
            .json()
            .await
            .context("invalid payment provider response")?;

        Ok(ProviderSession {
            id: session.id,
            redirect_url: session.url,
        })
    }

    async fn session_status(&self, provider_session_id: &str) -> Result<ProviderStatus> {
        let response = self
            .client
            .get(format!(
                "{}/v1/checkout/sessions/{provider_session_id}",
                self.api_base
            ))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .context("payment provider unreachable")?;

        if !response.status().is_success() {
            anyhow::bail!("payment provider returned {}", response.status());
        }

        let session: StripeSession = response
            .json()
            .await
            .context("invalid payment provider response")?;

        let credits = session
            .metadata
            .credits
            .as_deref()
            .and_then(|raw| raw.parse::<u32>().ok())
            .unwrap_or(0);

        Ok(ProviderStatus {
            status: session.status.unwrap_or_else(|| "open".into()),
            credits,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::catalog::find_package;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> StripeCheckout {
        StripeCheckout::new(
            &server.uri(),
            "sk_test_key",
            "brl",
            "https://fluente.example.com/checkout/success",
            "https://fluente.example.com/buy-credits",
        )
    }

    #[tokio::test]
    async fn create_session_posts_package_details() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(header("authorization", "Bearer sk_test_key"))
            .and(body_string_contains("unit_amount%5D=2490"))
            .and(body_string_contains("credits%5D=20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "cs_test_abc",
                "url": "https://checkout.example.com/pay/cs_test_abc",
                "status": "open",
            })))
            .mount(&server)
            .await;

        let pkg = find_package("starter-pack").unwrap();
        let session = client(&server).create_session(pkg, "local-session-1").await.unwrap();
        assert_eq!(session.id, "cs_test_abc");
        assert_eq!(
            session.redirect_url.as_deref(),
            Some("https://checkout.example.com/pay/cs_test_abc")
        );
    }

    #[tokio::test]
    async fn create_session_surfaces_provider_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(402))
            .mount(&server)
            .await;

        let pkg = find_package("starter-pack").unwrap();
        let err = client(&server)
            .create_session(pkg, "local-session-1")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("402"));
    }

    #[tokio::test]
    async fn session_status_parses_metadata_credits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_test_abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "cs_test_abc",
                "status": "complete",
                "metadata": {"package_id": "starter-pack", "credits": "20"},
            })))
            .mount(&server)
            .await;

        let status = client(&server).session_status("cs_test_abc").await.unwrap();
        assert_eq!(status.status, "complete");
        assert_eq!(status.credits, 20);
    }

    #[tokio::test]
    async fn session_status_missing_metadata_defaults_to_zero() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_test_abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "cs_test_abc",
            })))
            .mount(&server)
            .await;

        let status = client(&server).session_status("cs_test_abc").await.unwrap();
        assert_eq!(status.status, "open");
        assert_eq!(status.credits, 0);
    }
}
