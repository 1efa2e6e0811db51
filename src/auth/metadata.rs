//! Token minting through the instance metadata server.
//!
//! On Cloud Run, GKE and GCE the metadata server hands out tokens for the
//! identity attached to the workload. When a service account is configured,
//! that ambient token is exchanged through the IAM Credentials API for a
//! token of the configured account.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use super::{AccessToken, AuthError, Authenticator};
use crate::config::GoogleConfig;
use crate::utils::HttpClient;

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const TOKEN_LIFETIME: &str = "3600s";

/// Authenticator backed by the metadata server and IAM Credentials
#[derive(Debug, Clone)]
pub struct MetadataAuthenticator {
    client: HttpClient,
    metadata_base_url: String,
    iam_base_url: String,
    service_account: Option<String>,
    static_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedToken {
    access_token: String,
    #[serde(default)]
    expire_time: Option<DateTime<Utc>>,
}

impl MetadataAuthenticator {
    pub fn new(client: HttpClient, config: &GoogleConfig) -> Self {
        Self {
            client,
            metadata_base_url: config.metadata_base_url.trim_end_matches('/').to_string(),
            iam_base_url: config.iam_base_url.trim_end_matches('/').to_string(),
            service_account: config
                .service_account
                .clone()
                .filter(|s| !s.trim().is_empty()),
            static_token: config.access_token.clone().filter(|s| !s.trim().is_empty()),
        }
    }

    async fn metadata_token(&self, scopes: &[&str]) -> Result<MetadataToken, AuthError> {
        let url = format!(
            "{}/computeMetadata/v1/instance/service-accounts/default/token",
            self.metadata_base_url
        );

        let response = self
            .client
            .client()
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .query(&[("scopes", scopes.join(","))])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Parse(format!("metadata token: {}", e)))
    }

    async fn impersonate(
        &self,
        service_account: &str,
        source_token: &str,
        scopes: &[&str],
    ) -> Result<GeneratedToken, AuthError> {
        let url = format!(
            "{}/v1/projects/-/serviceAccounts/{}:generateAccessToken",
            self.iam_base_url,
            urlencoding::encode(service_account)
        );

        let response = self
            .client
            .client()
            .post(&url)
            .bearer_auth(source_token)
            .json(&serde_json::json!({
                "scope": scopes,
                "lifetime": TOKEN_LIFETIME,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Parse(format!("generateAccessToken: {}", e)))
    }
}

#[async_trait]
impl Authenticator for MetadataAuthenticator {
    async fn authenticate(&self, scopes: &[&str]) -> Result<AccessToken, AuthError> {
        if let Some(token) = &self.static_token {
            tracing::debug!("Using statically configured access token");
            return Ok(AccessToken::bearer(token.clone(), scopes));
        }

        match &self.service_account {
            Some(account) => {
                let source = self.metadata_token(&[CLOUD_PLATFORM_SCOPE]).await?;
                let generated = self
                    .impersonate(account, &source.access_token, scopes)
                    .await?;
                tracing::debug!(service_account = %account, "Minted impersonated token");

                let token = AccessToken::bearer(generated.access_token, scopes);
                Ok(match generated.expire_time {
                    Some(expiry) => token.expires_at(expiry),
                    None => token,
                })
            }
            None => {
                let token = self.metadata_token(scopes).await?;
                tracing::debug!("Minted token for the ambient identity");

                let mut minted = AccessToken::bearer(token.access_token, scopes);
                if let Some(token_type) = token.token_type {
                    minted.token_type = token_type;
                }
                Ok(match token.expires_in {
                    Some(secs) => minted.expires_at(Utc::now() + Duration::seconds(secs)),
                    None => minted,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SCOPES;
    use mockito::Matcher;

    fn config_for(server: &mockito::ServerGuard) -> GoogleConfig {
        GoogleConfig {
            metadata_base_url: server.url(),
            iam_base_url: server.url(),
            ..GoogleConfig::default()
        }
    }

    #[tokio::test]
    async fn test_static_token_skips_network() {
        let config = GoogleConfig {
            access_token: Some("ya29.local".into()),
            metadata_base_url: "http://127.0.0.1:9".into(),
            ..GoogleConfig::default()
        };
        let auth = MetadataAuthenticator::new(HttpClient::new().unwrap(), &config);

        let token = auth.authenticate(SCOPES).await.unwrap();
        assert_eq!(token.value, "ya29.local");
        assert_eq!(token.token_type, "Bearer");
        assert!(token.expires_at.is_none());
    }

    #[tokio::test]
    async fn test_ambient_identity_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock(
                "GET",
                "/computeMetadata/v1/instance/service-accounts/default/token",
            )
            .match_header("metadata-flavor", "Google")
            .match_query(Matcher::UrlEncoded("scopes".into(), SCOPES.join(",")))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ambient","expires_in":3599,"token_type":"Bearer"}"#)
            .create_async()
            .await;

        let auth = MetadataAuthenticator::new(HttpClient::new().unwrap(), &config_for(&server));
        let token = auth.authenticate(SCOPES).await.unwrap();

        mock.assert_async().await;
        assert_eq!(token.value, "ambient");
        assert!(token.expires_at.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn test_impersonation_exchanges_source_token() {
        let mut server = mockito::Server::new_async().await;
        let source = server
            .mock(
                "GET",
                "/computeMetadata/v1/instance/service-accounts/default/token",
            )
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"access_token":"source","expires_in":3599}"#)
            .create_async()
            .await;
        let exchange = server
            .mock(
                "POST",
                "/v1/projects/-/serviceAccounts/bot%40demo.iam.gserviceaccount.com:generateAccessToken",
            )
            .match_header("authorization", "Bearer source")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "lifetime": "3600s",
                "scope": SCOPES,
            })))
            .with_status(200)
            .with_body(r#"{"accessToken":"impersonated","expireTime":"2030-01-01T00:00:00Z"}"#)
            .create_async()
            .await;

        let mut config = config_for(&server);
        config.service_account = Some("bot@demo.iam.gserviceaccount.com".into());
        let auth = MetadataAuthenticator::new(HttpClient::new().unwrap(), &config);
        let token = auth.authenticate(SCOPES).await.unwrap();

        source.assert_async().await;
        exchange.assert_async().await;
        assert_eq!(token.value, "impersonated");
        assert_eq!(
            token.expires_at.unwrap().to_rfc3339(),
            "2030-01-01T00:00:00+00:00"
        );
    }

    #[tokio::test]
    async fn test_rejected_token_request() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock(
                "GET",
                "/computeMetadata/v1/instance/service-accounts/default/token",
            )
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body("forbidden")
            .create_async()
            .await;

        let auth = MetadataAuthenticator::new(HttpClient::new().unwrap(), &config_for(&server));
        let err = auth.authenticate(SCOPES).await.unwrap_err();

        match err {
            AuthError::Rejected { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "forbidden");
            }
            other => panic!("Expected Rejected, got {:?}", other),
        }
    }
}
