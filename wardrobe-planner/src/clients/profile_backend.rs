//! Cloud profile backend
//!
//! A PostgREST-style `profiles` table keyed by user id. Each row carries the
//! profile and preferences as JSON documents next to a few flat columns.

use super::{build_http_client, check_status, ClientError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One row of the remote `profiles` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteProfile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Partial `UserProfile` document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<serde_json::Value>,
    /// Partial `UserPreferences` document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[async_trait]
pub trait ProfileBackend: Send + Sync {
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<RemoteProfile>, ClientError>;

    /// Insert or merge the row with `profile.id`
    async fn upsert_profile(&self, profile: &RemoteProfile) -> Result<(), ClientError>;

    async fn delete_profile(&self, user_id: &str) -> Result<(), ClientError>;
}

/// REST client for the `profiles` table
pub struct RestProfileClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestProfileClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self {
            http_client: build_http_client()?,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/profiles", self.base_url.trim_end_matches('/'))
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

#[async_trait]
impl ProfileBackend for RestProfileClient {
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<RemoteProfile>, ClientError> {
        debug!(user_id = %user_id, "Fetching remote profile");
        let request = self
            .http_client
            .get(self.table_url())
            .query(&[("id", format!("eq.{}", user_id)), ("select", "*".to_string())]);
        let response = self.authorized(request).send().await?;
        let rows: Vec<RemoteProfile> = check_status(response).await?.json().await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_profile(&self, profile: &RemoteProfile) -> Result<(), ClientError> {
        if profile.id.is_empty() {
            return Err(ClientError::NotConfigured("profile row has no user id".to_string()));
        }
        debug!(user_id = %profile.id, "Upserting remote profile");
        let request = self
            .http_client
            .post(self.table_url())
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[profile]);
        let response = self.authorized(request).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn delete_profile(&self, user_id: &str) -> Result<(), ClientError> {
        let request = self
            .http_client
            .delete(self.table_url())
            .query(&[("id", format!("eq.{}", user_id))]);
        let response = self.authorized(request).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, headers, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_profile_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .and(query_param("id", "eq.u1"))
            .and(header("apikey", "anon"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": "u1",
                "full_name": "Ada",
                "profile": {"name": "Ada", "style": "minimal"}
            }])))
            .mount(&server)
            .await;

        let client = RestProfileClient::new(server.uri(), "anon").unwrap();
        let row = client.fetch_profile("u1").await.unwrap().unwrap();
        assert_eq!(row.full_name.as_deref(), Some("Ada"));
        assert_eq!(row.profile.unwrap()["style"], "minimal");
    }

    #[tokio::test]
    async fn test_fetch_missing_profile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = RestProfileClient::new(server.uri(), "anon").unwrap();
        assert_eq!(client.fetch_profile("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_upsert_requests_merge() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/profiles"))
            .and(headers(
                "Prefer",
                vec!["resolution=merge-duplicates", "return=minimal"],
            ))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = RestProfileClient::new(server.uri(), "anon").unwrap();
        let row = RemoteProfile {
            id: "u1".to_string(),
            ..Default::default()
        };
        client.upsert_profile(&row).await.unwrap();
    }

    #[tokio::test]
    async fn test_upsert_without_id_is_rejected() {
        let client = RestProfileClient::new("http://127.0.0.1:9", "anon").unwrap();
        let result = client.upsert_profile(&RemoteProfile::default()).await;
        assert!(matches!(result, Err(ClientError::NotConfigured(_))));
    }
}
