//! SkyPortal API client.
//!
//! Only the two read endpoints the listener needs are wrapped:
//! `/api/observation_plan` and `/api/gcn_event/<dateobs>`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, Method};
use serde_json::Value;

use super::error::{handle_response, ClientError};

/// Prefix SkyPortal puts in front of LIGO/Virgo aliases.
const LVC_ALIAS_PREFIX: &str = "LVC#";

/// Source of observation plans.
#[async_trait]
pub trait PlanSource: Send + Sync {
    /// Completed plans for `instrument_id` created between `start` and `end`,
    /// with their planned observations, flattened across localization requests.
    async fn fetch_observation_plans(
        &self,
        instrument_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Value>, ClientError>;

    /// Display name of the event triggered at `dateobs`.
    async fn fetch_event_name(&self, dateobs: &str) -> Result<String, ClientError>;
}

/// HTTP client for SkyPortal.
#[derive(Debug, Clone)]
pub struct SkyPortalClient {
    base_url: String,
    token: String,
    client: Client,
}

impl SkyPortalClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a request carrying the `Authorization: token <token>` header.
    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, &url)
            .header(header::AUTHORIZATION, format!("token {}", self.token))
    }
}

#[async_trait]
impl PlanSource for SkyPortalClient {
    async fn fetch_observation_plans(
        &self,
        instrument_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Value>, ClientError> {
        let params = [
            ("instrumentID", instrument_id.to_string()),
            ("startDate", isot(start)),
            ("endDate", isot(end)),
            ("status", "complete".to_string()),
            ("includePlannedObservations", "True".to_string()),
        ];
        let response = self
            .request(Method::GET, "/api/observation_plan")
            .query(&params)
            .send()
            .await?;
        let body: Value = handle_response(response).await?;
        plans_from_response(&body)
    }

    async fn fetch_event_name(&self, dateobs: &str) -> Result<String, ClientError> {
        let response = self
            .request(Method::GET, &format!("/api/gcn_event/{}", dateobs))
            .send()
            .await?;
        let body: Value = handle_response(response).await?;
        event_name_from_response(&body).ok_or_else(|| {
            ClientError::InvalidResponse(format!("event {} has no aliases", dateobs))
        })
    }
}

fn isot(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

/// Plans listed under `data.requests[].observation_plans[]`.
pub fn plans_from_response(body: &Value) -> Result<Vec<Value>, ClientError> {
    let requests = body
        .pointer("/data/requests")
        .and_then(Value::as_array)
        .ok_or_else(|| ClientError::InvalidResponse("missing data.requests".to_string()))?;

    Ok(requests
        .iter()
        .filter_map(|request| request.get("observation_plans").and_then(Value::as_array))
        .flatten()
        .cloned()
        .collect())
}

/// First alias of a GCN event reply, without the `LVC#` prefix.
pub fn event_name_from_response(body: &Value) -> Option<String> {
    let alias = body.pointer("/data/aliases/0")?.as_str()?;
    Some(alias.strip_prefix(LVC_ALIAS_PREFIX).unwrap_or(alias).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_event_name_strips_lvc_prefix() {
        let body = json!({"data": {"aliases": ["LVC#S230520ae", "GW230520"]}});
        assert_eq!(event_name_from_response(&body).as_deref(), Some("S230520ae"));

        let body = json!({"data": {"aliases": ["GRB230520A"]}});
        assert_eq!(event_name_from_response(&body).as_deref(), Some("GRB230520A"));
    }

    #[test]
    fn test_event_name_without_aliases() {
        assert!(event_name_from_response(&json!({"data": {"aliases": []}})).is_none());
        assert!(event_name_from_response(&json!({"status": "error"})).is_none());
    }

    #[test]
    fn test_plans_are_flattened_across_requests() {
        let body = json!({"data": {"requests": [
            {"localization_id": 1, "observation_plans": [{"id": 1}, {"id": 2}]},
            {"localization_id": 2, "observation_plans": []},
            {"localization_id": 3, "observation_plans": [{"id": 3}]}
        ]}});
        let ids: Vec<i64> = plans_from_response(&body)
            .unwrap()
            .iter()
            .filter_map(|p| p["id"].as_i64())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_requests_is_invalid() {
        assert!(matches!(
            plans_from_response(&json!({"data": {}})),
            Err(ClientError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_isot_format() {
        let t = Utc.with_ymd_and_hms(2023, 5, 20, 10, 11, 12).unwrap();
        assert_eq!(isot(t), "2023-05-20T10:11:12.000");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = SkyPortalClient::new("https://skyportal.example.org/", "tok");
        assert_eq!(client.base_url(), "https://skyportal.example.org");
    }
}
