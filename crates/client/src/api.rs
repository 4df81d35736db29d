//! REST API client for the annotation backend.
//!
//! Wraps the annotation persistence, verification, question and taxonomy
//! endpoints using [`reqwest`]. Every response body uses the
//! `{ "data": ... }` envelope.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use surveyqa_core::annotation::{Annotation, SubjectType};
use surveyqa_core::error::CoreError;
use surveyqa_core::question::Question;
use surveyqa_core::taxonomy::{MasterLabel, Taxonomy};

use crate::config::ClientConfig;
use crate::store::AnnotationStore;

/// Errors from the annotation REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API returned a non-2xx status code.
    #[error("Annotation API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The record was rejected before it left the process.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The configured base URL cannot have path segments appended.
    #[error("Invalid base URL '{0}'")]
    InvalidBaseUrl(String),
}

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct VerifyResult {
    success: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest {
    subject_type: SubjectType,
}

/// HTTP client for the annotation backend.
#[derive(Debug, Clone)]
pub struct HttpAnnotationApi {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpAnnotationApi {
    /// Build a client with the configured request timeout.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Self::with_client(client, &config.base_url)
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool).
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|_| ApiError::InvalidBaseUrl(base_url.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Fetch a question with its system-provided labels.
    ///
    /// Sends `GET /surveys/{survey_id}/questions/{question_id}`. A missing
    /// question is `Ok(None)` so callers can render a placeholder.
    pub async fn fetch_question(
        &self,
        survey_id: &str,
        question_id: &str,
    ) -> Result<Option<Question>, ApiError> {
        let response = self
            .client
            .get(self.endpoint(["surveys", survey_id, "questions", question_id]))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let envelope: DataResponse<Question> = Self::parse_response(response).await?;
        Ok(Some(envelope.data))
    }

    /// Fetch the master label catalog.
    ///
    /// Sends `GET /taxonomy/labels`.
    pub async fn fetch_taxonomy(&self) -> Result<Taxonomy, ApiError> {
        let response = self
            .client
            .get(self.endpoint(["taxonomy", "labels"]))
            .send()
            .await?;

        let envelope: DataResponse<Vec<MasterLabel>> = Self::parse_response(response).await?;
        Ok(Taxonomy::new(envelope.data))
    }

    /// `base_url` with each segment appended, percent-encoded.
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `with_client`: the base can always take segments.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, otherwise turn it
    /// into an [`ApiError::Api`] carrying the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl AnnotationStore for HttpAnnotationApi {
    /// Sends `PUT /surveys/{survey_id}/annotations/{subject_id}`.
    async fn upsert_annotation(
        &self,
        survey_id: &str,
        annotation: &Annotation,
    ) -> Result<Annotation, ApiError> {
        annotation.validate()?;

        let response = self
            .client
            .put(self.endpoint([
                "surveys",
                survey_id,
                "annotations",
                annotation.subject_id.as_str(),
            ]))
            .json(annotation)
            .send()
            .await?;

        let envelope: DataResponse<Annotation> = Self::parse_response(response).await?;
        Ok(envelope.data)
    }

    /// Sends `GET /surveys/{survey_id}/annotations/{subject_id}`.
    async fn fetch_annotation(
        &self,
        survey_id: &str,
        subject_id: &str,
    ) -> Result<Option<Annotation>, ApiError> {
        let response = self
            .client
            .get(self.endpoint(["surveys", survey_id, "annotations", subject_id]))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let envelope: DataResponse<Annotation> = Self::parse_response(response).await?;
        Ok(Some(envelope.data))
    }

    /// Sends `POST /surveys/{survey_id}/annotations/{annotation_id}/verify`.
    async fn verify_annotation(
        &self,
        survey_id: &str,
        annotation_id: &str,
        subject_type: SubjectType,
    ) -> Result<bool, ApiError> {
        let response = self
            .client
            .post(self.endpoint([
                "surveys",
                survey_id,
                "annotations",
                annotation_id,
                "verify",
            ]))
            .json(&VerifyRequest { subject_type })
            .send()
            .await?;

        let envelope: DataResponse<VerifyResult> = Self::parse_response(response).await?;
        Ok(envelope.data.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_client_trims_base_url() {
        let api = HttpAnnotationApi::with_client(reqwest::Client::new(), "http://x/api/").unwrap();
        assert_eq!(api.base_url(), "http://x/api");
        assert_eq!(
            api.endpoint(["surveys", "survey-1", "annotations", "Q1"]).as_str(),
            "http://x/api/surveys/survey-1/annotations/Q1"
        );
    }

    #[test]
    fn endpoint_percent_encodes_ids() {
        let api = HttpAnnotationApi::with_client(reqwest::Client::new(), "http://x/api").unwrap();
        let url = api.endpoint(["surveys", "s 1", "annotations", "sec/2?x#y"]);
        assert_eq!(
            url.as_str(),
            "http://x/api/surveys/s%201/annotations/sec%2F2%3Fx%23y"
        );
    }

    #[test]
    fn endpoint_on_host_root() {
        let api = HttpAnnotationApi::with_client(reqwest::Client::new(), "http://x/").unwrap();
        assert_eq!(
            api.endpoint(["taxonomy", "labels"]).as_str(),
            "http://x/taxonomy/labels"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            HttpAnnotationApi::with_client(reqwest::Client::new(), "not a url"),
            Err(ApiError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            HttpAnnotationApi::with_client(reqwest::Client::new(), "mailto:team@example.com"),
            Err(ApiError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn api_error_display() {
        let err = ApiError::Api {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "Annotation API error (502): bad gateway");
    }

    #[test]
    fn api_error_display_request() {
        let req_err = reqwest::Client::new().get("://bad").build().unwrap_err();
        let err = ApiError::Request(req_err);
        assert!(err.to_string().contains("HTTP request failed"));
    }

    #[test]
    fn verify_request_uses_wire_names() {
        let body = serde_json::to_value(VerifyRequest {
            subject_type: SubjectType::Section,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"subjectType": "section"}));
    }
}
