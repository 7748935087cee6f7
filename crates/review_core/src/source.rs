use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use shared::{
    error::ApiError,
    protocol::{
        KanjiAnswer, LoginResponse, ReviewBatchResponse, SubmitAnswersRequest, TelegramCredential,
    },
};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{error::SourceError, ReviewSource};

/// [`ReviewSource`] backed by the review backend's JSON API.
pub struct HttpReviewSource {
    http: Client,
    server_url: String,
    token: RwLock<Option<String>>,
}

impl HttpReviewSource {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), server_url)
    }

    pub fn with_client(http: Client, server_url: impl Into<String>) -> Self {
        let server_url = server_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            server_url,
            token: RwLock::new(None),
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    async fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, SourceError> {
        let guard = self.token.read().await;
        let token = guard.as_deref().ok_or(SourceError::Unauthorized)?;
        Ok(builder.bearer_auth(token))
    }

    async fn checked(response: Response) -> Result<Response, SourceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let api_error = ApiError::from_response(status.as_u16(), &body);
        warn!(
            status = status.as_u16(),
            code = ?api_error.code,
            "review backend request failed"
        );
        Err(SourceError::from_api(status.as_u16(), api_error))
    }
}

#[async_trait]
impl ReviewSource for HttpReviewSource {
    async fn authenticate(&self, credential: &TelegramCredential) -> Result<String, SourceError> {
        let response = self
            .http
            .post(format!("{}/api/login", self.server_url))
            .json(credential)
            .send()
            .await?;
        let body: LoginResponse = Self::checked(response).await?.json().await?;
        *self.token.write().await = Some(body.token.clone());
        info!(user = %credential.username, "auth: signed in");
        Ok(body.token)
    }

    async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    async fn has_token(&self) -> bool {
        self.token.read().await.is_some()
    }

    async fn fetch_review_batch(&self) -> Result<ReviewBatchResponse, SourceError> {
        let request = self
            .authorized(self.http.get(format!("{}/api/kanjis", self.server_url)))
            .await?;
        let response = Self::checked(request.send().await?).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| SourceError::Decode(e.to_string()))
    }

    async fn submit_batch_result(&self, answers: &[KanjiAnswer]) -> Result<(), SourceError> {
        let request = self
            .authorized(self.http.post(format!("{}/api/answers", self.server_url)))
            .await?
            .json(&SubmitAnswersRequest {
                answers: answers.to_vec(),
            });
        Self::checked(request.send().await?).await?;
        Ok(())
    }

    async fn request_additional_material(&self) -> Result<(), SourceError> {
        let request = self
            .authorized(self.http.post(format!("{}/api/learn-more", self.server_url)))
            .await?;
        Self::checked(request.send().await?).await?;
        Ok(())
    }
}
