//! HTTP implementation of the REST traits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::error::server_message;
use super::{AuthApi, MedicationApi, PrescriptionApi, ReminderApi};
use crate::config::{ClientConfig, APP_NAME, APP_VERSION};
use crate::error::ClientError;
use crate::models::{
    AuthResponse, Credentials, ImageUpload, Medication, MedicationInput, NewReminder,
    NotificationReceipt, OcrExtraction, Prescription, PrescriptionCommit, RecordId, Registration,
    Reminder, ReminderFilter, ReminderPatch, User,
};
use crate::session::Session;

const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Whether a request carries the session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    Bearer,
    /// Login and register must go out bare: the server rejects a stale
    /// token even on endpoints that allow anonymous access.
    Anonymous,
}

pub struct HttpClient {
    base_url: String,
    client: reqwest::Client,
    session: Arc<Session>,
    timeout_secs: u64,
}

impl HttpClient {
    pub fn new(config: &ClientConfig, session: Arc<Session>) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(format!("{APP_NAME}/{APP_VERSION}"))
            .build()
            .map_err(|e| ClientError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            client,
            session,
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn request(&self, method: Method, path: &str, auth: Auth) -> (RequestBuilder, Uuid) {
        let url = format!("{}{}", self.base_url, path);
        let request_id = Uuid::new_v4();
        let mut builder = self
            .client
            .request(method, &url)
            .header(REQUEST_ID_HEADER, request_id.to_string());
        if auth == Auth::Bearer {
            if let Some(token) = self.session.token() {
                builder = builder.bearer_auth(token.as_str());
            }
        }
        (builder, request_id)
    }

    /// Send and map transport failures and non-2xx statuses.
    async fn send(&self, builder: RequestBuilder, request_id: Uuid, auth: Auth) -> Result<Response, ClientError> {
        let response = builder.send().await.map_err(|e| {
            tracing::warn!(%request_id, error = %e, "Request failed");
            self.transport_error(e)
        })?;

        let status = response.status();
        tracing::debug!(%request_id, status = status.as_u16(), url = %response.url(), "Response received");
        if status.is_success() {
            return Ok(response);
        }

        if auth == Auth::Bearer
            && (status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN)
        {
            tracing::info!(%request_id, status = status.as_u16(), "Token rejected, ending session");
            self.session.invalidate();
            return Err(ClientError::Unauthorized);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Server {
            status: status.as_u16(),
            message: server_message(&body),
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> ClientError {
        if e.is_connect() {
            ClientError::Network(format!("Cannot connect to {}", self.base_url))
        } else if e.is_timeout() {
            ClientError::Network(format!("Request timed out after {}s", self.timeout_secs))
        } else if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Network(e.to_string())
        }
    }

    async fn json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        request_id: Uuid,
        auth: Auth,
    ) -> Result<T, ClientError> {
        let response = self.send(builder, request_id, auth).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn empty(&self, builder: RequestBuilder, request_id: Uuid) -> Result<(), ClientError> {
        self.send(builder, request_id, Auth::Bearer).await?;
        Ok(())
    }
}

/// Query parameters for the reminder list. The server filters on a
/// `status` field rather than the boolean flag.
fn reminder_query(filter: &ReminderFilter) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(is_done) = filter.is_done {
        let status = if is_done { "done" } else { "pending" };
        query.push(("status", status.to_string()));
    }
    if let Some(repeat) = filter.repeat {
        query.push(("repeat", repeat.as_str().to_string()));
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        query.push(("search", search.trim().to_string()));
    }
    if let Some(ordering) = filter.ordering.as_deref().filter(|s| !s.trim().is_empty()) {
        query.push(("ordering", ordering.trim().to_string()));
    }
    query
}

// ═══════════════════════════════════════════════════════════
// Resource endpoints
// ═══════════════════════════════════════════════════════════

#[async_trait]
impl MedicationApi for HttpClient {
    async fn list_medications(&self) -> Result<Vec<Medication>, ClientError> {
        let (req, id) = self.request(Method::GET, "/api/medications/", Auth::Bearer);
        self.json(req, id, Auth::Bearer).await
    }

    async fn create_medication(&self, input: &MedicationInput) -> Result<Medication, ClientError> {
        let (req, id) = self.request(Method::POST, "/api/medications/", Auth::Bearer);
        self.json(req.json(input), id, Auth::Bearer).await
    }

    async fn update_medication(
        &self,
        id: RecordId,
        input: &MedicationInput,
    ) -> Result<Medication, ClientError> {
        let (req, request_id) =
            self.request(Method::PUT, &format!("/api/medications/{id}/"), Auth::Bearer);
        self.json(req.json(input), request_id, Auth::Bearer).await
    }

    async fn delete_medication(&self, id: RecordId) -> Result<(), ClientError> {
        let (req, request_id) =
            self.request(Method::DELETE, &format!("/api/medications/{id}/"), Auth::Bearer);
        self.empty(req, request_id).await
    }
}

#[async_trait]
impl ReminderApi for HttpClient {
    async fn list_reminders(&self, filter: &ReminderFilter) -> Result<Vec<Reminder>, ClientError> {
        let (req, id) = self.request(Method::GET, "/api/reminders/", Auth::Bearer);
        self.json(req.query(&reminder_query(filter)), id, Auth::Bearer)
            .await
    }

    async fn create_reminder(&self, reminder: &NewReminder) -> Result<Reminder, ClientError> {
        let (req, id) = self.request(Method::POST, "/api/reminders/", Auth::Bearer);
        self.json(req.json(reminder), id, Auth::Bearer).await
    }

    async fn update_reminder(
        &self,
        id: RecordId,
        patch: &ReminderPatch,
    ) -> Result<Reminder, ClientError> {
        let (req, request_id) =
            self.request(Method::PATCH, &format!("/api/reminders/{id}/"), Auth::Bearer);
        self.json(req.json(patch), request_id, Auth::Bearer).await
    }

    async fn delete_reminder(&self, id: RecordId) -> Result<(), ClientError> {
        let (req, request_id) =
            self.request(Method::DELETE, &format!("/api/reminders/{id}/"), Auth::Bearer);
        self.empty(req, request_id).await
    }

    async fn send_test_notification(
        &self,
        id: RecordId,
    ) -> Result<NotificationReceipt, ClientError> {
        let (req, request_id) = self.request(
            Method::POST,
            &format!("/api/reminders/{id}/send_test/"),
            Auth::Bearer,
        );
        self.json(req, request_id, Auth::Bearer).await
    }
}

#[async_trait]
impl PrescriptionApi for HttpClient {
    async fn upload_prescription(&self, image: &ImageUpload) -> Result<OcrExtraction, ClientError> {
        let part = reqwest::multipart::Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime_type())
            .map_err(|e| ClientError::Decode(format!("Invalid image type: {e}")))?;
        let form = reqwest::multipart::Form::new().part("image", part);

        tracing::info!(file = %image.file_name, size = image.bytes.len(), "Uploading prescription image");
        let (req, id) = self.request(Method::POST, "/api/ocr/upload/", Auth::Bearer);
        self.json(req.multipart(form), id, Auth::Bearer).await
    }

    async fn create_prescription(
        &self,
        commit: &PrescriptionCommit,
    ) -> Result<Prescription, ClientError> {
        let (req, id) = self.request(Method::POST, "/api/prescriptions/", Auth::Bearer);
        self.json(req.json(commit), id, Auth::Bearer).await
    }

    async fn update_prescription(
        &self,
        id: RecordId,
        commit: &PrescriptionCommit,
    ) -> Result<Prescription, ClientError> {
        let (req, request_id) =
            self.request(Method::PATCH, &format!("/api/prescriptions/{id}/"), Auth::Bearer);
        self.json(req.json(commit), request_id, Auth::Bearer).await
    }
}

#[async_trait]
impl AuthApi for HttpClient {
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ClientError> {
        let (req, id) = self.request(Method::POST, "/api/auth/login/", Auth::Anonymous);
        self.json(req.json(credentials), id, Auth::Anonymous).await
    }

    async fn register(&self, registration: &Registration) -> Result<AuthResponse, ClientError> {
        let (req, id) = self.request(Method::POST, "/api/auth/register/", Auth::Anonymous);
        self.json(req.json(registration), id, Auth::Anonymous).await
    }

    async fn current_user(&self) -> Result<User, ClientError> {
        let (req, id) = self.request(Method::GET, "/api/auth/user/", Auth::Bearer);
        self.json(req, id, Auth::Bearer).await
    }

    async fn logout(&self) -> Result<(), ClientError> {
        let (req, id) = self.request(Method::POST, "/api/auth/logout/", Auth::Bearer);
        self.empty(req, id).await
    }
}
