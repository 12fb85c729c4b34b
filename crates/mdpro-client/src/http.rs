//! HTTP gateway to `mdpro-api`.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use mdpro_core::{
    Category, ChangeEnvelope, CreateCategoryRequest, CreateDocumentRequest, CreateShareRequest,
    Credentials, Document, Error, MoveDocumentRequest, RecoveryRequest, RecoveryVerifyRequest,
    RenameCategoryRequest, Result, Session, ShareLink, ShareResolution, Table,
    UnlockShareRequest, UpdateDocumentRequest, UpdateProfileRequest, UserIdentity, UserProfile,
};

use crate::backend::{AuthEvent, Backend, ChangeStream, AUTH_EVENT_CAPACITY};
use crate::config::ClientConfig;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Default)]
struct AuthState {
    token: Option<String>,
    session: Option<Session>,
}

/// [`Backend`] over the mdpro HTTP API and its WebSocket change feed.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    ws_url: String,
    auth: RwLock<AuthState>,
    auth_tx: broadcast::Sender<AuthEvent>,
}

/// Translate a non-success response into the shared error type.
async fn error_from_response(response: Response) -> Error {
    let status = response.status();
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    };
    match status {
        StatusCode::UNAUTHORIZED => Error::Unauthorized(message),
        StatusCode::FORBIDDEN => Error::Forbidden(message),
        StatusCode::NOT_FOUND => Error::NotFound(message),
        StatusCode::CONFLICT => Error::Conflict(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Error::InvalidInput(message),
        _ => Error::Request(format!("{}: {}", status, message)),
    }
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }
    Ok(response.json().await?)
}

async fn send_empty(request: RequestBuilder) -> Result<()> {
    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }
    Ok(())
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        let (auth_tx, _) = broadcast::channel(AUTH_EVENT_CAPACITY);

        info!(api_url = %config.api_url, "Initializing HTTP backend");
        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            ws_url: config.ws_url(),
            auth: RwLock::new(AuthState {
                token: config.access_token.clone(),
                session: None,
            }),
            auth_tx,
        })
    }

    /// Adopt a previously issued session, e.g. one loaded from disk.
    pub async fn restore(&self, session: Session) {
        let mut auth = self.auth.write().await;
        auth.token = Some(session.access_token.clone());
        auth.session = Some(session);
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    async fn token(&self) -> Result<String> {
        self.auth
            .read()
            .await
            .token
            .clone()
            .ok_or_else(|| Error::Unauthorized("not signed in".to_string()))
    }

    async fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self.token().await?;
        Ok(self
            .client
            .request(method, self.url(path))
            .bearer_auth(token))
    }

    async fn adopt(&self, session: &Session, event: AuthEvent) {
        {
            let mut auth = self.auth.write().await;
            auth.token = Some(session.access_token.clone());
            auth.session = Some(session.clone());
        }
        let _ = self.auth_tx.send(event);
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn session(&self) -> Option<Session> {
        self.auth.read().await.session.clone()
    }

    async fn current_user(&self) -> Result<Option<UserIdentity>> {
        let request = match self.authed(Method::GET, "/auth/user").await {
            Ok(request) => request,
            Err(Error::Unauthorized(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        match send_json(request).await {
            Ok(user) => Ok(Some(user)),
            Err(Error::Unauthorized(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, credentials), fields(subsystem = "client", op = "sign_up"))]
    async fn sign_up(&self, credentials: Credentials) -> Result<Session> {
        let session: Session = send_json(
            self.client
                .post(self.url("/auth/signup"))
                .json(&credentials),
        )
        .await?;
        self.adopt(&session, AuthEvent::SignedIn(session.clone())).await;
        Ok(session)
    }

    #[instrument(skip(self, credentials), fields(subsystem = "client", op = "sign_in"))]
    async fn sign_in(&self, credentials: Credentials) -> Result<Session> {
        let session: Session = send_json(
            self.client
                .post(self.url("/auth/signin"))
                .json(&credentials),
        )
        .await?;
        self.adopt(&session, AuthEvent::SignedIn(session.clone())).await;
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        // Local state is cleared even if the server call fails.
        let result = match self.authed(Method::POST, "/auth/signout").await {
            Ok(request) => send_empty(request).await,
            Err(_) => Ok(()),
        };
        *self.auth.write().await = AuthState::default();
        let _ = self.auth_tx.send(AuthEvent::SignedOut);
        result
    }

    async fn update_user_password(&self, password: &str) -> Result<()> {
        let request = self
            .authed(Method::PUT, "/auth/password")
            .await?
            .json(&serde_json::json!({ "password": password }));
        send_empty(request).await?;
        // The server turns a recovery session into a regular one here.
        if let Some(session) = self.auth.write().await.session.as_mut() {
            session.recovery = false;
        }
        let _ = self.auth_tx.send(AuthEvent::UserUpdated);
        Ok(())
    }

    async fn request_recovery(&self, email: &str) -> Result<()> {
        send_empty(
            self.client
                .post(self.url("/auth/recover"))
                .json(&RecoveryRequest {
                    email: email.to_string(),
                }),
        )
        .await
    }

    async fn verify_recovery(&self, token: &str) -> Result<Session> {
        let session: Session = send_json(
            self.client
                .post(self.url("/auth/recover/verify"))
                .json(&RecoveryVerifyRequest {
                    token: token.to_string(),
                }),
        )
        .await?;
        self.adopt(&session, AuthEvent::PasswordRecovery(session.clone()))
            .await;
        Ok(session)
    }

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth_tx.subscribe()
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        send_json(self.authed(Method::GET, "/documents").await?).await
    }

    async fn fetch_document(&self, id: Uuid) -> Result<Document> {
        send_json(self.authed(Method::GET, &format!("/documents/{}", id)).await?).await
    }

    async fn insert_document(&self, req: CreateDocumentRequest) -> Result<Document> {
        send_json(self.authed(Method::POST, "/documents").await?.json(&req)).await
    }

    async fn update_document(&self, id: Uuid, req: UpdateDocumentRequest) -> Result<Document> {
        send_json(
            self.authed(Method::PATCH, &format!("/documents/{}", id))
                .await?
                .json(&req),
        )
        .await
    }

    async fn move_document(&self, id: Uuid, category_id: Option<Uuid>) -> Result<Document> {
        send_json(
            self.authed(Method::PUT, &format!("/documents/{}/category", id))
                .await?
                .json(&MoveDocumentRequest { category_id }),
        )
        .await
    }

    async fn delete_document(&self, id: Uuid) -> Result<()> {
        send_empty(self.authed(Method::DELETE, &format!("/documents/{}", id)).await?).await
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        send_json(self.authed(Method::GET, "/categories").await?).await
    }

    async fn insert_category(&self, req: CreateCategoryRequest) -> Result<Category> {
        send_json(self.authed(Method::POST, "/categories").await?.json(&req)).await
    }

    async fn rename_category(&self, id: Uuid, name: &str) -> Result<Category> {
        send_json(
            self.authed(Method::PATCH, &format!("/categories/{}", id))
                .await?
                .json(&RenameCategoryRequest {
                    name: name.to_string(),
                }),
        )
        .await
    }

    async fn delete_category(&self, id: Uuid) -> Result<()> {
        send_empty(self.authed(Method::DELETE, &format!("/categories/{}", id)).await?).await
    }

    async fn get_profile(&self) -> Result<UserProfile> {
        send_json(self.authed(Method::GET, "/profile").await?).await
    }

    async fn update_profile(&self, req: UpdateProfileRequest) -> Result<UserProfile> {
        let profile = send_json(self.authed(Method::PATCH, "/profile").await?.json(&req)).await?;
        let _ = self.auth_tx.send(AuthEvent::UserUpdated);
        Ok(profile)
    }

    async fn insert_share(&self, document_id: Uuid, req: CreateShareRequest) -> Result<ShareLink> {
        send_json(
            self.authed(Method::POST, &format!("/documents/{}/shares", document_id))
                .await?
                .json(&req),
        )
        .await
    }

    async fn resolve_share(
        &self,
        token: &str,
        password: Option<&str>,
    ) -> Result<ShareResolution> {
        let request = match password {
            Some(password) => self
                .client
                .post(self.url(&format!("/shares/{}/unlock", token)))
                .json(&UnlockShareRequest {
                    password: password.to_string(),
                }),
            None => self.client.get(self.url(&format!("/shares/{}", token))),
        };

        let response = request.send().await?;
        // Every resolution outcome has its own status code and a tagged body.
        match response.status() {
            StatusCode::OK
            | StatusCode::UNAUTHORIZED
            | StatusCode::FORBIDDEN
            | StatusCode::NOT_FOUND
            | StatusCode::GONE => Ok(response.json().await?),
            _ => Err(error_from_response(response).await),
        }
    }

    async fn subscribe_to_changes(&self, tables: &[Table]) -> Result<ChangeStream> {
        let token = self.token().await?;
        let tables = tables
            .iter()
            .map(Table::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let url = format!(
            "{}/api/v1/realtime?tables={}&access_token={}",
            self.ws_url, tables, token
        );

        let (ws, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| Error::Request(format!("realtime connect failed: {}", e)))?;
        debug!(%tables, "Subscribed to changes");

        let stream = ws.filter_map(|msg| async move {
            match msg {
                Ok(Message::Text(text)) => serde_json::from_str::<ChangeEnvelope>(&text).ok(),
                _ => None,
            }
        });
        Ok(stream.boxed())
    }
}
