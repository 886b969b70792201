use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::Form;
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::session::TokenSource;
use super::user::{StaffRole, User};
use super::{
    AttendanceLog, ChartPoint, DashboardStats, Envelope, LoginRequest, LoginResponse, Member,
    MemberId, MemberUpdate, NewUser, Package, PackageId, PackageInput, Profile, ProfileEnvelope,
    SubscribeRequest, UserId, UserUpdate,
};
use crate::config::Config;
use crate::errors::{GymError, GymResult};
use crate::listing::{Page, ServerQuery};

/// Gym API client. Every request picks up the current bearer token from the
/// injected [`TokenSource`] at the moment it is built.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    /// Base URL without a trailing slash, e.g. `http://localhost:8080/api`.
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

/// Client options. Pass this into [`Client::new`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Base URL of the API, including the `/api` prefix.
    pub base_url: String,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl From<&Config> for ClientOptions {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.api_url.clone(),
            timeout: config.request_timeout,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl Client {
    /// Creates a new gym API client.
    pub fn new(options: ClientOptions, tokens: Arc<dyn TokenSource>) -> GymResult<Self> {
        let parsed = Url::parse(&options.base_url)
            .map_err(|_| GymError::InvalidBaseUrl(options.base_url.clone()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(GymError::InvalidBaseUrl(options.base_url));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method.clone(), self.url(path));
        tracing::debug!(%method, path, "Sending request");

        match self.tokens.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends a request and decodes the JSON body.
    async fn call<T: DeserializeOwned>(&self, builder: RequestBuilder) -> GymResult<T> {
        let response = Self::check(builder.send().await?).await?;
        let bytes = response.bytes().await?;

        serde_json::from_slice(&bytes).map_err(|err| {
            tracing::debug!(error = %err, "Response body did not match the expected shape");
            GymError::FailedToDecode
        })
    }

    /// Sends a request whose response body is not needed.
    async fn call_unit(&self, builder: RequestBuilder) -> GymResult<()> {
        Self::check(builder.send().await?).await?;
        Ok(())
    }

    async fn check(response: reqwest::Response) -> GymResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.error)
            .unwrap_or(body);

        tracing::debug!(status = status.as_u16(), %message, "Request rejected");
        Err(GymError::from_status(status, message))
    }

    async fn get_data<T: DeserializeOwned + Default>(&self, path: &str) -> GymResult<T> {
        let envelope: Envelope<T> = self.call(self.request(Method::GET, path)).await?;
        Ok(envelope.data.unwrap_or_default())
    }

    async fn send_json<B: Serialize + ?Sized>(&self, method: Method, path: &str, body: &B) -> GymResult<()> {
        self.call_unit(self.request(method, path).json(body)).await
    }

    // ========== Auth ==========

    /// Exchanges credentials for a token. Does not touch the session; use
    /// [`Session::sign_in`](super::session::Session::sign_in) for that.
    pub async fn login(&self, email: &str, password: &str) -> GymResult<LoginResponse> {
        let request = self
            .request(Method::POST, "auth/login")
            .json(&LoginRequest { email, password });

        match self.call(request).await {
            Err(
                GymError::BadRequest(_) | GymError::Unauthorized(_) | GymError::Forbidden(_),
            ) => Err(GymError::InvalidCredentials),
            other => other,
        }
    }

    /// Profile of the account the current token belongs to.
    pub async fn me(&self) -> GymResult<Profile> {
        let envelope: ProfileEnvelope = self.call(self.request(Method::GET, "auth/me")).await?;
        Ok(envelope.user)
    }

    // ========== Reads ==========

    pub async fn members(&self) -> GymResult<Vec<Member>> {
        self.get_data("management/members").await
    }

    pub async fn packages(&self) -> GymResult<Vec<Package>> {
        self.get_data("management/packages").await
    }

    pub async fn users(&self, role: StaffRole) -> GymResult<Vec<User>> {
        let request = self
            .request(Method::GET, "admin/users")
            .query(&[("role", role.as_str())]);
        let envelope: Envelope<Vec<User>> = self.call(request).await?;
        Ok(envelope.data.unwrap_or_default())
    }

    /// One page of attendance logs. Only the query's page, limit and date
    /// range are sent.
    pub async fn attendance(&self, query: &ServerQuery) -> GymResult<Page<AttendanceLog>> {
        let request = self
            .request(Method::GET, "management/attendance")
            .query(&query.params());
        let envelope: Envelope<Vec<AttendanceLog>> = self.call(request).await?;
        Ok(Page::from_envelope(envelope))
    }

    pub async fn stats(&self) -> GymResult<DashboardStats> {
        self.get_data("admin/stats").await
    }

    /// Daily check-in counts for the last seven days.
    pub async fn attendance_chart(&self) -> GymResult<Vec<ChartPoint>> {
        self.get_data("admin/attendance/chart").await
    }

    // ========== Members ==========

    /// Creates a member. The form is multipart so it can carry a picture.
    pub async fn register_member(&self, form: Form) -> GymResult<()> {
        self.call_unit(self.request(Method::POST, "auth/register").multipart(form))
            .await
    }

    pub async fn update_member(&self, id: MemberId, update: &MemberUpdate) -> GymResult<()> {
        self.send_json(Method::PUT, &format!("admin/members/{id}"), update)
            .await
    }

    pub async fn delete_member(&self, id: MemberId) -> GymResult<()> {
        self.call_unit(self.request(Method::DELETE, &format!("admin/members/{id}")))
            .await
    }

    /// Puts a member on a package, restarting the subscription from today.
    pub async fn subscribe(&self, request: &SubscribeRequest) -> GymResult<()> {
        self.send_json(Method::POST, "management/members/subscribe", request)
            .await
    }

    pub async fn toggle_member(&self, id: MemberId) -> GymResult<()> {
        self.call_unit(self.request(Method::POST, &format!("management/members/{id}/toggle")))
            .await
    }

    // ========== Staff & trainers ==========

    pub async fn create_user(&self, user: &NewUser) -> GymResult<()> {
        self.send_json(Method::POST, "admin/users", user).await
    }

    pub async fn update_user(&self, id: UserId, update: &UserUpdate) -> GymResult<()> {
        self.send_json(Method::PUT, &format!("admin/users/{id}"), update)
            .await
    }

    pub async fn delete_user(&self, id: UserId) -> GymResult<()> {
        self.call_unit(self.request(Method::DELETE, &format!("admin/users/{id}")))
            .await
    }

    pub async fn toggle_user(&self, id: UserId) -> GymResult<()> {
        self.call_unit(self.request(Method::POST, &format!("admin/users/{id}/toggle")))
            .await
    }

    // ========== Packages ==========

    pub async fn create_package(&self, package: &PackageInput) -> GymResult<()> {
        self.send_json(Method::POST, "admin/packages", package).await
    }

    pub async fn update_package(&self, id: PackageId, package: &PackageInput) -> GymResult<()> {
        self.send_json(Method::PUT, &format!("admin/packages/{id}"), package)
            .await
    }

    pub async fn delete_package(&self, id: PackageId) -> GymResult<()> {
        self.call_unit(self.request(Method::DELETE, &format!("admin/packages/{id}")))
            .await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoToken;

    impl TokenSource for NoToken {
        fn token(&self) -> Option<String> {
            None
        }
    }

    fn options(base_url: &str) -> ClientOptions {
        ClientOptions {
            base_url: base_url.to_string(),
            timeout: None,
        }
    }

    #[test]
    fn rejects_bad_base_urls() {
        assert!(matches!(
            Client::new(options("localhost:8080"), Arc::new(NoToken)),
            Err(GymError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            Client::new(options("ftp://gym.test/api"), Arc::new(NoToken)),
            Err(GymError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn joins_paths() {
        let client = Client::new(options("http://localhost:8080/api/"), Arc::new(NoToken)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/api");
        assert_eq!(
            client.url("/management/members"),
            "http://localhost:8080/api/management/members"
        );
        assert_eq!(client.url("admin/stats"), "http://localhost:8080/api/admin/stats");
    }
}
