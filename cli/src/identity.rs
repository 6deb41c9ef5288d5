use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// Client-credentials settings for the identity provider's management API.
#[derive(Debug, Clone)]
pub struct IdentitySettings {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Management API base, also used as the token audience.
    pub api_uri: String,
}

impl IdentitySettings {
    /// Read `AUTH0_*` variables. Returns `None` if any is unset or empty.
    pub fn from_env() -> Option<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Some(Self {
            token_url: var("AUTH0_TOKEN_URL")?,
            client_id: var("AUTH0_CLIENT_ID")?,
            client_secret: var("AUTH0_CLIENT_SECRET")?,
            api_uri: var("AUTH0_API_URI")?,
        })
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    audience: &'a str,
    grant_type: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// A user as exposed by `/user`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub email: Option<String>,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub id: Option<String>,
}

#[derive(Deserialize)]
struct ManagementUser {
    email: Option<String>,
    name: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    user_id: Option<String>,
}

impl From<ManagementUser> for User {
    fn from(user: ManagementUser) -> Self {
        Self {
            email: user.email,
            name: user.name,
            given_name: user.given_name,
            family_name: user.family_name,
            id: user.user_id,
        }
    }
}

/// One user or a list, mirroring the shape the provider returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Users {
    One(User),
    Many(Vec<User>),
}

/// Map a management API response body to the trimmed user shape.
pub fn users_from_value(value: Value) -> Result<Users> {
    if value.is_array() {
        let users: Vec<ManagementUser> =
            serde_json::from_value(value).context("Failed to parse user list")?;
        Ok(Users::Many(users.into_iter().map(User::from).collect()))
    } else {
        let user: ManagementUser =
            serde_json::from_value(value).context("Failed to parse user")?;
        Ok(Users::One(user.into()))
    }
}

/// Name fields a client may change. Anything else in the request is ignored.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct UserNameUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
}

pub struct IdentityClient {
    client: reqwest::Client,
    settings: IdentitySettings,
}

impl IdentityClient {
    pub fn new(settings: IdentitySettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("haus/{}", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(10))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, settings })
    }

    /// Fetch a fresh management API token. Tokens are not cached.
    async fn token(&self) -> Result<String> {
        let resp = self
            .client
            .post(&self.settings.token_url)
            .json(&TokenRequest {
                client_id: &self.settings.client_id,
                client_secret: &self.settings.client_secret,
                audience: &self.settings.api_uri,
                grant_type: "client_credentials",
            })
            .send()
            .await
            .context("Failed to reach identity provider")?
            .error_for_status()
            .context("Identity provider rejected token request")?;

        let token: TokenResponse = resp
            .json()
            .await
            .context("Failed to parse token response")?;
        Ok(token.access_token)
    }

    /// `users` or `users/{id}` under the management API base.
    pub fn users_url(&self, id: Option<&str>) -> Result<Url> {
        let mut base = self.settings.api_uri.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let mut url = Url::parse(&base)
            .context("Invalid AUTH0_API_URI")?
            .join("users")
            .context("Invalid AUTH0_API_URI")?;
        if let Some(id) = id {
            url.path_segments_mut()
                .map_err(|()| anyhow!("AUTH0_API_URI cannot be a base URL"))?
                .push(id);
        }
        Ok(url)
    }

    pub async fn users(&self, id: Option<&str>) -> Result<Users> {
        let url = self.users_url(id)?;
        let token = self.token().await?;
        let body: Value = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to reach identity provider")?
            .error_for_status()
            .context("Identity provider rejected user lookup")?
            .json()
            .await
            .context("Failed to parse user response")?;
        users_from_value(body)
    }

    pub async fn update_user(&self, id: &str, update: &UserNameUpdate) -> Result<()> {
        let url = self.users_url(Some(id))?;
        let token = self.token().await?;
        self.client
            .patch(url)
            .bearer_auth(token)
            .json(update)
            .send()
            .await
            .context("Failed to reach identity provider")?
            .error_for_status()
            .context("Identity provider rejected user update")?;
        Ok(())
    }
}
