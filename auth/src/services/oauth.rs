use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Deserialize;

use weblog_config::{AuthConfig, ProviderCredentials};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Twitter,
    Facebook,
}

impl OAuthProvider {
    pub fn from_path(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "twitter" => Some(OAuthProvider::Twitter),
            "facebook" => Some(OAuthProvider::Facebook),
            _ => None,
        }
    }
}

impl std::fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OAuthProvider::Twitter => write!(f, "twitter"),
            OAuthProvider::Facebook => write!(f, "facebook"),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OAuthTokenResponse {
    pub access_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TwitterUserData {
    #[allow(dead_code)]
    id: String,
    name: Option<String>,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwitterUserInfo {
    data: TwitterUserData,
}

#[derive(Debug, Deserialize)]
struct FacebookUserInfo {
    #[allow(dead_code)]
    id: String,
    name: Option<String>,
}

/// OAuth identity provider adapters. Both providers are mounted under the
/// shared `/auth/login` prefix; this service builds their authorization
/// URLs, exchanges callback codes for tokens, and reads the profile display
/// name that the login flow maps to a local username.
///
/// Credentials are taken from configuration as-is: an unconfigured provider
/// still gets an adapter and only fails once the dance is exercised.
pub struct OAuthService {
    client: Client,
    twitter: ProviderCredentials,
    facebook: ProviderCredentials,
    redirect_base: String,
}

impl OAuthService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            client: Client::new(),
            twitter: config.twitter.clone(),
            facebook: config.facebook.clone(),
            redirect_base: config.oauth_redirect_base.clone(),
        }
    }

    fn redirect_uri(&self, provider: OAuthProvider) -> String {
        format!("{}/auth/login/{}/authorized", self.redirect_base, provider)
    }

    pub fn authorization_url(&self, provider: OAuthProvider, state: &str) -> String {
        let redirect_uri = self.redirect_uri(provider);
        match provider {
            OAuthProvider::Twitter => {
                format!(
                    "https://twitter.com/i/oauth2/authorize?\
                    response_type=code&\
                    client_id={}&\
                    redirect_uri={}&\
                    scope={}&\
                    state={}",
                    self.twitter.client_id,
                    urlencoding::encode(&redirect_uri),
                    urlencoding::encode("users.read tweet.read"),
                    state
                )
            }
            OAuthProvider::Facebook => {
                format!(
                    "https://www.facebook.com/v18.0/dialog/oauth?\
                    client_id={}&\
                    redirect_uri={}&\
                    response_type=code&\
                    scope=public_profile&\
                    state={}",
                    self.facebook.client_id,
                    urlencoding::encode(&redirect_uri),
                    state
                )
            }
        }
    }

    pub async fn exchange_code(
        &self,
        provider: OAuthProvider,
        code: &str,
    ) -> Result<OAuthTokenResponse> {
        match provider {
            OAuthProvider::Twitter => self.exchange_twitter_code(code).await,
            OAuthProvider::Facebook => self.exchange_facebook_code(code).await,
        }
    }

    async fn exchange_twitter_code(&self, code: &str) -> Result<OAuthTokenResponse> {
        let redirect_uri = self.redirect_uri(OAuthProvider::Twitter);
        let params = [
            ("client_id", self.twitter.client_id.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri.as_str()),
        ];

        let response = self
            .client
            .post("https://api.twitter.com/2/oauth2/token")
            .basic_auth(&self.twitter.client_id, Some(&self.twitter.client_secret))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("Twitter token exchange failed: {}", error_text));
        }

        Ok(response.json().await?)
    }

    async fn exchange_facebook_code(&self, code: &str) -> Result<OAuthTokenResponse> {
        let redirect_uri = self.redirect_uri(OAuthProvider::Facebook);
        let params = [
            ("client_id", self.facebook.client_id.as_str()),
            ("client_secret", self.facebook.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
        ];

        let response = self
            .client
            .get("https://graph.facebook.com/v18.0/oauth/access_token")
            .query(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("Facebook token exchange failed: {}", error_text));
        }

        Ok(response.json().await?)
    }

    /// Fetches the provider profile and resolves a display name for it,
    /// mirroring the OpenID precedence: real name first, then handle. An
    /// empty result means the login must be rejected.
    pub async fn fetch_display_name(
        &self,
        provider: OAuthProvider,
        access_token: &str,
    ) -> Result<Option<String>> {
        let name = match provider {
            OAuthProvider::Twitter => {
                let info: TwitterUserInfo = self
                    .client
                    .get("https://api.twitter.com/2/users/me")
                    .bearer_auth(access_token)
                    .send()
                    .await?
                    .json()
                    .await?;

                info.data.name.or(info.data.username)
            }
            OAuthProvider::Facebook => {
                let info: FacebookUserInfo = self
                    .client
                    .get("https://graph.facebook.com/me?fields=id,name")
                    .bearer_auth(access_token)
                    .send()
                    .await?
                    .json()
                    .await?;

                info.name
            }
        };

        Ok(name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()))
    }
}
