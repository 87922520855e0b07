//! GitHub OAuth authorization-code flow

use serde::Deserialize;

use crate::config::GithubConfig;
use crate::models::GithubProfile;

pub const SCOPE: &str = "read:user";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Token plus the scopes GitHub actually granted
#[derive(Debug, Clone)]
pub struct GithubToken {
    pub access_token: String,
    pub scope: Option<String>,
}

pub struct GithubOAuthClient {
    client: reqwest::Client,
    config: GithubConfig,
}

impl GithubOAuthClient {
    pub fn new(config: GithubConfig) -> Self {
        Self {
            client: crate::http::shared_client().clone(),
            config,
        }
    }

    /// URL to send the browser to
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}/login/oauth/authorize?client_id={}&redirect_uri={}&scope={}&state={}",
            self.config.oauth_base_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(SCOPE),
            urlencoding::encode(state)
        )
    }

    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<GithubToken, String> {
        let response = self
            .client
            .post(format!("{}/login/oauth/access_token", self.config.oauth_base_url))
            .header("Accept", "application/json")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| format!("GitHub token request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("GitHub token endpoint returned {}", response.status()));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| format!("Invalid GitHub token response: {}", e))?;

        if let Some(error) = token.error {
            return Err(format!(
                "GitHub rejected the code: {} {}",
                error,
                token.error_description.unwrap_or_default()
            ));
        }

        let access_token = token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| "GitHub returned no access token".to_string())?;

        Ok(GithubToken {
            access_token,
            scope: token.scope,
        })
    }

    pub async fn fetch_user(&self, access_token: &str) -> Result<GithubProfile, String> {
        let response = self
            .client
            .get(format!("{}/user", self.config.api_url))
            .bearer_auth(access_token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| format!("GitHub user request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("GitHub /user returned {}", response.status()));
        }

        response
            .json::<GithubProfile>()
            .await
            .map_err(|e| format!("Invalid GitHub profile: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GithubOAuthClient {
        GithubOAuthClient::new(GithubConfig {
            client_id: "cid".into(),
            client_secret: "secret".into(),
            oauth_base_url: server.uri(),
            api_url: server.uri(),
        })
    }

    #[test]
    fn test_authorize_url() {
        let client = GithubOAuthClient::new(GithubConfig {
            client_id: "cid".into(),
            client_secret: "secret".into(),
            oauth_base_url: "https://github.com".into(),
            api_url: "https://api.github.com".into(),
        });
        let url = client.authorize_url("http://localhost:3001/auth/github/callback", "abc");
        assert_eq!(
            url,
            "https://github.com/login/oauth/authorize?client_id=cid&redirect_uri=http%3A%2F%2Flocalhost%3A3001%2Fauth%2Fgithub%2Fcallback&scope=read%3Auser&state=abc"
        );
    }

    #[tokio::test]
    async fn test_exchange_and_fetch_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .and(header("Accept", "application/json"))
            .and(body_string_contains("code=the-code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "gho_abc", "scope": "read:user", "token_type": "bearer"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("Authorization", "Bearer gho_abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 77, "login": "ada", "name": "Ada", "avatar_url": "https://a/77"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let token = client.exchange_code("the-code", "http://cb").await.unwrap();
        assert_eq!(token.access_token, "gho_abc");
        let profile = client.fetch_user(&token.access_token).await.unwrap();
        assert_eq!(profile.id, 77);
        assert_eq!(profile.login, "ada");
    }

    #[tokio::test]
    async fn test_bad_verification_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": "bad_verification_code", "error_description": "The code passed is incorrect or expired."
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).exchange_code("stale", "http://cb").await.unwrap_err();
        assert!(err.contains("bad_verification_code"));
    }
}
