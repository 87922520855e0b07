use chrono_tz::Tz;
use std::env;
use url::Url;

use crate::models::ConnectedService;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const PORT: &str = "PORT";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    /// "production" switches the default public URL and cookie flags
    pub const NODE_ENV: &str = "NODE_ENV";
    pub const TASKMATE_ENV: &str = "TASKMATE_ENV";
    /// Externally reachable URL of this backend (used for OAuth and link callbacks)
    pub const PUBLIC_URL: &str = "PUBLIC_URL";
    /// Origin of the SPA (CORS + post-login redirects)
    pub const FRONTEND_URL: &str = "FRONTEND_URL";
    /// Optional directory holding a built SPA to serve
    pub const FRONTEND_DIST_DIR: &str = "FRONTEND_DIST_DIR";
    pub const SESSION_COOKIE_SECURE: &str = "SESSION_COOKIE_SECURE";

    pub const GITHUB_CLIENT_ID: &str = "GITHUB_CLIENT_ID";
    pub const GITHUB_CLIENT_SECRET: &str = "GITHUB_CLIENT_SECRET";
    pub const GITHUB_OAUTH_BASE_URL: &str = "GITHUB_OAUTH_BASE_URL";
    pub const GITHUB_API_URL: &str = "GITHUB_API_URL";

    pub const COMPOSIO_API_KEY: &str = "COMPOSIO_API_KEY";
    pub const COMPOSIO_BASE_URL: &str = "COMPOSIO_BASE_URL";
    pub const COMPOSIO_DEFAULT_USER_ID: &str = "COMPOSIO_DEFAULT_USER_ID";
    pub const GMAIL_AUTH_CONFIG_ID: &str = "COMPOSIO_GMAIL_AUTH_CONFIG_ID";
    pub const GCALENDAR_AUTH_CONFIG_ID: &str = "COMPOSIO_GCALENDAR_AUTH_CONFIG_ID";
    pub const GOOGLEMEETINGS_AUTH_CONFIG_ID: &str = "COMPOSIO_GOOGLEMEETINGS_AUTH_CONFIG_ID";
    pub const CANVAS_AUTH_CONFIG_ID: &str = "COMPOSIO_CANVAS_AUTH_CONFIG_ID";
    pub const GMAIL_LINK_CALLBACK_URL: &str = "GMAIL_LINK_CALLBACK_URL";
    pub const GCALENDAR_LINK_CALLBACK_URL: &str = "GCALENDAR_LINK_CALLBACK_URL";
    pub const GOOGLEMEETINGS_LINK_CALLBACK_URL: &str = "GOOGLEMEETINGS_LINK_CALLBACK_URL";
    pub const CANVAS_LINK_CALLBACK_URL: &str = "CANVAS_LINK_CALLBACK_URL";
    pub const CANVAS_API_KEY: &str = "CANVAS_API_KEY";
    pub const CANVAS_BASE_URL: &str = "CANVAS_BASE_URL";

    pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
    pub const ANTHROPIC_BASE_URL: &str = "ANTHROPIC_BASE_URL";
    pub const ANTHROPIC_MODEL: &str = "ANTHROPIC_MODEL";

    /// IANA zone used for the calendar week window and synced task events
    pub const CALENDAR_TIMEZONE: &str = "CALENDAR_TIMEZONE";
    pub const TOOL_CACHE_TTL_SECS: &str = "TOOL_CACHE_TTL_SECS";
}

/// Default values
pub mod defaults {
    pub const PORT: u16 = 3001;
    pub const DATABASE_URL: &str = "./.db/taskmate.db";
    pub const FRONTEND_URL: &str = "http://localhost:5173";
    pub const GITHUB_OAUTH_BASE_URL: &str = "https://github.com";
    pub const GITHUB_API_URL: &str = "https://api.github.com";
    pub const COMPOSIO_BASE_URL: &str = "https://backend.composio.dev";
    pub const COMPOSIO_DEFAULT_USER_ID: &str = "default";
    pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
    pub const ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20241022";
    pub const CALENDAR_TIMEZONE: &str = "America/New_York";
    pub const TOOL_CACHE_TTL_SECS: u64 = 300;
}

/// GitHub OAuth application credentials
#[derive(Clone, Debug)]
pub struct GithubConfig {
    pub client_id: String,
    pub client_secret: String,
    pub oauth_base_url: String,
    pub api_url: String,
}

/// Composio auth config ids and link callbacks, one per connected service
#[derive(Clone, Debug, Default)]
pub struct ComposioConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub default_user_id: String,
    pub gmail_auth_config_id: Option<String>,
    pub gcalendar_auth_config_id: Option<String>,
    pub googlemeetings_auth_config_id: Option<String>,
    pub canvas_auth_config_id: Option<String>,
    pub gmail_callback_url: Option<String>,
    pub gcalendar_callback_url: Option<String>,
    pub googlemeetings_callback_url: Option<String>,
    pub canvas_callback_url: Option<String>,
    pub tool_cache_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CanvasConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AnthropicConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub production: bool,
    pub public_url: String,
    pub frontend_url: String,
    pub frontend_dist_dir: Option<String>,
    pub session_cookie_secure: bool,
    pub github: Option<GithubConfig>,
    pub composio: ComposioConfig,
    pub canvas: CanvasConfig,
    pub anthropic: AnthropicConfig,
    pub calendar_timezone: Tz,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get(env_vars::PORT) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| format!("PORT must be a valid number, got '{}'", raw))?,
            None => defaults::PORT,
        };

        let production = get(env_vars::TASKMATE_ENV)
            .or_else(|| get(env_vars::NODE_ENV))
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let public_url = http_base(
            env_vars::PUBLIC_URL,
            get(env_vars::PUBLIC_URL).unwrap_or_else(|| format!("http://localhost:{}", port)),
        )?;

        let frontend_url = http_base(
            env_vars::FRONTEND_URL,
            get(env_vars::FRONTEND_URL).unwrap_or_else(|| defaults::FRONTEND_URL.to_string()),
        )?;

        let session_cookie_secure = get(env_vars::SESSION_COOKIE_SECURE)
            .map(|v| parse_bool(&v))
            .unwrap_or(production);

        let github = match (get(env_vars::GITHUB_CLIENT_ID), get(env_vars::GITHUB_CLIENT_SECRET)) {
            (Some(client_id), Some(client_secret)) => Some(GithubConfig {
                client_id,
                client_secret,
                oauth_base_url: get(env_vars::GITHUB_OAUTH_BASE_URL)
                    .unwrap_or_else(|| defaults::GITHUB_OAUTH_BASE_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                api_url: get(env_vars::GITHUB_API_URL)
                    .unwrap_or_else(|| defaults::GITHUB_API_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
            }),
            _ => None,
        };

        let tool_cache_ttl_secs = match get(env_vars::TOOL_CACHE_TTL_SECS) {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| format!("TOOL_CACHE_TTL_SECS must be a number, got '{}'", raw))?,
            None => defaults::TOOL_CACHE_TTL_SECS,
        };

        let composio = ComposioConfig {
            api_key: get(env_vars::COMPOSIO_API_KEY),
            base_url: get(env_vars::COMPOSIO_BASE_URL)
                .unwrap_or_else(|| defaults::COMPOSIO_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            default_user_id: get(env_vars::COMPOSIO_DEFAULT_USER_ID)
                .unwrap_or_else(|| defaults::COMPOSIO_DEFAULT_USER_ID.to_string()),
            gmail_auth_config_id: get(env_vars::GMAIL_AUTH_CONFIG_ID),
            gcalendar_auth_config_id: get(env_vars::GCALENDAR_AUTH_CONFIG_ID),
            googlemeetings_auth_config_id: get(env_vars::GOOGLEMEETINGS_AUTH_CONFIG_ID),
            canvas_auth_config_id: get(env_vars::CANVAS_AUTH_CONFIG_ID),
            gmail_callback_url: get(env_vars::GMAIL_LINK_CALLBACK_URL),
            gcalendar_callback_url: get(env_vars::GCALENDAR_LINK_CALLBACK_URL),
            googlemeetings_callback_url: get(env_vars::GOOGLEMEETINGS_LINK_CALLBACK_URL),
            canvas_callback_url: get(env_vars::CANVAS_LINK_CALLBACK_URL),
            tool_cache_ttl_secs,
        };

        let tz_name = get(env_vars::CALENDAR_TIMEZONE)
            .unwrap_or_else(|| defaults::CALENDAR_TIMEZONE.to_string());
        let calendar_timezone: Tz = tz_name
            .parse()
            .map_err(|_| format!("CALENDAR_TIMEZONE '{}' is not a known IANA zone", tz_name))?;

        Ok(Self {
            port,
            database_url: get(env_vars::DATABASE_URL)
                .unwrap_or_else(|| defaults::DATABASE_URL.to_string()),
            production,
            public_url,
            frontend_url,
            frontend_dist_dir: get(env_vars::FRONTEND_DIST_DIR),
            session_cookie_secure,
            github,
            composio,
            canvas: CanvasConfig {
                api_key: get(env_vars::CANVAS_API_KEY),
                base_url: get(env_vars::CANVAS_BASE_URL),
            },
            anthropic: AnthropicConfig {
                api_key: get(env_vars::ANTHROPIC_API_KEY),
                base_url: get(env_vars::ANTHROPIC_BASE_URL)
                    .unwrap_or_else(|| defaults::ANTHROPIC_BASE_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                model: get(env_vars::ANTHROPIC_MODEL)
                    .unwrap_or_else(|| defaults::ANTHROPIC_MODEL.to_string()),
            },
            calendar_timezone,
        })
    }

    /// Where GitHub sends the user back after authorization
    pub fn github_callback_url(&self) -> String {
        format!("{}/auth/github/callback", self.public_url)
    }

    /// Composio auth config id for a linkable service
    pub fn auth_config_id(&self, service: ConnectedService) -> Option<&str> {
        match service {
            ConnectedService::Gmail => self.composio.gmail_auth_config_id.as_deref(),
            ConnectedService::GoogleCalendar => self.composio.gcalendar_auth_config_id.as_deref(),
            ConnectedService::GoogleMeetings => self.composio.googlemeetings_auth_config_id.as_deref(),
            ConnectedService::Canvas => self.composio.canvas_auth_config_id.as_deref(),
        }
    }

    /// Configured link callback, else `{PUBLIC_URL}/api/auth/{svc}/callback`
    pub fn link_callback_url(&self, service: ConnectedService) -> String {
        let configured = match service {
            ConnectedService::Gmail => &self.composio.gmail_callback_url,
            ConnectedService::GoogleCalendar => &self.composio.gcalendar_callback_url,
            ConnectedService::GoogleMeetings => &self.composio.googlemeetings_callback_url,
            ConnectedService::Canvas => &self.composio.canvas_callback_url,
        };
        configured.clone().unwrap_or_else(|| {
            format!("{}/api/auth/{}/callback", self.public_url, service.route_segment())
        })
    }
}

/// Absolute http(s) URL without a trailing slash
fn http_base(name: &str, raw: String) -> Result<String, String> {
    let parsed = Url::parse(&raw).map_err(|e| format!("{} '{}' is not a valid URL: {}", name, raw, e))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("{} '{}' must use http or https", name, raw));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 3001);
        assert_eq!(config.public_url, "http://localhost:3001");
        assert_eq!(config.frontend_url, "http://localhost:5173");
        assert!(!config.production);
        assert!(!config.session_cookie_secure);
        assert!(config.github.is_none());
        assert_eq!(config.composio.default_user_id, "default");
        assert_eq!(config.calendar_timezone, chrono_tz::America::New_York);
        assert_eq!(config.anthropic.model, "claude-3-5-sonnet-20241022");
    }

    #[test]
    fn test_production_flags_and_trailing_slashes() {
        let config = config_from(&[
            ("NODE_ENV", "production"),
            ("PUBLIC_URL", "https://api.example.edu/"),
            ("FRONTEND_URL", "https://app.example.edu/"),
            ("GITHUB_CLIENT_ID", "id"),
            ("GITHUB_CLIENT_SECRET", "secret"),
        ])
        .unwrap();
        assert!(config.production);
        assert!(config.session_cookie_secure);
        assert_eq!(config.public_url, "https://api.example.edu");
        assert_eq!(config.frontend_url, "https://app.example.edu");
        assert_eq!(
            config.github_callback_url(),
            "https://api.example.edu/auth/github/callback"
        );
        let github = config.github.unwrap();
        assert_eq!(github.oauth_base_url, "https://github.com");
    }

    #[test]
    fn test_link_callback_urls() {
        let config = config_from(&[
            ("PUBLIC_URL", "https://api.example.edu"),
            ("GMAIL_LINK_CALLBACK_URL", "https://hooks.example.edu/gmail"),
            ("COMPOSIO_GCALENDAR_AUTH_CONFIG_ID", "ac_cal"),
        ])
        .unwrap();
        assert_eq!(
            config.link_callback_url(ConnectedService::Gmail),
            "https://hooks.example.edu/gmail"
        );
        assert_eq!(
            config.link_callback_url(ConnectedService::GoogleMeetings),
            "https://api.example.edu/api/auth/gmeetings/callback"
        );
        assert_eq!(config.auth_config_id(ConnectedService::GoogleCalendar), Some("ac_cal"));
        assert_eq!(config.auth_config_id(ConnectedService::Gmail), None);
    }

    #[test]
    fn test_github_requires_both_credentials() {
        let config = config_from(&[("GITHUB_CLIENT_ID", "id"), ("GITHUB_CLIENT_SECRET", " ")]).unwrap();
        assert!(config.github.is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(config_from(&[("PORT", "eighty")]).is_err());
        assert!(config_from(&[("CALENDAR_TIMEZONE", "Mars/Olympus")]).is_err());
        assert!(config_from(&[("TOOL_CACHE_TTL_SECS", "-1")]).is_err());
        assert!(config_from(&[("PUBLIC_URL", "localhost:3001")]).is_err());
        assert!(config_from(&[("FRONTEND_URL", "ftp://app.example")]).is_err());
    }
}
