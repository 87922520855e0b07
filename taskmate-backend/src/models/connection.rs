use serde::Serialize;
use strum::EnumString;

/// Local record of a Composio connected account
#[derive(Debug, Clone, Serialize)]
pub struct ComposioConnection {
    pub connection_id: i64,
    pub user_id: i64,
    pub composio_account_id: String,
    pub service_name: String,
    pub external_user_id: String,
    pub created_at: String,
}

/// Services that can be linked through Composio.
///
/// The path segment used by the link routes differs from the name stored in
/// `composio_connections` for Google Meetings and Calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectedService {
    Gmail,
    #[strum(serialize = "gcalendar", serialize = "googlecalendar")]
    GoogleCalendar,
    #[strum(serialize = "gmeetings", serialize = "googlemeetings")]
    GoogleMeetings,
    Canvas,
}

impl ConnectedService {
    /// Segment used in `/api/auth/{svc}/...`
    pub fn route_segment(&self) -> &'static str {
        match self {
            Self::Gmail => "gmail",
            Self::GoogleCalendar => "gcalendar",
            Self::GoogleMeetings => "gmeetings",
            Self::Canvas => "canvas",
        }
    }

    /// Name stored in `composio_connections.service_name` and `integrations.service_name`
    pub fn service_name(&self) -> &'static str {
        match self {
            Self::Gmail => "gmail",
            Self::GoogleCalendar => "googlecalendar",
            Self::GoogleMeetings => "googlemeetings",
            Self::Canvas => "canvas",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Gmail => "Gmail",
            Self::GoogleCalendar => "Google Calendar",
            Self::GoogleMeetings => "Google Meetings",
            Self::Canvas => "Canvas",
        }
    }

    /// Env var holding the Composio auth config id for this service
    pub fn auth_config_env(&self) -> &'static str {
        use crate::config::env_vars;
        match self {
            Self::Gmail => env_vars::GMAIL_AUTH_CONFIG_ID,
            Self::GoogleCalendar => env_vars::GCALENDAR_AUTH_CONFIG_ID,
            Self::GoogleMeetings => env_vars::GOOGLEMEETINGS_AUTH_CONFIG_ID,
            Self::Canvas => env_vars::CANVAS_AUTH_CONFIG_ID,
        }
    }

    /// Whether a Composio toolkit slug belongs to this service
    pub fn matches_toolkit(&self, slug: &str) -> bool {
        let slug = slug.to_ascii_lowercase();
        match self {
            Self::Gmail => slug == "gmail",
            Self::GoogleCalendar => matches!(slug.as_str(), "googlecalendar" | "gcal"),
            Self::GoogleMeetings => {
                matches!(slug.as_str(), "googlemeetings" | "gmeet" | "googlemeet")
            }
            Self::Canvas => slug.contains("canvas"),
        }
    }
}
