//! Process-wide reqwest client so connection pools are shared across integrations.

use once_cell::sync::Lazy;
use std::time::Duration;

static SHARED_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("taskmate-backend/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
});

pub fn shared_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}
