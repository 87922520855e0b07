use actix_cors::Cors;
use actix_files::{Files, NamedFile};
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use dashmap::DashMap;
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

mod ai;
mod composio;
mod config;
mod controllers;
mod db;
mod error;
mod http;
mod integrations;
mod models;
#[cfg(test)]
mod test_support;

use ai::{ClaudeAnalyzer, EmailAnalyzer};
use composio::{ComposioClient, ToolBroker};
use config::Config;
use db::Database;
use integrations::github::GithubOAuthClient;

pub struct AppState {
    pub db: Arc<Database>,
    pub config: Config,
    /// Composio, or a scripted stand-in under test
    pub broker: Arc<dyn ToolBroker>,
    pub analyzer: Arc<dyn EmailAnalyzer>,
    /// `None` when no GitHub OAuth app is configured
    pub github: Option<GithubOAuthClient>,
    /// Pending GitHub OAuth `state` values and when they were issued
    pub oauth_states: DashMap<String, Instant>,
}

/// Serves index.html for client-side routes the static files don't cover
async fn spa_fallback(index: web::Data<PathBuf>) -> actix_web::Result<NamedFile> {
    Ok(NamedFile::open(index.as_path())?)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env().expect("Invalid configuration");
    log::info!("TaskMate backend v{}", env!("CARGO_PKG_VERSION"));

    log::info!("Opening database at {}", config.database_url);
    let db = Arc::new(Database::new(&config.database_url).expect("Failed to open database"));

    if std::env::args().any(|arg| arg == "--reset-db") {
        db.reset().expect("Failed to reset database");
        log::info!("Database reset complete");
        return Ok(());
    }

    match db.purge_expired_sessions() {
        Ok(0) => {}
        Ok(n) => log::info!("Purged {} expired sessions", n),
        Err(e) => log::warn!("Could not purge expired sessions: {}", e),
    }

    if config.composio.api_key.is_none() {
        log::warn!("COMPOSIO_API_KEY is not set; Composio calls will fail");
    }
    if config.anthropic.api_key.is_none() {
        log::warn!("ANTHROPIC_API_KEY is not set; email summaries use the plain fallback");
    }

    let broker: Arc<dyn ToolBroker> = Arc::new(ComposioClient::new(&config.composio));
    let analyzer: Arc<dyn EmailAnalyzer> = Arc::new(ClaudeAnalyzer::new(config.anthropic.clone()));
    let github = match config.github.clone() {
        Some(github) => Some(GithubOAuthClient::new(github)),
        None => {
            log::warn!("GITHUB_CLIENT_ID/GITHUB_CLIENT_SECRET not set; GitHub login is disabled");
            None
        }
    };

    let frontend_dist = config
        .frontend_dist_dir
        .clone()
        .filter(|dir| std::path::Path::new(dir).join("index.html").exists());
    match (&config.frontend_dist_dir, &frontend_dist) {
        (_, Some(dir)) => log::info!("Serving frontend from: {}", dir),
        (Some(dir), None) => log::warn!("FRONTEND_DIST_DIR {} has no index.html; not serving a frontend", dir),
        (None, None) => {}
    }

    let port = config.port;
    let frontend_url = config.frontend_url.clone();
    let state = web::Data::new(AppState {
        db,
        config,
        broker,
        analyzer,
        github,
        oauth_states: DashMap::new(),
    });

    log::info!("Starting server on 0.0.0.0:{}", port);
    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_url)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "PATCH"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
            .supports_credentials()
            .max_age(3600);

        let app = App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .wrap(cors)
            .configure(controllers::health::config_routes)
            .configure(controllers::auth::config)
            .configure(controllers::connections::config)
            .configure(controllers::tools::config)
            .configure(controllers::calendar::config)
            .configure(controllers::canvas::config)
            .configure(controllers::gmail::config)
            .configure(controllers::tasks::config)
            .configure(controllers::categories::config)
            .configure(controllers::dashboard::config);

        // The SPA owns `/` when it is served; otherwise show the API banner
        match &frontend_dist {
            Some(dir) => app
                .app_data(web::Data::new(PathBuf::from(dir).join("index.html")))
                .service(
                    Files::new("/", dir.clone())
                        .index_file("index.html")
                        .default_handler(web::to(spa_fallback)),
                ),
            None => app.configure(controllers::health::root_routes),
        }
    })
    .bind(("0.0.0.0", port))?
    .run();

    let server_handle = server.handle();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        log::info!("Received Ctrl+C, shutting down...");

        log::info!("Stopping HTTP server...");
        let server_stop = server_handle.stop(true);
        if tokio::time::timeout(std::time::Duration::from_secs(5), server_stop).await.is_err() {
            log::warn!("Timeout waiting for HTTP server to stop, forcing exit...");
        }

        log::info!("Shutdown complete");
    });

    server.await
}
