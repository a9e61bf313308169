use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;
use std::time::Duration;

mod ai;
mod config;
mod controllers;
mod dispatch;
mod errors;
mod gateway;
mod http;
mod sessions;
mod ton;
mod tools;

use ai::{ClaudeClient, IntentResolver};
use config::Config;
use dispatch::Dispatcher;
use gateway::StreamHub;
use sessions::{SessionLaneManager, SessionStore};
use ton::TonClient;
use tools::{ToolContext, ToolRegistry};

pub struct AppState {
    pub config: Config,
    pub registry: Arc<ToolRegistry>,
    pub store: Arc<SessionStore>,
    pub lanes: Arc<SessionLaneManager>,
    pub hub: Arc<StreamHub>,
    pub dispatcher: Arc<Dispatcher>,
}

/// How often the idle reaper wakes up.
const REAPER_PERIOD_SECS: u64 = 60;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();

    let registry = Arc::new(ToolRegistry::new());
    tools::builtin::register_all(&registry).expect("builtin tool names must be unique");
    log::info!("Registered {} tools", registry.len());

    let ton = Arc::new(TonClient::new(
        config.ton_api_url.clone(),
        config.ton_api_key.clone(),
        config.ton_timeout_secs,
        config.ton_max_concurrent,
    ));
    let claude = ClaudeClient::new(
        &config.claude_api_key,
        config.claude_model.clone(),
        config.claude_fallback_model.clone(),
        config.claude_timeout_secs,
        config.claude_max_concurrent,
    )
    .expect("CLAUDE_API_KEY must be a valid header value");
    let resolver = IntentResolver::new(claude, config.load_project_context());

    let store = Arc::new(SessionStore::new());
    let lanes = SessionLaneManager::new();
    let hub = Arc::new(StreamHub::new());
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&registry),
        Arc::clone(&store),
        Arc::clone(&lanes),
        resolver,
        ToolContext::new(ton),
        config.tool_deadline_secs,
    ));

    // Idle reaper: drops sessions (and their lanes) with no recent activity.
    // A held lane means a turn is in flight, so that session is skipped.
    {
        let store = Arc::clone(&store);
        let lanes = Arc::clone(&lanes);
        let idle = Duration::from_secs(config.session_idle_secs);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(REAPER_PERIOD_SECS));
            loop {
                tick.tick().await;
                store.evict_idle(idle, |id| lanes.is_held(id));
                lanes.prune_idle(idle);
            }
        });
    }

    let host = config.host.clone();
    let port = config.port;
    log::info!("Starting ton-agent-backend on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(AppState {
                config: config.clone(),
                registry: Arc::clone(&registry),
                store: Arc::clone(&store),
                lanes: Arc::clone(&lanes),
                hub: Arc::clone(&hub),
                dispatcher: Arc::clone(&dispatcher),
            }))
            .wrap(Logger::default())
            .wrap(cors)
            .configure(controllers::health::config)
            .configure(controllers::stream::config)
            .configure(controllers::messages::config)
            .configure(controllers::analyze::config)
            .configure(controllers::sessions::config)
    })
    .bind((host, port))?
    .run()
    .await
}
