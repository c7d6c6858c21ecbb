mod routes;
mod settings;

use anyhow::anyhow;
use packforge_core::{GenerateOptions, MemoryStore, RngState, SessionManager};
use packforge_data::load_assets;
use packforge_providers::{HttpCardSource, ProviderConfig};
use routes::{route, App, Reply};
use settings::WebSettings;
use std::error::Error;
use std::sync::Arc;
use std::thread;
use tiny_http::{Header, Request, Response, Server, StatusCode};

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let settings = WebSettings::from_env()?;
    let assets = load_assets(&settings.assets_dir)?;

    let source = HttpCardSource::new(ProviderConfig {
        timeout: settings.timeout,
        ..ProviderConfig::default()
    });
    let game_changers = if assets.game_changers.is_empty() {
        None
    } else {
        Some(assets.game_changers)
    };
    let options = GenerateOptions {
        max_workers: settings.workers,
        game_changers,
    };
    let sessions = SessionManager::new(MemoryStore::new(), assets.catalog, RngState::from_entropy());
    let app = Arc::new(App::new(sessions, Box::new(source), options));

    let server = Server::http(&settings.addr).map_err(|err| anyhow!("bind {}: {err}", settings.addr))?;
    log::info!("packforge listening on http://{}", settings.addr);

    for request in server.incoming_requests() {
        let app = Arc::clone(&app);
        thread::spawn(move || {
            if let Err(err) = handle_request(request, &app) {
                log::error!("request error: {err}");
            }
        });
    }
    Ok(())
}

fn handle_request(mut request: Request, app: &App) -> Result<(), Box<dyn Error>> {
    let method = request.method().clone();
    let url = request.url().to_string();
    let mut body = Vec::new();
    request.as_reader().read_to_end(&mut body)?;

    let reply = route(app, &method, &url, &body);
    if reply.status >= 500 {
        log::error!("{method} {url} -> {}: {}", reply.status, reply.body);
    } else {
        log::debug!("{method} {url} -> {}", reply.status);
    }
    respond_json(request, &reply)
}

fn respond_json(request: Request, reply: &Reply) -> Result<(), Box<dyn Error>> {
    let body = serde_json::to_vec_pretty(&reply.body)?;
    let mut response = Response::from_data(body).with_status_code(StatusCode(reply.status));
    for (name, value) in [
        ("Content-Type", "application/json"),
        ("Access-Control-Allow-Origin", "*"),
        ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
        ("Access-Control-Allow-Headers", "Content-Type"),
    ] {
        let header = Header::from_bytes(name.as_bytes(), value.as_bytes()).map_err(|_| "invalid header")?;
        response.add_header(header);
    }
    request.respond(response)?;
    Ok(())
}
