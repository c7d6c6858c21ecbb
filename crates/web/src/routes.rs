use packforge_core::{
    generate, CardSource, ConfigError, GenerateOptions, GenerateRequest, MemoryStore, RngState, SessionError,
    SessionManager,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use tiny_http::Method;

const SESSIONS_PREFIX: &str = "/api/sessions";

/// Shared server state. Sessions are single-writer behind the mutex;
/// generation runs without holding it.
pub struct App {
    pub sessions: Arc<Mutex<SessionManager<MemoryStore>>>,
    pub source: Box<dyn CardSource + Send>,
    pub options: GenerateOptions,
}

impl App {
    pub fn new(
        sessions: SessionManager<MemoryStore>,
        source: Box<dyn CardSource + Send>,
        options: GenerateOptions,
    ) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(sessions)),
            source,
            options,
        }
    }

    fn sessions(&self) -> MutexGuard<'_, SessionManager<MemoryStore>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

impl Reply {
    pub fn ok(body: impl Serialize) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Self { status: 200, body },
            Err(err) => Self::error(500, &err.to_string()),
        }
    }

    pub fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: json!({ "error": true, "message": message }),
        }
    }
}

impl From<SessionError> for Reply {
    fn from(err: SessionError) -> Self {
        let status = match err {
            SessionError::SessionNotFound | SessionError::PlayerNotFound | SessionError::PackNotFound => 404,
            SessionError::SessionFull
            | SessionError::SessionAlreadyStarted
            | SessionError::SessionComplete
            | SessionError::NotAllLocked => 400,
            SessionError::NotHost => 403,
            SessionError::Conflict => 409,
        };
        Self::error(status, &err.to_string())
    }
}

impl From<ConfigError> for Reply {
    fn from(err: ConfigError) -> Self {
        Self::error(400, &err.to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CreateBody {
    player_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct JoinBody {
    session_code: String,
    player_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PlayerBody {
    session_code: String,
    player_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LockBody {
    session_code: String,
    player_id: String,
    commander_url: String,
    commander_data: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CommandersBody {
    session_code: String,
    player_id: String,
    commanders: Vec<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateReply<T: Serialize> {
    session_code: String,
    player_id: String,
    session_data: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JoinReply<T: Serialize> {
    player_id: String,
    session_data: T,
}

/// An empty body reads as `{}`.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, Reply> {
    let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) { b"{}" } else { body };
    serde_json::from_slice(body).map_err(|err| Reply::error(400, &format!("Invalid JSON: {err}")))
}

fn respond<T: Serialize, E: Into<Reply>>(result: Result<T, E>) -> Reply {
    match result {
        Ok(value) => Reply::ok(value),
        Err(err) => err.into(),
    }
}

pub fn route(app: &App, method: &Method, url: &str, body: &[u8]) -> Reply {
    let path = url.split('?').next().unwrap_or_default();
    match (method, path) {
        (Method::Options, _) => Reply::ok(json!({})),
        (Method::Post, "/api/generate-packs") => generate_packs(app, body),
        (Method::Get, "/api/generate-packs") => Reply::ok(usage()),
        (Method::Post, _) if path.starts_with(SESSIONS_PREFIX) => {
            session_post(app, &path[SESSIONS_PREFIX.len()..], body)
        }
        (Method::Get, _) if path.starts_with(SESSIONS_PREFIX) => session_get(app, &path[SESSIONS_PREFIX.len()..]),
        _ => Reply::error(404, &format!("Endpoint not found: {path}")),
    }
}

fn generate_packs(app: &App, body: &[u8]) -> Reply {
    let request: GenerateRequest = match parse_body(body) {
        Ok(request) => request,
        Err(reply) => return reply,
    };
    if let Some(config) = &request.config {
        if let Err(err) = config.validate() {
            return err.into();
        }
    }
    let mut rng = RngState::from_entropy();
    match generate(&request, app.source.as_ref(), &mut rng, &app.options) {
        Ok(packs) => Reply::ok(json!({ "packs": packs })),
        Err(err) => err.into(),
    }
}

fn session_post(app: &App, action: &str, body: &[u8]) -> Reply {
    match action {
        "/create" | "" => parse_body::<CreateBody>(body).map_or_else(
            |reply| reply,
            |body| {
                let seat = app.sessions().create(&body.player_name);
                Reply::ok(CreateReply {
                    session_code: seat.session.session_code.clone(),
                    player_id: seat.player_id,
                    session_data: seat.session,
                })
            },
        ),
        "/join" => parse_body::<JoinBody>(body).map_or_else(
            |reply| reply,
            |body| {
                respond(
                    app.sessions()
                        .join(&body.session_code, &body.player_name)
                        .map(|seat| JoinReply {
                            player_id: seat.player_id,
                            session_data: seat.session,
                        }),
                )
            },
        ),
        "/roll-powerups" => parse_body::<PlayerBody>(body).map_or_else(
            |reply| reply,
            |body| respond(app.sessions().roll_powerups(&body.session_code, &body.player_id)),
        ),
        "/lock-commander" => parse_body::<LockBody>(body).map_or_else(
            |reply| reply,
            |body| {
                respond(app.sessions().lock_commander(
                    &body.session_code,
                    &body.player_id,
                    &body.commander_url,
                    body.commander_data,
                ))
            },
        ),
        "/update-commanders" => parse_body::<CommandersBody>(body).map_or_else(
            |reply| reply,
            |body| {
                respond(
                    app.sessions()
                        .update_commanders(&body.session_code, &body.player_id, body.commanders),
                )
            },
        ),
        "/generate-pack-codes" => parse_body::<PlayerBody>(body).map_or_else(
            |reply| reply,
            |body| respond(app.sessions().generate_pack_codes(&body.session_code)),
        ),
        _ => Reply::error(404, &format!("Endpoint not found: {SESSIONS_PREFIX}{action}")),
    }
}

fn session_get(app: &App, rest: &str) -> Reply {
    if let Some(pack_code) = rest.strip_prefix("/pack/") {
        return respond(app.sessions().pack_by_code(pack_code));
    }
    let code = rest.trim_matches('/');
    if code.is_empty() || code.contains('/') {
        return Reply::error(404, &format!("Endpoint not found: {SESSIONS_PREFIX}{rest}"));
    }
    respond(app.sessions().session(code))
}

fn usage() -> Value {
    json!({
        "endpoint": "/api/generate-packs",
        "method": "POST",
        "body": {
            "commanderSlug": "edhrec commander slug, e.g. atraxa-grand-unifier",
            "commanderUrl": "or an edhrec commander url",
            "bracket": "optional bracket 1-5 or \"any\", default 2",
            "budget": "optional \"any\", \"budget\" or \"expensive\"",
            "config": "optional {packTypes: [...]}, default is one standard pack"
        },
        "response": { "packs": [{ "name": "string", "cards": ["card names"] }] }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use packforge_core::{
        AverageDeckCounts, Bracket, Budget, CardList, CardView, EdhrecPage, MoxfieldDeck, PowerupCatalog,
        ProviderError, ScryfallCursor, ScryfallPage,
    };

    struct FixedSource;

    impl CardSource for FixedSource {
        fn edhrec_page(&self, _slug: &str, _bracket: Bracket, _budget: Budget) -> Result<EdhrecPage, ProviderError> {
            let cardviews = (0..10)
                .map(|index| CardView {
                    name: Some(format!("Creature {index}")),
                    ..CardView::default()
                })
                .collect();
            Ok(EdhrecPage {
                cardlists: vec![CardList {
                    tag: "creatures".to_string(),
                    cardviews,
                }],
                commander_colors: None,
            })
        }

        fn average_deck(&self, _slug: &str, _bracket: Bracket) -> Result<AverageDeckCounts, ProviderError> {
            Err(ProviderError::Timeout)
        }

        fn scryfall_page(&self, _cursor: &ScryfallCursor) -> Result<ScryfallPage, ProviderError> {
            Err(ProviderError::Timeout)
        }

        fn moxfield_deck(&self, _deck_url: &str) -> Result<MoxfieldDeck, ProviderError> {
            Err(ProviderError::Timeout)
        }
    }

    fn app() -> App {
        let sessions = SessionManager::new(
            MemoryStore::new(),
            PowerupCatalog::default(),
            RngState::from_seed(7),
        );
        App::new(sessions, Box::new(FixedSource), GenerateOptions::default())
    }

    fn post(app: &App, path: &str, body: Value) -> Reply {
        route(app, &Method::Post, path, body.to_string().as_bytes())
    }

    fn get(app: &App, path: &str) -> Reply {
        route(app, &Method::Get, path, b"")
    }

    fn create(app: &App) -> (String, String) {
        let reply = post(app, "/api/sessions/create", json!({ "playerName": "Host" }));
        assert_eq!(reply.status, 200);
        (
            reply.body["sessionCode"].as_str().unwrap().to_string(),
            reply.body["playerId"].as_str().unwrap().to_string(),
        )
    }

    #[test]
    fn generate_packs_returns_named_packs() {
        let app = app();
        let body = json!({
            "commanderUrl": "https://edhrec.com/commanders/krenko-mob-boss",
            "config": {"packTypes": [{"name": "Random", "count": 2, "slots": [{"cardType": "random", "count": 3}]}]}
        });
        let reply = post(&app, "/api/generate-packs", body);
        assert_eq!(reply.status, 200);
        let packs = reply.body["packs"].as_array().unwrap();
        assert_eq!(packs.len(), 2);
        assert_eq!(packs[0]["name"], "Random #1");
        assert_eq!(packs[0]["cards"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn generate_packs_rejects_bad_requests() {
        let app = app();
        let missing = post(&app, "/api/generate-packs", json!({}));
        assert_eq!(missing.status, 400);
        assert_eq!(missing.body["error"], true);

        let empty = post(
            &app,
            "/api/generate-packs",
            json!({"commanderSlug": "krenko-mob-boss", "config": {"packTypes": []}}),
        );
        assert_eq!(empty.status, 400);
        assert_eq!(empty.body["message"], "No pack types defined");

        let garbage = route(&app, &Method::Post, "/api/generate-packs", b"{ nope");
        assert_eq!(garbage.status, 400);

        let binary = route(&app, &Method::Post, "/api/sessions/join", &[0xff, 0xfe, 0x7b]);
        assert_eq!(binary.status, 400);
        assert_eq!(binary.body["error"], true);
        assert!(binary.body["message"].as_str().unwrap().starts_with("Invalid JSON"));
    }

    #[test]
    fn oversized_counts_are_bounded() {
        let app = app();
        let greedy_slot = post(
            &app,
            "/api/generate-packs",
            json!({
                "commanderSlug": "krenko-mob-boss",
                "config": {"packTypes": [{"slots": [{"cardType": "weighted", "count": 4_000_000_000u64}]}]}
            }),
        );
        assert_eq!(greedy_slot.status, 200);
        assert_eq!(greedy_slot.body["packs"][0]["cards"].as_array().unwrap().len(), 10);

        let greedy_pack = post(
            &app,
            "/api/generate-packs",
            json!({
                "commanderSlug": "krenko-mob-boss",
                "config": {"packTypes": [{"count": 4_000_000_000u64, "slots": [{"cardType": "random"}]}]}
            }),
        );
        assert_eq!(greedy_pack.status, 400);
        assert_eq!(greedy_pack.body["message"], "Pack 0: Invalid count");
    }

    #[test]
    fn usage_and_preflight() {
        let app = app();
        assert_eq!(get(&app, "/api/generate-packs").status, 200);
        assert_eq!(route(&app, &Method::Options, "/anything", b"").status, 200);
        let missing = get(&app, "/api/nothing?x=1");
        assert_eq!(missing.status, 404);
        assert_eq!(missing.body["message"], "Endpoint not found: /api/nothing");
    }

    #[test]
    fn session_flow_over_routes() {
        let app = app();
        let (code, host) = create(&app);

        let join = post(&app, "/api/sessions/join", json!({ "sessionCode": code.to_lowercase() }));
        assert_eq!(join.status, 200);
        let guest = join.body["playerId"].as_str().unwrap().to_string();
        assert_eq!(join.body["sessionData"]["players"][1]["name"], "Player 2");

        let denied = post(
            &app,
            "/api/sessions/roll-powerups",
            json!({ "sessionCode": code, "playerId": guest }),
        );
        assert_eq!(denied.status, 403);
        assert_eq!(denied.body["message"], "Only host can roll powerups");

        let rolled = post(
            &app,
            "/api/sessions/roll-powerups",
            json!({ "sessionCode": code, "playerId": host }),
        );
        assert_eq!(rolled.status, 200);
        assert_eq!(rolled.body["state"], "selecting");

        let early = post(&app, "/api/sessions/generate-pack-codes", json!({ "sessionCode": code }));
        assert_eq!(early.status, 400);

        for player in [&host, &guest] {
            let locked = post(
                &app,
                "/api/sessions/lock-commander",
                json!({
                    "sessionCode": code,
                    "playerId": player,
                    "commanderUrl": "https://edhrec.com/commanders/krenko-mob-boss"
                }),
            );
            assert_eq!(locked.status, 200);
        }

        let session = get(&app, &format!("/api/sessions/{code}"));
        assert_eq!(session.status, 200);
        assert_eq!(session.body["state"], "complete");
        let pack_code = session.body["players"][0]["packCode"].as_str().unwrap().to_string();

        let pack = get(&app, &format!("/api/sessions/pack/{}", pack_code.to_lowercase()));
        assert_eq!(pack.status, 200);
        assert_eq!(pack.body["commanderUrl"], "https://edhrec.com/commanders/krenko-mob-boss");
    }

    #[test]
    fn session_errors_map_to_statuses() {
        let app = app();
        assert_eq!(get(&app, "/api/sessions/ZZZZZ").status, 404);
        assert_eq!(get(&app, "/api/sessions/pack/NOPE1234").status, 404);
        assert_eq!(
            post(&app, "/api/sessions/join", json!({ "sessionCode": "ZZZZZ" })).status,
            404
        );

        let (code, _) = create(&app);
        for _ in 0..3 {
            assert_eq!(
                post(&app, "/api/sessions/join", json!({ "sessionCode": code })).status,
                200
            );
        }
        let full = post(&app, "/api/sessions/join", json!({ "sessionCode": code }));
        assert_eq!(full.status, 400);
        assert_eq!(full.body["message"], "Session is full");
    }

    #[test]
    fn commanders_list_is_capped() {
        let app = app();
        let (code, host) = create(&app);
        let commanders: Vec<Value> = (0..12).map(|index| json!({ "name": format!("C{index}") })).collect();
        let reply = post(
            &app,
            "/api/sessions/update-commanders",
            json!({ "sessionCode": code, "playerId": host, "commanders": commanders }),
        );
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body["players"][0]["commanders"].as_array().unwrap().len(), 10);
    }
}
