//! PHODONG Gateway: the storybook wizard over plain HTML forms.
//! One session per browser cookie; Gemini holds the only outbound traffic.

mod error;
mod render;
mod sessions;
mod settings;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Form, Multipart, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE, SET_COOKIE},
        HeaderMap, HeaderValue, Request, StatusCode,
    },
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use error::{GatewayError, UploadError};
use phodong_core::{
    compose_story, recognize_object, ConfigDraft, GeminiClient, Genre, Photo, Purpose, Session,
    VisionModel, Wizard, DEFAULT_AGE,
};
use serde::Deserialize;
use sessions::{session_cookie, session_id_from_headers, SessionStore};
use settings::GatewayConfig;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Phone cameras produce multi-megabyte JPEGs; axum's default limit is 2 MB.
const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct AppState {
    app_name: String,
    wizard: Wizard,
    sessions: SessionStore,
    model: Arc<dyn VisionModel>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigForm {
    child_name: String,
    companion_name: String,
    age: Option<String>,
    genre: Option<String>,
    purpose: Option<String>,
    action: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), GatewayError> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[phodong-gateway] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::load()?;
    let api_key = settings::resolve_api_key(Path::new(&config.secrets_path));
    if api_key.is_none() {
        tracing::warn!(
            "{} not found in {} or the environment; photo and story requests will show a configuration error",
            settings::API_KEY_NAME,
            config.secrets_path
        );
    }
    let model = GeminiClient::new(api_key)
        .with_model(&config.model)
        .with_api_base(&config.api_base);

    let state = Arc::new(AppState {
        app_name: config.app_name.clone(),
        wizard: Wizard::new(config.max_scenes),
        sessions: SessionStore::new(),
        model: Arc::new(model),
    });

    spawn_session_sweeper(
        Arc::clone(&state),
        Duration::from_secs(config.session_idle_secs),
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|source| GatewayError::Bind {
            addr: config.bind_addr.clone(),
            source,
        })?;
    tracing::info!(
        version = phodong_core::version(),
        model = %config.model,
        max_scenes = config.max_scenes,
        session_idle_secs = config.session_idle_secs,
        "{} listening on http://{}",
        config.app_name,
        config.bind_addr
    );

    axum::serve(listener, app(state))
        .await
        .map_err(GatewayError::Serve)
}

fn spawn_session_sweeper(state: Arc<AppState>, max_idle: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = state.sessions.sweep_idle(max_idle);
            if removed > 0 {
                tracing::info!(removed, remaining = state.sessions.len(), "Idle sessions evicted");
            }
        }
    });
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/", get(index))
        .route("/config", post(config_handler))
        .route(
            "/photo",
            post(photo_handler).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/restart", post(restart_handler))
        .route("/reset", post(reset_handler))
        .route("/story.txt", get(download_handler))
        .with_state(state)
        .layer(axum::middleware::from_fn(log_request))
}

async fn log_request(request: Request<Body>, next: Next) -> Response {
    tracing::debug!(method = %request.method(), path = %request.uri().path(), "request");
    next.run(request).await
}

async fn health() -> &'static str {
    "OK"
}

/// Live session named by the cookie, if any. Unknown or evicted ids count as none.
fn known_session(state: &AppState, headers: &HeaderMap) -> Option<Uuid> {
    session_id_from_headers(headers).filter(|id| state.sessions.contains(*id))
}

/// The caller's live session, or a new one plus the `Set-Cookie` value for it.
fn session_for(state: &AppState, headers: &HeaderMap) -> (Uuid, Option<String>) {
    match known_session(state, headers) {
        Some(id) => (id, None),
        None => {
            let id = state.sessions.create();
            (id, Some(session_cookie(id)))
        }
    }
}

fn respond(cookie: Option<String>, response: impl IntoResponse) -> Response {
    let mut response = response.into_response();
    if let Some(value) = cookie.and_then(|c| HeaderValue::from_str(&c).ok()) {
        response.headers_mut().append(SET_COOKIE, value);
    }
    response
}

/// Write the story if the scene list is full and nobody else is already writing it.
async fn drive_story(state: &AppState, id: Uuid) {
    let Some(request) = state
        .sessions
        .with(id, |s| state.wizard.begin_story(s))
        .flatten()
    else {
        return;
    };
    tracing::info!(session = %id, scenes = request.cards.len(), "Composing story");
    let text = compose_story(state.model.as_ref(), &request.cards, &request.profile).await;
    if state
        .sessions
        .with(id, |s| state.wizard.complete_story(s, &request, text))
        .is_none()
    {
        tracing::info!(session = %id, "Session evicted before the story arrived");
    }
}

/// Renders the current screen; a story that is due gets written first.
///
/// The story call runs in its own task, so a client that gives up mid-call
/// still leaves the session on the story step.
async fn index(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (id, cookie) = session_for(&state, &headers);

    let due = state
        .sessions
        .with(id, |s| state.wizard.story_due(s))
        .unwrap_or(false);
    if due {
        let worker_state = Arc::clone(&state);
        let story = tokio::spawn(async move { drive_story(&worker_state, id).await });
        if let Err(e) = story.await {
            tracing::error!(session = %id, "Story task failed: {}", e);
        }
    }

    let html = state
        .sessions
        .with(id, |s| render::render_page(&state.app_name, &state.wizard.view(s)))
        .unwrap_or_else(|| {
            let mut fresh = Session::new();
            let page = render::render_page(&state.app_name, &state.wizard.view(&mut fresh));
            page
        });
    respond(cookie, Html(html))
}

/// Config form: every button posts the typed fields along with its own name/value.
async fn config_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<ConfigForm>,
) -> Redirect {
    if let Some(id) = known_session(&state, &headers) {
        state
            .sessions
            .with(id, |s| apply_config_form(&state.wizard, s, form));
    }
    Redirect::to("/")
}

fn apply_config_form(wizard: &Wizard, session: &mut Session, form: ConfigForm) {
    let age = form
        .age
        .as_deref()
        .and_then(|a| a.trim().parse::<u8>().ok())
        .unwrap_or(DEFAULT_AGE);
    wizard.update_draft(
        session,
        ConfigDraft {
            child_name: form.child_name,
            companion_name: form.companion_name,
            age,
        },
    );

    if let Some(genre) = form.genre.as_deref() {
        if let Some(genre) = Genre::from_slug(genre) {
            wizard.select_genre(session, genre);
        }
    } else if let Some(purpose) = form.purpose.as_deref() {
        if let Some(purpose) = Purpose::from_slug(purpose) {
            wizard.select_purpose(session, purpose);
        }
    } else if form.action.as_deref() == Some("start") {
        if let Err(e) = wizard.start(session) {
            tracing::info!("Start refused: {}", e);
        }
    }
}

/// Photo upload → recognition → (maybe) story, then back to `/`.
///
/// The model work runs in its own task so a dropped connection cannot strand the
/// in-flight flag; the request waits for it so the redirect shows the result.
async fn photo_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Redirect {
    let Some(id) = known_session(&state, &headers) else {
        return Redirect::to("/");
    };
    let upload = read_photo(&mut multipart).await.map_err(|e| e.to_string());

    let Some(request) = state
        .sessions
        .with(id, |s| state.wizard.begin_recognition(s))
        .flatten()
    else {
        tracing::info!(session = %id, "Photo ignored: not on the camera step, list full, or a photo is already being read");
        return Redirect::to("/");
    };
    let claimed = request.clone();

    let worker_state = Arc::clone(&state);
    let worker = tokio::spawn(async move {
        let state = worker_state;
        let outcome = match upload {
            Ok(photo) => {
                recognize_object(
                    state.model.as_ref(),
                    &photo,
                    &request.profile,
                    &request.seen_types,
                )
                .await
            }
            Err(e) => {
                tracing::warn!(session = %id, "Unusable upload: {}", e);
                Ok(None)
            }
        };
        state
            .sessions
            .with(id, |s| state.wizard.finish_recognition(s, &request, outcome));
        drive_story(&state, id).await;
    });
    if let Err(e) = worker.await {
        tracing::error!(session = %id, "Recognition task failed: {}", e);
        state
            .sessions
            .with(id, |s| state.wizard.finish_recognition(s, &claimed, Ok(None)));
    }

    Redirect::to("/")
}

async fn read_photo(multipart: &mut Multipart) -> Result<Photo, UploadError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("photo") {
            continue;
        }
        let bytes = field.bytes().await?;
        let photo = tokio::task::spawn_blocking(move || Photo::from_upload(&bytes)).await??;
        return Ok(photo);
    }
    Err(UploadError::MissingPhoto)
}

async fn restart_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Redirect {
    if let Some(id) = known_session(&state, &headers) {
        state.sessions.with(id, |s| state.wizard.restart(s));
    }
    Redirect::to("/")
}

async fn reset_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Redirect {
    if let Some(id) = known_session(&state, &headers) {
        state.sessions.with(id, |s| state.wizard.reset(s));
    }
    Redirect::to("/")
}

async fn download_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let download = known_session(&state, &headers)
        .and_then(|id| state.sessions.with(id, |s| state.wizard.download(s)))
        .flatten();
    match download {
        Some((file_name, contents)) => (
            [
                (CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
                (CONTENT_DISPOSITION, content_disposition(&file_name)),
            ],
            contents,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "No story yet").into_response(),
    }
}

/// `attachment` with an ASCII fallback name and the RFC 5987 UTF-8 name.
fn content_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' && c != '\\' { c } else { '_' })
        .collect();
    let mut encoded = String::new();
    for b in file_name.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            encoded.push(b as char);
        } else {
            encoded.push_str(&format!("%{:02X}", b));
        }
    }
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii, encoded
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::header::{COOKIE, LOCATION};
    use phodong_core::{ModelError, SceneCard, Step};
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Canned Gemini: replies in order, counts calls.
    struct Scripted {
        replies: Mutex<Vec<Result<String, ModelError>>>,
        calls: Mutex<usize>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, ModelError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl VisionModel for Scripted {
        async fn generate(&self, _prompt: &str, _photo: Option<&Photo>) -> Result<String, ModelError> {
            *self.calls.lock().unwrap() += 1;
            self.replies.lock().unwrap().pop().unwrap_or(Err(ModelError::EmptyReply))
        }
    }

    /// Takes its time over the story; recognition is never asked of it.
    struct SlowStoryteller;

    #[async_trait]
    impl VisionModel for SlowStoryteller {
        async fn generate(&self, _prompt: &str, _photo: Option<&Photo>) -> Result<String, ModelError> {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok("The Sleepy Cup\nOnce upon a time...\nThe End.".to_string())
        }
    }

    struct Crashing;

    #[async_trait]
    impl VisionModel for Crashing {
        async fn generate(&self, _prompt: &str, _photo: Option<&Photo>) -> Result<String, ModelError> {
            panic!("model client crashed");
        }
    }

    fn character(kind: &str) -> Result<String, ModelError> {
        Ok(format!(
            "```json\n{{\"has_interesting_object\": true, \"character_name\": \"{kind} hero\", \"character_type\": \"{kind}\", \"magic_power\": \"sparkles\", \"personality\": \"bold\", \"dialogue\": \"Be brave, Minjun!\", \"story_narration\": \"The {kind} wakes up.\"}}\n```"
        ))
    }

    fn cup_card() -> SceneCard {
        SceneCard {
            character_name: "Cuppy".into(),
            character_type: "cup".into(),
            personality: "sleepy".into(),
            magic_power: "warm cocoa".into(),
            dialogue: "Good night!".into(),
            story_narration: "Cuppy yawns.".into(),
            photo: Photo::from_base64("image/jpeg", "QUJD"),
        }
    }

    fn state_with(model: Arc<dyn VisionModel>, max_scenes: usize) -> Arc<AppState> {
        Arc::new(AppState {
            app_name: "PHODONG".to_string(),
            wizard: Wizard::new(max_scenes),
            sessions: SessionStore::new(),
            model,
        })
    }

    fn inspect<R>(state: &AppState, id: Uuid, f: impl FnOnce(&mut Session) -> R) -> R {
        state.sessions.with(id, f).expect("live session")
    }

    fn cookie_header(id: Uuid) -> String {
        format!("{}={}", sessions::SESSION_COOKIE, id)
    }

    fn cookie_id(res: &Response) -> Uuid {
        let cookie = res.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        let value = cookie.split(';').next().unwrap().split_once('=').unwrap().1;
        Uuid::parse_str(value).unwrap()
    }

    /// First visit: returns the id from the cookie the gateway hands out.
    async fn open_session(app: &Router) -> Uuid {
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        cookie_id(&res)
    }

    async fn get(app: &Router, uri: &str, id: Uuid) -> Response {
        let req = Request::builder()
            .method("GET")
            .uri(uri)
            .header(COOKIE, cookie_header(id))
            .body(Body::empty())
            .unwrap();
        app.clone().oneshot(req).await.unwrap()
    }

    async fn post_form(app: &Router, uri: &str, id: Uuid, body: &str) -> Response {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(COOKIE, cookie_header(id))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();
        app.clone().oneshot(req).await.unwrap()
    }

    fn png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(16, 16, image::Rgb([250, 200, 10]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    async fn post_photo(app: &Router, id: Uuid, bytes: &[u8]) -> Response {
        let boundary = "phodongtestboundary";
        let mut body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"shot.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        let req = Request::builder()
            .method("POST")
            .uri("/photo")
            .header(COOKIE, cookie_header(id))
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap();
        app.clone().oneshot(req).await.unwrap()
    }

    async fn body_text(res: Response) -> String {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn first_visit_sets_cookie_and_shows_config() {
        let state = state_with(Scripted::new(vec![]), 4);
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let res = app(Arc::clone(&state)).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let cookie = res.headers().get(SET_COOKIE).unwrap().to_str().unwrap().to_string();
        assert!(cookie.starts_with("phodong_session="));
        assert!(state.sessions.contains(cookie_id(&res)));
        let html = body_text(res).await;
        assert!(html.contains("Start the adventure"));
        assert!(html.contains(r#"<div class="step-item active"><div class="step-dot">1</div> Setup</div>"#));
    }

    #[tokio::test]
    async fn returning_visit_keeps_session_without_new_cookie() {
        let state = state_with(Scripted::new(vec![]), 4);
        let router = app(Arc::clone(&state));
        let id = open_session(&router).await;
        let res = get(&router, "/", id).await;
        assert!(res.headers().get(SET_COOKIE).is_none());
        assert_eq!(state.sessions.len(), 1);
    }

    #[tokio::test]
    async fn unknown_cookie_gets_a_fresh_session() {
        let state = state_with(Scripted::new(vec![]), 4);
        let router = app(Arc::clone(&state));
        let stranger = Uuid::new_v4();

        let res = get(&router, "/", stranger).await;
        let issued = cookie_id(&res);
        assert_ne!(issued, stranger);
        assert!(!state.sessions.contains(stranger));
        assert_eq!(state.sessions.len(), 1);
    }

    #[tokio::test]
    async fn posts_without_a_live_session_store_nothing() {
        let state = state_with(Scripted::new(vec![]), 4);
        let router = app(Arc::clone(&state));
        let stranger = Uuid::new_v4();

        let res = post_form(&router, "/config", stranger, "child_name=Minjun&action=start").await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        post_photo(&router, stranger, &png()).await;
        post_form(&router, "/restart", stranger, "").await;
        post_form(&router, "/reset", stranger, "").await;
        assert_eq!(get(&router, "/story.txt", stranger).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(state.sessions.len(), 0);
    }

    #[tokio::test]
    async fn evicted_session_starts_over() {
        let state = state_with(Scripted::new(vec![]), 4);
        let router = app(Arc::clone(&state));
        let id = open_session(&router).await;
        post_form(&router, "/config", id, "child_name=Minjun&action=start").await;

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(state.sessions.sweep_idle(Duration::ZERO), 1);

        let res = get(&router, "/", id).await;
        assert_ne!(cookie_id(&res), id);
        assert!(body_text(res).await.contains("Start the adventure"));
    }

    #[tokio::test]
    async fn health_is_ok() {
        let state = state_with(Scripted::new(vec![]), 4);
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let res = app(state).oneshot(req).await.unwrap();
        assert_eq!(body_text(res).await, "OK");
    }

    #[tokio::test]
    async fn empty_name_shows_warning_and_stays_on_config() {
        let state = state_with(Scripted::new(vec![]), 4);
        let router = app(Arc::clone(&state));
        let id = open_session(&router).await;

        let res = post_form(&router, "/config", id, "child_name=+++&companion_name=&age=7&action=start").await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers().get(LOCATION).unwrap(), "/");
        assert!(res.headers().get(SET_COOKIE).is_none());

        let html = body_text(get(&router, "/", id).await).await;
        assert!(html.contains("Please enter the hero's name."));
        assert_eq!(inspect(&state, id, |s| s.step()), Step::Config);
    }

    #[tokio::test]
    async fn unknown_button_is_a_no_op() {
        let state = state_with(Scripted::new(vec![]), 4);
        let router = app(Arc::clone(&state));
        let id = open_session(&router).await;
        post_form(&router, "/config", id, "child_name=Minjun&action=dance").await;
        post_form(&router, "/config", id, "child_name=Minjun&genre=western").await;
        inspect(&state, id, |s| {
            assert_eq!(s.step(), Step::Config);
            assert!(s.notice().is_none());
            assert_eq!(s.selected_genre(), Genre::Fantasy);
            assert_eq!(s.draft().child_name, "Minjun");
        });
    }

    #[tokio::test]
    async fn genre_click_keeps_typed_name() {
        let state = state_with(Scripted::new(vec![]), 4);
        let router = app(Arc::clone(&state));
        let id = open_session(&router).await;
        post_form(&router, "/config", id, "child_name=Minjun&companion_name=Pororo&age=5&genre=nature").await;
        let html = body_text(get(&router, "/", id).await).await;
        assert!(html.contains(r#"value="Minjun""#));
        assert!(html.contains(r#"value="nature" class="option selected""#));
        assert!(html.contains(r#"<option value="5" selected>5</option>"#));
    }

    #[tokio::test]
    async fn four_photos_make_a_story_and_download() {
        let model = Scripted::new(vec![
            character("cup"),
            character("spoon"),
            Ok(r#"{"has_interesting_object": false}"#.to_string()),
            character("teddy bear"),
            character("lamp"),
            Ok("Minjun and the Brave Friends\nOnce upon a time, a cup woke up.\nThe End.".to_string()),
        ]);
        let state = state_with(model.clone(), 4);
        let router = app(Arc::clone(&state));
        let id = open_session(&router).await;

        post_form(&router, "/config", id, "child_name=Minjun&companion_name=&age=7&action=start").await;
        assert_eq!(inspect(&state, id, |s| s.step()), Step::Camera);

        for _ in 0..3 {
            let res = post_photo(&router, id, &png()).await;
            assert_eq!(res.status(), StatusCode::SEE_OTHER);
        }
        inspect(&state, id, |s| {
            assert_eq!(s.cards().len(), 2, "the negative reply adds nothing");
            assert_eq!(s.seen_types(), ["cup".to_string(), "spoon".to_string()]);
            assert_eq!(s.step(), Step::Camera);
        });
        let html = body_text(get(&router, "/", id).await).await;
        assert!(html.contains("2 / 4 scenes done"));
        assert!(html.contains("take the photo again"));

        post_photo(&router, id, &png()).await;
        assert_eq!(inspect(&state, id, |s| s.step()), Step::Camera);
        post_photo(&router, id, &png()).await;

        inspect(&state, id, |s| {
            assert_eq!(s.cards().len(), 4);
            assert_eq!(s.seen_types().len(), 4);
            assert_eq!(s.step(), Step::Story);
        });
        assert_eq!(model.calls(), 6);

        let html = body_text(get(&router, "/", id).await).await;
        assert!(html.contains(r#"<div class="story-title">Minjun and the Brave Friends</div>"#));
        assert!(html.contains("🌟 The End 🌟"));
        assert!(html.contains("Starring: Minjun &amp; friend"));
        assert_eq!(model.calls(), 6, "rendering the story does not call the model again");

        let res = get(&router, "/story.txt", id).await;
        assert_eq!(res.status(), StatusCode::OK);
        let disposition = res.headers().get(CONTENT_DISPOSITION).unwrap().to_str().unwrap().to_string();
        assert!(disposition.contains("phodong_Minjun_story.txt"));
        assert_eq!(
            body_text(res).await,
            "Minjun and the Brave Friends\n\nOnce upon a time, a cup woke up.\nThe End."
        );

        post_photo(&router, id, &png()).await;
        assert_eq!(model.calls(), 6, "photos after the story are ignored");

        post_form(&router, "/reset", id, "").await;
        inspect(&state, id, |s| {
            assert_eq!(s.step(), Step::Config);
            assert!(s.cards().is_empty() && s.story_text().is_none());
        });
        assert_eq!(get(&router, "/story.txt", id).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn abandoned_page_load_still_finishes_story() {
        let state = state_with(Arc::new(SlowStoryteller), 1);
        let router = app(Arc::clone(&state));
        let id = open_session(&router).await;
        inspect(&state, id, |s| {
            state.wizard.update_draft(
                s,
                ConfigDraft {
                    child_name: "Minjun".into(),
                    ..Default::default()
                },
            );
            state.wizard.start(s).unwrap();
            let request = state.wizard.begin_recognition(s).unwrap();
            state.wizard.finish_recognition(s, &request, Ok(Some(cup_card())));
            assert!(state.wizard.story_due(s));
        });

        let gave_up = tokio::time::timeout(Duration::from_millis(50), get(&router, "/", id)).await;
        assert!(gave_up.is_err(), "the client left before the story arrived");

        tokio::time::sleep(Duration::from_millis(500)).await;
        inspect(&state, id, |s| {
            assert_eq!(s.step(), Step::Story);
            assert!(!s.in_flight());
            assert_eq!(s.story_text(), Some("The Sleepy Cup\nOnce upon a time...\nThe End."));
        });
        let html = body_text(get(&router, "/", id).await).await;
        assert!(html.contains(r#"<div class="story-title">The Sleepy Cup</div>"#));
    }

    #[tokio::test]
    async fn crashed_recognition_frees_the_camera() {
        let state = state_with(Arc::new(Crashing), 4);
        let router = app(Arc::clone(&state));
        let id = open_session(&router).await;
        post_form(&router, "/config", id, "child_name=Minjun&action=start").await;

        let res = post_photo(&router, id, &png()).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        inspect(&state, id, |s| {
            assert!(!s.in_flight());
            assert!(s.cards().is_empty());
            assert!(s.notice().is_some());
            assert!(state.wizard.begin_recognition(s).is_some(), "another photo can be taken");
        });
    }

    #[tokio::test]
    async fn missing_credential_is_shown_inline() {
        let state = state_with(Arc::new(GeminiClient::new(None)), 4);
        let router = app(Arc::clone(&state));
        let id = open_session(&router).await;
        post_form(&router, "/config", id, "child_name=Minjun&action=start").await;
        post_photo(&router, id, &png()).await;

        let html = body_text(get(&router, "/", id).await).await;
        assert!(html.contains("notice-error"));
        assert!(html.contains("GOOGLE_API_KEY"));
        inspect(&state, id, |s| {
            assert!(s.cards().is_empty());
            assert!(!s.in_flight());
        });
    }

    #[tokio::test]
    async fn broken_upload_asks_for_retry_without_calling_model() {
        let model = Scripted::new(vec![character("cup")]);
        let state = state_with(model.clone(), 4);
        let router = app(Arc::clone(&state));
        let id = open_session(&router).await;
        post_form(&router, "/config", id, "child_name=Minjun&action=start").await;
        post_photo(&router, id, b"not an image").await;

        assert_eq!(model.calls(), 0);
        inspect(&state, id, |s| {
            assert!(s.cards().is_empty());
            assert!(!s.in_flight());
            assert!(s.notice().is_some());
        });
    }

    #[tokio::test]
    async fn restart_from_camera_discards_profile() {
        let model = Scripted::new(vec![character("cup")]);
        let state = state_with(model, 4);
        let router = app(Arc::clone(&state));
        let id = open_session(&router).await;
        post_form(&router, "/config", id, "child_name=Minjun&action=start").await;
        post_photo(&router, id, &png()).await;
        post_form(&router, "/restart", id, "").await;
        inspect(&state, id, |s| {
            assert_eq!(s.step(), Step::Config);
            assert!(s.profile().is_none());
            assert!(s.cards().is_empty() && s.seen_types().is_empty());
        });
    }

    #[test]
    fn content_disposition_has_ascii_and_utf8_names() {
        assert_eq!(
            content_disposition("phodong_Minjun_story.txt"),
            "attachment; filename=\"phodong_Minjun_story.txt\"; filename*=UTF-8''phodong_Minjun_story.txt"
        );
        let d = content_disposition("phodong_민준_story.txt");
        assert!(d.contains("filename=\"phodong____story.txt\""));
        assert!(d.contains("filename*=UTF-8''phodong_%EB%AF%BC%EC%A4%80_story.txt"));
        assert!(HeaderValue::from_str(&d).is_ok());
    }
}
