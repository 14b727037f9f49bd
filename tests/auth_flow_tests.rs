use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use finanzas_portal::{
    AppConfig, AppState, MockFinanceApi, MockSessionProvider, NoticeHub, create_router,
    guard::RouteRules,
    models::{Goal, NewTransactionRequest, Transaction},
    repository::Repository,
    session::SessionGrant,
};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

// --- Mock Repository ---

#[derive(Default)]
struct MockRepo;

#[async_trait::async_trait]
impl Repository for MockRepo {
    async fn get_transactions(&self, _user_id: Uuid) -> Vec<Transaction> {
        vec![]
    }
    async fn add_transaction(
        &self,
        _user_id: Uuid,
        _req: NewTransactionRequest,
    ) -> Option<Transaction> {
        None
    }
    async fn get_goals(&self, _user_id: Uuid) -> Vec<Goal> {
        vec![]
    }
}

// --- Helper Functions ---

struct TestApp {
    router: axum::Router,
    notices: NoticeHub,
}

fn create_app(sessions: MockSessionProvider) -> TestApp {
    let notices = NoticeHub::with_auto_dismiss(None);
    let state = AppState {
        repo: Arc::new(MockRepo),
        sessions: Arc::new(sessions),
        finance: Arc::new(MockFinanceApi::new()),
        notices: notices.clone(),
        rules: Arc::new(RouteRules::default()),
        config: AppConfig::default(),
    };
    TestApp {
        router: create_router(state),
        notices,
    }
}

fn form_post(path: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn location(response: &axum::response::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap()
}

fn granted_provider() -> MockSessionProvider {
    MockSessionProvider {
        session: None,
        refreshed: Vec::new(),
        grant: Some(SessionGrant {
            access_token: "granted-access".to_string(),
            refresh_token: "granted-refresh".to_string(),
            expires_in: Some(3600),
        }),
    }
}

// --- Login Tests ---

#[tokio::test]
async fn test_login_success_sets_cookies_and_lands_on_dashboard() {
    let app = create_app(granted_provider());

    let response = app
        .router
        .oneshot(form_post("/login", "email=u%40example.com&password=secreta"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");

    let cookies: Vec<_> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(cookies.iter().any(|c| c.starts_with("sb-access-token=granted-access")));
    assert!(cookies.iter().any(|c| c.starts_with("sb-refresh-token=granted-refresh")));

    assert_eq!(app.notices.current().unwrap().title.as_deref(), Some("Bienvenido"));
}

#[tokio::test]
async fn test_login_returns_to_the_intercepted_path() {
    let app = create_app(granted_provider());

    let response = app
        .router
        .oneshot(form_post(
            "/login?redirectedFrom=%2Fsimulator",
            "email=u%40example.com&password=secreta",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/simulator");
}

#[tokio::test]
async fn test_login_ignores_external_redirect_targets() {
    let app = create_app(granted_provider());

    let response = app
        .router
        .oneshot(form_post(
            "/login?redirectedFrom=https%3A%2F%2Fevil.example",
            "email=u%40example.com&password=secreta",
        ))
        .await
        .unwrap();

    // Only internal paths are honored; anything else falls back to landing.
    assert_eq!(location(&response), "/dashboard");
}

#[tokio::test]
async fn test_login_rejection_notifies_and_returns_to_login() {
    let app = create_app(MockSessionProvider::anonymous());

    let response = app
        .router
        .oneshot(form_post("/login", "email=u%40example.com&password=mala"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert!(response.headers().get(header::SET_COOKIE).is_none());

    let notice = app.notices.current().unwrap();
    assert_eq!(notice.title.as_deref(), Some("Error al iniciar sesión"));
    assert_eq!(notice.description.as_deref(), Some("Credenciales inválidas"));
}

// --- Signup Tests ---

#[tokio::test]
async fn test_signup_success_notifies_and_goes_to_login() {
    let app = create_app(MockSessionProvider::anonymous());

    let response = app
        .router
        .oneshot(form_post("/signup", "email=nueva%40example.com&password=secreta"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    // Registration never establishes a session by itself.
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(app.notices.current().unwrap().title.as_deref(), Some("Cuenta creada"));
}

// --- Logout Tests ---

#[tokio::test]
async fn test_logout_clears_both_cookies() {
    let app = create_app(MockSessionProvider::authenticated(Uuid::new_v4()));

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let cookies: Vec<_> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(cookies.iter().any(|c| c.starts_with("sb-access-token=;") && c.contains("Max-Age=0")));
    assert!(cookies.iter().any(|c| c.starts_with("sb-refresh-token=;") && c.contains("Max-Age=0")));
}

// --- Page Tests ---

#[tokio::test]
async fn test_login_page_keeps_the_return_path_in_the_form() {
    let app = create_app(MockSessionProvider::anonymous());

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/login?redirectedFrom=%2Ftransactions")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("action=\"/login?redirectedFrom=%2Ftransactions\""));
}
