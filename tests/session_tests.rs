use axum::http::{HeaderMap, HeaderValue, header};
use finanzas_portal::{
    AppConfig,
    auth::Claims,
    session::{
        ACCESS_TOKEN_COOKIE, CookieMutation, REFRESH_TOKEN_COOKIE, RequestCookies, SessionGrant,
        SessionProvider, SupabaseSessionProvider,
    },
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::time::SystemTime;
use uuid::Uuid;

// --- Helper Functions ---

fn create_token(secret: &str, user_id: Uuid, exp_offset: i64) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub: user_id,
        exp: (now + exp_offset) as usize,
        email: None,
    };

    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

fn cookie_headers(pairs: &[(&str, &str)]) -> HeaderMap {
    let rendered = pairs
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ");
    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, HeaderValue::from_str(&rendered).unwrap());
    headers
}

// --- Cookie Snapshot Tests ---

#[test]
fn test_cookies_parse_a_single_header() {
    let headers = cookie_headers(&[("sb-access-token", "abc"), ("theme", "dark")]);
    let cookies = RequestCookies::from_headers(&headers);

    assert_eq!(cookies.get(ACCESS_TOKEN_COOKIE), Some("abc"));
    assert_eq!(cookies.get("theme"), Some("dark"));
    assert_eq!(cookies.get("missing"), None);
}

#[test]
fn test_cookies_parse_multiple_headers() {
    let mut headers = HeaderMap::new();
    headers.append(header::COOKIE, HeaderValue::from_static("a=1"));
    headers.append(header::COOKIE, HeaderValue::from_static("b=2; c=3"));

    let cookies = RequestCookies::from_headers(&headers);
    assert_eq!(cookies.get("a"), Some("1"));
    assert_eq!(cookies.get("b"), Some("2"));
    assert_eq!(cookies.get("c"), Some("3"));
}

#[test]
fn test_cookies_tolerate_whitespace_and_junk() {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::COOKIE,
        HeaderValue::from_static("  a = 1 ;nonsense; b=2"),
    );

    let cookies = RequestCookies::from_headers(&headers);
    assert_eq!(cookies.get("a"), Some("1"));
    assert_eq!(cookies.get("b"), Some("2"));
    // A fragment with no '=' is skipped, not an error.
    assert_eq!(cookies.get("nonsense"), None);
}

#[test]
fn test_cookies_empty_when_no_header() {
    let cookies = RequestCookies::from_headers(&HeaderMap::new());
    assert_eq!(cookies.get(ACCESS_TOKEN_COOKIE), None);
}

// --- Cookie Mutation Tests ---

#[test]
fn test_set_mutation_renders_with_max_age() {
    let mutation = CookieMutation::set("sb-access-token", "abc", Some(3600));
    assert_eq!(
        mutation.to_header_value(),
        "sb-access-token=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=3600"
    );
}

#[test]
fn test_set_mutation_renders_without_max_age() {
    let mutation = CookieMutation::set("sb-access-token", "abc", None);
    assert_eq!(
        mutation.to_header_value(),
        "sb-access-token=abc; Path=/; HttpOnly; SameSite=Lax"
    );
}

#[test]
fn test_clear_mutation_expires_immediately() {
    let mutation = CookieMutation::clear("sb-refresh-token");
    assert_eq!(
        mutation.to_header_value(),
        "sb-refresh-token=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
    );
}

#[test]
fn test_grant_persists_both_tokens() {
    let grant = SessionGrant {
        access_token: "acc".to_string(),
        refresh_token: "ref".to_string(),
        expires_in: Some(3600),
    };

    let mutations = grant.cookie_mutations();
    assert_eq!(mutations.len(), 2);
    assert_eq!(mutations[0].name, ACCESS_TOKEN_COOKIE);
    assert_eq!(mutations[0].value, "acc");
    assert_eq!(mutations[0].max_age, Some(3600));
    assert_eq!(mutations[1].name, REFRESH_TOKEN_COOKIE);
    assert_eq!(mutations[1].max_age, Some(60 * 60 * 24 * 7));
}

// --- Provider Probe Tests (local validation paths only) ---

fn create_provider() -> SupabaseSessionProvider {
    // The default config points at localhost; none of these paths perform a
    // network round trip.
    SupabaseSessionProvider::new(&AppConfig::default())
}

#[tokio::test]
async fn test_probe_accepts_a_locally_valid_access_token() {
    let provider = create_provider();
    let user_id = Uuid::new_v4();
    let token = create_token(&AppConfig::default().jwt_secret, user_id, 3600);

    let cookies = RequestCookies::from_headers(&cookie_headers(&[(ACCESS_TOKEN_COOKIE, &token)]));
    let probe = provider.probe(&cookies).await;

    assert!(probe.status.is_valid());
    assert_eq!(probe.status.session().unwrap().user_id, user_id);
    // The happy path rotates nothing.
    assert!(probe.refreshed.is_empty());
}

#[tokio::test]
async fn test_probe_without_cookies_is_invalid() {
    let provider = create_provider();
    let probe = provider.probe(&RequestCookies::default()).await;
    assert!(!probe.status.is_valid());
    assert!(probe.refreshed.is_empty());
}

#[tokio::test]
async fn test_probe_with_garbage_token_and_no_refresh_is_invalid() {
    let provider = create_provider();
    let cookies =
        RequestCookies::from_headers(&cookie_headers(&[(ACCESS_TOKEN_COOKIE, "not.a.jwt")]));
    let probe = provider.probe(&cookies).await;
    assert!(!probe.status.is_valid());
}

#[tokio::test]
async fn test_probe_with_wrongly_signed_token_is_invalid() {
    let provider = create_provider();
    let token = create_token("a-completely-different-secret", Uuid::new_v4(), 3600);
    let cookies = RequestCookies::from_headers(&cookie_headers(&[(ACCESS_TOKEN_COOKIE, &token)]));
    let probe = provider.probe(&cookies).await;
    assert!(!probe.status.is_valid());
}
