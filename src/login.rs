#![cfg(not(tarpaulin_include))]

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Form, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::app::AppState;

/// A registered application user.
///
/// Accounts are keyed by email. Google-authenticated accounts have no
/// password hash.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    /// Email address (unique identifier for the user)
    pub email: String,

    /// Display name
    pub name: String,

    /// Remaining chart-generation credits
    pub graph_credits: u32,

    /// Argon2 hash of the user's password, if one was ever set
    pub password_hash: Option<String>,
}

/// Credit balance granted to every new account.
pub const STARTING_CREDITS: u32 = 10;

/// Outcome of a credit deduction.
#[derive(Debug, PartialEq, Eq)]
pub enum CreditOutcome {
    /// One credit was deducted; carries the remaining balance.
    Deducted(u32),

    /// The balance was already zero; nothing was deducted.
    Insufficient,
}

/// User session data
#[derive(Debug, Clone)]
pub struct Session {
    /// Email of the authenticated user
    pub email: String,

    /// Time when the session expires
    pub expires_at: SystemTime,
}

/// Global sessions storage
///
/// Stores all active user sessions in a thread-safe map.
lazy_static! {
    static ref SESSIONS: RwLock<HashMap<String, Session>> = RwLock::new(HashMap::new());
}

const USERS_FILE: &str = "users.json";
const SESSION_COOKIE: &str = "session";
const SESSION_DURATION: u64 = 24 * 60 * 60; // 24 hours in seconds

/// The account database: a JSON file of users keyed by email, living in a
/// directory the store owns. The directory is injected at construction so
/// tests can point it anywhere.
#[derive(Debug, Clone)]
pub struct AccountStore {
    dir: PathBuf,
}

impl AccountStore {
    /// Open (and if necessary create) the account database directory.
    pub fn open(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            create_dir_all(&dir)?;
        }
        let users_path = dir.join(USERS_FILE);
        if !users_path.exists() {
            let mut file = File::create(&users_path)?;
            file.write_all(b"{}")?;
        }
        Ok(AccountStore { dir })
    }

    fn users_path(&self) -> PathBuf {
        self.dir.join(USERS_FILE)
    }

    /// Get all registered users, keyed by email.
    pub fn all(&self) -> Result<HashMap<String, User>, String> {
        let contents = std::fs::read_to_string(self.users_path())
            .map_err(|_| "Failed to read users file".to_string())?;
        serde_json::from_str(&contents).map_err(|_| "Failed to parse users data".to_string())
    }

    fn save(&self, users: &HashMap<String, User>) -> Result<(), String> {
        let json = serde_json::to_string_pretty(users)
            .map_err(|_| "Failed to serialize users data".to_string())?;
        std::fs::write(self.users_path(), json)
            .map_err(|_| "Failed to write users data".to_string())
    }

    /// Look up a single user by email.
    pub fn find(&self, email: &str) -> Result<Option<User>, String> {
        Ok(self.all()?.get(email).cloned())
    }

    /// Register a new password-based account.
    ///
    /// # Errors
    /// * Returns an error if any field is empty or the email is taken
    pub fn register(&self, email: &str, name: &str, password: &str) -> Result<(), String> {
        if email.is_empty() || name.is_empty() || password.is_empty() {
            return Err("Email, name and password cannot be empty".to_string());
        }

        let mut users = self.all()?;
        if users.contains_key(email) {
            return Err("Email address is already registered".to_string());
        }

        let password_hash = hash_password(password)?;
        users.insert(
            email.to_string(),
            User {
                email: email.to_string(),
                name: name.to_string(),
                graph_credits: STARTING_CREDITS,
                password_hash: Some(password_hash),
            },
        );
        self.save(&users)
    }

    /// Verify an email/password pair against the stored hash.
    pub fn verify(&self, email: &str, password: &str) -> Result<bool, String> {
        let users = self.all()?;
        match users.get(email).and_then(|u| u.password_hash.as_deref()) {
            Some(hash) => verify_password(password, hash),
            None => Ok(false),
        }
    }

    /// Find-or-create an account for a Google-verified identity. An
    /// existing account keeps its credits and password hash; only the
    /// display name is refreshed.
    pub fn upsert_google_user(&self, email: &str, name: &str) -> Result<User, String> {
        let mut users = self.all()?;
        let user = users.entry(email.to_string()).or_insert_with(|| User {
            email: email.to_string(),
            name: name.to_string(),
            graph_credits: STARTING_CREDITS,
            password_hash: None,
        });
        user.name = name.to_string();
        let user = user.clone();
        self.save(&users)?;
        Ok(user)
    }

    /// Deduct one graph credit from the user's balance, if any remain.
    pub fn use_credit(&self, email: &str) -> Result<CreditOutcome, String> {
        let mut users = self.all()?;
        let user = users
            .get_mut(email)
            .ok_or_else(|| "User profile not found".to_string())?;

        if user.graph_credits == 0 {
            return Ok(CreditOutcome::Insufficient);
        }
        user.graph_credits -= 1;
        let remaining = user.graph_credits;
        self.save(&users)?;
        Ok(CreditOutcome::Deducted(remaining))
    }
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(_) => Err("Password hashing failed".to_string()),
    }
}

/// Verify a password against a stored Argon2 hash.
fn verify_password(password: &str, hash: &str) -> Result<bool, String> {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(hash) => hash,
        Err(_) => return Err("Invalid password hash format".to_string()),
    };

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false), // Password didn't match
    }
}

/// Create a new session for an authenticated user.
///
/// # Returns
/// * `String` - A unique session ID
pub fn create_session(email: &str) -> String {
    let session_id = Uuid::new_v4().to_string();
    let expires_at = SystemTime::now() + Duration::from_secs(SESSION_DURATION);

    let session = Session {
        email: email.to_string(),
        expires_at,
    };

    let mut sessions = SESSIONS.write().unwrap();
    sessions.insert(session_id.clone(), session);

    session_id
}

/// Validate a session, returning its user's email if it exists and has
/// not expired.
pub fn validate_session(session_id: &str) -> Option<String> {
    let sessions = SESSIONS.read().unwrap();

    if let Some(session) = sessions.get(session_id) {
        if session.expires_at > SystemTime::now() {
            return Some(session.email.clone());
        }
    }

    None
}

fn destroy_session(session_id: &str) {
    let mut sessions = SESSIONS.write().unwrap();
    sessions.remove(session_id);
}

/// Resolve the current user from the request's session cookie.
pub fn current_user(state: &AppState, jar: &CookieJar) -> Option<User> {
    let cookie = jar.get(SESSION_COOKIE)?;
    let email = validate_session(cookie.value())?;
    state.accounts.find(&email).ok().flatten()
}

// Web handler functions below

/// Signup form data
#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub email: String,
    pub name: String,
    pub password: String,
}

/// Login form data
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Google ID token as posted by the frontend sign-in widget
#[derive(Debug, Deserialize)]
pub struct TokenPayload {
    pub token: String,
}

/// Handle user registration
pub async fn handle_signup(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SignupForm>,
) -> Response {
    match state.accounts.register(&form.email, &form.name, &form.password) {
        Ok(()) => Json(json!({"status": "success"})).into_response(),
        Err(message) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"status": "error", "message": message})),
        )
            .into_response(),
    }
}

/// Handle user login
///
/// Validates credentials and, if they check out, opens a session and sets
/// the session cookie.
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    match state.accounts.verify(&form.email, &form.password) {
        Ok(true) => {
            let session_id = create_session(&form.email);
            let cookie = Cookie::new(SESSION_COOKIE, session_id);
            let user = state.accounts.find(&form.email).ok().flatten();
            (
                jar.add(cookie),
                Json(json!({
                    "status": "success",
                    "user": {
                        "email": form.email,
                        "name": user.map(|u| u.name).unwrap_or_default(),
                    },
                })),
            )
                .into_response()
        }
        Ok(false) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"status": "error", "message": "Invalid email or password"})),
        )
            .into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"status": "error", "message": "Authentication error"})),
        )
            .into_response(),
    }
}

/// Handle user logout
///
/// Drops the session and clears the cookie.
pub async fn handle_logout(jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        destroy_session(cookie.value());
    }
    let cookie = Cookie::new(SESSION_COOKIE, "");
    (jar.add(cookie), Json(json!({"status": "success"}))).into_response()
}

/// Current-user lookup by session cookie
pub async fn handle_me(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    match current_user(&state, &jar) {
        Some(user) => Json(json!({
            "email": user.email,
            "name": user.name,
            "graph_credits": user.graph_credits,
        }))
        .into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Not authenticated"})),
        )
            .into_response(),
    }
}

/// Handle Google sign-in
///
/// Verifies the posted ID token against Google's tokeninfo endpoint,
/// finds or creates the matching account, and opens a session.
pub async fn handle_google_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<TokenPayload>,
) -> Response {
    let Some(client_id) = state.config.google_client_id.clone() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "Google Client ID is not configured on the server."})),
        )
            .into_response();
    };

    let claims = match verify_google_token(&client_id, &payload.token).await {
        Ok(claims) => claims,
        Err(reason) => {
            log::warn!("rejected Google token: {}", reason);
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"detail": format!("Invalid Google token: {}", reason)})),
            )
                .into_response();
        }
    };

    match state.accounts.upsert_google_user(&claims.email, &claims.name) {
        Ok(user) => {
            let session_id = create_session(&user.email);
            let cookie = Cookie::new(SESSION_COOKIE, session_id);
            (
                jar.add(cookie),
                Json(json!({
                    "message": "Login successful!",
                    "user": { "email": user.email, "name": user.name },
                })),
            )
                .into_response()
        }
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "Failed to store user account"})),
        )
            .into_response(),
    }
}

/// Handle a credit deduction for the authenticated user
///
/// Returns the remaining balance, or `insufficient_credits` when the
/// balance was already zero.
pub async fn handle_use_credit(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let Some(user) = current_user(&state, &jar) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Not authenticated"})),
        )
            .into_response();
    };

    match state.accounts.use_credit(&user.email) {
        Ok(CreditOutcome::Deducted(remaining)) => Json(json!({
            "status": "success",
            "credits_remaining": remaining,
        }))
        .into_response(),
        Ok(CreditOutcome::Insufficient) => Json(json!({
            "status": "insufficient_credits",
            "credits_remaining": 0,
        }))
        .into_response(),
        Err(reason) => {
            log::error!("credit update failed for {}: {}", user.email, reason);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"detail": "An error occurred while processing credits."})),
            )
                .into_response()
        }
    }
}

/// Identity claims extracted from a verified Google ID token.
#[derive(Debug, Clone)]
pub struct GoogleClaims {
    pub email: String,
    pub name: String,
}

/// Token metadata returned by Google's tokeninfo endpoint.
#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    email: Option<String>,
    name: Option<String>,
}

/// Verify a Google ID token and extract its identity claims.
///
/// The tokeninfo endpoint rejects expired or malformed tokens; on top of
/// that the audience must match our client id, or the token was issued
/// for some other application.
async fn verify_google_token(client_id: &str, token: &str) -> Result<GoogleClaims, String> {
    let url = format!("https://oauth2.googleapis.com/tokeninfo?id_token={}", token);
    let response = reqwest::get(&url)
        .await
        .map_err(|e| format!("tokeninfo request failed: {}", e))?;

    if !response.status().is_success() {
        return Err("token rejected by Google".to_string());
    }

    let info: TokenInfo = response
        .json()
        .await
        .map_err(|e| format!("unreadable tokeninfo response: {}", e))?;

    if info.aud != client_id {
        return Err("token was issued for a different client".to_string());
    }

    let email = info.email.unwrap_or_default();
    if email.is_empty() {
        return Err("token carries no email claim".to_string());
    }

    Ok(GoogleClaims {
        email,
        name: info.name.unwrap_or_default(),
    })
}
