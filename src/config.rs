/// Runtime configuration, sourced from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub bind_addr: String,

    /// Directory holding the account database.
    pub database_dir: String,

    /// OAuth client id for Google sign-in; the `/auth/google` route
    /// reports a configuration error when unset.
    pub google_client_id: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8000".to_string()),
            database_dir: std::env::var("DATABASE_DIR").unwrap_or_else(|_| "database".to_string()),
            google_client_id: std::env::var("GOOGLE_CLIENT_ID").ok(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "127.0.0.1:8000".to_string(),
            database_dir: "database".to_string(),
            google_client_id: None,
        }
    }
}
