/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Largest accepted request body, which bounds import uploads
    /// (default: 10 MiB).
    pub max_import_bytes: usize,
    /// Finished import runs kept for status queries (default: `100`).
    pub import_history: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `MAX_IMPORT_BYTES`     | `10485760`                 |
    /// | `IMPORT_HISTORY`       | `100`                      |
    ///
    /// `DATABASE_URL` is read separately by the binary.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let max_import_bytes: usize = std::env::var("MAX_IMPORT_BYTES")
            .unwrap_or_else(|_| "10485760".into())
            .parse()
            .expect("MAX_IMPORT_BYTES must be a valid usize");

        let import_history: usize = std::env::var("IMPORT_HISTORY")
            .unwrap_or_else(|_| "100".into())
            .parse()
            .expect("IMPORT_HISTORY must be a valid usize");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            max_import_bytes,
            import_history,
        }
    }
}
