use std::env;

/// Runtime configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Maximum upload size in bytes (default: 64 MB)
    pub max_file_size: usize,

    /// Directory for stored document blobs (default: "./storage")
    pub storage_path: String,

    /// JWT secret key (required in production)
    pub jwt_secret: String,

    /// Allowed CORS origins (comma separated)
    pub allowed_origins: Vec<String>,

    /// How many entries each link's access log retains (default: 100)
    pub access_log_cap: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_file_size: 64 * 1024 * 1024,
            storage_path: "./storage".to_string(),
            jwt_secret: "secret".to_string(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            access_log_cap: 100,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            storage_path: env::var("STORAGE_PATH").unwrap_or(default.storage_path),

            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "secret".to_string()), // Fallback for dev convenience, strictly enforced in production method

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),

            access_log_cap: env::var("ACCESS_LOG_CAP")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.access_log_cap),
        }
    }

    /// Create config for production (strict security)
    pub fn production() -> Self {
        Self {
            jwt_secret: env::var("JWT_SECRET").expect("CRITICAL: JWT_SECRET must be set"),
            ..Self::from_env()
        }
    }
}
