// src/config.rs

use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,

    /// Optional admin account seeded at startup.
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,

    /// Minimum score percentage for a passed attempt (default 70).
    pub pass_threshold: i32,
    /// Minimum score percentage for a completed topic (default 70).
    pub completion_threshold: i32,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let admin_username = env::var("ADMIN_USERNAME").ok();
        let admin_password = env::var("ADMIN_PASSWORD").ok();

        let pass_threshold = env::var("PASS_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(70);

        let completion_threshold = env::var("COMPLETION_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(70);

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            admin_username,
            admin_password,
            pass_threshold,
            completion_threshold,
        }
    }
}
