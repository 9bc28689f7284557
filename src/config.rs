use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub session: SessionConfig,
    pub upload_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://flasker.db?mode=rwc".into());
        let session = SessionConfig {
            secret: std::env::var("SESSION_SECRET")?,
            issuer: std::env::var("SESSION_ISSUER").unwrap_or_else(|_| "blogsmith".into()),
            audience: std::env::var("SESSION_AUDIENCE")
                .unwrap_or_else(|_| "blogsmith-web".into()),
            ttl_minutes: std::env::var("SESSION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24),
            cookie_secure: std::env::var("COOKIE_SECURE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        };
        let upload_dir = std::env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("static/images"));
        Ok(Self {
            database_url,
            session,
            upload_dir,
        })
    }

    /// Configuration used by tests and local tooling: in-memory database,
    /// fixed secret, uploads under `upload_dir`.
    pub fn for_tests(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            database_url: "sqlite::memory:".into(),
            session: SessionConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                cookie_secure: false,
            },
            upload_dir: upload_dir.into(),
        }
    }
}
