use std::time::Duration;

/// Chat relay configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Shared secret used to verify HS256 bearer tokens.
    pub jwt_secret: String,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// When set, a message whose persistence fails is not broadcast.
    pub strict_persistence: bool,
    /// Capacity of each connection's outbound queue.
    pub outbound_buffer: usize,
    /// How often the gateway pings an idle client.
    pub ping_interval: Duration,
    /// Connections that send nothing for this long are closed.
    pub idle_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_var("DATABASE_URL"),
            jwt_secret: required_var("JWT_SECRET"),
            port: parsed_var("PORT").unwrap_or(8000),
            strict_persistence: std::env::var("STRICT_PERSISTENCE")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(false),
            outbound_buffer: parsed_var("OUTBOUND_BUFFER")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(256),
            ping_interval: Duration::from_secs(
                parsed_var::<u64>("PING_INTERVAL_SECS").unwrap_or(30).max(1),
            ),
            idle_timeout: Duration::from_secs(parsed_var("IDLE_TIMEOUT_SECS").unwrap_or(90)),
        }
    }

    /// Configuration for tests and local tooling: no environment lookups.
    pub fn for_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: String::new(),
            jwt_secret: jwt_secret.into(),
            port: 0,
            strict_persistence: false,
            outbound_buffer: 256,
            ping_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(90),
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Point a database URL at its `_test` sibling database.
///
/// `postgres://host/chat_relay?sslmode=disable` becomes
/// `postgres://host/chat_relay_test?sslmode=disable`. URLs already naming a
/// `_test` database are returned unchanged.
pub fn test_database_url(database_url: &str) -> String {
    let (base, query) = match database_url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (database_url, None),
    };

    let Some((prefix, db_name)) = base.rsplit_once('/') else {
        return database_url.to_string();
    };
    if db_name.is_empty() || db_name.ends_with("_test") {
        return database_url.to_string();
    }

    let mut updated = format!("{prefix}/{db_name}_test");
    if let Some(query) = query {
        updated.push('?');
        updated.push_str(query);
    }
    updated
}
