//! Standalone migration runner for chat-relay.
//!
//! Usage:
//!   cargo run -p chat-relay --bin relay-migrate
//!   cargo run -p chat-relay --bin relay-migrate -- --test
//!   cargo run -p chat-relay --bin relay-migrate -- --revert
//!
//! Reads DATABASE_URL from the environment (or .env via dotenvy).

use std::path::Path;

use diesel::pg::PgConnection;
use diesel::Connection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use chat_relay::config::test_database_url;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

enum Action {
    Apply,
    RevertLast,
}

fn main() {
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let action = if args.iter().any(|a| a == "--revert") {
        Action::RevertLast
    } else {
        Action::Apply
    };

    let mut database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL env var is required");
    if args.iter().any(|a| a == "--test") {
        database_url = test_database_url(&database_url);
    }

    println!("Connecting to database...");
    let mut conn =
        PgConnection::establish(&database_url).expect("failed to connect to database");

    match action {
        Action::Apply => {
            let applied = conn
                .run_pending_migrations(MIGRATIONS)
                .expect("failed to run migrations");
            if applied.is_empty() {
                println!("Schema is up to date.");
            }
            for migration in &applied {
                println!("  Applied: {migration}");
            }
        }
        Action::RevertLast => {
            let reverted = conn
                .revert_last_migration(MIGRATIONS)
                .expect("failed to revert migration");
            println!("  Reverted: {reverted}");
        }
    }
}
