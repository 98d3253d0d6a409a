use anyhow::Context;
use tracing::info;

use credstore::{
    config::AppConfig,
    credentials::{password, schema::Schema, CredentialsDocument},
    state::AppState,
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    telemetry::init(&config.log)?;

    if std::env::args().nth(1).as_deref() == Some("schema") {
        let schema =
            Schema::credentials_with(config.store.hash_min_bytes, config.store.salt_min_bytes);
        println!("{}", serde_json::to_string_pretty(&schema.to_json_schema())?);
        return Ok(());
    }

    info!(
        database = %config.store.database,
        collection = %config.store.collection,
        order = ?config.store.match_order,
        "credstore starting"
    );
    let state = AppState::from_parts(config, std::sync::Arc::new(credstore::clock::SystemClock));

    let email =
        std::env::var("CREDSTORE_SEED_EMAIL").unwrap_or_else(|_| "demo@example.com".into());
    let plain = std::env::var("CREDSTORE_SEED_PASSWORD")
        .unwrap_or_else(|_| "correct-horse-battery-staple".into());

    let (hash, salt) = password::new_secret(&plain).context("derive seed secret")?;
    let doc = CredentialsDocument::new(email, hash, salt, state.clock.as_ref());
    let id = state
        .credentials
        .insert(&doc)
        .await
        .context("insert seed credentials")?;

    let by_id = state.credentials.find_by_id(id).await.context("find by id")?;
    let by_email = state
        .credentials
        .find_by_email(&by_id.email)
        .await
        .context("find by email")?;
    info!(
        %id,
        consistent = by_id == by_email,
        validated = by_id.validated,
        "seed credentials read back"
    );

    println!("{}", serde_json::to_string_pretty(&by_id)?);
    info!("credstore closing");
    Ok(())
}
