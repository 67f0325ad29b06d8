//! Verifies an ID token against the provider's live JWKS and prints the identity.
//!
//! ```text
//! RUST_LOG=trimble_oidc=debug cargo run --example verify_id_token -- <id_token>
//! ```
//!
//! `TRIMBLE_ISSUER` and `TRIMBLE_JWKS_URI` override the production endpoints.

use std::env;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use trimble_oidc::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let token = env::args().nth(1).or_else(|| env::var("TRIMBLE_ID_TOKEN").ok());

    let mut builder = ConfigBuilder::new().leeway(Duration::from_secs(60));
    if let Ok(issuer) = env::var("TRIMBLE_ISSUER") {
        builder = builder.issuer(&issuer)?;
    }
    if let Ok(jwks_uri) = env::var("TRIMBLE_JWKS_URI") {
        builder = builder.jwks_uri(&jwks_uri)?;
    }
    let strategy = Strategy::new(builder.build()?)?;

    let tokens = TokenResponse {
        access_token: String::new(),
        token_type: None,
        expires_in: None,
        refresh_token: None,
        id_token: token,
    };

    match strategy.authenticate(&tokens).await {
        Ok(identity) => {
            println!("{}", serde_json::to_string_pretty(&identity)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("ID token rejected: {e}");
            std::process::exit(1);
        }
    }
}
