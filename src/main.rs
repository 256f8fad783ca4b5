/// ToolHub - productivity tools backend
///
/// Accounts with durable cookie sessions (plus a legacy bearer-token
/// upgrade bridge), password reset over email, per-account invoicing
/// data and server-side PDF generation for quotes and invoices.

mod account;
mod api;
mod auth;
mod config;
mod context;
mod db;
mod error;
mod mailer;
mod metrics;
mod rate_limit;
mod render;
mod server;
mod session;
mod validation;

use config::ServerConfig;
use context::AppContext;
use error::ApiResult;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ApiResult<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toolhub=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    // Load configuration
    let config = ServerConfig::from_env()?;

    // Create application context
    let ctx = AppContext::new(config).await?;

    // Start server
    server::serve(ctx).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  ______            ____  __      __
 /_  __/___  ____  / / / / /_  __/ /_
  / / / __ \/ __ \/ / /_/ / / / / __ \
 / / / /_/ / /_/ / / __  / /_/ / /_/ /
/_/  \____/\____/_/_/ /_/\__,_/_.___/

        ToolHub backend v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
