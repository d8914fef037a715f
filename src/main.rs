//! MCP Client Auth - verify OAuth2 client registrations and fetch tokens

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use mcp_client_auth::{
    RequestAuthenticator,
    cli::{Cli, Command},
    config::Config,
    oauth::AuthorizedClientStore,
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup tracing
    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let authenticator =
        match RequestAuthenticator::from_config(&config, Arc::new(AuthorizedClientStore::new()))
            .await
        {
            Ok(authenticator) => authenticator,
            Err(e) => {
                error!("Failed to initialize authenticator: {e}");
                return ExitCode::FAILURE;
            }
        };

    match cli.command {
        Some(Command::Token { show }) => run_token(&authenticator, show).await,
        Some(Command::Check) | None => run_check(&authenticator),
    }
}

/// Report the verified registrations
fn run_check(authenticator: &RequestAuthenticator) -> ExitCode {
    let ids = authenticator.registration_ids();
    info!(
        authorization_code = %ids.authorization_code,
        client_credentials = %ids.client_credentials,
        "Client registrations verified"
    );
    println!("✅ authorization_code:  {}", ids.authorization_code);
    println!("✅ client_credentials:  {}", ids.client_credentials);
    ExitCode::SUCCESS
}

/// Fetch a client-credentials token
async fn run_token(authenticator: &RequestAuthenticator, show: bool) -> ExitCode {
    match authenticator.client_credentials_access_token().await {
        Ok(token) => {
            println!("Token type: {}", token.token_type);
            match token.time_until_expiry() {
                Some(remaining) => println!("Expires in: {}s", remaining.as_secs()),
                None => println!("Expires in: unknown"),
            }
            if let Some(scope) = &token.scope {
                println!("Scope: {scope}");
            }
            if show {
                println!("{}", token.token_value);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Token request failed: {e}");
            ExitCode::FAILURE
        }
    }
}
