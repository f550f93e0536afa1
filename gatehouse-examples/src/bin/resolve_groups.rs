use gatehouse::{
    IdentityRegistry, OAuthToken, ProviderConfig, ProviderKind, ProviderSettings, SessionState,
};

fn env_or_empty(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let kind: ProviderKind = std::env::var("GATEHOUSE_PROVIDER")
        .unwrap_or_else(|_| "gitlab".to_string())
        .parse()?;
    let mut config = ProviderConfig::new(
        std::env::var("GATEHOUSE_CLIENT_ID")?,
        std::env::var("GATEHOUSE_CLIENT_SECRET")?,
    )
    .with_provider_url(env_or_empty("GATEHOUSE_PROVIDER_URL"));
    if let Ok(redirect) = std::env::var("GATEHOUSE_REDIRECT_URL") {
        config = config.with_redirect_url(url::Url::parse(&redirect)?);
    }
    let scopes = env_or_empty("GATEHOUSE_SCOPES");
    if !scopes.is_empty() {
        config = config.with_scopes(scopes.split_whitespace());
    }

    println!("Discovering {kind} provider...");
    let registry = IdentityRegistry::from_settings([ProviderSettings::new(kind, config)]).await?;
    let provider = registry
        .get(kind.as_str())
        .ok_or("provider missing from registry")?;
    println!(
        "Login URL: {}",
        provider.core().oauth().authorization_url("demo-state")
    );

    let Ok(access_token) = std::env::var("GATEHOUSE_ACCESS_TOKEN") else {
        println!("Set GATEHOUSE_ACCESS_TOKEN to resolve groups.");
        return Ok(());
    };

    let mut session =
        SessionState::new(kind.as_str(), "demo").with_token(OAuthToken::bearer(access_token));
    registry.refresh_groups(&mut session).await?;
    println!("Groups: {:?}", session.groups);

    if std::env::var("GATEHOUSE_REVOKE").is_ok() {
        if let Some(token) = &session.access_token {
            registry.revoke(kind.as_str(), token).await?;
            println!("Token revoked.");
        }
    }

    Ok(())
}
