use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use rand::Rng;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::config::DigikeyConfig;

/// Tokens are refreshed this many seconds before they actually expire
const EXPIRY_MARGIN_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_at: i64,
}

impl AuthTokens {
    pub fn is_expired(&self) -> bool {
        self.expires_at - now() < EXPIRY_MARGIN_SECS
    }

    pub fn time_until_expiry(&self) -> String {
        let remaining = self.expires_at - now();

        if remaining <= 0 {
            "expired".to_string()
        } else if remaining < 3600 {
            format!("{} minutes", remaining / 60)
        } else if remaining < 86400 {
            format!("{} hours", remaining / 3600)
        } else {
            format!("{} days", remaining / 86400)
        }
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn load_tokens(config: &DigikeyConfig) -> Result<Option<AuthTokens>> {
    let path = config.tokens_path();
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let tokens = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(tokens))
}

fn save_tokens(config: &DigikeyConfig, tokens: &AuthTokens) -> Result<()> {
    fs::create_dir_all(&config.storage_dir)?;
    let contents = toml::to_string(tokens)?;
    fs::write(config.tokens_path(), contents)?;
    Ok(())
}

fn clear_tokens(config: &DigikeyConfig) -> Result<()> {
    let path = config.tokens_path();
    if path.exists() {
        fs::remove_file(&path)?;
    }
    Ok(())
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

fn request_token(config: &DigikeyConfig, form: &[(&str, &str)]) -> Result<AuthTokens> {
    let url = format!("{}/v1/oauth2/token", config.api_base_url);

    let response = Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?
        .post(&url)
        .form(form)
        .send()
        .context("Failed to send token request")?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().unwrap_or_default();
        anyhow::bail!("Token request failed ({}): {}", status, error_text);
    }

    let token: TokenResponse = response
        .json()
        .context("Failed to parse token response")?;

    Ok(AuthTokens {
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        expires_at: now() + token.expires_in,
    })
}

/// Two-legged client credentials grant; enough for product information
pub fn client_credentials(config: &DigikeyConfig) -> Result<AuthTokens> {
    request_token(
        config,
        &[
            ("grant_type", "client_credentials"),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
        ],
    )
}

pub fn refresh_tokens(config: &DigikeyConfig, refresh_token: &str) -> Result<AuthTokens> {
    let mut tokens = request_token(
        config,
        &[
            ("grant_type", "refresh_token"),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ],
    )?;
    if tokens.refresh_token.is_none() {
        tokens.refresh_token = Some(refresh_token.to_string());
    }
    Ok(tokens)
}

/// Return a usable access token, refreshing or requesting one as needed
pub fn get_valid_token(config: &DigikeyConfig) -> Result<String> {
    if let Some(tokens) = load_tokens(config)? {
        if !tokens.is_expired() {
            return Ok(tokens.access_token);
        }
        if let Some(refresh_token) = tokens.refresh_token.as_deref() {
            match refresh_tokens(config, refresh_token) {
                Ok(fresh) => {
                    save_tokens(config, &fresh)?;
                    return Ok(fresh.access_token);
                }
                Err(e) => log::warn!("Token refresh failed, requesting a new token: {e:#}"),
            }
        }
    }

    let tokens = client_credentials(config).context("Failed to obtain Digi-Key access token")?;
    save_tokens(config, &tokens)?;
    Ok(tokens.access_token)
}

/// Three-legged authorization code flow through the browser
pub fn login(config: &DigikeyConfig) -> Result<()> {
    let state: String = rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();

    let listener = TcpListener::bind(("127.0.0.1", config.redirect_port))
        .with_context(|| format!("Failed to listen on port {}", config.redirect_port))?;
    let redirect_uri = format!("http://localhost:{}/callback", config.redirect_port);

    let auth_url = format!(
        "{}/v1/oauth2/authorize?response_type=code&client_id={}&redirect_uri={}&state={}",
        config.api_base_url,
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&redirect_uri),
        state
    );

    println!("Opening browser...");
    if let Err(e) = open::that(&auth_url) {
        eprintln!("Failed to open browser: {}", e);
        eprintln!("Please manually open: {}", auth_url);
    }

    let (mut stream, _) = listener.accept()?;

    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    let callback = parse_callback(&request_line)?;
    if callback.state != state {
        anyhow::bail!("Authorization callback state mismatch");
    }

    let body = "Authorization complete. You can close this window.";
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(response.as_bytes())?;
    stream.flush()?;

    let tokens = request_token(
        config,
        &[
            ("grant_type", "authorization_code"),
            ("code", callback.code.as_str()),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
        ],
    )?;
    save_tokens(config, &tokens)?;

    println!("✓ Authentication successful!");
    Ok(())
}

pub fn logout(config: &DigikeyConfig) -> Result<()> {
    clear_tokens(config)?;
    println!("✓ Logged out successfully");
    Ok(())
}

pub fn status(config: &DigikeyConfig) -> Result<()> {
    println!("Authentication Status:");
    println!("  API: {}", config.api_base_url);
    match load_tokens(config)? {
        Some(tokens) => {
            println!("  Status: Token cached");
            if tokens.is_expired() {
                println!("  Token: expired");
                if tokens.refresh_token.is_some() {
                    println!("  A refresh token is available and will be used on the next request.");
                }
            } else {
                println!("  Token expires in: {}", tokens.time_until_expiry());
            }
        }
        None => {
            println!("  Status: No cached token");
            println!("\nA token is requested automatically on the next pricing run.");
        }
    }
    Ok(())
}

#[derive(Debug, PartialEq)]
struct Callback {
    code: String,
    state: String,
}

fn parse_callback(request_line: &str) -> Result<Callback> {
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        anyhow::bail!("Invalid HTTP request format");
    }

    let query_string = parts[1].split('?').nth(1).context("No query string")?;

    let mut code = None;
    let mut state = None;
    let mut error = None;

    for param in query_string.split('&') {
        let (key, value) = param.split_once('=').context("Invalid query parameter")?;
        let decoded_value = urlencoding::decode(value)?.into_owned();

        match key {
            "code" => code = Some(decoded_value),
            "state" => state = Some(decoded_value),
            "error" => error = Some(decoded_value),
            _ => {}
        }
    }

    if let Some(error) = error {
        anyhow::bail!("Authorization denied: {}", error);
    }

    Ok(Callback {
        code: code.context("Missing code")?,
        state: state.context("Missing state")?,
    })
}

#[derive(Args, Debug)]
#[command(about = "Manage Digi-Key authentication")]
pub struct AuthArgs {
    #[command(subcommand)]
    command: Option<AuthCommand>,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Authorize through the browser
    Login,
    /// Remove cached tokens
    Logout,
    /// Show cached token status
    Status,
}

pub fn execute(args: AuthArgs, config: &DigikeyConfig) -> Result<()> {
    match args.command {
        Some(AuthCommand::Login) => login(config),
        Some(AuthCommand::Logout) => logout(config),
        Some(AuthCommand::Status) | None => status(config),
    }
}
