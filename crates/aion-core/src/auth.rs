//! Google OAuth2 login (C14): opens the user's browser against Google's
//! consent screen and captures the redirect on a one-shot local listener,
//! mirroring the source's `http.server`-based callback handler.

use std::time::Duration as StdDuration;

use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;

use crate::config::{AppConfig, Backend, TokenRecord, TokenStore};
use crate::error::{AionError, Result};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const REDIRECT_PORT: u16 = 8765;
const CALLBACK_TIMEOUT: StdDuration = StdDuration::from_secs(120);

fn redirect_uri() -> String {
    format!("http://localhost:{REDIRECT_PORT}/callback")
}

fn oauth_client(client_id: &str, client_secret: &str) -> Result<BasicClient> {
    let auth_url = AuthUrl::new(GOOGLE_AUTH_URL.to_string()).map_err(|e| AionError::Config(e.to_string()))?;
    let token_url = TokenUrl::new(GOOGLE_TOKEN_URL.to_string()).map_err(|e| AionError::Config(e.to_string()))?;
    let redirect = RedirectUrl::new(redirect_uri()).map_err(|e| AionError::Config(e.to_string()))?;
    Ok(BasicClient::new(
        ClientId::new(client_id.to_string()),
        Some(ClientSecret::new(client_secret.to_string())),
        auth_url,
        Some(token_url),
    )
    .set_redirect_uri(redirect))
}

/// Read one HTTP request off `stream`, reply with a short human-facing
/// page, and return the `code`/`state` query params if present.
async fn read_one_callback(stream: &mut tokio::net::TcpStream) -> Option<(String, String)> {
    let mut buf = [0u8; 4096];
    let n = stream.read(&mut buf).await.ok()?;
    let request = String::from_utf8_lossy(&buf[..n]);
    let request_line = request.lines().next()?;
    let path = request_line.split_whitespace().nth(1)?;
    let query = path.split_once('?').map(|(_, q)| q).unwrap_or("");

    let mut code = None;
    let mut state = None;
    for pair in query.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            let decoded = urlencoding_decode(value);
            match key {
                "code" => code = Some(decoded),
                "state" => state = Some(decoded),
                _ => {}
            }
        }
    }

    let (status, body) = if code.is_some() {
        ("200 OK", "<html><body style='font-family:sans-serif;text-align:center;padding:60px'><h2>Logged in!</h2><p>You can close this tab and return to the terminal.</p></body></html>")
    } else {
        ("400 Bad Request", "<html><body><h2>Login failed — no authorization code received.</h2></body></html>")
    };
    let response = format!("HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}", body.len());
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;

    Some((code?, state.unwrap_or_default()))
}

fn urlencoding_decode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '+' => out.push(' '),
            '%' => {
                let hi = chars.next();
                let lo = chars.next();
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    if let Ok(byte) = u8::from_str_radix(&format!("{hi}{lo}"), 16) {
                        out.push(byte as char);
                        continue;
                    }
                }
                out.push('%');
            }
            other => out.push(other),
        }
    }
    out
}

/// Wait for the Google redirect on `localhost:8765/callback`, returning
/// the authorization code once received.
async fn await_callback(expected_state: &CsrfToken) -> Result<String> {
    let listener = TcpListener::bind(("127.0.0.1", REDIRECT_PORT))
        .await
        .map_err(|e| AionError::Config(format!("binding oauth callback listener: {e}")))?;

    let accept = async {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                continue;
            };
            if let Some((code, state)) = read_one_callback(&mut stream).await {
                if state == *expected_state.secret() {
                    return code;
                }
            }
        }
    };

    timeout(CALLBACK_TIMEOUT, accept)
        .await
        .map_err(|_| AionError::Config("OAuth login timed out — no callback received within 2 minutes".to_string()))
}

/// Run the full authorization-code login flow against Google Calendar.
/// Persists the resulting tokens and, best-effort, the user's calendar
/// timezone into the saved config.
pub async fn login(config: &AppConfig) -> Result<()> {
    if config.backend == Backend::Sqlite {
        return Err(AionError::Config(
            "login is only meaningful with backend = \"google\"; switch backends first".to_string(),
        ));
    }
    let client_id = config.google_client_id.clone().ok_or_else(|| {
        AionError::Config(
            "Google OAuth credentials not configured. Set AION_GOOGLE_CLIENT_ID and \
             AION_GOOGLE_CLIENT_SECRET, or add them to config.toml"
                .to_string(),
        )
    })?;
    let client_secret = config.google_client_secret.clone().ok_or_else(|| {
        AionError::Config("AION_GOOGLE_CLIENT_SECRET is required alongside AION_GOOGLE_CLIENT_ID".to_string())
    })?;

    let client = oauth_client(&client_id, &client_secret)?;
    let (auth_url, csrf_token) = client
        .authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new("https://www.googleapis.com/auth/calendar.events".to_string()))
        .add_scope(Scope::new("https://www.googleapis.com/auth/calendar.readonly".to_string()))
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .url();

    tracing::info!(%auth_url, "opening browser for Google OAuth consent");
    if open::that(auth_url.as_str()).is_err() {
        tracing::warn!("could not open a browser automatically; open this URL manually: {auth_url}");
    }

    let code = await_callback(&csrf_token).await?;

    let token = client
        .exchange_code(AuthorizationCode::new(code))
        .request_async(async_http_client)
        .await
        .map_err(|e| AionError::Network(format!("exchanging oauth code: {e}")))?;

    let record = TokenRecord {
        access_token: token.access_token().secret().clone(),
        refresh_token: token.refresh_token().map(|t| t.secret().clone()),
        expires_in: token.expires_in().map(|d| d.as_secs() as i64).unwrap_or(3600),
        token_type: "Bearer".to_string(),
    };
    TokenStore::save(&record)?;

    detect_timezone(&record.access_token, config).await;
    Ok(())
}

/// Best-effort timezone auto-detection: failures here never fail login.
async fn detect_timezone(access_token: &str, config: &AppConfig) {
    let client = reqwest::Client::new();
    let Ok(resp) = client
        .get("https://www.googleapis.com/calendar/v3/calendars/primary")
        .bearer_auth(access_token)
        .send()
        .await
    else {
        return;
    };
    if !resp.status().is_success() {
        return;
    }
    let Ok(body) = resp.json::<serde_json::Value>().await else {
        return;
    };
    if let Some(tz) = body.get("timeZone").and_then(serde_json::Value::as_str) {
        let mut updated = config.clone();
        updated.timezone = tz.to_string();
        if let Err(e) = updated.save() {
            tracing::warn!(error = %e, "failed to persist auto-detected timezone");
        } else {
            crate::config::reload_config();
        }
    }
}

/// Discard any stored tokens. Idempotent.
pub fn logout() -> Result<()> {
    TokenStore::clear()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urlencoding_decode_handles_percent_and_plus() {
        assert_eq!(urlencoding_decode("hello+world"), "hello world");
        assert_eq!(urlencoding_decode("a%2Fb%3Dc"), "a/b=c");
    }

    #[test]
    fn urlencoding_decode_passes_through_plain_text() {
        assert_eq!(urlencoding_decode("4/0Adeu5BU"), "4/0Adeu5BU");
    }
}
