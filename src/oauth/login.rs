// Login flow for one user slot
// Author: kelexine (https://github.com/kelexine)

use super::callback::{self, CallbackResult};
use super::Slot;
use crate::utils::logging::sanitize;
use anyhow::{anyhow, Context, Result};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use tracing::{debug, info};

/// Backend path that starts the provider authorization for a slot.
const LOGIN_PATH: &str = "/auth/login";

/// Path the backend redirects to once the provider handshake is done.
const CALLBACK_PATH: &str = "/callback";

/// Builds `{base}/auth/login?user={slot}&t={now}`. The timestamp defeats
/// caching so the provider always shows its account chooser.
pub fn login_url(base_url: &str, slot: Slot) -> String {
    format!(
        "{}{}?user={}&t={}",
        base_url.trim_end_matches('/'),
        LOGIN_PATH,
        slot,
        chrono::Utc::now().timestamp_millis()
    )
}

/// Opens the login URL for `slot` in the browser, printing it as a fallback.
pub fn launch(base_url: &str, slot: Slot, open_browser: bool) -> Result<String> {
    let url = login_url(base_url, slot);
    info!("Starting login for user {}", slot);

    println!("\nLog in user {} at:\n{}\n", slot, url);
    if open_browser {
        if let Err(e) = open::that(&url) {
            eprintln!("Warning: Could not open browser automatically: {}", e);
            println!("Please copy the URL above and paste it in your browser.");
        }
    }

    Ok(url)
}

/// Waits on `port` for the backend's redirect to `/callback` and parses it.
///
/// Only useful when the backend's front-end URL points at this machine,
/// e.g. `FRONTEND_URL=http://localhost:3000` with `port = 3000`.
pub async fn receive_callback(port: u16) -> Result<CallbackResult> {
    let listener = TcpListener::bind(("127.0.0.1", port))
        .with_context(|| format!("Failed to bind local callback server on port {}", port))?;
    debug!("Callback server listening on port {}", port);
    println!("Waiting for authentication...");

    tokio::task::spawn_blocking(move || wait_for_callback(&listener))
        .await
        .context("Callback listener task failed")?
}

/// Accepts connections until one hits the callback path.
fn wait_for_callback(listener: &TcpListener) -> Result<CallbackResult> {
    listener.set_nonblocking(false)?;

    for stream in listener.incoming() {
        let mut stream = stream.context("Failed to accept connection")?;

        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        reader.read_line(&mut request_line)?;

        // "GET /callback?access_token=..&state=A HTTP/1.1"
        let target = request_line.split_whitespace().nth(1).unwrap_or("");
        let path = target.split('?').next().unwrap_or("");
        if !request_line.starts_with("GET ") || (path != CALLBACK_PATH && path != "/") {
            let response = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n";
            stream.write_all(response.as_bytes())?;
            continue;
        }

        debug!("Received redirect: {}", sanitize(target));
        let result = callback::parse_url(target);

        let body = match &result {
            CallbackResult::Success { slot, .. } => format!(
                "<h1>User {} connected!</h1><p>You can close this tab and return to the terminal.</p>",
                slot
            ),
            CallbackResult::Failure(failure) => format!(
                "<h1>Authentication Failed</h1><p>{}</p><p>You can close this tab.</p>",
                html_escape(&failure.message())
            ),
        };
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\n\r\n<html><body>{}</body></html>",
            body.len() + "<html><body></body></html>".len(),
            body
        );
        stream.write_all(response.as_bytes())?;

        return Ok(result);
    }

    Err(anyhow!("Callback server stopped unexpectedly"))
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
