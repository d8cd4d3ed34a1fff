/// Loopback HTTP listener for the OAuth redirect
use crate::error::{PlayerError, Result};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

/// How long the user gets to finish the browser flow
pub const AUTHORIZATION_TIMEOUT: Duration = Duration::from_secs(300);

const SUCCESS_PAGE: &str = "<!DOCTYPE html>\r\n\
    <html>\r\n\
    <head><title>Authentication Complete</title></head>\r\n\
    <body style=\"font-family: Arial, sans-serif; text-align: center; padding: 50px;\">\r\n\
    <h1>Authentication Successful</h1>\r\n\
    <p>You can close this window.</p>\r\n\
    </body>\r\n\
    </html>\r\n";

const FAILURE_PAGE: &str = "<!DOCTYPE html>\r\n\
    <html>\r\n\
    <body>\r\n\
    <p>Authentication failed. Please try again.</p>\r\n\
    </body>\r\n\
    </html>\r\n";

/// What a single request to the listener carried
#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Code(String),
    Denied(String),
    Unrelated,
}

/// Bind the redirect URI's address and wait for the authorization code
pub async fn wait_for_code(redirect_uri: &str, expected_state: &str) -> Result<String> {
    let redirect = Url::parse(redirect_uri)
        .map_err(|e| PlayerError::AuthDenied(format!("Invalid redirect URI: {}", e)))?;
    let host = redirect.host_str().unwrap_or("127.0.0.1").to_string();
    let port = redirect.port_or_known_default().unwrap_or(80);

    let listener = TcpListener::bind((host.as_str(), port))
        .await
        .map_err(|e| {
            PlayerError::AuthDenied(format!("Failed to bind OAuth callback on {}:{}: {}", host, port, e))
        })?;
    tracing::info!("OAuth callback server listening on {}:{}", host, port);

    tokio::time::timeout(
        AUTHORIZATION_TIMEOUT,
        accept_until_code(listener, redirect.path().to_string(), expected_state.to_string()),
    )
    .await
    .map_err(|_| PlayerError::AuthDenied("Timed out waiting for authorization".to_string()))?
}

async fn accept_until_code(listener: TcpListener, path: String, expected_state: String) -> Result<String> {
    loop {
        let (socket, _) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!("Error accepting connection: {}", e);
                continue;
            }
        };

        match handle_request(socket, &path, &expected_state).await {
            Callback::Code(code) => {
                tracing::info!("OAuth callback received");
                return Ok(code);
            }
            Callback::Denied(reason) => return Err(PlayerError::AuthDenied(reason)),
            Callback::Unrelated => continue,
        }
    }
}

async fn handle_request(socket: TcpStream, path: &str, expected_state: &str) -> Callback {
    let (reader, mut writer) = socket.into_split();
    let mut reader = BufReader::new(reader);
    let mut request_line = String::new();

    let callback = match reader.read_line(&mut request_line).await {
        Ok(_) => request_line
            .split_whitespace()
            .nth(1)
            .map(|target| parse_callback(target, path, expected_state))
            .unwrap_or(Callback::Unrelated),
        Err(e) => {
            tracing::debug!("Failed to read OAuth callback request: {}", e);
            Callback::Unrelated
        }
    };

    let response = match &callback {
        Callback::Code(_) => http_response("200 OK", SUCCESS_PAGE),
        Callback::Denied(_) => http_response("400 Bad Request", FAILURE_PAGE),
        Callback::Unrelated => http_response("404 Not Found", ""),
    };
    if let Err(e) = writer.write_all(response.as_bytes()).await {
        tracing::debug!("Failed to write OAuth callback response: {}", e);
    } else if let Err(e) = writer.flush().await {
        tracing::debug!("Failed to flush OAuth callback response: {}", e);
    }

    callback
}

fn http_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    )
}

/// Interpret the request target of one callback request
fn parse_callback(target: &str, path: &str, expected_state: &str) -> Callback {
    let Ok(url) = Url::parse(&format!("http://localhost{}", target)) else {
        return Callback::Unrelated;
    };
    if url.path() != path {
        return Callback::Unrelated;
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Callback::Denied(error);
    }
    if state.as_deref() != Some(expected_state) {
        tracing::warn!("OAuth callback state mismatch, rejecting authorization");
        return Callback::Denied("State mismatch in authorization callback".to_string());
    }
    match code {
        Some(code) if !code.is_empty() => Callback::Code(code),
        _ => Callback::Denied("Authentication failed - no code received".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_callback_with_code() {
        assert_eq!(
            parse_callback("/callback?code=AQB123&state=s1", "/callback", "s1"),
            Callback::Code("AQB123".to_string())
        );
    }

    #[test]
    fn test_parse_callback_with_error() {
        assert_eq!(
            parse_callback("/callback?error=access_denied&state=s1", "/callback", "s1"),
            Callback::Denied("access_denied".to_string())
        );
    }

    #[test]
    fn test_parse_callback_rejects_wrong_state() {
        assert!(matches!(
            parse_callback("/callback?code=AQB123&state=other", "/callback", "s1"),
            Callback::Denied(_)
        ));
    }

    #[test]
    fn test_parse_callback_ignores_other_paths() {
        assert_eq!(
            parse_callback("/favicon.ico", "/callback", "s1"),
            Callback::Unrelated
        );
    }

    #[tokio::test]
    async fn test_wait_for_code_over_loopback() {
        let port = {
            let reserved = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            reserved.local_addr().unwrap().port()
        };
        let redirect = format!("http://127.0.0.1:{}/callback", port);

        let waiter = tokio::spawn(async move { wait_for_code(&redirect, "st4te").await });

        let mut stream = loop {
            match TcpStream::connect(("127.0.0.1", port)).await {
                Ok(stream) => break stream,
                Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        };
        stream
            .write_all(b"GET /callback?code=c0de&state=st4te HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();

        assert_eq!(waiter.await.unwrap().unwrap(), "c0de");
    }

    #[tokio::test]
    async fn test_code_survives_client_hanging_up() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream
                .write_all(b"GET /callback?code=c0de&state=st4te HTTP/1.1\r\n\r\n")
                .await
                .unwrap();
            // Gone before the reply is written
        });

        let (socket, _) = listener.accept().await.unwrap();
        client.await.unwrap();
        assert_eq!(
            handle_request(socket, "/callback", "st4te").await,
            Callback::Code("c0de".to_string())
        );
    }
}
