use crate::auth::{User, TOKEN_COOKIE};
use crate::core::errors::{Error, Result};
use crate::server::AppState;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use tracing::warn;

/// Accepts a request when the `X-Authentication`/`X-Username` header pair or
/// the token cookie validates against a stored account; rejects with 401
/// otherwise.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let headers = request.headers();
    let host = host_of(headers);

    if let (Some(token), Some(username)) = (
        header_value(headers, "X-Authentication"),
        header_value(headers, "X-Username"),
    ) {
        if let Some(user) = User::get_by_username(&state.db, &username).await? {
            if user.verify_token(&host, &token) {
                return Ok(next.run(request).await);
            }
        }
        return Err(Error::unauthorized("missing or invalid authentication token"));
    }

    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(TOKEN_COOKIE) {
        for user in User::list(&state.db).await? {
            if user.verify_token(&host, cookie.value()) {
                return Ok(next.run(request).await);
            }
        }
    }

    Err(Error::unauthorized("missing or invalid authentication token"))
}

/// Rejects clients whose peer address is not in `authorized_hosts`. An empty
/// list allows everyone.
pub async fn authorized_hosts(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let hosts = state.settings.current().authorized_hosts;
    if hosts.is_empty() {
        return Ok(next.run(request).await);
    }

    let peer_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());

    match peer_ip {
        Some(ip) if host_allowed(&hosts, ip) => Ok(next.run(request).await),
        other => {
            warn!("rejected request from unauthorized peer {other:?}");
            Err(Error::Forbidden(
                "your address is not in the authorized hosts list".to_string(),
            ))
        }
    }
}

/// Attaches permissive CORS headers when enabled in the configuration.
pub async fn cors_headers(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let enabled = state.settings.current().cors_enabled;
    let mut response = next.run(request).await;

    if enabled {
        let headers = response.headers_mut();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, Authorization, Accept"),
        );
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static("3600"),
        );
    }

    response
}

pub fn host_of(headers: &HeaderMap) -> String {
    headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn host_allowed(hosts: &[String], ip: IpAddr) -> bool {
    hosts.iter().any(|host| {
        if host == &ip.to_string() {
            return true;
        }
        IpAddr::from_str(host)
            .map(|allowed| allowed == ip)
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_ip_matches() {
        let hosts = vec!["127.0.0.1".to_string()];
        assert!(host_allowed(&hosts, IpAddr::from_str("127.0.0.1").unwrap()));
    }

    #[test]
    fn hostname_entries_do_not_match_ips() {
        let hosts = vec!["localhost".to_string()];
        assert!(!host_allowed(&hosts, IpAddr::from_str("127.0.0.1").unwrap()));
    }

    #[test]
    fn other_ips_are_rejected() {
        let hosts = vec!["127.0.0.1".to_string()];
        assert!(!host_allowed(&hosts, IpAddr::from_str("10.0.0.9").unwrap()));
    }
}
