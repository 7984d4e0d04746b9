use axum::extract::{ConnectInfo, Request};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use headers::{Cookie, HeaderMapExt};
use std::net::SocketAddr;
use tower_governor::GovernorError;
use tower_governor::key_extractor::KeyExtractor;

use crate::core::rate_limiter::SessionId;
use crate::utils::constants::SESSION_COOKIE_NAME;

pub fn session_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .typed_get::<Cookie>()
        .and_then(|cookie| cookie.get(SESSION_COOKIE_NAME).and_then(SessionId::parse))
}

fn session_cookie(session: SessionId) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE_NAME, session
    ))
    .ok()
}

/// Attaches a [`SessionId`] to every request, issuing a fresh cookie to
/// clients that arrive without a valid one.
pub async fn session_middleware(mut req: Request, next: Next) -> Response {
    let (session, issued) = match session_from_headers(req.headers()) {
        Some(session) => (session, false),
        None => (SessionId::generate(), true),
    };

    req.extensions_mut().insert(session);
    let mut response = next.run(req).await;

    if issued {
        if let Some(cookie) = session_cookie(session) {
            response.headers_mut().append(SET_COOKIE, cookie);
        }
    }
    response
}

/// Flood-guard key: the peer IP. The session cookie is client-chosen, so it
/// only ever scopes the analysis quota, never the flood guard.
#[derive(Clone)]
pub struct PeerIpKeyExtractor;

impl KeyExtractor for PeerIpKeyExtractor {
    type Key = String;

    fn extract<T>(&self, req: &axum::http::Request<T>) -> Result<Self::Key, GovernorError> {
        match req.extensions().get::<ConnectInfo<SocketAddr>>() {
            Some(ip) => Ok(ip.0.ip().to_string()),
            None => Err(GovernorError::UnableToExtractKey),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header::COOKIE;

    #[test]
    fn test_session_from_headers() {
        let id = SessionId::generate();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {}={}", SESSION_COOKIE_NAME, id)).unwrap(),
        );
        assert_eq!(session_from_headers(&headers), Some(id));

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{}=garbage", SESSION_COOKIE_NAME)).unwrap(),
        );
        assert_eq!(session_from_headers(&headers), None);
        assert_eq!(session_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn test_key_extractor_ignores_session_cookie() {
        let addr: SocketAddr = "10.1.2.3:4567".parse().unwrap();
        let mut req = axum::http::Request::builder()
            .header(COOKIE, format!("{}={}", SESSION_COOKIE_NAME, SessionId::generate()))
            .body(Body::empty())
            .unwrap();
        assert!(PeerIpKeyExtractor.extract(&req).is_err());

        req.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(PeerIpKeyExtractor.extract(&req).unwrap(), "10.1.2.3");
    }
}
