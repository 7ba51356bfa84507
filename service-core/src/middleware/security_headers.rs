use axum::{extract::Request, http::header, middleware::Next, response::IntoResponse};

/// Hardening headers for every response. Responses that set cookies are
/// additionally marked uncacheable so shared caches never replay a session.
pub async fn security_headers_middleware(req: Request, next: Next) -> impl IntoResponse {
    let mut response = next.run(req).await;
    let sets_cookie = response.headers().contains_key(header::SET_COOKIE);
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        header::HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        header::HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        header::X_FRAME_OPTIONS,
        header::HeaderValue::from_static("DENY"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        header::HeaderValue::from_static("same-origin"),
    );

    if sets_cookie {
        headers.insert(
            header::CACHE_CONTROL,
            header::HeaderValue::from_static(r#"no-cache="Set-Cookie""#),
        );
    }

    response
}
