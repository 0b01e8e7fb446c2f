use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Attaches an `x-request-id` to every request and echoes it on the response,
/// keeping an incoming id when the caller already set one.
pub async fn inject_request_id(mut request: Request, next: Next) -> Response {
    let header_name = HeaderName::from_static(REQUEST_ID_HEADER);
    let request_id = request
        .headers()
        .get(&header_name)
        .cloned()
        .unwrap_or_else(new_request_id);

    request
        .headers_mut()
        .insert(header_name.clone(), request_id.clone());

    let mut response = next.run(request).await;
    if !response.headers().contains_key(&header_name) {
        response.headers_mut().insert(header_name, request_id);
    }
    response
}

fn new_request_id() -> HeaderValue {
    HeaderValue::from_str(&uuid::Uuid::new_v4().to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}

#[cfg(test)]
mod tests {
    use super::new_request_id;

    #[test]
    fn generated_ids_are_valid_header_values() {
        let value = new_request_id();
        let text = value.to_str().expect("ascii header value");
        assert_eq!(text.len(), 36);
        assert!(uuid::Uuid::parse_str(text).is_ok());
    }
}
