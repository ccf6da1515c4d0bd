use axum::http::HeaderMap;

/// Longest client descriptor we keep in the access log.
pub const USER_AGENT_MAX_LEN: usize = 200;

/// Viewer identity is network-address granularity: first hop of
/// X-Forwarded-For, then X-Real-IP, else "unknown".
pub fn extract_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or("").trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.chars().take(USER_AGENT_MAX_LEN).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_for_first_hop_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(extract_ip(&headers), "203.0.113.7");
    }

    #[test]
    fn test_missing_headers_fall_back_to_unknown() {
        assert_eq!(extract_ip(&HeaderMap::new()), "unknown");
    }

    #[test]
    fn test_user_agent_truncated() {
        let mut headers = HeaderMap::new();
        let long = "a".repeat(500);
        headers.insert("user-agent", HeaderValue::from_str(&long).unwrap());
        assert_eq!(
            extract_user_agent(&headers).unwrap().len(),
            USER_AGENT_MAX_LEN
        );
    }
}
