//! Shared constants used across the application.

/// User agent string sent to the comic platform's GraphQL endpoint.
///
/// The platform rejects requests that do not look like browser traffic.
pub const CRAWLER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36";

/// Accept-Language header sent alongside GraphQL requests.
pub const CRAWLER_ACCEPT_LANGUAGE: &str = "ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7";
