//! Route key derivation for rate-limit bucket partitioning.

use reqwest::Method;

/// Computes the rate-limit route key for a request.
///
/// The server partitions budgets by resource class, not full path, and only
/// reports which bucket a response counted against after the fact. The key
/// here is the method plus the first two path segments; for top-level
/// resources the second segment is the resource id, so
/// `GET /channels/42/messages` and `GET /channels/42/messages/7` share a
/// bucket while different channels do not.
///
/// This is a heuristic, not a guaranteed-correct partition: unrelated routes
/// sharing a two-segment prefix are conflated. Deployments needing a tighter
/// scheme only have to change this function.
pub(crate) fn route_key(method: &Method, path: &str) -> String {
    let mut segments = path.split('/').filter(|s| !s.is_empty());

    match (segments.next(), segments.next()) {
        (Some(first), Some(second)) => format!("{method}:{first}/{second}"),
        (Some(first), None) => format!("{method}:{first}"),
        (None, _) => format!("{method}:/"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_uses_first_two_segments() {
        assert_eq!(
            route_key(&Method::GET, "/channels/42/messages"),
            "GET:channels/42"
        );
        assert_eq!(
            route_key(&Method::GET, "/channels/42/messages/7"),
            "GET:channels/42"
        );
    }

    #[test]
    fn different_resources_get_different_keys() {
        assert_ne!(
            route_key(&Method::GET, "/channels/42/messages"),
            route_key(&Method::GET, "/channels/43/messages")
        );
    }

    #[test]
    fn method_is_part_of_the_key() {
        assert_ne!(
            route_key(&Method::GET, "/channels/42"),
            route_key(&Method::POST, "/channels/42")
        );
    }

    #[test]
    fn short_paths_are_handled() {
        assert_eq!(route_key(&Method::GET, "/users"), "GET:users");
        assert_eq!(route_key(&Method::GET, "/"), "GET:/");
    }
}
