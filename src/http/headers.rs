use rand::Rng;
use rand::seq::IndexedRandom;
use reqwest::header::{ACCEPT, CONNECTION, HeaderMap, HeaderName, HeaderValue, USER_AGENT};

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_5) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Safari/605.1.15",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 13; Pixel 7 Pro) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (Linux; Android 13; SM-G991B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Mobile Safari/537.36",
];

/// Fresh request identity: browser user agent, wildcard accept, keep-alive and a
/// random forwarded-for address.
///
/// Draws from the thread-local generator, so concurrent callers never share
/// random state.
pub fn random_headers() -> HeaderMap {
    let mut rng = rand::rng();
    let mut headers = HeaderMap::with_capacity(4);

    let agent = USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0]);
    headers.insert(USER_AGENT, HeaderValue::from_static(agent));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

    let ip = random_ip(&mut rng);
    if let Ok(value) = HeaderValue::from_str(&ip) {
        headers.insert(X_FORWARDED_FOR, value);
    }

    headers
}

/// Dotted quad with every octet uniform over [0, 255).
pub fn random_ip<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!(
        "{}.{}.{}.{}",
        rng.random_range(0..255u8),
        rng.random_range(0..255u8),
        rng.random_range(0..255u8),
        rng.random_range(0..255u8)
    )
}
