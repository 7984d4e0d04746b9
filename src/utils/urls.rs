use url::{ParseError, Url};

pub fn to_url(host: &str) -> Result<Url, ParseError> {
    Url::parse(host)
}

/// Builds the `generateContent` endpoint for `model` under `base`.
pub fn generate_content_url(base: &Url, model: &str) -> Result<Url, ParseError> {
    let base = base.as_str().trim_end_matches('/');
    Url::parse(&format!(
        "{}/v1beta/models/{}:generateContent",
        base, model
    ))
}
