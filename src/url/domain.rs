use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// The rate limiter keys its per-domain state on this value.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use hunt::url::extract_domain;
///
/// let url = Url::parse("http://EXAMPLE.onion/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.onion".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Parses a URL string and extracts its domain in one step
pub fn domain_of(url: &str) -> Option<String> {
    Url::parse(url).ok().as_ref().and_then(extract_domain)
}

/// Returns true if the host is a Tor onion service
pub fn is_onion(url: &Url) -> bool {
    url.host_str()
        .map(|h| h.to_ascii_lowercase().ends_with(".onion"))
        .unwrap_or(false)
}
