use crate::UrlError;
use url::Url;

/// Extracts the pacing origin of an address
///
/// The origin is the scheme, the lowercase host and the port when it is not
/// the scheme's default, serialized as `scheme://host[:port]`. Two addresses
/// share a pacing window exactly when their origins are equal.
///
/// # Arguments
///
/// * `address` - An absolute URL string
///
/// # Returns
///
/// * `Ok(String)` - The serialized origin
/// * `Err(UrlError)` - The address is not an absolute URL with a host
///
/// # Examples
///
/// ```
/// use trawl::url::origin_of;
///
/// assert_eq!(origin_of("https://Example.com/a?b").unwrap(), "https://example.com");
/// assert_eq!(origin_of("http://example.com:8080/").unwrap(), "http://example.com:8080");
/// ```
pub fn origin_of(address: &str) -> Result<String, UrlError> {
    let url = Url::parse(address).map_err(|e| UrlError::Parse(format!("{}: {}", address, e)))?;
    origin_of_url(&url)
}

/// Same as [`origin_of`] for an already parsed URL
pub fn origin_of_url(url: &Url) -> Result<String, UrlError> {
    if url.host_str().is_none() {
        return Err(UrlError::MissingHost(url.to_string()));
    }

    Ok(url.origin().ascii_serialization())
}
