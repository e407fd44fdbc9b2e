use crate::error::AppError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

/// Parses `Name: value` header arguments into name/value pairs.
///
/// Each argument is split at its first `:`; surrounding whitespace is trimmed
/// from both halves. An argument without a `:`, or whose name is not a valid
/// HTTP header name, is rejected.
///
/// # Examples
///
/// ```
/// use hlspoll::utils::parse_headers;
///
/// let headers = vec![
///     "Referer: https://example.com/".to_string(),
///     "Cookie:session=abc".to_string(),
/// ];
/// let parsed = parse_headers(&headers).unwrap();
/// assert_eq!(parsed, vec![
///     ("Referer".to_string(), "https://example.com/".to_string()),
///     ("Cookie".to_string(), "session=abc".to_string()),
/// ]);
/// ```
pub fn parse_headers(headers: &[String]) -> Result<Vec<(String, String)>, AppError> {
    headers
        .iter()
        .map(|header| {
            let (name, value) = header
                .split_once(':')
                .ok_or_else(|| AppError::InvalidInput(format!("Invalid header format: {header}")))?;
            let name = name.trim();
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                AppError::InvalidInput(format!("Invalid header name in '{header}': {e}"))
            })?;
            debug!("Parsed header: {name}");
            Ok((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Inserts `pairs` into `base`, replacing any header of the same name.
pub fn merge_headers(
    mut base: HeaderMap,
    pairs: Vec<(String, String)>,
) -> Result<HeaderMap, AppError> {
    for (name, value) in pairs {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AppError::InvalidInput(format!("Invalid header name '{name}': {e}")))?;
        let header_value = HeaderValue::from_str(&value).map_err(|e| {
            AppError::InvalidInput(format!("Invalid value for header '{name}': {e}"))
        })?;
        base.insert(header_name, header_value);
    }
    Ok(base)
}
