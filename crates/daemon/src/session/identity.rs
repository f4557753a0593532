//! Normalization of the platform's self-identity string.
//!
//! Once a link is open, the platform reports who it paired as, in a raw
//! addressing form like `5511987654321:3@s.iris.net`: subscriber number
//! with country prefix, an optional device-instance suffix after a colon,
//! and the platform domain. Callers want the bare subscriber number.

/// Derive a normalized subscriber identifier from the raw self-identity.
///
/// Takes the segment before the domain separator, discards any trailing
/// device-instance suffix, and strips the country prefix when present.
/// Passing an empty `country_prefix` disables the stripping step.
///
/// Returns `None` when the raw string yields nothing usable. That is not
/// an error condition; the session stays open without a cached identity.
pub fn extract_identity(raw: &str, country_prefix: &str) -> Option<String> {
    let local = raw.split('@').next().unwrap_or_default();
    let subscriber = local.split(':').next().unwrap_or_default();

    if subscriber.is_empty() {
        return None;
    }

    if !country_prefix.is_empty() && subscriber.len() > country_prefix.len() {
        if let Some(stripped) = subscriber.strip_prefix(country_prefix) {
            return Some(stripped.to_string());
        }
    }

    Some(subscriber.to_string())
}
