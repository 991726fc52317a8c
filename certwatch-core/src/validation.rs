//! Domain name normalization.

use url::Host;

use crate::error::{CertwatchError, Result};

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Normalize and validate a domain name
///
/// This function:
/// - Trims whitespace and converts to lowercase
/// - Removes any `scheme://` prefix
/// - Removes trailing slashes and paths
/// - Removes a `:port` suffix and the root dot of a fully qualified name
/// - Maps Unicode names to their ASCII (`xn--`) form
/// - Validates labels (alphanumeric, hyphens and underscores)
///
/// Single-label hosts such as `intranet` are accepted. Unlike a lookup tool,
/// `www.` is kept: `www.example.com` and `example.com` may serve different
/// certificates.
pub fn normalize_domain(domain: &str) -> Result<String> {
    let domain = domain.trim().to_lowercase();

    // Remove protocol
    let domain = match domain.find("://") {
        Some(idx) => &domain[idx + 3..],
        None => domain.as_str(),
    };

    // Remove trailing slash, path, query and fragment
    let domain = domain
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(domain);

    // Remove port
    let domain = match domain.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => domain,
    };

    let domain = domain.strip_suffix('.').unwrap_or(domain);
    if domain.is_empty() {
        return Err(CertwatchError::InvalidDomain(domain.to_string()));
    }

    let invalid = || CertwatchError::InvalidDomain(domain.to_string());

    let host = match Host::parse(domain).map_err(|_| invalid())? {
        Host::Domain(name) => name,
        Host::Ipv4(addr) => return Ok(addr.to_string()),
        Host::Ipv6(_) => return Err(invalid()),
    };

    if host.len() > MAX_DOMAIN_LEN {
        return Err(invalid());
    }

    for label in host.split('.') {
        let well_formed = !label.is_empty()
            && label.len() <= MAX_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !well_formed {
            return Err(invalid());
        }
    }

    Ok(host)
}

/// Case-insensitive comparison of two registry keys.
pub fn same_domain(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("example.com").unwrap(), "example.com");
        assert_eq!(normalize_domain("EXAMPLE.COM").unwrap(), "example.com");
        assert_eq!(
            normalize_domain("https://example.com/path").unwrap(),
            "example.com"
        );
        assert_eq!(
            normalize_domain("http://example.com/").unwrap(),
            "example.com"
        );
        assert_eq!(
            normalize_domain("  WWW.EXAMPLE.COM  ").unwrap(),
            "www.example.com"
        );
        assert_eq!(
            normalize_domain("https://shop.example:8443/cart?id=1").unwrap(),
            "shop.example"
        );
        assert_eq!(normalize_domain("ftp://files.example").unwrap(), "files.example");

        // Invalid domains
        assert!(normalize_domain("").is_err());
        assert!(normalize_domain("   ").is_err());
        assert!(normalize_domain(".").is_err());
        assert!(normalize_domain("example..com").is_err());
        assert!(normalize_domain(".example.com").is_err());
        assert!(normalize_domain("example.com..").is_err());
        assert!(normalize_domain("-example.com").is_err());
        assert!(normalize_domain("example-.com").is_err());
        assert!(normalize_domain("exa mple.com").is_err());
        assert!(normalize_domain("bad domain!").is_err());
    }

    #[test]
    fn test_normalize_accepts_real_hostnames() {
        assert_eq!(normalize_domain("intranet").unwrap(), "intranet");
        assert_eq!(normalize_domain("localhost:8443").unwrap(), "localhost");
        assert_eq!(normalize_domain("example.com.").unwrap(), "example.com");
        assert_eq!(
            normalize_domain("https://Example.COM./login").unwrap(),
            "example.com"
        );
        assert_eq!(
            normalize_domain("_dmarc.example.com").unwrap(),
            "_dmarc.example.com"
        );
        assert_eq!(normalize_domain("127.0.0.1").unwrap(), "127.0.0.1");
    }

    #[test]
    fn test_normalize_maps_unicode_to_ascii() {
        assert_eq!(
            normalize_domain("bücher.example").unwrap(),
            "xn--bcher-kva.example"
        );
        assert_eq!(
            normalize_domain("BÜCHER.example").unwrap(),
            "xn--bcher-kva.example"
        );
        assert!(normalize_domain(&format!("{}.example", "a".repeat(64))).is_err());
    }

    #[test]
    fn test_same_domain_ignores_case() {
        assert!(same_domain("Example.COM", "example.com"));
        assert!(!same_domain("example.com", "example.org"));
    }
}
