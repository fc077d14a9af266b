//! Utility functions

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

static SUBDOMAIN_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?$").expect("valid regex"));

/// Parse an identity string from an untrusted source.
///
/// Anything that is not a non-nil UUID is treated as absent.
pub fn parse_identity(s: &str) -> Option<Uuid> {
    Uuid::parse_str(s.trim()).ok().filter(|id| !id.is_nil())
}

/// `tenant1.stockhub.io` -> `tenant1`. Hosts with two labels or fewer carry
/// no subdomain. A trailing `:port` is ignored.
pub fn extract_subdomain(host: &str) -> Option<String> {
    let host = host.trim();
    let host = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    };
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() > 2 && !labels[0].is_empty() {
        Some(labels[0].to_lowercase())
    } else {
        None
    }
}

/// DNS label rules: lowercase alphanumerics and inner hyphens, 1-63 chars.
pub fn is_valid_subdomain(s: &str) -> bool {
    SUBDOMAIN_LABEL.is_match(s)
}

pub fn mask_email(email: &str) -> String {
    if let Some(at_pos) = email.find('@') {
        let (local, domain) = email.split_at(at_pos);
        if local.len() <= 2 {
            format!("{}***{}", local.get(..1).unwrap_or(""), domain)
        } else {
            format!("{}***{}", local.get(..2).unwrap_or(local), domain)
        }
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_subdomain() {
        assert_eq!(extract_subdomain("acme.stockhub.io"), Some("acme".to_string()));
        assert_eq!(extract_subdomain("ACME.stockhub.io:8443"), Some("acme".to_string()));
        assert_eq!(extract_subdomain("stockhub.io"), None);
        assert_eq!(extract_subdomain("localhost:8080"), None);
        assert_eq!(extract_subdomain(".stockhub.io"), None);
    }

    #[test]
    fn test_parse_identity_rejects_malformed() {
        assert!(parse_identity("not-a-uuid").is_none());
        assert!(parse_identity("00000000-0000-0000-0000-000000000000").is_none());
        let id = Uuid::new_v4();
        assert_eq!(parse_identity(&format!(" {} ", id)), Some(id));
    }

    #[test]
    fn test_subdomain_validation() {
        assert!(is_valid_subdomain("acme"));
        assert!(is_valid_subdomain("acme-2"));
        assert!(!is_valid_subdomain("-acme"));
        assert!(!is_valid_subdomain("Acme"));
        assert!(!is_valid_subdomain("acme.corp"));
    }

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("owner@acme.io"), "ow***@acme.io");
        assert_eq!(mask_email("a@acme.io"), "a***@acme.io");
        assert_eq!(mask_email("invalid"), "***");
    }
}
