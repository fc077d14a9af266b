//! Application-wide constants

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

// Header names are lowercase so they can be used with `HeaderName::from_static`.

/// Header carrying an explicit tenant identity (machine-to-machine callers).
pub const TENANT_HEADER: &str = "x-tenant-id";

pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// Path prefixes served without a resolved tenant and without rate limiting.
pub const EXEMPT_PATH_PREFIXES: &[&str] = &["/api/auth", "/health"];

/// Actor recorded when no authenticated user is attached to the request.
pub const SYSTEM_ACTOR: &str = "System";

pub const RATE_WINDOW_SECONDS: i64 = 60;

/// True when `path` is `prefix` itself or lies below it as a path segment.
pub fn is_exempt_path(path: &str) -> bool {
    EXEMPT_PATH_PREFIXES.iter().any(|prefix| {
        path == *prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}
