//! URI resolution and same-origin checks.
//!
//! Origins are compared as tuple origins (scheme, host, port). Opaque origins
//! (`data:`, `file:` and friends) are never same-origin with anything, including
//! themselves, which is the conservative answer for speculative loads.

use url::{Origin, Url};

use crate::error::{SecurityError, SecurityResult};

/// Resolve `href` against `base`, the way a document resolves a relative link.
pub fn resolve_uri(href: &str, base: &Url) -> SecurityResult<Url> {
    base.join(href).map_err(|source| SecurityError::InvalidUri {
        href: href.to_string(),
        source,
    })
}

/// Returns true if both URLs share the same tuple origin.
pub fn is_same_origin(a: &Url, b: &Url) -> bool {
    match (a.origin(), b.origin()) {
        (Origin::Tuple(..), Origin::Tuple(..)) => a.origin() == b.origin(),
        _ => false,
    }
}

/// Check that `target` is same-origin with `source`.
pub fn check_same_origin_uri(source: &Url, target: &Url) -> SecurityResult<()> {
    if is_same_origin(source, target) {
        return Ok(());
    }

    log::trace!("same-origin check failed: {} -> {}", source, target);
    Err(SecurityError::CrossOrigin {
        source_uri: source.to_string(),
        target: target.to_string(),
    })
}
