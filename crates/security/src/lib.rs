//! Citadel Security Crate
//!
//! This crate holds the security primitives loads are checked against: origins and
//! same-origin comparison, principals, referrer policy, cookie jar settings and
//! content policy classification.

pub mod cookies;
pub mod error;
pub mod origin;
pub mod policy;
pub mod principal;
pub mod referrer;

pub use cookies::{CookieBehavior, CookieJarSettings};
pub use error::{SecurityError, SecurityResult};
pub use origin::{check_same_origin_uri, is_same_origin, resolve_uri};
pub use policy::{ContentPolicyType, SecurityFlags};
pub use principal::{OriginAttributes, Principal};
pub use referrer::{ReferrerInfo, ReferrerPolicy};
