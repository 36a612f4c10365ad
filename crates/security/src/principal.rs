//! Security principals.
//!
//! A principal is the security identity a load is performed on behalf of. Two loads
//! triggered by different principals must never share a preload, so `Principal` is
//! hashable and takes part in the preload key.

use serde::{Deserialize, Serialize};
use url::{Origin, Url};

/// Attributes that partition otherwise identical origins (containers, private windows).
#[derive(Debug, Clone, Copy, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginAttributes {
    /// Container tab identifier, 0 for the default container
    pub user_context_id: u32,
    /// Non-zero for private browsing windows
    pub private_browsing_id: u32,
}

/// The identity a request is made on behalf of
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum Principal {
    /// Browser-internal loads
    System,
    /// A web origin
    Content {
        origin: Origin,
        origin_attributes: OriginAttributes,
    },
    /// A unique, opaque principal; only equal to its own clones
    Null(Origin),
}

impl Principal {
    /// Create a content principal for the origin of `url`
    pub fn content(url: &Url) -> Self {
        Self::content_with_attributes(url, OriginAttributes::default())
    }

    pub fn content_with_attributes(url: &Url, origin_attributes: OriginAttributes) -> Self {
        match url.origin() {
            origin @ Origin::Tuple(..) => Principal::Content {
                origin,
                origin_attributes,
            },
            opaque @ Origin::Opaque(_) => Principal::Null(opaque),
        }
    }

    pub fn null() -> Self {
        Principal::Null(Origin::new_opaque())
    }

    pub fn origin(&self) -> Option<&Origin> {
        match self {
            Principal::Content { origin, .. } | Principal::Null(origin) => Some(origin),
            Principal::System => None,
        }
    }

    pub fn origin_attributes(&self) -> OriginAttributes {
        match self {
            Principal::Content { origin_attributes, .. } => *origin_attributes,
            _ => OriginAttributes::default(),
        }
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Principal::System => write!(f, "[System Principal]"),
            Principal::Content { origin, origin_attributes } => {
                write!(f, "{}", origin.ascii_serialization())?;
                if *origin_attributes != OriginAttributes::default() {
                    write!(
                        f,
                        "^userContextId={}&privateBrowsingId={}",
                        origin_attributes.user_context_id, origin_attributes.private_browsing_id
                    )?;
                }
                Ok(())
            }
            Principal::Null(_) => write!(f, "[Null Principal]"),
        }
    }
}
