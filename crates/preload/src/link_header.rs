//! Parsed `Link` header records as delivered by the header parser.

/// One link-value of a `Link` header, reduced to the attributes preloading looks at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkHeader {
    pub href: String,
    pub rel: String,
    pub as_: String,
    pub referrer_policy: String,
}

impl LinkHeader {
    pub fn new(href: &str, rel: &str) -> Self {
        Self {
            href: href.to_string(),
            rel: rel.to_string(),
            ..Default::default()
        }
    }

    pub fn with_as(mut self, as_: &str) -> Self {
        self.as_ = as_.to_string();
        self
    }

    pub fn with_referrer_policy(mut self, policy: &str) -> Self {
        self.referrer_policy = policy.to_string();
        self
    }

    /// `rel=preload`, compared ASCII case-insensitively
    pub fn is_preload(&self) -> bool {
        self.rel.eq_ignore_ascii_case("preload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preload_rel_is_case_insensitive() {
        assert!(LinkHeader::new("/a.png", "preload").is_preload());
        assert!(LinkHeader::new("/a.png", "PreLoad").is_preload());
        assert!(!LinkHeader::new("/a.png", "preconnect").is_preload());
        assert!(!LinkHeader::new("/a.png", "preload prefetch").is_preload());
    }
}
