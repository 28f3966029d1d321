use serde::{Deserialize, Serialize};

/// Highest register number the 4-bit and 8-bit instruction formats can all
/// address.
pub const DEFAULT_REGISTER_LIMIT: u32 = 15;

/// Settings for the register-limit rewriter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Registers numbered above this are rewritten.
    pub limit: u32,
    /// Wrap every generated block in marker comments.
    pub annotate: bool,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_REGISTER_LIMIT,
            annotate: false,
        }
    }
}

impl RewriteConfig {
    pub fn with_limit(limit: u32) -> Self {
        Self { limit, ..Self::default() }
    }
}
