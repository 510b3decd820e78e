//! # Sequence Scopes and Code Formats
//!
//! A scope is one numbering stream: `(EntityKind, year)`. Codes in different
//! scopes never share a prefix, so `(Lead, 2025)` and `(Lead, 2026)` can
//! never influence or collide with each other.
//!
//! ## Layouts
//!
//! | Kind      | Layout              | Example           |
//! |-----------|---------------------|-------------------|
//! | Lead      | `LEAD-{YEAR}-{N:5}` | `LEAD-2025-00001` |
//! | Quote     | `O{YEAR}-{N:3}`     | `O2025-001`       |
//! | Order     | `ORD-{YEAR}-{N:5}`  | `ORD-2025-00001`  |
//! | Agreement | `AGR-{YEAR}-{N:5}`  | `AGR-2025-00001`  |

use fcrm_core::EntityKind;
use serde::{Deserialize, Serialize};

/// Separator between the year and the numeric tail.
pub const SEPARATOR: char = '-';

/// Layout of one kind's reference codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeFormat {
    /// Text before the year, separator included (`"LEAD-"`, `"O"`).
    pub head: &'static str,
    /// Minimum digit count of the numeric tail. Wider values are not truncated.
    pub width: usize,
}

impl CodeFormat {
    /// The layout used for `kind`.
    pub fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Lead => Self { head: "LEAD-", width: 5 },
            EntityKind::Quote => Self { head: "O", width: 3 },
            EntityKind::Order => Self { head: "ORD-", width: 5 },
            EntityKind::Agreement => Self { head: "AGR-", width: 5 },
        }
    }
}

/// One numbering stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SequenceScope {
    /// Kind of record being numbered.
    pub kind: EntityKind,
    /// Calendar year (UTC) the record was created in.
    pub year: i32,
}

impl SequenceScope {
    /// Create a scope.
    pub fn new(kind: EntityKind, year: i32) -> Self {
        Self { kind, year }
    }

    /// Layout for this scope's kind.
    pub fn format(&self) -> CodeFormat {
        CodeFormat::for_kind(self.kind)
    }

    /// Everything before the numeric tail, e.g. `LEAD-2025-` or `O2025-`.
    ///
    /// Stores use this for the "last code with this prefix" lookup.
    pub fn prefix(&self) -> String {
        format!("{}{}{}", self.format().head, self.year, SEPARATOR)
    }

    /// Render sequence number `n` in this scope.
    pub fn render(&self, n: u64) -> String {
        let width = self.format().width;
        format!("{}{n:0width$}", self.prefix())
    }
}

impl std::fmt::Display for SequenceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes() {
        assert_eq!(SequenceScope::new(EntityKind::Lead, 2025).prefix(), "LEAD-2025-");
        assert_eq!(SequenceScope::new(EntityKind::Quote, 2025).prefix(), "O2025-");
        assert_eq!(SequenceScope::new(EntityKind::Order, 2025).prefix(), "ORD-2025-");
        assert_eq!(SequenceScope::new(EntityKind::Agreement, 2026).prefix(), "AGR-2026-");
    }

    #[test]
    fn test_render_pads_to_width() {
        assert_eq!(SequenceScope::new(EntityKind::Lead, 2025).render(1), "LEAD-2025-00001");
        assert_eq!(SequenceScope::new(EntityKind::Quote, 2025).render(1), "O2025-001");
        assert_eq!(SequenceScope::new(EntityKind::Order, 2025).render(42), "ORD-2025-00042");
    }

    #[test]
    fn test_render_grows_past_width() {
        assert_eq!(SequenceScope::new(EntityKind::Lead, 2025).render(100_000), "LEAD-2025-100000");
        assert_eq!(SequenceScope::new(EntityKind::Quote, 2025).render(1000), "O2025-1000");
    }

    #[test]
    fn test_prefixes_distinct_across_kinds_and_years() {
        let mut seen = std::collections::HashSet::new();
        for kind in EntityKind::all() {
            for year in [2024, 2025, 2026] {
                assert!(seen.insert(SequenceScope::new(*kind, year).prefix()));
            }
        }
    }
}
