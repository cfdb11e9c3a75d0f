//! SLA configuration selection.
//!
//! Several SLA configurations can apply to one entity type; this module picks
//! the one that governs a given record. Selection is deterministic:
//! `match_priority` descending, then specificity (number of non-null
//! qualifiers matched) descending, then the stable ordering of the input.

/// Attributes of the record being matched.
#[derive(Debug, Clone, Default)]
pub struct SlaMatchContext {
    pub priority: Option<String>,
    pub category: Option<String>,
    pub department: Option<String>,
}

/// Qualifier view of a stored SLA configuration.
///
/// A `None` qualifier matches anything; a `Some` qualifier must equal the
/// context's value exactly.
#[derive(Debug, Clone)]
pub struct SlaRule {
    pub priority: Option<String>,
    pub category: Option<String>,
    pub department: Option<String>,
    pub match_priority: i32,
}

impl SlaRule {
    fn applies(&self, ctx: &SlaMatchContext) -> bool {
        qualifier_applies(&self.priority, &ctx.priority)
            && qualifier_applies(&self.category, &ctx.category)
            && qualifier_applies(&self.department, &ctx.department)
    }

    fn specificity(&self) -> u32 {
        [&self.priority, &self.category, &self.department]
            .iter()
            .filter(|q| q.is_some())
            .count() as u32
    }
}

fn qualifier_applies(qualifier: &Option<String>, value: &Option<String>) -> bool {
    match qualifier {
        None => true,
        Some(want) => value.as_deref() == Some(want.as_str()),
    }
}

/// Pick the governing rule's index, or `None` when nothing applies.
///
/// Returns an index so the caller can map back to the full stored
/// configuration row.
#[must_use]
pub fn select_rule(rules: &[SlaRule], ctx: &SlaMatchContext) -> Option<usize> {
    rules
        .iter()
        .enumerate()
        .filter(|(_, rule)| rule.applies(ctx))
        .max_by(|(ia, a), (ib, b)| {
            a.match_priority
                .cmp(&b.match_priority)
                .then(a.specificity().cmp(&b.specificity()))
                .then(ib.cmp(ia))
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(
        priority: Option<&str>,
        category: Option<&str>,
        department: Option<&str>,
        match_priority: i32,
    ) -> SlaRule {
        SlaRule {
            priority: priority.map(str::to_string),
            category: category.map(str::to_string),
            department: department.map(str::to_string),
            match_priority,
        }
    }

    fn ctx(priority: &str, category: &str) -> SlaMatchContext {
        SlaMatchContext {
            priority: Some(priority.to_string()),
            category: Some(category.to_string()),
            department: None,
        }
    }

    #[test]
    fn catch_all_matches_anything() {
        let rules = vec![rule(None, None, None, 0)];
        assert_eq!(select_rule(&rules, &SlaMatchContext::default()), Some(0));
        assert_eq!(select_rule(&rules, &ctx("high", "chemical")), Some(0));
    }

    #[test]
    fn qualifier_mismatch_excludes_rule() {
        let rules = vec![rule(Some("critical"), None, None, 0)];
        assert_eq!(select_rule(&rules, &ctx("high", "chemical")), None);
        assert_eq!(select_rule(&rules, &ctx("critical", "chemical")), Some(0));
    }

    #[test]
    fn match_priority_beats_specificity() {
        let rules = vec![
            rule(Some("high"), Some("chemical"), None, 0),
            rule(None, None, None, 10),
        ];
        assert_eq!(select_rule(&rules, &ctx("high", "chemical")), Some(1));
    }

    #[test]
    fn specificity_breaks_priority_ties() {
        let rules = vec![
            rule(None, None, None, 5),
            rule(Some("high"), Some("chemical"), None, 5),
        ];
        assert_eq!(select_rule(&rules, &ctx("high", "chemical")), Some(1));
    }

    #[test]
    fn stable_order_breaks_full_ties() {
        let rules = vec![
            rule(Some("high"), None, None, 5),
            rule(None, Some("chemical"), None, 5),
        ];
        assert_eq!(select_rule(&rules, &ctx("high", "chemical")), Some(0));
    }

    #[test]
    fn qualified_rule_needs_context_value() {
        // A rule requiring a department never matches a record without one.
        let rules = vec![rule(None, None, Some("maintenance"), 0)];
        assert_eq!(select_rule(&rules, &ctx("high", "chemical")), None);
    }
}
