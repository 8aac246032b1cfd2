//! Per-category synthesis policy.
//!
//! Categories differ in what a freshly created tracker issue should contain
//! beyond the common template. Those differences live here as a closed table
//! of policy records, selected by lookup; the synthesizer itself stays free
//! of category conditionals.

/// Extra behavior applied when creating a tracker issue for one category.
#[derive(Debug, Clone, Copy)]
pub struct CategoryPolicy {
    /// Category this record applies to.
    pub category: &'static str,
    /// Boilerplate appended to the issue body.
    pub body_suffix: Option<&'static str>,
    /// Copy `i18n-<code>lreq` labels from the spec issue, plus a
    /// `spec-type-issue` marker when any matched.
    pub propagate_lreq: bool,
}

/// Triage instructions appended to internationalization tracker issues.
const I18N_INSTRUCTIONS: &str = "\n\
\nInstructions:\
\n- check for the following labels, then remove the PENDING label, then delete these instructions\
\n\
\n- TRACKER & S:...  should be there\
\n- add ADVICE-REQUESTED if the WG-issue is specifically asking for i18n to advise/comment\
\n- add NEEDS-ATTENTION if this is an important issue\
\n\
\n- if there's an i18n-*lreq label in the WG repo:\
\n   -  ...LREQ label(s) should be there\
\n   - SPEC-TYPE-ISSUE should be there\
\n   - add TYPE-INFO-REQUEST if a request for script/language expert advice\
\n    - add I:...  label(s)";

const DEFAULT_POLICY: CategoryPolicy = CategoryPolicy {
    category: "",
    body_suffix: None,
    propagate_lreq: false,
};

const POLICIES: &[CategoryPolicy] = &[CategoryPolicy {
    category: "i18n",
    body_suffix: Some(I18N_INSTRUCTIONS),
    propagate_lreq: true,
}];

/// The policy for a category; categories without special rules share the
/// default record.
pub fn policy_for(category: &str) -> &'static CategoryPolicy {
    POLICIES
        .iter()
        .find(|p| p.category == category)
        .unwrap_or(&DEFAULT_POLICY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i18n_gets_instructions_and_lreq() {
        let policy = policy_for("i18n");
        assert!(policy.propagate_lreq);
        assert!(policy.body_suffix.expect("suffix").contains("PENDING"));
    }

    #[test]
    fn test_other_categories_get_default() {
        for category in ["a11y", "privacy", "security", "tag", "made-up"] {
            let policy = policy_for(category);
            assert!(!policy.propagate_lreq);
            assert!(policy.body_suffix.is_none());
        }
    }
}
