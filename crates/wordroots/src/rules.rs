use std::collections::BTreeSet;

/// Prefix of the single conservative derivation rule (`vision` -> `envision`).
pub const AFFIX_PREFIX: &str = "en";

/// Forms produced by prefixing [`AFFIX_PREFIX`] to a purely alphabetic base.
pub fn affix_forms(base: &str) -> BTreeSet<String> {
    let mut forms = BTreeSet::new();
    if !base.is_empty() && base.chars().all(char::is_alphabetic) {
        forms.insert(format!("{AFFIX_PREFIX}{base}"));
    }
    forms
}
