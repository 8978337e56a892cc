//! Policy method naming.

use convert_case::{Case, Casing};

/// Suffix of the method consulted for class-mode checks.
pub const CLASS_MODE_SUFFIX: &str = "Any";

/// Method name for an ability: dashed abilities become camel case.
pub fn ability_method(ability: &str) -> String {
    if ability.contains('-') {
        ability.to_case(Case::Camel)
    } else {
        ability.to_string()
    }
}

/// Candidate policy method names for an ability, in order of precedence.
pub fn policy_methods(ability: &str, class_mode: bool) -> Vec<String> {
    let method = ability_method(ability);
    if class_mode {
        vec![format!("{method}{CLASS_MODE_SUFFIX}"), method]
    } else {
        vec![method]
    }
}
