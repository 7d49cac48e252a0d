//! Safety checks for raw configs that still carry `{{...}}` substitution
//! markers. Typed validation is meaningless before substitution, so these
//! run instead of it.

use domain::validation::ValidationResult;

/// Helper names a template must never call: anything touching the
/// filesystem, the network, the process environment or a shell.
const DENIED_HELPERS: &[&str] = &[
    "env", "expandenv", "file", "readfile", "read_file", "exec", "shell", "system", "os",
    "http", "wget", "curl", "net", "lookup", "dial", "popen",
];

/// Variables the substitution engine always provides.
const BUILTIN_VARIABLES: &[&str] = &[
    "device_id", "device_name", "device_type", "mac", "ip", "model", "generation", "firmware",
];

pub fn contains_markers(raw: &str) -> bool {
    raw.contains("{{")
}

/// Brace balance plus helper deny-set. Unknown variable references are
/// reported as info, not errors: they may be operator-defined.
pub fn validate_markers(raw: &str) -> ValidationResult {
    let mut result = ValidationResult::new();

    let open = raw.matches("{{").count();
    let close = raw.matches("}}").count();
    if open != close {
        result.error(
            "UNBALANCED_TEMPLATE_MARKERS",
            "",
            format!("{} opening '{{{{' vs {} closing '}}}}'", open, close),
        );
        return result;
    }

    let mut rest = raw;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else { break };
        let expr = after[..end].trim();
        check_expression(expr, &mut result);
        rest = &after[end + 2..];
    }

    result
}

fn check_expression(expr: &str, result: &mut ValidationResult) {
    for token in expr
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
    {
        let lowered = token.to_lowercase();
        if DENIED_HELPERS.contains(&lowered.as_str()) {
            result.error(
                "TEMPLATE_UNSAFE_FUNCTION",
                "",
                format!("template references forbidden helper '{}'", token),
            );
        } else if token
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
            && !BUILTIN_VARIABLES.contains(&lowered.as_str())
        {
            result.note(
                "UNKNOWN_TEMPLATE_VARIABLE",
                "",
                format!("'{}' is not a builtin variable", token),
            );
        }
    }
}
