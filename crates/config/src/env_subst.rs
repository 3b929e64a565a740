/// Replace `${ENV_VAR}` and `{env:ENV_VAR}` placeholders in a config document.
///
/// Unresolvable variables are left as-is.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

/// Replace placeholders using a custom lookup function.
///
/// Separate from [`substitute_env`] so it can be tested without mutating the
/// process environment.
pub(crate) fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some((start, open_len)) = next_placeholder(rest) {
        result.push_str(&rest[..start]);
        let after_open = &rest[start + open_len..];
        match after_open.find('}') {
            Some(end) if end > 0 => {
                let name = &after_open[..end];
                let placeholder = &rest[start..start + open_len + end + 1];
                match lookup(name) {
                    Some(value) => result.push_str(&value),
                    None => result.push_str(placeholder),
                }
                rest = &after_open[end + 1..];
            },
            // Malformed: emit the opener literally and keep scanning after it.
            _ => {
                result.push_str(&rest[start..start + open_len]);
                rest = after_open;
            },
        }
    }

    result.push_str(rest);
    result
}

/// Byte offset and opener length of the earliest placeholder in `s`.
fn next_placeholder(s: &str) -> Option<(usize, usize)> {
    let dollar = s.find("${").map(|idx| (idx, 2));
    let env = s.find("{env:").map(|idx| (idx, 5));
    match (dollar, env) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}
