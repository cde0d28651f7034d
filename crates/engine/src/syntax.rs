//! Lexical helpers shared by the expression and action parsers.
//!
//! Both grammars are small enough to be parsed by splitting on top-level operators:
//! operators inside quotes or parentheses are never split on.

/// Splits `expression` on every top-level occurrence of `operator`.
///
/// Returns `None` when the operator does not occur at top level, so callers can fall
/// through to the next precedence level. Empty parts are kept so callers can report
/// dangling operators.
pub(crate) fn split_top_level<'a>(expression: &'a str, operator: &str) -> Option<Vec<&'a str>> {
    let mut parts = Vec::new();
    let mut start = 0usize;

    while let Some(relative_index) = find_top_level_operator(&expression[start..], operator) {
        let absolute_index = start + relative_index;
        parts.push(expression[start..absolute_index].trim());
        start = absolute_index + operator.len();
    }

    if parts.is_empty() {
        return None;
    }
    parts.push(expression[start..].trim());
    Some(parts)
}

/// Byte offset of the first top-level occurrence of `operator`.
pub(crate) fn find_top_level_operator(expression: &str, operator: &str) -> Option<usize> {
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut depth = 0i32;

    for (index, character) in expression.char_indices() {
        match character {
            '\'' if !in_double_quote => {
                in_single_quote = !in_single_quote;
                continue;
            }
            '"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
                continue;
            }
            '(' if !in_single_quote && !in_double_quote => {
                depth += 1;
                continue;
            }
            ')' if !in_single_quote && !in_double_quote => {
                if depth > 0 {
                    depth -= 1;
                }
                continue;
            }
            _ => {}
        }

        if !in_single_quote && !in_double_quote && depth == 0 && expression[index..].starts_with(operator) {
            return Some(index);
        }
    }

    None
}

/// Counts and strips leading `!` operators, leaving `!=` alone.
pub(crate) fn strip_leading_negations(expression: &str) -> (usize, &str) {
    let mut count = 0usize;
    let mut remainder = expression.trim_start();
    while let Some(stripped) = remainder.strip_prefix('!') {
        if stripped.starts_with('=') {
            break;
        }
        count += 1;
        remainder = stripped.trim_start();
    }
    (count, remainder)
}

/// Checks that parentheses outside of quotes are balanced.
pub(crate) fn parentheses_balanced(expression: &str) -> bool {
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut depth = 0i32;
    for character in expression.chars() {
        match character {
            '\'' if !in_double_quote => in_single_quote = !in_single_quote,
            '"' if !in_single_quote => in_double_quote = !in_double_quote,
            '(' if !in_single_quote && !in_double_quote => depth += 1,
            ')' if !in_single_quote && !in_double_quote => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0 && !in_single_quote && !in_double_quote
}

/// Removes one pair of parentheses wrapping the whole expression, if present.
pub(crate) fn strip_enclosing_parentheses(expression: &str) -> Option<&str> {
    let inner = expression.strip_prefix('(')?.strip_suffix(')')?;
    // `(a) && (b)` starts and ends with parentheses but is not wrapped by one pair.
    if parentheses_balanced(inner) { Some(inner.trim()) } else { None }
}

/// Unquotes a single- or double-quoted string literal.
pub(crate) fn unquote(literal: &str) -> Option<&str> {
    let quote = literal.chars().next()?;
    if quote != '\'' && quote != '"' || literal.len() < 2 {
        return None;
    }
    literal.strip_prefix(quote)?.strip_suffix(quote)
}

/// Characters allowed in a member name or path segment.
pub(crate) fn is_identifier_character(character: char) -> bool {
    character.is_ascii_alphanumeric() || character == '_' || character == '-'
}

pub(crate) fn is_identifier(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(is_identifier_character)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_only_outside_quotes_and_parentheses() {
        let parts = split_top_level("a || (b || c) || d == '||'", "||").expect("split");
        assert_eq!(parts, vec!["a", "(b || c)", "d == '||'"]);
        assert!(split_top_level("(a || b)", "||").is_none());
    }

    #[test]
    fn keeps_dangling_operands_for_error_reporting() {
        let parts = split_top_level("a &&", "&&").expect("split");
        assert_eq!(parts, vec!["a", ""]);
    }

    #[test]
    fn strips_wrapping_parentheses_only_when_they_enclose_everything() {
        assert_eq!(strip_enclosing_parentheses("(a || b)"), Some("a || b"));
        assert_eq!(strip_enclosing_parentheses("(a) && (b)"), None);
    }

    #[test]
    fn negations_do_not_swallow_inequality() {
        assert_eq!(strip_leading_negations("!!a"), (2, "a"));
        assert_eq!(strip_leading_negations("!= b"), (0, "!= b"));
    }

    #[test]
    fn handles_utf8_literals_without_panicking() {
        assert!(find_top_level_operator("name == \"café\" && flag", "&&").is_some());
        assert_eq!(unquote("'café'"), Some("café"));
    }
}
