//! Expression scanning
//!
//! Locates `${op:arg}` expressions inside string values:
//! - `${var:model.depth}` - operator with argument
//! - `${cfg: base, overrides}` - spaces around the colon are allowed
//! - `${add: 1, ${var:offset}}` - expressions nest to any depth
//!
//! The scan is a counter-based brace balance, so arbitrarily nested `{...}`
//! inside an argument is matched without any pattern-engine recursion.
//! Which operator names count as expressions is decided by a [`Grammar`],
//! passed in explicitly on every call.

use std::ops::Range;

/// Marker that opens an expression
const OPEN: &str = "${";

/// The set of operator names a scan accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    /// Only the include operator (`cfg`); used before overrides are applied
    Include,
    /// Any identifier
    Full,
}

impl Grammar {
    /// Name of the include operator
    pub const INCLUDE_OPERATOR: &'static str = "cfg";

    /// Whether an operator name is treated as an expression in this grammar
    pub fn accepts(&self, operator: &str) -> bool {
        match self {
            Grammar::Include => operator == Self::INCLUDE_OPERATOR,
            Grammar::Full => true,
        }
    }
}

/// A well-formed expression located in a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    /// Operator name (e.g., "var", "cfg", "add")
    pub operator: String,
    /// Raw argument text, leading spaces after the colon removed
    pub argument: String,
    /// Byte span of the whole `${...}` in the scanned string
    pub span: Range<usize>,
}

impl Expression {
    /// The literal text of this expression within `input`
    pub fn text<'a>(&self, input: &'a str) -> &'a str {
        &input[self.span.clone()]
    }
}

/// Scanner over one string
pub struct Scanner<'a> {
    input: &'a str,
    grammar: Grammar,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str, grammar: Grammar) -> Self {
        Self { input, grammar }
    }

    /// First expression starting at or after byte offset `from`
    pub fn find_from(&self, from: usize) -> Option<Expression> {
        let mut pos = from;
        while let Some(offset) = self.input.get(pos..)?.find(OPEN) {
            let start = pos + offset;
            if let Some(expr) = self.match_at(start) {
                return Some(expr);
            }
            pos = start + 1;
        }
        None
    }

    /// Every non-overlapping expression, left to right
    pub fn find_all(&self) -> Vec<Expression> {
        let mut found = Vec::new();
        let mut pos = 0;
        while let Some(expr) = self.find_from(pos) {
            pos = expr.span.end;
            found.push(expr);
        }
        found
    }

    /// Try to match a whole expression whose `${` begins at `start`
    fn match_at(&self, start: usize) -> Option<Expression> {
        let bytes = self.input.as_bytes();
        let mut pos = start + OPEN.len();

        // Operator identifier: word characters
        let name_start = pos;
        while let Some(c) = self.input[pos..].chars().next() {
            if c.is_alphanumeric() || c == '_' {
                pos += c.len_utf8();
            } else {
                break;
            }
        }
        if pos == name_start {
            return None;
        }
        let operator = &self.input[name_start..pos];
        if !self.grammar.accepts(operator) {
            return None;
        }

        // Colon with optional surrounding whitespace
        pos = self.skip_whitespace(pos);
        if bytes.get(pos) != Some(&b':') {
            return None;
        }
        pos = self.skip_whitespace(pos + 1);

        // Argument: balance braces up to the matching close
        let arg_start = pos;
        let mut depth = 0usize;
        while let Some(&b) = bytes.get(pos) {
            match b {
                b'{' => depth += 1,
                b'}' if depth == 0 => {
                    return Some(Expression {
                        operator: operator.to_string(),
                        argument: self.input[arg_start..pos].to_string(),
                        span: start..pos + 1,
                    });
                }
                b'}' => depth -= 1,
                _ => {}
            }
            pos += 1;
        }

        // Unbalanced: no closing brace
        None
    }

    fn skip_whitespace(&self, mut pos: usize) -> usize {
        while let Some(c) = self.input[pos..].chars().next() {
            if !c.is_whitespace() {
                break;
            }
            pos += c.len_utf8();
        }
        pos
    }
}

/// First well-formed expression in `input`
pub fn find_first(input: &str, grammar: Grammar) -> Option<Expression> {
    Scanner::new(input, grammar).find_from(0)
}

/// Whether `input` contains at least one well-formed expression
pub fn contains_any(input: &str, grammar: Grammar) -> bool {
    find_first(input, grammar).is_some()
}

/// Whether `input` is exactly one expression with no surrounding text
pub fn is_entire_string(input: &str, grammar: Grammar) -> bool {
    entire_expression(input, grammar).is_some()
}

/// The expression spanning all of `input`, if there is one
pub fn entire_expression(input: &str, grammar: Grammar) -> Option<Expression> {
    find_first(input, grammar).filter(|expr| expr.span == (0..input.len()))
}

/// Split an argument on `delim` where it is not nested inside braces
///
/// `"1, ${add: 2, 3}"` splits into `["1", " ${add: 2, 3}"]`. Pieces are
/// returned untrimmed.
pub fn split_top_level(argument: &str, delim: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut last = 0;

    for (i, c) in argument.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            c if c == delim && depth == 0 => {
                parts.push(&argument[last..i]);
                last = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&argument[last..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_find_simple_expression() {
        let expr = find_first("${var:model.depth}", Grammar::Full).unwrap();
        assert_eq!(expr.operator, "var");
        assert_eq!(expr.argument, "model.depth");
        assert_eq!(expr.span, 0..18);
    }

    #[test]
    fn test_spaces_around_colon() {
        let expr = find_first("${cfg : base, extra}", Grammar::Full).unwrap();
        assert_eq!(expr.operator, "cfg");
        assert_eq!(expr.argument, "base, extra");
    }

    #[test]
    fn test_expression_inside_text() {
        let input = "run-${env:USER}-final";
        let expr = find_first(input, Grammar::Full).unwrap();
        assert_eq!(expr.text(input), "${env:USER}");
        assert_eq!(expr.span, 4..15);
        assert!(!is_entire_string(input, Grammar::Full));
        assert!(contains_any(input, Grammar::Full));
    }

    #[test]
    fn test_nested_expression_is_one_match() {
        let input = "${add: 1, ${add: 2, 3}}";
        let expr = find_first(input, Grammar::Full).unwrap();
        assert_eq!(expr.operator, "add");
        assert_eq!(expr.argument, "1, ${add: 2, 3}");
        assert!(is_entire_string(input, Grammar::Full));
    }

    #[test]
    fn test_nesting_depth_three() {
        let input = "${mul: 2, ${add: 1, ${sub: 5, ${var:x}}}}";
        let expr = find_first(input, Grammar::Full).unwrap();
        assert_eq!(expr.argument, "2, ${add: 1, ${sub: 5, ${var:x}}}");
        assert!(is_entire_string(input, Grammar::Full));
    }

    #[test]
    fn test_unbalanced_braces_pass_through() {
        assert_eq!(find_first("${var:a", Grammar::Full), None);
        assert_eq!(find_first("${add: 1, ${var:a}", Grammar::Full).unwrap().argument, "a");
        assert!(!contains_any("no expressions here", Grammar::Full));
        assert!(!contains_any("just $dollar and {braces}", Grammar::Full));
    }

    #[test]
    fn test_missing_colon_is_not_an_expression() {
        assert_eq!(find_first("${model.depth}", Grammar::Full), None);
        assert_eq!(find_first("${}", Grammar::Full), None);
        assert_eq!(find_first("${:x}", Grammar::Full), None);
    }

    #[test]
    fn test_empty_argument() {
        let expr = find_first("${env:}", Grammar::Full).unwrap();
        assert_eq!(expr.operator, "env");
        assert_eq!(expr.argument, "");
    }

    #[test]
    fn test_include_grammar_skips_other_operators() {
        let input = "${var:a} and ${cfg: base}";
        let expr = find_first(input, Grammar::Include).unwrap();
        assert_eq!(expr.operator, "cfg");
        assert_eq!(expr.text(input), "${cfg: base}");

        assert!(!contains_any("${var:a} ${env:HOME}", Grammar::Include));
        assert!(contains_any("${var:a} ${env:HOME}", Grammar::Full));
    }

    #[test]
    fn test_include_grammar_finds_nested_include() {
        let input = "${add: 1, ${cfg: one}}";
        let expr = find_first(input, Grammar::Include).unwrap();
        assert_eq!(expr.text(input), "${cfg: one}");
        assert!(!is_entire_string(input, Grammar::Include));
    }

    #[test]
    fn test_adjacent_expressions_are_not_entire() {
        let input = "${var:a}${var:b}";
        assert!(!is_entire_string(input, Grammar::Full));

        let all = Scanner::new(input, Grammar::Full).find_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].argument, "b");
        assert_eq!(all[1].span, 8..16);
    }

    #[test]
    fn test_find_from_offset() {
        let input = "${x:1} ${y:2}";
        let expr = Scanner::new(input, Grammar::Full).find_from(1).unwrap();
        assert_eq!(expr.operator, "y");
    }

    #[test]
    fn test_non_ascii_text() {
        let input = "größe: ${var:maß}!";
        let expr = find_first(input, Grammar::Full).unwrap();
        assert_eq!(expr.operator, "var");
        assert_eq!(expr.argument, "maß");
        assert_eq!(expr.text(input), "${var:maß}");
    }

    #[test]
    fn test_split_top_level() {
        assert_eq!(split_top_level("1, 2,3", ','), vec!["1", " 2", "3"]);
        assert_eq!(
            split_top_level("1, ${add: 2, 3}", ','),
            vec!["1", " ${add: 2, 3}"]
        );
        assert_eq!(
            split_top_level("${cfg: a, b}, c", ','),
            vec!["${cfg: a, b}", " c"]
        );
        assert_eq!(split_top_level("", ','), vec![""]);
    }
}
