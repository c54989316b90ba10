//! Per-line grammar for field declarations, constraint tokens and other
//! small inline constructs.
//!
//! Positions in [`GrammarError`] are byte indices into the text handed to
//! the function, so callers can map them back to document columns.

use crate::models::{
    AssertOp, Assertion, Constraint, CustomImpl, Field, HookType, RuleTag, TypeRef,
};

/// A grammar failure at a byte position within the parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarError {
    pub position: usize,
    pub expected: String,
    pub found: String,
}

impl GrammarError {
    fn new(position: usize, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self {
            position,
            expected: expected.into(),
            found: found.into(),
        }
    }

    fn shifted(mut self, by: usize) -> Self {
        self.position += by;
        self
    }
}

pub type GrammarResult<T> = Result<T, GrammarError>;

pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split on a separator at bracket depth zero, outside double quotes.
///
/// Returns `(start, piece)` pairs with pieces trimmed; `start` is the byte
/// index of the trimmed piece within `text`.
pub fn split_top_level(text: &str, separator: char) -> GrammarResult<Vec<(usize, &str)>> {
    let mut pieces = Vec::new();
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut in_quote = false;
    let mut escaped = false;
    let mut piece_start = 0;

    for (i, c) in text.char_indices() {
        if in_quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_quote = false;
            }
            continue;
        }
        match c {
            '"' => in_quote = true,
            '(' | '[' | '{' => stack.push((c, i)),
            ')' | ']' | '}' => {
                let expected_open = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((open, _)) if open == expected_open => {}
                    _ => {
                        return Err(GrammarError::new(
                            i,
                            "balanced brackets",
                            c.to_string(),
                        ))
                    }
                }
            }
            c if c == separator && stack.is_empty() => {
                pieces.push(trimmed_piece(text, piece_start, i));
                piece_start = i + c.len_utf8();
            }
            _ => {}
        }
    }

    if let Some((open, position)) = stack.pop() {
        let close = match open {
            '(' => ')',
            '[' => ']',
            _ => '}',
        };
        return Err(GrammarError::new(
            position,
            format!("closing `{}`", close),
            &text[position..],
        ));
    }
    if in_quote {
        return Err(GrammarError::new(text.len(), "closing `\"`", text));
    }

    pieces.push(trimmed_piece(text, piece_start, text.len()));
    Ok(pieces)
}

fn trimmed_piece(text: &str, start: usize, end: usize) -> (usize, &str) {
    let slice = &text[start..end];
    let leading = slice.len() - slice.trim_start().len();
    (start + leading, slice.trim())
}

/// Find a substring at bracket depth zero, outside double quotes.
pub fn find_top_level(text: &str, needle: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_quote = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if in_quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_quote = false;
            }
            continue;
        }
        match c {
            '"' => in_quote = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ if depth == 0 && text[i..].starts_with(needle) => return Some(i),
            _ => {}
        }
    }
    None
}

/// Index of the bracket closing the one opened at `open_index`.
fn matching_close(text: &str, open_index: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_quote = false;
    for (i, c) in text[open_index..].char_indices() {
        match c {
            '"' => in_quote = !in_quote,
            '(' | '[' | '{' if !in_quote => depth += 1,
            ')' | ']' | '}' if !in_quote => {
                depth -= 1;
                if depth == 0 {
                    return Some(open_index + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a type reference: an identifier or `List<Type>`.
pub fn parse_type_ref(text: &str) -> GrammarResult<TypeRef> {
    let trimmed = text.trim();
    let lead = text.len() - text.trim_start().len();

    if let Some(inner) = trimmed.strip_prefix("List<") {
        let inner = inner
            .strip_suffix('>')
            .ok_or_else(|| GrammarError::new(lead, "closing `>` of List<...>", trimmed))?;
        let inner_ty = parse_type_ref(inner).map_err(|e| e.shifted(lead + 5))?;
        return Ok(TypeRef::List(Box::new(inner_ty)));
    }

    if is_identifier(trimmed) {
        Ok(TypeRef::Named(trimmed.to_string()))
    } else {
        Err(GrammarError::new(lead, "type name or List<Type>", trimmed))
    }
}

/// Parse one constraint token from the fixed vocabulary.
pub fn parse_constraint(token: &str) -> GrammarResult<Constraint> {
    match token {
        "required" => return Ok(Constraint::Required),
        "optional" => return Ok(Constraint::Optional),
        "immutable" => return Ok(Constraint::Immutable),
        "system-generated" => return Ok(Constraint::SystemGenerated),
        _ => {}
    }

    let (key, value) = match token.split_once(':') {
        Some((key, value)) => (key.trim(), value.trim()),
        None => return Err(GrammarError::new(0, "constraint token", token)),
    };
    let value_at = token.len() - token[token.find(':').map_or(0, |i| i + 1)..].trim_start().len();

    if value.is_empty() {
        return Err(GrammarError::new(value_at, format!("value for `{}`", key), token));
    }

    match key {
        "default" => Ok(Constraint::Default(value.to_string())),
        "min" | "max" => {
            if value.parse::<f64>().is_err() {
                return Err(GrammarError::new(value_at, format!("numeric `{}` bound", key), value));
            }
            Ok(if key == "min" {
                Constraint::Min(value.to_string())
            } else {
                Constraint::Max(value.to_string())
            })
        }
        "references" => match value.split_once('.') {
            Some((entity, field)) if is_identifier(entity) && is_identifier(field) => {
                Ok(Constraint::References {
                    entity: entity.to_string(),
                    field: field.to_string(),
                })
            }
            _ => Err(GrammarError::new(value_at, "`Entity.field` reference", value)),
        },
        "format" => Ok(Constraint::Format(value.to_string())),
        "conditional" => Ok(Constraint::Conditional(value.to_string())),
        _ => Err(GrammarError::new(0, "constraint token", token)),
    }
}

/// Parse a comma-separated constraint list (without the parentheses).
pub fn parse_constraint_list(text: &str) -> GrammarResult<Vec<Constraint>> {
    let mut constraints = Vec::new();
    for (start, token) in split_top_level(text, ',')? {
        if token.is_empty() {
            return Err(GrammarError::new(start, "constraint token", "empty token"));
        }
        constraints.push(parse_constraint(token).map_err(|e| e.shifted(start))?);
    }
    Ok(constraints)
}

/// Parse `name: Type (constraints) // description`.
pub fn parse_field_line(text: &str) -> GrammarResult<Field> {
    let (decl, description) = match find_top_level(text, "//") {
        Some(i) => {
            let desc = text[i + 2..].trim();
            (&text[..i], if desc.is_empty() { None } else { Some(desc.to_string()) })
        }
        None => (text, None),
    };

    let colon = decl
        .find(':')
        .ok_or_else(|| GrammarError::new(decl.len(), "`:` after field name", decl))?;
    let name = decl[..colon].trim();
    if !is_identifier(name) {
        return Err(GrammarError::new(0, "field name", name));
    }

    let rest_start = colon + 1;
    let rest = &decl[rest_start..];
    let (type_text, type_at, constraints) = match rest.find('(') {
        Some(open) => {
            let close = matching_close(rest, open).ok_or_else(|| {
                GrammarError::new(rest_start + open, "closing `)`", &rest[open..])
            })?;
            let trailing = rest[close + 1..].trim();
            if !trailing.is_empty() {
                return Err(GrammarError::new(
                    rest_start + close + 1,
                    "end of field line after `)`",
                    trailing,
                ));
            }
            let constraints = parse_constraint_list(&rest[open + 1..close])
                .map_err(|e| e.shifted(rest_start + open + 1))?;
            (&rest[..open], rest_start, constraints)
        }
        None => (rest, rest_start, Vec::new()),
    };

    if type_text.trim().is_empty() {
        return Err(GrammarError::new(type_at, "field type", decl));
    }
    let ty = parse_type_ref(type_text).map_err(|e| e.shifted(type_at))?;

    Ok(Field {
        name: name.to_string(),
        ty,
        constraints,
        description,
    })
}

/// Parse `name (hook[, contract:<text>])` from a `Custom:` entry.
pub fn parse_custom(text: &str) -> GrammarResult<CustomImpl> {
    let open = text
        .find('(')
        .ok_or_else(|| GrammarError::new(text.len(), "`(hook)` after region name", text))?;
    let name = text[..open].trim();
    if !is_identifier(name) {
        return Err(GrammarError::new(0, "region name", name));
    }
    let close = matching_close(text, open)
        .ok_or_else(|| GrammarError::new(open, "closing `)`", &text[open..]))?;
    let trailing = text[close + 1..].trim();
    if !trailing.is_empty() {
        return Err(GrammarError::new(close + 1, "end of line after `)`", trailing));
    }

    let inner_start = open + 1;
    let inner = &text[inner_start..close];
    let pieces = split_top_level(inner, ',').map_err(|e| e.shifted(inner_start))?;
    let (hook_at, hook_text) = pieces[0];
    let hook = HookType::parse(hook_text).ok_or_else(|| {
        GrammarError::new(
            inner_start + hook_at,
            "hook type (before, after, replace, extend)",
            hook_text,
        )
    })?;

    let contract = match pieces.get(1) {
        None => None,
        Some(&(at, piece)) => {
            let rest = inner[at..].trim();
            let contract = rest.strip_prefix("contract:").ok_or_else(|| {
                GrammarError::new(inner_start + at, "`contract:<text>`", piece)
            })?;
            let contract = contract.trim();
            if contract.is_empty() {
                return Err(GrammarError::new(inner_start + at, "contract text", piece));
            }
            Some(contract.to_string())
        }
    };

    Ok(CustomImpl {
        name: name.to_string(),
        hook,
        contract,
    })
}

/// Parse one rule context tag.
pub fn parse_rule_tag(token: &str) -> GrammarResult<RuleTag> {
    if token == "critical" {
        return Ok(RuleTag::Critical);
    }
    let (key, value) = token
        .split_once(':')
        .map(|(k, v)| (k.trim(), v.trim()))
        .ok_or_else(|| GrammarError::new(0, "rule tag", token))?;
    if value.is_empty() {
        return Err(GrammarError::new(0, format!("value for `{}`", key), token));
    }
    match key {
        "exception-to" if is_identifier(value) => Ok(RuleTag::ExceptionTo(value.to_string())),
        "exception-to" => Err(GrammarError::new(0, "rule name", value)),
        "reasoning" => Ok(RuleTag::Reasoning(value.to_string())),
        "status" => Ok(RuleTag::Status(value.to_string())),
        "todo" => Ok(RuleTag::Todo(value.to_string())),
        _ => Err(GrammarError::new(0, "rule tag", token)),
    }
}

const SYMBOL_OPS: &[(&str, AssertOp)] = &[
    ("==", AssertOp::Eq),
    ("!=", AssertOp::Ne),
    (">=", AssertOp::Ge),
    ("<=", AssertOp::Le),
    (">", AssertOp::Gt),
    ("<", AssertOp::Lt),
];

const WORD_OPS: &[(&str, AssertOp)] = &[
    (" contains ", AssertOp::Contains),
    (" matches ", AssertOp::Matches),
    (" is ", AssertOp::Is),
];

/// Parse a `Then:` assertion into subject, operator and expected value.
///
/// The earliest operator outside quotes and brackets wins; among symbolic
/// operators starting at the same position the two-character form wins.
pub fn parse_assertion(text: &str) -> GrammarResult<Assertion> {
    let mut best: Option<(usize, usize, AssertOp)> = None;

    for (symbol, op) in SYMBOL_OPS.iter().chain(WORD_OPS.iter()) {
        if let Some(at) = find_top_level(text, symbol) {
            let better = match best {
                None => true,
                Some((best_at, best_len, _)) => at < best_at || (at == best_at && symbol.len() > best_len),
            };
            if better {
                best = Some((at, symbol.len(), *op));
            }
        }
    }

    let (at, len, operator) =
        best.ok_or_else(|| GrammarError::new(0, "assertion `subject <op> expected`", text))?;
    let subject = text[..at].trim();
    let expected = text[at + len..].trim();
    if subject.is_empty() {
        return Err(GrammarError::new(0, "assertion subject", text));
    }
    if expected.is_empty() {
        return Err(GrammarError::new(at + len, "expected value", text));
    }

    Ok(Assertion {
        subject: subject.to_string(),
        operator,
        expected: expected.to_string(),
    })
}

/// Split a comma-separated name list, dropping empty entries.
pub fn parse_name_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_field() {
        let field = parse_field_line("id: UUID (required, immutable)").unwrap();
        assert_eq!(field.name, "id");
        assert_eq!(field.ty, TypeRef::named("UUID"));
        assert_eq!(field.constraints, vec![Constraint::Required, Constraint::Immutable]);
        assert!(field.description.is_none());
    }

    #[test]
    fn test_parse_field_with_list_and_description() {
        let field = parse_field_line("tags: List<String> (optional, max:10) // free tags").unwrap();
        assert_eq!(field.ty.to_string(), "List<String>");
        assert_eq!(field.constraints[1], Constraint::Max("10".into()));
        assert_eq!(field.description.as_deref(), Some("free tags"));
    }

    #[test]
    fn test_commas_inside_brackets_do_not_split() {
        let field =
            parse_field_line("code: String (format:[A-Z]{2,3}, conditional:inList(a, b))").unwrap();
        assert_eq!(field.constraints.len(), 2);
        assert_eq!(field.constraints[0], Constraint::Format("[A-Z]{2,3}".into()));
        assert_eq!(field.constraints[1], Constraint::Conditional("inList(a, b)".into()));
    }

    #[test]
    fn test_url_format_is_not_a_description() {
        let field = parse_field_line("site: URL (format:\"https://x\")").unwrap();
        assert_eq!(field.constraints[0], Constraint::Format("\"https://x\"".into()));
    }

    #[test]
    fn test_references_constraint() {
        let field = parse_field_line("ownerId: UUID (references:User.id)").unwrap();
        assert_eq!(
            field.constraints[0],
            Constraint::References {
                entity: "User".into(),
                field: "id".into()
            }
        );
    }

    #[test]
    fn test_malformed_field_lines() {
        assert!(parse_field_line("id UUID").is_err());
        assert!(parse_field_line("id: UUID (required").is_err());
        assert!(parse_field_line("id: UUID (required) extra").is_err());
        assert!(parse_field_line("id: UUID (mandatory)").is_err());
        assert!(parse_field_line("id: (required)").is_err());
        assert!(parse_field_line("count: Int (min:abc)").is_err());
        assert!(parse_field_line("id: UUID (required,)").is_err());
    }

    #[test]
    fn test_error_position_points_at_token() {
        let err = parse_field_line("id: UUID (required, bogus)").unwrap_err();
        assert_eq!(err.position, 20);
        assert_eq!(err.found, "bogus");
    }

    #[test]
    fn test_parse_custom() {
        let custom = parse_custom("fraud_check (before, contract:check(order: Order, user: User) -> bool)").unwrap();
        assert_eq!(custom.name, "fraud_check");
        assert_eq!(custom.hook, HookType::Before);
        assert_eq!(
            custom.contract.as_deref(),
            Some("check(order: Order, user: User) -> bool")
        );
        assert!(parse_custom("x (sideways)").is_err());
    }

    #[test]
    fn test_parse_assertion() {
        let a = parse_assertion("response.status == 201").unwrap();
        assert_eq!(a.subject, "response.status");
        assert_eq!(a.operator, AssertOp::Eq);
        assert_eq!(a.expected, "201");

        let b = parse_assertion("order.total >= 10").unwrap();
        assert_eq!(b.operator, AssertOp::Ge);

        let c = parse_assertion("result.items contains \"a == b\"").unwrap();
        assert_eq!(c.operator, AssertOp::Contains);
        assert_eq!(c.expected, "\"a == b\"");

        assert!(parse_assertion("just words").is_err());
    }

    #[test]
    fn test_rule_tags() {
        assert_eq!(parse_rule_tag("critical").unwrap(), RuleTag::Critical);
        assert_eq!(
            parse_rule_tag("exception-to:BaseRule").unwrap(),
            RuleTag::ExceptionTo("BaseRule".into())
        );
        assert!(parse_rule_tag("urgent").is_err());
    }
}
