//! Identifier scanning inside free-text literals (rule clauses, test
//! bindings and assertions, error conditions).
//!
//! Quoted strings are skipped. Every identifier is visited exactly once, so
//! a rewrite never sees its own output.

/// An identifier occurrence with its syntactic neighbourhood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentToken<'a> {
    pub ident: &'a str,
    /// The identifier directly before a `.` preceding this one (`Enum` in `Enum.VALUE`).
    pub qualifier: Option<&'a str>,
    /// Whether the identifier is a member access (`.field`).
    pub member: bool,
    /// Whether the identifier is followed by `(`.
    pub call: bool,
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Visit every identifier outside quoted strings.
pub fn scan_identifiers<'a, F>(text: &'a str, mut visit: F)
where
    F: FnMut(&IdentToken<'a>),
{
    rewrite_identifiers(text, |token| {
        visit(token);
        None
    });
}

/// Rebuild `text`, replacing each identifier for which `rewrite` returns a
/// replacement.
pub fn rewrite_identifiers<'a, F>(text: &'a str, mut rewrite: F) -> String
where
    F: FnMut(&IdentToken<'a>) -> Option<String>,
{
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut i = 0;
    let mut pending_qualifier: Option<&'a str> = None;
    let mut in_quote = false;

    while i < bytes.len() {
        let b = bytes[i];
        if in_quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == b'"' {
                in_quote = false;
            }
            i += 1;
            continue;
        }
        if b == b'"' {
            in_quote = true;
            pending_qualifier = None;
            i += 1;
            continue;
        }
        // Suffixes of numeric literals such as `10ms` are not identifiers.
        let glued_to_number = i > 0 && is_ident_continue(bytes[i - 1]);
        if is_ident_start(b) && !glued_to_number {
            let start = i;
            while i < bytes.len() && is_ident_continue(bytes[i]) {
                i += 1;
            }
            let ident = &text[start..i];
            let member = start > 0 && bytes[start - 1] == b'.';
            let rest = &text[i..];
            let token = IdentToken {
                ident,
                qualifier: if member { pending_qualifier } else { None },
                member,
                call: rest.trim_start().starts_with('('),
            };
            if let Some(replacement) = rewrite(&token) {
                out.push_str(&text[copied..start]);
                out.push_str(&replacement);
                copied = i;
            }
            pending_qualifier = if rest.starts_with('.') { Some(ident) } else { None };
            continue;
        }
        if b != b'.' {
            pending_qualifier = None;
        }
        i += 1;
    }

    out.push_str(&text[copied..]);
    out
}

/// Every `Qualifier.member` pair in the text, e.g. enum literals.
pub fn qualified_pairs(text: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    scan_identifiers(text, |token| {
        if let Some(qualifier) = token.qualifier {
            pairs.push((qualifier.to_string(), token.ident.to_string()));
        }
    });
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_pairs() {
        let pairs = qualified_pairs("order.status == OrderStatus.PENDING && x > 1");
        assert_eq!(
            pairs,
            vec![
                ("order".to_string(), "status".to_string()),
                ("OrderStatus".to_string(), "PENDING".to_string())
            ]
        );
    }

    #[test]
    fn test_quoted_text_is_skipped() {
        let pairs = qualified_pairs("msg == \"Status.DONE\"");
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_rewrite_is_single_pass() {
        // A -> B and B -> C must not chain.
        let out = rewrite_identifiers("A + B", |t| match t.ident {
            "A" => Some("B".to_string()),
            "B" => Some("C".to_string()),
            _ => None,
        });
        assert_eq!(out, "B + C");
    }

    #[test]
    fn test_member_and_call_context() {
        let mut seen = Vec::new();
        scan_identifiers("GetWidget(w.notes)", |t| seen.push((t.ident, t.member, t.call)));
        assert_eq!(
            seen,
            vec![("GetWidget", false, true), ("w", false, false), ("notes", true, false)]
        );
    }

    #[test]
    fn test_rewrite_member_access() {
        let out = rewrite_identifiers("widget.notes != \"notes\"", |t| {
            if t.member && t.ident == "notes" {
                Some("remarks".to_string())
            } else {
                None
            }
        });
        assert_eq!(out, "widget.remarks != \"notes\"");
    }
}
