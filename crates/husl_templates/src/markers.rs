//! Custom region marker syntax and contract fingerprints.
//!
//! A region is delimited by a start line and an end line:
//!
//! ```text
//! // HUSL-CUSTOM-BEGIN fraud_check hook=before contract=1f0c3e9a7b2d4c11
//! // HUSL-CUSTOM-END fraud_check
//! ```
//!
//! Only the tokens are significant when reading, so any comment wrapping
//! the stack configuration chooses is tolerated.

use sha2::{Digest, Sha256};

use husl_spec::HookType;

use crate::config::StackConfig;

/// Length of a contract fingerprint in hex digits.
pub const FINGERPRINT_LEN: usize = 16;

/// Fingerprint of a region's declared hook type and contract.
pub fn contract_fingerprint(hook: HookType, contract: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(hook.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(contract.unwrap_or_default().trim().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..FINGERPRINT_LEN].to_string()
}

/// A recognized marker line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerLine {
    Start {
        name: String,
        hook: Option<HookType>,
        fingerprint: Option<String>,
    },
    End {
        name: String,
    },
    /// A token was found but no region name follows it.
    Malformed,
}

/// Marker tokens plus the comment wrapping used when writing them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerSyntax {
    pub start_token: String,
    pub end_token: String,
    pub comment_prefix: String,
    pub comment_suffix: String,
}

impl MarkerSyntax {
    pub fn from_config(config: &StackConfig) -> Self {
        Self {
            start_token: config.markers.start_token.trim().to_string(),
            end_token: config.markers.end_token.trim().to_string(),
            comment_prefix: config.comment_prefix.clone(),
            comment_suffix: config.comment_suffix.clone(),
        }
    }

    /// Wrap text in the configured comment syntax.
    pub fn comment(&self, text: &str) -> String {
        if self.comment_prefix.is_empty() {
            format!("{}{}", text, self.comment_suffix)
        } else {
            format!("{} {}{}", self.comment_prefix, text, self.comment_suffix)
        }
    }

    pub fn start_line(&self, name: &str, hook: HookType, fingerprint: &str) -> String {
        self.comment(&format!(
            "{} {} hook={} contract={}",
            self.start_token, name, hook, fingerprint
        ))
    }

    pub fn end_line(&self, name: &str) -> String {
        self.comment(&format!("{} {}", self.end_token, name))
    }

    /// Recognize a marker line. Lines without either token yield `None`.
    pub fn parse_line(&self, line: &str) -> Option<MarkerLine> {
        if let Some(rest) = after_token(line, &self.start_token) {
            let mut words = rest.split_whitespace();
            let Some(name) = words.next().and_then(region_name) else {
                return Some(MarkerLine::Malformed);
            };

            let mut hook = None;
            let mut fingerprint = None;
            for word in words {
                if let Some(value) = word.strip_prefix("hook=") {
                    let value: String = value.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
                    hook = HookType::parse(&value);
                } else if let Some(value) = word.strip_prefix("contract=") {
                    let value: String = value.chars().take_while(|c| c.is_ascii_hexdigit()).collect();
                    if !value.is_empty() {
                        fingerprint = Some(value);
                    }
                }
            }
            return Some(MarkerLine::Start {
                name,
                hook,
                fingerprint,
            });
        }

        if let Some(rest) = after_token(line, &self.end_token) {
            return Some(match rest.split_whitespace().next().and_then(region_name) {
                Some(name) => MarkerLine::End { name },
                None => MarkerLine::Malformed,
            });
        }

        None
    }
}

/// Text following the first occurrence of `token` that ends a word.
fn after_token<'a>(line: &'a str, token: &str) -> Option<&'a str> {
    line.match_indices(token)
        .map(|(index, _)| &line[index + token.len()..])
        .find(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
}

/// The leading region-name characters of a word.
fn region_name(word: &str) -> Option<String> {
    let name: String = word
        .chars()
        .take_while(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html() -> MarkerSyntax {
        MarkerSyntax {
            start_token: "HUSL-CUSTOM-BEGIN".into(),
            end_token: "HUSL-CUSTOM-END".into(),
            comment_prefix: "<!--".into(),
            comment_suffix: " -->".into(),
        }
    }

    #[test]
    fn test_fingerprint_tracks_hook_and_contract() {
        let a = contract_fingerprint(HookType::Before, Some("check(order: Order) -> bool"));
        let b = contract_fingerprint(HookType::Replace, Some("check(order: Order) -> bool"));
        let c = contract_fingerprint(HookType::Before, Some("check(order: Order) -> int"));
        assert_eq!(a.len(), FINGERPRINT_LEN);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, contract_fingerprint(HookType::Before, Some("check(order: Order) -> bool")));
    }

    #[test]
    fn test_marker_round_trip_with_wrapping() {
        let syntax = html();
        let fp = contract_fingerprint(HookType::After, None);
        let start = syntax.start_line("audit", HookType::After, &fp);
        assert_eq!(start, format!("<!-- HUSL-CUSTOM-BEGIN audit hook=after contract={} -->", fp));

        assert_eq!(
            syntax.parse_line(&format!("    {}", start)),
            Some(MarkerLine::Start {
                name: "audit".into(),
                hook: Some(HookType::After),
                fingerprint: Some(fp),
            })
        );
        assert_eq!(
            syntax.parse_line(&syntax.end_line("audit")),
            Some(MarkerLine::End { name: "audit".into() })
        );
    }

    #[test]
    fn test_tolerates_glued_suffix() {
        let syntax = html();
        let line = "/* HUSL-CUSTOM-BEGIN pricing hook=extend contract=abcdef0123456789*/";
        match syntax.parse_line(line) {
            Some(MarkerLine::Start { name, hook, fingerprint }) => {
                assert_eq!(name, "pricing");
                assert_eq!(hook, Some(HookType::Extend));
                assert_eq!(fingerprint.as_deref(), Some("abcdef0123456789"));
            }
            other => panic!("unexpected marker: {:?}", other),
        }
    }

    #[test]
    fn test_non_marker_lines() {
        let syntax = html();
        assert_eq!(syntax.parse_line("const x = 1;"), None);
        assert_eq!(syntax.parse_line("// HUSL-CUSTOM-BEGINNING"), None);
        assert_eq!(syntax.parse_line("// HUSL-CUSTOM-BEGIN"), Some(MarkerLine::Malformed));
    }

    #[test]
    fn test_marker_after_prefix_sharing_word() {
        let syntax = html();
        let line = "// see HUSL-CUSTOM-BEGINNING; HUSL-CUSTOM-BEGIN audit hook=after contract=0123456789abcdef";
        assert_eq!(
            syntax.parse_line(line),
            Some(MarkerLine::Start {
                name: "audit".into(),
                hook: Some(HookType::After),
                fingerprint: Some("0123456789abcdef".into()),
            })
        );
        assert_eq!(
            syntax.parse_line("// HUSL-CUSTOM-ENDING HUSL-CUSTOM-END audit"),
            Some(MarkerLine::End { name: "audit".into() })
        );
    }
}
