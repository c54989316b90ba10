//! Naming convention checks.

use regex::Regex;

/// Naming conventions for document elements.
pub struct NamingRules {
    pascal: Regex,
    camel: Regex,
    upper_snake: Regex,
}

impl Default for NamingRules {
    fn default() -> Self {
        Self::new()
    }
}

impl NamingRules {
    pub fn new() -> Self {
        Self {
            pascal: Regex::new(r"^[A-Z][a-zA-Z0-9]*$").unwrap(),
            camel: Regex::new(r"^[a-z][a-zA-Z0-9]*$").unwrap(),
            upper_snake: Regex::new(r"^[A-Z][A-Z0-9]*(_[A-Z0-9]+)*$").unwrap(),
        }
    }

    /// Entities, enums, custom types, operations and state machines.
    pub fn is_pascal_case(&self, name: &str) -> bool {
        self.pascal.is_match(name)
    }

    /// Fields and parameters.
    pub fn is_camel_case(&self, name: &str) -> bool {
        self.camel.is_match(name)
    }

    /// Error codes.
    pub fn is_upper_snake_case(&self, name: &str) -> bool {
        self.upper_snake.is_match(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conventions() {
        let rules = NamingRules::new();
        assert!(rules.is_pascal_case("GetWidget"));
        assert!(!rules.is_pascal_case("get_widget"));
        assert!(rules.is_camel_case("ownerId"));
        assert!(!rules.is_camel_case("OwnerId"));
        assert!(!rules.is_camel_case("owner_id"));
        assert!(rules.is_upper_snake_case("WIDGET_NOT_FOUND"));
        assert!(rules.is_upper_snake_case("E42"));
        assert!(!rules.is_upper_snake_case("WidgetNotFound"));
        assert!(!rules.is_upper_snake_case("BAD__CODE"));
    }
}
