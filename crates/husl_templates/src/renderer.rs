//! Template rendering.
//!
//! Templates use `{{variable}}` placeholders. A line holding nothing but one
//! placeholder is a block line: a multi-line value is indented to the
//! placeholder's column, and an empty value removes the line entirely.

use std::collections::HashMap;

use regex::Regex;

/// Variables available to a template.
pub type TemplateVars = HashMap<String, String>;

/// Template renderer for `{{var}}` templates.
pub struct TemplateRenderer {
    variable_pattern: Regex,
    block_pattern: Regex,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    /// Create a new template renderer.
    pub fn new() -> Self {
        Self {
            // Match {{variable_name}} pattern
            variable_pattern: Regex::new(r"\{\{([a-zA-Z_][a-zA-Z0-9_]*)\}\}").unwrap(),
            block_pattern: Regex::new(r"^([ \t]*)\{\{([a-zA-Z_][a-zA-Z0-9_]*)\}\}[ \t]*$").unwrap(),
        }
    }

    /// Render a template. Unknown variables are left in place.
    pub fn render(&self, template: &str, variables: &TemplateVars) -> String {
        let mut lines = Vec::new();

        for line in template.split('\n') {
            if let Some(caps) = self.block_pattern.captures(line) {
                if let Some(value) = variables.get(&caps[2]) {
                    let indent = &caps[1];
                    if value.is_empty() {
                        continue;
                    }
                    for value_line in value.split('\n') {
                        if value_line.is_empty() {
                            lines.push(String::new());
                        } else {
                            lines.push(format!("{}{}", indent, value_line));
                        }
                    }
                    continue;
                }
            }
            lines.push(self.render_content(line, variables));
        }

        lines.join("\n")
    }

    /// Replace variables inline, without block-line handling.
    pub fn render_content(&self, content: &str, variables: &TemplateVars) -> String {
        self.variable_pattern
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                variables
                    .get(var_name)
                    .cloned()
                    .unwrap_or_else(|| format!("{{{{{}}}}}", var_name))
            })
            .to_string()
    }

    /// Variables left unresolved after rendering with the given set.
    pub fn unresolved(&self, template: &str, variables: &TemplateVars) -> Vec<String> {
        let mut names: Vec<String> = self
            .variable_pattern
            .captures_iter(template)
            .map(|caps| caps[1].to_string())
            .filter(|name| !variables.contains_key(name))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Convert to snake_case.
    pub fn to_snake_case(&self, s: &str) -> String {
        split_words(s).join("_")
    }

    /// Convert to kebab-case.
    pub fn to_kebab_case(&self, s: &str) -> String {
        split_words(s).join("-")
    }

    /// Convert to PascalCase.
    pub fn to_pascal_case(&self, s: &str) -> String {
        split_words(s).iter().map(|w| capitalize(w)).collect()
    }

    /// Convert to camelCase.
    pub fn to_camel_case(&self, s: &str) -> String {
        split_words(s)
            .iter()
            .enumerate()
            .map(|(i, w)| if i == 0 { w.clone() } else { capitalize(w) })
            .collect()
    }

    /// Insert the standard name variables for `name`, with an optional prefix.
    pub fn insert_name_variables(&self, vars: &mut TemplateVars, prefix: &str, name: &str) {
        let key = |suffix: &str| {
            if prefix.is_empty() {
                format!("name{}", suffix)
            } else {
                format!("{}_name{}", prefix, suffix)
            }
        };
        vars.insert(key(""), name.to_string());
        vars.insert(key("_snake"), self.to_snake_case(name));
        vars.insert(key("_kebab"), self.to_kebab_case(name));
        vars.insert(key("_camel"), self.to_camel_case(name));
        vars.insert(key("_pascal"), self.to_pascal_case(name));
    }
}

/// Split an identifier into lowercase words on case changes and separators.
fn split_words(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c == '-' || c == '_' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            // "widgetId" and the "Server" in "HTTPServer" start new words.
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> TemplateVars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_content() {
        let renderer = TemplateRenderer::new();
        let vars = vars(&[("name", "Widget"), ("ext", "ts")]);
        assert_eq!(renderer.render_content("src/{{name}}.{{ext}}", &vars), "src/Widget.ts");
        assert_eq!(renderer.render_content("{{missing}}", &vars), "{{missing}}");
    }

    #[test]
    fn test_block_lines_are_indented() {
        let renderer = TemplateRenderer::new();
        let vars = vars(&[("fields", "id: string;\nname: string;"), ("name", "Widget")]);
        let rendered = renderer.render("interface {{name}} {\n  {{fields}}\n}", &vars);
        assert_eq!(rendered, "interface Widget {\n  id: string;\n  name: string;\n}");
    }

    #[test]
    fn test_empty_block_removes_line() {
        let renderer = TemplateRenderer::new();
        let vars = vars(&[("before", ""), ("name", "x")]);
        assert_eq!(renderer.render("{{before}}\nrun {{name}}\n", &vars), "run x\n");
    }

    #[test]
    fn test_unresolved() {
        let renderer = TemplateRenderer::new();
        let vars = vars(&[("name", "x")]);
        assert_eq!(renderer.unresolved("{{name}} {{a}} {{a}} {{b}}", &vars), vec!["a", "b"]);
    }

    #[test]
    fn test_case_conversions() {
        let renderer = TemplateRenderer::new();
        assert_eq!(renderer.to_snake_case("GetWidget"), "get_widget");
        assert_eq!(renderer.to_snake_case("HTTPServer"), "http_server");
        assert_eq!(renderer.to_kebab_case("LineItem"), "line-item");
        assert_eq!(renderer.to_camel_case("GetWidget"), "getWidget");
        assert_eq!(renderer.to_pascal_case("line_item"), "LineItem");
        assert_eq!(renderer.to_pascal_case("customerId"), "CustomerId");
    }
}
