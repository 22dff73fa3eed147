//! Compiles route-pattern strings (`/tabs/by-id/#TAB_ID/url.txt`) into
//! anchored matchers that bind typed path variables.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;

/// A value bound from a path variable, typed by the wildcard sigil that
/// declared it (`#` => integer, `:` => string).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Binding {
    Int(u64),
    Str(String),
}

impl Binding {
    pub fn as_int(&self) -> Option<u64> {
        match self {
            Binding::Int(v) => Some(*v),
            Binding::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Binding::Int(_) => unreachable!("integer bindings are read via as_int"),
            Binding::Str(s) => s,
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Int(v) => write!(f, "{v}"),
            Binding::Str(s) => write!(f, "{s}"),
        }
    }
}

/// Bindings extracted from a matched path, keyed by their canonicalized
/// camelCase name.
pub type Bindings = HashMap<String, Binding>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Sigil {
    Int,
    Str,
}

/// A compiled route pattern: a regex plus the ordered list of (sigil, name)
/// pairs for each capture group, in the order the regex emits them.
#[derive(Clone, Debug)]
pub struct Matcher {
    regex: Regex,
    vars: Vec<(Sigil, String)>,
}

impl Matcher {
    /// Compiles `pattern` into an anchored matcher.
    ///
    /// Malformed patterns (an unterminated wildcard, an empty segment) are a
    /// programming error on the route author's part, not a runtime
    /// condition: this panics rather than returning a `Result`, mirroring
    /// how the rest of the route catalog is assembled once at startup.
    pub fn compile(pattern: &str) -> Self {
        let mut vars = Vec::new();
        let mut regex_src = String::from("^");

        let segments: Vec<&str> = pattern.split('/').collect();
        for (i, segment) in segments.iter().enumerate() {
            if i > 0 {
                regex_src.push('/');
            }
            if let Some(name) = segment.strip_prefix('#') {
                assert!(!name.is_empty(), "empty wildcard name in pattern {pattern:?}");
                vars.push((Sigil::Int, canonicalize(name)));
                regex_src.push_str("([0-9]+)");
            } else if let Some(name) = segment.strip_prefix(':') {
                assert!(!name.is_empty(), "empty wildcard name in pattern {pattern:?}");
                vars.push((Sigil::Str, canonicalize(name)));
                regex_src.push_str("([^/]+)");
            } else {
                regex_src.push_str(&regex::escape(segment));
            }
        }
        regex_src.push('$');

        let regex = Regex::new(&regex_src)
            .unwrap_or_else(|e| panic!("pattern {pattern:?} compiled to invalid regex: {e}"));

        Self { regex, vars }
    }

    /// Attempts to match `path` against this pattern. Returns `None` if it
    /// doesn't match; otherwise the typed bindings, keyed by canonicalized
    /// name.
    pub fn try_match(&self, path: &str) -> Option<Bindings> {
        let captures = self.regex.captures(path)?;
        let mut bindings = Bindings::new();
        for (i, (sigil, name)) in self.vars.iter().enumerate() {
            let raw = captures.get(i + 1).expect("capture group must exist").as_str();
            let value = match sigil {
                // The regex only ever matches `[0-9]+` into this group, so
                // the parse is infallible.
                Sigil::Int => Binding::Int(raw.parse().expect("digits-only capture")),
                Sigil::Str => Binding::Str(raw.to_string()),
            };
            bindings.insert(name.clone(), value);
        }
        Some(bindings)
    }
}

/// `TAB_ID` -> `tabId`: lowercase, then remove each underscore by
/// uppercasing the letter that follows it.
fn canonicalize(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper_next = false;
    for (i, c) in snake.to_ascii_lowercase().chars().enumerate() {
        if c == '_' {
            upper_next = true;
            continue;
        }
        if i == 0 {
            out.push(c);
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_and_binds_integer_variable() {
        let m = Matcher::compile("/tabs/by-id/#TAB_ID/url.txt");
        let bindings = m.try_match("/tabs/by-id/42/url.txt").expect("should match");
        assert_eq!(bindings.get("tabId"), Some(&Binding::Int(42)));
    }

    #[test]
    fn rejects_non_digit_in_integer_segment() {
        let m = Matcher::compile("/tabs/by-id/#TAB_ID/url.txt");
        assert!(m.try_match("/tabs/by-id/abc/url.txt").is_none());
    }

    #[test]
    fn string_wildcard_matches_any_non_slash_run() {
        let m = Matcher::compile("/tabs/by-id/#TAB_ID/watches/:EXPR");
        let bindings = m
            .try_match("/tabs/by-id/1/watches/document.title")
            .expect("should match");
        assert_eq!(
            bindings.get("expr"),
            Some(&Binding::Str("document.title".to_string()))
        );
    }

    #[test]
    fn string_wildcard_does_not_cross_slash() {
        let m = Matcher::compile("/tabs/by-id/#TAB_ID/watches/:EXPR");
        assert!(m.try_match("/tabs/by-id/1/watches/a/b").is_none());
    }

    #[test]
    fn literal_segments_are_escaped() {
        let m = Matcher::compile("/runtime/background.js");
        assert!(m.try_match("/runtime/backgroundXjs").is_none());
        assert!(m.try_match("/runtime/background.js").is_some());
    }

    #[rstest::rstest]
    #[case("TAB_ID", "tabId")]
    #[case("SCRIPT_ID", "scriptId")]
    #[case("A_B_C", "aBC")]
    #[case("WINDOW_ID", "windowId")]
    #[case("EXPR", "expr")]
    fn canonicalizes_multi_word_names(#[case] snake: &str, #[case] expected: &str) {
        assert_eq!(canonicalize(snake), expected);
    }

    #[rstest::rstest]
    #[case("/tabs/by-id/#TAB_ID/url.txt", "/tabs/by-id/42/url.txt", "tabId")]
    #[case("/windows/by-id/#WINDOW_ID/state.txt", "/windows/by-id/7/state.txt", "windowId")]
    fn compiles_and_binds_integer_variable_table(
        #[case] pattern: &str,
        #[case] path: &str,
        #[case] var: &str,
    ) {
        let m = Matcher::compile(pattern);
        assert!(m.try_match(path).expect("should match").contains_key(var));
    }
}
