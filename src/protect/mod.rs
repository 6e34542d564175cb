//! Placeholder substitution for content the Markdown renderer must not see.
//!
//! Math and diagram regions are lifted out of the source before rendering
//! and replaced with opaque text tokens (`MATH_BLOCK_0`, `DIAGRAM_2`, ...).
//! After the Markdown pass the tokens are substituted back exactly once
//! with rendered HTML. Token text still visible after substitution (a
//! duplicate spelling the renderer produced, or a boundary-skipped
//! occurrence) is counted and logged, never fatal.

use log::warn;
use memchr::memmem;

/// The kind of protected region a token stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    MathBlock,
    MathInline,
    MathEnv,
    Diagram,
}

impl Kind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Kind::MathBlock => "MATH_BLOCK",
            Kind::MathInline => "MATH_INLINE",
            Kind::MathEnv => "MATH_ENV",
            Kind::Diagram => "DIAGRAM",
        }
    }

    pub const ALL: [Kind; 4] = [Kind::MathBlock, Kind::MathInline, Kind::MathEnv, Kind::Diagram];
}

/// One protected region: the token standing in for it and its raw source.
#[derive(Debug, Clone)]
pub struct Protected {
    pub token: String,
    pub kind: Kind,
    pub source: String,
}

/// Collects protected regions during extraction, each kind numbered
/// independently from zero.
#[derive(Debug, Default)]
pub struct Vault {
    entries: Vec<Protected>,
    counters: [usize; 4],
}

impl Vault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a protected region and return its token.
    pub fn protect(&mut self, kind: Kind, source: &str) -> String {
        let idx = match kind {
            Kind::MathBlock => 0,
            Kind::MathInline => 1,
            Kind::MathEnv => 2,
            Kind::Diagram => 3,
        };
        let ordinal = self.counters[idx];
        self.counters[idx] += 1;

        let token = format!("{}_{}", kind.prefix(), ordinal);
        self.entries.push(Protected {
            token: token.clone(),
            kind,
            source: source.to_string(),
        });
        token
    }

    pub fn entries(&self) -> &[Protected] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Substitute every token exactly once using `render` for the HTML.
    ///
    /// Returns the restored text and the number of tokens whose text is
    /// still visible in it afterwards. A token absent from `text` in the
    /// first place (its region never made it into this run's output) is
    /// not an error and not counted.
    pub fn restore<F>(&self, text: &str, mut render: F) -> (String, usize)
    where
        F: FnMut(&Protected) -> String,
    {
        let mut out = text.to_string();

        for entry in &self.entries {
            let html = render(entry);
            if let Some(replaced) = replace_token_once(&out, &entry.token, &html) {
                out = replaced;
            }
        }

        let mut unresolved = 0;
        for entry in &self.entries {
            if find_token(&out, &entry.token).is_some() {
                unresolved += 1;
                warn!("placeholder token {} leaked into the output", entry.token);
            }
        }

        (out, unresolved)
    }
}

/// Find the first occurrence of `token` that is not followed by another
/// digit. The boundary check keeps `MATH_BLOCK_1` from matching inside
/// `MATH_BLOCK_10`.
fn find_token(haystack: &str, token: &str) -> Option<usize> {
    let finder = memmem::Finder::new(token.as_bytes());
    let bytes = haystack.as_bytes();
    let mut offset = 0;

    while let Some(pos) = finder.find(&bytes[offset..]) {
        let start = offset + pos;
        let end = start + token.len();
        let followed_by_digit = bytes.get(end).is_some_and(|b| b.is_ascii_digit());
        if !followed_by_digit {
            return Some(start);
        }
        offset = end;
    }
    None
}

/// Replace the first boundary-respecting occurrence of `token`.
fn replace_token_once(haystack: &str, token: &str, replacement: &str) -> Option<String> {
    let start = find_token(haystack, token)?;
    let end = start + token.len();
    let mut out = String::with_capacity(haystack.len() + replacement.len());
    out.push_str(&haystack[..start]);
    out.push_str(replacement);
    out.push_str(&haystack[end..]);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_kind_ordinals() {
        let mut vault = Vault::new();
        assert_eq!(vault.protect(Kind::MathBlock, "x"), "MATH_BLOCK_0");
        assert_eq!(vault.protect(Kind::MathInline, "y"), "MATH_INLINE_0");
        assert_eq!(vault.protect(Kind::MathBlock, "z"), "MATH_BLOCK_1");
        assert_eq!(vault.protect(Kind::Diagram, "graph"), "DIAGRAM_0");
    }

    #[test]
    fn test_restore_exactly_once() {
        let mut vault = Vault::new();
        let t0 = vault.protect(Kind::MathInline, "a");
        let t1 = vault.protect(Kind::MathInline, "b");

        let text = format!("<p>{t0} and {t1}</p>");
        let (out, unresolved) = vault.restore(&text, |p| format!("[{}]", p.source));
        assert_eq!(out, "<p>[a] and [b]</p>");
        assert_eq!(unresolved, 0);
    }

    #[test]
    fn test_digit_boundary() {
        let mut vault = Vault::new();
        let mut tokens = Vec::new();
        for i in 0..11 {
            tokens.push(vault.protect(Kind::MathBlock, &format!("f{i}")));
        }

        // Token 1 must not be substituted inside token 10.
        let text = format!("{} then {}", tokens[10], tokens[1]);
        let (out, unresolved) = vault.restore(&text, |p| format!("<{}>", p.source));
        assert_eq!(out, "<f10> then <f1>");
        assert_eq!(unresolved, 0);
    }

    #[test]
    fn test_absent_token_not_counted() {
        let mut vault = Vault::new();
        let t0 = vault.protect(Kind::MathInline, "a");
        let _t1 = vault.protect(Kind::MathInline, "b");

        // Only the first token made it into this text.
        let text = format!("<p>{t0}</p>");
        let (out, unresolved) = vault.restore(&text, |p| p.source.clone());
        assert_eq!(out, "<p>a</p>");
        assert_eq!(unresolved, 0);
    }

    #[test]
    fn test_split_token_passes_through() {
        let mut vault = Vault::new();
        let _t = vault.protect(Kind::MathInline, "x^2");

        // Renderer split the token with an emphasis span; it is left
        // untouched rather than part-substituted.
        let text = "<p>MATH<em>_</em>INLINE_0</p>";
        let (out, unresolved) = vault.restore(text, |p| p.source.clone());
        assert_eq!(out, text);
        assert_eq!(unresolved, 0);
    }

    #[test]
    fn test_leftover_token_text_counted() {
        let mut vault = Vault::new();
        let t = vault.protect(Kind::Diagram, "pie");
        let text = format!("{t} {t}");
        let (out, unresolved) = vault.restore(&text, |_| "X".to_string());
        assert_eq!(out, format!("X {t}"));
        assert_eq!(unresolved, 1);
    }
}
