//! CSS rule parsing and specificity.
//!
//! Declaration values are kept as raw strings rather than typed values:
//! the adaptation engine re-emits them into `style` attributes, so the
//! original spelling must survive. Lenient recovery throughout; a rule or
//! declaration that fails to parse is dropped, never fatal.

use std::cmp::Ordering;

use cssparser::{
    AtRuleParser, DeclarationParser, ParseError, Parser, ParserInput, QualifiedRuleParser,
    RuleBodyItemParser, RuleBodyParser, StyleSheetParser,
};
use selectors::parser::Selector;

use crate::dom::WeimarkSelectors;

/// Pseudo-element position for `::before`/`::after` rules.
///
/// The selector machinery never parses pseudo-elements; the suffix is
/// stripped from the selector text up front and the kind recorded here, so
/// the base selector still matches real elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoKind {
    Before,
    After,
}

/// A parsed CSS stylesheet.
#[derive(Debug, Default, Clone)]
pub struct Stylesheet {
    pub rules: Vec<CssRule>,
}

/// A CSS rule with selectors and declarations.
#[derive(Debug, Clone)]
pub struct CssRule {
    pub selectors: Vec<Selector<WeimarkSelectors>>,
    /// Original selector text with any pseudo-element suffix removed.
    pub selector_text: String,
    pub declarations: Vec<Declaration>,
    pub specificity: Specificity,
    pub pseudo: Option<PseudoKind>,
}

/// A CSS declaration (property: value) with the value kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
    pub important: bool,
}

/// CSS specificity for cascade ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Specificity {
    pub ids: u16,
    pub classes: u16,
    pub elements: u16,
}

impl Specificity {
    pub fn from_selector(selector: &Selector<WeimarkSelectors>) -> Self {
        let spec = selector.specificity();
        // selectors crate packs specificity as (id << 20) | (class << 10) | elements
        Self {
            ids: ((spec >> 20) & 0x3FF) as u16,
            classes: ((spec >> 10) & 0x3FF) as u16,
            elements: (spec & 0x3FF) as u16,
        }
    }
}

impl Ord for Specificity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ids
            .cmp(&other.ids)
            .then(self.classes.cmp(&other.classes))
            .then(self.elements.cmp(&other.elements))
    }
}

impl PartialOrd for Specificity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Stylesheet {
    /// Parse a CSS stylesheet from a string.
    pub fn parse(css: &str) -> Self {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let mut rules = Vec::new();

        let mut rule_parser = TopLevelRuleParser { rules: &mut rules };
        let stylesheet_parser = StyleSheetParser::new(&mut parser, &mut rule_parser);

        for result in stylesheet_parser {
            // Ignore errors - lenient parsing
            let _ = result;
        }

        Self { rules }
    }

    /// Build a stylesheet from (selector, declaration-block) pairs, as
    /// stored in template definitions.
    pub fn from_selector_styles<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let css: String = pairs
            .into_iter()
            .map(|(sel, decls)| format!("{sel} {{ {decls} }}\n"))
            .collect();
        Self::parse(&css)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules carrying a `::before`/`::after` pseudo-element.
    pub fn pseudo_rules(&self) -> impl Iterator<Item = &CssRule> {
        self.rules.iter().filter(|r| r.pseudo.is_some())
    }
}

/// Parse a declaration block (the inside of `{ ... }`) into declarations.
pub fn parse_declaration_block(block: &str) -> Vec<Declaration> {
    let mut input = ParserInput::new(block);
    let mut parser = Parser::new(&mut input);
    let mut declarations = Vec::new();
    let mut decl_parser = DeclarationListParser {
        declarations: &mut declarations,
    };
    for result in RuleBodyParser::new(&mut parser, &mut decl_parser) {
        let _ = result;
    }
    declarations
}

/// Parse a single selector (pseudo-element suffix already stripped).
pub fn parse_selector_text(text: &str) -> Option<Vec<Selector<WeimarkSelectors>>> {
    let mut input = ParserInput::new(text);
    let mut parser = Parser::new(&mut input);
    selectors::parser::SelectorList::parse(
        &WeimarkSelectors,
        &mut parser,
        selectors::parser::ParseRelative::No,
    )
    .ok()
    .map(|list| list.slice().to_vec())
}

/// Split a pseudo-element suffix off a selector, if present.
fn strip_pseudo(selector: &str) -> (String, Option<PseudoKind>) {
    for (needle, kind) in [
        ("::before", PseudoKind::Before),
        ("::after", PseudoKind::After),
        (":before", PseudoKind::Before),
        (":after", PseudoKind::After),
    ] {
        if let Some(stripped) = selector.strip_suffix(needle) {
            return (stripped.trim().to_string(), Some(kind));
        }
    }
    (selector.trim().to_string(), None)
}

struct TopLevelRuleParser<'a> {
    rules: &'a mut Vec<CssRule>,
}

impl<'i> AtRuleParser<'i> for TopLevelRuleParser<'_> {
    type Prelude = ();
    type AtRule = ();
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        _name: cssparser::CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        // At-rules (media queries etc.) have no place in inline styles
        Err(input.new_custom_error(()))
    }

    fn parse_block<'t>(
        &mut self,
        _prelude: Self::Prelude,
        _start: &cssparser::ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::AtRule, ParseError<'i, Self::Error>> {
        Err(input.new_custom_error(()))
    }
}

impl<'i> QualifiedRuleParser<'i> for TopLevelRuleParser<'_> {
    type Prelude = (Vec<Selector<WeimarkSelectors>>, String, Option<PseudoKind>);
    type QualifiedRule = ();
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        // Capture the raw prelude text so the pseudo-element suffix can be
        // stripped before the selector list is parsed.
        let location = input.current_source_location();
        let start = input.position();
        while input.next().is_ok() {}
        let raw = input.slice_from(start).trim().to_string();

        let (base, pseudo) = strip_pseudo(&raw);
        if let Some(selectors) = parse_selector_text(&base) {
            return Ok((selectors, base, pseudo));
        }

        // Junk before the selector (e.g. a stray at-token ended by `;`)
        // lands in the same prelude; resynchronize on the last `;` so the
        // rule that follows still parses.
        if let Some(tail) = raw.rsplit(';').next()
            && tail.len() != raw.len()
        {
            let (base, pseudo) = strip_pseudo(tail);
            if let Some(selectors) = parse_selector_text(&base) {
                return Ok((selectors, base, pseudo));
            }
        }

        Err(location.new_custom_error(()))
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        _start: &cssparser::ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::QualifiedRule, ParseError<'i, Self::Error>> {
        let (selectors, selector_text, pseudo) = prelude;
        let specificity = selectors
            .first()
            .map(Specificity::from_selector)
            .unwrap_or_default();

        let mut declarations = Vec::new();
        let mut decl_parser = DeclarationListParser {
            declarations: &mut declarations,
        };

        for result in RuleBodyParser::new(input, &mut decl_parser) {
            // Ignore errors - lenient parsing
            let _ = result;
        }

        self.rules.push(CssRule {
            selectors,
            selector_text,
            declarations,
            specificity,
            pseudo,
        });

        Ok(())
    }
}

struct DeclarationListParser<'a> {
    declarations: &'a mut Vec<Declaration>,
}

impl<'i> AtRuleParser<'i> for DeclarationListParser<'_> {
    type Prelude = ();
    type AtRule = ();
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        _name: cssparser::CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        Err(input.new_custom_error(()))
    }

    fn parse_block<'t>(
        &mut self,
        _prelude: Self::Prelude,
        _start: &cssparser::ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::AtRule, ParseError<'i, Self::Error>> {
        Err(input.new_custom_error(()))
    }
}

impl<'i> QualifiedRuleParser<'i> for DeclarationListParser<'_> {
    type Prelude = ();
    type QualifiedRule = ();
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        Err(input.new_custom_error(()))
    }

    fn parse_block<'t>(
        &mut self,
        _prelude: Self::Prelude,
        _start: &cssparser::ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::QualifiedRule, ParseError<'i, Self::Error>> {
        Err(input.new_custom_error(()))
    }
}

impl<'i> DeclarationParser<'i> for DeclarationListParser<'_> {
    type Declaration = ();
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: cssparser::CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
        _start: &cssparser::ParserState,
    ) -> Result<Self::Declaration, ParseError<'i, Self::Error>> {
        let property = name.to_string().to_lowercase();

        // Capture the raw value verbatim; functions, lists, and units all
        // pass through unchanged.
        let start = input.position();
        while input.next().is_ok() {}
        let mut value = input.slice_from(start).trim().to_string();

        // The priority flag is a plain ASCII suffix; checking it in place
        // keeps byte offsets valid for values with multibyte characters.
        let mut important = false;
        let suffix = "!important";
        if value.len() >= suffix.len() {
            let idx = value.len() - suffix.len();
            if value.is_char_boundary(idx) && value[idx..].eq_ignore_ascii_case(suffix) {
                important = true;
                value.truncate(idx);
                let end = value.trim_end().len();
                value.truncate(end);
            }
        }

        if !value.is_empty() {
            self.declarations.push(Declaration {
                property,
                value,
                important,
            });
        }

        Ok(())
    }
}

impl<'i> RuleBodyItemParser<'i, (), ()> for DeclarationListParser<'_> {
    fn parse_declarations(&self) -> bool {
        true
    }
    fn parse_qualified(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_rule() {
        let css = "p { color: red; }";
        let stylesheet = Stylesheet::parse(css);

        assert_eq!(stylesheet.rules.len(), 1);
        let rule = &stylesheet.rules[0];
        assert_eq!(rule.selectors.len(), 1);
        assert_eq!(rule.declarations.len(), 1);
        assert_eq!(rule.declarations[0].property, "color");
        assert_eq!(rule.declarations[0].value, "red");
    }

    #[test]
    fn test_values_kept_verbatim() {
        let css = "div { font-family: -apple-system, 'PingFang SC', sans-serif; margin: 1em 0; }";
        let stylesheet = Stylesheet::parse(css);

        let decls = &stylesheet.rules[0].declarations;
        assert_eq!(decls[0].value, "-apple-system, 'PingFang SC', sans-serif");
        assert_eq!(decls[1].value, "1em 0");
    }

    #[test]
    fn test_important_flag() {
        let css = "p { color: red !important; font-size: 14px; }";
        let stylesheet = Stylesheet::parse(css);

        let decls = &stylesheet.rules[0].declarations;
        assert!(decls[0].important);
        assert_eq!(decls[0].value, "red");
        assert!(!decls[1].important);
    }

    #[test]
    fn test_pseudo_element_rule() {
        let css = "h2::before { content: '§'; color: #3498db; } h2 { color: #000; }";
        let stylesheet = Stylesheet::parse(css);

        assert_eq!(stylesheet.rules.len(), 2);
        assert_eq!(stylesheet.rules[0].pseudo, Some(PseudoKind::Before));
        assert_eq!(stylesheet.rules[0].selector_text, "h2");
        assert_eq!(stylesheet.rules[1].pseudo, None);
        assert_eq!(stylesheet.pseudo_rules().count(), 1);
    }

    #[test]
    fn test_function_values_survive() {
        let css = ".x { width: calc(100% - 20px); color: hsl(210, 50%, 40%); }";
        let stylesheet = Stylesheet::parse(css);

        let decls = &stylesheet.rules[0].declarations;
        assert_eq!(decls[0].value, "calc(100% - 20px)");
        assert_eq!(decls[1].value, "hsl(210, 50%, 40%)");
    }

    #[test]
    fn test_bad_rule_skipped() {
        let css = "p { color: red; } @@nonsense; div { margin: 0; }";
        let stylesheet = Stylesheet::parse(css);
        assert_eq!(stylesheet.rules.len(), 2);
        assert_eq!(stylesheet.rules[1].selector_text, "div");
        assert_eq!(stylesheet.rules[1].declarations[0].property, "margin");
    }

    #[test]
    fn test_important_uppercase_and_multibyte_value() {
        let css = "p { color: red !IMPORTANT; } h1 { content: 'İstanbul' !important; }";
        let stylesheet = Stylesheet::parse(css);

        let first = &stylesheet.rules[0].declarations[0];
        assert!(first.important);
        assert_eq!(first.value, "red");

        let second = &stylesheet.rules[1].declarations[0];
        assert!(second.important);
        assert_eq!(second.value, "'İstanbul'");
    }

    #[test]
    fn test_specificity_ordering() {
        let spec1 = Specificity {
            ids: 1,
            classes: 0,
            elements: 0,
        };
        let spec2 = Specificity {
            ids: 0,
            classes: 10,
            elements: 0,
        };
        let spec3 = Specificity {
            ids: 0,
            classes: 0,
            elements: 100,
        };

        assert!(spec1 > spec2);
        assert!(spec2 > spec3);
    }

    #[test]
    fn test_from_selector_styles() {
        let sheet = Stylesheet::from_selector_styles([
            ("h1", "font-size: 1.8em; color: #2c3e50"),
            ("blockquote", "border-left: 4px solid #3498db"),
        ]);
        assert_eq!(sheet.rules.len(), 2);
        assert_eq!(sheet.rules[0].selector_text, "h1");
    }
}
