//! Deterministic downgrades for CSS features WeChat strips or ignores.
//!
//! Every transformation here is a pure value rewrite on a [`PropertyMap`];
//! the same input always yields the same output.

use regex::Regex;
use std::sync::OnceLock;

use super::property_map::PropertyMap;

/// Rough px-per-vh estimate. A pasted article has no viewport, so vh units
/// are converted with a fixed multiplier; the result is an approximation,
/// not a layout computation.
const VH_PX_ESTIMATE: f64 = 6.0;

/// Properties WeChat strips entirely; dropped rather than downgraded.
const UNSUPPORTED_PROPS: &[&str] = &[
    "backdrop-filter",
    "filter",
    "clip-path",
    "mask",
    "animation",
    "transition",
    "transform-origin",
    "perspective",
    "perspective-origin",
];

fn vw_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)vw").unwrap())
}

fn vh_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)vh").unwrap())
}

fn hsl_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"hsl\((\d+),\s*(\d+)%,\s*(\d+)%\)").unwrap())
}

fn simple_transform_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(scale|rotate|translate)\([^)]+\)$").unwrap())
}

/// Apply all fallbacks to the property map in place.
pub fn apply_css_fallbacks(styles: &mut PropertyMap) {
    if styles.get("display") == Some("flex") {
        styles.set("display", "block");
        styles.set("text-align", "left");
    }
    if styles.get("display") == Some("grid") {
        styles.set("display", "block");
    }

    let rewrites: Vec<(String, String)> = styles
        .iter()
        .filter_map(|(prop, value)| {
            let rewritten = rewrite_value(prop, value);
            if rewritten != value {
                Some((prop.to_string(), rewritten))
            } else {
                None
            }
        })
        .collect();
    for (prop, value) in rewrites {
        styles.set(&prop, &value);
    }

    if let Some(transform) = styles.get("transform").map(|v| v.to_string())
        && !simple_transform_re().is_match(&transform)
    {
        styles.remove("transform");
    }

    for prop in UNSUPPORTED_PROPS {
        styles.remove(prop);
    }
}

fn rewrite_value(prop: &str, value: &str) -> String {
    let mut value = value.to_string();

    if value.contains("vw") {
        value = vw_re().replace_all(&value, "$1%").into_owned();
    }
    if value.contains("vh") {
        value = vh_re()
            .replace_all(&value, |caps: &regex::Captures| {
                let num: f64 = caps[1].parse().unwrap_or(0.0);
                format!("{}px", format_number(num * VH_PX_ESTIMATE))
            })
            .into_owned();
    }
    if value.contains("calc(") {
        value = simplify_calc(&value);
    }
    if prop.contains("color") && value.starts_with("hsl(") {
        value = hsl_to_hex(&value);
    }

    value
}

/// Reduce a `calc()` expression to a plain value. Only pure numeric
/// expressions are evaluated (yielding px); anything with units or unknown
/// characters falls back to `100%`.
pub fn simplify_calc(value: &str) -> String {
    if let Some(expression) = extract_calc_body(value) {
        let expression = expression.trim();
        if expression
            .chars()
            .all(|c| c.is_ascii_digit() || " \t+-*/.()".contains(c))
            && let Some(result) = eval_arithmetic(expression)
        {
            return format!("{}px", format_number(result));
        }
    }
    "100%".to_string()
}

/// Extract the body of the first `calc(...)`, honoring nested parentheses.
fn extract_calc_body(value: &str) -> Option<&str> {
    let start = value.find("calc(")? + "calc(".len();
    let mut depth = 1usize;
    for (i, c) in value[start..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&value[start..start + i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn format_number(n: f64) -> String {
    if (n - n.round()).abs() < 1e-9 {
        format!("{}", n.round() as i64)
    } else {
        format!("{n}")
    }
}

/// Recursive-descent evaluator for `+ - * /` with parentheses.
fn eval_arithmetic(expr: &str) -> Option<f64> {
    let tokens: Vec<char> = expr.chars().filter(|c| !c.is_whitespace()).collect();
    let mut pos = 0;
    let result = parse_expr(&tokens, &mut pos)?;
    if pos == tokens.len() { Some(result) } else { None }
}

fn parse_expr(tokens: &[char], pos: &mut usize) -> Option<f64> {
    let mut value = parse_term(tokens, pos)?;
    while *pos < tokens.len() {
        match tokens[*pos] {
            '+' => {
                *pos += 1;
                value += parse_term(tokens, pos)?;
            }
            '-' => {
                *pos += 1;
                value -= parse_term(tokens, pos)?;
            }
            _ => break,
        }
    }
    Some(value)
}

fn parse_term(tokens: &[char], pos: &mut usize) -> Option<f64> {
    let mut value = parse_factor(tokens, pos)?;
    while *pos < tokens.len() {
        match tokens[*pos] {
            '*' => {
                *pos += 1;
                value *= parse_factor(tokens, pos)?;
            }
            '/' => {
                *pos += 1;
                let divisor = parse_factor(tokens, pos)?;
                if divisor == 0.0 {
                    return None;
                }
                value /= divisor;
            }
            _ => break,
        }
    }
    Some(value)
}

fn parse_factor(tokens: &[char], pos: &mut usize) -> Option<f64> {
    if *pos >= tokens.len() {
        return None;
    }
    match tokens[*pos] {
        '(' => {
            *pos += 1;
            let value = parse_expr(tokens, pos)?;
            if *pos < tokens.len() && tokens[*pos] == ')' {
                *pos += 1;
                Some(value)
            } else {
                None
            }
        }
        '-' => {
            *pos += 1;
            parse_factor(tokens, pos).map(|v| -v)
        }
        _ => {
            let start = *pos;
            while *pos < tokens.len() && (tokens[*pos].is_ascii_digit() || tokens[*pos] == '.') {
                *pos += 1;
            }
            if *pos == start {
                return None;
            }
            tokens[start..*pos].iter().collect::<String>().parse().ok()
        }
    }
}

/// Convert `hsl(h, s%, l%)` to `#rrggbb`. Unparseable values pass through.
pub fn hsl_to_hex(value: &str) -> String {
    let Some(caps) = hsl_re().captures(value) else {
        return value.to_string();
    };
    let h: f64 = caps[1].parse::<f64>().unwrap_or(0.0) / 360.0;
    let s: f64 = caps[2].parse::<f64>().unwrap_or(0.0) / 100.0;
    let l: f64 = caps[3].parse::<f64>().unwrap_or(0.0) / 100.0;

    let (r, g, b) = hsl_to_rgb(h, s, l);
    format!("#{r:02x}{g:02x}{b:02x}")
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u8, u8, u8) {
    if s == 0.0 {
        let v = (l * 255.0).round() as u8;
        return (v, v, v);
    }

    fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
        if t < 0.0 {
            t += 1.0;
        }
        if t > 1.0 {
            t -= 1.0;
        }
        if t < 1.0 / 6.0 {
            return p + (q - p) * 6.0 * t;
        }
        if t < 1.0 / 2.0 {
            return q;
        }
        if t < 2.0 / 3.0 {
            return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
        }
        p
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let r = hue_to_rgb(p, q, h + 1.0 / 3.0);
    let g = hue_to_rgb(p, q, h);
    let b = hue_to_rgb(p, q, h - 1.0 / 3.0);

    (
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    )
}
