//! Filename templating for rename jobs.
//!
//! Templates use `{token}` / `{token:spec}` fields with `{{` and `}}` as
//! literal braces. Recognised tokens are `name`, `season`, `episode`,
//! `title`, `ext` and `year`. Integer tokens accept `d`, `Nd` and `0Nd`
//! specs; string tokens accept an optional left-aligned width.

use std::sync::LazyLock;
use log::debug;
use regex::Regex;
use crate::error::TemplateError;

static ILLEGAL_CHARS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*]"#).unwrap());
static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\((\d{4})\)").unwrap());
static INT_SPEC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(0?)(\d*)d?$").unwrap());
static STR_SPEC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d*)s?$").unwrap());

/// Values substituted into a template, already sanitised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateValues {
    pub name: String,
    pub season: u32,
    pub episode: u32,
    pub title: String,
    pub ext: String,
    pub year: String,
}

impl TemplateValues {
    /// Build values from raw inputs: strips illegal filename characters from
    /// the show name and title and derives the year from the cleaned name.
    pub fn new(show_name: &str, season: u32, episode: u32, title: &str, ext: &str) -> Self {
        let name = sanitize_component(show_name);
        let year = extract_year(&name).unwrap_or_default();
        Self {
            name,
            season,
            episode,
            title: sanitize_component(title),
            ext: ext.to_string(),
            year,
        }
    }
}

enum Value<'a> {
    Int(u32),
    Str(&'a str),
}

/// Remove characters that are illegal in filenames: `< > : " / \ | ? *`
pub fn sanitize_component(s: &str) -> String {
    ILLEGAL_CHARS_RE.replace_all(s, "").to_string()
}

/// First parenthesised four-digit group, e.g. "2019" in "Show (2019)"
pub fn extract_year(name: &str) -> Option<String> {
    YEAR_RE
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// The fixed format used whenever a template cannot be rendered
pub fn fallback_filename(values: &TemplateValues) -> String {
    format!("{} - S{:02}E{:02}{}", values.name, values.season, values.episode, values.ext)
}

/// Render a template, falling back to the fixed format on any error
pub fn render_filename(template: &str, values: &TemplateValues) -> String {
    match render_template(template, values) {
        Ok(rendered) => rendered,
        Err(e) => {
            debug!("Template '{}' failed ({}), using fallback format", template, e);
            fallback_filename(values)
        }
    }
}

/// Render a template strictly
pub fn render_template(template: &str, values: &TemplateValues) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len() + values.name.len() + values.title.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut field = String::new();
                let mut closed = false;
                for (_, fc) in chars.by_ref() {
                    match fc {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => return Err(TemplateError::UnbalancedBrace(pos)),
                        other => field.push(other),
                    }
                }
                if !closed {
                    return Err(TemplateError::UnbalancedBrace(pos));
                }
                out.push_str(&render_field(&field, values)?);
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(TemplateError::UnbalancedBrace(pos));
                }
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

fn render_field(field: &str, values: &TemplateValues) -> Result<String, TemplateError> {
    let (token, spec) = match field.split_once(':') {
        Some((token, spec)) => (token, spec),
        None => (field, ""),
    };

    let value = match token {
        "name" => Value::Str(&values.name),
        "season" => Value::Int(values.season),
        "episode" => Value::Int(values.episode),
        "title" => Value::Str(&values.title),
        "ext" => Value::Str(&values.ext),
        "year" => Value::Str(&values.year),
        _ => return Err(TemplateError::UnknownToken(token.to_string())),
    };

    let bad_spec = || TemplateError::BadFormatSpec {
        token: token.to_string(),
        spec: spec.to_string(),
    };

    match value {
        Value::Int(n) => {
            let caps = INT_SPEC_RE.captures(spec).ok_or_else(bad_spec)?;
            let zero_pad = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
            let width = parse_width(caps.get(2).map(|m| m.as_str())).ok_or_else(bad_spec)?;
            Ok(if zero_pad {
                format!("{:0width$}", n, width = width)
            } else {
                format!("{:>width$}", n, width = width)
            })
        }
        Value::Str(s) => {
            let caps = STR_SPEC_RE.captures(spec).ok_or_else(bad_spec)?;
            let width = parse_width(caps.get(1).map(|m| m.as_str())).ok_or_else(bad_spec)?;
            Ok(format!("{:<width$}", s, width = width))
        }
    }
}

fn parse_width(digits: Option<&str>) -> Option<usize> {
    match digits {
        None | Some("") => Some(0),
        Some(d) => d.parse().ok().filter(|w| *w <= 255),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_RENAME_TEMPLATE;
    use proptest::prelude::*;

    fn values() -> TemplateValues {
        TemplateValues::new("Show", 1, 2, "Pilot", ".mkv")
    }

    #[test]
    fn test_default_template() {
        assert_eq!(render_filename(DEFAULT_RENAME_TEMPLATE, &values()), "Show - S01E02 - Pilot.mkv");
    }

    #[test]
    fn test_movie_template_with_year() {
        let v = TemplateValues::new("Some Show (2019)", 3, 14, "Finale", ".mp4");
        assert_eq!(v.year, "2019");
        assert_eq!(
            render_filename("{title} ({year}) - {name}{ext}", &v),
            "Finale (2019) - Some Show (2019).mp4"
        );
    }

    #[test]
    fn test_sanitises_name_and_title() {
        let v = TemplateValues::new("What: If?", 1, 1, "A/B <Test>", ".mkv");
        assert_eq!(v.name, "What If");
        assert_eq!(v.title, "AB Test");
        // extension is passed through verbatim
        assert_eq!(v.ext, ".mkv");
    }

    #[test]
    fn test_unpadded_and_space_padded_ints() {
        let v = values();
        assert_eq!(render_template("{season}x{episode}", &v).unwrap(), "1x2");
        assert_eq!(render_template("[{episode:3d}]", &v).unwrap(), "[  2]");
        assert_eq!(render_template("{episode:03}", &v).unwrap(), "002");
    }

    #[test]
    fn test_literal_braces() {
        assert_eq!(render_template("{{{name}}}", &values()).unwrap(), "{Show}");
    }

    #[test]
    fn test_unknown_token_falls_back() {
        let v = values();
        assert_eq!(
            render_template("{name} {resolution}", &v),
            Err(TemplateError::UnknownToken("resolution".to_string()))
        );
        let rendered = render_filename("{name} {resolution}{ext}", &v);
        assert_eq!(rendered, "Show - S01E02.mkv");
    }

    #[test]
    fn test_malformed_templates_fall_back() {
        let v = values();
        for template in ["{name", "name}", "{name:02d}", "{season:x}", "{}", "{0}", "{na{me}"] {
            assert!(render_template(template, &v).is_err(), "template {} should fail", template);
            assert_eq!(render_filename(template, &v), "Show - S01E02.mkv");
        }
    }

    #[test]
    fn test_missing_year_is_empty() {
        let v = values();
        assert_eq!(render_template("{name} ({year})", &v).unwrap(), "Show ()");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_fallback_contains_padded_numbers(
            name in "[A-Za-z ]{0,12}",
            season in 0u32..200,
            episode in 0u32..2000,
            ext in prop_oneof![Just(".mkv"), Just(".mp4"), Just("")],
        ) {
            let v = TemplateValues::new(&name, season, episode, "", ext);
            let out = render_filename("{name} - {bogus}", &v);
            let tag = format!("S{:02}E{:02}", season, episode);
            prop_assert!(out.contains(&tag));
            prop_assert!(out.ends_with(ext));
        }

        #[test]
        fn test_sanitised_values_have_no_illegal_chars(raw in ".{0,30}") {
            let v = TemplateValues::new(&raw, 1, 1, &raw, ".mkv");
            for c in ['<', '>', ':', '"', '/', '\\', '|', '?', '*'] {
                prop_assert!(!v.name.contains(c));
                prop_assert!(!v.title.contains(c));
            }
        }
    }
}
