//! Locator candidate generation.
//!
//! The recorded target is always the first candidate. Engine selectors, CSS
//! and XPath are rewritten into accessor expressions where an equivalent
//! accessor exists; volatile text locators get repair candidates. Every
//! rewritten value is re-parsed and dropped if it does not parse.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use super::expression::{quote, LocatorExpression};
use super::repair::{analyze_volatile_target, RepairFinding};
use super::{reason, CandidateOrigin, TargetCandidate};
use crate::target::{Target, TargetKind};

/// Candidates for one target plus the volatile-text finding, if any
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSet {
    /// Current candidate first, then derivations in a fixed order
    pub candidates: Vec<TargetCandidate>,
    /// Set when the target's text criterion looks volatile
    pub repair: Option<RepairFinding>,
}

/// Generate current and derived candidates for a target
#[must_use]
pub fn generate_candidates(target: &Target) -> CandidateSet {
    let mut candidates = vec![TargetCandidate::new(
        target.clone(),
        CandidateOrigin::Current,
        reason::CURRENT_TARGET,
    )];

    let derivations = match target.kind {
        TargetKind::EngineSelector => derive_from_engine(&target.value)
            .map(|(value, why)| vec![(value, why)])
            .unwrap_or_default(),
        TargetKind::Css => vec![derive_from_css(&target.value)],
        TargetKind::Xpath => vec![(
            format!("locator({})", quote(&xpath_selector(&target.value))),
            reason::DERIVED_FROM_XPATH,
        )],
        TargetKind::LocatorExpression | TargetKind::Unknown => Vec::new(),
    };

    let repair = analyze_volatile_target(target);
    let repairs = repair
        .iter()
        .flat_map(|finding| finding.repairs.iter().map(|r| (r.value.clone(), r.reason)));

    for (value, why) in derivations.into_iter().chain(repairs) {
        if LocatorExpression::parse(&value).is_err() {
            tracing::debug!(value = %value, "dropping unparseable derived locator");
            continue;
        }
        candidates.push(TargetCandidate::new(
            target.rewritten(value, TargetKind::LocatorExpression),
            CandidateOrigin::Derived,
            why,
        ));
    }

    let mut seen = HashSet::new();
    candidates.retain(|c| seen.insert(c.target.stable_key()));

    CandidateSet { candidates, repair }
}

fn xpath_selector(value: &str) -> String {
    if value.starts_with("xpath=") {
        value.to_string()
    } else {
        format!("xpath={value}")
    }
}

fn bracket_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^([a-zA-Z][a-zA-Z0-9]*)?\[([a-zA-Z-]+)=(?:"([^"]*)"|'([^']*)'|([^\]"']*?))([si])?\]$"#)
            .expect("static regex")
    })
}

fn has_text_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^([a-zA-Z][a-zA-Z0-9]*):has-text\((?:"([^"]*)"|'([^']*)')\)$"#)
            .expect("static regex")
    })
}

fn role_selector_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^([a-z]+)(?:\[name=(?:"([^"]*)"|'([^']*)')([si])?\])?$"#)
            .expect("static regex")
    })
}

/// `[attr="value"s]` split into tag, attribute, value and exactness
struct BracketAttr {
    tag: Option<String>,
    name: String,
    value: String,
    exact: bool,
}

fn parse_bracket_attr(input: &str) -> Option<BracketAttr> {
    let caps = bracket_attr_re().captures(input.trim())?;
    let value = caps
        .get(3)
        .or_else(|| caps.get(4))
        .or_else(|| caps.get(5))?
        .as_str()
        .trim()
        .to_string();
    if value.is_empty() {
        return None;
    }
    Some(BracketAttr {
        tag: caps.get(1).map(|m| m.as_str().to_string()),
        name: caps.get(2)?.as_str().to_string(),
        value,
        exact: caps.get(6).is_some_and(|m| m.as_str() == "s"),
    })
}

/// A text engine body: `"Save"s` is exact, `"Save"i` and bare `Save` are not
fn parse_text_body(body: &str) -> Option<(String, bool)> {
    let body = body.trim();
    if let Some(rest) = body.strip_prefix('"') {
        let (text, flag) = rest.rsplit_once('"')?;
        return Some((text.to_string(), flag != "i"));
    }
    (!body.is_empty()).then(|| (body.to_string(), false))
}

fn text_call(method: &str, text: &str, exact: bool) -> String {
    if exact {
        format!("{method}({}, {{ exact: true }})", quote(text))
    } else {
        format!("{method}({})", quote(text))
    }
}

fn role_call(role: &str, name: Option<&str>, exact: bool) -> String {
    match (name, exact) {
        (Some(name), true) => format!(
            "getByRole({}, {{ name: {}, exact: true }})",
            quote(role),
            quote(name)
        ),
        (Some(name), false) => format!("getByRole({}, {{ name: {} }})", quote(role), quote(name)),
        (None, _) => format!("getByRole({})", quote(role)),
    }
}

fn attr_call(attr: &BracketAttr) -> Option<String> {
    let method = match attr.name.as_str() {
        "data-testid" | "data-test-id" => {
            return Some(format!("getByTestId({})", quote(&attr.value)));
        }
        "aria-label" => "getByLabel",
        "placeholder" => "getByPlaceholder",
        "alt" => "getByAltText",
        "title" => "getByTitle",
        _ => return None,
    };
    Some(text_call(method, &attr.value, attr.exact))
}

/// Rewrite an engine-prefixed selector into an accessor expression
fn derive_from_engine(value: &str) -> Option<(String, &'static str)> {
    let mut segments = value.split(">>").map(str::trim);
    let first = segments.next()?;
    let mut suffix = String::new();
    for segment in segments {
        let index: i64 = segment.strip_prefix("nth=")?.trim().parse().ok()?;
        suffix.push_str(&format!(".nth({index})"));
    }

    let (engine, body) = first.split_once('=')?;
    let engine = engine.strip_prefix("internal:").unwrap_or(engine);
    let (base, why) = match engine {
        "data-testid" => {
            let id = body.trim().trim_matches(|c| c == '"' || c == '\'');
            (
                format!("getByTestId({})", quote(id)),
                reason::DERIVED_FROM_TEST_ID,
            )
        }
        "testid" => {
            let attr = parse_bracket_attr(body)?;
            (attr_call(&attr)?, reason::DERIVED_FROM_TEST_ID)
        }
        "role" => {
            let caps = role_selector_re().captures(body.trim())?;
            let role = caps.get(1)?.as_str();
            let name = caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str());
            let exact = caps.get(4).is_some_and(|m| m.as_str() == "s");
            (role_call(role, name, exact), reason::DERIVED_FROM_ENGINE_SELECTOR)
        }
        "text" => {
            let (text, exact) = parse_text_body(body)?;
            (
                text_call("getByText", &text, exact),
                reason::DERIVED_FROM_ENGINE_SELECTOR,
            )
        }
        "label" => {
            let (text, exact) = parse_text_body(body)?;
            (
                text_call("getByLabel", &text, exact),
                reason::DERIVED_FROM_ENGINE_SELECTOR,
            )
        }
        "attr" => {
            let attr = parse_bracket_attr(body)?;
            (attr_call(&attr)?, reason::DERIVED_FROM_ENGINE_SELECTOR)
        }
        "css" => {
            let (css, _) = derive_from_css(body.trim());
            (css, reason::DERIVED_FROM_CSS)
        }
        "xpath" => (
            format!("locator({})", quote(&format!("xpath={}", body.trim()))),
            reason::DERIVED_FROM_XPATH,
        ),
        _ => return None,
    };
    Some((format!("{base}{suffix}"), why))
}

fn role_for_tag(tag: &str) -> Option<&'static str> {
    match tag.to_ascii_lowercase().as_str() {
        "button" => Some("button"),
        "a" => Some("link"),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => Some("heading"),
        "li" => Some("listitem"),
        "option" => Some("option"),
        _ => None,
    }
}

/// Rewrite a CSS selector; falls back to `locator('css')`
fn derive_from_css(value: &str) -> (String, &'static str) {
    let trimmed = value.trim();
    if let Some(attr) = parse_bracket_attr(trimmed) {
        if let Some(call) = attr_call(&attr) {
            let why = if attr.name.starts_with("data-test") {
                reason::DERIVED_FROM_TEST_ID
            } else {
                reason::DERIVED_FROM_CSS
            };
            if attr.tag.is_none() || why == reason::DERIVED_FROM_TEST_ID {
                return (call, why);
            }
        }
    }
    if let Some(caps) = has_text_re().captures(trimmed) {
        let text = caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str());
        if let (Some(role), Some(text)) = (caps.get(1).and_then(|m| role_for_tag(m.as_str())), text)
        {
            return (role_call(role, Some(text), false), reason::DERIVED_FROM_CSS);
        }
    }
    (format!("locator({})", quote(trimmed)), reason::DERIVED_FROM_CSS)
}
