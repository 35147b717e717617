//! Parser for locator expressions.
//!
//! A locator expression is a chain of accessor calls such as
//! `getByRole('link', { name: 'Home', exact: true }).nth(1)`. Only a closed
//! vocabulary of methods is recognized; anything else is rejected so callers can
//! treat the target as an unrecognized shape instead of guessing.

use std::fmt::Write as _;

use thiserror::Error;

/// Methods that start or extend a locator chain
const ACCESSOR_METHODS: &[&str] = &[
    "getByRole",
    "getByTestId",
    "getByLabel",
    "getByPlaceholder",
    "getByText",
    "getByAltText",
    "getByTitle",
    "locator",
    "frameLocator",
];

/// Positional chain methods
const POSITIONAL_METHODS: &[&str] = &["nth", "first", "last"];

/// Content filter chain methods
const FILTER_METHODS: &[&str] = &["filter"];

/// Other chain methods with no effect on matching
const PASSTHROUGH_METHODS: &[&str] = &["contentFrame"];

/// Parse failure with the character offset where it happened
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized locator expression at offset {position}: {message}")]
pub struct ExpressionError {
    /// Character offset into the input
    pub position: usize,
    /// What was expected
    pub message: String,
}

/// A literal argument value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Quoted string
    Str(String),
    /// Regular expression literal
    Regex {
        /// Pattern source
        pattern: String,
        /// Flags such as `i`
        flags: String,
    },
    /// Boolean
    Bool(bool),
    /// Number
    Number(f64),
}

impl Literal {
    /// String contents, if this is a string literal
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    fn render(&self, out: &mut String) {
        match self {
            Self::Str(s) => out.push_str(&quote(s)),
            Self::Regex { pattern, flags } => {
                let _ = write!(out, "/{pattern}/{flags}");
            }
            Self::Bool(b) => {
                let _ = write!(out, "{b}");
            }
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    let _ = write!(out, "{}", *n as i64);
                } else {
                    let _ = write!(out, "{n}");
                }
            }
        }
    }
}

/// A call argument: either a literal or an options object
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Positional literal
    Literal(Literal),
    /// `{ key: value, ... }` object, insertion ordered
    Options(Vec<(String, Literal)>),
}

/// One method call in the chain
#[derive(Debug, Clone, PartialEq)]
pub struct LocatorCall {
    /// Method name
    pub method: String,
    /// Arguments in source order
    pub args: Vec<Arg>,
}

impl LocatorCall {
    /// Create a call
    #[must_use]
    pub fn new(method: impl Into<String>, args: Vec<Arg>) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }

    /// First positional literal
    #[must_use]
    pub fn first_literal(&self) -> Option<&Literal> {
        self.args.iter().find_map(|a| match a {
            Arg::Literal(l) => Some(l),
            Arg::Options(_) => None,
        })
    }

    /// Look up an option value by key
    #[must_use]
    pub fn option(&self, key: &str) -> Option<&Literal> {
        self.args.iter().find_map(|a| match a {
            Arg::Options(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            Arg::Literal(_) => None,
        })
    }

    /// Whether `exact: true` is set
    #[must_use]
    pub fn is_exact(&self) -> bool {
        matches!(self.option("exact"), Some(Literal::Bool(true)))
    }

    /// Accessor classification of this call
    #[must_use]
    pub fn accessor_kind(&self) -> AccessorKind {
        AccessorKind::from_method(&self.method)
    }

    fn render(&self, out: &mut String) {
        out.push_str(&self.method);
        out.push('(');
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            match arg {
                Arg::Literal(l) => l.render(out),
                Arg::Options(entries) if entries.is_empty() => out.push_str("{}"),
                Arg::Options(entries) => {
                    out.push_str("{ ");
                    for (j, (key, value)) in entries.iter().enumerate() {
                        if j > 0 {
                            out.push_str(", ");
                        }
                        out.push_str(key);
                        out.push_str(": ");
                        value.render(out);
                    }
                    out.push_str(" }");
                }
            }
        }
        out.push(')');
    }
}

/// Kind of accessor that anchors a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorKind {
    /// `getByRole`
    Role,
    /// `getByTestId`
    TestId,
    /// `getByLabel`
    Label,
    /// `getByPlaceholder`
    Placeholder,
    /// `getByAltText`
    AltText,
    /// `getByTitle`
    Title,
    /// `getByText`
    Text,
    /// `locator(css)` or `locator('xpath=...')`
    Locator,
    /// `frameLocator`
    Frame,
    /// Chain method (nth, filter, ...)
    Chain,
}

impl AccessorKind {
    /// Classify a method name
    #[must_use]
    pub fn from_method(method: &str) -> Self {
        match method {
            "getByRole" => Self::Role,
            "getByTestId" => Self::TestId,
            "getByLabel" => Self::Label,
            "getByPlaceholder" => Self::Placeholder,
            "getByAltText" => Self::AltText,
            "getByTitle" => Self::Title,
            "getByText" => Self::Text,
            "locator" => Self::Locator,
            "frameLocator" => Self::Frame,
            _ => Self::Chain,
        }
    }
}

/// Text matching criterion of an accessor
#[derive(Debug, Clone, PartialEq)]
pub struct TextCriterion {
    /// Matched text or pattern
    pub value: Literal,
    /// Whether `exact: true` was given
    pub exact: bool,
}

/// A parsed locator chain
#[derive(Debug, Clone, PartialEq)]
pub struct LocatorExpression {
    /// Calls in chain order
    pub calls: Vec<LocatorCall>,
}

impl LocatorExpression {
    /// Parse an expression, accepting an optional leading `page.`
    pub fn parse(input: &str) -> Result<Self, ExpressionError> {
        Parser::new(input).parse()
    }

    /// Build a single-call expression
    #[must_use]
    pub fn single(call: LocatorCall) -> Self {
        Self { calls: vec![call] }
    }

    /// Render back to source form
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, call) in self.calls.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            call.render(&mut out);
        }
        out
    }

    /// The first call that is not a frame hop
    #[must_use]
    pub fn accessor(&self) -> Option<&LocatorCall> {
        self.calls
            .iter()
            .find(|c| c.accessor_kind() != AccessorKind::Frame)
    }

    /// Number of `nth`/`first`/`last` calls
    #[must_use]
    pub fn positional_calls(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| POSITIONAL_METHODS.contains(&c.method.as_str()))
            .count()
    }

    /// Number of `filter` calls
    #[must_use]
    pub fn filter_calls(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| FILTER_METHODS.contains(&c.method.as_str()))
            .count()
    }

    /// Whether the chain is exactly one accessor call
    #[must_use]
    pub fn is_single_accessor(&self) -> bool {
        self.calls.len() == 1 && self.calls[0].accessor_kind() != AccessorKind::Chain
    }

    /// Text criterion of the anchoring accessor, if it has one
    #[must_use]
    pub fn text_criterion(&self) -> Option<TextCriterion> {
        let call = self.accessor()?;
        let value = match call.accessor_kind() {
            AccessorKind::Role => call.option("name")?.clone(),
            AccessorKind::Text
            | AccessorKind::Label
            | AccessorKind::Placeholder
            | AccessorKind::AltText
            | AccessorKind::Title => call.first_literal()?.clone(),
            _ => return None,
        };
        Some(TextCriterion {
            value,
            exact: call.is_exact(),
        })
    }

    /// Role argument of a `getByRole` accessor
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        let call = self.accessor()?;
        if call.accessor_kind() == AccessorKind::Role {
            call.first_literal().and_then(Literal::as_str)
        } else {
            None
        }
    }
}

/// Build `getByRole('role', { name: 'name' })`, or `getByRole('role')` without a name
#[must_use]
pub fn role_expression(role: &str, name: Option<&str>) -> String {
    let mut args = vec![Arg::Literal(Literal::Str(role.to_string()))];
    if let Some(name) = name {
        args.push(Arg::Options(vec![(
            "name".to_string(),
            Literal::Str(name.to_string()),
        )]));
    }
    LocatorExpression::single(LocatorCall::new("getByRole", args)).render()
}

/// Single-quote a string for use inside an expression
#[must_use]
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

/// Escape text for a regex literal body
#[must_use]
pub fn escape_regex_literal(text: &str) -> String {
    regex::escape(text).replace('/', "\\/")
}

/// Remove the contents of quoted strings and regex literals, keeping delimiters.
///
/// Used by chain scans so literal text such as `'.nth(2)'` is never mistaken for
/// a method call.
#[must_use]
pub fn strip_quoted(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut prev_significant: Option<char> = None;
    while let Some(ch) = chars.next() {
        let regex_start = ch == '/'
            && matches!(prev_significant, None | Some('(' | ',' | ':' | '{' | '['));
        if ch == '\'' || ch == '"' || ch == '`' || regex_start {
            out.push(ch);
            let mut escaped = false;
            for inner in chars.by_ref() {
                if escaped {
                    escaped = false;
                    continue;
                }
                if inner == '\\' {
                    escaped = true;
                    continue;
                }
                if inner == ch {
                    out.push(inner);
                    break;
                }
            }
            prev_significant = Some(ch);
            continue;
        }
        out.push(ch);
        if !ch.is_whitespace() {
            prev_significant = Some(ch);
        }
    }
    out
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.trim().chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: &str) -> ExpressionError {
        ExpressionError {
            position: self.pos,
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, ch: char) -> Result<(), ExpressionError> {
        self.skip_ws();
        if self.peek() == Some(ch) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{ch}'")))
        }
    }

    fn parse(mut self) -> Result<LocatorExpression, ExpressionError> {
        if self.chars.is_empty() {
            return Err(self.error("empty expression"));
        }
        let rest: String = self.chars.iter().take(5).collect();
        if rest == "page." {
            self.pos = 5;
        }
        let mut calls = Vec::new();
        loop {
            self.skip_ws();
            let method = self.ident()?;
            let known = ACCESSOR_METHODS.contains(&method.as_str())
                || POSITIONAL_METHODS.contains(&method.as_str())
                || FILTER_METHODS.contains(&method.as_str())
                || PASSTHROUGH_METHODS.contains(&method.as_str());
            if !known {
                return Err(self.error(&format!("unsupported method '{method}'")));
            }
            if calls.is_empty() && !ACCESSOR_METHODS.contains(&method.as_str()) {
                return Err(self.error("chain must start with an accessor"));
            }
            self.expect('(')?;
            let args = self.args()?;
            calls.push(LocatorCall { method, args });
            self.skip_ws();
            match self.peek() {
                None => break,
                Some('.') => self.pos += 1,
                Some(_) => return Err(self.error("expected '.' or end of expression")),
            }
        }
        Ok(LocatorExpression { calls })
    }

    fn ident(&mut self) -> Result<String, ExpressionError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        {
            self.pos += 1;
        }
        if start == self.pos || self.chars[start].is_ascii_digit() {
            return Err(self.error("expected identifier"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn args(&mut self) -> Result<Vec<Arg>, ExpressionError> {
        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some(')') {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            self.skip_ws();
            if self.peek() == Some('{') {
                args.push(Arg::Options(self.options()?));
            } else {
                args.push(Arg::Literal(self.literal()?));
            }
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(')') => {
                    self.pos += 1;
                    return Ok(args);
                }
                _ => return Err(self.error("expected ',' or ')'")),
            }
        }
    }

    fn options(&mut self) -> Result<Vec<(String, Literal)>, ExpressionError> {
        self.expect('{')?;
        let mut entries = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some('}') => {
                    self.pos += 1;
                    return Ok(entries);
                }
                Some('\'' | '"') => {
                    let key = match self.literal()? {
                        Literal::Str(s) => s,
                        _ => return Err(self.error("expected option key")),
                    };
                    entries.push((key, self.option_value()?));
                }
                Some(_) => {
                    let key = self.ident()?;
                    entries.push((key, self.option_value()?));
                }
                None => return Err(self.error("unterminated options object")),
            }
            self.skip_ws();
            if self.peek() == Some(',') {
                self.pos += 1;
            }
        }
    }

    fn option_value(&mut self) -> Result<Literal, ExpressionError> {
        self.expect(':')?;
        self.skip_ws();
        self.literal()
    }

    fn literal(&mut self) -> Result<Literal, ExpressionError> {
        self.skip_ws();
        match self.peek() {
            Some(q @ ('\'' | '"' | '`')) => {
                self.pos += 1;
                self.string_body(q).map(Literal::Str)
            }
            Some('/') => {
                self.pos += 1;
                self.regex_body()
            }
            Some(c) if c.is_ascii_digit() || c == '-' => self.number(),
            Some(_) => match self.ident()?.as_str() {
                "true" => Ok(Literal::Bool(true)),
                "false" => Ok(Literal::Bool(false)),
                _ => Err(self.error("expected literal")),
            },
            None => Err(self.error("expected literal")),
        }
    }

    fn string_body(&mut self, quote_char: char) -> Result<String, ExpressionError> {
        let mut out = String::new();
        while let Some(ch) = self.peek() {
            self.pos += 1;
            if ch == '\\' {
                let escaped = self.peek().ok_or_else(|| self.error("dangling escape"))?;
                self.pos += 1;
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
            } else if ch == quote_char {
                return Ok(out);
            } else {
                out.push(ch);
            }
        }
        Err(self.error("unterminated string"))
    }

    fn regex_body(&mut self) -> Result<Literal, ExpressionError> {
        let mut pattern = String::new();
        let mut in_class = false;
        loop {
            let ch = self.peek().ok_or_else(|| self.error("unterminated regex"))?;
            self.pos += 1;
            match ch {
                '\\' => {
                    pattern.push(ch);
                    let next = self.peek().ok_or_else(|| self.error("dangling escape"))?;
                    self.pos += 1;
                    pattern.push(next);
                }
                '[' => {
                    in_class = true;
                    pattern.push(ch);
                }
                ']' => {
                    in_class = false;
                    pattern.push(ch);
                }
                '/' if !in_class => break,
                _ => pattern.push(ch),
            }
        }
        let mut flags = String::new();
        while let Some(f) = self.peek().filter(char::is_ascii_alphabetic) {
            flags.push(f);
            self.pos += 1;
        }
        Ok(Literal::Regex { pattern, flags })
    }

    fn number(&mut self) -> Result<Literal, ExpressionError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map(Literal::Number)
            .map_err(|_| self.error("invalid number"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role_with_options() {
        let expr =
            LocatorExpression::parse("getByRole('link', { name: 'Home', exact: true })").unwrap();
        assert_eq!(expr.calls.len(), 1);
        let call = &expr.calls[0];
        assert_eq!(call.accessor_kind(), AccessorKind::Role);
        assert!(call.is_exact());
        assert_eq!(expr.role(), Some("link"));
        let criterion = expr.text_criterion().unwrap();
        assert_eq!(criterion.value, Literal::Str("Home".to_string()));
        assert!(criterion.exact);
    }

    #[test]
    fn test_parse_page_prefix_and_chain() {
        let expr = LocatorExpression::parse("page.getByText(\"Save\").nth(2).filter({ hasText: 'x' })")
            .unwrap();
        assert_eq!(expr.calls.len(), 3);
        assert_eq!(expr.positional_calls(), 1);
        assert_eq!(expr.filter_calls(), 1);
        assert!(!expr.is_single_accessor());
    }

    #[test]
    fn test_parse_regex_literal() {
        let expr = LocatorExpression::parse("getByRole('heading', { name: /^Latest [a/b]/i })")
            .unwrap();
        let criterion = expr.text_criterion().unwrap();
        assert_eq!(
            criterion.value,
            Literal::Regex {
                pattern: "^Latest [a/b]".to_string(),
                flags: "i".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_method_rejected() {
        let err = LocatorExpression::parse("getByRole('button').click()").unwrap_err();
        assert!(err.message.contains("click"));
    }

    #[test]
    fn test_chain_must_start_with_accessor() {
        assert!(LocatorExpression::parse("nth(0)").is_err());
        assert!(LocatorExpression::parse("").is_err());
        assert!(LocatorExpression::parse("#submit").is_err());
    }

    #[test]
    fn test_render_round_trips_shape() {
        let source = "getByRole('link', { name: 'It\\'s here', exact: true }).first()";
        let expr = LocatorExpression::parse(source).unwrap();
        let rendered = expr.render();
        assert_eq!(rendered, source);
        assert_eq!(LocatorExpression::parse(&rendered).unwrap(), expr);
    }

    #[test]
    fn test_role_expression() {
        assert_eq!(
            role_expression("heading", Some("Welcome")),
            "getByRole('heading', { name: 'Welcome' })"
        );
        assert_eq!(role_expression("main", None), "getByRole('main')");
    }

    #[test]
    fn test_strip_quoted_hides_method_names() {
        let stripped = strip_quoted("getByText('.nth(2)').first()");
        assert!(!stripped.contains(".nth("));
        assert!(stripped.contains(".first("));
    }

    #[test]
    fn test_escape_regex_literal() {
        assert_eq!(escape_regex_literal("a/b (c)"), "a\\/b \\(c\\)");
    }
}
