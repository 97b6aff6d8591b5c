//! Rule query language
//!
//! ```text
//! select metric, value from MetricEvent(metric.metricURI matches 'cpu.*') where value > 0.9
//! ```
//!
//! The parenthesised part filters the stream, `where` holds the condition. Both are
//! boolean expressions over event paths, combined with `and`/`or`/`not`.

use regex::Regex;
use std::fmt;
use std::str::FromStr;

use crate::domain::{full_match_regex, StreamEvent};
use crate::error::{MapeError, Result};

/// Event stream a query reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    MetricEvent,
    MeasurementEvent,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::MetricEvent => write!(f, "MetricEvent"),
            StreamKind::MeasurementEvent => write!(f, "MeasurementEvent"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fields {
    All,
    Named(Vec<String>),
}

impl fmt::Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fields::All => write!(f, "*"),
            Fields::Named(names) => write!(f, "{}", names.join(", ")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl CmpOp {
    fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CmpOp::Gt => ordering == Greater,
            CmpOp::Ge => ordering != Less,
            CmpOp::Lt => ordering == Less,
            CmpOp::Le => ordering != Greater,
            CmpOp::Eq => ordering == Equal,
            CmpOp::Ne => ordering != Equal,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
        };
        write!(f, "{}", op)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{:?}", n),
            Literal::Text(s) => write_quoted(f, s),
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "'")?;
    for c in s.chars() {
        match c {
            '\'' => write!(f, "\\'")?,
            '\\' => write!(f, "\\\\")?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "'")
}

/// Boolean expression over event paths
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare {
        path: String,
        op: CmpOp,
        literal: Literal,
    },
    Matches {
        path: String,
        pattern: String,
    },
}

impl Expr {
    pub fn matches(path: &str, pattern: &str) -> Self {
        Expr::Matches {
            path: path.to_string(),
            pattern: pattern.to_string(),
        }
    }

    pub fn and(self, other: Expr) -> Self {
        Expr::And(Box::new(self), Box::new(other))
    }

    fn is_atom(&self) -> bool {
        matches!(self, Expr::Compare { .. } | Expr::Matches { .. } | Expr::Not(_))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::And(l, r) => {
                write_operand(f, l, |e| matches!(e, Expr::Or(..)))?;
                write!(f, " and ")?;
                write_operand(f, r, |e| !e.is_atom())
            }
            Expr::Or(l, r) => {
                write!(f, "{}", l)?;
                write!(f, " or ")?;
                write_operand(f, r, |e| matches!(e, Expr::Or(..)))
            }
            Expr::Not(inner) => {
                write!(f, "not ")?;
                write_operand(f, inner, |e| !matches!(e, Expr::Not(_)) && !e.is_atom())
            }
            Expr::Compare { path, op, literal } => write!(f, "{} {} {}", path, op, literal),
            Expr::Matches { path, pattern } => {
                write!(f, "{} matches ", path)?;
                write_quoted(f, pattern)
            }
        }
    }
}

fn write_operand(
    f: &mut fmt::Formatter<'_>,
    expr: &Expr,
    needs_parens: impl Fn(&Expr) -> bool,
) -> fmt::Result {
    if needs_parens(expr) {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

/// Parsed rule query
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub fields: Fields,
    pub stream: StreamKind,
    /// Stream filter, the `(...)` after the stream name
    pub filter: Option<Expr>,
    /// `where` clause
    pub condition: Option<Expr>,
}

impl Query {
    pub fn parse(text: &str) -> Result<Self> {
        let mut parser = Parser::new(text)?;
        let query = parser.query()?;
        parser.expect_end()?;
        Ok(query)
    }

    /// Compile the regexes so the query can be evaluated
    pub fn compile(&self) -> Result<CompiledQuery> {
        Ok(CompiledQuery {
            stream: self.stream,
            filter: self.filter.as_ref().map(compile_expr).transpose()?,
            condition: self.condition.as_ref().map(compile_expr).transpose()?,
            text: self.to_string(),
        })
    }
}

impl FromStr for Query {
    type Err = MapeError;

    fn from_str(s: &str) -> Result<Self> {
        Query::parse(s)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "select {} from {}", self.fields, self.stream)?;
        if let Some(filter) = &self.filter {
            write!(f, "({})", filter)?;
        }
        if let Some(condition) = &self.condition {
            write!(f, " where {}", condition)?;
        }
        Ok(())
    }
}

/// Parse a standalone condition such as `value > 10.0 and not value > 20`
pub fn parse_condition(text: &str) -> Result<Expr> {
    let mut parser = Parser::new(text)?;
    let expr = parser.expr()?;
    parser.expect_end()?;
    Ok(expr)
}

fn given(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Splice rule patterns and a condition into one metric-event query.
///
/// Unset or blank patterns match anything and are left out of the filter.
pub fn build_query(
    resource_uri: Option<&str>,
    resource_type_uri: Option<&str>,
    metric_uri: Option<&str>,
    condition: Option<&str>,
) -> Result<Query> {
    let filter = [
        ("metric.resourceURI", resource_uri),
        ("resourceType", resource_type_uri),
        ("metric.metricURI", metric_uri),
    ]
    .into_iter()
    .filter_map(|(path, pattern)| given(pattern).map(|p| Expr::matches(path, p)))
    .reduce(Expr::and);

    let condition = given(condition).map(parse_condition).transpose()?;

    Ok(Query {
        fields: Fields::Named(vec!["metric".to_string(), "value".to_string()]),
        stream: StreamKind::MetricEvent,
        filter,
        condition,
    })
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Matcher {
    And(Box<Matcher>, Box<Matcher>),
    Or(Box<Matcher>, Box<Matcher>),
    Not(Box<Matcher>),
    Compare {
        path: String,
        op: CmpOp,
        literal: Literal,
    },
    Regex {
        path: String,
        regex: Regex,
    },
}

fn compile_expr(expr: &Expr) -> Result<Matcher> {
    Ok(match expr {
        Expr::And(l, r) => Matcher::And(Box::new(compile_expr(l)?), Box::new(compile_expr(r)?)),
        Expr::Or(l, r) => Matcher::Or(Box::new(compile_expr(l)?), Box::new(compile_expr(r)?)),
        Expr::Not(inner) => Matcher::Not(Box::new(compile_expr(inner)?)),
        Expr::Compare { path, op, literal } => Matcher::Compare {
            path: path.clone(),
            op: *op,
            literal: literal.clone(),
        },
        Expr::Matches { path, pattern } => Matcher::Regex {
            path: path.clone(),
            regex: full_match_regex(pattern)?,
        },
    })
}

/// Field value read from an event
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

/// Resolve an event path; `None` for paths the stream does not carry
pub fn resolve(event: &StreamEvent<'_>, path: &str) -> Option<FieldValue> {
    match event {
        StreamEvent::Metric(e) => match path {
            "value" => Some(FieldValue::Number(e.value)),
            "resourceType" => Some(FieldValue::Text(e.resource_type.clone())),
            "metric.metricURI" => Some(FieldValue::Text(e.metric.metric_uri().to_string())),
            "metric.resourceURI" => Some(FieldValue::Text(e.metric.resource_uri().to_string())),
            "metric.metricPollTimeInterval" => Some(FieldValue::Number(
                e.metric.poll_interval().as_millis() as f64,
            )),
            _ => None,
        },
        StreamEvent::Measurement(e) => match path {
            "value" => Some(FieldValue::Number(e.value)),
            "instanceURI" => Some(FieldValue::Text(e.instance_uri.clone())),
            "capabilityURI" => Some(FieldValue::Text(e.capability_uri.clone())),
            "timestamp" => Some(FieldValue::Number(e.timestamp.timestamp_millis() as f64)),
            _ => None,
        },
    }
}

impl Matcher {
    fn eval(&self, event: &StreamEvent<'_>) -> bool {
        match self {
            Matcher::And(l, r) => l.eval(event) && r.eval(event),
            Matcher::Or(l, r) => l.eval(event) || r.eval(event),
            Matcher::Not(inner) => !inner.eval(event),
            Matcher::Compare { path, op, literal } => {
                let ordering = match (resolve(event, path), literal) {
                    (Some(FieldValue::Number(v)), Literal::Number(n)) => v.partial_cmp(n),
                    (Some(FieldValue::Text(v)), Literal::Text(s)) => Some(v.as_str().cmp(s)),
                    _ => None,
                };
                ordering.map(|o| op.holds(o)).unwrap_or(false)
            }
            Matcher::Regex { path, regex } => match resolve(event, path) {
                Some(FieldValue::Text(v)) => regex.is_match(&v),
                _ => false,
            },
        }
    }
}

/// Query ready to test events
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    stream: StreamKind,
    filter: Option<Matcher>,
    condition: Option<Matcher>,
    text: String,
}

impl CompiledQuery {
    pub fn stream(&self) -> StreamKind {
        self.stream
    }

    /// Query text: the statement as written for raw queries, the canonical
    /// form otherwise
    pub fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn matches(&self, event: &StreamEvent<'_>) -> bool {
        let on_stream = matches!(
            (self.stream, event),
            (StreamKind::MetricEvent, StreamEvent::Metric(_))
                | (StreamKind::MeasurementEvent, StreamEvent::Measurement(_))
        );
        on_stream
            && self.filter.as_ref().map_or(true, |m| m.eval(event))
            && self.condition.as_ref().map_or(true, |m| m.eval(event))
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    Op(CmpOp),
    LParen,
    RParen,
    Comma,
    Star,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "'{}'", s),
            Token::Str(s) => write!(f, "string '{}'", s),
            Token::Num(n) => write!(f, "number {}", n),
            Token::Op(op) => write!(f, "'{}'", op),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::Comma => write!(f, "','"),
            Token::Star => write!(f, "'*'"),
        }
    }
}

fn invalid(msg: impl Into<String>) -> MapeError {
    MapeError::InvalidQuery(msg.into())
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '>' | '<' | '!' | '=' => {
                let next_is_eq = chars.get(i + 1) == Some(&'=');
                let (op, width) = match (c, next_is_eq) {
                    ('>', true) => (CmpOp::Ge, 2),
                    ('>', false) => (CmpOp::Gt, 1),
                    ('<', true) => (CmpOp::Le, 2),
                    ('<', false) => (CmpOp::Lt, 1),
                    ('!', true) => (CmpOp::Ne, 2),
                    ('=', true) => (CmpOp::Eq, 2),
                    ('=', false) => (CmpOp::Eq, 1),
                    _ => return Err(invalid(format!("unexpected '!' at offset {}", i))),
                };
                tokens.push(Token::Op(op));
                i += width;
            }
            '\'' => {
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(invalid("unterminated string literal")),
                        Some('\'') => {
                            i += 1;
                            break;
                        }
                        Some('\\') if matches!(chars.get(i + 1), Some('\'') | Some('\\')) => {
                            s.push(chars[i + 1]);
                            i += 2;
                        }
                        Some(&ch) => {
                            s.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit()
                || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                while i < chars.len()
                    && (chars[i].is_ascii_digit()
                        || chars[i] == '.'
                        || chars[i] == 'e'
                        || chars[i] == 'E'
                        || ((chars[i] == '-' || chars[i] == '+')
                            && matches!(chars[i - 1], 'e' | 'E')))
                {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let n = literal
                    .parse::<f64>()
                    .map_err(|_| invalid(format!("bad number '{}'", literal)))?;
                tokens.push(Token::Num(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(invalid(format!(
                    "unexpected character '{}' at offset {}",
                    other, i
                )))
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(text: &str) -> Result<Self> {
        Ok(Self {
            tokens: tokenize(text)?,
            pos: 0,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", keyword)))
        }
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        if self.peek() == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(&token.to_string()))
        }
    }

    fn expect_end(&self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(invalid(format!("trailing input at {}", t))),
        }
    }

    fn unexpected(&self, wanted: &str) -> MapeError {
        match self.peek() {
            Some(t) => invalid(format!("expected {}, found {}", wanted, t)),
            None => invalid(format!("expected {}, found end of query", wanted)),
        }
    }

    fn query(&mut self) -> Result<Query> {
        self.expect_keyword("select")?;
        let fields = self.fields()?;
        self.expect_keyword("from")?;

        let stream = match self.next() {
            Some(Token::Ident(s)) if s == "MetricEvent" => StreamKind::MetricEvent,
            Some(Token::Ident(s)) if s == "MeasurementEvent" => StreamKind::MeasurementEvent,
            Some(t) => return Err(invalid(format!("unknown stream {}", t))),
            None => return Err(invalid("missing stream name")),
        };

        let filter = if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let expr = self.expr()?;
            self.expect(Token::RParen)?;
            Some(expr)
        } else {
            None
        };

        let condition = if self.eat_keyword("where") {
            Some(self.expr()?)
        } else {
            None
        };

        Ok(Query {
            fields,
            stream,
            filter,
            condition,
        })
    }

    fn fields(&mut self) -> Result<Fields> {
        if self.peek() == Some(&Token::Star) {
            self.pos += 1;
            return Ok(Fields::All);
        }

        let mut names = Vec::new();
        loop {
            match self.next() {
                Some(Token::Ident(name)) => names.push(name),
                _ => return Err(invalid("expected field name in select list")),
            }
            if self.peek() == Some(&Token::Comma) {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(Fields::Named(names))
    }

    fn expr(&mut self) -> Result<Expr> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("or") {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut left = self.unary()?;
        while self.eat_keyword("and") {
            let right = self.unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.eat_keyword("not") {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let expr = self.expr()?;
            self.expect(Token::RParen)?;
            return Ok(expr);
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr> {
        let path = match self.next() {
            Some(Token::Ident(path)) => path,
            Some(t) => return Err(invalid(format!("expected event path, found {}", t))),
            None => return Err(invalid("expected event path, found end of query")),
        };

        if self.eat_keyword("matches") {
            return match self.next() {
                Some(Token::Str(pattern)) => Ok(Expr::Matches { path, pattern }),
                _ => Err(invalid(format!("'{} matches' needs a quoted pattern", path))),
            };
        }

        let op = match self.next() {
            Some(Token::Op(op)) => op,
            _ => return Err(invalid(format!("expected comparison after '{}'", path))),
        };
        let literal = match self.next() {
            Some(Token::Num(n)) => Literal::Number(n),
            Some(Token::Str(s)) => Literal::Text(s),
            _ => return Err(invalid(format!("expected literal after '{} {}'", path, op))),
        };
        Ok(Expr::Compare { path, op, literal })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConfiguredMetric, MeasurementEvent, MetricEvent};

    fn metric_event(metric: &str, resource: &str, value: f64) -> MetricEvent {
        MetricEvent::new(ConfiguredMetric::new(metric, resource), value, "host")
    }

    #[test]
    fn test_build_query_default() {
        let query = build_query(None, None, None, None).unwrap();
        assert_eq!(query.to_string(), "select metric, value from MetricEvent");
        assert!(query.filter.is_none());
        assert!(query.condition.is_none());
    }

    #[test]
    fn test_build_query_splices_patterns() {
        let query = build_query(Some("res1"), None, Some("metricA"), Some("value > 10.0")).unwrap();
        assert_eq!(
            query.to_string(),
            "select metric, value from MetricEvent(metric.resourceURI matches 'res1' \
             and metric.metricURI matches 'metricA') where value > 10.0"
        );
    }

    #[test]
    fn test_build_query_ignores_blank_patterns() {
        let query = build_query(Some(""), Some("  "), None, Some("")).unwrap();
        assert_eq!(query.to_string(), "select metric, value from MetricEvent");
    }

    #[test]
    fn test_build_query_bad_condition() {
        let err = build_query(None, None, None, Some("value >")).unwrap_err();
        assert!(matches!(err, MapeError::InvalidQuery(_)));
    }

    #[test]
    fn test_display_reparses_to_same_ast() {
        let text = "select * from MeasurementEvent(instanceURI matches '/h\\'1/.*' or \
                    capabilityURI = 'cpu') where not (value >= -2.5 and value < 1e3)";
        let query = Query::parse(text).unwrap();
        let again = Query::parse(&query.to_string()).unwrap();
        assert_eq!(query, again);
    }

    #[test]
    fn test_precedence_and_binds_tighter() {
        let expr = parse_condition("value > 1 or value < 0 and value > -5").unwrap();
        assert!(matches!(expr, Expr::Or(_, ref r) if matches!(**r, Expr::And(..))));
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "select from MetricEvent",
            "select metric from Nowhere",
            "select metric from MetricEvent where",
            "select metric from MetricEvent(value > 1",
            "select metric from MetricEvent where value ! 3",
            "select metric from MetricEvent where value matches 3",
            "select metric from MetricEvent extra",
            "select metric from MetricEvent where resourceType = 'open",
        ] {
            assert!(
                matches!(Query::parse(bad), Err(MapeError::InvalidQuery(_))),
                "accepted: {}",
                bad
            );
        }
    }

    #[test]
    fn test_compile_rejects_bad_regex() {
        let query = Query::parse("select * from MetricEvent(resourceType matches '([')").unwrap();
        assert!(matches!(query.compile(), Err(MapeError::InvalidPattern { .. })));
    }

    #[test]
    fn test_threshold_match() {
        let compiled = build_query(Some("res1"), None, Some("metricA"), Some("value > 10.0"))
            .unwrap()
            .compile()
            .unwrap();

        let high = metric_event("metricA", "res1", 15.0);
        let low = metric_event("metricA", "res1", 5.0);
        let other = metric_event("metricB", "res1", 15.0);
        assert!(compiled.matches(&StreamEvent::Metric(&high)));
        assert!(!compiled.matches(&StreamEvent::Metric(&low)));
        assert!(!compiled.matches(&StreamEvent::Metric(&other)));
    }

    #[test]
    fn test_patterns_are_full_match() {
        let compiled = build_query(Some("res1"), None, None, None)
            .unwrap()
            .compile()
            .unwrap();
        let longer = metric_event("m", "res10", 1.0);
        assert!(!compiled.matches(&StreamEvent::Metric(&longer)));
    }

    #[test]
    fn test_stream_kind_filters() {
        let compiled = Query::parse("select * from MeasurementEvent where capabilityURI = 'cpu'")
            .unwrap()
            .compile()
            .unwrap();
        let measurement = MeasurementEvent::new("/host1", "cpu", 1.0);
        let metric = metric_event("cpu", "/host1", 1.0);
        assert!(compiled.matches(&StreamEvent::Measurement(&measurement)));
        assert!(!compiled.matches(&StreamEvent::Metric(&metric)));
    }

    #[test]
    fn test_unknown_path_never_matches() {
        let compiled = Query::parse("select * from MetricEvent where instanceURI = '/host1'")
            .unwrap()
            .compile()
            .unwrap();
        let event = metric_event("m", "/host1", 1.0);
        assert!(!compiled.matches(&StreamEvent::Metric(&event)));
    }

    #[test]
    fn test_poll_interval_path() {
        let compiled = Query::parse(
            "select * from MetricEvent where metric.metricPollTimeInterval <= 1000 and resourceType = 'host'",
        )
        .unwrap()
        .compile()
        .unwrap();
        let event = MetricEvent::new(
            ConfiguredMetric::new("m", "/host1")
                .with_poll_interval(std::time::Duration::from_millis(500)),
            0.0,
            "host",
        );
        assert!(compiled.matches(&StreamEvent::Metric(&event)));
    }
}
