//! Computed-column formula engine.
//!
//! A formula is an arithmetic or boolean expression over column names, e.g.
//! `0.4 * Auto EPA + 0.6 * Teleop EPA` or `Deep Cage Climb > 0.5`. Field
//! names are matched in the lexer (longest name first, case-insensitive,
//! word-boundary anchored) so a short name that is a substring of a longer
//! one can never steal its match. The parser produces a closed expression
//! tree; evaluation walks the tree against one row's values and has no
//! access to anything else.

use itertools::Itertools;

use crate::catalog::{self, is_structural};
use crate::columns::ColumnKind;
use crate::data::{Row, Value};
use crate::error::{ComputeError, PicklistError};

/// Result of evaluating a formula against one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Number(f64),
    Bool(bool),
}

/// A validated formula, ready to evaluate per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    expr: Expr,
    referenced: Vec<String>,
}

impl Formula {
    /// Parses and validates `text` against the known field list. Structural
    /// fields are not substitutable and are excluded from the candidates.
    /// Validation resolves every referenced field to 1 and requires the
    /// result type to match the column kind.
    pub fn parse(
        text: &str,
        fields: &[String],
        kind: ColumnKind,
    ) -> Result<Formula, PicklistError> {
        let candidates = substitutable_fields(fields);
        let tokens = tokenize(text, &candidates);

        let referenced: Vec<String> = tokens
            .iter()
            .filter_map(|t| match t {
                Token::Field(name) => Some(name.clone()),
                _ => None,
            })
            .unique()
            .collect();
        if referenced.is_empty() {
            return Err(PicklistError::Validation(format!(
                "Formula must reference at least one column. Available columns: {}",
                candidates.iter().join(", ")
            )));
        }
        if tokens.iter().any(|t| matches!(t, Token::Unknown(_))) {
            return Err(syntax_error(kind, &candidates));
        }

        let expr = Parser::new(tokens)
            .parse()
            .map_err(|_| syntax_error(kind, &candidates))?;

        match (kind, expr.eval(&|_| Ok(1.0))) {
            (ColumnKind::Numeric, Ok(Outcome::Number(n))) if n.is_finite() => {}
            (ColumnKind::Numeric, _) => {
                return Err(PicklistError::Validation(
                    "Invalid formula. Check operators and parentheses.".to_string(),
                ));
            }
            (ColumnKind::Boolean, Ok(Outcome::Bool(_))) => {}
            (ColumnKind::Boolean, _) => {
                return Err(PicklistError::Validation(
                    "Invalid condition. Must evaluate to true/false. \
                     Use comparison operators: >, <, >=, <=, ==, !="
                        .to_string(),
                ));
            }
        }

        Ok(Formula { expr, referenced })
    }

    /// Field names the formula references, in first-appearance order.
    pub fn referenced(&self) -> &[String] {
        &self.referenced
    }

    /// Evaluates against one row. A referenced field resolves to its numeric
    /// value, to 0 when absent, and to an error when it holds text; the
    /// caller leaves that cell unset.
    pub fn evaluate(&self, row: &Row) -> Result<Outcome, ComputeError> {
        self.expr.eval(&|field| match catalog::lookup_value(row, field) {
            Some(Value::Number(n)) => Ok(*n),
            Some(_) => Err(ComputeError(format!(
                "column '{field}' holds a non-numeric value"
            ))),
            None => Ok(0.0),
        })
    }
}

/// Candidate field names for substitution: structural names removed, sorted
/// longest first so overlapping names match correctly.
fn substitutable_fields(fields: &[String]) -> Vec<String> {
    let mut candidates: Vec<String> = fields
        .iter()
        .filter(|f| !is_structural(f))
        .cloned()
        .collect();
    candidates.sort_by_key(|f| std::cmp::Reverse(f.len()));
    candidates
}

fn syntax_error(kind: ColumnKind, candidates: &[String]) -> PicklistError {
    let (noun, operators) = match kind {
        ColumnKind::Numeric => ("formula", "+, -, *, /"),
        ColumnKind::Boolean => ("condition", ">, <, >=, <=, ==, !=, &&, ||"),
    };
    PicklistError::Validation(format!(
        "Invalid {noun} syntax. Check column names, operators ({operators}), \
         and parentheses. Available columns: {}",
        candidates.iter().join(", ")
    ))
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Field(String),
    Negate(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

type Resolver<'a> = dyn Fn(&str) -> Result<f64, ComputeError> + 'a;

impl Expr {
    fn eval(&self, resolve: &Resolver) -> Result<Outcome, ComputeError> {
        match self {
            Expr::Number(n) => Ok(Outcome::Number(*n)),
            Expr::Field(name) => resolve(name).map(Outcome::Number),
            Expr::Negate(operand) => match operand.eval(resolve)? {
                Outcome::Number(n) => Ok(Outcome::Number(-n)),
                Outcome::Bool(_) => Err(ComputeError("cannot negate a boolean".to_string())),
            },
            Expr::Binary { op, lhs, rhs } => match op {
                // Logical operators short-circuit.
                BinOp::And => match lhs.eval(resolve)? {
                    Outcome::Bool(false) => Ok(Outcome::Bool(false)),
                    Outcome::Bool(true) => expect_bool(rhs.eval(resolve)?),
                    Outcome::Number(_) => Err(type_error("&&")),
                },
                BinOp::Or => match lhs.eval(resolve)? {
                    Outcome::Bool(true) => Ok(Outcome::Bool(true)),
                    Outcome::Bool(false) => expect_bool(rhs.eval(resolve)?),
                    Outcome::Number(_) => Err(type_error("||")),
                },
                _ => apply_binary(*op, lhs.eval(resolve)?, rhs.eval(resolve)?),
            },
        }
    }
}

fn expect_bool(outcome: Outcome) -> Result<Outcome, ComputeError> {
    match outcome {
        Outcome::Bool(_) => Ok(outcome),
        Outcome::Number(_) => Err(type_error("&&")),
    }
}

fn type_error(op: &str) -> ComputeError {
    ComputeError(format!("operator '{op}' applied to incompatible operands"))
}

fn apply_binary(op: BinOp, left: Outcome, right: Outcome) -> Result<Outcome, ComputeError> {
    use Outcome::{Bool, Number};
    match (op, left, right) {
        (BinOp::Add, Number(a), Number(b)) => Ok(Number(a + b)),
        (BinOp::Sub, Number(a), Number(b)) => Ok(Number(a - b)),
        (BinOp::Mul, Number(a), Number(b)) => Ok(Number(a * b)),
        (BinOp::Div, Number(a), Number(b)) => Ok(Number(a / b)),
        (BinOp::Lt, Number(a), Number(b)) => Ok(Bool(a < b)),
        (BinOp::Le, Number(a), Number(b)) => Ok(Bool(a <= b)),
        (BinOp::Gt, Number(a), Number(b)) => Ok(Bool(a > b)),
        (BinOp::Ge, Number(a), Number(b)) => Ok(Bool(a >= b)),
        (BinOp::Eq, Number(a), Number(b)) => Ok(Bool(a == b)),
        (BinOp::Eq, Bool(a), Bool(b)) => Ok(Bool(a == b)),
        (BinOp::Ne, Number(a), Number(b)) => Ok(Bool(a != b)),
        (BinOp::Ne, Bool(a), Bool(b)) => Ok(Bool(a != b)),
        (op, _, _) => Err(type_error(op_symbol(op))),
    }
}

fn op_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::And => "&&",
        BinOp::Or => "||",
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Field(String),
    Unknown(String),
    Plus,
    Minus,
    Star,
    Slash,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    Ne,
    And,
    Or,
    LParen,
    RParen,
}

/// Tokenizes the formula text. Never fails: anything unrecognized becomes an
/// `Unknown` token so the caller can distinguish "no column referenced" from
/// a syntax problem, in that order.
fn tokenize(text: &str, candidates: &[String]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < text.len() {
        let rest = &text[pos..];
        let ch = rest.chars().next().unwrap_or_default();
        if ch.is_whitespace() {
            pos += ch.len_utf8();
            continue;
        }

        if let Some((len, field)) = match_field(text, pos, candidates) {
            tokens.push(Token::Field(field.to_string()));
            pos += len;
            continue;
        }

        if ch.is_ascii_digit() || ch == '.' {
            let end = pos + scan_while(rest, |c| c.is_ascii_digit() || c == '.');
            match text[pos..end].parse::<f64>() {
                Ok(n) => tokens.push(Token::Number(n)),
                Err(_) => tokens.push(Token::Unknown(text[pos..end].to_string())),
            }
            pos = end;
            continue;
        }

        let two = text.get(pos..pos + 2).unwrap_or("");
        let token = match two {
            "<=" => Some((Token::Le, 2)),
            ">=" => Some((Token::Ge, 2)),
            "==" => Some((Token::EqEq, 2)),
            "!=" => Some((Token::Ne, 2)),
            "&&" => Some((Token::And, 2)),
            "||" => Some((Token::Or, 2)),
            _ => None,
        };
        if let Some((token, len)) = token {
            tokens.push(token);
            pos += len;
            continue;
        }

        let token = match ch {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '<' => Some(Token::Lt),
            '>' => Some(Token::Gt),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            _ => None,
        };
        if let Some(token) = token {
            tokens.push(token);
            pos += ch.len_utf8();
            continue;
        }

        if ch.is_alphanumeric() || ch == '_' {
            let end = pos + scan_while(rest, |c| c.is_alphanumeric() || c == '_');
            tokens.push(Token::Unknown(text[pos..end].to_string()));
            pos = end;
        } else {
            tokens.push(Token::Unknown(ch.to_string()));
            pos += ch.len_utf8();
        }
    }

    tokens
}

fn scan_while(rest: &str, accept: impl Fn(char) -> bool) -> usize {
    rest.char_indices()
        .find(|(_, c)| !accept(*c))
        .map(|(idx, _)| idx)
        .unwrap_or(rest.len())
}

/// Tries each candidate (already longest-first) at `pos`: case-insensitive
/// character match plus word boundaries on both sides.
fn match_field<'a>(text: &str, pos: usize, candidates: &'a [String]) -> Option<(usize, &'a str)> {
    let rest = &text[pos..];
    for field in candidates {
        if let Some(len) = match_ignore_case(rest, field) {
            if boundary_ok(text, pos, len, field) {
                return Some((len, field));
            }
        }
    }
    None
}

fn match_ignore_case(rest: &str, field: &str) -> Option<usize> {
    let mut chars = rest.char_indices();
    for expected in field.chars() {
        match chars.next() {
            Some((_, actual)) if chars_fold_eq(actual, expected) => {}
            _ => return None,
        }
    }
    Some(chars.next().map(|(idx, _)| idx).unwrap_or(rest.len()))
}

fn chars_fold_eq(a: char, b: char) -> bool {
    a == b || a.to_ascii_lowercase() == b.to_ascii_lowercase()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn boundary_ok(text: &str, pos: usize, len: usize, field: &str) -> bool {
    let starts_word = field.chars().next().is_some_and(is_word_char);
    let ends_word = field.chars().last().is_some_and(is_word_char);
    if starts_word && text[..pos].chars().last().is_some_and(is_word_char) {
        return false;
    }
    if ends_word && text[pos + len..].chars().next().is_some_and(is_word_char) {
        return false;
    }
    true
}

/// Recursive-descent parser with the usual precedence ladder:
/// `||` < `&&` < `==`/`!=` < relational < additive < multiplicative < unary.
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn parse(mut self) -> Result<Expr, ()> {
        let expr = self.parse_or()?;
        if self.pos != self.tokens.len() {
            return Err(());
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ()> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = binary(BinOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ()> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_equality()?;
            lhs = binary(BinOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, ()> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinOp::Eq,
                Some(Token::Ne) => BinOp::Ne,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_comparison()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ()> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinOp::Lt,
                Some(Token::Le) => BinOp::Le,
                Some(Token::Gt) => BinOp::Gt,
                Some(Token::Ge) => BinOp::Ge,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_additive()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, ()> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ()> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ()> {
        if self.eat(&Token::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Negate(Box::new(operand)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ()> {
        match self.peek().cloned() {
            Some(Token::Number(n)) => {
                self.pos += 1;
                Ok(Expr::Number(n))
            }
            Some(Token::Field(name)) => {
                self.pos += 1;
                Ok(Expr::Field(name))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let expr = self.parse_or()?;
                if !self.eat(&Token::RParen) {
                    return Err(());
                }
                Ok(expr)
            }
            _ => Err(()),
        }
    }
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::canonical_key;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn row_with(values: &[(&str, f64)]) -> Row {
        let mut row = Row::new(100, 1);
        for (name, value) in values {
            row.values
                .insert(canonical_key(name), Value::Number(*value));
        }
        row
    }

    #[test]
    fn weighted_sum_evaluates() {
        let formula = Formula::parse(
            "0.4 * Auto EPA + 0.6 * Teleop EPA",
            &fields(&["Picklist Order", "Team", "Auto EPA", "Teleop EPA"]),
            ColumnKind::Numeric,
        )
        .unwrap();
        let row = row_with(&[("Auto EPA", 10.0), ("Teleop EPA", 20.0)]);
        assert_eq!(formula.evaluate(&row).unwrap(), Outcome::Number(16.0));
    }

    #[test]
    fn longer_field_names_match_before_shorter_ones() {
        let formula = Formula::parse(
            "Auto EPA + EPA",
            &fields(&["EPA", "Auto EPA"]),
            ColumnKind::Numeric,
        )
        .unwrap();
        assert_eq!(formula.referenced(), ["Auto EPA", "EPA"]);
        let row = row_with(&[("Auto EPA", 5.0), ("EPA", 2.0)]);
        assert_eq!(formula.evaluate(&row).unwrap(), Outcome::Number(7.0));
    }

    #[test]
    fn field_matching_is_case_insensitive() {
        let formula = Formula::parse(
            "auto epa * 2",
            &fields(&["Auto EPA"]),
            ColumnKind::Numeric,
        )
        .unwrap();
        let row = row_with(&[("Auto EPA", 3.0)]);
        assert_eq!(formula.evaluate(&row).unwrap(), Outcome::Number(6.0));
    }

    #[test]
    fn missing_field_resolves_to_zero() {
        let formula = Formula::parse(
            "Climb > 0.5",
            &fields(&["Climb"]),
            ColumnKind::Boolean,
        )
        .unwrap();
        assert_eq!(
            formula.evaluate(&row_with(&[("Climb", 0.7)])).unwrap(),
            Outcome::Bool(true)
        );
        assert_eq!(
            formula.evaluate(&Row::new(200, 2)).unwrap(),
            Outcome::Bool(false)
        );
    }

    #[test]
    fn text_valued_field_is_a_compute_error() {
        let formula = Formula::parse(
            "Drivetrain + 1",
            &fields(&["Drivetrain"]),
            ColumnKind::Numeric,
        )
        .unwrap();
        let mut row = Row::new(100, 1);
        row.values.insert(
            canonical_key("Drivetrain"),
            Value::Text("swerve".to_string()),
        );
        assert!(formula.evaluate(&row).is_err());
    }

    #[test]
    fn structural_fields_are_not_substitutable() {
        let err = Formula::parse(
            "Team + 1",
            &fields(&["Picklist Order", "Team", "Rank"]),
            ColumnKind::Numeric,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must reference at least one column"));
    }

    #[test]
    fn no_referenced_column_is_reported_before_syntax() {
        let err = Formula::parse("1 + $", &fields(&["Auto EPA"]), ColumnKind::Numeric)
            .unwrap_err();
        assert!(err.to_string().contains("must reference at least one column"));
        assert!(err.to_string().contains("Auto EPA"));
    }

    #[test]
    fn unknown_identifier_is_a_syntax_error() {
        let err = Formula::parse(
            "Auto EPA + bogus",
            &fields(&["Auto EPA"]),
            ColumnKind::Numeric,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid formula syntax"));
    }

    #[test]
    fn numeric_kind_rejects_boolean_result() {
        let err = Formula::parse(
            "Auto EPA > 1",
            &fields(&["Auto EPA"]),
            ColumnKind::Numeric,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid formula. Check operators and parentheses."
        );
    }

    #[test]
    fn boolean_kind_rejects_numeric_result() {
        let err = Formula::parse(
            "Auto EPA + 1",
            &fields(&["Auto EPA"]),
            ColumnKind::Boolean,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Must evaluate to true/false"));
    }

    #[test]
    fn division_by_zero_fails_validation() {
        let err = Formula::parse(
            "Auto EPA / 0",
            &fields(&["Auto EPA"]),
            ColumnKind::Numeric,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid formula. Check operators and parentheses."
        );
    }

    #[test]
    fn precedence_follows_the_ladder() {
        let formula = Formula::parse(
            "A + B * 2 > 4 && A < B",
            &fields(&["A", "B"]),
            ColumnKind::Boolean,
        )
        .unwrap();
        let row = row_with(&[("A", 1.0), ("B", 2.0)]);
        // 1 + 4 > 4 && 1 < 2
        assert_eq!(formula.evaluate(&row).unwrap(), Outcome::Bool(true));
    }

    #[test]
    fn unary_minus_and_parentheses() {
        let formula = Formula::parse(
            "-(A - B) * 2",
            &fields(&["A", "B"]),
            ColumnKind::Numeric,
        )
        .unwrap();
        let row = row_with(&[("A", 1.0), ("B", 4.0)]);
        assert_eq!(formula.evaluate(&row).unwrap(), Outcome::Number(6.0));
    }

    #[test]
    fn adjacent_word_is_not_a_field_match() {
        // "AutoEPAx" must not match the field "AutoEPA"
        let err = Formula::parse(
            "AutoEPAx + 1",
            &fields(&["AutoEPA"]),
            ColumnKind::Numeric,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must reference at least one column"));
    }
}
