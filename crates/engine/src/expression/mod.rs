//! Condition and induce expressions.
//!
//! Holders and fields carry small boolean expressions (`df-show`, `df-hide`, `df-disable`,
//! `df-require`, `df-induce-*`). They are parsed once when the tree is mounted and evaluated
//! after every mutation against a [`PathResolver`].
//!
//! Supported syntax:
//!
//! - dotted paths, absolute (`customer.name`) or relative (`.cancel`, `..contact.next`):
//!   one leading dot addresses the declaring holder itself, each further dot one ancestor up
//! - the `:active` suffix, true while the referenced Activator fires
//! - `!`, `&&`, `||` and parentheses
//! - `==` / `!=` against quoted strings, `true`/`false`, or numbers
//!
//! Precedence from loosest to tightest: `||`, `&&`, comparison, `!`.

mod evaluate;

use std::fmt;

use formset_types::FieldPath;
use thiserror::Error;

use crate::syntax::{
    find_top_level_operator, is_identifier, parentheses_balanced, split_top_level, strip_enclosing_parentheses, strip_leading_negations,
    unquote,
};

pub use evaluate::{Lookup, PathResolver};

/// Suffix marking an Activator reference.
pub const ACTIVE_SUFFIX: &str = ":active";

/// Parse failure for a condition expression.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("expression cannot be empty")]
    Empty,
    #[error("expression cannot end with a negation operator")]
    DanglingNegation,
    #[error("operator '{0}' is missing an operand")]
    MissingOperand(&'static str),
    #[error("unbalanced parentheses or quotes")]
    Unbalanced,
    #[error("unsupported operator '{0}'; only '==', '!=', '&&', '||' and '!' are supported")]
    UnsupportedOperator(String),
    #[error("unsupported suffix '{0}'; only ':active' is supported")]
    UnsupportedSuffix(String),
    #[error("invalid operand '{0}'")]
    InvalidOperand(String),
}

/// A reference to a field or Activator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathReference {
    /// Number of leading dots; `0` for absolute paths.
    pub ascend: usize,
    pub path: FieldPath,
}

impl PathReference {
    /// Parses `customer.name`, `.cancel` or `..contact.next`.
    pub fn parse(text: &str) -> Result<Self, ExpressionError> {
        let trimmed = text.trim();
        let ascend = trimmed.chars().take_while(|character| *character == '.').count();
        let rest = &trimmed[ascend..];
        if rest.is_empty() || !rest.split('.').all(is_identifier) {
            return Err(ExpressionError::InvalidOperand(trimmed.to_string()));
        }
        Ok(Self {
            ascend,
            path: FieldPath::parse(rest),
        })
    }

    pub fn is_relative(&self) -> bool {
        self.ascend > 0
    }

    /// Absolute paths this reference may denote, in lookup order.
    ///
    /// `scope` is the path of the holder declaring the expression. Relative references
    /// denote exactly one path. Absolute references are looked up from the tree root first
    /// and then against each ancestor scope of the declaring holder, nearest first, so that
    /// expressions inside repeated siblings can address their own sibling.
    pub fn candidates(&self, scope: &FieldPath) -> Vec<FieldPath> {
        if self.is_relative() {
            let keep = scope.len() + 1;
            if self.ascend > keep {
                return Vec::new();
            }
            return vec![scope.truncate(keep - self.ascend).extend(&self.path)];
        }

        let mut candidates = vec![self.path.clone()];
        let mut scopes: Vec<FieldPath> = vec![scope.clone()];
        scopes.extend(scope.ancestors().filter(|ancestor| !ancestor.is_root()));
        for ancestor in scopes.into_iter().filter(|ancestor| !ancestor.is_root()) {
            let candidate = ancestor.extend(&self.path);
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
        candidates
    }
}

impl fmt::Display for PathReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", ".".repeat(self.ascend), self.path)
    }
}

/// A literal on either side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Text(String),
    Bool(bool),
    Number(String),
}

impl Literal {
    pub fn as_text(&self) -> String {
        match self {
            Literal::Text(text) | Literal::Number(text) => text.clone(),
            Literal::Bool(flag) => flag.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// A field value, coerced to boolean by truthiness.
    Reference(PathReference),
    /// An Activator firing in the current action cycle.
    Active(PathReference),
    Literal(Literal),
    Not(Box<Expression>),
    And(Vec<Expression>),
    Or(Vec<Expression>),
    Compare {
        left: Box<Expression>,
        op: CompareOp,
        right: Box<Expression>,
    },
}

impl Expression {
    /// Parses an expression.
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(ExpressionError::Empty);
        }
        if !parentheses_balanced(trimmed) {
            return Err(ExpressionError::Unbalanced);
        }
        for unsupported in ["===", "!==", ">=", "<=", ">", "<"] {
            if find_top_level_operator(trimmed, unsupported).is_some() {
                return Err(ExpressionError::UnsupportedOperator(unsupported.to_string()));
            }
        }
        parse_node(trimmed)
    }
}

fn parse_node(expression: &str) -> Result<Expression, ExpressionError> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Err(ExpressionError::Empty);
    }

    if let Some(parts) = split_top_level(expression, "||") {
        return parse_parts(parts, "||").map(Expression::Or);
    }
    if let Some(parts) = split_top_level(expression, "&&") {
        return parse_parts(parts, "&&").map(Expression::And);
    }

    for (operator, op) in [("!=", CompareOp::NotEqual), ("==", CompareOp::Equal)] {
        if let Some(position) = find_top_level_operator(expression, operator) {
            let left = expression[..position].trim();
            let right = expression[position + operator.len()..].trim();
            if left.is_empty() || right.is_empty() {
                return Err(ExpressionError::MissingOperand(if op == CompareOp::Equal { "==" } else { "!=" }));
            }
            return Ok(Expression::Compare {
                left: Box::new(parse_unary(left)?),
                op,
                right: Box::new(parse_unary(right)?),
            });
        }
    }

    parse_unary(expression)
}

/// `!` binds tighter than comparisons: `!a == 'x'` compares the negation of `a`.
fn parse_unary(expression: &str) -> Result<Expression, ExpressionError> {
    let (negations, inner) = strip_leading_negations(expression.trim());
    let inner = inner.trim();
    if negations > 0 {
        if inner.is_empty() {
            return Err(ExpressionError::DanglingNegation);
        }
        let mut node = parse_unary(inner)?;
        for _ in 0..negations {
            node = Expression::Not(Box::new(node));
        }
        return Ok(node);
    }

    if let Some(unwrapped) = strip_enclosing_parentheses(inner) {
        return parse_node(unwrapped);
    }

    parse_operand(inner)
}

fn parse_parts(parts: Vec<&str>, operator: &'static str) -> Result<Vec<Expression>, ExpressionError> {
    parts
        .into_iter()
        .map(|part| {
            if part.is_empty() {
                Err(ExpressionError::MissingOperand(operator))
            } else {
                parse_node(part)
            }
        })
        .collect()
}

fn parse_operand(operand: &str) -> Result<Expression, ExpressionError> {
    let operand = operand.trim();
    if let Some(text) = unquote(operand) {
        return Ok(Expression::Literal(Literal::Text(text.to_string())));
    }
    match operand {
        "true" => return Ok(Expression::Literal(Literal::Bool(true))),
        "false" => return Ok(Expression::Literal(Literal::Bool(false))),
        _ => {}
    }
    if operand.parse::<f64>().is_ok() {
        return Ok(Expression::Literal(Literal::Number(operand.to_string())));
    }

    if let Some(colon) = operand.find(':') {
        let (path, suffix) = operand.split_at(colon);
        if suffix != ACTIVE_SUFFIX {
            return Err(ExpressionError::UnsupportedSuffix(suffix.to_string()));
        }
        return PathReference::parse(path).map(Expression::Active);
    }

    if operand.contains(char::is_whitespace) {
        return Err(ExpressionError::InvalidOperand(operand.to_string()));
    }
    PathReference::parse(operand).map(Expression::Reference)
}
