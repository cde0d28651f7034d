use formset_types::{FieldPath, FieldValue};

use super::{CompareOp, Expression, Literal, PathReference};

/// What a path resolves to in the mounted tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    Value(&'a FieldValue),
    /// An Activator and whether it fires in the current action cycle.
    Activator { active: bool },
}

/// Read access to the tree used during evaluation.
pub trait PathResolver {
    fn lookup(&self, path: &FieldPath) -> Option<Lookup<'_>>;
}

impl Expression {
    /// Evaluates the expression for a holder located at `scope`.
    ///
    /// References that resolve to nothing are falsy, and so is any comparison involving one.
    pub fn evaluate(&self, scope: &FieldPath, resolver: &dyn PathResolver) -> bool {
        match self {
            Expression::Reference(reference) => match resolve(reference, scope, resolver) {
                Some(Lookup::Value(value)) => value.is_truthy(),
                Some(Lookup::Activator { active }) => active,
                None => false,
            },
            Expression::Active(reference) => {
                matches!(resolve(reference, scope, resolver), Some(Lookup::Activator { active: true }))
            }
            Expression::Literal(literal) => literal_truthiness(literal),
            Expression::Not(inner) => !inner.evaluate(scope, resolver),
            Expression::And(items) => items.iter().all(|item| item.evaluate(scope, resolver)),
            Expression::Or(items) => items.iter().any(|item| item.evaluate(scope, resolver)),
            Expression::Compare { left, op, right } => {
                let Some(equal) = compare(left, right, scope, resolver) else {
                    return false;
                };
                match op {
                    CompareOp::Equal => equal,
                    CompareOp::NotEqual => !equal,
                }
            }
        }
    }
}

fn resolve<'a>(reference: &PathReference, scope: &FieldPath, resolver: &'a dyn PathResolver) -> Option<Lookup<'a>> {
    reference.candidates(scope).iter().find_map(|candidate| resolver.lookup(candidate))
}

fn literal_truthiness(literal: &Literal) -> bool {
    match literal {
        Literal::Bool(flag) => *flag,
        Literal::Text(text) => !text.is_empty(),
        Literal::Number(number) => number.parse::<f64>().map(|value| value != 0.0).unwrap_or(false),
    }
}

/// Operand reduced to something comparable.
enum Operand<'a> {
    Value(&'a FieldValue),
    Flag(bool),
    Literal(&'a Literal),
}

fn operand<'a>(expression: &'a Expression, scope: &FieldPath, resolver: &'a dyn PathResolver) -> Option<Operand<'a>> {
    match expression {
        Expression::Reference(reference) => match resolve(reference, scope, resolver)? {
            Lookup::Value(value) => Some(Operand::Value(value)),
            Lookup::Activator { active } => Some(Operand::Flag(active)),
        },
        Expression::Literal(literal) => Some(Operand::Literal(literal)),
        other => Some(Operand::Flag(other.evaluate(scope, resolver))),
    }
}

fn compare(left: &Expression, right: &Expression, scope: &FieldPath, resolver: &dyn PathResolver) -> Option<bool> {
    let left = operand(left, scope, resolver)?;
    let right = operand(right, scope, resolver)?;
    Some(match (left, right) {
        (Operand::Value(value), Operand::Literal(literal)) | (Operand::Literal(literal), Operand::Value(value)) => {
            value_matches_literal(value, literal)
        }
        (Operand::Value(a), Operand::Value(b)) => a == b || a.as_text() == b.as_text(),
        (Operand::Literal(a), Operand::Literal(b)) => a.as_text() == b.as_text(),
        (Operand::Flag(flag), Operand::Literal(literal)) | (Operand::Literal(literal), Operand::Flag(flag)) => {
            flag == literal_truthiness(literal)
        }
        (Operand::Flag(flag), Operand::Value(value)) | (Operand::Value(value), Operand::Flag(flag)) => flag == value.is_truthy(),
        (Operand::Flag(a), Operand::Flag(b)) => a == b,
    })
}

fn value_matches_literal(value: &FieldValue, literal: &Literal) -> bool {
    match literal {
        Literal::Bool(flag) => value.is_truthy() == *flag,
        Literal::Text(text) => value.matches_text(text),
        Literal::Number(number) => match (value.as_text().trim().parse::<f64>(), number.parse::<f64>()) {
            (Ok(actual), Ok(expected)) => actual == expected,
            _ => value.matches_text(number),
        },
    }
}
