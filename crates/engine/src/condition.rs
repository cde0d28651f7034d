//! Compiled show/hide/disable/require conditions and edge-triggered inducers.

use formset_types::FieldPath;

use crate::{
    error::ConfigError,
    expression::{Expression, PathResolver},
};

/// Visibility rule of a holder or field. Show and hide are mutually exclusive.
#[derive(Debug, Clone, Default)]
pub enum Visibility {
    #[default]
    Always,
    ShowWhen(Expression),
    HideWhen(Expression),
}

impl Visibility {
    /// Compiles a show/hide pair, refusing configurations that set both.
    pub fn compile(path: &FieldPath, show: Option<&str>, hide: Option<&str>) -> Result<Self, ConfigError> {
        match (show, hide) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingVisibility { path: path.clone() }),
            (Some(show), None) => compile_expression(path, "show", show).map(Visibility::ShowWhen),
            (None, Some(hide)) => compile_expression(path, "hide", hide).map(Visibility::HideWhen),
            (None, None) => Ok(Visibility::Always),
        }
    }

    pub fn is_hidden(&self, scope: &FieldPath, resolver: &dyn PathResolver) -> bool {
        match self {
            Visibility::Always => false,
            Visibility::ShowWhen(expression) => !expression.evaluate(scope, resolver),
            Visibility::HideWhen(expression) => expression.evaluate(scope, resolver),
        }
    }
}

pub(crate) fn compile_expression(path: &FieldPath, attribute: &'static str, source: &str) -> Result<Expression, ConfigError> {
    Expression::parse(source).map_err(|source| ConfigError::InvalidExpression {
        path: path.clone(),
        attribute,
        source,
    })
}

pub(crate) fn compile_optional(path: &FieldPath, attribute: &'static str, source: Option<&str>) -> Result<Option<Expression>, ConfigError> {
    source.map(|source| compile_expression(path, attribute, source)).transpose()
}

/// What an inducer does when its expression turns true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InduceKind {
    Open,
    Close,
    Activate,
}

impl InduceKind {
    pub fn attribute(&self) -> &'static str {
        match self {
            InduceKind::Open => "induce_open",
            InduceKind::Close => "induce_close",
            InduceKind::Activate => "induce_activate",
        }
    }
}

/// A fired inducer, addressed by the path of the holder or collection declaring it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct InduceEvent {
    pub kind: InduceKind,
    pub path: FieldPath,
}

/// An induce expression with its edge latch.
///
/// The latch remembers the last evaluated value, so the action fires only on the
/// false → true transition.
#[derive(Debug, Clone)]
pub struct Inducer {
    pub kind: InduceKind,
    pub source: String,
    expression: Expression,
    latched: bool,
}

impl Inducer {
    pub fn compile(path: &FieldPath, kind: InduceKind, source: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            kind,
            source: source.to_string(),
            expression: compile_expression(path, kind.attribute(), source)?,
            latched: false,
        })
    }

    /// Re-evaluates the expression and returns `true` on a rising edge.
    pub fn poll(&mut self, scope: &FieldPath, resolver: &dyn PathResolver) -> bool {
        let value = self.expression.evaluate(scope, resolver);
        let rising = value && !self.latched;
        self.latched = value;
        rising
    }
}

#[cfg(test)]
mod tests {
    use formset_types::FieldValue;

    use super::*;
    use crate::expression::Lookup;

    struct Flag(FieldValue);

    impl PathResolver for Flag {
        fn lookup(&self, path: &FieldPath) -> Option<Lookup<'_>> {
            (path.to_string() == "toggle").then_some(Lookup::Value(&self.0))
        }
    }

    #[test]
    fn configuring_show_and_hide_together_is_fatal() {
        let error = Visibility::compile(&FieldPath::parse("customer"), Some("a"), Some("b")).expect_err("must fail");
        assert!(matches!(error, ConfigError::ConflictingVisibility { .. }));
    }

    #[test]
    fn hide_condition_hides_while_true() {
        let visibility = Visibility::compile(&FieldPath::parse("customer"), None, Some("toggle")).expect("compile");
        assert!(visibility.is_hidden(&FieldPath::root(), &Flag(FieldValue::Flag(true))));
        assert!(!visibility.is_hidden(&FieldPath::root(), &Flag(FieldValue::Flag(false))));
    }

    #[test]
    fn inducer_fires_once_per_rising_edge() {
        let mut inducer = Inducer::compile(&FieldPath::parse("dialog"), InduceKind::Open, "toggle").expect("compile");
        let scope = FieldPath::parse("dialog");
        let on = Flag(FieldValue::Flag(true));
        let off = Flag(FieldValue::Flag(false));
        assert!(inducer.poll(&scope, &on));
        assert!(!inducer.poll(&scope, &on));
        assert!(!inducer.poll(&scope, &off));
        assert!(inducer.poll(&scope, &on));
    }
}
