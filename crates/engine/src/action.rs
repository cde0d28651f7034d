//! Activator action pipelines.
//!
//! An Activator declares what happens when it is clicked as a chain of calls:
//!
//! ```text
//! submitPartial -> setFieldValue(page.reporter, ^reporter_id) -> activate("clear")
//! disable -> submit -> proceed !~ enable
//! ```
//!
//! Calls left of `!~` form the success chain and run in order; the first failing call
//! (a rejected validation or submission) abandons it and runs the reject chain instead.

use std::fmt;

use thiserror::Error;

use crate::{
    expression::{ExpressionError, PathReference},
    syntax::{is_identifier, split_top_level, strip_enclosing_parentheses, unquote},
};

/// Pipeline used by Activators that do not declare one.
pub const DEFAULT_ACTION: &str = "activate";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("action pipeline cannot be empty")]
    Empty,
    #[error("action pipeline may contain at most one '!~'")]
    MultipleRejectChains,
    #[error("'->' is missing a call on one side")]
    DanglingArrow,
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    #[error("malformed call '{0}'")]
    MalformedCall(String),
    #[error("action '{name}' expects {expected} argument(s), got {actual}")]
    Arity { name: &'static str, expected: &'static str, actual: usize },
    #[error("invalid argument '{argument}': {source}")]
    InvalidArgument {
        argument: String,
        #[source]
        source: ExpressionError,
    },
}

/// An argument passed to an action call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionArg {
    Text(String),
    Number(String),
    Bool(bool),
    Path(PathReference),
    /// `^key`: a value from the body of the last successful response.
    ResponseValue(String),
}

impl fmt::Display for ActionArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionArg::Text(text) => write!(f, "\"{text}\""),
            ActionArg::Number(number) => f.write_str(number),
            ActionArg::Bool(flag) => write!(f, "{flag}"),
            ActionArg::Path(reference) => write!(f, "{reference}"),
            ActionArg::ResponseValue(key) => write!(f, "^{key}"),
        }
    }
}

/// One step of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionCall {
    /// Marks the Activator active for one cycle; the arguments are handed to inducers
    /// (dialogs read `"apply"`, `"close"`, `"reset"` or `"clear"` from the first one).
    Activate(Vec<ActionArg>),
    /// Validates and submits the whole tree.
    Submit,
    /// Validates and submits the holder owning the Activator.
    SubmitPartial,
    /// Copies a value into `target`.
    SetFieldValue { target: PathReference, source: ActionArg },
    /// Blanks the value at `target`.
    DeleteValue(PathReference),
    /// Restores initial values of the whole tree.
    Reset,
    /// Disables the Activator itself.
    Disable,
    Enable,
    /// Emits a redirect, to `url` or to the `success_url` of the last response.
    Proceed(Option<String>),
    ClearErrors,
    Noop,
}

impl ActionCall {
    pub fn name(&self) -> &'static str {
        match self {
            ActionCall::Activate(_) => "activate",
            ActionCall::Submit => "submit",
            ActionCall::SubmitPartial => "submitPartial",
            ActionCall::SetFieldValue { .. } => "setFieldValue",
            ActionCall::DeleteValue(_) => "deleteValue",
            ActionCall::Reset => "reset",
            ActionCall::Disable => "disable",
            ActionCall::Enable => "enable",
            ActionCall::Proceed(_) => "proceed",
            ActionCall::ClearErrors => "clearErrors",
            ActionCall::Noop => "noop",
        }
    }

    fn parse(source: &str) -> Result<Self, ActionError> {
        let source = source.trim();
        let (name, arguments) = match source.find('(') {
            Some(open) => {
                let name = source[..open].trim();
                let Some(inner) = strip_enclosing_parentheses(&source[open..]) else {
                    return Err(ActionError::MalformedCall(source.to_string()));
                };
                (name, parse_arguments(inner)?)
            }
            None => (source, Vec::new()),
        };
        if !is_identifier(name) {
            return Err(ActionError::MalformedCall(source.to_string()));
        }

        let call = match name {
            "activate" => ActionCall::Activate(arguments),
            "submit" => expect_none("submit", arguments, ActionCall::Submit)?,
            "submitPartial" => expect_none("submitPartial", arguments, ActionCall::SubmitPartial)?,
            "setFieldValue" => {
                let actual = arguments.len();
                let mut arguments = arguments.into_iter();
                match (arguments.next(), arguments.next(), arguments.next()) {
                    (Some(ActionArg::Path(target)), Some(source), None) => ActionCall::SetFieldValue { target, source },
                    _ => {
                        return Err(ActionError::Arity {
                            name: "setFieldValue",
                            expected: "a target path and a source",
                            actual,
                        });
                    }
                }
            }
            "deleteValue" => {
                let actual = arguments.len();
                match <[ActionArg; 1]>::try_from(arguments) {
                    Ok([ActionArg::Path(target)]) => ActionCall::DeleteValue(target),
                    _ => {
                        return Err(ActionError::Arity {
                            name: "deleteValue",
                            expected: "one path",
                            actual,
                        });
                    }
                }
            }
            "reset" => expect_none("reset", arguments, ActionCall::Reset)?,
            "disable" => expect_none("disable", arguments, ActionCall::Disable)?,
            "enable" => expect_none("enable", arguments, ActionCall::Enable)?,
            "proceed" => match arguments.as_slice() {
                [] => ActionCall::Proceed(None),
                [ActionArg::Text(url)] => ActionCall::Proceed(Some(url.clone())),
                _ => {
                    return Err(ActionError::Arity {
                        name: "proceed",
                        expected: "at most one quoted url",
                        actual: arguments.len(),
                    });
                }
            },
            "clearErrors" => expect_none("clearErrors", arguments, ActionCall::ClearErrors)?,
            "noop" => ActionCall::Noop,
            other => return Err(ActionError::UnknownAction(other.to_string())),
        };
        Ok(call)
    }
}

fn expect_none(name: &'static str, arguments: Vec<ActionArg>, call: ActionCall) -> Result<ActionCall, ActionError> {
    if arguments.is_empty() {
        Ok(call)
    } else {
        Err(ActionError::Arity {
            name,
            expected: "no",
            actual: arguments.len(),
        })
    }
}

fn parse_arguments(inner: &str) -> Result<Vec<ActionArg>, ActionError> {
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    let parts = split_top_level(inner, ",").unwrap_or_else(|| vec![inner.trim()]);
    parts.into_iter().map(parse_argument).collect()
}

fn parse_argument(argument: &str) -> Result<ActionArg, ActionError> {
    let argument = argument.trim();
    if let Some(text) = unquote(argument) {
        return Ok(ActionArg::Text(text.to_string()));
    }
    if let Some(key) = argument.strip_prefix('^') {
        if !is_identifier(key) {
            return Err(ActionError::MalformedCall(argument.to_string()));
        }
        return Ok(ActionArg::ResponseValue(key.to_string()));
    }
    match argument {
        "true" => return Ok(ActionArg::Bool(true)),
        "false" => return Ok(ActionArg::Bool(false)),
        _ => {}
    }
    if argument.parse::<f64>().is_ok() {
        return Ok(ActionArg::Number(argument.to_string()));
    }
    PathReference::parse(argument)
        .map(ActionArg::Path)
        .map_err(|source| ActionError::InvalidArgument {
            argument: argument.to_string(),
            source,
        })
}

/// A parsed pipeline: the success chain and the optional reject chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionPipeline {
    pub success_chain: Vec<ActionCall>,
    pub reject_chain: Vec<ActionCall>,
}

impl Default for ActionPipeline {
    fn default() -> Self {
        Self {
            success_chain: vec![ActionCall::Activate(Vec::new())],
            reject_chain: Vec::new(),
        }
    }
}

impl ActionPipeline {
    pub fn parse(source: &str) -> Result<Self, ActionError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(ActionError::Empty);
        }
        let (success, reject) = match split_top_level(source, "!~") {
            None => (source, None),
            Some(parts) if parts.len() == 2 => (parts[0], Some(parts[1])),
            Some(_) => return Err(ActionError::MultipleRejectChains),
        };
        let success_chain = parse_chain(success)?;
        let reject_chain = match reject {
            Some(reject) => parse_chain(reject)?,
            None => Vec::new(),
        };
        Ok(Self {
            success_chain,
            reject_chain,
        })
    }

    /// Whether any call leaves the client.
    pub fn submits(&self) -> bool {
        self.success_chain
            .iter()
            .any(|call| matches!(call, ActionCall::Submit | ActionCall::SubmitPartial))
    }
}

fn parse_chain(chain: &str) -> Result<Vec<ActionCall>, ActionError> {
    if chain.trim().is_empty() {
        return Err(ActionError::Empty);
    }
    let parts = split_top_level(chain, "->").unwrap_or_else(|| vec![chain.trim()]);
    parts
        .into_iter()
        .map(|part| if part.is_empty() { Err(ActionError::DanglingArrow) } else { ActionCall::parse(part) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use formset_types::FieldPath;

    #[test]
    fn parses_dialog_submission_pipeline() {
        let pipeline = ActionPipeline::parse(r#"submitPartial -> setFieldValue(page.reporter, ^reporter_id) -> activate("clear")"#)
            .expect("parse pipeline");
        assert_eq!(pipeline.success_chain.len(), 3);
        assert_eq!(pipeline.success_chain[0], ActionCall::SubmitPartial);
        assert_eq!(
            pipeline.success_chain[1],
            ActionCall::SetFieldValue {
                target: PathReference {
                    ascend: 0,
                    path: FieldPath::parse("page.reporter"),
                },
                source: ActionArg::ResponseValue("reporter_id".into()),
            }
        );
        assert_eq!(pipeline.success_chain[2], ActionCall::Activate(vec![ActionArg::Text("clear".into())]));
        assert!(pipeline.reject_chain.is_empty());
        assert!(pipeline.submits());
    }

    #[test]
    fn splits_reject_chain() {
        let pipeline = ActionPipeline::parse("disable -> submit -> proceed !~ enable").expect("parse pipeline");
        assert_eq!(pipeline.success_chain, vec![ActionCall::Disable, ActionCall::Submit, ActionCall::Proceed(None)]);
        assert_eq!(pipeline.reject_chain, vec![ActionCall::Enable]);
    }

    #[test]
    fn activate_accepts_text_and_path_arguments() {
        let pipeline = ActionPipeline::parse(r#"activate("prefill", page.reporter)"#).expect("parse pipeline");
        let ActionCall::Activate(arguments) = &pipeline.success_chain[0] else {
            panic!("expected activate");
        };
        assert_eq!(arguments[0], ActionArg::Text("prefill".into()));
        assert!(matches!(&arguments[1], ActionArg::Path(reference) if reference.path == FieldPath::parse("page.reporter")));
    }

    #[test]
    fn default_pipeline_only_activates() {
        assert_eq!(ActionPipeline::default().success_chain, vec![ActionCall::Activate(Vec::new())]);
        assert_eq!(ActionPipeline::parse(DEFAULT_ACTION).expect("parse"), ActionPipeline::default());
    }

    #[test]
    fn rejects_malformed_pipelines() {
        assert_eq!(ActionPipeline::parse(""), Err(ActionError::Empty));
        assert_eq!(ActionPipeline::parse("submit ->"), Err(ActionError::DanglingArrow));
        assert_eq!(ActionPipeline::parse("a !~ b !~ c"), Err(ActionError::MultipleRejectChains));
        assert_eq!(ActionPipeline::parse("explode"), Err(ActionError::UnknownAction("explode".into())));
        assert!(matches!(ActionPipeline::parse("submit(1)"), Err(ActionError::Arity { name: "submit", .. })));
        assert!(matches!(ActionPipeline::parse("setFieldValue(^id)"), Err(ActionError::Arity { .. })));
        assert!(matches!(ActionPipeline::parse("activate(\"x\""), Err(ActionError::MalformedCall(_))));
    }
}
