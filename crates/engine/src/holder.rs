//! Forms and fieldsets.
//!
//! A [`Holder`] owns an ordered set of members: fields and nested fieldsets. Fieldsets
//! are holders of kind [`HolderKind::Fieldset`] and contribute a path segment, so a
//! field `name` inside fieldset `customer` is addressed as `customer.name`.

use formset_types::{FieldPath, FieldValue, FieldsetDescription, FormDescription, HolderConditions, MemberDescription};
use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::{
    condition::{InduceEvent, InduceKind, Inducer, Visibility, compile_optional},
    error::ConfigError,
    expression::{Expression, PathResolver},
    field::Field,
    tree::snapshot::ValueSnapshot,
    validate_member_name,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HolderKind {
    Form,
    Fieldset,
}

#[derive(Debug, Clone)]
pub enum HolderMember {
    Field(Field),
    Fieldset(Holder),
}

/// Open state of a form rendered as a dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogState {
    pub title: Option<String>,
    pub modal: bool,
    pub open: bool,
}

/// How an inducer closing a dialog treats its form, taken from the first argument of the
/// triggering `activate(...)` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMode {
    /// Close only when the form is valid.
    Apply,
    Close,
    /// Restore initial values and keep the dialog open.
    Reset,
    /// Restore initial values and close.
    Clear,
}

impl CloseMode {
    pub fn parse(argument: &str) -> Option<Self> {
        match argument {
            "apply" => Some(CloseMode::Apply),
            "close" => Some(CloseMode::Close),
            "reset" => Some(CloseMode::Reset),
            "clear" => Some(CloseMode::Clear),
            _ => None,
        }
    }
}

/// Where a holder sits, as far as construction rules are concerned.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Placement {
    /// Direct member of a stepper.
    pub is_step: bool,
    /// Somewhere beneath a repeatable collection.
    pub within_repeatable: bool,
}

#[derive(Debug, Clone)]
pub struct Holder {
    kind: HolderKind,
    name: String,
    path: FieldPath,
    legend: Option<String>,
    help_text: Option<String>,
    conditions: HolderConditions,
    visibility: Visibility,
    disable: Option<Expression>,
    inducers: Vec<Inducer>,
    dialog: Option<DialogState>,
    members: IndexMap<String, HolderMember>,
    errors: Vec<String>,
    hidden: bool,
    disabled: bool,
}

impl Holder {
    pub(crate) fn build_form(
        path: FieldPath,
        description: &FormDescription,
        initial: Option<&JsonValue>,
        placement: Placement,
    ) -> Result<Self, ConfigError> {
        let conditions = &description.conditions;
        let mut inducers = Vec::new();
        if let Some(source) = conditions.induce_open.as_deref() {
            inducers.push(Inducer::compile(&path, InduceKind::Open, source)?);
        }
        if let Some(source) = conditions.induce_close.as_deref() {
            inducers.push(Inducer::compile(&path, InduceKind::Close, source)?);
        }
        if let Some(source) = conditions.induce_activate.as_deref() {
            if !placement.is_step {
                return Err(ConfigError::MisplacedInducer {
                    path,
                    attribute: InduceKind::Activate.attribute(),
                });
            }
            inducers.push(Inducer::compile(&path, InduceKind::Activate, source)?);
        }

        let declares_dialog = description.dialog.is_some() || conditions.induce_open.is_some() || conditions.induce_close.is_some();
        let dialog = declares_dialog.then(|| {
            let declared = description.dialog.clone().unwrap_or_default();
            DialogState {
                title: declared.title,
                modal: declared.modal,
                open: false,
            }
        });

        let mut holder = Self::new(HolderKind::Form, path, conditions)?;
        holder.legend = description.legend.clone();
        holder.help_text = description.help_text.clone();
        holder.inducers = inducers;
        holder.dialog = dialog;
        holder.members = build_members(&holder.path, &description.members, initial)?;
        Ok(holder)
    }

    fn build_fieldset(path: FieldPath, description: &FieldsetDescription, initial: Option<&JsonValue>) -> Result<Self, ConfigError> {
        let conditions = &description.conditions;
        for (attribute, source) in [
            (InduceKind::Open.attribute(), &conditions.induce_open),
            (InduceKind::Close.attribute(), &conditions.induce_close),
            (InduceKind::Activate.attribute(), &conditions.induce_activate),
        ] {
            if source.is_some() {
                return Err(ConfigError::MisplacedInducer { path, attribute });
            }
        }
        let mut holder = Self::new(HolderKind::Fieldset, path, conditions)?;
        holder.legend = description.legend.clone();
        holder.help_text = description.help_text.clone();
        holder.members = build_members(&holder.path, &description.members, initial)?;
        Ok(holder)
    }

    fn new(kind: HolderKind, path: FieldPath, conditions: &HolderConditions) -> Result<Self, ConfigError> {
        Ok(Self {
            kind,
            name: path.last().unwrap_or_default().to_string(),
            visibility: Visibility::compile(&path, conditions.show_condition.as_deref(), conditions.hide_condition.as_deref())?,
            disable: compile_optional(&path, "disable", conditions.disable_condition.as_deref())?,
            conditions: conditions.clone(),
            path,
            legend: None,
            help_text: None,
            inducers: Vec::new(),
            dialog: None,
            members: IndexMap::new(),
            errors: Vec::new(),
            hidden: false,
            disabled: false,
        })
    }

    pub fn kind(&self) -> HolderKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn legend(&self) -> Option<&str> {
        self.legend.as_deref()
    }

    pub fn help_text(&self) -> Option<&str> {
        self.help_text.as_deref()
    }

    pub fn conditions(&self) -> &HolderConditions {
        &self.conditions
    }

    pub fn members(&self) -> &IndexMap<String, HolderMember> {
        &self.members
    }

    pub fn dialog(&self) -> Option<&DialogState> {
        self.dialog.as_ref()
    }

    pub fn is_dialog_open(&self) -> bool {
        self.dialog.as_ref().is_some_and(|dialog| dialog.open)
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Moves the holder and everything beneath it to `path`.
    pub(crate) fn rebase(&mut self, path: FieldPath) {
        for (name, member) in self.members.iter_mut() {
            match member {
                HolderMember::Field(field) => field.set_path(path.join(name.as_str())),
                HolderMember::Fieldset(fieldset) => fieldset.rebase(path.join(name.as_str())),
            }
        }
        self.name = path.last().unwrap_or_default().to_string();
        self.path = path;
    }

    /// All fields beneath this holder, depth first in declaration order.
    pub fn fields(&self) -> Vec<&Field> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, fields: &mut Vec<&'a Field>) {
        for member in self.members.values() {
            match member {
                HolderMember::Field(field) => fields.push(field),
                HolderMember::Fieldset(fieldset) => fieldset.collect_fields(fields),
            }
        }
    }

    pub(crate) fn for_each_field_mut(&mut self, visit: &mut dyn FnMut(&mut Field)) {
        for member in self.members.values_mut() {
            match member {
                HolderMember::Field(field) => visit(field),
                HolderMember::Fieldset(fieldset) => fieldset.for_each_field_mut(visit),
            }
        }
    }

    pub(crate) fn for_each_holder_mut(&mut self, visit: &mut dyn FnMut(&mut Holder)) {
        visit(self);
        for member in self.members.values_mut() {
            if let HolderMember::Fieldset(fieldset) = member {
                fieldset.for_each_holder_mut(visit);
            }
        }
    }

    pub fn field(&self, path: &FieldPath) -> Option<&Field> {
        let relative = path.strip_prefix(&self.path)?;
        let (last, parents) = relative.segments().split_last()?;
        let mut holder = self;
        for segment in parents {
            match holder.members.get(segment)? {
                HolderMember::Fieldset(fieldset) => holder = fieldset,
                HolderMember::Field(_) => return None,
            }
        }
        match holder.members.get(last)? {
            HolderMember::Field(field) => Some(field),
            HolderMember::Fieldset(_) => None,
        }
    }

    pub(crate) fn field_mut(&mut self, path: &FieldPath) -> Option<&mut Field> {
        let relative = path.strip_prefix(&self.path)?;
        let (last, parents) = relative.segments().split_last()?;
        let mut holder = self;
        for segment in parents {
            match holder.members.get_mut(segment)? {
                HolderMember::Fieldset(fieldset) => holder = fieldset,
                HolderMember::Field(_) => return None,
            }
        }
        match holder.members.get_mut(last)? {
            HolderMember::Field(field) => Some(field),
            HolderMember::Fieldset(_) => None,
        }
    }

    /// This holder or a nested fieldset at `path`.
    pub fn holder(&self, path: &FieldPath) -> Option<&Holder> {
        let relative = path.strip_prefix(&self.path)?;
        let mut holder = self;
        for segment in relative.segments() {
            match holder.members.get(segment)? {
                HolderMember::Fieldset(fieldset) => holder = fieldset,
                HolderMember::Field(_) => return None,
            }
        }
        Some(holder)
    }

    pub(crate) fn holder_mut(&mut self, path: &FieldPath) -> Option<&mut Holder> {
        let relative = path.strip_prefix(&self.path)?;
        let mut holder = self;
        for segment in relative.segments() {
            match holder.members.get_mut(segment)? {
                HolderMember::Fieldset(fieldset) => holder = fieldset,
                HolderMember::Field(_) => return None,
            }
        }
        Some(holder)
    }

    pub(crate) fn record_values(&self, snapshot: &mut ValueSnapshot) {
        for field in self.fields() {
            snapshot.record(field);
        }
    }

    /// Recomputes hidden/disabled flags of this holder and everything beneath it.
    pub(crate) fn refresh(&mut self, resolver: &dyn PathResolver, parent_hidden: bool, parent_disabled: bool) {
        self.hidden = parent_hidden || self.visibility.is_hidden(&self.path, resolver);
        self.disabled = parent_disabled
            || self
                .disable
                .as_ref()
                .is_some_and(|expression| expression.evaluate(&self.path, resolver));
        let (hidden, disabled) = (self.hidden, self.disabled);
        let scope = self.path.clone();
        for member in self.members.values_mut() {
            match member {
                HolderMember::Field(field) => field.refresh(&scope, resolver, hidden, disabled),
                HolderMember::Fieldset(fieldset) => fieldset.refresh(resolver, hidden, disabled),
            }
        }
    }

    /// Polls inducers; with `fire` unset the latches are updated without emitting events.
    pub(crate) fn poll_inducers(&mut self, resolver: &dyn PathResolver, fire: bool, events: &mut Vec<InduceEvent>) {
        for inducer in self.inducers.iter_mut() {
            if inducer.poll(&self.path, resolver) && fire {
                events.push(InduceEvent {
                    kind: inducer.kind,
                    path: self.path.clone(),
                });
            }
        }
    }

    pub fn inducers(&self) -> &[Inducer] {
        &self.inducers
    }

    /// Validates visible, enabled fields. Failures are appended to `failures`.
    ///
    /// Hidden holders are skipped entirely and count as valid.
    pub(crate) fn validate(&mut self, failures: &mut Vec<(FieldPath, Vec<String>)>) -> bool {
        if self.hidden {
            return true;
        }
        let mut valid = true;
        for member in self.members.values_mut() {
            match member {
                HolderMember::Field(field) if field.is_operable() => {
                    if let Err(messages) = field.validate() {
                        failures.push((field.path().clone(), messages));
                        valid = false;
                    }
                }
                HolderMember::Field(_) => {}
                HolderMember::Fieldset(fieldset) => valid &= fieldset.validate(failures),
            }
        }
        if valid {
            self.errors.clear();
        }
        valid
    }

    /// Validity without recording anything.
    pub fn is_valid(&self) -> bool {
        if self.hidden {
            return true;
        }
        self.members.values().all(|member| match member {
            HolderMember::Field(field) => !field.is_operable() || field.check().is_ok(),
            HolderMember::Fieldset(fieldset) => fieldset.is_valid(),
        }) && self.errors.is_empty()
    }

    /// Values of visible, enabled data fields keyed by absolute path.
    pub fn collect_data(&self, data: &mut IndexMap<FieldPath, FieldValue>) {
        if self.hidden {
            return;
        }
        for member in self.members.values() {
            match member {
                HolderMember::Field(field) if field.is_operable() => {
                    data.insert(field.path().clone(), field.value().clone());
                }
                HolderMember::Field(_) => {}
                HolderMember::Fieldset(fieldset) => fieldset.collect_data(data),
            }
        }
    }

    /// Flat wire mapping of dotted form-relative path → value.
    ///
    /// Disabled fields and Activators are omitted; hidden fields send a blank placeholder.
    pub fn wire_data(&self) -> JsonValue {
        let mut data = Map::new();
        for field in self.fields() {
            if field.is_activator() || field.is_disabled() {
                continue;
            }
            let key = field.path().strip_prefix(&self.path).unwrap_or_else(|| field.path().clone());
            data.insert(key.to_string(), field.wire_value());
        }
        JsonValue::Object(data)
    }

    /// Routes server errors to a field or to this holder's error slot.
    pub(crate) fn apply_errors(&mut self, path: &FieldPath, messages: &[String]) -> bool {
        if let Some(field) = self.field_mut(path) {
            field.set_errors(messages.to_vec());
            return true;
        }
        if let Some(holder) = self.holder_mut(path) {
            holder.errors.extend(messages.iter().cloned());
            return true;
        }
        false
    }

    pub(crate) fn clear_errors(&mut self) {
        self.for_each_holder_mut(&mut |holder| holder.errors.clear());
        self.for_each_field_mut(&mut |field| field.clear_errors());
    }

    pub(crate) fn reset(&mut self) {
        self.errors.clear();
        for member in self.members.values_mut() {
            match member {
                HolderMember::Field(field) => field.reset(),
                HolderMember::Fieldset(fieldset) => fieldset.reset(),
            }
        }
    }

    pub(crate) fn open_dialog(&mut self) -> bool {
        let Some(dialog) = self.dialog.as_mut() else {
            return false;
        };
        if dialog.open {
            return false;
        }
        dialog.open = true;
        self.clear_errors();
        debug!(path = %self.path, "dialog opened");
        true
    }

    /// Closes the dialog according to `mode`. Returns whether it was closed.
    pub(crate) fn close_dialog(&mut self, mode: CloseMode) -> bool {
        if !self.is_dialog_open() {
            return false;
        }
        let close = match mode {
            CloseMode::Apply => {
                let mut failures = Vec::new();
                self.validate(&mut failures)
            }
            CloseMode::Close => true,
            CloseMode::Reset => {
                self.reset();
                false
            }
            CloseMode::Clear => {
                self.reset();
                true
            }
        };
        if close && let Some(dialog) = self.dialog.as_mut() {
            dialog.open = false;
            debug!(path = %self.path, ?mode, "dialog closed");
        }
        close
    }
}

fn build_members(
    parent: &FieldPath,
    declarations: &IndexMap<String, MemberDescription>,
    initial: Option<&JsonValue>,
) -> Result<IndexMap<String, HolderMember>, ConfigError> {
    let mut members = IndexMap::with_capacity(declarations.len());
    for (name, declaration) in declarations {
        validate_member_name(parent, name)?;
        let path = parent.join(name.as_str());
        let initial = initial.and_then(|value| value.get(name));
        let member = match declaration {
            MemberDescription::Field(field) => HolderMember::Field(Field::build(path, field, initial)?),
            MemberDescription::Fieldset { fieldset } => HolderMember::Fieldset(Holder::build_fieldset(path, fieldset, initial)?),
        };
        members.insert(name.clone(), member);
    }
    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn customer_form() -> FormDescription {
        serde_yaml::from_str(
            r#"
members:
  customer:
    fieldset:
      legend: Customer
      hide_condition: no_customer
      members:
        name: { max_length: 100 }
        address: { max_length: 100 }
        phone_number: { required: false }
  no_customer: { widget: checkbox, required: false }
"#,
        )
        .expect("form description")
    }

    fn refreshed(mut holder: Holder) -> Holder {
        let mut snapshot = ValueSnapshot::default();
        holder.record_values(&mut snapshot);
        holder.refresh(&snapshot, false, false);
        holder
    }

    #[test]
    fn fieldset_members_are_addressed_through_the_fieldset() {
        let holder = Holder::build_form(FieldPath::root(), &customer_form(), None, Placement::default()).expect("build");
        assert!(holder.field(&FieldPath::parse("customer.name")).is_some());
        assert!(holder.field(&FieldPath::parse("name")).is_none());
        assert_eq!(holder.holder(&FieldPath::parse("customer")).map(Holder::kind), Some(HolderKind::Fieldset));
    }

    #[test]
    fn hidden_fieldset_is_skipped_and_keeps_values() {
        let initial = json!({"customer": {"name": "John Doe"}, "no_customer": true});
        let mut holder = refreshed(Holder::build_form(FieldPath::root(), &customer_form(), Some(&initial), Placement::default()).expect("build"));
        let fieldset = holder.holder(&FieldPath::parse("customer")).expect("fieldset");
        assert!(fieldset.is_hidden());

        let mut failures = Vec::new();
        assert!(holder.validate(&mut failures));
        let mut data = IndexMap::new();
        holder.collect_data(&mut data);
        assert_eq!(data.keys().map(ToString::to_string).collect::<Vec<_>>(), vec!["no_customer"]);
        assert_eq!(
            holder.field(&FieldPath::parse("customer.name")).map(Field::value),
            Some(&FieldValue::Text("John Doe".into()))
        );
        assert_eq!(holder.wire_data()["customer.name"], json!(""));
    }

    #[test]
    fn visible_required_fields_fail_validation() {
        let mut holder = refreshed(Holder::build_form(FieldPath::root(), &customer_form(), None, Placement::default()).expect("build"));
        let mut failures = Vec::new();
        assert!(!holder.validate(&mut failures));
        let failed: Vec<String> = failures.iter().map(|(path, _)| path.to_string()).collect();
        assert_eq!(failed, vec!["customer.name", "customer.address"]);
    }

    #[test]
    fn induce_activate_outside_a_stepper_is_rejected() {
        let description: FormDescription = serde_yaml::from_str("{ induce_activate: 'x:active', members: {} }").expect("description");
        let error = Holder::build_form(FieldPath::parse("shipping"), &description, None, Placement::default()).expect_err("must fail");
        assert!(matches!(error, ConfigError::MisplacedInducer { .. }));
        assert!(Holder::build_form(FieldPath::parse("shipping"), &description, None, Placement { is_step: true, ..Placement::default() }).is_ok());
    }

    #[test]
    fn fieldset_with_show_and_hide_is_fatal() {
        let description: FormDescription = serde_yaml::from_str(
            "{ members: { box: { fieldset: { show_condition: a, hide_condition: b, members: {} } } } }",
        )
        .expect("description");
        let error = Holder::build_form(FieldPath::root(), &description, None, Placement::default()).expect_err("must fail");
        assert!(matches!(error, ConfigError::ConflictingVisibility { path } if path.to_string() == "box"));
    }

    #[test]
    fn apply_close_mode_keeps_invalid_dialog_open() {
        let description: FormDescription = serde_yaml::from_str(
            "{ dialog: { title: Flavor }, members: { flavor: { widget: radio, choices: [vanilla] } } }",
        )
        .expect("description");
        let mut dialog = refreshed(Holder::build_form(FieldPath::parse("flavor"), &description, None, Placement::default()).expect("build"));
        assert!(dialog.open_dialog());
        assert!(!dialog.close_dialog(CloseMode::Apply));
        assert!(dialog.is_dialog_open());
        assert!(dialog.close_dialog(CloseMode::Clear));
        assert!(!dialog.is_dialog_open());
    }

    #[test]
    fn rebase_moves_every_field_path() {
        let mut holder = Holder::build_form(FieldPath::parse("orders.1.coffee"), &customer_form(), None, Placement::default()).expect("build");
        holder.rebase(FieldPath::parse("orders.0.coffee"));
        let paths: Vec<String> = holder.fields().iter().map(|field| field.path().to_string()).collect();
        assert_eq!(
            paths,
            vec![
                "orders.0.coffee.customer.name",
                "orders.0.coffee.customer.address",
                "orders.0.coffee.customer.phone_number",
                "orders.0.coffee.no_customer",
            ]
        );
    }
}
