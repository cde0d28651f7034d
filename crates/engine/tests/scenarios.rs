use formset_engine::{Effect, FormsetTree, Rejection, TransportError, parse_description_str};
use formset_types::{ErrorMap, FieldValue, SubmissionMethod, SubmissionResponse};
use serde_json::json;

fn mount(document: &str) -> FormsetTree {
    let description = parse_description_str(document).expect("parse description");
    FormsetTree::mount(&description, None).expect("mount description")
}

fn text(value: &str) -> FieldValue {
    FieldValue::Text(value.to_string())
}

fn set(tree: &mut FormsetTree, path: &str, value: FieldValue) {
    let path = tree.path(path);
    tree.set_value(&path, value).unwrap_or_else(|rejection| panic!("set {path}: {rejection}"));
}

fn click(tree: &mut FormsetTree, path: &str) -> formset_engine::CycleReport {
    let path = tree.path(path);
    tree.click(&path).unwrap_or_else(|rejection| panic!("click {path}: {rejection}"))
}

#[test]
fn customer_submits_visible_fields() {
    let mut tree = mount(include_str!("data/customer.yaml"));
    set(&mut tree, "customer.name", text("John Doe"));
    set(&mut tree, "customer.address", text("123, Lye Street"));

    let report = click(&mut tree, "submit");
    let request = report.pending_submission().expect("submission requested");
    assert_eq!(request.method, SubmissionMethod::Post);
    assert_eq!(
        serde_json::to_value(&request.payload).expect("serialize payload"),
        json!({"formset_data": {
            "customer.name": "John Doe",
            "customer.address": "123, Lye Street",
            "customer.phone_number": "",
            "no_customer": ""
        }})
    );
    assert!(tree.is_busy());

    let report = tree
        .complete_submission(Ok(SubmissionResponse::ok(json!({"success_url": "/thanks"}))))
        .expect("pending submission");
    assert_eq!(report.redirect(), Some("/thanks"));
    assert!(!tree.is_busy());
}

#[test]
fn hiding_the_customer_withholds_its_values() {
    let mut tree = mount(include_str!("data/customer.yaml"));
    set(&mut tree, "customer.name", text("John Doe"));
    set(&mut tree, "no_customer", FieldValue::Flag(true));

    assert!(tree.field(&tree.path("customer.name")).expect("field").is_hidden());
    let collected = tree.collect_data();
    assert_eq!(collected.keys().map(ToString::to_string).collect::<Vec<_>>(), vec!["no_customer"]);

    let report = click(&mut tree, "submit");
    let request = report.pending_submission().expect("hidden required fields do not block");
    assert_eq!(
        request.payload.formset_data,
        json!({
            "customer.name": "",
            "customer.address": "",
            "customer.phone_number": "",
            "no_customer": "on"
        })
    );
}

#[test]
fn showing_the_customer_again_restores_its_values() {
    let mut tree = mount(include_str!("data/customer.yaml"));
    set(&mut tree, "customer.name", text("John Doe"));
    set(&mut tree, "no_customer", FieldValue::Flag(true));

    let name = tree.path("customer.name");
    assert_eq!(tree.set_value(&name, text("Jane")), Err(Rejection::Hidden(name.clone())));

    set(&mut tree, "no_customer", FieldValue::Flag(false));
    assert_eq!(tree.value(&name), Some(&text("John Doe")));
}

#[test]
fn invalid_phone_number_uses_the_custom_message() {
    let mut tree = mount(include_str!("data/customer.yaml"));
    set(&mut tree, "customer.name", text("John Doe"));
    set(&mut tree, "customer.address", text("123, Lye Street"));
    set(&mut tree, "customer.phone_number", text("12"));

    let report = click(&mut tree, "submit");
    assert!(report.pending_submission().is_none());
    let validation = report.validation.expect("validation report");
    assert_eq!(validation.status, 422);
    assert_eq!(
        validation.errors["customer.phone_number"],
        vec!["Phone number have 4-25 digits and may start with '+'."]
    );
    assert!(!tree.is_busy());
}

#[test]
fn checkout_blocks_an_empty_first_step() {
    let mut tree = mount(include_str!("data/checkout.yaml"));
    let root = tree.root_path().clone();

    let report = click(&mut tree, "contact.next");
    let validation = report.validation.expect("blocked advance reports errors");
    assert_eq!(validation.status, 422);
    assert_eq!(validation.errors.len(), 2);
    assert_eq!(validation.errors["contact.first_name"], vec!["This field is required."]);
    assert_eq!(validation.errors["contact.last_name"], vec!["This field is required."]);
    assert_eq!(tree.stepper(&root).expect("stepper").current(), 0);
}

#[test]
fn checkout_walks_through_every_step_and_submits_nested_data() {
    let mut tree = mount(include_str!("data/checkout.yaml"));
    let root = tree.root_path().clone();

    set(&mut tree, "contact.first_name", text("Ada"));
    set(&mut tree, "contact.last_name", text("Lovelace"));
    let report = click(&mut tree, "contact.next");
    assert!(report.validation.is_none());
    assert_eq!(tree.stepper(&root).expect("stepper").current(), 1);

    set(&mut tree, "shipping.street", text("1 Main Street"));
    set(&mut tree, "shipping.zip_code", text("12345"));
    set(&mut tree, "shipping.city", text("London"));
    click(&mut tree, "shipping.next");
    assert_eq!(tree.stepper(&root).expect("stepper").current(), 2);

    let back = tree.activate_step(&root, 0).expect("visited step");
    assert!(back.validation.is_none());
    assert_eq!(tree.stepper(&root).expect("stepper").current(), 0);
    tree.activate_step(&root, 2).expect("visited step");

    set(&mut tree, "payment.street", text("2 Side Street"));
    set(&mut tree, "payment.zip_code", text("54321"));
    set(&mut tree, "payment.city", text("Paris"));
    let report = click(&mut tree, "payment.submit");
    let request = report.pending_submission().expect("submission requested");
    assert_eq!(
        request.payload.formset_data,
        json!({
            "contact": {"first_name": "Ada", "last_name": "Lovelace"},
            "shipping": {"street": "1 Main Street", "zip_code": "12345", "city": "London"},
            "payment": {"street": "2 Side Street", "zip_code": "54321", "city": "Paris"}
        })
    );
}

#[test]
fn checkout_refuses_to_skip_steps() {
    let mut tree = mount(include_str!("data/checkout.yaml"));
    let root = tree.root_path().clone();
    assert_eq!(
        tree.activate_step(&root, 2),
        Err(Rejection::StepNotReachable { path: root.clone(), index: 2 })
    );
    assert_eq!(tree.stepper(&root).expect("stepper").current(), 0);
}

#[test]
fn prefilled_checkout_allows_jumping_ahead() {
    let description = parse_description_str(include_str!("data/checkout.yaml")).expect("parse");
    let initial = json!({
        "contact.first_name": "Ada",
        "contact.last_name": "Lovelace",
        "shipping": {"street": "1 Main Street", "zip_code": "12345", "city": "London"}
    });
    let mut tree = FormsetTree::mount(&description, Some(&initial)).expect("mount");
    let root = tree.root_path().clone();
    tree.activate_step(&root, 2).expect("prefilled steps are visited");
    assert_eq!(tree.stepper(&root).expect("stepper").current(), 2);
}

#[test]
fn server_errors_are_routed_to_fields_and_holders() {
    let mut tree = mount(include_str!("data/checkout.yaml"));
    let root = tree.root_path().clone();
    set(&mut tree, "contact.first_name", text("Ada"));
    set(&mut tree, "contact.last_name", text("Lovelace"));
    click(&mut tree, "contact.next");
    for (path, value) in [("shipping.street", "1 Main"), ("shipping.zip_code", "1234"), ("shipping.city", "Rome")] {
        set(&mut tree, path, text(value));
    }
    click(&mut tree, "shipping.next");
    for (path, value) in [("payment.street", "2 Side"), ("payment.zip_code", "4321"), ("payment.city", "Oslo")] {
        set(&mut tree, path, text(value));
    }
    click(&mut tree, "payment.submit");

    let mut errors = ErrorMap::new();
    errors.insert("payment.zip_code".into(), vec!["Unknown zip code.".into()]);
    errors.insert("payment.__all__".into(), vec!["Billing address rejected.".into()]);
    errors.insert("__all__".into(), vec!["Try again later.".into()]);
    let report = tree
        .complete_submission(Ok(SubmissionResponse::unprocessable(&errors)))
        .expect("pending submission");

    assert_eq!(report.validation.expect("validation").errors, errors);
    assert_eq!(tree.field(&tree.path("payment.zip_code")).expect("field").errors(), ["Unknown zip code."]);
    let payment = tree.root().holder(&tree.path("payment")).expect("payment holder");
    assert_eq!(payment.errors(), ["Billing address rejected."]);
    assert_eq!(tree.non_field_errors(), ["Try again later."]);
    assert_eq!(tree.stepper(&root).expect("stepper").current(), 2);
    assert!(!tree.is_busy());
}

#[test]
fn transport_failures_keep_the_tree_intact() {
    let mut tree = mount(include_str!("data/customer.yaml"));
    set(&mut tree, "customer.name", text("John Doe"));
    set(&mut tree, "customer.address", text("123, Lye Street"));
    click(&mut tree, "submit");

    let name = tree.path("customer.name");
    assert_eq!(tree.set_value(&name, text("Jane")), Err(Rejection::Busy));
    assert_eq!(tree.click(&tree.path("submit")).map(|_| ()), Err(Rejection::Busy));
    assert_eq!(tree.reset().map(|_| ()), Err(Rejection::Busy));
    assert_eq!(tree.value(&name), Some(&text("John Doe")));

    let report = tree
        .complete_submission(Err(TransportError::Request("connection refused".into())))
        .expect("pending submission");
    assert_eq!(report.failure.as_deref(), Some("request failed: connection refused"));
    assert!(report.redirect().is_none());
    assert_eq!(tree.value(&name), Some(&text("John Doe")));
    assert_eq!(tree.complete_submission(Ok(SubmissionResponse::ok(json!({})))).map(|_| ()), Err(Rejection::NoSubmissionPending));
}

#[test]
fn cafeteria_orders_start_with_one_sibling_plus_an_offered_blank() {
    let mut tree = mount(include_str!("data/cafeteria.yaml"));
    let orders = tree.path("coffee_order");
    let collection = tree.node(&orders).and_then(|node| node.as_collection()).expect("collection");
    assert_eq!(collection.sibling_count(), 2);
    assert!(collection.siblings()[1].is_pristine_extra());

    set(&mut tree, "coffee_order.0.coffee.nickname", text("Flat white"));
    set(&mut tree, "coffee_order.0.coffee.size", text("medium"));
    let report = click(&mut tree, "confirm.submit");
    let request = report.pending_submission().expect("pristine extra sibling does not block");
    assert_eq!(
        request.payload.formset_data,
        json!({
            "coffee_order": [{
                "coffee": {"nickname": "Flat white", "size": "medium"},
                "flavor": {"flavors": ""}
            }],
            "confirm": {}
        })
    );
}

#[test]
fn cafeteria_siblings_can_be_added_and_removed() {
    let mut tree = mount(include_str!("data/cafeteria.yaml"));
    let orders = tree.path("coffee_order");
    set(&mut tree, "coffee_order.0.coffee.nickname", text("First"));
    set(&mut tree, "coffee_order.1.coffee.nickname", text("Second"));

    let report = tree.add_sibling(&orders, Some(0)).expect("unbounded collection");
    assert_eq!(report.sibling, Some(1));
    assert_eq!(tree.value(&tree.path("coffee_order.2.coffee.nickname")), Some(&text("Second")));
    assert_eq!(tree.value(&tree.path("coffee_order.1.coffee.nickname")), Some(&text("")));

    tree.remove_sibling(&orders, 0).expect("above minimum");
    tree.remove_sibling(&orders, 0).expect("above minimum");
    assert_eq!(tree.value(&tree.path("coffee_order.0.coffee.nickname")), Some(&text("Second")));
    assert_eq!(
        tree.remove_sibling(&orders, 0),
        Err(Rejection::MinSiblingsReached { path: orders.clone(), min: 1 })
    );
}

#[test]
fn the_only_regular_order_cannot_be_removed_while_an_extra_is_offered() {
    let mut tree = mount(include_str!("data/cafeteria.yaml"));
    let orders = tree.path("coffee_order");
    assert_eq!(
        tree.remove_sibling(&orders, 0),
        Err(Rejection::MinSiblingsReached { path: orders.clone(), min: 1 })
    );
    let collection = tree.node(&orders).and_then(|node| node.as_collection()).expect("collection");
    assert_eq!(collection.sibling_count(), 2);
    assert!(!collection.siblings()[0].is_pristine_extra());
}

#[test]
fn flavor_dialog_opens_and_applies_within_its_own_sibling() {
    let mut tree = mount(include_str!("data/cafeteria.yaml"));
    let first_dialog = tree.path("coffee_order.0.flavor");
    let second_dialog = tree.path("coffee_order.1.flavor");
    let dialog_open = |tree: &FormsetTree, path| tree.root().holder(path).expect("dialog").is_dialog_open();

    let report = click(&mut tree, "coffee_order.0.coffee.add_flavor");
    assert_eq!(report.induced.len(), 1);
    assert!(dialog_open(&tree, &first_dialog));
    assert!(!dialog_open(&tree, &second_dialog));

    set(&mut tree, "coffee_order.0.flavor.flavors", text("caramel"));
    click(&mut tree, "coffee_order.0.flavor.apply");
    assert!(!dialog_open(&tree, &first_dialog));
    assert_eq!(tree.value(&tree.path("coffee_order.0.flavor.flavors")), Some(&text("caramel")));

    click(&mut tree, "coffee_order.0.coffee.add_flavor");
    assert!(dialog_open(&tree, &first_dialog), "a second click fires the inducer again");
    click(&mut tree, "coffee_order.0.flavor.cancel");
    assert!(!dialog_open(&tree, &first_dialog));
}

#[test]
fn applying_an_invalid_dialog_keeps_it_open() {
    let mut tree = mount(include_str!("data/cafeteria.yaml"));
    let dialog = tree.path("coffee_order.0.flavor");
    click(&mut tree, "coffee_order.0.coffee.add_flavor");
    set(&mut tree, "coffee_order.0.flavor.flavors", text("pistachio"));
    click(&mut tree, "coffee_order.0.flavor.apply");
    assert!(tree.root().holder(&dialog).expect("dialog").is_dialog_open());
    assert!(!tree.field(&tree.path("coffee_order.0.flavor.flavors")).expect("field").errors().is_empty());
}

#[test]
fn reporter_dialog_creates_a_reporter_through_a_partial_submission() {
    let mut tree = mount(include_str!("data/page.yaml"));
    assert_eq!(tree.root_path().to_string(), "editor");
    let dialog = tree.path("create_reporter");

    let edit = tree.path("page.edit_reporter");
    assert_eq!(tree.click(&edit).map(|_| ()), Err(Rejection::Disabled(edit.clone())));

    click(&mut tree, "page.add_reporter");
    assert!(tree.root().holder(&dialog).expect("dialog").is_dialog_open());
    set(&mut tree, "create_reporter.full_name", text("Jane Roe"));

    let report = click(&mut tree, "create_reporter.create");
    let request = report.pending_submission().expect("partial submission");
    assert_eq!(request.method, SubmissionMethod::Patch);
    assert_eq!(request.payload.formset_data, json!({"create_reporter": {"full_name": "Jane Roe"}}));

    let report = tree
        .complete_submission(Ok(SubmissionResponse::ok(json!({"reporter_id": "17"}))))
        .expect("pending submission");
    assert!(report.effects.is_empty());
    assert_eq!(tree.value(&tree.path("page.reporter")), Some(&text("17")));
    assert!(!tree.root().holder(&dialog).expect("dialog").is_dialog_open());
    assert_eq!(tree.value(&tree.path("create_reporter.full_name")), Some(&text("")));
    assert!(!tree.field(&edit).expect("field").is_disabled());
}

#[test]
fn closed_dialogs_do_not_block_the_full_submission() {
    let mut tree = mount(include_str!("data/page.yaml"));
    set(&mut tree, "page.title", text("Release notes"));
    let report = click(&mut tree, "page.submit");
    let request = report.pending_submission().expect("submission requested");
    assert_eq!(
        request.payload.formset_data,
        json!({
            "create_reporter": {"full_name": ""},
            "page": {"title": "Release notes", "slug": "", "reporter": ""}
        })
    );
    let report = tree
        .complete_submission(Ok(SubmissionResponse::ok(json!({}))))
        .expect("pending submission");
    assert!(report.redirect().is_none(), "proceed without a success_url emits nothing");
    assert!(report.effects.iter().all(|effect| !matches!(effect, Effect::Redirect { .. })));
}
