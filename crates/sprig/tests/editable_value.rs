use std::sync::Arc;

use sprig::input::{self, get_converted_value};
use sprig::{
    Application, ComponentNode, ComponentTree, EditableValue, EventPayload, HookFailure, InputState,
    LengthValidator, LifecycleConfig, MapModel, ModelAccess, ModelError, NodeId, PhaseId, RequestContext,
    Value, ValueType,
};

fn tree_with(node: ComponentNode) -> (ComponentTree, NodeId) {
    let mut tree = ComponentTree::new(ComponentNode::container("form"));
    let root = tree.root();
    let id = tree.add_child(root, node).unwrap();
    (tree, id)
}

fn state(tree: &ComponentTree, id: NodeId) -> &EditableValue {
    tree.node(id).and_then(ComponentNode::as_input).unwrap()
}

#[test]
fn reset_value_restores_a_pristine_input() {
    let (mut tree, id) = tree_with(ComponentNode::input(
        "name",
        EditableValue::new().with_local_value(Some(Value::string("draft"))),
    ));
    {
        let input = tree.node_mut(id).and_then(ComponentNode::as_input_mut).unwrap();
        input.set_submitted_value(Some(Value::string("typed")));
    }

    for _ in 0..2 {
        let input = tree.node_mut(id).and_then(ComponentNode::as_input_mut).unwrap();
        input.reset_value();
        assert_eq!(input.submitted_value(), None);
        assert_eq!(input.local_value(), None);
        assert!(!input.is_local_value_set());
        assert!(input.is_valid());
        assert_eq!(input.state(), InputState::Fresh);
    }
}

#[test]
fn required_input_with_empty_submission_is_invalid() {
    let app = Application::default();
    let mut model = MapModel::new().with("user.name", "ada");
    let (mut tree, id) = tree_with(
        ComponentNode::input("name", EditableValue::new().required(true).bind("user.name")).with_label("Name"),
    );
    let mut ctx = RequestContext::new(&app, &mut model).with_params([("name", "")]);

    input::decode(&mut tree, id, &mut ctx).unwrap();
    input::validate(&mut tree, id, &mut ctx).unwrap();
    assert!(!state(&tree, id).is_valid());
    assert_eq!(state(&tree, id).state(), InputState::Invalid);

    let messages: Vec<_> = ctx.messages().for_client("name").collect();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].summary, "Name: Validation Error: Value is required.");

    input::update_model(&mut tree, id, &mut ctx).unwrap();
    assert!(tree.events().is_empty());
    drop(ctx);
    assert!(model.writes().is_empty());
    assert_eq!(model.get("user.name"), Ok(Some(Value::string("ada"))));
}

#[test]
fn failed_conversion_returns_the_submitted_value() {
    let app = Application::default();
    let mut model = MapModel::new().typed("user.age", ValueType::Int, None);
    let (mut tree, id) = tree_with(
        ComponentNode::input("age", EditableValue::new().bind("user.age")).with_label("Age"),
    );
    let mut ctx = RequestContext::new(&app, &mut model);

    let submitted = Value::string("abc");
    let converted = get_converted_value(&mut tree, id, &submitted, &mut ctx).unwrap();

    assert_eq!(converted, Some(submitted));
    assert!(!state(&tree, id).is_valid());
    let summaries: Vec<_> = ctx.messages().for_client("age").map(|m| m.summary.as_str()).collect();
    assert_eq!(summaries, vec!["Age: Conversion error occurred."]);
}

#[test]
fn conversion_failure_keeps_the_submitted_value_for_redisplay() {
    let app = Application::default();
    let mut model = MapModel::new().typed("user.age", ValueType::Int, Some(Value::Int(30)));
    let (mut tree, id) = tree_with(
        ComponentNode::input("age", EditableValue::new().bind("user.age").converter_message("Whole years, please")),
    );
    let mut ctx = RequestContext::new(&app, &mut model).with_params([("age", "thirty")]);

    input::decode(&mut tree, id, &mut ctx).unwrap();
    input::validate(&mut tree, id, &mut ctx).unwrap();

    let input = state(&tree, id);
    assert!(!input.is_valid());
    assert_eq!(input.submitted_value(), Some(&Value::string("thirty")));
    assert!(!input.is_local_value_set());
    assert_eq!(
        ctx.messages().for_client("age").next().map(|m| m.summary.as_str()),
        Some("Whole years, please")
    );
    assert!(tree.events().is_empty());
}

#[test]
fn changed_value_queues_one_event_for_the_validation_phase() {
    let app = Application::default();
    let mut model = MapModel::new().with("user.name", "y");
    let (mut tree, id) = tree_with(ComponentNode::input("name", EditableValue::new().bind("user.name")));
    let mut ctx = RequestContext::new(&app, &mut model).with_params([("name", "x")]);

    input::decode(&mut tree, id, &mut ctx).unwrap();
    assert_eq!(state(&tree, id).state(), InputState::Decoded);

    ctx.set_current_phase(PhaseId::ProcessValidations);
    input::validate(&mut tree, id, &mut ctx).unwrap();

    let events: Vec<_> = tree.events().iter().collect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source, id);
    assert_eq!(events[0].phase, PhaseId::ProcessValidations);
    assert_eq!(
        events[0].payload,
        EventPayload::ValueChange {
            old: Some(Value::string("y")),
            new: Some(Value::string("x")),
        }
    );
    let input = state(&tree, id);
    assert!(input.is_local_value_set());
    assert_eq!(input.submitted_value(), None);
    assert_eq!(input.state(), InputState::Validated);

    input::update_model(&mut tree, id, &mut ctx).unwrap();
    let input = state(&tree, id);
    assert!(!input.is_local_value_set());
    assert_eq!(input.local_value(), None);
    assert_eq!(input.state(), InputState::Committed);

    drop(ctx);
    assert_eq!(model.get("user.name"), Ok(Some(Value::string("x"))));
}

#[test]
fn unchanged_value_queues_no_event() {
    let app = Application::default();
    let mut model = MapModel::new().typed("user.age", ValueType::Int, Some(Value::Int(42)));
    let (mut tree, id) = tree_with(ComponentNode::input("age", EditableValue::new().bind("user.age")));
    let mut ctx = RequestContext::new(&app, &mut model).with_params([("age", " 42")]);

    input::decode(&mut tree, id, &mut ctx).unwrap();
    input::validate(&mut tree, id, &mut ctx).unwrap();

    assert!(state(&tree, id).is_valid());
    assert_eq!(state(&tree, id).local_value(), Some(&Value::Int(42)));
    assert!(tree.events().is_empty());
}

#[test]
fn second_update_is_a_no_op() {
    let app = Application::default();
    let mut model = MapModel::new();
    let (mut tree, id) = tree_with(ComponentNode::input("city", EditableValue::new().bind("address.city")));
    let mut ctx = RequestContext::new(&app, &mut model).with_params([("city", "Oslo")]);

    input::decode(&mut tree, id, &mut ctx).unwrap();
    input::validate(&mut tree, id, &mut ctx).unwrap();
    input::update_model(&mut tree, id, &mut ctx).unwrap();
    input::update_model(&mut tree, id, &mut ctx).unwrap();

    drop(ctx);
    assert_eq!(model.writes(), &[("address.city".to_string(), Some(Value::string("Oslo")))]);
}

#[test]
fn missing_submission_leaves_the_node_untouched() {
    let app = Application::default();
    let mut model = MapModel::new().with("user.name", "ada");
    let (mut tree, id) = tree_with(ComponentNode::input("name", EditableValue::new().required(true).bind("user.name")));
    let mut ctx = RequestContext::new(&app, &mut model).with_params([("other", "1")]);

    input::decode(&mut tree, id, &mut ctx).unwrap();
    input::validate(&mut tree, id, &mut ctx).unwrap();

    let input = state(&tree, id);
    assert!(input.is_valid());
    assert_eq!(input.state(), InputState::Fresh);
    assert!(ctx.messages().is_empty());
}

#[test]
fn disabled_input_does_not_decode() {
    let app = Application::default();
    let mut model = MapModel::new();
    let (mut tree, id) = tree_with(ComponentNode::input("name", EditableValue::new()).with_disabled(true));
    let mut ctx = RequestContext::new(&app, &mut model).with_params([("name", "x")]);

    input::decode(&mut tree, id, &mut ctx).unwrap();
    assert_eq!(state(&tree, id).submitted_value(), None);
}

#[test]
fn rejected_writes_are_deferred_once_per_cause() {
    let app = Application::default();
    let mut model = MapModel::new().rejecting("user.email", "mail server down");
    let mut tree = ComponentTree::new(ComponentNode::container("form"));
    let root = tree.root();
    let first = tree
        .add_child(root, ComponentNode::input("email", EditableValue::new().bind("user.email")))
        .unwrap();
    let second = tree
        .add_child(root, ComponentNode::input("confirm", EditableValue::new().bind("user.email")))
        .unwrap();
    let mut ctx = RequestContext::new(&app, &mut model).with_params([("email", "a@b.c"), ("confirm", "a@b.c")]);
    ctx.set_current_phase(PhaseId::UpdateModelValues);

    for id in [first, second] {
        input::decode(&mut tree, id, &mut ctx).unwrap();
        input::validate(&mut tree, id, &mut ctx).unwrap();
        assert!(input::update_model(&mut tree, id, &mut ctx).is_ok());
        assert!(!state(&tree, id).is_valid());
    }

    assert_eq!(ctx.messages().len(), 2);
    let deferred = ctx.deferred_errors();
    assert_eq!(deferred.len(), 1);
    assert_eq!(deferred[0].client_id, "email");
    assert_eq!(deferred[0].phase, PhaseId::UpdateModelValues);
    assert!(matches!(deferred[0].error, ModelError::Rejected { .. }));
}

#[test]
fn empty_string_can_be_treated_as_null() {
    let config = LifecycleConfig {
        interpret_empty_string_as_null: true,
        ..LifecycleConfig::default()
    };
    let app = Application::new(config);
    let mut model = MapModel::new().with("user.nick", "ace");
    let (mut tree, id) = tree_with(ComponentNode::input("nick", EditableValue::new().bind("user.nick")));
    let mut ctx = RequestContext::new(&app, &mut model).with_params([("nick", "")]);

    input::decode(&mut tree, id, &mut ctx).unwrap();
    input::validate(&mut tree, id, &mut ctx).unwrap();

    let input = state(&tree, id);
    assert!(input.is_local_value_set());
    assert_eq!(input.local_value(), None);
    assert_eq!(
        tree.events().iter().next().map(|event| &event.payload),
        Some(&EventPayload::ValueChange {
            old: Some(Value::string("ace")),
            new: None,
        })
    );
}

#[test]
fn validators_run_only_on_non_empty_values() {
    let app = Application::default();
    let mut model = MapModel::new();
    let length = Arc::new(LengthValidator { min: Some(3), max: None });
    let (mut tree, id) = tree_with(
        ComponentNode::input("code", EditableValue::new().validator(length).validator_message("Too short"))
            .with_label("Code"),
    );

    let mut ctx = RequestContext::new(&app, &mut model).with_params([("code", "")]);
    input::decode(&mut tree, id, &mut ctx).unwrap();
    input::validate(&mut tree, id, &mut ctx).unwrap();
    assert!(state(&tree, id).is_valid());
    drop(ctx);

    let mut ctx = RequestContext::new(&app, &mut model).with_params([("code", "ab")]);
    input::decode(&mut tree, id, &mut ctx).unwrap();
    input::validate(&mut tree, id, &mut ctx).unwrap();
    assert!(!state(&tree, id).is_valid());
    assert_eq!(
        ctx.messages().for_client("code").next().map(|m| m.summary.as_str()),
        Some("Too short")
    );
}

#[test]
fn decode_resets_validity_each_request() {
    let app = Application::default();
    let mut model = MapModel::new();
    let (mut tree, id) = tree_with(ComponentNode::input("name", EditableValue::new().required(true)));

    let mut ctx = RequestContext::new(&app, &mut model).with_params([("name", "")]);
    input::decode(&mut tree, id, &mut ctx).unwrap();
    input::validate(&mut tree, id, &mut ctx).unwrap();
    assert!(!state(&tree, id).is_valid());
    drop(ctx);

    let mut ctx = RequestContext::new(&app, &mut model).with_params([("name", "ada")]);
    input::decode(&mut tree, id, &mut ctx).unwrap();
    assert!(state(&tree, id).is_valid());
    input::validate(&mut tree, id, &mut ctx).unwrap();
    assert_eq!(state(&tree, id).local_value(), Some(&Value::string("ada")));
}

#[test]
fn unknown_converter_id_is_a_hook_failure() {
    let app = Application::default();
    let mut model = MapModel::new();
    let (mut tree, id) = tree_with(ComponentNode::input("when", EditableValue::new().converter("date")));
    let mut ctx = RequestContext::new(&app, &mut model).with_params([("when", "2024-01-01")]);

    input::decode(&mut tree, id, &mut ctx).unwrap();
    let err = input::validate(&mut tree, id, &mut ctx).unwrap_err();
    assert!(matches!(err, HookFailure::Unresolved { kind: "converter", .. }));
}

#[test]
fn trim_renderer_takes_over_decoding() {
    let app = Application::default();
    let mut model = MapModel::new();
    let (mut tree, id) = tree_with(
        ComponentNode::input("name", EditableValue::new().bind("user.name")).with_renderer("trim"),
    );
    let mut ctx = RequestContext::new(&app, &mut model).with_params([("name", "  ada  ")]);

    input::decode(&mut tree, id, &mut ctx).unwrap();
    assert_eq!(state(&tree, id).submitted_value(), Some(&Value::string("ada")));
}
