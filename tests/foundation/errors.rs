//! Integration tests for Error types

use ember_foundation::{Error, ErrorContext, ErrorKind, FactId};

#[test]
fn constructors_pick_kinds() {
    assert!(Error::constraint_violation("p", "age", "too old").is_constraint_violation());
    assert!(matches!(
        Error::unknown_template("ghost").kind,
        ErrorKind::UnknownTemplate(ref n) if n == "ghost"
    ));
    assert!(matches!(
        Error::unknown_fact(FactId::new(9)).kind,
        ErrorKind::UnknownFact(id) if id == FactId::new(9)
    ));
}

#[test]
fn messages_name_the_problem() {
    let err = Error::unknown_slot("person", "height");
    assert_eq!(err.to_string(), "unknown slot height in template person");

    let err = Error::invalid_pattern("r", "bad");
    assert_eq!(err.to_string(), "invalid pattern in rule r: bad");
}

#[test]
fn context_is_attached() {
    let err = Error::eval("boom").with_context(
        ErrorContext::new()
            .with_rule("fire-me")
            .with_position(2),
    );
    let ctx = err.context.as_ref().unwrap();
    assert_eq!(ctx.rule.as_deref(), Some("fire-me"));
    assert_eq!(ctx.position, Some(2));
    assert!(ctx.to_string().contains("fire-me"));
}
