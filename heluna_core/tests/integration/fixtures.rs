//! Packet-embedded regression fixtures

use crate::common::*;
use heluna_core::*;

fn greeter() -> PacketBuilder {
    // {"greeting": "Hello, " + name}
    PacketBuilder::new("greeter", 4)
        .input("name", STRING, 0, 0)
        .output("greeting", STRING, 1)
        .const_str("Hello, ")
        .const_str("greeting")
        .op(Opcode::LoadConst, 0, 3, 0, 0)
        .op(Opcode::StrConcat, 0, 1, 3, 0)
        .op(Opcode::RecordNewSetC, 0, 2, 1, 1)
}

#[test]
fn test_embedded_fixtures_pass() {
    let packet = greeter()
        .fixture("ada", r#"{"name":"Ada"}"#, r#"{"greeting":"Hello, Ada"}"#)
        .fixture("empty", r#"{"name":""}"#, r#"{ "greeting" : "Hello, " }"#)
        .fixture("number", r#"{"name":42}"#, r#"{"greeting":"Hello, 42"}"#)
        .load();

    let outcomes = HelunaVm::new().run_fixtures(&packet, &NoFunctions);
    assert_eq!(outcomes.len(), 3);
    for outcome in &outcomes {
        assert!(outcome.passed, "fixture {} failed: {:?}", outcome.name, outcome);
    }
}

#[test]
fn test_failing_fixture_reported() {
    let packet = greeter()
        .fixture("wrong", r#"{"name":"Ada"}"#, r#"{"greeting":"Hi, Ada"}"#)
        .load();
    let outcomes = HelunaVm::new().run_fixtures(&packet, &NoFunctions);
    assert!(!outcomes[0].passed);
    assert_eq!(
        outcomes[0].actual.as_deref(),
        Some(r#"{"greeting":"Hello, Ada"}"#)
    );
}

#[test]
fn test_fixture_numeric_equality_across_kinds() {
    // 2 * 1.5 is the float 3.0, which equals an expected integer 3
    let packet = PacketBuilder::new("scale", 4)
        .input("x", FLOAT, 0, 0)
        .output("y", FLOAT, 1)
        .const_int(2)
        .const_str("y")
        .op(Opcode::LoadConst, 0, 3, 0, 0)
        .op(Opcode::Mul, 0, 1, 3, 0)
        .op(Opcode::RecordNewSetC, 0, 2, 1, 1)
        .fixture("scale", r#"{"x":1.5}"#, r#"{"y":3}"#)
        .load();
    assert!(HelunaVm::new().run_fixtures(&packet, &NoFunctions)[0].passed);
}
