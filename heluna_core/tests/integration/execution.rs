//! End-to-end execution through loaded packets

use crate::common::*;
use heluna_core::*;

const MAP: u8 = 0;
const FILTER: u8 = 1;
const FOLD: u8 = 2;

#[test]
fn test_tagged_name_rejected_by_forbid_rule() {
    let packet = name_to_result(true).load();
    let err = run_json(&packet, r#"{"name":"Ada Lovelace"}"#).unwrap_err();
    assert!(err.is_policy_violation());
    assert!(err.to_string().contains("pii"));
}

#[test]
fn test_tagged_name_passes_without_rule() {
    let packet = name_to_result(false).load();
    let out = run_json(&packet, r#"{"name":"Ada Lovelace"}"#).unwrap();
    assert_eq!(out, r#"{"result":"Ada Lovelace"}"#);
}

#[test]
fn test_sanitizer_passthrough_clears_tags() {
    // STDLIB_CALL_1 to the pass-through id with CLEAR drops the pii bit
    let packet = PacketBuilder::new("sanitized", 4)
        .tag(0, "pii", "")
        .input("name", STRING, 0x01, 0)
        .output("result", STRING, 1)
        .sanitizer("declassify", 0, 0x01)
        .forbid_tagged(0x01)
        .const_str("result")
        .op(Opcode::StdlibCall1, TagMode::Clear.flags(), 1, 0, 0)
        .op(Opcode::RecordNewSetC, 0, 2, 0, 1)
        .load();
    let out = run_json(&packet, r#"{"name":"Ada"}"#).unwrap();
    assert_eq!(out, r#"{"result":"Ada"}"#);
}

#[test]
fn test_policy_message_names_sanitizer() {
    let packet = PacketBuilder::new("leaky", 3)
        .tag(0, "pii", "")
        .input("name", STRING, 0x01, 0)
        .output("result", STRING, 1)
        .sanitizer("declassify", 0, 0x01)
        .forbid_tagged(0x01)
        .const_str("result")
        .op(Opcode::RecordNewSetC, 0, 2, 0, 0)
        .load();
    let err = run_json(&packet, r#"{"name":"Ada"}"#).unwrap_err();
    assert!(err.to_string().contains("declassify"));
}

#[test]
fn test_fallback_output_assembly() {
    // nothing is written to the output slot; fields are gathered one by one
    let packet = PacketBuilder::new("fields", 4)
        .input("a", INTEGER, 0, 0)
        .output("double", INTEGER, 1)
        .output("label", STRING, 2)
        .const_int(2)
        .const_str("n=")
        .op(Opcode::LoadConst, 0, 3, 0, 0)
        .op(Opcode::Mul, 0, 1, 0, 3)
        .op(Opcode::LoadConst, 0, 3, 1, 0)
        .op(Opcode::StrConcat, 0, 2, 3, 1)
        .load();
    let out = run_json(&packet, r#"{"a":21}"#).unwrap();
    assert_eq!(out, r#"{"double":42,"label":"n=42"}"#);
}

#[test]
fn test_fallback_output_checks_slot_tags() {
    // policy reads the output slot (register 2), not the field registers
    let fields_only = PacketBuilder::new("fields", 3)
        .input("a", INTEGER, 0x04, 0)
        .output("copy", INTEGER, 1)
        .forbid_tagged(0x04)
        .op(Opcode::Copy, 0, 1, 0, 0)
        .load();
    assert_eq!(run_json(&fields_only, r#"{"a":1}"#).unwrap(), r#"{"copy":1}"#);

    let tagged_slot = PacketBuilder::new("fields", 3)
        .input("a", INTEGER, 0x04, 0)
        .output("copy", INTEGER, 1)
        .forbid_tagged(0x04)
        .op(Opcode::Copy, 0, 1, 0, 0)
        .op(Opcode::Copy, 0, 2, 0, 0)
        .load();
    assert!(run_json(&tagged_slot, r#"{"a":1}"#)
        .unwrap_err()
        .is_policy_violation());
}

#[test]
fn test_tag_propagation_through_arithmetic() {
    // out = {"sum": a + b}; a carries bit 0, b carries bit 1
    let build = |flags: u8, forbid: u64| {
        PacketBuilder::new("sum", 5)
            .input("a", INTEGER, 0b01, 0)
            .input("b", INTEGER, 0b10, 1)
            .output("sum", INTEGER, 2)
            .forbid_tagged(forbid)
            .const_str("sum")
            .op(Opcode::Add, flags, 2, 0, 1)
            .op(Opcode::RecordNewSetC, 0, 3, 0, 2)
            .load()
    };
    let input = r#"{"a":1,"b":2}"#;
    assert!(run_json(&build(0, 0b10), input).is_err());
    assert!(run_json(&build(0, 0b01), input).is_err());
    assert_eq!(
        run_json(&build(TagMode::Clear.flags(), 0b11), input).unwrap(),
        r#"{"sum":3}"#
    );
}

#[test]
fn test_record_aliasing_through_copy() {
    // r1 = {}; r2 = r1; r2.k = 7; output = r1
    let packet = PacketBuilder::new("alias", 4)
        .output("k", INTEGER, 0)
        .const_str("k")
        .const_int(7)
        .op(Opcode::RecordNew, 0, 1, 0, 0)
        .op(Opcode::Copy, 0, 2, 1, 0)
        .op(Opcode::LoadConst, 0, 3, 1, 0)
        .op(Opcode::RecordSetC, 0, 2, 0, 3)
        .load();
    // output slot is register 1 (no inputs, one output)
    let out = run_json(&packet, "{}").unwrap();
    assert_eq!(out, r#"{"k":7}"#);
}

#[test]
fn test_map_identity_and_filter_all() {
    let identity = PacketBuilder::new("identity", 4)
        .input("xs", LIST, 0, 0)
        .output("ys", LIST, 1)
        .const_str("ys")
        .op(Opcode::IterSetup, MAP, 3, 0, 0)
        .op(Opcode::IterCollect, 0, 1, 3, 0)
        .op(Opcode::RecordNewSetC, 0, 2, 0, 1)
        .load();
    assert_eq!(
        run_json(&identity, r#"{"xs":[1,"two",3.5,null]}"#).unwrap(),
        r#"{"ys":[1,"two",3.5,null]}"#
    );

    let keep_all = PacketBuilder::new("keep_all", 5)
        .input("xs", LIST, 0, 0)
        .output("ys", LIST, 1)
        .const_str("ys")
        .const_bool(true)
        .op(Opcode::IterSetup, FILTER, 3, 0, 1)
        .op(Opcode::LoadConst, 0, 4, 1, 0)
        .op(Opcode::IterCollect, 0, 1, 4, 3)
        .op(Opcode::RecordNewSetC, 0, 2, 0, 1)
        .load();
    assert_eq!(
        run_json(&keep_all, r#"{"xs":[3,1,2]}"#).unwrap(),
        r#"{"ys":[3,1,2]}"#
    );
}

fn sum_packet() -> Packet {
    PacketBuilder::new("sum", 5)
        .input("xs", LIST, 0, 0)
        .output("total", INTEGER, 1)
        .const_str("total")
        .const_int(0)
        .op(Opcode::LoadConst, 0, 4, 1, 0)
        .op(Opcode::IterSetup, FOLD, 3, 0, 1)
        .op(Opcode::Add, 0, 4, 4, 3)
        .op(Opcode::IterCollect, 0, 1, 4, 0)
        .op(Opcode::RecordNewSetC, 0, 2, 0, 1)
        .load()
}

#[test]
fn test_fold_sum() {
    let packet = sum_packet();
    assert_eq!(
        run_json(&packet, r#"{"xs":[1,2,3,4]}"#).unwrap(),
        r#"{"total":10}"#
    );
    assert_eq!(run_json(&packet, r#"{"xs":[]}"#).unwrap(), r#"{"total":0}"#);
    assert_eq!(
        run_json(&packet, r#"{"xs":[1,2.5]}"#).unwrap(),
        r#"{"total":3.5}"#
    );
}

#[test]
fn test_iteration_over_non_list_fails() {
    let err = run_json(&sum_packet(), r#"{"xs":"nope"}"#).unwrap_err();
    assert!(matches!(err, HelunaError::Program(_)));
}

#[test]
fn test_numeric_promotion_and_truncation() {
    let packet = PacketBuilder::new("math", 6)
        .input("a", INTEGER, 0, 0)
        .input("b", INTEGER, 0, 1)
        .output("quot", INTEGER, 2)
        .output("rem", INTEGER, 3)
        .const_str("quot")
        .const_str("rem")
        .op(Opcode::Div, 0, 2, 0, 1)
        .op(Opcode::Mod, 0, 3, 0, 1)
        .load();
    assert_eq!(
        run_json(&packet, r#"{"a":7,"b":2}"#).unwrap(),
        r#"{"quot":3,"rem":1}"#
    );
    assert_eq!(
        run_json(&packet, r#"{"a":-7,"b":2}"#).unwrap(),
        r#"{"quot":-3,"rem":-1}"#
    );
    assert_eq!(
        run_json(&packet, r#"{"a":7,"b":-2}"#).unwrap(),
        r#"{"quot":-3,"rem":1}"#
    );
    assert_eq!(
        run_json(&packet, r#"{"a":1,"b":0.5}"#).unwrap(),
        r#"{"quot":2.0,"rem":0.0}"#
    );
    assert!(matches!(
        run_json(&packet, r#"{"a":1,"b":0}"#),
        Err(HelunaError::Domain(_))
    ));
    assert!(matches!(
        run_json(&packet, r#"{"a":"1","b":2}"#),
        Err(HelunaError::Type(_))
    ));
}

#[test]
fn test_conversions() {
    let packet = PacketBuilder::new("convert", 6)
        .input("s", STRING, 0, 0)
        .output("int", INTEGER, 1)
        .output("float", FLOAT, 2)
        .output("bool", BOOLEAN, 3)
        .output("text", STRING, 4)
        .op(Opcode::ToInt, 0, 1, 0, 0)
        .op(Opcode::ToFloat, 0, 2, 0, 0)
        .op(Opcode::ToBool, 0, 3, 0, 0)
        .op(Opcode::ToString, 0, 4, 2, 0)
        .load();
    assert_eq!(
        run_json(&packet, r#"{"s":"12.75"}"#).unwrap(),
        r#"{"int":12,"float":12.75,"bool":true,"text":"12.75"}"#
    );
    assert_eq!(
        run_json(&packet, r#"{"s":"3"}"#).unwrap(),
        r#"{"int":3,"float":3.0,"bool":true,"text":"3.0"}"#
    );
    assert!(matches!(
        run_json(&packet, r#"{"s":"abc"}"#),
        Err(HelunaError::Domain(_))
    ));
}

#[test]
fn test_missing_input_reads_as_nothing() {
    // out = {"result": name ?? "anonymous"}
    let packet = PacketBuilder::new("default_name", 4)
        .input("name", STRING, 0, 0)
        .output("result", STRING, 1)
        .const_str("anonymous")
        .const_str("result")
        .op(Opcode::LoadConst, 0, 3, 0, 0)
        .op(Opcode::Coalesce, 0, 1, 0, 3)
        .op(Opcode::RecordNewSetC, 0, 2, 1, 1)
        .load();
    assert_eq!(run_json(&packet, "{}").unwrap(), r#"{"result":"anonymous"}"#);
    assert_eq!(
        run_json(&packet, r#"{"name":null}"#).unwrap(),
        r#"{"result":"anonymous"}"#
    );
    assert_eq!(
        run_json(&packet, r#"{"name":"Bo"}"#).unwrap(),
        r#"{"result":"Bo"}"#
    );
}

#[test]
fn test_unknown_function_is_fatal() {
    let packet = PacketBuilder::new("calls", 3)
        .input("s", STRING, 0, 0)
        .output("r", STRING, 1)
        .dep(0x0001)
        .op(Opcode::StdlibCall1, 0, 1, 0x0001, 0)
        .load();
    let err = run_json(&packet, r#"{"s":"x"}"#).unwrap_err();
    assert!(matches!(err, HelunaError::UnknownFunction(0x0001)));
    assert!(HelunaVm::new()
        .check_dependencies(&packet, &NoFunctions)
        .is_err());
}
