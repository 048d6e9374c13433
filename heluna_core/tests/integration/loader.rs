//! Packet decoding from bytes

use crate::common::*;
use heluna_core::loader::{SECTION_BYTECODE, SECTION_CONSTANTS, SECTION_CONTRACT, SECTION_STDLIB_DEPS};
use heluna_core::packet::{Constant, Rule};
use heluna_core::*;

#[test]
fn test_full_packet_decodes() {
    // record { id: integer, names: list<maybe<string>> }
    let mut record_type = Bytes::default();
    record_type
        .u8(RECORD)
        .u16(2)
        .str16("id")
        .u8(INTEGER)
        .u64(0)
        .u16(0)
        .str16("names")
        .raw(&[LIST, MAYBE, STRING])
        .u64(0x2)
        .u16(1);

    let packet = PacketBuilder::new("full", 8)
        .format_version(3)
        .tag(0, "pii", "Personal data")
        .tag(5, "secret", "")
        .input("email", STRING, 0x01, 0)
        .input_typed("profile", &record_type.0, 0x20, 1)
        .output("masked", STRING, 2)
        .sanitizer("mask_email", 0x0001, 0x01)
        .forbid_tagged(0x21)
        .forbid_field(1)
        .require("email", "email is required")
        .matches("email", "email must look like one")
        .const_str("héllo")
        .const_int(-7)
        .const_float(2.5)
        .const_bool(true)
        .const_nothing()
        .dep(0x0001)
        .dep(0x0070)
        .op(Opcode::LoadConst, 0, 3, 0, 0)
        .op(Opcode::StdlibCall1, TagMode::Clear.flags(), 2, 0x0001, 0)
        .fixture("basic", r#"{"email":"a@b.c"}"#, r#"{"masked":"*"}"#)
        .load();

    assert_eq!(packet.header.format_version, 3);
    assert_eq!(packet.header.section_count, 5);

    let contract = &packet.contract;
    assert_eq!(contract.name, "full");
    assert_eq!(contract.scratchpad_size, 8);
    assert_eq!(contract.tags[1].bit_index, 5);
    assert_eq!(contract.tags[0].description, "Personal data");
    assert_eq!(contract.inputs.len(), 2);
    assert_eq!(contract.inputs[1].name, "profile");
    assert_eq!(contract.inputs[1].field_type, ValueType::Record);
    assert_eq!(contract.inputs[1].tag_bits, 0x20);
    assert_eq!(contract.inputs[1].register, 1);
    assert_eq!(contract.outputs[0].register, 2);
    assert_eq!(contract.sanitizers[0].strips_tags, 0x01);
    assert_eq!(
        contract.rules,
        vec![
            Rule::ForbidTagged {
                tag_bits: 0x21,
                scope: 0
            },
            Rule::ForbidField {
                scope: 1,
                field_index: 1
            },
            Rule::Require {
                field: "email".into(),
                message: "email is required".into()
            },
            Rule::Match {
                field: "email".into(),
                message: "email must look like one".into()
            },
        ]
    );

    assert_eq!(
        packet.constants,
        vec![
            Constant::String("héllo".into()),
            Constant::Integer(-7),
            Constant::Float(2.5),
            Constant::Boolean(true),
            Constant::Nothing,
        ]
    );
    assert_eq!(packet.stdlib_deps, vec![0x0001, 0x0070]);
    assert_eq!(packet.instructions.len(), 2);
    assert_eq!(packet.instructions[1].opcode, Opcode::StdlibCall1.byte());
    assert_eq!(packet.instructions[1].op1, 0x0001);
    assert_eq!(packet.instructions[1].tag_mode(), TagMode::Clear);
    assert_eq!(packet.fixtures[0].name, "basic");
    assert_eq!(packet.output_register(), 3);
    assert_eq!(packet.tag_names(0x21), vec!["pii", "secret"]);
}

#[test]
fn test_container_fields_keep_contract_aligned() {
    let packet = PacketBuilder::new("containers", 6)
        .input("xs", LIST, 0x01, 0)
        .input("opt", MAYBE, 0, 1)
        .input("rec", RECORD, 0, 2)
        .output("ys", LIST, 3)
        .forbid_tagged(0x01)
        .const_str("after")
        .load();

    let contract = &packet.contract;
    let inputs: Vec<_> = contract
        .inputs
        .iter()
        .map(|f| (f.name.as_str(), f.field_type, f.tag_bits, f.register))
        .collect();
    assert_eq!(
        inputs,
        vec![
            ("xs", ValueType::List, 0x01, 0),
            ("opt", ValueType::Maybe, 0, 1),
            ("rec", ValueType::Record, 0, 2),
        ]
    );
    assert_eq!(contract.outputs[0].field_type, ValueType::List);
    assert_eq!(contract.outputs[0].register, 3);
    assert_eq!(
        contract.rules,
        vec![Rule::ForbidTagged {
            tag_bits: 0x01,
            scope: 0
        }]
    );
    assert_eq!(packet.constants, vec![Constant::String("after".into())]);
}

#[test]
fn test_tests_section_is_optional() {
    let packet = name_to_result(false).load();
    assert!(packet.fixtures.is_empty());
    assert_eq!(packet.header.section_count, 4);
}

#[test]
fn test_reject_bad_magic() {
    let mut bytes = name_to_result(false).build();
    bytes[0] = 0x00;
    let err = HelunaVm::new().load(&bytes).unwrap_err();
    assert!(err.is_format_error());
    assert!(err.to_string().contains("bad magic"));
}

#[test]
fn test_reject_truncated_buffer() {
    let bytes = name_to_result(false).build();
    let err = HelunaVm::new().load(&bytes[..40]).unwrap_err();
    assert!(err.to_string().contains("too small"));

    // header intact, section payloads cut off
    let err = HelunaVm::new().load(&bytes[..bytes.len() - 4]).unwrap_err();
    assert!(err.is_format_error());
}

#[test]
fn test_reject_each_missing_section() {
    for kind in [
        SECTION_CONTRACT,
        SECTION_CONSTANTS,
        SECTION_STDLIB_DEPS,
        SECTION_BYTECODE,
    ] {
        let bytes = name_to_result(false).omit_section(kind).build();
        let err = HelunaVm::new().load(&bytes).unwrap_err();
        assert!(err.is_format_error());
        assert!(
            err.to_string().contains(&format!("0x{kind:04X}")),
            "unexpected message: {err}"
        );
    }
}

#[test]
fn test_reject_unknown_rule_type() {
    let bytes = name_to_result(false).raw_rule(vec![0x09]).build();
    let err = HelunaVm::new().load(&bytes).unwrap_err();
    assert!(err.to_string().contains("unknown rule type"));
}

#[test]
fn test_reject_unknown_constant_type() {
    let bytes = name_to_result(false).raw_constant(0x08, &[]).build();
    let err = HelunaVm::new().load(&bytes).unwrap_err();
    assert!(err.to_string().contains("unknown constant type"));
}

#[test]
fn test_reject_truncated_contract() {
    // section length claims more than the contract holds
    let mut contract = Bytes::default();
    contract.str16("cut").u16(2).u16(1);
    let bytes = name_to_result(false)
        .omit_section(SECTION_CONTRACT)
        .section(SECTION_CONTRACT, contract.0)
        .build();
    let err = HelunaVm::new().load(&bytes).unwrap_err();
    assert!(err.is_format_error());
    assert!(err.to_string().contains("truncated"));
}

#[test]
fn test_trailing_partial_instruction_ignored() {
    let mut code = Bytes::default();
    code.u8(Opcode::LoadNothing.byte()).u8(0).u16(0).u16(0).u16(0);
    code.raw(&[0xAA, 0xBB, 0xCC]);
    let packet = HelunaVm::new()
        .load(
            &name_to_result(false)
                .omit_section(SECTION_BYTECODE)
                .section(SECTION_BYTECODE, code.0)
                .build(),
        )
        .unwrap();
    assert_eq!(packet.instructions.len(), 1);
}

#[test]
fn test_load_file() {
    let path = std::env::temp_dir().join(format!("heluna-packet-{}.hlna", std::process::id()));
    std::fs::write(&path, name_to_result(true).build()).unwrap();
    let packet = HelunaVm::new().load_file(&path);
    std::fs::remove_file(&path).ok();
    assert_eq!(packet.unwrap().contract.name, "name_to_result");

    let missing = HelunaVm::new().load_file("/nonexistent/heluna/packet.hlna");
    assert!(matches!(missing, Err(HelunaError::IoError(_))));
}
