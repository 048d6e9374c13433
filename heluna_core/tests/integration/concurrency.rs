//! A loaded packet shared across concurrent invocations

use std::sync::Arc;

use crate::common::*;
use heluna_core::*;

#[tokio::test]
async fn test_shared_packet_across_tasks() {
    let packet = Arc::new(name_to_result(false).load());

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let packet = Arc::clone(&packet);
            tokio::task::spawn_blocking(move || {
                let input = format!(r#"{{"name":"user-{i}"}}"#);
                let out = run_json(&packet, &input).map_err(|e| e.to_string())?;
                Ok::<_, String>((i, out))
            })
        })
        .collect();

    for handle in handles {
        let (i, out) = handle.await.unwrap().unwrap();
        assert_eq!(out, format!(r#"{{"result":"user-{i}"}}"#));
    }
}

#[tokio::test]
async fn test_policy_failures_do_not_leak_between_tasks() {
    let strict = Arc::new(name_to_result(true).load());
    let open = Arc::new(name_to_result(false).load());

    let mut handles = Vec::new();
    for i in 0..8 {
        let packet = if i % 2 == 0 {
            Arc::clone(&strict)
        } else {
            Arc::clone(&open)
        };
        handles.push(tokio::task::spawn_blocking(move || {
            (i, run_json(&packet, r#"{"name":"x"}"#).is_ok())
        }));
    }
    for handle in handles {
        let (i, ok) = handle.await.unwrap();
        assert_eq!(ok, i % 2 == 1);
    }
}
