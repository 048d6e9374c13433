//! Lenient access to named call arguments
//!
//! Missing or mistyped arguments fall back to an empty default instead of
//! failing: strings read as "", numbers as 0, lists and records as empty.

use heluna_core::{InvocationContext, List, Record, Value};

pub struct Args<'a> {
    record: &'a Record,
    context: &'a InvocationContext,
}

impl<'a> Args<'a> {
    pub fn new(record: &'a Record, context: &'a InvocationContext) -> Self {
        Self { record, context }
    }

    pub fn value(&self, name: &str) -> Value {
        self.record.get(name)
    }

    pub fn is_missing(&self, name: &str) -> bool {
        self.record.get(name).is_nothing()
    }

    /// Strings as-is, nothing as "", anything else rendered
    pub fn str(&self, name: &str) -> String {
        match self.record.get(name) {
            Value::String(s) => s,
            Value::Nothing => String::new(),
            other => other.to_string(),
        }
    }

    /// First of several alternative argument names that is a non-empty string
    pub fn str_either(&self, primary: &str, fallback: &str) -> String {
        let value = self.str(primary);
        if value.is_empty() {
            self.str(fallback)
        } else {
            value
        }
    }

    /// Integers as-is, floats truncated, anything else 0
    pub fn int(&self, name: &str) -> i64 {
        match self.record.get(name) {
            Value::Integer(i) => i,
            Value::Float(f) => f as i64,
            _ => 0,
        }
    }

    /// Any number widened to float, anything else 0
    pub fn num(&self, name: &str) -> f64 {
        self.record.get(name).as_number().unwrap_or(0.0)
    }

    pub fn list(&self, name: &str) -> List {
        match self.record.get(name) {
            Value::List(list) => list,
            _ => List::new(),
        }
    }

    pub fn record(&self, name: &str) -> Record {
        match self.record.get(name) {
            Value::Record(rec) => rec,
            _ => Record::new(),
        }
    }

    /// Fixed "current time" of the invocation
    pub fn timestamp(&self) -> &str {
        &self.context.timestamp
    }
}
