//! The host capability network as seen from the dispatcher.

use std::io::Write;

use pie_value::Value;
use thiserror::Error;

use crate::{CallResult, ValueRegistry};

/// Host-side description of a component operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OperationInfo {
    /// Safe to run off the designated host context.
    pub direct: bool,
    pub doc: Option<String>,
}

impl OperationInfo {
    #[must_use]
    pub const fn direct() -> Self {
        Self {
            direct: true,
            doc: None,
        }
    }

    #[must_use]
    pub const fn synchronized() -> Self {
        Self {
            direct: false,
            doc: None,
        }
    }

    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

/// An addressable host object with named operations.
pub trait Component {
    fn address(&self) -> &str;

    /// Component type, e.g. `filesystem` or `gpu`.
    fn kind(&self) -> &str;

    fn operations(&self) -> Vec<String>;

    fn operation(&self, name: &str) -> Option<OperationInfo>;
}

/// Failures reported by the host. These are recoverable: the guest sees an
/// error response or a status code and keeps running.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("{0}: file not found")]
    FileNotFound(String),
    #[error("Invalid Component: {0}")]
    NoSuchComponent(String),
    #[error("Invalid Function: {0}")]
    NoSuchOperation(String),
    #[error("Invalid Value: {0}")]
    InvalidValue(u32),
    #[error("bad arguments: {0}")]
    BadArguments(String),
    /// The host refused the call before running it; retry synchronized.
    #[error("call budget exhausted")]
    LimitReached,
    #[error("{0}")]
    Failed(String),
}

/// A host event queued for the guest.
#[derive(Clone, Debug, PartialEq)]
pub struct Signal {
    pub name: String,
    pub args: Vec<Value>,
}

impl Signal {
    #[must_use]
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Guest encoding: `[name, args...]`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut items = Vec::with_capacity(self.args.len() + 1);
        items.push(Value::Str(self.name.clone()));
        items.extend(self.args.iter().cloned());
        Value::List(items)
    }
}

/// The host machine: component network, event queue and computer metadata.
///
/// Only the component network, the signal queue and the value registry
/// are required; the computer metadata has neutral defaults.
pub trait Machine {
    /// Look up a component by address.
    fn component(&self, address: &str) -> Option<&dyn Component>;

    /// All reachable components as `(address, kind)`.
    fn components(&self) -> Vec<(String, String)>;

    fn component_count(&self) -> usize {
        self.components().len()
    }

    fn max_components(&self) -> usize;

    /// Run a named operation on a component.
    fn invoke(&mut self, address: &str, operation: &str, args: Vec<Value>) -> CallResult;

    fn pop_signal(&mut self) -> Option<Signal>;

    fn values(&self) -> &ValueRegistry;

    /// Address of the machine's own node.
    fn address(&self) -> String;

    fn tmp_address(&self) -> Option<String> {
        None
    }

    fn cost_per_tick(&self) -> f64 {
        0.0
    }

    fn last_error(&self) -> Option<String> {
        None
    }

    fn beep_pattern(&mut self, _pattern: &str) {}

    fn beep(&mut self, _frequency: i16, _duration: i16) {}

    fn users(&self) -> Vec<String> {
        Vec::new()
    }

    /// # Errors
    ///
    /// Fails if the user cannot be added (duplicate, limit reached).
    fn add_user(&mut self, _name: &str) -> Result<(), HostError> {
        Err(HostError::Failed("user management is not supported".to_string()))
    }

    fn remove_user(&mut self, _name: &str) -> bool {
        false
    }

    fn world_time(&self) -> f64 {
        0.0
    }

    fn up_time(&self) -> f64 {
        0.0
    }

    fn cpu_time(&self) -> f64 {
        0.0
    }

    /// Diagnostic output from the guest's debug channel.
    fn debug_output(&mut self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }
}
