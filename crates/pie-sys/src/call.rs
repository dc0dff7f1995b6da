//! Typed call requests decoded from guest objects.

use std::fmt;

use pie_value::{Value, ValueKind};
use thiserror::Error;

use crate::{HostError, Machine};

/// Success payload or captured host failure of a call.
pub type CallResult = Result<Vec<Value>, HostError>;

/// Which request a guest object is being decoded as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    Invoke,
    Call,
    Apply,
    Unapply,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Invoke => "invoke",
            Self::Call => "call",
            Self::Apply => "apply",
            Self::Unapply => "unapply",
        })
    }
}

/// A guest object that does not have the shape of the requested call.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("Invalid {kind}: expected a list, found {found}")]
    NotAList { kind: CallKind, found: ValueKind },
    #[error("Invalid {kind}: expected at least {min} elements, found {found}")]
    TooShort {
        kind: CallKind,
        min: usize,
        found: usize,
    },
    #[error("Invalid {kind}: element {index} must be {expected}, found {found}")]
    WrongType {
        kind: CallKind,
        index: usize,
        expected: ValueKind,
        found: ValueKind,
    },
}

/// A decoded request to run an operation on a component or a registered
/// value.
#[derive(Clone, Debug, PartialEq)]
pub enum CallDescriptor {
    ComponentInvoke {
        address: String,
        operation: String,
        args: Vec<Value>,
    },
    ValueCall {
        handle: u32,
        args: Vec<Value>,
    },
    ValueApply {
        handle: u32,
        args: Vec<Value>,
    },
    ValueUnapply {
        handle: u32,
        args: Vec<Value>,
    },
}

impl CallDescriptor {
    /// Build a descriptor from a decoded guest object.
    ///
    /// Invoke: `[address, operation, args...]`. Value calls:
    /// `[handle, args...]`.
    ///
    /// # Errors
    ///
    /// Returns a [`DescriptorError`] when the object has the wrong shape.
    pub fn from_value(kind: CallKind, value: Value) -> Result<Self, DescriptorError> {
        let found = value.kind();
        let Value::List(items) = value else {
            return Err(DescriptorError::NotAList { kind, found });
        };

        let min = if kind == CallKind::Invoke { 2 } else { 1 };
        if items.len() < min {
            return Err(DescriptorError::TooShort {
                kind,
                min,
                found: items.len(),
            });
        }

        let mut items = items.into_iter();
        let mut next_str = |index: usize| match items.next() {
            Some(Value::Str(s)) => Ok(s),
            other => Err(DescriptorError::WrongType {
                kind,
                index,
                expected: ValueKind::Str,
                found: other.map_or(ValueKind::Null, |v| v.kind()),
            }),
        };

        if kind == CallKind::Invoke {
            let address = next_str(0)?;
            let operation = next_str(1)?;
            return Ok(Self::ComponentInvoke {
                address,
                operation,
                args: items.collect(),
            });
        }

        let handle = match items.next() {
            Some(Value::Handle(h)) => h,
            other => {
                return Err(DescriptorError::WrongType {
                    kind,
                    index: 0,
                    expected: ValueKind::Handle,
                    found: other.map_or(ValueKind::Null, |v| v.kind()),
                });
            }
        };
        let args = items.collect();
        Ok(match kind {
            CallKind::Call => Self::ValueCall { handle, args },
            CallKind::Apply => Self::ValueApply { handle, args },
            CallKind::Unapply | CallKind::Invoke => Self::ValueUnapply { handle, args },
        })
    }

    #[must_use]
    pub const fn kind(&self) -> CallKind {
        match self {
            Self::ComponentInvoke { .. } => CallKind::Invoke,
            Self::ValueCall { .. } => CallKind::Call,
            Self::ValueApply { .. } => CallKind::Apply,
            Self::ValueUnapply { .. } => CallKind::Unapply,
        }
    }

    /// Run the call against the host.
    pub fn execute(self, machine: &mut dyn Machine) -> CallResult {
        match self {
            Self::ComponentInvoke {
                address,
                operation,
                args,
            } => machine.invoke(&address, &operation, args),
            Self::ValueCall { handle, args } => {
                let value = lookup(machine, handle)?;
                value.call(&args)
            }
            Self::ValueApply { handle, args } => {
                let value = lookup(machine, handle)?;
                value.apply(&args)
            }
            Self::ValueUnapply { handle, args } => {
                let value = lookup(machine, handle)?;
                value.unapply(&args)
            }
        }
    }
}

fn lookup(
    machine: &dyn Machine,
    handle: u32,
) -> Result<std::sync::Arc<dyn crate::HostObject>, HostError> {
    machine
        .values()
        .get(handle)
        .ok_or(HostError::InvalidValue(handle))
}

impl fmt::Display for CallDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ComponentInvoke {
                address, operation, ..
            } => write!(f, "{address}.{operation}"),
            Self::ValueCall { handle, .. }
            | Self::ValueApply { handle, .. }
            | Self::ValueUnapply { handle, .. } => write!(f, "value#{handle}.{}", self.kind()),
        }
    }
}
