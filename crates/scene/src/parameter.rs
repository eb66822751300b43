//! Typed, observable parameters of a [`SceneObject`](crate::SceneObject).
//!
//! A parameter owns the binary layout of its value on the wire: fixed-width
//! little-endian numbers, no type tag (both ends know the declared type from
//! the `(object id, parameter id)` address). Strings take the rest of the span,
//! actions carry nothing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParameterError {
    #[error("{kind:?} value expects {expected} bytes, got {actual}")]
    WrongLength {
        kind: ParameterType,
        expected: usize,
        actual: usize,
    },

    #[error("string value is not valid utf-8")]
    InvalidString,

    #[error("type mismatch: parameter is {expected:?}, value is {actual:?}")]
    TypeMismatch {
        expected: ParameterType,
        actual: ParameterType,
    },
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterType {
    Bool = 0,
    Int = 1,
    Float = 2,
    Vector2 = 3,
    Vector3 = 4,
    Vector4 = 5,
    Quaternion = 6,
    Color = 7,
    String = 8,
    Action = 9,
}

impl ParameterType {
    pub fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => ParameterType::Bool,
            1 => ParameterType::Int,
            2 => ParameterType::Float,
            3 => ParameterType::Vector2,
            4 => ParameterType::Vector3,
            5 => ParameterType::Vector4,
            6 => ParameterType::Quaternion,
            7 => ParameterType::Color,
            8 => ParameterType::String,
            9 => ParameterType::Action,
            _ => return None,
        })
    }

    /// Encoded size of a value, `None` for variable-length strings.
    pub fn wire_len(self) -> Option<usize> {
        Some(match self {
            ParameterType::Bool => 1,
            ParameterType::Int | ParameterType::Float => 4,
            ParameterType::Vector2 => 8,
            ParameterType::Vector3 => 12,
            ParameterType::Vector4 | ParameterType::Quaternion | ParameterType::Color => 16,
            ParameterType::String => return None,
            ParameterType::Action => 0,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vector2([f32; 2]),
    Vector3([f32; 3]),
    Vector4([f32; 4]),
    /// `x y z w`
    Quaternion([f32; 4]),
    /// `r g b a`
    Color([f32; 4]),
    String(String),
    Action,
}

impl ParameterValue {
    pub fn parameter_type(&self) -> ParameterType {
        match self {
            ParameterValue::Bool(_) => ParameterType::Bool,
            ParameterValue::Int(_) => ParameterType::Int,
            ParameterValue::Float(_) => ParameterType::Float,
            ParameterValue::Vector2(_) => ParameterType::Vector2,
            ParameterValue::Vector3(_) => ParameterType::Vector3,
            ParameterValue::Vector4(_) => ParameterType::Vector4,
            ParameterValue::Quaternion(_) => ParameterType::Quaternion,
            ParameterValue::Color(_) => ParameterType::Color,
            ParameterValue::String(_) => ParameterType::String,
            ParameterValue::Action => ParameterType::Action,
        }
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            ParameterValue::String(text) => text.len(),
            other => other.parameter_type().wire_len().unwrap_or(0),
        }
    }

    pub fn encode_into(&self, buf: &mut impl BufMut) {
        fn floats(buf: &mut impl BufMut, values: &[f32]) {
            for v in values {
                buf.put_f32_le(*v);
            }
        }
        match self {
            ParameterValue::Bool(v) => buf.put_u8(u8::from(*v)),
            ParameterValue::Int(v) => buf.put_i32_le(*v),
            ParameterValue::Float(v) => buf.put_f32_le(*v),
            ParameterValue::Vector2(v) => floats(buf, v),
            ParameterValue::Vector3(v) => floats(buf, v),
            ParameterValue::Vector4(v) | ParameterValue::Quaternion(v) | ParameterValue::Color(v) => {
                floats(buf, v)
            }
            ParameterValue::String(text) => buf.put_slice(text.as_bytes()),
            ParameterValue::Action => {}
        }
    }

    pub fn to_bytes(&self) -> bytes::Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Decodes a value of type `kind` from exactly `span`.
    pub fn decode(kind: ParameterType, mut span: &[u8]) -> Result<Self, ParameterError> {
        if let Some(expected) = kind.wire_len() {
            if span.len() != expected {
                return Err(ParameterError::WrongLength {
                    kind,
                    expected,
                    actual: span.len(),
                });
            }
        }
        fn floats<const N: usize>(span: &mut &[u8]) -> [f32; N] {
            let mut out = [0.0; N];
            for v in &mut out {
                *v = span.get_f32_le();
            }
            out
        }
        Ok(match kind {
            ParameterType::Bool => ParameterValue::Bool(span.get_u8() != 0),
            ParameterType::Int => ParameterValue::Int(span.get_i32_le()),
            ParameterType::Float => ParameterValue::Float(span.get_f32_le()),
            ParameterType::Vector2 => ParameterValue::Vector2(floats(&mut span)),
            ParameterType::Vector3 => ParameterValue::Vector3(floats(&mut span)),
            ParameterType::Vector4 => ParameterValue::Vector4(floats(&mut span)),
            ParameterType::Quaternion => ParameterValue::Quaternion(floats(&mut span)),
            ParameterType::Color => ParameterValue::Color(floats(&mut span)),
            ParameterType::String => ParameterValue::String(
                std::str::from_utf8(span)
                    .map_err(|_| ParameterError::InvalidString)?
                    .to_owned(),
            ),
            ParameterType::Action => ParameterValue::Action,
        })
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        ParameterValue::Bool(v)
    }
}

impl From<i32> for ParameterValue {
    fn from(v: i32) -> Self {
        ParameterValue::Int(v)
    }
}

impl From<f32> for ParameterValue {
    fn from(v: f32) -> Self {
        ParameterValue::Float(v)
    }
}

impl From<[f32; 2]> for ParameterValue {
    fn from(v: [f32; 2]) -> Self {
        ParameterValue::Vector2(v)
    }
}

impl From<[f32; 3]> for ParameterValue {
    fn from(v: [f32; 3]) -> Self {
        ParameterValue::Vector3(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::String(v.to_owned())
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        ParameterValue::String(v)
    }
}

/// Who caused a change. Network-originated changes are never sent back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    Local,
    Network,
}

/// Payload handed to parameter observers.
#[derive(Debug)]
pub struct ParameterChange<'a> {
    pub object_id: u16,
    pub parameter_id: u16,
    pub name: &'a str,
    pub value: &'a ParameterValue,
    pub origin: ChangeOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Arc<dyn Fn(&ParameterChange<'_>) + Send + Sync>;

/// A named, typed value with synchronous change notification.
///
/// Writes may come from the network task while the main tick reads, so the
/// value sits behind its own lock; observers run on the writing thread after
/// the lock is released.
pub struct Parameter {
    id: u16,
    object_id: u16,
    name: String,
    kind: ParameterType,
    distribute: bool,
    default: ParameterValue,
    value: RwLock<ParameterValue>,
    observers: Mutex<Vec<(SubscriptionId, Observer)>>,
    next_subscription: AtomicU64,
    network_lock: AtomicBool,
}

impl std::fmt::Debug for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameter")
            .field("object_id", &self.object_id)
            .field("id", &self.id)
            .field("name", &self.name)
            .field("value", &self.value())
            .finish()
    }
}

impl Parameter {
    pub fn new(object_id: u16, id: u16, name: impl Into<String>, default: ParameterValue) -> Self {
        Self {
            id,
            object_id,
            name: name.into(),
            kind: default.parameter_type(),
            distribute: true,
            value: RwLock::new(default.clone()),
            default,
            observers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
            network_lock: AtomicBool::new(false),
        }
    }

    /// A remote-procedure parameter: no stored value, observers are the bound call.
    pub fn action(object_id: u16, id: u16, name: impl Into<String>) -> Self {
        Self::new(object_id, id, name, ParameterValue::Action)
    }

    /// Local-only parameters are never published.
    pub fn with_distribute(mut self, distribute: bool) -> Self {
        self.distribute = distribute;
        self
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn object_id(&self) -> u16 {
        self.object_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ParameterType {
        self.kind
    }

    pub fn distribute(&self) -> bool {
        self.distribute
    }

    pub fn default_value(&self) -> &ParameterValue {
        &self.default
    }

    pub fn value(&self) -> ParameterValue {
        match self.value.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// True while a network-triggered callback of this parameter is running.
    pub fn is_network_locked(&self) -> bool {
        self.network_lock.load(Ordering::Acquire)
    }

    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&ParameterChange<'_>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut observers) = self.observers.lock() {
            observers.push((id, Arc::new(observer)));
        }
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        if let Ok(mut observers) = self.observers.lock() {
            observers.retain(|(sub, _)| *sub != id);
        }
    }

    /// Sets a new value and notifies observers.
    pub fn set(&self, value: ParameterValue, origin: ChangeOrigin) -> Result<(), ParameterError> {
        if value.parameter_type() != self.kind {
            return Err(ParameterError::TypeMismatch {
                expected: self.kind,
                actual: value.parameter_type(),
            });
        }
        self.store(value.clone());
        self.notify(&value, origin);
        Ok(())
    }

    /// Restores the value the parameter was created with.
    pub fn reset(&self, origin: ChangeOrigin) {
        if self.kind == ParameterType::Action {
            return;
        }
        self.store(self.default.clone());
        self.notify(&self.default, origin);
    }

    /// Fires an action parameter locally.
    pub fn invoke(&self) {
        self.notify(&ParameterValue::Action, ChangeOrigin::Local);
    }

    pub fn serialize_into(&self, buf: &mut impl BufMut) {
        self.value().encode_into(buf);
    }

    /// Applies a value received from the network.
    ///
    /// Actions run their bound observers with the network lock raised instead
    /// of storing anything.
    pub fn deserialize(&self, span: &[u8]) -> Result<(), ParameterError> {
        let value = ParameterValue::decode(self.kind, span)?;
        if self.kind == ParameterType::Action {
            self.network_lock.store(true, Ordering::Release);
            self.notify(&value, ChangeOrigin::Network);
            self.network_lock.store(false, Ordering::Release);
            return Ok(());
        }
        self.store(value.clone());
        self.notify(&value, ChangeOrigin::Network);
        Ok(())
    }

    fn store(&self, value: ParameterValue) {
        match self.value.write() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }

    fn notify(&self, value: &ParameterValue, origin: ChangeOrigin) {
        let observers: Vec<Observer> = match self.observers.lock() {
            Ok(guard) => guard.iter().map(|(_, o)| Arc::clone(o)).collect(),
            Err(_) => return,
        };
        let change = ParameterChange {
            object_id: self.object_id,
            parameter_id: self.id,
            name: &self.name,
            value,
            origin,
        };
        for observer in observers {
            observer(&change);
        }
    }
}
