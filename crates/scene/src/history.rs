use std::sync::Mutex;

use tracing::{debug, trace, warn};

use crate::object::SceneRegistry;
use crate::parameter::{ChangeOrigin, ParameterValue};

/// One recorded parameter state.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryStep {
    pub object_id: u16,
    pub parameter_id: u16,
    pub value: ParameterValue,
}

#[derive(Debug, Default)]
struct Inner {
    steps: Vec<HistoryStep>,
    /// Number of applied steps; everything at or past it is redoable.
    cursor: usize,
}

/// Linear undo/redo history shared by every peer.
///
/// Steps are recorded with the value a parameter had *after* the edit. Undoing
/// a step restores the previous recorded value of the same parameter, or its
/// default when there is none. Applied changes carry [`ChangeOrigin::Local`]
/// so the update sender publishes them like any user edit.
#[derive(Debug)]
pub struct UndoRedoHistory {
    inner: Mutex<Inner>,
    max_steps: usize,
}

impl UndoRedoHistory {
    pub fn new(max_steps: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_steps: max_steps.max(1),
        }
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn len(&self) -> usize {
        self.with(|inner| inner.steps.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cursor(&self) -> usize {
        self.with(|inner| inner.cursor)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor() > 0
    }

    pub fn can_redo(&self) -> bool {
        self.with(|inner| inner.cursor < inner.steps.len())
    }

    /// Records a step, dropping everything that was undone before it.
    pub fn add_step(&self, object_id: u16, parameter_id: u16, value: ParameterValue) {
        let max = self.max_steps;
        self.with(|inner| {
            let cursor = inner.cursor;
            inner.steps.truncate(cursor);
            inner.steps.push(HistoryStep {
                object_id,
                parameter_id,
                value,
            });
            if inner.steps.len() > max {
                inner.steps.remove(0);
            } else {
                inner.cursor += 1;
            }
            trace!(object_id, parameter_id, len = inner.steps.len(), "history step added");
        });
    }

    /// Reverts the most recent applied step. Returns the value that was applied.
    pub fn undo(&self, registry: &SceneRegistry) -> Option<HistoryStep> {
        let (step, previous) = self.with(|inner| {
            if inner.cursor == 0 {
                return None;
            }
            inner.cursor -= 1;
            let step = inner.steps[inner.cursor].clone();
            let previous = inner.steps[..inner.cursor]
                .iter()
                .rev()
                .find(|s| s.object_id == step.object_id && s.parameter_id == step.parameter_id)
                .map(|s| s.value.clone());
            Some((step, previous))
        })?;

        let parameter = match registry.parameter(step.object_id, step.parameter_id) {
            Some(parameter) => parameter,
            None => {
                warn!(
                    object_id = step.object_id,
                    parameter_id = step.parameter_id,
                    "undo target no longer exists"
                );
                return None;
            }
        };

        let value = match previous {
            Some(value) => {
                if let Err(err) = parameter.set(value.clone(), ChangeOrigin::Local) {
                    warn!(%err, "undo value rejected");
                }
                value
            }
            None => {
                parameter.reset(ChangeOrigin::Local);
                parameter.default_value().clone()
            }
        };
        debug!(object_id = step.object_id, parameter_id = step.parameter_id, "undo");
        Some(HistoryStep { value, ..step })
    }

    /// Re-applies the next undone step.
    pub fn redo(&self, registry: &SceneRegistry) -> Option<HistoryStep> {
        let step = self.with(|inner| {
            let step = inner.steps.get(inner.cursor)?.clone();
            inner.cursor += 1;
            Some(step)
        })?;

        match registry.parameter(step.object_id, step.parameter_id) {
            Some(parameter) => {
                if let Err(err) = parameter.set(step.value.clone(), ChangeOrigin::Local) {
                    warn!(%err, "redo value rejected");
                }
            }
            None => {
                warn!(
                    object_id = step.object_id,
                    parameter_id = step.parameter_id,
                    "redo target no longer exists"
                );
                return None;
            }
        }
        debug!(object_id = step.object_id, parameter_id = step.parameter_id, "redo");
        Some(step)
    }

    /// Forgets every step of an object, keeping the cursor on the same logical step.
    pub fn vanish_object(&self, object_id: u16) {
        self.with(|inner| {
            let removed_before_cursor = inner.steps[..inner.cursor]
                .iter()
                .filter(|s| s.object_id == object_id)
                .count();
            inner.steps.retain(|s| s.object_id != object_id);
            inner.cursor -= removed_before_cursor;
        });
    }

    pub fn clear(&self) {
        self.with(|inner| {
            inner.steps.clear();
            inner.cursor = 0;
        });
    }

    /// Resets every object to its built state and drops the history.
    pub fn reset_scene(&self, registry: &SceneRegistry) {
        for object in registry.iter() {
            object.reset_all(ChangeOrigin::Local);
        }
        self.clear();
        debug!(objects = registry.len(), "scene reset");
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        match self.inner.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}
