use super::{INPUT_SLOT, MEM_SLOT, Vm};
use crate::error::RuntimeErrorKind;
use crate::value::Value;

impl Vm {
    pub(crate) fn get_slot(&self, slot: usize) -> Result<Value, RuntimeErrorKind> {
        match self.variables.get(slot) {
            Some(Some(value)) => Ok(value.clone()),
            Some(None) => Err(RuntimeErrorKind::Uninitialized(self.slot_name(slot).to_string())),
            None => Err(RuntimeErrorKind::MalformedCode(self.instruction_start)),
        }
    }

    pub(crate) fn set_slot(&mut self, slot: usize, value: Value) {
        if let Some(entry) = self.variables.get_mut(slot) {
            *entry = Some(value);
        }
    }

    pub(crate) fn slot_name(&self, slot: usize) -> &str {
        self.chunk.variable_names.get(slot).map_or("?", String::as_str)
    }

    pub(crate) fn init_globals(&mut self) {
        self.set_slot(INPUT_SLOT, Value::Str(String::new()));
        self.set_slot(MEM_SLOT, Value::Str(String::new()));
    }

    /// RETURN: locals are forgotten and `input` is emptied, `mem` keeps its value.
    pub(crate) fn end_invocation(&mut self) {
        for (slot, value) in self.variables.iter_mut().enumerate() {
            if slot != MEM_SLOT {
                *value = None;
            }
        }
        self.set_slot(INPUT_SLOT, Value::Str(String::new()));
        if matches!(self.variables.get(MEM_SLOT), Some(None)) {
            self.set_slot(MEM_SLOT, Value::Str(String::new()));
        }
    }
}
