use super::Vm;
use crate::error::RuntimeErrorKind;
use crate::native;

impl Vm {
    // =========================================================
    // Instruction entry point
    // =========================================================

    /// Calls registry entry `id` with the top `argc` stack values and pushes
    /// the result. `typed` selects the specialised table.
    pub(crate) fn exec_call(&mut self, id: u8, argc: u8, typed: bool) -> Result<(), RuntimeErrorKind> {
        let args = self.pop_args(argc as usize)?;

        let func = if typed {
            native::typed_by_id(id).map(|f| f.func)
        } else {
            native::generic_by_id(id).map(|f| f.func)
        }
        .ok_or(RuntimeErrorKind::UnknownFunction(id))?;

        let ret = func(&args).map_err(RuntimeErrorKind::Message)?;
        self.stack.push(ret);
        Ok(())
    }
}
