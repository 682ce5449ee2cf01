//! The single stack shared by every call in the VM.
//!
//! The stack is one flat array of [`Variable`]s with a stack pointer `sp`
//! (one past the highest occupied cell) and a base pointer `bp`. `bp` always
//! addresses a cell that holds the *previous* `bp` as a [`Variable::Raw`]
//! value (zero at the bottom of the stack), so `popenv` can restore it in
//! one read. Bytecode addresses locals and arguments as signed offsets from
//! the current `bp`.

use crate::error::{CoreError, CoreResult};
use crate::variable::Variable;

#[derive(Debug, Clone)]
pub struct Stack {
    cells: Vec<Variable>,
    sp: usize,
    bp: usize,
    capacity: usize,
}

impl Stack {
    /// Creates an empty stack bounded to `capacity` cells. `bp` starts at 0,
    /// whose contents (once written) are always zero — there is no
    /// environment above the bottom of the stack.
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: Vec::with_capacity(capacity.min(1024)),
            sp: 0,
            bp: 0,
            capacity,
        }
    }

    pub fn sp(&self) -> usize {
        self.sp
    }

    pub fn bp(&self) -> usize {
        self.bp
    }

    pub fn is_empty(&self) -> bool {
        self.sp == 0
    }

    /// Pushes `value` onto the top of the stack.
    pub fn push(&mut self, value: Variable) -> CoreResult<()> {
        if self.sp >= self.capacity {
            return Err(CoreError::StackOverflow { size: self.capacity });
        }
        if self.sp == self.cells.len() {
            self.cells.push(value);
        } else {
            self.cells[self.sp] = value;
        }
        self.sp += 1;
        Ok(())
    }

    /// Pops and returns the top of the stack.
    pub fn pop(&mut self) -> CoreResult<Variable> {
        if self.sp == 0 {
            return Err(CoreError::StackUnderflow);
        }
        self.sp -= 1;
        Ok(std::mem::replace(&mut self.cells[self.sp], Variable::Null))
    }

    /// Pushes `count` null cells at once (`PUSHN`).
    pub fn push_n(&mut self, count: usize) -> CoreResult<()> {
        for _ in 0..count {
            self.push(Variable::Null)?;
        }
        Ok(())
    }

    /// Pops and discards `count` cells at once (`POPN`).
    pub fn pop_n(&mut self, count: usize) -> CoreResult<()> {
        for _ in 0..count {
            self.pop()?;
        }
        Ok(())
    }

    /// Reads the cell at `bp + offset` without removing it (`SPEEK`).
    pub fn speek(&self, offset: i64) -> CoreResult<&Variable> {
        let address = self.resolve(offset)?;
        Ok(&self.cells[address])
    }

    /// Writes the cell at `bp + offset` (`SPOKE`).
    pub fn spoke(&mut self, offset: i64, value: Variable) -> CoreResult<()> {
        let address = self.resolve(offset)?;
        self.cells[address] = value;
        Ok(())
    }

    /// Opens a new environment: saves the current `bp` onto the stack and
    /// moves `bp` to address that saved cell.
    pub fn pushenv(&mut self) -> CoreResult<()> {
        let saved_bp = self.bp;
        let new_bp = self.sp;
        self.push(Variable::Raw(saved_bp as i64))?;
        self.bp = new_bp;
        Ok(())
    }

    /// Closes the current environment: restores `bp` from the saved cell and
    /// truncates the stack back down to (and including) that cell.
    pub fn popenv(&mut self) -> CoreResult<()> {
        let saved_bp = match &self.cells[self.bp] {
            Variable::Raw(r) => *r as usize,
            _ => 0,
        };
        self.sp = self.bp;
        self.bp = saved_bp;
        Ok(())
    }

    fn resolve(&self, offset: i64) -> CoreResult<usize> {
        let address = self.bp as i64 + offset;
        if address < 0 || address as usize >= self.sp {
            return Err(CoreError::StackAddressOutOfRange {
                address,
                sp: self.sp,
            });
        }
        Ok(address as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_round_trips() {
        let mut stack = Stack::new(16);
        stack.push(Variable::Number(1.0)).unwrap();
        stack.push(Variable::Number(2.0)).unwrap();
        assert_eq!(stack.pop().unwrap().as_number(), Some(2.0));
        assert_eq!(stack.pop().unwrap().as_number(), Some(1.0));
    }

    #[test]
    fn pop_on_empty_stack_is_fatal() {
        let mut stack = Stack::new(16);
        assert!(matches!(stack.pop(), Err(CoreError::StackUnderflow)));
    }

    #[test]
    fn push_past_capacity_is_fatal() {
        let mut stack = Stack::new(1);
        stack.push(Variable::Null).unwrap();
        assert!(matches!(
            stack.push(Variable::Null),
            Err(CoreError::StackOverflow { size: 1 })
        ));
    }

    #[test]
    fn pushenv_popenv_restore_bp_and_truncate() {
        let mut stack = Stack::new(16);
        assert_eq!(stack.bp(), 0);

        stack.push(Variable::Number(10.0)).unwrap(); // arg at bp+0 of env 1
        stack.pushenv().unwrap();
        let env1_bp = stack.bp();
        assert_eq!(env1_bp, 1);

        stack.push(Variable::Number(99.0)).unwrap(); // local var
        stack.pushenv().unwrap();
        let env2_bp = stack.bp();
        assert!(env2_bp > env1_bp);

        stack.popenv().unwrap();
        assert_eq!(stack.bp(), env1_bp);
        assert_eq!(stack.sp(), env1_bp + 1);

        stack.popenv().unwrap();
        assert_eq!(stack.bp(), 0);
        assert_eq!(stack.sp(), 0);
    }

    #[test]
    fn speek_spoke_address_relative_to_bp() {
        let mut stack = Stack::new(16);
        stack.push(Variable::Number(7.0)).unwrap();
        stack.pushenv().unwrap();
        assert_eq!(stack.speek(-1).unwrap().as_number(), Some(7.0));
        stack.spoke(-1, Variable::Number(8.0)).unwrap();
        assert_eq!(stack.speek(-1).unwrap().as_number(), Some(8.0));
        assert!(stack.speek(5).is_err());
    }
}
