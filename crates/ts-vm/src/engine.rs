//! The instruction dispatch loop.
//!
//! `ExecutionEngine` is deliberately small and stateless between calls: the
//! only state carried across [`ExecutionEngine::run`] invocations is the
//! recursion-depth counter used to turn unbounded script recursion into a
//! catchable error instead of a host stack overflow. Registers live on the
//! Rust call stack (one `[Variable; 4]` per nested `run`), which is also what
//! keeps a function calling itself from corrupting its own caller's
//! in-flight register values — the original machine shares registers across
//! calls and relies on callers never needing one live across a `CALL`, which
//! is a harder invariant to lean on from safe Rust than simply not sharing
//! the array.

use std::cell::RefCell;
use std::rc::Rc;

use ts_core::{Handle, Operation, Program, Stack, Variable};

use crate::error::{VmError, VmResult};
use crate::host::{CallTarget, VmHost};
use crate::op_code::{OpCode, CALL_CACHE_SLOTS, OPTCALL_THRESHOLD};

const REGISTER_COUNT: usize = 4;
/// `t2` is the dedicated destination for every comparison/type-test opcode
/// (§4.5); the other three registers are general purpose.
const COMPARE_REGISTER: usize = 2;

pub struct ExecutionEngine {
    max_call_depth: usize,
    depth: usize,
}

impl ExecutionEngine {
    pub fn new(max_call_depth: usize) -> Self {
        Self { max_call_depth, depth: 0 }
    }

    /// Runs `program` to completion (a `RET`, or falling off the end of its
    /// bytecode) on behalf of `owner`, returning the value left in `t0`.
    pub fn run(
        &mut self,
        program: &Rc<RefCell<Program>>,
        stack: &mut Stack,
        host: &mut dyn VmHost,
        owner: Handle,
    ) -> VmResult<Variable> {
        if self.depth >= self.max_call_depth {
            return Err(VmError::CallDepthExceeded { limit: self.max_call_depth });
        }
        self.depth += 1;
        let result = self.run_inner(program, stack, host, owner);
        self.depth -= 1;
        result
    }

    fn run_inner(
        &mut self,
        program: &Rc<RefCell<Program>>,
        stack: &mut Stack,
        host: &mut dyn VmHost,
        owner: Handle,
    ) -> VmResult<Variable> {
        program.borrow_mut().mark_run();

        let mut registers: [Variable; REGISTER_COUNT] = Default::default();
        let mut ip: usize = 0;

        loop {
            let len = program.borrow().operations().len();
            if ip >= len {
                return Ok(registers[0].clone());
            }
            let instr = program.borrow().operations()[ip];
            let opcode = OpCode::from_byte(instr.op).ok_or(VmError::UnknownOpcode { byte: instr.op, index: ip })?;

            match opcode {
                OpCode::NOP => {}

                OpCode::SELF => {
                    *self.reg_mut(&mut registers, instr.a)? = Variable::Handle(owner);
                }
                OpCode::CALLER => {
                    let caller = host.caller_of(owner)?;
                    *self.reg_mut(&mut registers, instr.a)? = Variable::Handle(caller);
                }
                OpCode::STATE => {
                    if instr.b != 0 {
                        let name = self.reg(&registers, instr.a)?.as_str().unwrap_or_default();
                        host.set_state(owner, Rc::from(name))?;
                    } else {
                        let state = host.current_state(owner)?;
                        *self.reg_mut(&mut registers, instr.a)? = Variable::String(state);
                    }
                }

                OpCode::MOV => {
                    let value = self.reg(&registers, instr.b)?.clone();
                    *self.reg_mut(&mut registers, instr.a)? = value;
                }
                OpCode::MOVN => {
                    *self.reg_mut(&mut registers, instr.a)? = Variable::Null;
                }
                OpCode::MOVB => {
                    *self.reg_mut(&mut registers, instr.a)? = Variable::Bool(instr.b_as_usize() != 0);
                }
                OpCode::MOVF => {
                    *self.reg_mut(&mut registers, instr.a)? = Variable::Number(f64::from_bits(instr.b as u64));
                }
                OpCode::MOVS => {
                    let text = program
                        .borrow()
                        .literal(instr.b_as_usize())
                        .cloned()
                        .ok_or(VmError::RegisterOutOfRange { index: instr.b_as_usize() })?;
                    *self.reg_mut(&mut registers, instr.a)? = Variable::String(text);
                }
                OpCode::MOVO => {
                    *self.reg_mut(&mut registers, instr.a)? = Variable::Handle(instr.b as Handle);
                }
                OpCode::MOVX => {
                    *self.reg_mut(&mut registers, instr.a)? = Variable::Raw(instr.b);
                }
                OpCode::XCHG => {
                    let (lo, hi) = (instr.a_as_usize(), instr.b_as_usize());
                    self.check_reg(lo)?;
                    self.check_reg(hi)?;
                    registers.swap(lo, hi);
                }

                OpCode::ALLOC => {
                    let address = host.heap_mut(owner)?.alloc()?;
                    *self.reg_mut(&mut registers, instr.a)? = Variable::Raw(address as i64);
                }
                OpCode::PEEK => {
                    let value = host.heap(owner)?.get(instr.b_as_usize())?.clone();
                    *self.reg_mut(&mut registers, instr.a)? = value;
                }
                OpCode::POKE => {
                    let value = self.reg(&registers, instr.a)?.clone();
                    host.heap_mut(owner)?.set(instr.b_as_usize(), value)?;
                }

                OpCode::PUSH => {
                    let value = self.reg(&registers, instr.a)?.clone();
                    stack.push(value)?;
                }
                OpCode::POP => {
                    let value = stack.pop()?;
                    *self.reg_mut(&mut registers, instr.a)? = value;
                }
                OpCode::SPEEK => {
                    let value = stack.speek(instr.b)?.clone();
                    *self.reg_mut(&mut registers, instr.a)? = value;
                }
                OpCode::SPOKE => {
                    let value = self.reg(&registers, instr.a)?.clone();
                    stack.spoke(instr.b, value)?;
                }
                OpCode::PUSHN => {
                    stack.push_n(instr.a_as_usize())?;
                }
                OpCode::POPN => {
                    stack.pop_n(instr.a_as_usize())?;
                }

                OpCode::INC => self.bump(&mut registers, instr.a, 1.0)?,
                OpCode::DEC => self.bump(&mut registers, instr.a, -1.0)?,
                OpCode::ADD => self.binary_numeric(&mut registers, instr, |a, b| Ok(a + b))?,
                OpCode::SUB => self.binary_numeric(&mut registers, instr, |a, b| Ok(a - b))?,
                OpCode::MUL => self.binary_numeric(&mut registers, instr, |a, b| Ok(a * b))?,
                OpCode::DIV => self.binary_numeric(&mut registers, instr, |a, b| {
                    if b == 0.0 {
                        Err(VmError::DivideByZero)
                    } else {
                        Ok(a / b)
                    }
                })?,
                OpCode::MOD => self.binary_numeric(&mut registers, instr, |a, b| {
                    if b == 0.0 {
                        Err(VmError::DivideByZero)
                    } else {
                        Ok(a % b)
                    }
                })?,
                OpCode::NEG => {
                    let v = self.reg(&registers, instr.a)?.as_number().unwrap_or(0.0);
                    *self.reg_mut(&mut registers, instr.a)? = Variable::Number(-v);
                }

                OpCode::LNOT => {
                    let truthy = self.reg(&registers, instr.a)?.is_truthy();
                    *self.reg_mut(&mut registers, instr.a)? = Variable::Bool(!truthy);
                }
                OpCode::LNOT2 => {
                    let truthy = self.reg(&registers, instr.a)?.is_truthy();
                    *self.reg_mut(&mut registers, instr.a)? = Variable::Bool(truthy);
                }

                OpCode::NOT => {
                    let v = self.reg(&registers, instr.a)?.as_raw();
                    *self.reg_mut(&mut registers, instr.a)? = Variable::Raw(!v);
                }
                OpCode::AND => self.binary_raw(&mut registers, instr, |a, b| a & b)?,
                OpCode::OR => self.binary_raw(&mut registers, instr, |a, b| a | b)?,
                OpCode::XOR => self.binary_raw(&mut registers, instr, |a, b| a ^ b)?,

                OpCode::TEST => {
                    let tag_bits = self.reg(&registers, instr.a)?.type_name().len() as i64;
                    registers[COMPARE_REGISTER] = Variable::Raw(tag_bits);
                }
                OpCode::TCHK => {
                    let matches = self.reg(&registers, instr.a)?.type_name() == self.reg(&registers, instr.b)?.type_name();
                    registers[COMPARE_REGISTER] = Variable::Bool(matches);
                }
                OpCode::TC01 => {
                    let same = self.reg(&registers, instr.a)?.type_name() == self.reg(&registers, instr.b)?.type_name();
                    registers[COMPARE_REGISTER] = Variable::Bool(same);
                }
                OpCode::TCMP => {
                    let differs = self.reg(&registers, instr.a)?.type_name() != self.reg(&registers, instr.b)?.type_name();
                    registers[COMPARE_REGISTER] = Variable::Bool(differs);
                }
                OpCode::CMP => {
                    let ordering = compare_variables(self.reg(&registers, instr.a)?, self.reg(&registers, instr.b)?);
                    registers[COMPARE_REGISTER] = Variable::Raw(ordering);
                }

                OpCode::JMP => {
                    ip = self.jump_target(program, instr.a_as_usize())?;
                    continue;
                }
                OpCode::JE | OpCode::JNE | OpCode::JL | OpCode::JLE | OpCode::JG | OpCode::JGE => {
                    let flag = registers[COMPARE_REGISTER].as_raw();
                    let taken = match opcode {
                        OpCode::JE => flag == 0,
                        OpCode::JNE => flag != 0,
                        OpCode::JL => flag < 0,
                        OpCode::JLE => flag <= 0,
                        OpCode::JG => flag > 0,
                        OpCode::JGE => flag >= 0,
                        _ => unreachable!(),
                    };
                    if taken {
                        ip = self.jump_target(program, instr.a_as_usize())?;
                        continue;
                    }
                }

                OpCode::CALL => {
                    let ret = self.dispatch_call(program, stack, host, ip, instr, None)?;
                    registers[0] = ret;
                }
                OpCode::OPTCALL => {
                    let cache = program.borrow().operations()[ip + 1];
                    let ret = self.dispatch_call(program, stack, host, ip, instr, Some(cache.a as u32))?;
                    registers[0] = ret;
                }

                OpCode::RET => {
                    return Ok(registers[0].clone());
                }
            }

            ip += 1;
            if matches!(opcode, OpCode::CALL | OpCode::OPTCALL) {
                ip += CALL_CACHE_SLOTS;
            }
        }
    }

    /// Shared body of `CALL` and `OPTCALL`. `fast_class_hint` is `Some` only
    /// for `OPTCALL`, carrying the class id this call site was last seen
    /// dispatching to.
    fn dispatch_call(
        &mut self,
        program: &Rc<RefCell<Program>>,
        stack: &mut Stack,
        host: &mut dyn VmHost,
        ip: usize,
        instr: Operation,
        fast_class_hint: Option<u32>,
    ) -> VmResult<Variable> {
        let argc = instr.b_as_usize();
        let name: Rc<str> = program
            .borrow()
            .literal(instr.a_as_usize())
            .cloned()
            .ok_or(VmError::RegisterOutOfRange { index: instr.a_as_usize() })?;

        let mut args = Vec::with_capacity(argc);
        for _ in 0..argc {
            args.push(stack.pop()?);
        }
        args.reverse();
        let receiver = stack.pop()?;

        if let (Some(hint), Ok(handle)) = (fast_class_hint, receiver.as_handle().ok_or(())) {
            if host.class_id_of(handle)? == hint {
                let class_name = host.class_name_of(handle)?;
                let callee = host.program_pool().get(&class_name, &name, argc)?;
                return self.enter_scripted_call(callee, stack, host, handle, receiver, args, argc);
            }
        }

        match host.resolve_call(&receiver, &name, &args)? {
            CallTarget::Native(value) => Ok(value),
            CallTarget::Scripted { class_id } => {
                let handle = receiver
                    .as_handle()
                    .ok_or_else(|| VmError::UnresolvedFunction { name: name.to_string(), arity: argc, handle: ts_core::NULL_HANDLE })?;
                let class_name = host.class_name_of(handle)?;
                let callee = host.program_pool().get(&class_name, &name, argc)?;
                let ret = self.enter_scripted_call(callee, stack, host, handle, receiver, args, argc)?;
                self.record_call_site(program, ip, class_id);
                Ok(ret)
            }
        }
    }

    fn enter_scripted_call(
        &mut self,
        callee: Rc<RefCell<Program>>,
        stack: &mut Stack,
        host: &mut dyn VmHost,
        handle: Handle,
        receiver: Variable,
        args: Vec<Variable>,
        argc: usize,
    ) -> VmResult<Variable> {
        stack.push(receiver)?;
        for arg in args {
            stack.push(arg)?;
        }
        stack.pushenv()?;
        let ret = self.run(&callee, stack, host, handle);
        stack.popenv()?;
        stack.pop_n(1 + argc)?;
        ret
    }

    /// Bumps the `CALL` site's hit counter (held in its first reserved `NOP`
    /// slot) and promotes it to `OPTCALL` once [`OPTCALL_THRESHOLD`]
    /// consecutive calls resolved to the same class.
    fn record_call_site(&mut self, program: &Rc<RefCell<Program>>, ip: usize, class_id: u32) {
        let mut program = program.borrow_mut();
        let ops = program.operations_mut();
        let cache_index = ip + 1;
        if cache_index >= ops.len() {
            return;
        }
        let cache = ops[cache_index];
        let (cached_class, hits) = (cache.a as u32, cache.b);
        if cached_class == class_id {
            let hits = hits + 1;
            ops[cache_index].b = hits;
            if hits >= OPTCALL_THRESHOLD {
                ops[ip].op = OpCode::OPTCALL as u8;
            }
        } else {
            ops[cache_index].a = class_id as i64;
            ops[cache_index].b = 1;
        }
    }

    fn jump_target(&self, program: &Rc<RefCell<Program>>, target: usize) -> VmResult<usize> {
        let len = program.borrow().operations().len();
        if target >= len {
            return Err(VmError::JumpOutOfRange { target, len });
        }
        Ok(target)
    }

    fn check_reg(&self, index: usize) -> VmResult<()> {
        if index >= REGISTER_COUNT {
            return Err(VmError::RegisterOutOfRange { index });
        }
        Ok(())
    }

    fn reg<'a>(&self, registers: &'a [Variable; REGISTER_COUNT], index: i64) -> VmResult<&'a Variable> {
        let index = index as usize;
        self.check_reg(index)?;
        Ok(&registers[index])
    }

    fn reg_mut<'a>(&self, registers: &'a mut [Variable; REGISTER_COUNT], index: i64) -> VmResult<&'a mut Variable> {
        let index = index as usize;
        self.check_reg(index)?;
        Ok(&mut registers[index])
    }

    fn bump(&self, registers: &mut [Variable; REGISTER_COUNT], index: i64, delta: f64) -> VmResult<()> {
        let current = self.reg(registers, index)?.as_number().unwrap_or(0.0);
        *self.reg_mut(registers, index)? = Variable::Number(current + delta);
        Ok(())
    }

    fn binary_numeric(
        &self,
        registers: &mut [Variable; REGISTER_COUNT],
        instr: Operation,
        f: impl FnOnce(f64, f64) -> VmResult<f64>,
    ) -> VmResult<()> {
        let a = self.reg(registers, instr.a)?.as_number().unwrap_or(0.0);
        let b = self.reg(registers, instr.b)?.as_number().unwrap_or(0.0);
        let result = f(a, b)?;
        *self.reg_mut(registers, instr.a)? = Variable::Number(result);
        Ok(())
    }

    fn binary_raw(
        &self,
        registers: &mut [Variable; REGISTER_COUNT],
        instr: Operation,
        f: impl FnOnce(i64, i64) -> i64,
    ) -> VmResult<()> {
        let a = self.reg(registers, instr.a)?.as_raw();
        let b = self.reg(registers, instr.b)?.as_raw();
        let result = f(a, b);
        *self.reg_mut(registers, instr.a)? = Variable::Raw(result);
        Ok(())
    }
}

/// -1/0/1 ordering for `CMP`, comparing numerically when both sides are
/// numbers and lexically otherwise (matching loose scripting semantics: a
/// comparison between incompatible types is neither fatal nor "unordered").
fn compare_variables(a: &Variable, b: &Variable) -> i64 {
    if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
        return x.partial_cmp(&y).map(ordering_to_i64).unwrap_or(0);
    }
    ordering_to_i64(a.to_string().cmp(&b.to_string()))
}

fn ordering_to_i64(ordering: std::cmp::Ordering) -> i64 {
    match ordering {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use ts_core::{BoundTagSystem, CoreError, ProgramPool};

    /// A minimal host good enough to exercise the dispatch loop without the
    /// real object tree: every handle maps to a single class with its own
    /// heap, and `resolve_call` only ever resolves scripted functions.
    struct FakeHost {
        classes: HashMap<Handle, (String, u32)>,
        heaps: HashMap<Handle, ts_core::Heap>,
        states: HashMap<Handle, Rc<str>>,
        pool: ProgramPool,
        empty_tags: BoundTagSystem,
    }

    impl FakeHost {
        fn new() -> Self {
            Self {
                classes: HashMap::new(),
                heaps: HashMap::new(),
                states: HashMap::new(),
                pool: ProgramPool::new(),
                empty_tags: BoundTagSystem::default(),
            }
        }

        fn register(&mut self, handle: Handle, class: &str, class_id: u32) {
            self.classes.insert(handle, (class.to_string(), class_id));
            self.heaps.insert(handle, ts_core::Heap::new(64));
            self.states.insert(handle, Rc::from("main"));
        }
    }

    impl VmHost for FakeHost {
        fn class_id_of(&self, handle: Handle) -> VmResult<u32> {
            Ok(self.classes.get(&handle).map(|(_, id)| *id).unwrap_or(0))
        }
        fn class_name_of(&self, handle: Handle) -> VmResult<Rc<str>> {
            Ok(Rc::from(self.classes.get(&handle).map(|(n, _)| n.as_str()).unwrap_or("")))
        }
        fn heap(&self, handle: Handle) -> VmResult<&ts_core::Heap> {
            self.heaps.get(&handle).ok_or(VmError::Core(CoreError::InvalidName { name: "no heap".into(), reason: "handle not registered with FakeHost" }))
        }
        fn heap_mut(&mut self, handle: Handle) -> VmResult<&mut ts_core::Heap> {
            self.heaps.get_mut(&handle).ok_or(VmError::Core(CoreError::InvalidName { name: "no heap".into(), reason: "handle not registered with FakeHost" }))
        }
        fn current_state(&self, handle: Handle) -> VmResult<Rc<str>> {
            Ok(self.states.get(&handle).cloned().unwrap_or_else(|| Rc::from("main")))
        }
        fn set_state(&mut self, handle: Handle, state: Rc<str>) -> VmResult<()> {
            self.states.insert(handle, state);
            Ok(())
        }
        fn caller_of(&self, _handle: Handle) -> VmResult<Handle> {
            Ok(ts_core::NULL_HANDLE)
        }
        fn program_pool(&self) -> &ProgramPool {
            &self.pool
        }
        fn tags_of(&self, _handle: Handle) -> VmResult<&BoundTagSystem> {
            Ok(&self.empty_tags)
        }
        fn resolve_call(&mut self, receiver: &Variable, name: &str, _args: &[Variable]) -> VmResult<CallTarget> {
            let handle = receiver.as_handle().unwrap_or(ts_core::NULL_HANDLE);
            let class_id = self.class_id_of(handle)?;
            let _ = name;
            Ok(CallTarget::Scripted { class_id })
        }
    }

    fn add_program(pool: &mut ProgramPool, class: &str, function: &str, arity: usize, ops: Vec<Operation>) {
        let mut program = Program::new_scripted(arity);
        for op in ops {
            program.emit(op);
        }
        pool.register(class, function, arity, program).unwrap();
    }

    #[test]
    fn add_then_return_leaves_result_in_t0() {
        let mut host = FakeHost::new();
        host.register(1, "Counter", 7);
        add_program(
            &mut host.pool,
            "Counter",
            "state:main",
            0,
            vec![
                Operation::new(OpCode::MOVF as u8, 0, 2.0f64.to_bits() as i64),
                Operation::new(OpCode::MOVF as u8, 1, 3.0f64.to_bits() as i64),
                Operation::new(OpCode::ADD as u8, 0, 1),
                Operation::new(OpCode::RET as u8, 0, 0),
            ],
        );
        let program = host.pool.get("Counter", "state:main", 0).unwrap();
        let mut stack = Stack::new(64);
        let mut engine = ExecutionEngine::new(64);
        let result = engine.run(&program, &mut stack, &mut host, 1).unwrap();
        assert_eq!(result.as_number(), Some(5.0));
    }

    #[test]
    fn unknown_opcode_is_reported_with_its_index() {
        let mut host = FakeHost::new();
        host.register(1, "Broken", 1);
        add_program(&mut host.pool, "Broken", "state:main", 0, vec![Operation::new(0xEE, 0, 0)]);
        let program = host.pool.get("Broken", "state:main", 0).unwrap();
        let mut stack = Stack::new(16);
        let mut engine = ExecutionEngine::new(16);
        let err = engine.run(&program, &mut stack, &mut host, 1).unwrap_err();
        assert!(matches!(err, VmError::UnknownOpcode { byte: 0xEE, index: 0 }));
    }

    #[test]
    fn call_site_is_promoted_to_optcall_after_threshold_hits() {
        let mut host = FakeHost::new();
        host.register(1, "Parent", 1);
        host.register(2, "Child", 2);
        add_program(
            &mut host.pool,
            "Child",
            "double",
            1,
            vec![
                Operation::new(OpCode::SPEEK as u8, 0, -1),
                Operation::new(OpCode::ADD as u8, 0, 0),
                Operation::new(OpCode::RET as u8, 0, 0),
            ],
        );

        let mut caller = Program::new_scripted(0);
        let name_index = caller.intern_literal(&mut ts_core::StringPool::new(), "double");
        caller.emit(Operation::new(OpCode::MOVO as u8, 0, 2));
        caller.emit(Operation::new(OpCode::PUSH as u8, 0, 0));
        caller.emit(Operation::new(OpCode::MOVF as u8, 1, 1.0f64.to_bits() as i64));
        caller.emit(Operation::new(OpCode::PUSH as u8, 1, 0));
        caller.emit(Operation::new(OpCode::CALL as u8, name_index as i64, 1));
        caller.emit(Operation::new(OpCode::NOP as u8, 0, 0));
        caller.emit(Operation::new(OpCode::NOP as u8, 0, 0));
        caller.emit(Operation::new(OpCode::RET as u8, 0, 0));
        host.pool.register("Parent", "state:main", 0, caller).unwrap();

        let program = host.pool.get("Parent", "state:main", 0).unwrap();
        let mut engine = ExecutionEngine::new(64);

        for _ in 0..OPTCALL_THRESHOLD {
            let mut stack = Stack::new(64);
            program.borrow_mut().operations_mut();
            let _ = engine.run(&program, &mut stack, &mut host, 1).unwrap();
        }

        let promoted = program.borrow().operations()[4].op;
        assert_eq!(promoted, OpCode::OPTCALL as u8);
    }
}
