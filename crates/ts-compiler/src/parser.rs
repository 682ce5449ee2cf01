//! Single-pass recursive-descent parser and code generator (§4.2).
//!
//! There is no intermediate AST: each grammar production emits bytecode
//! directly into the [`Program`] currently under construction.

use ts_core::{Operation, Program, ProgramPool, StringPool};
use ts_vm::{OpCode, CALL_CACHE_SLOTS};

use crate::error::{CompileError, CompileResult};
use crate::lexer::Lexer;
use crate::symbol_table::{SymbolKind, SymbolTable};
use crate::token::{Token, TokenKind};

const MAX_NAME_LEN: usize = 63;

/// What to do when the same class name is declared twice in one compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Refuse (§4.2 default).
    Error,
    /// Drop the earlier definition. Never applied to builtin system classes.
    Allow,
    /// Keep the earlier definition; silently rename the new one.
    Skip,
}

/// Classes declared `@Plugin`/`@Package`, to be spawned under the plugin
/// root at launch (§4.7).
#[derive(Debug, Default)]
pub struct CompileUnit {
    pub plugin_classes: Vec<String>,
    pub class_names: Vec<String>,
}

impl CompileUnit {
    /// Plugin root classes actually declared `@Plugin`/`@Package`, filtered
    /// out of the `using a.b.c;` import paths `plugin_classes` also
    /// accumulates: an import path always contains a `.`, a bare class name
    /// never does.
    pub fn spawnable_plugin_classes(&self) -> Vec<&str> {
        self.plugin_classes.iter().map(String::as_str).filter(|s| !s.contains('.')).collect()
    }
}

/// Two temp registers suffice for expression codegen: intermediate values
/// round-trip through the VM stack across a nested subexpression, so
/// register pressure never grows with expression depth (§4.5 — only `t2` has
/// a reserved role, for comparisons).
const LEFT: i64 = 0;
const RIGHT: i64 = 1;
const COMPARE: i64 = 2;

pub fn compile_source(
    source: &str,
    file: &str,
    pool: &mut ProgramPool,
    strings: &mut StringPool,
    policy: DuplicatePolicy,
) -> CompileResult<CompileUnit> {
    let mut parser = Parser {
        lexer: Lexer::new(source, file),
        current: Token::new(TokenKind::Eof, 1),
        pool,
        strings,
        unit: CompileUnit::default(),
    };
    parser.advance()?;
    parser.parse_unit(policy)?;
    Ok(parser.unit)
}

struct Parser<'p> {
    lexer: Lexer,
    current: Token,
    pool: &'p mut ProgramPool,
    strings: &'p mut StringPool,
    unit: CompileUnit,
}

impl<'p> Parser<'p> {
    fn file(&self) -> String {
        self.lexer.file().to_string()
    }

    fn line(&self) -> usize {
        self.current.line
    }

    fn advance(&mut self) -> CompileResult<Token> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current.kind == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> CompileResult<bool> {
        if self.check(kind) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, kind: TokenKind) -> CompileResult<Token> {
        if self.current.kind == kind {
            self.advance()
        } else {
            Err(CompileError::UnexpectedToken {
                file: self.file(),
                line: self.line(),
                expected: format!("{kind}"),
                found: format!("{}", self.current.kind),
            })
        }
    }

    fn expect_identifier(&mut self) -> CompileResult<String> {
        match self.current.kind.clone() {
            TokenKind::Identifier(name) => {
                self.advance()?;
                Ok(name)
            }
            other => Err(CompileError::UnexpectedToken {
                file: self.file(),
                line: self.line(),
                expected: "identifier".to_string(),
                found: format!("{other}"),
            }),
        }
    }

    fn expect_string(&mut self) -> CompileResult<String> {
        match self.current.kind.clone() {
            TokenKind::String(text) => {
                self.advance()?;
                Ok(text)
            }
            other => Err(CompileError::UnexpectedToken {
                file: self.file(),
                line: self.line(),
                expected: "string literal".to_string(),
                found: format!("{other}"),
            }),
        }
    }

    fn validate_name(&self, name: &str) -> CompileResult<()> {
        if name.is_empty() || name.len() > MAX_NAME_LEN || !name.chars().all(|c| !c.is_control()) {
            return Err(CompileError::InvalidName {
                file: self.file(),
                line: self.line(),
                name: name.to_string(),
                reason: "names must be non-empty, printable and at most 63 characters",
            });
        }
        Ok(())
    }

    // ---- top level -----------------------------------------------------

    fn parse_unit(&mut self, policy: DuplicatePolicy) -> CompileResult<()> {
        while self.eat(&TokenKind::Using)? {
            self.parse_using()?;
        }
        while !self.check(&TokenKind::Eof) {
            self.parse_object(policy)?;
        }
        Ok(())
    }

    fn parse_using(&mut self) -> CompileResult<()> {
        let mut path = vec![self.expect_identifier()?];
        while self.eat(&TokenKind::Dot)? {
            path.push(self.expect_identifier()?);
        }
        self.expect(TokenKind::Semicolon)?;
        self.unit.plugin_classes.push(path.join("."));
        Ok(())
    }

    fn parse_object(&mut self, policy: DuplicatePolicy) -> CompileResult<()> {
        let mut is_plugin = false;
        if let TokenKind::Annotation(name) = self.current.kind.clone() {
            if name == "Plugin" || name == "Package" {
                is_plugin = true;
            }
            self.advance()?;
        }

        self.expect(TokenKind::Object)?;
        let mut class_name = self.expect_string()?;
        self.validate_name(&class_name)?;

        if self.unit.class_names.contains(&class_name) {
            match policy {
                DuplicatePolicy::Error => {
                    return Err(CompileError::DuplicateObject { file: self.file(), line: self.line(), class: class_name });
                }
                DuplicatePolicy::Skip => {
                    class_name = format!("{class_name}$dup{}", self.unit.class_names.len());
                }
                DuplicatePolicy::Allow => {}
            }
        }
        self.unit.class_names.push(class_name.clone());
        if is_plugin {
            self.unit.plugin_classes.push(class_name.clone());
        }

        self.expect(TokenKind::LBrace)?;

        let mut table = SymbolTable::new();
        let mut ctor = Program::new_scripted(0);
        let mut field_count = 0usize;
        let mut has_main = false;
        let mut public_fields: Vec<(String, bool)> = Vec::new(); // (name, readonly)

        while !self.check(&TokenKind::RBrace) {
            if self.eat(&TokenKind::Public)? {
                let readonly = self.eat(&TokenKind::Readonly)?;
                self.expect_identifier_keyword("var")?;
                let name = self.expect_identifier()?;
                self.validate_name(&name)?;
                self.expect(TokenKind::Semicolon)?;
                let address = field_count;
                field_count += 1;
                table.declare(&name, SymbolKind::Field { address });
                ctor.emit(Operation::new(OpCode::ALLOC as u8, LEFT, 0));
                public_fields.push((name, readonly));
            } else if self.peek_is_identifier("var") {
                self.advance()?;
                let name = self.expect_identifier()?;
                self.validate_name(&name)?;
                self.expect(TokenKind::Semicolon)?;
                let address = field_count;
                field_count += 1;
                table.declare(&name, SymbolKind::Field { address });
                ctor.emit(Operation::new(OpCode::ALLOC as u8, LEFT, 0));
            } else if self.eat(&TokenKind::State)? {
                let state_name = self.expect_string()?;
                self.validate_name(&state_name)?;
                if state_name == "main" {
                    has_main = true;
                }
                let program = self.parse_function_body(&mut table, &[], true)?;
                self.pool.register(&class_name, &format!("state:{state_name}"), 0, program)?;
            } else if self.eat(&TokenKind::Fun)? {
                let fn_name = self.expect_identifier()?;
                self.validate_name(&fn_name)?;
                let params = self.parse_param_list()?;
                let arity = params.len();
                let program = self.parse_function_body(&mut table, &params, false)?;
                self.pool.register(&class_name, &fn_name, arity, program)?;
            } else {
                return Err(CompileError::UnexpectedToken {
                    file: self.file(),
                    line: self.line(),
                    expected: "var, public var, state or fun".to_string(),
                    found: format!("{}", self.current.kind),
                });
            }
        }
        self.expect(TokenKind::RBrace)?;

        if class_name == "Application" && !has_main {
            return Err(CompileError::MissingApplicationMain { file: self.file(), line: self.line() });
        }
        if !has_main {
            self.pool.register(&class_name, "state:main", 0, Program::new_native(0))?;
        }

        ctor.emit(Operation::new(OpCode::RET as u8, 0, 0));
        self.pool.register(&class_name, "__ssconstructor", 0, ctor)?;

        for (name, readonly) in public_fields {
            self.synthesize_accessors(&class_name, &name, &table, readonly)?;
        }

        Ok(())
    }

    /// Emits `get_<name>()` and, unless `readonly`, `set_<name>(value)` as
    /// trivial heap load/store programs (§4.2).
    fn synthesize_accessors(&mut self, class_name: &str, name: &str, table: &SymbolTable, readonly: bool) -> CompileResult<()> {
        let address = match table.resolve(name) {
            Some(SymbolKind::Field { address }) => *address,
            _ => return Ok(()),
        };

        let mut getter = Program::new_scripted(0);
        getter.emit(Operation::new(OpCode::PEEK as u8, LEFT, address as i64));
        getter.emit(Operation::new(OpCode::RET as u8, 0, 0));
        self.pool.register(class_name, &format!("get_{name}"), 0, getter)?;

        if !readonly {
            let mut setter = Program::new_scripted(1);
            setter.emit(Operation::new(OpCode::SPEEK as u8, LEFT, -1));
            setter.emit(Operation::new(OpCode::POKE as u8, LEFT, address as i64));
            setter.emit(Operation::new(OpCode::RET as u8, 0, 0));
            self.pool.register(class_name, &format!("set_{name}"), 1, setter)?;
        }
        Ok(())
    }

    fn expect_identifier_keyword(&mut self, expected: &str) -> CompileResult<()> {
        if self.peek_is_identifier(expected) {
            self.advance()?;
            Ok(())
        } else {
            Err(CompileError::UnexpectedToken {
                file: self.file(),
                line: self.line(),
                expected: expected.to_string(),
                found: format!("{}", self.current.kind),
            })
        }
    }

    fn peek_is_identifier(&self, name: &str) -> bool {
        matches!(&self.current.kind, TokenKind::Identifier(n) if n == name)
    }

    fn parse_param_list(&mut self) -> CompileResult<Vec<String>> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.expect_identifier()?);
                if !self.eat(&TokenKind::Comma)? {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_function_body(&mut self, table: &mut SymbolTable, params: &[String], in_state: bool) -> CompileResult<Program> {
        table.push_scope();
        // Parameters sit at negative offsets from `bp`; the last declared
        // parameter is closest to `bp` (§4.3/§4.5 calling convention).
        for (i, param) in params.iter().enumerate() {
            let offset = -((params.len() - i) as i64);
            table.declare(param, SymbolKind::Local { offset });
        }
        let mut ctx = FnCtx {
            program: Program::new_scripted(params.len()),
            table,
            next_local: 0,
            loop_labels: Vec::new(),
            in_state,
        };
        self.parse_block(&mut ctx)?;
        ctx.program.emit(Operation::new(OpCode::MOVN as u8, LEFT, 0));
        ctx.program.emit(Operation::new(OpCode::RET as u8, 0, 0));
        ctx.program.resolve_labels(is_jump_byte);
        let program = ctx.program;
        ctx.table.pop_scope();
        Ok(program)
    }

    // ---- statements ------------------------------------------------------

    fn parse_block(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        self.expect(TokenKind::LBrace)?;
        ctx.table.push_scope();
        while !self.check(&TokenKind::RBrace) {
            self.parse_statement(ctx)?;
        }
        self.expect(TokenKind::RBrace)?;
        ctx.table.pop_scope();
        Ok(())
    }

    fn parse_statement(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        match &self.current.kind {
            TokenKind::LBrace => self.parse_block(ctx),
            TokenKind::If => self.parse_if(ctx),
            TokenKind::While => self.parse_while(ctx),
            TokenKind::Do => self.parse_do_while(ctx),
            TokenKind::For => self.parse_for(ctx),
            TokenKind::Foreach => self.parse_foreach(ctx),
            TokenKind::Break => self.parse_break(ctx),
            TokenKind::Continue => self.parse_continue(ctx),
            TokenKind::Return => self.parse_return(ctx),
            TokenKind::Switch => self.parse_switch(ctx),
            TokenKind::Assert => self.parse_assert(ctx),
            _ if self.peek_is_identifier("var") => self.parse_var_decl(ctx),
            _ => {
                self.compile_expr(ctx)?;
                self.expect(TokenKind::Semicolon)?;
                Ok(())
            }
        }
    }

    fn parse_var_decl(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        self.advance()?; // "var"
        let name = self.expect_identifier()?;
        self.validate_name(&name)?;
        let offset = ctx.next_local;
        ctx.next_local += 1;
        ctx.program.emit(Operation::new(OpCode::PUSHN as u8, 1, 0));
        ctx.table.declare(&name, SymbolKind::Local { offset });
        if self.eat(&TokenKind::Assign)? {
            self.compile_expr_inner(ctx)?;
            ctx.program.emit(Operation::new(OpCode::SPOKE as u8, LEFT, offset));
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(())
    }

    fn parse_if(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        self.advance()?;
        self.expect(TokenKind::LParen)?;
        self.compile_expr_inner(ctx)?;
        self.expect(TokenKind::RParen)?;
        let else_label = ctx.program.new_label();
        self.emit_jump_if_falsy(ctx, else_label);
        self.parse_statement(ctx)?;
        if self.eat(&TokenKind::Else)? {
            let end_label = ctx.program.new_label();
            ctx.program.emit(Operation::new(OpCode::JMP as u8, end_label as i64, 0));
            ctx.program.define_label(else_label);
            self.parse_statement(ctx)?;
            ctx.program.define_label(end_label);
        } else {
            ctx.program.define_label(else_label);
        }
        Ok(())
    }

    fn parse_while(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        self.advance()?;
        let top = ctx.program.new_label();
        let end = ctx.program.new_label();
        ctx.program.define_label(top);
        self.expect(TokenKind::LParen)?;
        self.compile_expr_inner(ctx)?;
        self.expect(TokenKind::RParen)?;
        self.emit_jump_if_falsy(ctx, end);
        ctx.loop_labels.push((top, end));
        self.parse_statement(ctx)?;
        ctx.loop_labels.pop();
        ctx.program.emit(Operation::new(OpCode::JMP as u8, top as i64, 0));
        ctx.program.define_label(end);
        Ok(())
    }

    fn parse_do_while(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        self.advance()?;
        let top = ctx.program.new_label();
        let continue_label = ctx.program.new_label();
        let end = ctx.program.new_label();
        ctx.program.define_label(top);
        ctx.loop_labels.push((continue_label, end));
        self.parse_statement(ctx)?;
        ctx.loop_labels.pop();
        ctx.program.define_label(continue_label);
        self.expect(TokenKind::While)?;
        self.expect(TokenKind::LParen)?;
        self.compile_expr_inner(ctx)?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Semicolon)?;
        self.emit_jump_if_truthy(ctx, top);
        ctx.program.define_label(end);
        Ok(())
    }

    fn parse_for(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        self.advance()?;
        self.expect(TokenKind::LParen)?;
        ctx.table.push_scope();
        if !self.check(&TokenKind::Semicolon) {
            if self.peek_is_identifier("var") {
                self.parse_var_decl(ctx)?;
            } else {
                self.compile_expr(ctx)?;
                self.expect(TokenKind::Semicolon)?;
            }
        } else {
            self.expect(TokenKind::Semicolon)?;
        }

        let top = ctx.program.new_label();
        let end = ctx.program.new_label();
        ctx.program.define_label(top);
        if !self.check(&TokenKind::Semicolon) {
            self.compile_expr_inner(ctx)?;
            self.emit_jump_if_falsy(ctx, end);
        }
        self.expect(TokenKind::Semicolon)?;

        let incr_start = ctx.program.new_label();
        let body_label = ctx.program.new_label();
        ctx.program.emit(Operation::new(OpCode::JMP as u8, body_label as i64, 0));
        ctx.program.define_label(incr_start);
        if !self.check(&TokenKind::RParen) {
            self.compile_expr(ctx)?;
        }
        ctx.program.emit(Operation::new(OpCode::JMP as u8, top as i64, 0));
        self.expect(TokenKind::RParen)?;

        ctx.program.define_label(body_label);
        ctx.loop_labels.push((incr_start, end));
        self.parse_statement(ctx)?;
        ctx.loop_labels.pop();
        ctx.program.emit(Operation::new(OpCode::JMP as u8, incr_start as i64, 0));
        ctx.program.define_label(end);
        ctx.table.pop_scope();
        Ok(())
    }

    /// Simplified `foreach`: the iterable is assumed to expose `length()`
    /// and `get(index)` the way the `Array` wrapper does (§4.9); it is
    /// evaluated once into a hidden local, then iterated by index.
    fn parse_foreach(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        self.advance()?;
        self.expect(TokenKind::LParen)?;
        let element_name = self.expect_identifier()?;
        self.expect(TokenKind::In)?;

        let iterable_offset = ctx.next_local;
        ctx.next_local += 1;
        ctx.program.emit(Operation::new(OpCode::PUSHN as u8, 1, 0));
        self.compile_expr_inner(ctx)?;
        ctx.program.emit(Operation::new(OpCode::SPOKE as u8, LEFT, iterable_offset));
        self.expect(TokenKind::RParen)?;

        let index_offset = ctx.next_local;
        ctx.next_local += 1;
        ctx.program.emit(Operation::new(OpCode::MOVF as u8, LEFT, 0i64));
        ctx.program.emit(Operation::new(OpCode::SPOKE as u8, LEFT, index_offset));

        let element_offset = ctx.next_local;
        ctx.next_local += 1;
        ctx.program.emit(Operation::new(OpCode::PUSHN as u8, 1, 0));

        let top = ctx.program.new_label();
        let end = ctx.program.new_label();
        ctx.program.define_label(top);

        let length_name = ctx.program.intern_literal(self.strings, "length");
        ctx.program.emit(Operation::new(OpCode::SPEEK as u8, LEFT, iterable_offset));
        ctx.program.emit(Operation::new(OpCode::PUSH as u8, LEFT, 0));
        ctx.program.emit(Operation::new(OpCode::CALL as u8, length_name as i64, 0));
        emit_call_cache_slots(&mut ctx.program);
        ctx.program.emit(Operation::new(OpCode::MOV as u8, RIGHT, LEFT));
        ctx.program.emit(Operation::new(OpCode::SPEEK as u8, LEFT, index_offset));
        ctx.program.emit(Operation::new(OpCode::CMP as u8, LEFT, RIGHT));
        ctx.program.emit(Operation::new(OpCode::JGE as u8, end as i64, 0));

        let get_name = ctx.program.intern_literal(self.strings, "get");
        ctx.program.emit(Operation::new(OpCode::SPEEK as u8, LEFT, iterable_offset));
        ctx.program.emit(Operation::new(OpCode::PUSH as u8, LEFT, 0));
        ctx.program.emit(Operation::new(OpCode::SPEEK as u8, LEFT, index_offset));
        ctx.program.emit(Operation::new(OpCode::PUSH as u8, LEFT, 0));
        ctx.program.emit(Operation::new(OpCode::CALL as u8, get_name as i64, 1));
        emit_call_cache_slots(&mut ctx.program);
        ctx.program.emit(Operation::new(OpCode::SPOKE as u8, LEFT, element_offset));

        ctx.table.push_scope();
        ctx.table.declare(&element_name, SymbolKind::Local { offset: element_offset });
        let incr = ctx.program.new_label();
        ctx.loop_labels.push((incr, end));
        self.parse_statement(ctx)?;
        ctx.loop_labels.pop();
        ctx.table.pop_scope();

        ctx.program.define_label(incr);
        ctx.program.emit(Operation::new(OpCode::SPEEK as u8, LEFT, index_offset));
        ctx.program.emit(Operation::new(OpCode::INC as u8, LEFT, 0));
        ctx.program.emit(Operation::new(OpCode::SPOKE as u8, LEFT, index_offset));
        ctx.program.emit(Operation::new(OpCode::JMP as u8, top as i64, 0));
        ctx.program.define_label(end);
        Ok(())
    }

    fn parse_break(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        self.advance()?;
        self.expect(TokenKind::Semicolon)?;
        let (_, end) = *ctx.loop_labels.last().ok_or_else(|| CompileError::UnexpectedToken {
            file: self.file(),
            line: self.line(),
            expected: "break inside a loop".to_string(),
            found: "break outside any loop".to_string(),
        })?;
        ctx.program.emit(Operation::new(OpCode::JMP as u8, end as i64, 0));
        Ok(())
    }

    fn parse_continue(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        self.advance()?;
        self.expect(TokenKind::Semicolon)?;
        let (top, _) = *ctx.loop_labels.last().ok_or_else(|| CompileError::UnexpectedToken {
            file: self.file(),
            line: self.line(),
            expected: "continue inside a loop".to_string(),
            found: "continue outside any loop".to_string(),
        })?;
        ctx.program.emit(Operation::new(OpCode::JMP as u8, top as i64, 0));
        Ok(())
    }

    fn parse_return(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        self.advance()?;
        if self.check(&TokenKind::Semicolon) {
            ctx.program.emit(Operation::new(OpCode::MOVN as u8, LEFT, 0));
        } else {
            self.compile_expr_inner(ctx)?;
        }
        self.expect(TokenKind::Semicolon)?;
        ctx.program.emit(Operation::new(OpCode::RET as u8, 0, 0));
        Ok(())
    }

    /// `assert(expr [, message])`: branches past the crash entirely when
    /// `expr` is truthy, so a custom `message` expression — unlike the
    /// fallback literal — is only ever evaluated on the failing path (§4.2).
    fn parse_assert(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        self.advance()?;
        self.expect(TokenKind::LParen)?;
        self.compile_expr_inner(ctx)?;
        let has_message = self.eat(&TokenKind::Comma)?;
        let ok = ctx.program.new_label();
        self.emit_jump_if_truthy(ctx, ok);

        if has_message {
            self.compile_expr_inner(ctx)?;
        } else {
            let msg_idx = ctx.program.intern_literal(self.strings, "assertion failed");
            ctx.program.emit(Operation::new(OpCode::MOVS as u8, LEFT, msg_idx as i64));
        }
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Semicolon)?;

        ctx.program.emit(Operation::new(OpCode::SELF as u8, RIGHT, 0));
        self.push_t(ctx, RIGHT);
        self.push_t(ctx, LEFT);
        let crash_idx = ctx.program.intern_literal(self.strings, "crash");
        ctx.program.emit(Operation::new(OpCode::CALL as u8, crash_idx as i64, 1));
        emit_call_cache_slots(&mut ctx.program);
        ctx.program.define_label(ok);
        Ok(())
    }

    /// `switch` emits every case sequentially, cross-linking each test to
    /// its own skip label; a non-empty case that falls off the end without a
    /// `break`/`return` is a compile error (§4.2).
    fn parse_switch(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        self.advance()?;
        self.expect(TokenKind::LParen)?;
        let subject_offset = ctx.next_local;
        ctx.next_local += 1;
        ctx.program.emit(Operation::new(OpCode::PUSHN as u8, 1, 0));
        self.compile_expr_inner(ctx)?;
        ctx.program.emit(Operation::new(OpCode::SPOKE as u8, LEFT, subject_offset));
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::LBrace)?;

        let mut seen_values: Vec<String> = Vec::new();
        let mut seen_default = false;

        while !self.check(&TokenKind::RBrace) {
            let mut labels_here = Vec::new();
            loop {
                if self.eat(&TokenKind::Case)? {
                    let value_text = format!("{}", self.current.kind);
                    if seen_values.contains(&value_text) {
                        return Err(CompileError::DuplicateCase { file: self.file(), line: self.line() });
                    }
                    seen_values.push(value_text);
                    ctx.program.emit(Operation::new(OpCode::SPEEK as u8, LEFT, subject_offset));
                    self.compile_primary(ctx)?;
                    ctx.program.emit(Operation::new(OpCode::MOV as u8, RIGHT, LEFT));
                    ctx.program.emit(Operation::new(OpCode::SPEEK as u8, LEFT, subject_offset));
                    ctx.program.emit(Operation::new(OpCode::CMP as u8, LEFT, RIGHT));
                    let skip = ctx.program.new_label();
                    ctx.program.emit(Operation::new(OpCode::JNE as u8, skip as i64, 0));
                    labels_here.push(skip);
                    self.expect(TokenKind::Colon)?;
                } else if self.eat(&TokenKind::Default)? {
                    if seen_default {
                        return Err(CompileError::DuplicateDefault { file: self.file(), line: self.line() });
                    }
                    seen_default = true;
                    self.expect(TokenKind::Colon)?;
                } else {
                    break;
                }
            }

            let mut emitted_any = false;
            let mut last_was_terminator = false;
            while !self.check(&TokenKind::Case) && !self.check(&TokenKind::Default) && !self.check(&TokenKind::RBrace) {
                let before = ctx.program.operations().len();
                self.parse_statement(ctx)?;
                emitted_any = true;
                last_was_terminator = ctx
                    .program
                    .operations()
                    .get(before..)
                    .and_then(|ops| ops.last())
                    .map(|op| op.op == OpCode::RET as u8 || op.op == OpCode::JMP as u8)
                    .unwrap_or(false);
            }
            if emitted_any && !last_was_terminator {
                return Err(CompileError::CaseFallsThrough { file: self.file(), line: self.line() });
            }
            for label in labels_here {
                ctx.program.define_label(label);
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(())
    }

    // ---- expressions (precedence climbing) --------------------------------

    /// An expression used as a full statement: its value is computed but
    /// discarded by the caller (nothing pops `t0`, it is simply overwritten).
    fn compile_expr(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        self.compile_assignment(ctx)
    }

    /// An expression whose value is needed (left in `t0`).
    fn compile_expr_inner(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        self.compile_assignment(ctx)
    }

    fn compile_assignment(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        if let TokenKind::Identifier(name) = self.current.kind.clone() {
            let lookahead = self.lexer.next_token()?;
            let is_assign = lookahead.kind == TokenKind::Assign;
            self.lexer.push_back(lookahead);
            if is_assign {
                self.advance()?; // identifier
                self.advance()?; // '='
                self.compile_assignment(ctx)?;
                self.emit_store(ctx, &name)?;
                return Ok(());
            }
        }
        self.compile_ternary(ctx)
    }

    fn emit_store(&mut self, ctx: &mut FnCtx, name: &str) -> CompileResult<()> {
        ctx.table.check_assignable(&self.file(), self.line(), name)?;
        match ctx.table.resolve(name).cloned() {
            Some(SymbolKind::Local { offset }) => {
                ctx.program.emit(Operation::new(OpCode::SPOKE as u8, LEFT, offset));
                Ok(())
            }
            Some(SymbolKind::Field { address }) => {
                ctx.program.emit(Operation::new(OpCode::POKE as u8, LEFT, address as i64));
                Ok(())
            }
            _ => Err(CompileError::UnknownSymbol { file: self.file(), line: self.line(), name: name.to_string() }),
        }
    }

    fn compile_ternary(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        self.compile_or(ctx)?;
        if self.eat(&TokenKind::Question)? {
            let else_label = ctx.program.new_label();
            let end_label = ctx.program.new_label();
            self.emit_jump_if_falsy(ctx, else_label);
            self.compile_assignment(ctx)?;
            ctx.program.emit(Operation::new(OpCode::JMP as u8, end_label as i64, 0));
            self.expect(TokenKind::Colon)?;
            ctx.program.define_label(else_label);
            self.compile_assignment(ctx)?;
            ctx.program.define_label(end_label);
        }
        Ok(())
    }

    fn compile_or(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        self.compile_and(ctx)?;
        while self.eat(&TokenKind::OrOr)? {
            let short_true = ctx.program.new_label();
            let end = ctx.program.new_label();
            self.emit_jump_if_truthy(ctx, short_true);
            self.compile_and(ctx)?;
            ctx.program.emit(Operation::new(OpCode::LNOT2 as u8, LEFT, 0));
            ctx.program.emit(Operation::new(OpCode::JMP as u8, end as i64, 0));
            ctx.program.define_label(short_true);
            ctx.program.emit(Operation::new(OpCode::MOVB as u8, LEFT, 1));
            ctx.program.define_label(end);
        }
        Ok(())
    }

    fn compile_and(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        self.compile_equality(ctx)?;
        while self.eat(&TokenKind::AndAnd)? {
            let short_false = ctx.program.new_label();
            let end = ctx.program.new_label();
            self.emit_jump_if_falsy(ctx, short_false);
            self.compile_equality(ctx)?;
            ctx.program.emit(Operation::new(OpCode::LNOT2 as u8, LEFT, 0));
            ctx.program.emit(Operation::new(OpCode::JMP as u8, end as i64, 0));
            ctx.program.define_label(short_false);
            ctx.program.emit(Operation::new(OpCode::MOVB as u8, LEFT, 0));
            ctx.program.define_label(end);
        }
        Ok(())
    }

    fn compile_equality(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        self.compile_relational(ctx)?;
        loop {
            let jump_if_true = match &self.current.kind {
                TokenKind::Eq => OpCode::JE,
                TokenKind::NotEq => OpCode::JNE,
                _ => break,
            };
            self.advance()?;
            self.push_t(ctx, LEFT);
            self.compile_relational(ctx)?;
            self.pop_into_right(ctx);
            ctx.program.emit(Operation::new(OpCode::CMP as u8, LEFT, RIGHT));
            self.emit_comparison_result(ctx, jump_if_true);
        }
        Ok(())
    }

    fn compile_relational(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        self.compile_additive(ctx)?;
        loop {
            if self.check(&TokenKind::Is) {
                self.advance()?;
                self.expect_string().or_else(|_| self.expect_identifier())?;
                ctx.program.emit(Operation::new(OpCode::TEST as u8, LEFT, 0));
                ctx.program.emit(Operation::new(OpCode::MOV as u8, LEFT, COMPARE));
                continue;
            }
            let jump_if_true = match &self.current.kind {
                TokenKind::Lt => OpCode::JL,
                TokenKind::LtEq => OpCode::JLE,
                TokenKind::Gt => OpCode::JG,
                TokenKind::GtEq => OpCode::JGE,
                _ => break,
            };
            self.advance()?;
            self.push_t(ctx, LEFT);
            self.compile_additive(ctx)?;
            self.pop_into_right(ctx);
            ctx.program.emit(Operation::new(OpCode::CMP as u8, LEFT, RIGHT));
            self.emit_comparison_result(ctx, jump_if_true);
        }
        Ok(())
    }

    fn compile_additive(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        self.compile_multiplicative(ctx)?;
        loop {
            let op = match &self.current.kind {
                TokenKind::Plus => OpCode::ADD,
                TokenKind::Minus => OpCode::SUB,
                _ => break,
            };
            self.advance()?;
            self.push_t(ctx, LEFT);
            self.compile_multiplicative(ctx)?;
            self.pop_into_right(ctx);
            ctx.program.emit(Operation::new(op as u8, LEFT, RIGHT));
        }
        Ok(())
    }

    fn compile_multiplicative(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        self.compile_unary(ctx)?;
        loop {
            let op = match &self.current.kind {
                TokenKind::Star => OpCode::MUL,
                TokenKind::Slash => OpCode::DIV,
                TokenKind::Percent => OpCode::MOD,
                _ => break,
            };
            self.advance()?;
            self.push_t(ctx, LEFT);
            self.compile_unary(ctx)?;
            self.pop_into_right(ctx);
            ctx.program.emit(Operation::new(op as u8, LEFT, RIGHT));
        }
        Ok(())
    }

    fn compile_unary(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        match &self.current.kind {
            TokenKind::Bang => {
                self.advance()?;
                self.compile_unary(ctx)?;
                ctx.program.emit(Operation::new(OpCode::LNOT as u8, LEFT, 0));
                Ok(())
            }
            TokenKind::Minus => {
                self.advance()?;
                self.compile_unary(ctx)?;
                ctx.program.emit(Operation::new(OpCode::NEG as u8, LEFT, 0));
                Ok(())
            }
            TokenKind::Typeof => {
                self.advance()?;
                self.compile_unary(ctx)?;
                ctx.program.emit(Operation::new(OpCode::TEST as u8, LEFT, 0));
                ctx.program.emit(Operation::new(OpCode::MOV as u8, LEFT, COMPARE));
                Ok(())
            }
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let inc = matches!(self.current.kind, TokenKind::PlusPlus);
                self.advance()?;
                let name = self.expect_identifier()?;
                self.compile_identifier_load(ctx, &name)?;
                ctx.program.emit(Operation::new(if inc { OpCode::INC } else { OpCode::DEC } as u8, LEFT, 0));
                self.emit_store(ctx, &name)?;
                self.compile_identifier_load(ctx, &name)?;
                Ok(())
            }
            _ => self.compile_postfix(ctx),
        }
    }

    /// Runs through call/member/index/postfix-increment suffixes. Tracks
    /// whether `t0` still corresponds to a bare variable (as opposed to a
    /// call or indexing result) so `x++`/`x--` can write back; once a
    /// `.`/`[]` suffix has applied, the value in `t0` is no longer tied to a
    /// single storage location and a trailing `++`/`--` is just an
    /// in-register bump with no persisted effect.
    fn compile_postfix(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        let mut bound_to = self.compile_primary(ctx)?;
        loop {
            match &self.current.kind {
                TokenKind::Dot => {
                    self.advance()?;
                    let name = self.expect_identifier()?;
                    if self.check(&TokenKind::LParen) {
                        self.compile_call_on_t0(ctx, &name)?;
                    } else {
                        self.compile_call_on_t0_zero_arity(ctx, &format!("get_{name}"))?;
                    }
                    bound_to = None;
                }
                TokenKind::LBracket => {
                    self.advance()?;
                    self.push_t(ctx, LEFT);
                    self.compile_expr_inner(ctx)?;
                    ctx.program.emit(Operation::new(OpCode::PUSH as u8, LEFT, 0));
                    self.expect(TokenKind::RBracket)?;
                    let get_idx = ctx.program.intern_literal(self.strings, "get");
                    ctx.program.emit(Operation::new(OpCode::CALL as u8, get_idx as i64, 1));
                    emit_call_cache_slots(&mut ctx.program);
                    bound_to = None;
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let inc = matches!(self.current.kind, TokenKind::PlusPlus);
                    self.advance()?;
                    if let Some(name) = bound_to.clone() {
                        let saved = ctx.next_local;
                        ctx.next_local += 1;
                        ctx.program.emit(Operation::new(OpCode::PUSHN as u8, 1, 0));
                        ctx.program.emit(Operation::new(OpCode::SPOKE as u8, LEFT, saved));
                        ctx.program.emit(Operation::new(if inc { OpCode::INC } else { OpCode::DEC } as u8, LEFT, 0));
                        self.emit_store(ctx, &name)?;
                        ctx.program.emit(Operation::new(OpCode::SPEEK as u8, LEFT, saved));
                    } else {
                        ctx.program.emit(Operation::new(if inc { OpCode::INC } else { OpCode::DEC } as u8, LEFT, 0));
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    /// Compiles `t0.name(args)`: receiver already sits in `t0`.
    fn compile_call_on_t0(&mut self, ctx: &mut FnCtx, name: &str) -> CompileResult<()> {
        self.advance()?; // '('
        let mut argc: i64 = 0;
        self.push_t(ctx, LEFT);
        if !self.check(&TokenKind::RParen) {
            loop {
                self.compile_assignment(ctx)?;
                ctx.program.emit(Operation::new(OpCode::PUSH as u8, LEFT, 0));
                argc += 1;
                if !self.eat(&TokenKind::Comma)? {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        let name_idx = ctx.program.intern_literal(self.strings, name);
        ctx.program.emit(Operation::new(OpCode::CALL as u8, name_idx as i64, argc));
        emit_call_cache_slots(&mut ctx.program);
        Ok(())
    }

    fn compile_call_on_t0_zero_arity(&mut self, ctx: &mut FnCtx, name: &str) -> CompileResult<()> {
        self.push_t(ctx, LEFT);
        let name_idx = ctx.program.intern_literal(self.strings, name);
        ctx.program.emit(Operation::new(OpCode::CALL as u8, name_idx as i64, 0));
        emit_call_cache_slots(&mut ctx.program);
        Ok(())
    }

    fn compile_identifier_load(&mut self, ctx: &mut FnCtx, name: &str) -> CompileResult<()> {
        match ctx.table.resolve(name).cloned() {
            Some(SymbolKind::Local { offset }) => {
                ctx.program.emit(Operation::new(OpCode::SPEEK as u8, LEFT, offset));
                Ok(())
            }
            Some(SymbolKind::Field { address }) => {
                ctx.program.emit(Operation::new(OpCode::PEEK as u8, LEFT, address as i64));
                Ok(())
            }
            Some(SymbolKind::Static { handle: Some(h), .. }) => {
                ctx.program.emit(Operation::new(OpCode::MOVO as u8, LEFT, h as i64));
                Ok(())
            }
            Some(SymbolKind::Static { handle: None, name: static_name }) => {
                // No compile-time handle yet: fall back to a runtime lookup
                // of `static_name` as a child of root via `find_object`.
                ctx.program.emit(Operation::new(OpCode::SELF as u8, LEFT, 0));
                self.compile_call_with_string_arg(ctx, "find_object", &static_name)
            }
            Some(SymbolKind::Plugin { path }) => self.compile_plugin_chain(ctx, &path),
            None => Err(CompileError::UnknownSymbol { file: self.file(), line: self.line(), name: name.to_string() }),
        }
    }

    fn compile_call_with_string_arg(&mut self, ctx: &mut FnCtx, name: &str, arg: &str) -> CompileResult<()> {
        self.push_t(ctx, LEFT);
        let arg_idx = ctx.program.intern_literal(self.strings, arg);
        ctx.program.emit(Operation::new(OpCode::MOVS as u8, LEFT, arg_idx as i64));
        ctx.program.emit(Operation::new(OpCode::PUSH as u8, LEFT, 0));
        let name_idx = ctx.program.intern_literal(self.strings, name);
        ctx.program.emit(Operation::new(OpCode::CALL as u8, name_idx as i64, 1));
        emit_call_cache_slots(&mut ctx.program);
        Ok(())
    }

    /// A `using a.b.c;` import resolves, at each use, to the plugin root
    /// narrowed by one `get_<segment>()` accessor per path component.
    fn compile_plugin_chain(&mut self, ctx: &mut FnCtx, path: &[String]) -> CompileResult<()> {
        ctx.program.emit(Operation::new(OpCode::SELF as u8, LEFT, 0));
        self.compile_call_with_string_arg(ctx, "find_object", "Plugin")?;
        for segment in path {
            self.compile_call_on_t0_zero_arity(ctx, &format!("get_{segment}"))?;
        }
        Ok(())
    }

    /// Compiles a single atom. Returns `Some(name)` when the atom was a bare
    /// variable reference (not a call), so postfix `++`/`--` can store back.
    fn compile_primary(&mut self, ctx: &mut FnCtx) -> CompileResult<Option<String>> {
        match self.current.kind.clone() {
            TokenKind::Number(n) => {
                self.advance()?;
                ctx.program.emit(Operation::new(OpCode::MOVF as u8, LEFT, n.to_bits() as i64));
                Ok(None)
            }
            TokenKind::String(s) => {
                self.advance()?;
                let idx = ctx.program.intern_literal(self.strings, &s);
                ctx.program.emit(Operation::new(OpCode::MOVS as u8, LEFT, idx as i64));
                Ok(None)
            }
            TokenKind::True => {
                self.advance()?;
                ctx.program.emit(Operation::new(OpCode::MOVB as u8, LEFT, 1));
                Ok(None)
            }
            TokenKind::False => {
                self.advance()?;
                ctx.program.emit(Operation::new(OpCode::MOVB as u8, LEFT, 0));
                Ok(None)
            }
            TokenKind::Null => {
                self.advance()?;
                ctx.program.emit(Operation::new(OpCode::MOVN as u8, LEFT, 0));
                Ok(None)
            }
            TokenKind::This => {
                self.advance()?;
                ctx.program.emit(Operation::new(OpCode::SELF as u8, LEFT, 0));
                Ok(None)
            }
            TokenKind::Caller => {
                self.advance()?;
                ctx.program.emit(Operation::new(OpCode::CALLER as u8, LEFT, 0));
                Ok(None)
            }
            TokenKind::Timeout => {
                if !ctx.in_state {
                    return Err(CompileError::TimeoutOutsideState { file: self.file(), line: self.line() });
                }
                self.advance()?;
                self.expect(TokenKind::LParen)?;
                self.compile_expr_inner(ctx)?;
                self.expect(TokenKind::RParen)?;
                ctx.program.emit(Operation::new(OpCode::SELF as u8, RIGHT, 0));
                self.push_t(ctx, RIGHT);
                self.push_t(ctx, LEFT);
                let timeout_idx = ctx.program.intern_literal(self.strings, "timeout");
                ctx.program.emit(Operation::new(OpCode::CALL as u8, timeout_idx as i64, 1));
                emit_call_cache_slots(&mut ctx.program);
                Ok(None)
            }
            TokenKind::LParen => {
                self.advance()?;
                self.compile_assignment(ctx)?;
                self.expect(TokenKind::RParen)?;
                Ok(None)
            }
            TokenKind::LBracket => {
                self.compile_array_literal(ctx)?;
                Ok(None)
            }
            TokenKind::Identifier(name) => {
                self.advance()?;
                if self.check(&TokenKind::LParen) {
                    ctx.program.emit(Operation::new(OpCode::SELF as u8, LEFT, 0));
                    self.compile_call_on_t0(ctx, &name)?;
                    Ok(None)
                } else {
                    self.compile_identifier_load(ctx, &name)?;
                    Ok(Some(name))
                }
            }
            other => Err(CompileError::UnexpectedToken {
                file: self.file(),
                line: self.line(),
                expected: "expression".to_string(),
                found: format!("{other}"),
            }),
        }
    }

    /// `[a, b, c]` desugars to spawning an `Array` under `this` and calling
    /// `push` once per element (§4.9 — `Array` exposes `push`/`get`/`length`).
    fn compile_array_literal(&mut self, ctx: &mut FnCtx) -> CompileResult<()> {
        self.advance()?; // '['
        ctx.program.emit(Operation::new(OpCode::SELF as u8, LEFT, 0));
        self.compile_call_with_string_arg(ctx, "spawn", "Array")?;

        let array_offset = ctx.next_local;
        ctx.next_local += 1;
        ctx.program.emit(Operation::new(OpCode::PUSHN as u8, 1, 0));
        ctx.program.emit(Operation::new(OpCode::SPOKE as u8, LEFT, array_offset));

        let push_idx = ctx.program.intern_literal(self.strings, "push");
        while !self.check(&TokenKind::RBracket) {
            ctx.program.emit(Operation::new(OpCode::SPEEK as u8, LEFT, array_offset));
            self.push_t(ctx, LEFT);
            self.compile_assignment(ctx)?;
            ctx.program.emit(Operation::new(OpCode::PUSH as u8, LEFT, 0));
            ctx.program.emit(Operation::new(OpCode::CALL as u8, push_idx as i64, 1));
            emit_call_cache_slots(&mut ctx.program);
            if !self.eat(&TokenKind::Comma)? {
                break;
            }
        }
        self.expect(TokenKind::RBracket)?;
        ctx.program.emit(Operation::new(OpCode::SPEEK as u8, LEFT, array_offset));
        Ok(())
    }

    // ---- small codegen helpers --------------------------------------------

    fn push_t(&mut self, ctx: &mut FnCtx, reg: i64) {
        ctx.program.emit(Operation::new(OpCode::PUSH as u8, reg, 0));
    }

    /// Pops the saved left-hand value into `t1`, leaving the just-computed
    /// right-hand value moved there from `t0`, and restores the left-hand
    /// value into `t0` — the order arithmetic/compare opcodes want
    /// (`t[a] := t[a] OP t[b]`, with `a` the left operand).
    fn pop_into_right(&mut self, ctx: &mut FnCtx) {
        ctx.program.emit(Operation::new(OpCode::MOV as u8, RIGHT, LEFT));
        ctx.program.emit(Operation::new(OpCode::POP as u8, LEFT, 0));
    }

    /// Leaves `t0 := (condition ? true : false)` where `jump_if_true` is the
    /// conditional jump opcode whose flag matches the condition being true.
    fn emit_comparison_result(&mut self, ctx: &mut FnCtx, jump_if_true: OpCode) {
        ctx.program.emit(Operation::new(OpCode::MOVB as u8, LEFT, 0));
        let set_true = ctx.program.new_label();
        let end = ctx.program.new_label();
        ctx.program.emit(Operation::new(jump_if_true as u8, set_true as i64, 0));
        ctx.program.emit(Operation::new(OpCode::JMP as u8, end as i64, 0));
        ctx.program.define_label(set_true);
        ctx.program.emit(Operation::new(OpCode::MOVB as u8, LEFT, 1));
        ctx.program.define_label(end);
    }

    fn emit_jump_if_falsy(&mut self, ctx: &mut FnCtx, label: usize) {
        ctx.program.emit(Operation::new(OpCode::LNOT2 as u8, LEFT, 0));
        ctx.program.emit(Operation::new(OpCode::MOVB as u8, RIGHT, 0));
        ctx.program.emit(Operation::new(OpCode::CMP as u8, LEFT, RIGHT));
        ctx.program.emit(Operation::new(OpCode::JE as u8, label as i64, 0));
    }

    fn emit_jump_if_truthy(&mut self, ctx: &mut FnCtx, label: usize) {
        ctx.program.emit(Operation::new(OpCode::LNOT2 as u8, LEFT, 0));
        ctx.program.emit(Operation::new(OpCode::MOVB as u8, RIGHT, 0));
        ctx.program.emit(Operation::new(OpCode::CMP as u8, LEFT, RIGHT));
        ctx.program.emit(Operation::new(OpCode::JNE as u8, label as i64, 0));
    }
}

struct FnCtx<'t> {
    program: Program,
    table: &'t mut SymbolTable,
    next_local: i64,
    /// `(continue_target, break_target)` for the innermost enclosing loop.
    loop_labels: Vec<(usize, usize)>,
    in_state: bool,
}

fn emit_call_cache_slots(program: &mut Program) {
    for _ in 0..CALL_CACHE_SLOTS {
        program.emit(Operation::new(OpCode::NOP as u8, 0, 0));
    }
}

fn is_jump_byte(byte: u8) -> bool {
    OpCode::from_byte(byte).map(OpCode::is_jump).unwrap_or(false)
}
