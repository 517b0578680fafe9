// src/vm/compiler.rs

use std::collections::HashMap;
use std::mem;

use log::debug;

use crate::error::{CompileError, CompileErrorKind};
use crate::scanner::{Scanner, Token, TokenKind};
use crate::value::Value;
use crate::vm::chunk::Chunk;
use crate::vm::debug::disassemble_chunk;
use crate::vm::function::Function;
use crate::vm::opcode::OpCode;

pub type CompileResult<T> = Result<T, CompileError>;

/// Depth of a local whose initializer is still being compiled.
pub const UNINITIALIZED: i32 = -1;
const MAX_LOCALS: usize = 256;
const MAX_ARGS: usize = 255;
/// Bound on statement and expression recursion, so nesting fails as a compile error.
pub const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    None,
    Assignment, // =
    Or,         // or
    And,        // and
    Equality,   // == !=
    Comparison, // < > <= >=
    Term,       // + -
    Factor,     // * /
    Unary,      // ! -
    Call,       // ()
    Primary,
}

impl Precedence {
    /// The next-tighter level. Binary operands parse at this level, which makes them left-associative.
    pub fn next(self) -> Self {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call | Precedence::Primary => Precedence::Primary,
        }
    }
}

pub type ParseFn = fn(&mut Compiler, bool) -> CompileResult<()>;

#[derive(Clone, Copy)]
pub struct ParseRule {
    pub prefix: Option<ParseFn>,
    pub infix: Option<ParseFn>,
    pub precedence: Precedence,
}

impl ParseRule {
    fn new(prefix: Option<ParseFn>, infix: Option<ParseFn>, precedence: Precedence) -> Self {
        ParseRule { prefix, infix, precedence }
    }
}

/// The Pratt table. Every token kind has an entry, most of them empty.
pub fn get_rule(kind: TokenKind) -> ParseRule {
    use Precedence as P;
    use TokenKind as T;

    match kind {
        T::LeftParen => ParseRule::new(Some(Compiler::grouping), Some(Compiler::call), P::Call),
        T::Minus => ParseRule::new(Some(Compiler::unary), Some(Compiler::binary), P::Term),
        T::Plus => ParseRule::new(None, Some(Compiler::binary), P::Term),
        T::Slash | T::Star => ParseRule::new(None, Some(Compiler::binary), P::Factor),
        T::Bang => ParseRule::new(Some(Compiler::unary), None, P::None),
        T::BangEqual | T::EqualEqual => ParseRule::new(None, Some(Compiler::binary), P::Equality),
        T::Greater | T::GreaterEqual | T::Less | T::LessEqual => {
            ParseRule::new(None, Some(Compiler::binary), P::Comparison)
        }
        T::Identifier => ParseRule::new(Some(Compiler::variable), None, P::None),
        T::String => ParseRule::new(Some(Compiler::string), None, P::None),
        T::Number => ParseRule::new(Some(Compiler::number), None, P::None),
        T::And => ParseRule::new(None, Some(Compiler::and), P::And),
        T::Or => ParseRule::new(None, Some(Compiler::or), P::Or),
        T::False | T::True | T::Nil => ParseRule::new(Some(Compiler::literal), None, P::None),
        T::RightParen
        | T::LeftBrace
        | T::RightBrace
        | T::Comma
        | T::Dot
        | T::Semicolon
        | T::Equal
        | T::Break
        | T::Class
        | T::Continue
        | T::Elif
        | T::Else
        | T::For
        | T::Fun
        | T::If
        | T::Print
        | T::Return
        | T::Super
        | T::This
        | T::Var
        | T::While
        | T::Error(_)
        | T::Eof => ParseRule::new(None, None, P::None),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Block,
    Loop,
    Function,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    start_pc: usize,
    depth: i32,
    // Where `continue` jumps to. Only meaningful for loop scopes.
    loop_start: usize,
    // Forward jumps emitted by `break`, patched when the loop scope ends.
    breaks: Vec<usize>,
}

#[derive(Debug)]
struct Local {
    name: String,
    depth: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionKind {
    Script,
    Function,
}

/// Per-function compilation state. Nested `fun` declarations push a fresh one.
#[derive(Debug)]
struct FunctionState {
    function: Function,
    kind: FunctionKind,
    locals: Vec<Local>,
    scopes: Vec<Scope>,
    // Interned identifier constants, so a name occupies one pool slot per chunk.
    names: HashMap<String, u8>,
}

impl FunctionState {
    // Slot 0 holds the function being run. Naming it after the function lets the body recurse.
    fn new(function: Function, kind: FunctionKind) -> Self {
        let reserved = match kind {
            FunctionKind::Script => String::new(),
            FunctionKind::Function => function.name.clone(),
        };
        FunctionState {
            function,
            kind,
            locals: vec![Local { name: reserved, depth: 0 }],
            scopes: Vec::new(),
            names: HashMap::new(),
        }
    }

    fn depth(&self) -> i32 {
        self.scopes.len() as i32
    }
}

/// The main entry point for compilation.
pub fn compile(source: &str) -> CompileResult<Chunk> {
    let mut compiler = Compiler::new(source);
    compiler.advance()?;
    while !compiler.matches(TokenKind::Eof)? {
        compiler.declaration()?;
    }
    Ok(compiler.finish().chunk)
}

pub struct Compiler {
    scanner: Scanner,
    current: Token,
    previous: Token,
    state: FunctionState,
    enclosing: Vec<FunctionState>,
    nesting: usize,
}

impl Compiler {
    pub fn new(source: &str) -> Self {
        Compiler {
            scanner: Scanner::new(source),
            current: Token::synthetic(),
            previous: Token::synthetic(),
            state: FunctionState::new(Function::new(), FunctionKind::Script),
            enclosing: Vec::new(),
            nesting: 0,
        }
    }

    /// Terminates the top-level script and hands over its function.
    pub fn finish(mut self) -> Function {
        self.emit_return();
        let function = mem::take(&mut self.state.function);
        debug!("{}", disassemble_chunk(&function.chunk, &function.to_string()));
        function
    }

    // --- Token Helpers ---

    pub fn advance(&mut self) -> CompileResult<()> {
        self.previous = self.current;
        self.current = self.scanner.scan_token();
        if let TokenKind::Error(err) = self.current.kind {
            return Err(self.error_at(self.current, err.into()));
        }
        Ok(())
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn matches(&mut self, kind: TokenKind) -> CompileResult<bool> {
        if !self.check(kind) {
            return Ok(false);
        }
        self.advance()?;
        Ok(true)
    }

    fn consume(&mut self, kind: TokenKind, message: &'static str) -> CompileResult<()> {
        if self.check(kind) {
            return self.advance();
        }
        Err(self.error_at(self.current, CompileErrorKind::Expected(message)))
    }

    fn error_at(&self, token: Token, kind: CompileErrorKind) -> CompileError {
        CompileError {
            kind,
            line: token.line,
            lexeme: self.scanner.lexeme(&token).to_string(),
        }
    }

    fn error(&self, kind: CompileErrorKind) -> CompileError {
        self.error_at(self.previous, kind)
    }

    fn previous_lexeme(&self) -> String {
        self.scanner.lexeme(&self.previous).to_string()
    }

    // --- Bytecode Emitter Helpers ---

    fn chunk(&mut self) -> &mut Chunk {
        &mut self.state.function.chunk
    }

    fn emit_op(&mut self, op: OpCode) {
        let line = self.previous.line;
        self.chunk().write_opcode(op, line);
    }

    fn emit_with_operand(&mut self, op: OpCode, operand: u8) {
        self.emit_op(op);
        self.chunk().write(operand);
    }

    pub fn emit_return(&mut self) {
        self.emit_op(OpCode::OpNil);
        self.emit_op(OpCode::OpReturn);
    }

    pub fn make_constant(&mut self, value: Value) -> CompileResult<u8> {
        match self.chunk().add_constant(value) {
            Some(index) => Ok(index),
            None => Err(self.error(CompileErrorKind::TooManyConstants)),
        }
    }

    fn emit_constant(&mut self, value: Value) -> CompileResult<()> {
        let index = self.make_constant(value)?;
        self.emit_with_operand(OpCode::OpConstant, index);
        Ok(())
    }

    fn identifier_constant(&mut self, name: &str) -> CompileResult<u8> {
        if let Some(&index) = self.state.names.get(name) {
            return Ok(index);
        }
        let index = self.make_constant(Value::string(name))?;
        self.state.names.insert(name.to_string(), index);
        Ok(index)
    }

    /// Emits `op` with a placeholder distance and returns the placeholder's offset.
    pub fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_op(op);
        self.chunk().write(0xff);
        self.chunk().write(0xff);
        self.chunk().len() - 2
    }

    pub fn patch_jump(&mut self, offset: usize) -> CompileResult<()> {
        let distance = self.chunk().len() - offset - 2;
        let Ok(distance) = u16::try_from(distance) else {
            return Err(self.error(CompileErrorKind::JumpTooLarge));
        };
        let [hi, lo] = distance.to_be_bytes();
        self.chunk().code[offset] = hi;
        self.chunk().code[offset + 1] = lo;
        Ok(())
    }

    // The distance is counted back from the byte after the operand.
    pub fn emit_loop(&mut self, loop_start: usize) -> CompileResult<()> {
        self.emit_op(OpCode::OpLoop);
        let distance = self.chunk().len() + 2 - loop_start;
        let Ok(distance) = u16::try_from(distance) else {
            return Err(self.error(CompileErrorKind::LoopTooLarge));
        };
        let [hi, lo] = distance.to_be_bytes();
        self.chunk().write(hi);
        self.chunk().write(lo);
        Ok(())
    }

    // Runs `body` one level deeper, failing once nesting reaches `MAX_NESTING`.
    fn nested(&mut self, body: impl FnOnce(&mut Self) -> CompileResult<()>) -> CompileResult<()> {
        if self.nesting >= MAX_NESTING {
            return Err(self.error_at(self.current, CompileErrorKind::TooDeeplyNested));
        }
        self.nesting += 1;
        let result = body(self);
        self.nesting -= 1;
        result
    }

    // --- Scope and Variable Helpers ---

    fn begin_scope(&mut self, kind: ScopeKind) {
        let start_pc = self.chunk().len();
        let depth = self.state.depth() + 1;
        self.state.scopes.push(Scope {
            kind,
            start_pc,
            depth,
            loop_start: start_pc,
            breaks: Vec::new(),
        });
    }

    fn end_scope(&mut self) -> CompileResult<()> {
        let Some(scope) = self.state.scopes.pop() else {
            return Ok(());
        };
        // Breaks land after the loop's exit but before its own locals are discarded.
        for jump in scope.breaks {
            self.patch_jump(jump)?;
        }
        while self.state.locals.last().is_some_and(|local| local.depth >= scope.depth) {
            self.state.locals.pop();
            self.emit_op(OpCode::OpPop);
        }
        debug!(
            "closed {:?} scope at depth {} spanning bytes {}..{}",
            scope.kind,
            scope.depth,
            scope.start_pc,
            self.state.function.chunk.len()
        );
        Ok(())
    }

    fn add_local(&mut self, name: String) -> CompileResult<()> {
        if self.state.locals.len() >= MAX_LOCALS {
            return Err(self.error(CompileErrorKind::TooManyLocals));
        }
        self.state.locals.push(Local { name, depth: UNINITIALIZED });
        Ok(())
    }

    fn declare_variable(&mut self) -> CompileResult<()> {
        let depth = self.state.depth();
        if depth == 0 {
            return Ok(());
        }
        let name = self.previous_lexeme();
        for local in self.state.locals.iter().rev() {
            if local.depth != UNINITIALIZED && local.depth < depth {
                break;
            }
            if local.name == name {
                return Err(self.error(CompileErrorKind::Redeclared(name)));
            }
        }
        self.add_local(name)
    }

    fn parse_variable(&mut self, message: &'static str) -> CompileResult<u8> {
        self.consume(TokenKind::Identifier, message)?;
        self.declare_variable()?;
        if self.state.depth() > 0 {
            return Ok(0);
        }
        let name = self.previous_lexeme();
        self.identifier_constant(&name)
    }

    fn mark_initialized(&mut self) {
        let depth = self.state.depth();
        if depth == 0 {
            return;
        }
        if let Some(local) = self.state.locals.last_mut() {
            local.depth = depth;
        }
    }

    fn define_variable(&mut self, global: u8) {
        if self.state.depth() > 0 {
            self.mark_initialized();
            return;
        }
        self.emit_with_operand(OpCode::OpDefineGlobal, global);
    }

    fn resolve_local(&self, name: &str) -> CompileResult<Option<u8>> {
        for (slot, local) in self.state.locals.iter().enumerate().rev() {
            if local.name == name {
                if local.depth == UNINITIALIZED {
                    return Err(self.error(CompileErrorKind::OwnInitializer(name.to_string())));
                }
                return Ok(Some(slot as u8));
            }
        }
        Ok(None)
    }

    fn innermost_loop(&self) -> Option<usize> {
        self.state.scopes.iter().rposition(|scope| scope.kind == ScopeKind::Loop)
    }

    /// Pops every local declared inside the loop body so the stack matches the loop head.
    fn discard_locals_above(&mut self, depth: i32) {
        let count = self
            .state
            .locals
            .iter()
            .rev()
            .take_while(|local| local.depth > depth)
            .count();
        for _ in 0..count {
            self.emit_op(OpCode::OpPop);
        }
    }

    // --- Declarations and Statements ---

    pub fn declaration(&mut self) -> CompileResult<()> {
        if self.matches(TokenKind::Fun)? {
            self.fun_declaration()
        } else if self.matches(TokenKind::Var)? {
            self.var_declaration()
        } else {
            self.statement()
        }
    }

    fn var_declaration(&mut self) -> CompileResult<()> {
        let global = self.parse_variable("Expect variable name.")?;
        if self.matches(TokenKind::Equal)? {
            self.expression()?;
        } else {
            self.emit_op(OpCode::OpNil);
        }
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.")?;
        self.define_variable(global);
        Ok(())
    }

    fn fun_declaration(&mut self) -> CompileResult<()> {
        let global = self.parse_variable("Expect function name.")?;
        // The body may refer to the function itself.
        self.mark_initialized();
        self.function()?;
        self.define_variable(global);
        Ok(())
    }

    fn function(&mut self) -> CompileResult<()> {
        self.nested(Compiler::function_body)
    }

    fn function_body(&mut self) -> CompileResult<()> {
        let name = self.previous_lexeme();
        let parent = mem::replace(
            &mut self.state,
            FunctionState::new(Function::named(name, 0), FunctionKind::Function),
        );
        self.enclosing.push(parent);
        self.begin_scope(ScopeKind::Function);

        self.consume(TokenKind::LeftParen, "Expect '(' after function name.")?;
        if !self.check(TokenKind::RightParen) {
            loop {
                if self.state.function.arity == MAX_ARGS {
                    return Err(self.error_at(self.current, CompileErrorKind::TooManyParameters));
                }
                self.state.function.arity += 1;
                let param = self.parse_variable("Expect parameter name.")?;
                self.define_variable(param);
                if !self.matches(TokenKind::Comma)? {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;
        self.consume(TokenKind::LeftBrace, "Expect '{' before function body.")?;
        self.block()?;

        // No end_scope: returning discards the whole frame.
        self.emit_return();
        let finished = match self.enclosing.pop() {
            Some(parent) => mem::replace(&mut self.state, parent),
            None => mem::replace(&mut self.state, FunctionState::new(Function::new(), FunctionKind::Script)),
        };
        let function = finished.function;
        debug!("{}", disassemble_chunk(&function.chunk, &function.to_string()));
        self.emit_constant(Value::function(function))
    }

    fn statement(&mut self) -> CompileResult<()> {
        self.nested(Compiler::dispatch_statement)
    }

    fn dispatch_statement(&mut self) -> CompileResult<()> {
        if self.matches(TokenKind::Print)? {
            self.print_statement()
        } else if self.matches(TokenKind::If)? {
            self.if_statement()
        } else if self.matches(TokenKind::While)? {
            self.while_statement()
        } else if self.matches(TokenKind::For)? {
            self.for_statement()
        } else if self.matches(TokenKind::Break)? {
            self.break_statement()
        } else if self.matches(TokenKind::Continue)? {
            self.continue_statement()
        } else if self.matches(TokenKind::Return)? {
            self.return_statement()
        } else if self.matches(TokenKind::LeftBrace)? {
            self.begin_scope(ScopeKind::Block);
            self.block()?;
            self.end_scope()
        } else {
            self.expression_statement()
        }
    }

    fn block(&mut self) -> CompileResult<()> {
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.declaration()?;
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.")
    }

    fn print_statement(&mut self) -> CompileResult<()> {
        self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after value.")?;
        self.emit_op(OpCode::OpPrint);
        Ok(())
    }

    fn expression_statement(&mut self) -> CompileResult<()> {
        self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.")?;
        self.emit_op(OpCode::OpPop);
        Ok(())
    }

    // Handles both `if` and `elif`; an `elif` is an `if` nested in the else branch.
    fn if_statement(&mut self) -> CompileResult<()> {
        let message = if self.previous.kind == TokenKind::Elif {
            "Expect '(' after 'elif'."
        } else {
            "Expect '(' after 'if'."
        };
        self.consume(TokenKind::LeftParen, message)?;
        self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after condition.")?;

        let then_jump = self.emit_jump(OpCode::OpJumpIfFalse);
        self.emit_op(OpCode::OpPop);
        self.statement()?;
        let else_jump = self.emit_jump(OpCode::OpJump);

        self.patch_jump(then_jump)?;
        self.emit_op(OpCode::OpPop);
        if self.matches(TokenKind::Elif)? {
            self.nested(Compiler::if_statement)?;
        } else if self.matches(TokenKind::Else)? {
            self.statement()?;
        }
        self.patch_jump(else_jump)
    }

    fn while_statement(&mut self) -> CompileResult<()> {
        self.begin_scope(ScopeKind::Loop);
        let loop_start = self.chunk().len();

        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.")?;
        self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after condition.")?;

        let exit_jump = self.emit_jump(OpCode::OpJumpIfFalse);
        self.emit_op(OpCode::OpPop);
        self.statement()?;
        self.emit_loop(loop_start)?;

        self.patch_jump(exit_jump)?;
        self.emit_op(OpCode::OpPop);
        self.end_scope()
    }

    // init; cond-check; jump-over-increment; increment; loop-to-cond; body; loop-to-increment
    fn for_statement(&mut self) -> CompileResult<()> {
        self.begin_scope(ScopeKind::Loop);
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.")?;
        if self.matches(TokenKind::Semicolon)? {
            // No initializer.
        } else if self.matches(TokenKind::Var)? {
            self.var_declaration()?;
        } else {
            self.expression_statement()?;
        }

        let mut loop_start = self.chunk().len();
        let mut exit_jump = None;
        if !self.matches(TokenKind::Semicolon)? {
            self.expression()?;
            self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.")?;
            exit_jump = Some(self.emit_jump(OpCode::OpJumpIfFalse));
            self.emit_op(OpCode::OpPop);
        }

        if !self.matches(TokenKind::RightParen)? {
            let body_jump = self.emit_jump(OpCode::OpJump);
            let increment_start = self.chunk().len();
            self.expression()?;
            self.emit_op(OpCode::OpPop);
            self.consume(TokenKind::RightParen, "Expect ')' after for clauses.")?;

            self.emit_loop(loop_start)?;
            loop_start = increment_start;
            self.patch_jump(body_jump)?;
        }

        if let Some(scope) = self.state.scopes.last_mut() {
            scope.loop_start = loop_start;
        }
        self.statement()?;
        self.emit_loop(loop_start)?;

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump)?;
            self.emit_op(OpCode::OpPop);
        }
        self.end_scope()
    }

    fn break_statement(&mut self) -> CompileResult<()> {
        let Some(index) = self.innermost_loop() else {
            return Err(self.error(CompileErrorKind::BreakOutsideLoop));
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after 'break'.")?;

        let depth = self.state.scopes[index].depth;
        self.discard_locals_above(depth);
        let jump = self.emit_jump(OpCode::OpJump);
        self.state.scopes[index].breaks.push(jump);
        Ok(())
    }

    fn continue_statement(&mut self) -> CompileResult<()> {
        let Some(index) = self.innermost_loop() else {
            return Err(self.error(CompileErrorKind::ContinueOutsideLoop));
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after 'continue'.")?;

        let depth = self.state.scopes[index].depth;
        let loop_start = self.state.scopes[index].loop_start;
        self.discard_locals_above(depth);
        self.emit_loop(loop_start)
    }

    fn return_statement(&mut self) -> CompileResult<()> {
        if self.state.kind == FunctionKind::Script {
            return Err(self.error(CompileErrorKind::ReturnOutsideFunction));
        }
        if self.matches(TokenKind::Semicolon)? {
            self.emit_return();
        } else {
            self.expression()?;
            self.consume(TokenKind::Semicolon, "Expect ';' after return value.")?;
            self.emit_op(OpCode::OpReturn);
        }
        Ok(())
    }

    // --- Expressions ---

    pub fn expression(&mut self) -> CompileResult<()> {
        self.parse_precedence(Precedence::Assignment)
    }

    pub fn parse_precedence(&mut self, precedence: Precedence) -> CompileResult<()> {
        self.nested(|compiler| compiler.climb(precedence))
    }

    fn climb(&mut self, precedence: Precedence) -> CompileResult<()> {
        self.advance()?;
        let Some(prefix) = get_rule(self.previous.kind).prefix else {
            return Err(self.error(CompileErrorKind::ExpectExpression));
        };
        let can_assign = precedence <= Precedence::Assignment;
        prefix(self, can_assign)?;

        while precedence <= get_rule(self.current.kind).precedence {
            self.advance()?;
            if let Some(infix) = get_rule(self.previous.kind).infix {
                infix(self, can_assign)?;
            }
        }

        if can_assign && self.matches(TokenKind::Equal)? {
            return Err(self.error(CompileErrorKind::InvalidAssignmentTarget));
        }
        Ok(())
    }

    fn grouping(&mut self, _can_assign: bool) -> CompileResult<()> {
        self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after expression.")
    }

    fn number(&mut self, _can_assign: bool) -> CompileResult<()> {
        let text = self.previous_lexeme();
        let value: f64 = text
            .parse()
            .map_err(|_| self.error(CompileErrorKind::InvalidNumber(text.clone())))?;
        self.emit_constant(Value::Float(value))
    }

    fn string(&mut self, _can_assign: bool) -> CompileResult<()> {
        let text = self.previous_lexeme();
        // Strip the surrounding quotes.
        let contents = &text[1..text.len() - 1];
        self.emit_constant(Value::string(contents))
    }

    fn literal(&mut self, _can_assign: bool) -> CompileResult<()> {
        match self.previous.kind {
            TokenKind::False => self.emit_op(OpCode::OpFalse),
            TokenKind::True => self.emit_op(OpCode::OpTrue),
            TokenKind::Nil => self.emit_op(OpCode::OpNil),
            _ => unreachable!(),
        }
        Ok(())
    }

    fn unary(&mut self, _can_assign: bool) -> CompileResult<()> {
        let op_kind = self.previous.kind;
        self.parse_precedence(Precedence::Unary)?;
        match op_kind {
            TokenKind::Minus => self.emit_op(OpCode::OpNegate),
            TokenKind::Bang => self.emit_op(OpCode::OpNot),
            _ => unreachable!(),
        }
        Ok(())
    }

    fn binary(&mut self, _can_assign: bool) -> CompileResult<()> {
        let op_kind = self.previous.kind;
        let rule = get_rule(op_kind);
        self.parse_precedence(rule.precedence.next())?;
        match op_kind {
            TokenKind::Plus => self.emit_op(OpCode::OpAdd),
            TokenKind::Minus => self.emit_op(OpCode::OpSubtract),
            TokenKind::Star => self.emit_op(OpCode::OpMultiply),
            TokenKind::Slash => self.emit_op(OpCode::OpDivide),
            TokenKind::EqualEqual => self.emit_op(OpCode::OpEqual),
            TokenKind::BangEqual => {
                self.emit_op(OpCode::OpEqual);
                self.emit_op(OpCode::OpNot);
            }
            TokenKind::Greater => self.emit_op(OpCode::OpGreater),
            TokenKind::GreaterEqual => {
                self.emit_op(OpCode::OpLess);
                self.emit_op(OpCode::OpNot);
            }
            TokenKind::Less => self.emit_op(OpCode::OpLess),
            TokenKind::LessEqual => {
                self.emit_op(OpCode::OpGreater);
                self.emit_op(OpCode::OpNot);
            }
            _ => unreachable!(),
        }
        Ok(())
    }

    fn and(&mut self, _can_assign: bool) -> CompileResult<()> {
        let end_jump = self.emit_jump(OpCode::OpJumpIfFalse);
        self.emit_op(OpCode::OpPop);
        self.parse_precedence(Precedence::And)?;
        self.patch_jump(end_jump)
    }

    fn or(&mut self, _can_assign: bool) -> CompileResult<()> {
        let else_jump = self.emit_jump(OpCode::OpJumpIfFalse);
        let end_jump = self.emit_jump(OpCode::OpJump);
        self.patch_jump(else_jump)?;
        self.emit_op(OpCode::OpPop);
        self.parse_precedence(Precedence::Or)?;
        self.patch_jump(end_jump)
    }

    fn variable(&mut self, can_assign: bool) -> CompileResult<()> {
        let name = self.previous_lexeme();
        let (get_op, set_op, operand) = match self.resolve_local(&name)? {
            Some(slot) => (OpCode::OpGetLocal, OpCode::OpSetLocal, slot),
            None => {
                let index = self.identifier_constant(&name)?;
                (OpCode::OpGetGlobal, OpCode::OpSetGlobal, index)
            }
        };

        if can_assign && self.matches(TokenKind::Equal)? {
            self.expression()?;
            self.emit_with_operand(set_op, operand);
        } else {
            self.emit_with_operand(get_op, operand);
        }
        Ok(())
    }

    fn call(&mut self, _can_assign: bool) -> CompileResult<()> {
        let mut arg_count = 0;
        if !self.check(TokenKind::RightParen) {
            loop {
                self.expression()?;
                if arg_count == MAX_ARGS {
                    return Err(self.error(CompileErrorKind::TooManyArguments));
                }
                arg_count += 1;
                if !self.matches(TokenKind::Comma)? {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after arguments.")?;
        self.emit_with_operand(OpCode::OpCall, arg_count as u8);
        Ok(())
    }
}
