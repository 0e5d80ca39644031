//! Tree-walking interpreter for compiled trigger scripts.
//!
//! One [`Interpreter`] per activation: it owns the activation's variable
//! scope and walks the AST directly. Side effects happen only through the
//! host's registered executors; everything else (arithmetic, control flow,
//! variable access) is internal.
//!
//! Integer arithmetic saturates instead of wrapping. A misbehaving script
//! should produce a clamped number and keep going, not poison unrelated
//! triggers with a panic.

use crate::bridge::BridgeError;
use crate::context::ActivationContext;
use crate::interrupt::Checkpoint;
use crate::runtime::Runtime;
use crate::scope::VariableScope;
use crate::value::Value;
use log::debug;
use std::sync::Arc;
use thiserror::Error;
use tripwire_script::{AssignOp, AssignTarget, BinaryOp, Node, UnaryOp};

/// Iteration cap per loop; a script that runs this long is stuck.
pub const LOOP_LIMIT: u64 = 1_000_000;

/// A fault raised while executing a script. These reach the error sink;
/// interrupter halts do not.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("line {line}: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
        line: usize,
    },
    #[error("line {line}: unknown executor #{name}")]
    UnknownExecutor { name: String, line: usize },
    #[error("line {line}: unknown placeholder '{name}'")]
    UnknownPlaceholder { name: String, line: usize },
    #[error("line {line}: unknown variable '{name}'")]
    UnknownVariable { name: String, line: usize },
    #[error("line {line}: division by zero")]
    DivideByZero { line: usize },
    #[error("line {line}: {name} takes {expected} argument(s), got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        line: usize,
    },
    #[error("line {line}: executor #{name} failed: {message}")]
    ExecutorFailed {
        name: String,
        message: String,
        line: usize,
    },
    #[error("line {line}: placeholder '{name}' failed: {message}")]
    PlaceholderFailed {
        name: String,
        message: String,
        line: usize,
    },
    #[error("line {line}: no sub-trigger named '{name}'")]
    SubTriggerNotFound { name: String, line: usize },
    #[error("line {line}: loop exceeded {LOOP_LIMIT} iterations")]
    LoopLimit { line: usize },
    #[error("line {line}: main-thread call for #{name} failed: {source}")]
    MainThread {
        name: String,
        source: BridgeError,
        line: usize,
    },
}

/// How an activation ended when no error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every statement ran.
    Completed,
    /// An interrupter checkpoint stopped the script early. Expected, silent.
    Halted,
}

/// Statement-level control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
    Halt,
}

/// Executes one script body against one activation context.
pub struct Interpreter<'rt> {
    rt: &'rt Arc<Runtime>,
    ctx: Arc<dyn ActivationContext>,
    scope: VariableScope,
    /// Sub-trigger frames currently on the stack.
    depth: usize,
}

impl<'rt> Interpreter<'rt> {
    pub fn new(rt: &'rt Arc<Runtime>, ctx: Arc<dyn ActivationContext>) -> Self {
        let scope = VariableScope::with_globals(rt.globals().clone());
        Self {
            rt,
            ctx,
            scope,
            depth: 0,
        }
    }

    /// Run a script body to completion or the first halt.
    ///
    /// # Errors
    /// Returns the first [`RuntimeError`] raised; execution stops there.
    pub fn run(&mut self, body: &Node) -> Result<Outcome, RuntimeError> {
        match self.exec(body)? {
            Flow::Halt => Ok(Outcome::Halted),
            _ => Ok(Outcome::Completed),
        }
    }

    fn exec(&mut self, node: &Node) -> Result<Flow, RuntimeError> {
        match node {
            Node::Block(stmts) => {
                for stmt in stmts {
                    let flow = self.exec(stmt)?;
                    if flow != Flow::Normal {
                        return Ok(flow);
                    }
                }
                Ok(Flow::Normal)
            },
            Node::If { arms, else_body } => {
                for (cond, body) in arms {
                    if self.eval_condition(cond)? {
                        return self.exec(body);
                    }
                }
                match else_body {
                    Some(body) => self.exec(body),
                    None => Ok(Flow::Normal),
                }
            },
            Node::While { cond, body, line } => {
                let mut iterations: u64 = 0;
                while self.eval_condition(cond)? {
                    iterations += 1;
                    if iterations > LOOP_LIMIT {
                        return Err(RuntimeError::LoopLimit { line: *line });
                    }
                    match self.exec(body)? {
                        Flow::Break => break,
                        Flow::Halt => return Ok(Flow::Halt),
                        Flow::Normal | Flow::Continue => {},
                    }
                }
                Ok(Flow::Normal)
            },
            Node::For {
                var,
                start,
                stop,
                body,
                line,
            } => {
                let start = self.eval_int(start, *line)?;
                let stop = self.eval_int(stop, *line)?;
                self.scope.push();
                let mut iterations: u64 = 0;
                let mut flow = Flow::Normal;
                let mut i = start;
                while i < stop {
                    iterations += 1;
                    if iterations > LOOP_LIMIT {
                        self.scope.pop();
                        return Err(RuntimeError::LoopLimit { line: *line });
                    }
                    self.scope.declare(var, Value::Int(i));
                    match self.exec(body) {
                        Ok(Flow::Break) => break,
                        Ok(Flow::Halt) => {
                            flow = Flow::Halt;
                            break;
                        },
                        Ok(Flow::Normal | Flow::Continue) => {},
                        Err(err) => {
                            self.scope.pop();
                            return Err(err);
                        },
                    }
                    i += 1;
                }
                self.scope.pop();
                Ok(flow)
            },
            Node::Break { .. } => Ok(Flow::Break),
            Node::Continue { .. } => Ok(Flow::Continue),
            Node::Assign {
                target,
                op,
                value,
                line,
            } => {
                let rhs = self.eval(value)?;
                let new = match op {
                    AssignOp::Set => rhs,
                    AssignOp::Add | AssignOp::Sub => {
                        let current = self.read_target(target, *line)?;
                        let bin = if *op == AssignOp::Add { BinaryOp::Add } else { BinaryOp::Sub };
                        binary_values(bin, &current, &rhs, *line)?
                    },
                };
                self.write_target(target, new, *line)?;
                Ok(Flow::Normal)
            },
            Node::ExecCall { name, args, line } => self.exec_call(name, args, *line),
            Node::SubCall { name, line } => self.sub_call(name, *line),
            Node::Cooldown { seconds, line } => {
                let value = self.eval(seconds)?;
                let secs = match value.as_f64() {
                    Some(secs) => secs.max(0.0),
                    None => {
                        return Err(RuntimeError::TypeMismatch {
                            expected: "number of seconds",
                            found: value.type_name(),
                            line: *line,
                        });
                    },
                };
                if let Some(actor) = self.ctx.actor_id() {
                    self.rt
                        .interrupter()
                        .apply_cooldown(&actor, std::time::Duration::from_secs_f64(secs));
                } else {
                    debug!("COOLDOWN on line {line} ignored: activation has no actor");
                }
                Ok(Flow::Normal)
            },
            Node::Import { path, line } => {
                debug!("IMPORT {path} on line {line} ignored");
                Ok(Flow::Normal)
            },
            // Bare expression statement: evaluate for effect, discard.
            expr => {
                self.eval(expr)?;
                Ok(Flow::Normal)
            },
        }
    }

    fn exec_call(&mut self, name: &str, args: &[Node], line: usize) -> Result<Flow, RuntimeError> {
        let executor = self
            .rt
            .registry()
            .executor(name)
            .ok_or_else(|| RuntimeError::UnknownExecutor {
                name: name.to_string(),
                line,
            })?
            .clone();
        if let Some(expected) = executor.arity() {
            if expected != args.len() {
                return Err(RuntimeError::ArityMismatch {
                    name: format!("#{name}"),
                    expected,
                    found: args.len(),
                    line,
                });
            }
        }
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg)?);
        }

        if executor.is_main_thread() && !self.rt.bridge().is_main_thread() {
            let run = executor.run_fn().clone();
            let ctx = self.ctx.clone();
            let result = self
                .rt
                .bridge()
                .call_and_wait(move || run(ctx.as_ref(), &values))
                .map_err(|source| RuntimeError::MainThread {
                    name: name.to_string(),
                    source,
                    line,
                })?;
            result.map_err(|message| RuntimeError::ExecutorFailed {
                name: name.to_string(),
                message,
                line,
            })?;
            if self.rt.interrupter().after_resume(self.ctx.as_ref()) == Checkpoint::Halt {
                return Ok(Flow::Halt);
            }
        } else {
            (executor.run_fn())(self.ctx.as_ref(), &values).map_err(|message| {
                RuntimeError::ExecutorFailed {
                    name: name.to_string(),
                    message,
                    line,
                }
            })?;
        }
        Ok(Flow::Normal)
    }

    fn sub_call(&mut self, name: &Node, line: usize) -> Result<Flow, RuntimeError> {
        let value = self.eval(name)?;
        let Value::Str(name) = value else {
            return Err(RuntimeError::TypeMismatch {
                expected: "sub-trigger name string",
                found: value.type_name(),
                line,
            });
        };
        if self.rt.interrupter().before_sub_call(self.ctx.as_ref(), &name, self.depth) == Checkpoint::Halt {
            return Ok(Flow::Halt);
        }
        let body = self
            .rt
            .sub_trigger(&name)
            .ok_or_else(|| RuntimeError::SubTriggerNotFound { name: name.clone(), line })?;

        self.depth += 1;
        self.scope.push();
        let flow = self.exec(&body);
        self.scope.pop();
        self.depth -= 1;

        // BREAK/CONTINUE never escape the called script.
        match flow? {
            Flow::Halt => Ok(Flow::Halt),
            _ => Ok(Flow::Normal),
        }
    }

    fn read_target(&self, target: &AssignTarget, line: usize) -> Result<Value, RuntimeError> {
        match target {
            AssignTarget::Ident(name) => {
                self.scope
                    .get(name)
                    .ok_or_else(|| RuntimeError::UnknownVariable {
                        name: name.clone(),
                        line,
                    })
            },
            AssignTarget::Global(name) => Ok(self.rt.globals().get(name).unwrap_or(Value::Null)),
        }
    }

    fn write_target(&mut self, target: &AssignTarget, value: Value, line: usize) -> Result<(), RuntimeError> {
        match target {
            AssignTarget::Ident(name) => {
                self.scope.set(name, value);
                Ok(())
            },
            AssignTarget::Global(name) => {
                self.rt
                    .globals()
                    .put(name, value)
                    .map_err(|_| RuntimeError::UnknownVariable {
                        name: format!("${name}"),
                        line,
                    })
            },
        }
    }

    fn eval(&mut self, node: &Node) -> Result<Value, RuntimeError> {
        match node {
            Node::Literal(lit) => Ok(Value::from(lit)),
            Node::Ident { name, line } => {
                if let Some(value) = self.scope.get(name) {
                    return Ok(value);
                }
                if let Some(value) = self.ctx.field(name) {
                    return Ok(value);
                }
                if let Some(ph) = self.rt.registry().placeholder(name) {
                    // A bare name is a zero-argument call; placeholders that
                    // declare arguments cannot be referenced this way.
                    if let Some(expected) = ph.arity() {
                        if expected != 0 {
                            return Err(RuntimeError::ArityMismatch {
                                name: name.clone(),
                                expected,
                                found: 0,
                                line: *line,
                            });
                        }
                    }
                    let eval = ph.eval_fn().clone();
                    return eval(self.ctx.as_ref(), &[]).map_err(|message| {
                        RuntimeError::PlaceholderFailed {
                            name: name.clone(),
                            message,
                            line: *line,
                        }
                    });
                }
                Err(RuntimeError::UnknownVariable {
                    name: name.clone(),
                    line: *line,
                })
            },
            Node::Global { name, .. } => Ok(self.rt.globals().get(name).unwrap_or(Value::Null)),
            Node::Placeholder { path, args, line } => self.eval_placeholder(path, args, *line),
            Node::Binary { op, lhs, rhs, line } => self.eval_binary(*op, lhs, rhs, *line),
            Node::Unary { op, expr, line } => {
                let value = self.eval(expr)?;
                match op {
                    UnaryOp::Neg => match value {
                        Value::Int(i) => Ok(Value::Int(i.saturating_neg())),
                        Value::Double(d) => Ok(Value::Double(-d)),
                        other => Err(RuntimeError::TypeMismatch {
                            expected: "number",
                            found: other.type_name(),
                            line: *line,
                        }),
                    },
                    UnaryOp::Not => match value.truthy() {
                        Some(b) => Ok(Value::Bool(!b)),
                        None => Err(RuntimeError::TypeMismatch {
                            expected: "boolean",
                            found: value.type_name(),
                            line: *line,
                        }),
                    },
                }
            },
            // Assignments and calls used in expression position run as
            // statements and yield null.
            other => {
                self.exec(other)?;
                Ok(Value::Null)
            },
        }
    }

    fn eval_placeholder(&mut self, path: &str, args: &[Node], line: usize) -> Result<Value, RuntimeError> {
        // Context fields shadow registry placeholders of the same name; the
        // activation knows its own actor best.
        if args.is_empty() {
            if let Some(value) = self.ctx.field(path) {
                return Ok(value);
            }
        }
        let Some(ph) = self.rt.registry().placeholder(path) else {
            return Err(RuntimeError::UnknownPlaceholder {
                name: path.to_string(),
                line,
            });
        };
        if let Some(expected) = ph.arity() {
            if expected != args.len() {
                return Err(RuntimeError::ArityMismatch {
                    name: path.to_string(),
                    expected,
                    found: args.len(),
                    line,
                });
            }
        }
        let eval = ph.eval_fn().clone();
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg)?);
        }
        eval(self.ctx.as_ref(), &values).map_err(|message| RuntimeError::PlaceholderFailed {
            name: path.to_string(),
            message,
            line,
        })
    }

    fn eval_binary(&mut self, op: BinaryOp, lhs: &Node, rhs: &Node, line: usize) -> Result<Value, RuntimeError> {
        // AND/OR short-circuit; everything else is strict.
        match op {
            BinaryOp::And => {
                let left = self.eval(lhs)?;
                if !self.truthy(&left, line)? {
                    return Ok(Value::Bool(false));
                }
                let right = self.eval(rhs)?;
                Ok(Value::Bool(self.truthy(&right, line)?))
            },
            BinaryOp::Or => {
                let left = self.eval(lhs)?;
                if self.truthy(&left, line)? {
                    return Ok(Value::Bool(true));
                }
                let right = self.eval(rhs)?;
                Ok(Value::Bool(self.truthy(&right, line)?))
            },
            _ => {
                let left = self.eval(lhs)?;
                let right = self.eval(rhs)?;
                binary_values(op, &left, &right, line)
            },
        }
    }

    fn eval_condition(&mut self, cond: &Node) -> Result<bool, RuntimeError> {
        let line = node_line(cond);
        let value = self.eval(cond)?;
        self.truthy(&value, line)
    }

    fn truthy(&self, value: &Value, line: usize) -> Result<bool, RuntimeError> {
        value.truthy().ok_or(RuntimeError::TypeMismatch {
            expected: "boolean",
            found: value.type_name(),
            line,
        })
    }

    fn eval_int(&mut self, node: &Node, line: usize) -> Result<i64, RuntimeError> {
        let value = self.eval(node)?;
        match value {
            Value::Int(i) => Ok(i),
            other => Err(RuntimeError::TypeMismatch {
                expected: "integer",
                found: other.type_name(),
                line,
            }),
        }
    }
}

fn node_line(node: &Node) -> usize {
    match node {
        Node::Ident { line, .. }
        | Node::Global { line, .. }
        | Node::Placeholder { line, .. }
        | Node::Binary { line, .. }
        | Node::Unary { line, .. }
        | Node::Assign { line, .. }
        | Node::ExecCall { line, .. }
        | Node::SubCall { line, .. }
        | Node::Cooldown { line, .. }
        | Node::Import { line, .. }
        | Node::While { line, .. }
        | Node::For { line, .. }
        | Node::Break { line }
        | Node::Continue { line } => *line,
        Node::Literal(_) | Node::Block(_) | Node::If { .. } => 0,
    }
}

/// Strict (non-short-circuiting) binary evaluation on already-computed
/// operands.
fn binary_values(op: BinaryOp, lhs: &Value, rhs: &Value, line: usize) -> Result<Value, RuntimeError> {
    use BinaryOp::{Add, Div, Eq, Greater, GreaterEq, Less, LessEq, Mul, NotEq, Rem, Sub};

    match op {
        Eq => Ok(Value::Bool(lhs == rhs)),
        NotEq => Ok(Value::Bool(lhs != rhs)),
        Less | LessEq | Greater | GreaterEq => compare(op, lhs, rhs, line),
        Add => {
            // `+` concatenates when either side is a string.
            if let (Value::Str(_), _) | (_, Value::Str(_)) = (lhs, rhs) {
                return Ok(Value::Str(format!("{lhs}{rhs}")));
            }
            arith(op, lhs, rhs, line)
        },
        Sub | Mul | Div | Rem => arith(op, lhs, rhs, line),
        BinaryOp::And | BinaryOp::Or => unreachable!("short-circuit ops handled by caller"),
    }
}

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value, line: usize) -> Result<Value, RuntimeError> {
    let ordering = match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        _ => {
            let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
                return Err(RuntimeError::TypeMismatch {
                    expected: "two numbers or two strings",
                    found: if lhs.as_f64().is_none() { lhs.type_name() } else { rhs.type_name() },
                    line,
                });
            };
            a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Greater)
        },
    };
    let result = match op {
        BinaryOp::Less => ordering.is_lt(),
        BinaryOp::LessEq => ordering.is_le(),
        BinaryOp::Greater => ordering.is_gt(),
        BinaryOp::GreaterEq => ordering.is_ge(),
        _ => unreachable!("compare called with non-relational op"),
    };
    Ok(Value::Bool(result))
}

fn arith(op: BinaryOp, lhs: &Value, rhs: &Value, line: usize) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => match op {
            BinaryOp::Add => Ok(Value::Int(a.saturating_add(*b))),
            BinaryOp::Sub => Ok(Value::Int(a.saturating_sub(*b))),
            BinaryOp::Mul => Ok(Value::Int(a.saturating_mul(*b))),
            BinaryOp::Div => {
                if *b == 0 {
                    Err(RuntimeError::DivideByZero { line })
                } else {
                    Ok(Value::Int(a.checked_div(*b).unwrap_or(i64::MAX)))
                }
            },
            BinaryOp::Rem => {
                if *b == 0 {
                    Err(RuntimeError::DivideByZero { line })
                } else {
                    Ok(Value::Int(a.checked_rem(*b).unwrap_or(0)))
                }
            },
            _ => unreachable!("arith called with non-arithmetic op"),
        },
        _ => {
            let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
                return Err(RuntimeError::TypeMismatch {
                    expected: "number",
                    found: if lhs.as_f64().is_none() { lhs.type_name() } else { rhs.type_name() },
                    line,
                });
            };
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => {
                    if b == 0.0 {
                        return Err(RuntimeError::DivideByZero { line });
                    }
                    a / b
                },
                BinaryOp::Rem => {
                    if b == 0.0 {
                        return Err(RuntimeError::DivideByZero { line });
                    }
                    a % b
                },
                _ => unreachable!("arith called with non-arithmetic op"),
            };
            Ok(Value::Double(result))
        },
    }
}
