//! Tree-walking evaluator over resolved files.
//!
//! A [`Program`] is a resolved file ready to run. [`Program::init`] executes
//! module-level statements once and yields frozen [`Globals`]; function values
//! held in those globals are invoked later through [`Globals::call`].

use super::ast::*;
use super::resolve::resolve;
use super::value::{Args, Builtin, Function, Value};
use super::{parse, SyntaxError};
use crate::action::ExecContext;
use crate::core::error::{FxError, Result};
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::sync::{Arc, OnceLock};

/// Host-supplied names visible to scripts, beyond the universe.
pub type Predeclared = IndexMap<String, Value>;

/// A resolved module, ready for initialization.
#[derive(Debug, Clone)]
pub struct Program {
    file: File,
}

impl Program {
    /// Resolve `file` against `is_predeclared` and the universe.
    pub fn compile(file: File, is_predeclared: &dyn Fn(&str) -> bool) -> std::result::Result<Program, SyntaxError> {
        let file = resolve(file, is_predeclared, &is_universal)?;
        Ok(Program { file })
    }

    /// Parse and compile in one step.
    pub fn from_source(
        filename: &str,
        src: &str,
        is_predeclared: &dyn Fn(&str) -> bool,
    ) -> std::result::Result<Program, SyntaxError> {
        Program::compile(parse(filename, src)?, is_predeclared)
    }

    pub fn filename(&self) -> &str {
        &self.file.filename
    }

    /// Run module-level statements and freeze the resulting globals.
    pub fn init(&self, ctx: &ExecContext, predeclared: Predeclared) -> Result<Globals> {
        let mut slots: Vec<Option<Value>> = vec![None; self.file.globals.len()];
        {
            let mut ev = Evaluator {
                filename: &self.file.filename,
                globals: GlobalSlots::Mutable(&mut slots),
                names: &self.file.globals,
                predeclared: &predeclared,
                ctx,
                call_stack: Vec::new(),
            };
            let mut frame = Vec::new();
            match ev.block(&self.file.stmts, &mut frame)? {
                Flow::Normal => {}
                _ => return Err(ev.runtime(Pos::default(), "unexpected control flow at module level")),
            }
        }
        let values = self
            .file
            .globals
            .iter()
            .cloned()
            .zip(slots)
            .filter_map(|(name, value)| value.map(|v| (name, v)))
            .collect();
        Ok(Globals {
            filename: self.file.filename.clone(),
            names: self.file.globals.clone(),
            values,
            predeclared,
        })
    }
}

/// Frozen module globals. Read-only after [`Program::init`].
pub struct Globals {
    filename: String,
    names: Vec<String>,
    values: IndexMap<String, Value>,
    predeclared: Predeclared,
}

impl Globals {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Call the global `name` with positional `args` under `ctx`.
    pub fn call(&self, name: &str, ctx: &ExecContext, args: Vec<Value>) -> Result<Value> {
        let callee = self.get(name).cloned().ok_or_else(|| FxError::Unbound {
            target: name.to_string(),
        })?;
        let slots: Vec<Option<Value>> = self
            .names
            .iter()
            .map(|n| self.values.get(n).cloned())
            .collect();
        let mut ev = Evaluator {
            filename: &self.filename,
            globals: GlobalSlots::Frozen(&slots),
            names: &self.names,
            predeclared: &self.predeclared,
            ctx,
            call_stack: Vec::new(),
        };
        ev.call_value(&callee, Args::positional(args), Pos::default())
    }
}

fn universe() -> &'static IndexMap<&'static str, Value> {
    static UNIVERSE: OnceLock<IndexMap<&'static str, Value>> = OnceLock::new();
    UNIVERSE.get_or_init(|| {
        let mut u: IndexMap<&'static str, Value> = IndexMap::new();
        u.insert("None", Value::None);
        u.insert("True", Value::Bool(true));
        u.insert("False", Value::Bool(false));
        for b in [
            UniverseFn::Len,
            UniverseFn::Str,
            UniverseFn::Range,
            UniverseFn::Print,
            UniverseFn::Fail,
        ] {
            u.insert(b.name_static(), Value::Builtin(Arc::new(b)));
        }
        u
    })
}

/// Whether `name` is part of the language universe.
pub fn is_universal(name: &str) -> bool {
    universe().contains_key(name)
}

enum GlobalSlots<'a> {
    Mutable(&'a mut Vec<Option<Value>>),
    Frozen(&'a [Option<Value>]),
}

enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

struct Evaluator<'a> {
    filename: &'a str,
    globals: GlobalSlots<'a>,
    names: &'a [String],
    predeclared: &'a Predeclared,
    ctx: &'a ExecContext,
    /// Definitions currently executing; used to reject recursion.
    call_stack: Vec<*const DefStmt>,
}

type Frame = Vec<Option<Value>>;

impl<'a> Evaluator<'a> {
    fn runtime(&self, pos: Pos, message: impl Into<String>) -> FxError {
        FxError::Runtime {
            filename: self.filename.to_string(),
            line: pos.line,
            col: pos.col,
            message: message.into(),
        }
    }

    /// Attach a source position to errors raised by builtins.
    fn locate(&self, err: FxError, pos: Pos) -> FxError {
        match err {
            FxError::ScriptInvalid { message } if pos.line > 0 => FxError::ScriptInvalid {
                message: format!("{}:{}:{}: {}", self.filename, pos.line, pos.col, message),
            },
            FxError::Runtime {
                line: 0, message, ..
            } => self.runtime(pos, message),
            other => other,
        }
    }

    fn block(&mut self, stmts: &[Stmt], frame: &mut Frame) -> Result<Flow> {
        for stmt in stmts {
            match self.stmt(stmt, frame)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn stmt(&mut self, stmt: &Stmt, frame: &mut Frame) -> Result<Flow> {
        match stmt {
            Stmt::Def(def) => {
                let defaults = def
                    .params
                    .iter()
                    .map(|p| p.default.as_ref().map(|d| self.expr(d, frame)).transpose())
                    .collect::<Result<Vec<_>>>()?;
                let func = Value::Function(Arc::new(Function {
                    def: Arc::clone(def),
                    defaults,
                }));
                self.assign(&def.name, func, frame)?;
            }
            Stmt::Expr(e) => {
                self.expr(e, frame)?;
            }
            Stmt::Assign {
                pos,
                target,
                op,
                value,
            } => {
                let rhs = self.expr(value, frame)?;
                let value = match op {
                    None => rhs,
                    Some(op) => {
                        let current = self.lookup(target, frame)?;
                        self.binary(*op, current, rhs, *pos)?
                    }
                };
                self.assign(target, value, frame)?;
            }
            Stmt::Return { value, .. } => {
                let v = match value {
                    Some(e) => self.expr(e, frame)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(v));
            }
            Stmt::If {
                cond,
                then,
                otherwise,
                ..
            } => {
                let branch = if self.expr(cond, frame)?.truth() {
                    then
                } else {
                    otherwise
                };
                return self.block(branch, frame);
            }
            Stmt::For {
                var, iter, body, ..
            } => {
                let items = match self.expr(iter, frame)? {
                    Value::List(items) => items,
                    other => {
                        return Err(self.runtime(
                            iter.pos,
                            format!("{} value is not iterable", other.type_name()),
                        ))
                    }
                };
                for item in items.iter() {
                    self.assign(var, item.clone(), frame)?;
                    match self.block(body, frame)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
            }
            Stmt::Pass(_) => {}
            Stmt::Break(_) => return Ok(Flow::Break),
            Stmt::Continue(_) => return Ok(Flow::Continue),
        }
        Ok(Flow::Normal)
    }

    fn assign(&mut self, id: &Ident, value: Value, frame: &mut Frame) -> Result<()> {
        match id.binding {
            Binding::Local(slot) => {
                if let Some(cell) = frame.get_mut(slot) {
                    *cell = Some(value);
                    return Ok(());
                }
                Err(self.runtime(id.pos, format!("internal: bad local slot for {}", id.name)))
            }
            Binding::Global(slot) => match &mut self.globals {
                GlobalSlots::Mutable(slots) => {
                    if let Some(cell) = slots.get_mut(slot) {
                        *cell = Some(value);
                    }
                    Ok(())
                }
                GlobalSlots::Frozen(_) => Err(self.runtime(
                    id.pos,
                    format!("cannot assign global {} after module initialization", id.name),
                )),
            },
            _ => Err(self.runtime(id.pos, format!("cannot assign to {}", id.name))),
        }
    }

    fn lookup(&self, id: &Ident, frame: &Frame) -> Result<Value> {
        let found = match id.binding {
            Binding::Local(slot) => frame.get(slot).cloned().flatten(),
            Binding::Global(slot) => match &self.globals {
                GlobalSlots::Mutable(slots) => slots.get(slot).cloned().flatten(),
                GlobalSlots::Frozen(slots) => slots.get(slot).cloned().flatten(),
            },
            Binding::Predeclared => self.predeclared.get(&id.name).cloned(),
            Binding::Universal => universe().get(id.name.as_str()).cloned(),
            Binding::Unresolved => {
                return Err(self.runtime(id.pos, format!("internal: unresolved name {}", id.name)))
            }
        };
        found.ok_or_else(|| {
            let scope = match id.binding {
                Binding::Local(_) => "local variable",
                _ => "global variable",
            };
            let name = match id.binding {
                Binding::Global(slot) => self.names.get(slot).map(String::as_str).unwrap_or(&id.name),
                _ => id.name.as_str(),
            };
            self.runtime(id.pos, format!("{} {} referenced before assignment", scope, name))
        })
    }

    fn expr(&mut self, expr: &Expr, frame: &mut Frame) -> Result<Value> {
        match &expr.kind {
            ExprKind::Ident(id) => self.lookup(id, frame),
            ExprKind::Str(s) => Ok(Value::str(s)),
            ExprKind::Int(i) => Ok(Value::Int(*i)),
            ExprKind::List(items) => {
                let values = items
                    .iter()
                    .map(|e| self.expr(e, frame))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::list(values))
            }
            ExprKind::Call { func, args } => {
                let callee = self.expr(func, frame)?;
                let mut call_args = Args::default();
                for arg in args {
                    match arg {
                        Arg::Positional(e) => call_args.positional.push(self.expr(e, frame)?),
                        Arg::Keyword { name, value } => {
                            let v = self.expr(value, frame)?;
                            call_args.named.push((name.clone(), v));
                        }
                    }
                }
                self.call_value(&callee, call_args, expr.pos)
            }
            ExprKind::Binary {
                op: BinOp::And,
                lhs,
                rhs,
            } => {
                let l = self.expr(lhs, frame)?;
                if !l.truth() {
                    return Ok(l);
                }
                self.expr(rhs, frame)
            }
            ExprKind::Binary {
                op: BinOp::Or,
                lhs,
                rhs,
            } => {
                let l = self.expr(lhs, frame)?;
                if l.truth() {
                    return Ok(l);
                }
                self.expr(rhs, frame)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let l = self.expr(lhs, frame)?;
                let r = self.expr(rhs, frame)?;
                self.binary(*op, l, r, expr.pos)
            }
            ExprKind::Unary { op, operand } => {
                let v = self.expr(operand, frame)?;
                match (op, v) {
                    (UnaryOp::Not, v) => Ok(Value::Bool(!v.truth())),
                    (UnaryOp::Neg, Value::Int(i)) => i
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| self.runtime(expr.pos, "integer overflow")),
                    (UnaryOp::Neg, v) => Err(self.runtime(
                        expr.pos,
                        format!("unknown unary op: -{}", v.type_name()),
                    )),
                }
            }
            ExprKind::Index { target, index } => {
                let t = self.expr(target, frame)?;
                let i = self.expr(index, frame)?;
                self.index(t, i, expr.pos)
            }
            ExprKind::Cond {
                cond,
                then,
                otherwise,
            } => {
                if self.expr(cond, frame)?.truth() {
                    self.expr(then, frame)
                } else {
                    self.expr(otherwise, frame)
                }
            }
        }
    }

    fn index(&self, target: Value, index: Value, pos: Pos) -> Result<Value> {
        let Value::Int(i) = index else {
            return Err(self.runtime(pos, format!("index must be int, not {}", index.type_name())));
        };
        let normalize = |len: usize| -> Option<usize> {
            let len = i64::try_from(len).ok()?;
            let idx = if i < 0 { i + len } else { i };
            if (0..len).contains(&idx) {
                usize::try_from(idx).ok()
            } else {
                None
            }
        };
        match &target {
            Value::List(items) => normalize(items.len())
                .map(|n| items[n].clone())
                .ok_or_else(|| self.runtime(pos, format!("index {} out of range", i))),
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                normalize(chars.len())
                    .map(|n| Value::str(chars[n].to_string()))
                    .ok_or_else(|| self.runtime(pos, format!("index {} out of range", i)))
            }
            other => Err(self.runtime(pos, format!("{} value is not indexable", other.type_name()))),
        }
    }

    fn binary(&self, op: BinOp, l: Value, r: Value, pos: Pos) -> Result<Value> {
        let overflow = || self.runtime(pos, "integer overflow");
        let unsupported = |l: &Value, r: &Value| {
            self.runtime(
                pos,
                format!(
                    "unknown binary op: {} {} {}",
                    l.type_name(),
                    op.symbol(),
                    r.type_name()
                ),
            )
        };
        match op {
            BinOp::Add => match (&l, &r) {
                (Value::Int(a), Value::Int(b)) => a.checked_add(*b).map(Value::Int).ok_or_else(overflow),
                (Value::Str(a), Value::Str(b)) => Ok(Value::str(format!("{}{}", a, b))),
                (Value::List(a), Value::List(b)) => {
                    let mut items = a.as_ref().clone();
                    items.extend(b.iter().cloned());
                    Ok(Value::list(items))
                }
                _ => Err(unsupported(&l, &r)),
            },
            BinOp::Sub => match (&l, &r) {
                (Value::Int(a), Value::Int(b)) => a.checked_sub(*b).map(Value::Int).ok_or_else(overflow),
                _ => Err(unsupported(&l, &r)),
            },
            BinOp::Mul => match (&l, &r) {
                (Value::Int(a), Value::Int(b)) => a.checked_mul(*b).map(Value::Int).ok_or_else(overflow),
                (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => {
                    let times = repeat_times(s.len(), *n).ok_or_else(|| self.runtime(pos, "repeat count too large"))?;
                    Ok(Value::str(s.repeat(times)))
                }
                (Value::List(items), Value::Int(n)) | (Value::Int(n), Value::List(items)) => {
                    let times =
                        repeat_times(items.len(), *n).ok_or_else(|| self.runtime(pos, "repeat count too large"))?;
                    let mut out = Vec::with_capacity(items.len() * times);
                    for _ in 0..times {
                        out.extend(items.iter().cloned());
                    }
                    Ok(Value::list(out))
                }
                _ => Err(unsupported(&l, &r)),
            },
            BinOp::FloorDiv | BinOp::Mod => match (&l, &r) {
                (Value::Int(_), Value::Int(0)) => Err(self.runtime(pos, "integer division by zero")),
                (Value::Int(a), Value::Int(b)) => {
                    let (a, b) = (*a, *b);
                    let q = a.checked_div(b).ok_or_else(overflow)?;
                    let rem = a - q * b;
                    let floor = rem != 0 && ((rem < 0) != (b < 0));
                    if op == BinOp::FloorDiv {
                        Ok(Value::Int(if floor { q - 1 } else { q }))
                    } else {
                        Ok(Value::Int(if floor { rem + b } else { rem }))
                    }
                }
                (Value::Str(fmt), _) if op == BinOp::Mod => self.format(fmt, &r, pos),
                _ => Err(unsupported(&l, &r)),
            },
            BinOp::Eq => Ok(Value::Bool(l.equals(&r))),
            BinOp::Ne => Ok(Value::Bool(!l.equals(&r))),
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let ord = l.compare(&r).ok_or_else(|| unsupported(&l, &r))?;
                Ok(Value::Bool(match op {
                    BinOp::Lt => ord == Ordering::Less,
                    BinOp::Le => ord != Ordering::Greater,
                    BinOp::Gt => ord == Ordering::Greater,
                    _ => ord != Ordering::Less,
                }))
            }
            BinOp::In | BinOp::NotIn => {
                let found = match (&l, &r) {
                    (_, Value::List(items)) => items.iter().any(|x| x.equals(&l)),
                    (Value::Str(needle), Value::Str(hay)) => hay.contains(&**needle),
                    _ => return Err(unsupported(&l, &r)),
                };
                Ok(Value::Bool(if op == BinOp::In { found } else { !found }))
            }
            // Short-circuit forms are handled in `expr`.
            BinOp::And | BinOp::Or => Err(unsupported(&l, &r)),
        }
    }

    /// `"%s and %d" % [a, b]` style interpolation.
    fn format(&self, fmt: &str, args: &Value, pos: Pos) -> Result<Value> {
        let items: Vec<Value> = match args {
            Value::List(items) => items.as_ref().clone(),
            single => vec![single.clone()],
        };
        let mut next = items.into_iter();
        let mut out = String::new();
        let mut chars = fmt.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('%') => out.push('%'),
                Some(verb @ ('s' | 'd' | 'r')) => {
                    let v = next
                        .next()
                        .ok_or_else(|| self.runtime(pos, "not enough arguments for format string"))?;
                    match (verb, &v) {
                        ('d', Value::Int(i)) => out.push_str(&i.to_string()),
                        ('d', other) => {
                            return Err(self.runtime(
                                pos,
                                format!("%d format requires int, not {}", other.type_name()),
                            ))
                        }
                        ('r', v) => out.push_str(&v.repr()),
                        (_, v) => out.push_str(&v.to_string()),
                    }
                }
                other => {
                    return Err(self.runtime(
                        pos,
                        format!("unsupported format verb %{}", other.map(String::from).unwrap_or_default()),
                    ))
                }
            }
        }
        if next.next().is_some() {
            return Err(self.runtime(pos, "too many arguments for format string"));
        }
        Ok(Value::str(out))
    }

    fn call_value(&mut self, callee: &Value, args: Args, pos: Pos) -> Result<Value> {
        match callee {
            Value::Function(func) => self.call_function(func, args, pos),
            Value::Builtin(b) => b.call(self.ctx, args).map_err(|e| self.locate(e, pos)),
            other => Err(self.runtime(
                pos,
                format!("invalid call of non-function ({})", other.type_name()),
            )),
        }
    }

    fn call_function(&mut self, func: &Arc<Function>, args: Args, pos: Pos) -> Result<Value> {
        let def = &func.def;
        let key = Arc::as_ptr(def);
        if self.call_stack.contains(&key) {
            return Err(self.runtime(pos, format!("function {} called recursively", def.name.name)));
        }

        let mut frame: Frame = vec![None; def.num_locals];
        let params = &def.params;
        if args.positional.len() > params.len() {
            return Err(self.runtime(
                pos,
                format!(
                    "function {} accepts at most {} positional arguments ({} given)",
                    def.name.name,
                    params.len(),
                    args.positional.len()
                ),
            ));
        }
        let slot_of = |p: &Param| match p.name.binding {
            Binding::Local(slot) => slot,
            _ => 0,
        };
        for (p, v) in params.iter().zip(args.positional) {
            frame[slot_of(p)] = Some(v);
        }
        for (name, v) in args.named {
            let Some(p) = params.iter().find(|p| p.name.name == name) else {
                return Err(self.runtime(
                    pos,
                    format!("function {} got an unexpected keyword argument '{}'", def.name.name, name),
                ));
            };
            let slot = slot_of(p);
            if frame[slot].is_some() {
                return Err(self.runtime(
                    pos,
                    format!("function {} got multiple values for parameter '{}'", def.name.name, name),
                ));
            }
            frame[slot] = Some(v);
        }
        for (p, default) in params.iter().zip(&func.defaults) {
            let slot = slot_of(p);
            if frame[slot].is_none() {
                match default {
                    Some(d) => frame[slot] = Some(d.clone()),
                    None => {
                        return Err(self.runtime(
                            pos,
                            format!("function {} missing argument for {}", def.name.name, p.name.name),
                        ))
                    }
                }
            }
        }

        self.call_stack.push(key);
        let result = self.block(&def.body, &mut frame);
        self.call_stack.pop();
        match result? {
            Flow::Return(v) => Ok(v),
            _ => Ok(Value::None),
        }
    }
}

/// Upper bound on the length of any string or list built by `*` or `range`.
const MAX_SEQUENCE_LEN: usize = 1 << 24;

/// Repeat count for `len * n`, or `None` if the result would exceed the cap.
/// Negative counts repeat zero times.
fn repeat_times(len: usize, n: i64) -> Option<usize> {
    let times = usize::try_from(n).unwrap_or(0);
    match len.checked_mul(times) {
        Some(total) if total <= MAX_SEQUENCE_LEN => Some(times),
        _ => None,
    }
}

/// Number of elements in `range(start, stop, step)`; `step` is non-zero.
fn range_len(start: i64, stop: i64, step: i64) -> u128 {
    let (start, stop, step) = (i128::from(start), i128::from(stop), i128::from(step));
    let span = if step > 0 { stop - start } else { start - stop };
    if span <= 0 {
        return 0;
    }
    let step = step.unsigned_abs();
    (span.unsigned_abs() + step - 1) / step
}

#[derive(Clone, Copy)]
enum UniverseFn {
    Len,
    Str,
    Range,
    Print,
    Fail,
}

impl UniverseFn {
    fn name_static(self) -> &'static str {
        match self {
            UniverseFn::Len => "len",
            UniverseFn::Str => "str",
            UniverseFn::Range => "range",
            UniverseFn::Print => "print",
            UniverseFn::Fail => "fail",
        }
    }
}

impl Builtin for UniverseFn {
    fn name(&self) -> &str {
        self.name_static()
    }

    fn call(&self, ctx: &ExecContext, args: Args) -> Result<Value> {
        let name = self.name_static();
        args.no_named(name)?;
        let pos = args.positional;
        let arity = |want: &str| {
            FxError::script_invalid(format!("{}: expected {} argument(s), got {}", name, want, pos.len()))
        };
        match self {
            UniverseFn::Len => match pos.as_slice() {
                [Value::Str(s)] => Ok(Value::Int(i64::try_from(s.chars().count()).unwrap_or(i64::MAX))),
                [Value::List(items)] => Ok(Value::Int(i64::try_from(items.len()).unwrap_or(i64::MAX))),
                [other] => Err(FxError::script_invalid(format!(
                    "len: value of type {} has no len",
                    other.type_name()
                ))),
                _ => Err(arity("1")),
            },
            UniverseFn::Str => match pos.as_slice() {
                [v] => Ok(Value::str(v.to_string())),
                _ => Err(arity("1")),
            },
            UniverseFn::Range => {
                let ints = pos
                    .iter()
                    .map(|v| match v {
                        Value::Int(i) => Ok(*i),
                        other => Err(FxError::script_invalid(format!(
                            "range: got {}, want int",
                            other.type_name()
                        ))),
                    })
                    .collect::<Result<Vec<i64>>>()?;
                let (start, stop, step) = match ints.as_slice() {
                    [stop] => (0, *stop, 1),
                    [start, stop] => (*start, *stop, 1),
                    [start, stop, step] => (*start, *stop, *step),
                    _ => return Err(arity("1 to 3")),
                };
                if step == 0 {
                    return Err(FxError::script_invalid("range: step argument must not be zero"));
                }
                if range_len(start, stop, step) > MAX_SEQUENCE_LEN as u128 {
                    return Err(FxError::Runtime {
                        filename: String::new(),
                        line: 0,
                        col: 0,
                        message: "range: too many elements".to_string(),
                    });
                }
                let mut out = Vec::new();
                let mut i = start;
                while (step > 0 && i < stop) || (step < 0 && i > stop) {
                    out.push(Value::Int(i));
                    i = match i.checked_add(step) {
                        Some(n) => n,
                        None => break,
                    };
                }
                Ok(Value::list(out))
            }
            UniverseFn::Print => {
                let line: Vec<String> = pos.iter().map(Value::to_string).collect();
                ctx.print(&line.join(" "));
                Ok(Value::None)
            }
            UniverseFn::Fail => {
                let line: Vec<String> = pos.iter().map(Value::to_string).collect();
                Err(FxError::Runtime {
                    filename: String::new(),
                    line: 0,
                    col: 0,
                    message: format!("fail: {}", line.join(" ")),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ExecContext, Sink};

    fn run(src: &str) -> Result<Globals> {
        let program = Program::from_source("t.fx", src, &|_| false)
            .map_err(|e| FxError::Unparsable {
                phase: "test",
                source: e,
            })?;
        program.init(&ExecContext::new("test", Sink::Null, Sink::Null), Predeclared::new())
    }

    fn global(src: &str, name: &str) -> Value {
        run(src).unwrap().get(name).cloned().unwrap()
    }

    #[test]
    fn test_eval_arithmetic_and_strings() {
        assert_eq!(global("x = 1 + 2 * 3", "x").to_string(), "7");
        assert_eq!(global("x = -7 // 2", "x").to_string(), "-4");
        assert_eq!(global("x = -7 % 3", "x").to_string(), "2");
        assert_eq!(global("x = 'ab' * 2 + 'c'", "x").to_string(), "ababc");
        assert_eq!(global("x = 'mkdir -p %s/%d' % ['out', 3]", "x").to_string(), "mkdir -p out/3");
    }

    #[test]
    fn test_eval_functions_and_defaults() {
        let src = r#"
def add(a, b=10):
    return a + b
x = add(1)
y = add(1, b=2)
z = add(b=5, a=5)
"#;
        let g = run(src).unwrap();
        assert_eq!(g.get("x").unwrap().to_string(), "11");
        assert_eq!(g.get("y").unwrap().to_string(), "3");
        assert_eq!(g.get("z").unwrap().to_string(), "10");
    }

    #[test]
    fn test_eval_loops_and_conditionals() {
        let src = r#"
def total(items):
    t = 0
    for i in items:
        if i == 2:
            continue
        elif i > 4:
            break
        t += i
    return t
x = total(range(10))
y = "yes" if 3 in [1, 2, 3] else "no"
"#;
        let g = run(src).unwrap();
        assert_eq!(g.get("x").unwrap().to_string(), "8");
        assert_eq!(g.get("y").unwrap().to_string(), "yes");
    }

    #[test]
    fn test_eval_recursion_rejected() {
        let err = run("def f(n):\n    return f(n)\nx = f(1)\n").err().unwrap();
        assert!(err.to_string().contains("called recursively"));
    }

    #[test]
    fn test_eval_missing_argument() {
        let err = run("def f(a, b):\n    pass\nf(1)\n").err().unwrap();
        assert!(err.to_string().contains("missing argument for b"));
        assert!(matches!(err, FxError::Runtime { line: 3, .. }));
    }

    #[test]
    fn test_eval_fail_has_position() {
        let err = run("x = 1\nfail('boom', x)\n").err().unwrap();
        match err {
            FxError::Runtime { line, message, .. } => {
                assert_eq!(line, 2);
                assert_eq!(message, "fail: boom 1");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_eval_oversized_repeat_is_error() {
        for src in [
            "x = 'a' * 9223372036854775807\n",
            "x = [1, 2] * 4611686018427387904\n",
            "x = 4611686018427387904 * [1, 2]\n",
        ] {
            let err = run(src).err().unwrap();
            assert!(err.to_string().contains("repeat count too large"), "{src}: {err}");
            assert!(matches!(err, FxError::Runtime { line: 1, .. }));
        }
        assert_eq!(global("x = 'ab' * 3\n", "x").to_string(), "ababab");
        assert!(matches!(global("x = [1] * -2\n", "x"), Value::List(items) if items.is_empty()));
    }

    #[test]
    fn test_eval_oversized_range_is_error() {
        let err = run("x = range(1000000000000)\n").err().unwrap();
        assert!(err.to_string().contains("range: too many elements"));
        let err = run("x = range(9223372036854775807, -9223372036854775807, -1)\n").err().unwrap();
        assert!(err.to_string().contains("range: too many elements"));
        assert!(matches!(global("x = range(10, 0, -3)\n", "x"), Value::List(items) if items.len() == 4));
    }

    #[test]
    fn test_eval_builtin_arity_is_script_invalid() {
        let err = run("x = len(1, 2)\n").err().unwrap();
        assert_eq!(err.kind(), crate::core::error::ErrorKind::ScriptInvalid);
        assert!(err.to_string().starts_with("t.fx:1:"));
    }

    #[test]
    fn test_eval_global_used_before_assignment() {
        let err = run("def f():\n    return y\nx = f()\ny = 1\n").err().unwrap();
        assert!(err.to_string().contains("global variable y referenced before assignment"));
    }

    #[test]
    fn test_eval_print_goes_to_context() {
        let (sink, buf) = Sink::capture();
        let ctx = ExecContext::new("test", sink, Sink::Null);
        let program = Program::from_source("t.fx", "print('hello', 3)\n", &|_| false).unwrap();
        program.init(&ctx, Predeclared::new()).unwrap();
        assert_eq!(buf.contents(), "hello 3\n");
    }

    #[test]
    fn test_eval_globals_call() {
        let g = run("def greet(fx, who='world'):\n    return 'hi ' + who\n").unwrap();
        let ctx = ExecContext::new("test", Sink::Null, Sink::Null);
        let v = g.call("greet", &ctx, vec![Value::None]).unwrap();
        assert_eq!(v.to_string(), "hi world");
        assert!(matches!(
            g.call("missing", &ctx, vec![]),
            Err(FxError::Unbound { .. })
        ));
    }
}
