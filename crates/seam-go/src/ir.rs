//! Lowering of function bodies into a normalized control-flow form.
//!
//! Every function body (including function literals, which become their own
//! functions named `parent$N`) lowers to a list of basic blocks holding only
//! call-shaped instructions: plain calls, `go` spawns, and `defer`s. Each
//! instruction carries a resolved callee description and a position in the
//! shared file set.
//!
//! Classification is static and bounded: it tracks declared types of
//! receivers, parameters, and locals bound from composite literals or
//! function literals. A receiver whose type cannot be resolved inside the
//! loaded universe classifies as a dynamic call rather than guessing.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::ast::{Block, Expr, FuncType, Pos, Receiver, Stmt, TypeExpr};
use crate::resolve::file_imports;
use crate::sigfmt;
use crate::types::{Package, SymbolKind, Universe};

// ============================================================================
// Error Types
// ============================================================================

/// Lowering failure; raised only when no program can be built at all.
#[derive(Debug, Error)]
pub enum LowerError {
    #[error("lowering produced no program: {reason}")]
    NoProgram { reason: String },
}

/// Result type for lowering.
pub type LowerResult<T> = Result<T, LowerError>;

// ============================================================================
// Lowered Form
// ============================================================================

/// Instruction kind; `go` and `defer` wrap the same callee shapes as calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Call,
    Go,
    Defer,
}

/// Resolved callee of a call-shaped instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    /// A known static callee, by canonical name.
    Static { name: String },
    /// A call through a function value.
    Dynamic {
        operand: String,
        type_display: String,
    },
    /// Dynamic dispatch through an interface method.
    Interface {
        method: String,
        recv_display: String,
    },
}

/// One call-shaped instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instr {
    pub kind: CallKind,
    pub callee: Callee,
    pub pos: Pos,
}

/// A basic block: a straight-line run of instructions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasicBlock {
    pub instrs: Vec<Instr>,
}

/// A lowered function with its canonical name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    /// `path.Func`, `(path.T).Method`, `(*path.T).Method`, or `parent$N`.
    pub name: String,
    pub package_path: String,
    pub blocks: Vec<BasicBlock>,
}

impl Function {
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| b.instrs.is_empty())
    }
}

/// The whole lowered program.
#[derive(Debug, Default)]
pub struct LoweredProgram {
    pub functions: Vec<Function>,
}

impl LoweredProgram {
    /// Integrity check: every function is named and every instruction has a
    /// valid position or is dropped by the caller. Returns the number of
    /// violations found.
    pub fn verify(&self) -> usize {
        let mut violations = 0;
        for func in &self.functions {
            if func.name.is_empty() {
                violations += 1;
            }
        }
        violations
    }
}

/// Lower every function body in the universe, serially and in file order.
pub fn lower(universe: &Universe) -> LowerResult<LoweredProgram> {
    if universe.packages.is_empty() {
        return Err(LowerError::NoProgram {
            reason: "no packages in universe".to_string(),
        });
    }
    let mut program = LoweredProgram::default();
    for pkg in &universe.packages {
        if !pkg.is_analyzable() {
            continue;
        }
        for file in &pkg.ast_files {
            let mut lowerer = Lowerer {
                universe,
                pkg,
                imports: file_imports(file),
                functions: Vec::new(),
            };
            for decl in &file.decls {
                let func = match decl {
                    crate::ast::Decl::Func(f) => f,
                    _ => continue,
                };
                let body = match &func.body {
                    Some(b) => b,
                    None => continue,
                };
                let name = canonical_func_name(&pkg.import_path, func.receiver.as_ref(), &func.name.name);
                lowerer.lower_func(name, &func.sig, func.receiver.as_ref(), body, None);
            }
            program.functions.append(&mut lowerer.functions);
        }
    }
    let violations = program.verify();
    if violations > 0 {
        debug!(violations, "lowered program failed integrity checks");
    }
    Ok(program)
}

/// Canonical name of a declared function or method.
pub fn canonical_func_name(pkg_path: &str, recv: Option<&Receiver>, name: &str) -> String {
    match recv {
        Some(r) if r.pointer => format!("(*{}.{}).{}", pkg_path, r.type_name, name),
        Some(r) => format!("({}.{}).{}", pkg_path, r.type_name, name),
        None => format!("{}.{}", pkg_path, name),
    }
}

fn is_builtin(name: &str) -> bool {
    matches!(
        name,
        "append"
            | "cap"
            | "clear"
            | "close"
            | "complex"
            | "copy"
            | "delete"
            | "imag"
            | "len"
            | "make"
            | "max"
            | "min"
            | "new"
            | "panic"
            | "print"
            | "println"
            | "real"
            | "recover"
    )
}

// ============================================================================
// Local Type Tracking
// ============================================================================

/// What the lowering knows about a bound name.
#[derive(Debug, Clone, PartialEq, Eq)]
enum VarType {
    /// An interface-typed value; dispatch through it is dynamic.
    Iface { display: String },
    /// A value of a named concrete type in the loaded universe.
    Concrete { pkg_path: String, name: String },
    /// A function value.
    FuncVal { display: String },
    Unknown,
}

/// Lexically scoped bindings.
#[derive(Debug, Clone, Default)]
struct Env {
    scopes: Vec<HashMap<String, VarType>>,
}

impl Env {
    fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop(&mut self) {
        self.scopes.pop();
    }

    fn bind(&mut self, name: &str, vt: VarType) {
        if name == "_" {
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), vt);
        }
    }

    fn lookup(&self, name: &str) -> Option<&VarType> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Debug, Default)]
struct FuncBuilder {
    name: String,
    blocks: Vec<BasicBlock>,
    cur: Vec<Instr>,
    anon: u32,
}

impl FuncBuilder {
    fn emit(&mut self, kind: CallKind, callee: Callee, pos: Pos) {
        self.cur.push(Instr { kind, callee, pos });
    }

    /// Close the current block if it holds instructions.
    fn seal(&mut self) {
        if !self.cur.is_empty() {
            let instrs = std::mem::take(&mut self.cur);
            self.blocks.push(BasicBlock { instrs });
        }
    }
}

// ============================================================================
// Lowerer
// ============================================================================

struct Lowerer<'a> {
    universe: &'a Universe,
    pkg: &'a Package,
    imports: HashMap<String, String>,
    functions: Vec<Function>,
}

impl<'a> Lowerer<'a> {
    fn lower_func(
        &mut self,
        name: String,
        sig: &FuncType,
        recv: Option<&Receiver>,
        body: &Block,
        outer: Option<&Env>,
    ) {
        let mut env = outer.cloned().unwrap_or_default();
        env.push();
        if let Some(r) = recv {
            if let Some(rname) = &r.name {
                env.bind(
                    rname,
                    VarType::Concrete {
                        pkg_path: self.pkg.import_path.clone(),
                        name: r.type_name.clone(),
                    },
                );
            }
        }
        for group in sig.params.iter().chain(sig.results.iter()) {
            let vt = self.resolve_var_type(&group.ty);
            for n in &group.names {
                env.bind(&n.name, vt.clone());
            }
        }

        let mut fb = FuncBuilder {
            name: name.clone(),
            ..FuncBuilder::default()
        };
        self.lower_block(&mut fb, &mut env, body);
        fb.seal();
        env.pop();
        self.functions.push(Function {
            name,
            package_path: self.pkg.import_path.clone(),
            blocks: fb.blocks,
        });
    }

    fn lower_block(&mut self, fb: &mut FuncBuilder, env: &mut Env, block: &Block) {
        env.push();
        for stmt in &block.stmts {
            self.lower_stmt(fb, env, stmt);
        }
        env.pop();
    }

    fn lower_stmt(&mut self, fb: &mut FuncBuilder, env: &mut Env, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(e) => self.walk_expr(fb, env, e),
            Stmt::Send { chan, value } => {
                self.walk_expr(fb, env, chan);
                self.walk_expr(fb, env, value);
            }
            Stmt::IncDec { expr } => self.walk_expr(fb, env, expr),
            Stmt::Assign { lhs, rhs, define } => {
                for e in lhs {
                    if !matches!(e, Expr::Ident(_)) {
                        self.walk_expr(fb, env, e);
                    }
                }
                for e in rhs {
                    self.walk_expr(fb, env, e);
                }
                if *define && lhs.len() == rhs.len() {
                    for (l, r) in lhs.iter().zip(rhs.iter()) {
                        if let Expr::Ident(id) = l {
                            let vt = self.infer_type(env, r);
                            env.bind(&id.name, vt);
                        }
                    }
                } else if *define {
                    for l in lhs {
                        if let Expr::Ident(id) = l {
                            env.bind(&id.name, VarType::Unknown);
                        }
                    }
                }
            }
            Stmt::Var(decl) => {
                for spec in &decl.specs {
                    for value in &spec.values {
                        self.walk_expr(fb, env, value);
                    }
                    if let Some(ty) = &spec.ty {
                        let vt = self.resolve_var_type(ty);
                        for n in &spec.names {
                            env.bind(&n.name, vt.clone());
                        }
                    } else if spec.names.len() == spec.values.len() {
                        for (n, v) in spec.names.iter().zip(spec.values.iter()) {
                            let vt = self.infer_type(env, v);
                            env.bind(&n.name, vt);
                        }
                    } else {
                        for n in &spec.names {
                            env.bind(&n.name, VarType::Unknown);
                        }
                    }
                }
            }
            Stmt::Const(decl) => {
                for spec in &decl.specs {
                    for value in &spec.values {
                        self.walk_expr(fb, env, value);
                    }
                }
            }
            Stmt::Type(_) => {}
            Stmt::Return { results } => {
                for e in results {
                    self.walk_expr(fb, env, e);
                }
            }
            Stmt::Branch { .. } | Stmt::Empty => {}
            Stmt::Block(b) => self.lower_block(fb, env, b),
            Stmt::If {
                init,
                cond,
                then,
                else_,
            } => {
                env.push();
                if let Some(s) = init {
                    self.lower_stmt(fb, env, s);
                }
                self.walk_expr(fb, env, cond);
                fb.seal();
                self.lower_block(fb, env, then);
                fb.seal();
                if let Some(s) = else_ {
                    self.lower_stmt(fb, env, s);
                    fb.seal();
                }
                env.pop();
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
            } => {
                env.push();
                if let Some(s) = init {
                    self.lower_stmt(fb, env, s);
                }
                if let Some(e) = cond {
                    self.walk_expr(fb, env, e);
                }
                fb.seal();
                self.lower_block(fb, env, body);
                if let Some(s) = post {
                    self.lower_stmt(fb, env, s);
                }
                fb.seal();
                env.pop();
            }
            Stmt::Range {
                key,
                value,
                define,
                expr,
                body,
            } => {
                env.push();
                self.walk_expr(fb, env, expr);
                if *define {
                    for bound in [key, value].into_iter().flatten() {
                        if let Expr::Ident(id) = bound {
                            env.bind(&id.name, VarType::Unknown);
                        }
                    }
                }
                fb.seal();
                self.lower_block(fb, env, body);
                fb.seal();
                env.pop();
            }
            Stmt::Switch { init, tag, cases } => {
                env.push();
                if let Some(s) = init {
                    self.lower_stmt(fb, env, s);
                }
                if let Some(e) = tag {
                    self.walk_expr(fb, env, e);
                }
                fb.seal();
                for case in cases {
                    env.push();
                    for e in &case.exprs {
                        self.walk_expr(fb, env, e);
                    }
                    for s in &case.body {
                        self.lower_stmt(fb, env, s);
                    }
                    env.pop();
                    fb.seal();
                }
                env.pop();
            }
            Stmt::TypeSwitch {
                init,
                binding,
                subject,
                cases,
            } => {
                env.push();
                if let Some(s) = init {
                    self.lower_stmt(fb, env, s);
                }
                self.walk_expr(fb, env, subject);
                fb.seal();
                for case in cases {
                    env.push();
                    if let Some(name) = binding {
                        let vt = match case.exprs.first() {
                            Some(e) if case.exprs.len() == 1 => self.case_expr_type(e),
                            _ => VarType::Unknown,
                        };
                        env.bind(name, vt);
                    }
                    for s in &case.body {
                        self.lower_stmt(fb, env, s);
                    }
                    env.pop();
                    fb.seal();
                }
                env.pop();
            }
            Stmt::Select { cases } => {
                for case in cases {
                    env.push();
                    for s in &case.body {
                        self.lower_stmt(fb, env, s);
                    }
                    env.pop();
                    fb.seal();
                }
            }
            Stmt::Go { call, .. } => self.lower_call_like(fb, env, call, CallKind::Go),
            Stmt::Defer { call, .. } => self.lower_call_like(fb, env, call, CallKind::Defer),
            Stmt::Labeled { stmt, .. } => self.lower_stmt(fb, env, stmt),
        }
    }

    fn lower_call_like(&mut self, fb: &mut FuncBuilder, env: &mut Env, e: &Expr, kind: CallKind) {
        match e {
            Expr::Call { func, args, pos } => {
                self.walk_expr(fb, env, func);
                for arg in args {
                    self.walk_expr(fb, env, arg);
                }
                if let Some(callee) = self.classify(env, func) {
                    fb.emit(kind, callee, *pos);
                }
            }
            other => self.walk_expr(fb, env, other),
        }
    }

    /// Post-order walk emitting a call instruction for every call
    /// expression.
    fn walk_expr(&mut self, fb: &mut FuncBuilder, env: &mut Env, e: &Expr) {
        match e {
            Expr::Call { func, args, pos } => {
                self.walk_expr(fb, env, func);
                for arg in args {
                    self.walk_expr(fb, env, arg);
                }
                if let Some(callee) = self.classify(env, func) {
                    fb.emit(CallKind::Call, callee, *pos);
                }
            }
            Expr::FuncLit { sig, body, .. } => {
                fb.anon += 1;
                let child = format!("{}${}", fb.name, fb.anon);
                self.lower_func(child, sig, None, body, Some(&*env));
            }
            Expr::Selector { expr, .. } => self.walk_expr(fb, env, expr),
            Expr::Index { expr, indices, .. } => {
                self.walk_expr(fb, env, expr);
                for i in indices {
                    self.walk_expr(fb, env, i);
                }
            }
            Expr::SliceExpr { expr, parts, .. } => {
                self.walk_expr(fb, env, expr);
                for p in parts.iter().flatten() {
                    self.walk_expr(fb, env, p);
                }
            }
            Expr::Star { expr, .. } | Expr::Unary { expr, .. } | Expr::Paren { expr, .. } => {
                self.walk_expr(fb, env, expr)
            }
            Expr::Binary { lhs, rhs, .. } => {
                self.walk_expr(fb, env, lhs);
                self.walk_expr(fb, env, rhs);
            }
            Expr::CompositeLit { elems, .. } => {
                for el in elems {
                    self.walk_expr(fb, env, el);
                }
            }
            Expr::KeyValue { key, value } => {
                self.walk_expr(fb, env, key);
                self.walk_expr(fb, env, value);
            }
            Expr::TypeAssert { expr, .. } => self.walk_expr(fb, env, expr),
            Expr::Ident(_) | Expr::BasicLit { .. } | Expr::TypeRef(_) | Expr::Bad { .. } => {}
        }
    }

    // ------------------------------------------------------------------
    // Classification
    // ------------------------------------------------------------------

    /// Resolve a call's function expression to a callee description.
    /// Returns `None` for non-calls in call syntax: conversions and
    /// builtins.
    fn classify(&mut self, env: &Env, func: &Expr) -> Option<Callee> {
        match func {
            Expr::Paren { expr, .. } => self.classify(env, expr),
            Expr::Index { expr, indices, .. } => match self.classify(env, expr) {
                Some(Callee::Static { name }) => {
                    let args: Vec<String> = indices.iter().map(render_type_arg).collect();
                    Some(Callee::Static {
                        name: format!("{}[{}]", name, args.join(", ")),
                    })
                }
                None => None,
                Some(_) => Some(Callee::Dynamic {
                    operand: func.short_text(),
                    type_display: "?".to_string(),
                }),
            },
            Expr::Ident(id) => {
                if let Some(vt) = env.lookup(&id.name) {
                    return Some(match vt {
                        VarType::FuncVal { display } => Callee::Dynamic {
                            operand: id.name.clone(),
                            type_display: display.clone(),
                        },
                        _ => Callee::Dynamic {
                            operand: id.name.clone(),
                            type_display: "?".to_string(),
                        },
                    });
                }
                match self.pkg.scope.get(&id.name) {
                    Some(SymbolKind::Func) => Some(Callee::Static {
                        name: format!("{}.{}", self.pkg.import_path, id.name),
                    }),
                    Some(SymbolKind::Type) => None,
                    Some(SymbolKind::Var) => {
                        let display = self
                            .pkg
                            .var_types
                            .get(&id.name)
                            .map(|ty| self.resolve_var_type(ty));
                        match display {
                            Some(VarType::FuncVal { display }) => Some(Callee::Dynamic {
                                operand: id.name.clone(),
                                type_display: display,
                            }),
                            _ => Some(Callee::Dynamic {
                                operand: id.name.clone(),
                                type_display: "?".to_string(),
                            }),
                        }
                    }
                    Some(SymbolKind::Const) => Some(Callee::Dynamic {
                        operand: id.name.clone(),
                        type_display: "?".to_string(),
                    }),
                    None => {
                        if is_builtin(&id.name) {
                            None
                        } else {
                            Some(Callee::Dynamic {
                                operand: id.name.clone(),
                                type_display: "?".to_string(),
                            })
                        }
                    }
                }
            }
            Expr::Selector { expr, sel } => {
                // Import-qualified selector: a static callee even when the
                // target package is outside the loaded universe.
                if let Expr::Ident(q) = expr.as_ref() {
                    let shadowed =
                        env.lookup(&q.name).is_some() || self.pkg.scope.contains_key(&q.name);
                    if !shadowed {
                        if let Some(path) = self.imports.get(&q.name).cloned() {
                            if let Some(target) = self.universe.by_path(&path) {
                                if target.scope.get(&sel.name) == Some(&SymbolKind::Type) {
                                    return None;
                                }
                            }
                            return Some(Callee::Static {
                                name: format!("{}.{}", path, sel.name),
                            });
                        }
                    }
                }
                match self.infer_type(env, expr) {
                    VarType::Iface { display } => Some(Callee::Interface {
                        method: sel.name.clone(),
                        recv_display: display,
                    }),
                    VarType::Concrete { pkg_path, name } => {
                        let pointer_recv = self
                            .universe
                            .named_def(&pkg_path, &name)
                            .and_then(|def| def.methods.iter().find(|m| m.name == sel.name))
                            .map(|m| m.pointer_recv)
                            .unwrap_or(false);
                        let recv = if pointer_recv {
                            format!("(*{}.{})", pkg_path, name)
                        } else {
                            format!("({}.{})", pkg_path, name)
                        };
                        Some(Callee::Static {
                            name: format!("{}.{}", recv, sel.name),
                        })
                    }
                    VarType::FuncVal { display } => Some(Callee::Dynamic {
                        operand: format!("{}.{}", expr.short_text(), sel.name),
                        type_display: display,
                    }),
                    VarType::Unknown => Some(Callee::Dynamic {
                        operand: format!("{}.{}", expr.short_text(), sel.name),
                        type_display: "?".to_string(),
                    }),
                }
            }
            Expr::FuncLit { sig, .. } => Some(Callee::Dynamic {
                operand: "anonymous_func_value".to_string(),
                type_display: format!("func{}", sigfmt::func_type_display(sig)),
            }),
            Expr::TypeRef(_) => None,
            other => Some(Callee::Dynamic {
                operand: other.short_text(),
                type_display: "?".to_string(),
            }),
        }
    }

    /// Bounded type inference for call receivers.
    fn infer_type(&self, env: &Env, e: &Expr) -> VarType {
        match e {
            Expr::Paren { expr, .. } => self.infer_type(env, expr),
            Expr::Ident(id) => {
                if let Some(vt) = env.lookup(&id.name) {
                    return vt.clone();
                }
                match self.pkg.var_types.get(&id.name) {
                    Some(ty) => self.resolve_var_type(ty),
                    None => VarType::Unknown,
                }
            }
            Expr::Unary { op, expr, .. } if *op == crate::token::TokenKind::Amp => {
                self.infer_type(env, expr)
            }
            Expr::CompositeLit { ty: Some(ty), .. } => self.resolve_var_type(ty),
            Expr::TypeAssert { ty: Some(ty), .. } => self.resolve_var_type(ty),
            Expr::Star { expr, .. } => self.infer_type(env, expr),
            Expr::FuncLit { sig, .. } => VarType::FuncVal {
                display: format!("func{}", sigfmt::func_type_display(sig)),
            },
            _ => VarType::Unknown,
        }
    }

    /// Resolve a declared type to its tracking category.
    fn resolve_var_type(&self, ty: &TypeExpr) -> VarType {
        let mut core = ty.core();
        if let TypeExpr::Pointer { elem, .. } = core {
            // A pointer to an interface is not an interface value.
            let inner = self.resolve_var_type(elem);
            return match inner {
                VarType::Iface { .. } => VarType::Unknown,
                other => other,
            };
        }
        if let TypeExpr::Generic { base, .. } = core {
            core = base.core();
        }
        match core {
            TypeExpr::Name {
                qualifier: None,
                name,
                ..
            } => match self.pkg.types.get(name) {
                Some(def) if def.is_interface() => VarType::Iface {
                    display: sigfmt::type_display(ty),
                },
                Some(_) => VarType::Concrete {
                    pkg_path: self.pkg.import_path.clone(),
                    name: name.clone(),
                },
                None => VarType::Unknown,
            },
            TypeExpr::Name {
                qualifier: Some(q),
                name,
                ..
            } => match self.imports.get(q) {
                Some(path) => match self.universe.named_def(path, name) {
                    Some(def) if def.is_interface() => VarType::Iface {
                        display: sigfmt::type_display(ty),
                    },
                    Some(_) => VarType::Concrete {
                        pkg_path: path.clone(),
                        name: name.clone(),
                    },
                    None => VarType::Unknown,
                },
                None => VarType::Unknown,
            },
            TypeExpr::Func { sig, .. } => VarType::FuncVal {
                display: format!("func{}", sigfmt::func_type_display(sig)),
            },
            _ => VarType::Unknown,
        }
    }

    /// Type bound by a type-switch case expression.
    fn case_expr_type(&self, e: &Expr) -> VarType {
        match e {
            Expr::Ident(id) => self.resolve_var_type(&TypeExpr::Name {
                qualifier: None,
                name: id.name.clone(),
                pos: id.pos,
            }),
            Expr::Selector { expr, sel } => match expr.as_ref() {
                Expr::Ident(q) => self.resolve_var_type(&TypeExpr::Name {
                    qualifier: Some(q.name.clone()),
                    name: sel.name.clone(),
                    pos: q.pos,
                }),
                _ => VarType::Unknown,
            },
            Expr::TypeRef(ty) => self.resolve_var_type(ty),
            _ => VarType::Unknown,
        }
    }
}

/// Render a generic-instantiation argument for callee display.
fn render_type_arg(e: &Expr) -> String {
    match e {
        Expr::Ident(id) => id.name.clone(),
        Expr::TypeRef(ty) => sigfmt::type_display(ty),
        Expr::Selector { expr, sel } => format!("{}.{}", expr.short_text(), sel.name),
        other => other.short_text(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FileSet;
    use crate::parser::parse_file;
    use crate::resolve::resolve_package;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn universe_of(path: &str, src: &str) -> Universe {
        let mut fset = FileSet::new();
        let id = fset.add_file("/m/main.go");
        let ast = parse_file(id, src);
        let mut pkg = Package {
            name: "demo".to_string(),
            import_path: path.to_string(),
            dir: PathBuf::from("/m"),
            files: vec!["/m/main.go".to_string()],
            imports: Vec::new(),
            ast_files: vec![ast],
            scope: BTreeMap::new(),
            types: BTreeMap::new(),
            var_types: BTreeMap::new(),
            parse_errors: 0,
            embed_patterns: Vec::new(),
            embed_files: Vec::new(),
            module: None,
        };
        resolve_package(&mut pkg);
        Universe::new(vec![pkg], fset)
    }

    fn instrs_of<'p>(program: &'p LoweredProgram, name: &str) -> Vec<&'p Instr> {
        program
            .functions
            .iter()
            .filter(|f| f.name == name)
            .flat_map(|f| f.blocks.iter())
            .flat_map(|b| b.instrs.iter())
            .collect()
    }

    mod classification {
        use super::*;

        #[test]
        fn static_interface_go_and_defer_flavors() {
            let src = r#"package demo

type Greeter interface {
	Greet()
}

func helper() {}

func cleanup() {}

func run(g Greeter) {
	helper()
	g.Greet()
	go helper()
	defer cleanup()
}
"#;
            let universe = universe_of("m/demo", src);
            let program = lower(&universe).unwrap();
            let instrs = instrs_of(&program, "m/demo.run");
            assert_eq!(instrs.len(), 4);
            assert_eq!(instrs[0].kind, CallKind::Call);
            assert_eq!(
                instrs[0].callee,
                Callee::Static {
                    name: "m/demo.helper".to_string()
                }
            );
            assert_eq!(
                instrs[1].callee,
                Callee::Interface {
                    method: "Greet".to_string(),
                    recv_display: "Greeter".to_string()
                }
            );
            assert_eq!(instrs[2].kind, CallKind::Go);
            assert_eq!(instrs[3].kind, CallKind::Defer);
            assert_eq!(
                instrs[3].callee,
                Callee::Static {
                    name: "m/demo.cleanup".to_string()
                }
            );
            // Source order is preserved in positions.
            assert!(instrs[0].pos.line < instrs[1].pos.line);
            assert!(instrs[1].pos.line < instrs[2].pos.line);
        }

        #[test]
        fn method_call_on_composite_literal_binding() {
            let src = r#"package demo

type Conn struct{}

func (c Conn) Close() {}

func (c *Conn) Reset() {}

func use() {
	c := Conn{}
	c.Close()
	c.Reset()
}
"#;
            let universe = universe_of("m/demo", src);
            let program = lower(&universe).unwrap();
            let instrs = instrs_of(&program, "m/demo.use");
            assert_eq!(instrs.len(), 2);
            assert_eq!(
                instrs[0].callee,
                Callee::Static {
                    name: "(m/demo.Conn).Close".to_string()
                }
            );
            assert_eq!(
                instrs[1].callee,
                Callee::Static {
                    name: "(*m/demo.Conn).Reset".to_string()
                }
            );
        }

        #[test]
        fn import_qualified_call_is_static() {
            let src = r#"package demo

import "fmt"

func run() {
	fmt.Println("hi")
}
"#;
            let universe = universe_of("m/demo", src);
            let program = lower(&universe).unwrap();
            let instrs = instrs_of(&program, "m/demo.run");
            assert_eq!(
                instrs[0].callee,
                Callee::Static {
                    name: "fmt.Println".to_string()
                }
            );
        }

        #[test]
        fn func_value_call_is_dynamic() {
            let src = r#"package demo

func run() {
	f := func() {}
	f()
}
"#;
            let universe = universe_of("m/demo", src);
            let program = lower(&universe).unwrap();
            let instrs = instrs_of(&program, "m/demo.run");
            assert_eq!(instrs.len(), 1);
            assert_eq!(
                instrs[0].callee,
                Callee::Dynamic {
                    operand: "f".to_string(),
                    type_display: "func()".to_string()
                }
            );
        }

        #[test]
        fn immediately_invoked_literal_is_anonymous() {
            let src = r#"package demo

func inner() {}

func run() {
	func() { inner() }()
}
"#;
            let universe = universe_of("m/demo", src);
            let program = lower(&universe).unwrap();
            let outer = instrs_of(&program, "m/demo.run");
            assert_eq!(outer.len(), 1);
            match &outer[0].callee {
                Callee::Dynamic { operand, .. } => assert_eq!(operand, "anonymous_func_value"),
                other => panic!("expected dynamic callee, got {:?}", other),
            }
            // The literal's body lowers as its own function.
            let nested = instrs_of(&program, "m/demo.run$1");
            assert_eq!(nested.len(), 1);
            assert_eq!(
                nested[0].callee,
                Callee::Static {
                    name: "m/demo.inner".to_string()
                }
            );
        }

        #[test]
        fn conversions_and_builtins_are_skipped() {
            let src = r#"package demo

type id int

func run(xs []int) {
	_ = id(1)
	_ = len(xs)
	_ = []byte("s")
}
"#;
            let universe = universe_of("m/demo", src);
            let program = lower(&universe).unwrap();
            assert!(instrs_of(&program, "m/demo.run").is_empty());
        }

        #[test]
        fn nested_call_arguments_emit_inner_first() {
            let src = r#"package demo

func g() int { return 1 }

func f(n int) {}

func run() {
	f(g())
}
"#;
            let universe = universe_of("m/demo", src);
            let program = lower(&universe).unwrap();
            let instrs = instrs_of(&program, "m/demo.run");
            assert_eq!(instrs.len(), 2);
            assert_eq!(
                instrs[0].callee,
                Callee::Static {
                    name: "m/demo.g".to_string()
                }
            );
            assert_eq!(
                instrs[1].callee,
                Callee::Static {
                    name: "m/demo.f".to_string()
                }
            );
        }

        #[test]
        fn control_flow_splits_blocks() {
            let src = r#"package demo

func a() {}

func b() {}

func run(cond bool) {
	a()
	if cond {
		b()
	}
}
"#;
            let universe = universe_of("m/demo", src);
            let program = lower(&universe).unwrap();
            let func = program
                .functions
                .iter()
                .find(|f| f.name == "m/demo.run")
                .unwrap();
            assert!(func.blocks.len() >= 2);
        }

        #[test]
        fn method_canonical_names_include_receiver_form() {
            assert_eq!(
                canonical_func_name("m/p", None, "Run"),
                "m/p.Run"
            );
            let value_recv = Receiver {
                name: Some("c".to_string()),
                type_name: "Conn".to_string(),
                pointer: false,
            };
            assert_eq!(
                canonical_func_name("m/p", Some(&value_recv), "Close"),
                "(m/p.Conn).Close"
            );
            let ptr_recv = Receiver {
                name: None,
                type_name: "Conn".to_string(),
                pointer: true,
            };
            assert_eq!(
                canonical_func_name("m/p", Some(&ptr_recv), "Reset"),
                "(*m/p.Conn).Reset"
            );
        }
    }

    mod lower_errors {
        use super::*;

        #[test]
        fn empty_universe_is_a_failure() {
            let universe = Universe::new(Vec::new(), FileSet::new());
            assert!(lower(&universe).is_err());
        }
    }
}
