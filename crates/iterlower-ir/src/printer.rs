//! Textual dump of lowered iterator methods.
//!
//! The format is stable so tests can snapshot it and so that lowering the
//! same input twice can be compared byte for byte.
//!
//! # Example output
//!
//! ```text
//! kickoff one() -> Enumerator<int>
//!     local $sm: one$Iterator
//!     $sm = new one$Iterator(0)
//!     return $sm
//! end
//! ```

use std::fmt::Write;

use crate::bound::LocalId;
use crate::synth::{
    FieldId, LExpr, LStmt, LoweredMethod, MethodDef, Place, SynthesizedType, ThreadIdSource,
};

/// Print the kick-off body followed by the state-machine type.
pub fn print_lowered(lowered: &LoweredMethod) -> String {
    let mut printer = Printer::new(&lowered.state_machine);
    let header = format!("kickoff {}", signature(&lowered.kickoff));
    printer.method(&lowered.kickoff, &header);
    printer.out.push('\n');
    printer.state_machine();
    printer.out
}

/// Print only the state-machine type.
pub fn print_state_machine(ty: &SynthesizedType) -> String {
    let mut printer = Printer::new(ty);
    printer.state_machine();
    printer.out
}

fn signature(method: &MethodDef) -> String {
    let params = method
        .params
        .iter()
        .map(|(name, ty)| format!("{name}: {ty}"))
        .collect::<Vec<_>>()
        .join(", ");
    match &method.return_type {
        Some(ret) => format!("{}({params}) -> {ret}", method.name),
        None => format!("{}({params})", method.name),
    }
}

struct Printer<'a> {
    ty: &'a SynthesizedType,
    out: String,
}

impl<'a> Printer<'a> {
    fn new(ty: &'a SynthesizedType) -> Self {
        Self {
            ty,
            out: String::new(),
        }
    }

    fn state_machine(&mut self) {
        let ty = self.ty;
        let _ = write!(self.out, "{} class {}", ty.visibility, ty.name);
        if !ty.type_params.is_empty() {
            let _ = write!(self.out, "<{}>", ty.type_params.join(", "));
        }
        let _ = writeln!(self.out, " ({} of {})", ty.kind, ty.element_type);
        let interfaces = ty
            .interfaces
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(self.out, "  implements {interfaces}");
        for field in &ty.fields {
            let readonly = if field.readonly { "readonly " } else { "" };
            let _ = writeln!(
                self.out,
                "  field {} {readonly}{}: {}",
                field.visibility, field.name, field.ty
            );
        }
        for state in &ty.states {
            let _ = write!(self.out, "  state {} resume {}", state.state, state.resume);
            if !state.cleanup.is_empty() {
                let _ = write!(self.out, " cleanup [{}]", state.cleanup.join(", "));
            }
            self.out.push('\n');
        }
        let header = format!("  {} {}", ty.constructor.visibility, signature(&ty.constructor));
        self.method(&ty.constructor, &header);
        for method in &ty.methods {
            let mut header = format!("  {} {}", method.visibility, signature(method));
            if let Some(implements) = &method.implements {
                let _ = write!(header, " implements {implements}");
            }
            self.method(method, &header);
        }
        let _ = writeln!(self.out, "end");
    }

    fn method(&mut self, method: &MethodDef, header: &str) {
        let _ = writeln!(self.out, "{header}");
        for local in &method.locals {
            let _ = writeln!(self.out, "    local {}: {}", local.name, local.ty);
        }
        for stmt in &method.body {
            let line = self.stmt(method, stmt);
            let _ = writeln!(self.out, "{line}");
        }
        let indent = if header.starts_with("  ") { "  " } else { "" };
        let _ = writeln!(self.out, "{indent}end");
    }

    fn stmt(&self, method: &MethodDef, stmt: &LStmt) -> String {
        match stmt {
            LStmt::Label(label) => format!("  {label}:"),
            LStmt::Goto(label) => format!("    goto {label}"),
            LStmt::GotoUnless { cond, target } => {
                format!("    unless {} goto {target}", self.expr(method, cond))
            }
            LStmt::Switch {
                value,
                cases,
                default,
            } => {
                let arms = cases
                    .iter()
                    .map(|(value, label)| format!("{value} => {label}"))
                    .chain(std::iter::once(format!("_ => {default}")))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("    switch {} {{ {arms} }}", self.expr(method, value))
            }
            LStmt::Assign { place, value } => format!(
                "    {} = {}",
                self.place(method, place),
                self.expr(method, value)
            ),
            LStmt::Eval(expr) => format!("    {}", self.expr(method, expr)),
            LStmt::Return(Some(value)) => format!("    return {}", self.expr(method, value)),
            LStmt::Return(None) => "    return".to_owned(),
            LStmt::Throw(ctor) => format!("    throw new {ctor}()"),
        }
    }

    fn field_name(&self, id: FieldId) -> String {
        self.ty
            .field(id)
            .map(|f| f.name.clone())
            .unwrap_or_else(|| format!("<field {}>", id.0))
    }

    fn local_name(&self, method: &MethodDef, id: LocalId) -> String {
        method
            .local(id)
            .map(|l| l.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn place(&self, method: &MethodDef, place: &Place) -> String {
        match place {
            Place::Field(field) => format!("this.{}", self.field_name(*field)),
            Place::FieldOf(local, field) => format!(
                "{}.{}",
                self.local_name(method, *local),
                self.field_name(*field)
            ),
            Place::Local(local) => self.local_name(method, *local),
        }
    }

    fn exprs(&self, method: &MethodDef, exprs: &[LExpr]) -> String {
        exprs
            .iter()
            .map(|e| self.expr(method, e))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn expr(&self, method: &MethodDef, expr: &LExpr) -> String {
        match expr {
            LExpr::Int(value) => value.to_string(),
            LExpr::Bool(value) => value.to_string(),
            LExpr::Str(value) => format!("{value:?}"),
            LExpr::Null => "null".to_owned(),
            LExpr::Load(place) => self.place(method, place),
            LExpr::This => "this".to_owned(),
            LExpr::Param(index) => method
                .params
                .get(*index)
                .map(|(name, _)| name.clone())
                .unwrap_or_else(|| format!("<param {index}>")),
            LExpr::Assign(place, value) => format!(
                "({} = {})",
                self.place(method, place),
                self.expr(method, value)
            ),
            LExpr::Unary(op, operand) => format!("{}{}", op.symbol(), self.expr(method, operand)),
            LExpr::Binary(op, lhs, rhs) => format!(
                "({} {} {})",
                self.expr(method, lhs),
                op.symbol(),
                self.expr(method, rhs)
            ),
            LExpr::Array(items) => format!("[{}]", self.exprs(method, items)),
            LExpr::Index(array, index) => format!(
                "{}[{}]",
                self.expr(method, array),
                self.expr(method, index)
            ),
            LExpr::Len(array) => format!("len({})", self.expr(method, array)),
            LExpr::Call { callee, args } => format!("{callee}({})", self.exprs(method, args)),
            LExpr::CallSelf(name) => format!("this.{name}()"),
            LExpr::New { args } => format!("new {}({})", self.ty.name, self.exprs(method, args)),
            LExpr::ThreadId(ThreadIdSource::Accessor(member)) => format!("{member}()"),
            LExpr::ThreadId(ThreadIdSource::ViaThread {
                current_thread,
                managed_id,
            }) => format!("{current_thread}().{managed_id}()"),
        }
    }
}
