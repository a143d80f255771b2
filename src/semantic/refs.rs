//! Verificación de referencias.
//!
//! Toda lectura de variable y toda llamada debe resolver a un símbolo
//! del tipo correcto, además de algunas reglas de ubicación estructural
//! para asignaciones y `return`.

use tracing::{debug_span, info};

use super::{ReferenceError, ScopeId, ScopeMap, SymbolId, SymbolTable};
use crate::{
    ast::{Ast, Block, Call, Expr, Identifier, Item, Statement},
    error::Diagnostics,
    source::Located,
};

pub fn check(ast: &Ast, table: &SymbolTable, scopes: &ScopeMap) -> Diagnostics {
    let _span = debug_span!("references").entered();

    let mut checker = Checker {
        table,
        scopes,
        errors: Diagnostics::default().kind("Reference error"),
    };

    for item in &ast.program().items {
        // Las declaraciones rechazadas no tienen ámbito registrado
        let (id, body) = match item {
            Item::Function(function) => match &function.body {
                Some(body) => (function.id, body),
                None => continue,
            },

            Item::Main(entry) => (entry.id, &entry.body),
        };

        if scopes.get(id).is_some() {
            checker.block(body);
        }
    }

    info!(errors = checker.errors.len(), "reference check finished");
    checker.errors
}

/// Resuelve un llamado, primero en el ámbito global y luego léxicamente.
pub(crate) fn resolve_callee(table: &SymbolTable, scope: ScopeId, name: &Identifier) -> Option<SymbolId> {
    table
        .local_resolve(table.global(), name)
        .or_else(|| table.resolve(scope, name))
}

struct Checker<'a> {
    table: &'a SymbolTable,
    scopes: &'a ScopeMap,
    errors: Diagnostics,
}

impl Checker<'_> {
    fn block(&mut self, block: &Block) {
        let scope = self.scopes.scope_of(block.id);
        for statement in &block.statements {
            self.statement(scope, statement);
        }
    }

    fn statement(&mut self, scope: ScopeId, statement: &Statement) {
        match statement {
            Statement::Declaration { value, .. } => {
                if let Some(value) = value {
                    self.expr(scope, value);
                }
            }

            Statement::Assignment {
                target,
                index,
                value,
            } => {
                self.variable(scope, target);

                // El árbol no admite sentencias en el ámbito global; toda
                // asignación cuelga de un bloque.
                if scope == self.table.global() {
                    let error = ReferenceError::GlobalAssignment(target.as_ref().clone());
                    self.errors.push(Located::at(error, target.location().clone()));
                }

                if let Some(index) = index {
                    self.expr(scope, index);
                }

                self.expr(scope, value);
            }

            Statement::If {
                condition,
                then,
                otherwise,
            } => {
                self.expr(scope, condition);
                self.block(then);

                if let Some(otherwise) = otherwise {
                    self.block(otherwise);
                }
            }

            Statement::While { condition, body } => {
                self.expr(scope, condition);
                self.block(body);
            }

            Statement::Return {
                id,
                location,
                value,
            } => {
                let scope = self.scopes.scope_of(*id);
                if self.table.scope(scope).function().is_none() {
                    let error = ReferenceError::ReturnOutsideFunction;
                    self.errors.push(Located::at(error, location.clone()));
                }

                if let Some(value) = value {
                    self.expr(scope, value);
                }
            }

            Statement::Print { value, .. } => {
                if let Some(value) = value {
                    self.expr(scope, value);
                }
            }

            Statement::Call(call) => self.call(scope, call),
        }
    }

    fn expr(&mut self, scope: ScopeId, expr: &Located<Expr>) {
        match expr.as_ref() {
            Expr::Int(_) | Expr::Float(_) | Expr::Bool(_) | Expr::Char(_) | Expr::Str(_) => (),

            Expr::Read(name) => self.variable(scope, name),
            Expr::Call(call) => self.call(scope, call),

            Expr::Index { array, index } => {
                self.variable(scope, array);
                self.expr(scope, index);
            }

            Expr::Length(inner) | Expr::Paren(inner) | Expr::Negate(inner) => {
                self.expr(scope, inner)
            }

            Expr::Binary(lhs, _, rhs) => {
                self.expr(scope, lhs);
                self.expr(scope, rhs);
            }

            Expr::ArrayLiteral(elements) => {
                for element in elements {
                    self.expr(scope, element);
                }
            }

            Expr::NewArray { size, .. } => self.expr(scope, size),
        }
    }

    fn variable(&mut self, scope: ScopeId, name: &Located<Identifier>) {
        let error = match self.table.resolve(scope, name.as_ref()) {
            None => ReferenceError::UndefinedVariable(name.as_ref().clone()),
            Some(id) if self.table.symbol(id).is_function() => {
                ReferenceError::ExpectedVar(name.as_ref().clone())
            }

            Some(_) => return,
        };

        self.errors.push(Located::at(error, name.location().clone()));
    }

    fn call(&mut self, scope: ScopeId, call: &Call) {
        let table = self.table;
        let name = call.function.as_ref();
        let function = resolve_callee(table, scope, name).and_then(|id| table.symbol(id).as_function());

        match function {
            None => {
                let error = ReferenceError::UndefinedFunction(name.clone());
                self.errors.push(Located::at(error, call.function.location().clone()));
            }

            Some(function) if function.parameters.len() != call.arguments.len() => {
                let error = ReferenceError::Arity {
                    function: name.clone(),
                    expected: function.parameters.len(),
                    found: call.arguments.len(),
                };

                self.errors.push(Located::at(error, call.function.location().clone()));
            }

            Some(_) => (),
        }

        for argument in &call.arguments {
            self.expr(scope, argument);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{self, BinOp};

    #[test]
    fn assignment_to_undeclared() {
        let mut b = ast::Builder::new();
        let assign = b.assign("x", b.int(5));
        let main = b.main(vec![assign]);
        let analysis = b.finish(vec![main]).analyze();

        assert!(analysis.declaration_errors().is_empty());
        assert_eq!(
            analysis.reference_errors().messages(),
            ["Variable `x` is not declared in this scope"]
        );
    }

    #[test]
    fn assignment_in_entry_point_is_local() {
        let mut b = ast::Builder::new();
        let declare = b.declare("int", "x", None);
        let assign = b.assign("x", b.int(5));
        let main = b.main(vec![declare, assign]);
        let analysis = b.finish(vec![main]).analyze();

        assert!(analysis.reference_errors().is_empty());
    }

    #[test]
    fn return_in_entry_point() {
        let mut b = ast::Builder::new();
        let ret = b.ret(Some(b.int(1)));
        let main = b.main(vec![ret]);
        let analysis = b.finish(vec![main]).analyze();

        assert_eq!(analysis.reference_errors().messages(), ["`return` used outside of a function"]);
    }

    #[test]
    fn calls_and_reads() {
        let mut b = ast::Builder::new();
        let ret = b.ret(Some(b.binary(b.read("a"), BinOp::Add, b.int(1))));
        let inc = b.function("int", "inc", &[("int", "a")], vec![ret]);

        let arity = b.println(Some(b.call("inc", vec![b.int(1), b.int(2)])));
        let missing = b.call_statement("nope", vec![b.read("y")]);
        let function_read = b.print(Some(b.read("inc")));
        let indexed = b.print(Some(b.index("inc", b.int(0))));
        let main = b.main(vec![arity, missing, function_read, indexed]);

        let analysis = b.finish(vec![inc, main]).analyze();
        assert_eq!(
            analysis.reference_errors().messages(),
            [
                "Function `inc` expects 1 arguments, but 2 were provided",
                "Function `nope` is not declared",
                "Variable `y` is not declared in this scope",
                "Expected variable, found function `inc`",
                "Expected variable, found function `inc`",
            ]
        );
    }
}
