//! Construcción de la tabla de símbolos.

use tracing::{debug_span, info};

use super::{DeclarationError, ScopeId, ScopeMap, Symbol, SymbolTable, Type};
use crate::{
    ast::{Ast, Block, EntryPoint, Function, Identifier, Item, Statement, TypeName},
    error::Diagnostics,
    source::Located,
};

pub fn build(ast: &Ast) -> (SymbolTable, ScopeMap, Diagnostics) {
    let _span = debug_span!("declarations").entered();

    let mut builder = Builder {
        table: SymbolTable::new(),
        scopes: ScopeMap::new(ast.node_count()),
        errors: Diagnostics::default().kind("Declaration error"),
    };

    let program = ast.program();
    let global = builder.table.global();
    builder.scopes.record(program.id, global);

    for item in &program.items {
        match item {
            Item::Function(function) => builder.function(global, function),
            Item::Main(entry) => builder.entry_point(global, entry),
        }
    }

    info!(errors = builder.errors.len(), "symbol table built");

    let Builder {
        table,
        scopes,
        errors,
    } = builder;

    (table, scopes, errors)
}

struct Builder {
    table: SymbolTable,
    scopes: ScopeMap,
    errors: Diagnostics,
}

impl Builder {
    fn entry_point(&mut self, global: ScopeId, entry: &EntryPoint) {
        let main = Identifier::from("main");
        if self.is_function(global, &main) {
            let error = DeclarationError::DuplicateMain;
            self.errors.push(Located::at(error, entry.location.clone()));
            return;
        }

        self.table.define(global, Symbol::function(main, Type::Void));

        // La rutina principal no pertenece a ninguna función de usuario
        let scope = self.table.open(global, None);
        self.scopes.record(entry.id, scope);

        self.block(scope, &entry.body);
    }

    fn function(&mut self, global: ScopeId, function: &Function) {
        let name = function.name.as_ref();

        let body = match &function.body {
            Some(body) => body,
            None => {
                let error = DeclarationError::MissingBody(name.clone());
                self.errors.push(Located::at(error, function.name.location().clone()));
                return;
            }
        };

        if self.is_function(global, name) {
            let error = DeclarationError::DuplicateFunction(name.clone());
            self.errors.push(Located::at(error, function.name.location().clone()));
            return;
        }

        let returns = self.resolve_type(&function.returns);
        let parameters: Option<Vec<_>> = function
            .parameters
            .iter()
            .map(|parameter| self.resolve_type(&parameter.of))
            .collect();

        let (returns, parameters) = match (returns, parameters) {
            (Some(returns), Some(parameters)) => (returns, parameters),
            _ => return,
        };

        let symbol = match self.table.define(global, Symbol::function(name.clone(), returns)) {
            Some(symbol) => symbol,
            None => return,
        };

        let scope = self.table.open(global, Some(symbol));
        self.scopes.record(function.id, scope);

        for (parameter, typ) in function.parameters.iter().zip(parameters) {
            let parameter_name = parameter.name.as_ref();
            match self.table.define(scope, Symbol::variable(parameter_name.clone(), typ)) {
                Some(id) => self.table.push_parameter(symbol, id),
                None => {
                    let error = DeclarationError::DuplicateParameter(parameter_name.clone());
                    self.errors.push(Located::at(error, parameter.name.location().clone()));
                }
            }
        }

        self.block(scope, body);
    }

    fn block(&mut self, parent: ScopeId, block: &Block) {
        let scope = self.table.open_block(parent);
        self.scopes.record(block.id, scope);

        for statement in &block.statements {
            self.statement(scope, statement);
        }
    }

    fn statement(&mut self, scope: ScopeId, statement: &Statement) {
        match statement {
            Statement::Declaration { of, name, .. } => {
                let typ = match self.resolve_type(of) {
                    Some(typ) => typ,
                    None => return,
                };

                let existing = self.table.param_local_resolve(scope, name.as_ref());
                if existing.map_or(false, |id| !self.table.symbol(id).is_function()) {
                    let error = DeclarationError::DuplicateVariable(name.as_ref().clone());
                    self.errors.push(Located::at(error, name.location().clone()));
                    return;
                }

                self.table.define(scope, Symbol::variable(name.as_ref().clone(), typ));
            }

            Statement::If {
                then, otherwise, ..
            } => {
                self.block(scope, then);
                if let Some(otherwise) = otherwise {
                    self.block(scope, otherwise);
                }
            }

            Statement::While { body, .. } => self.block(scope, body),

            Statement::Return { id, .. } => self.scopes.record(*id, scope),

            Statement::Assignment { .. } | Statement::Print { .. } | Statement::Call(_) => (),
        }
    }

    fn is_function(&self, scope: ScopeId, name: &Identifier) -> bool {
        self.table
            .local_resolve(scope, name)
            .map_or(false, |id| self.table.symbol(id).is_function())
    }

    fn resolve_type(&mut self, name: &TypeName) -> Option<Type> {
        match name.as_ref().parse() {
            Ok(typ) => Some(typ),
            Err(_) => {
                let error = DeclarationError::UnknownType(name.as_ref().clone());
                self.errors.push(Located::at(error, name.location().clone()));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast;

    #[test]
    fn records_every_scoped_node() {
        let mut b = ast::Builder::new();
        let ret = b.ret(Some(b.read("a")));
        let add = b.function("int", "add", &[("int", "a"), ("int", "b")], vec![ret]);
        let decl = b.declare("int", "x", Some(b.int(1)));
        let main = b.main(vec![decl]);
        let tree = b.finish(vec![add, main]);

        let (table, scopes, errors) = build(&tree);
        assert!(errors.is_empty());

        let global = table.global();
        assert_eq!(scopes.get(tree.program().id), Some(global));

        let add = table.local_resolve(global, &Identifier::from("add")).unwrap();
        let function = table.symbol(add).as_function().unwrap();
        assert_eq!(function.returns, Type::Int);
        assert_eq!(function.parameters.len(), 2);

        assert!(table.local_resolve(global, &Identifier::from("main")).is_some());
        assert_eq!(table.scope(global).children().len(), 2);
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut b = ast::Builder::new();
        let first = b.function("void", "f", &[("int", "a"), ("float", "a")], vec![]);
        let second = b.function("int", "f", &[], vec![]);
        let x = b.declare("int", "x", None);
        let again = b.declare("float", "x", None);
        let main = b.main(vec![x, again]);
        let other = b.main(vec![]);
        let tree = b.finish(vec![first, second, main, other]);

        let (table, _, errors) = build(&tree);
        assert_eq!(
            errors.messages(),
            [
                "Parameter `a` is declared more than once",
                "Function `f` is already defined",
                "Variable `x` is already declared in this scope",
                "Function `main` is already defined",
            ]
        );

        let f = table.local_resolve(table.global(), &Identifier::from("f")).unwrap();
        assert_eq!(table.symbol(f).typ(), Type::Void);
    }

    #[test]
    fn unknown_types_skip_declarations() {
        let mut b = ast::Builder::new();
        let bad = b.function("number", "f", &[], vec![]);
        let decl = b.declare("bool[]", "flags", None);
        let main = b.main(vec![decl]);
        let tree = b.finish(vec![bad, main]);

        let (table, _, errors) = build(&tree);
        assert_eq!(errors.messages(), ["Unknown type `number`", "Unknown type `bool[]`"]);
        assert!(table.local_resolve(table.global(), &Identifier::from("f")).is_none());
    }
}
