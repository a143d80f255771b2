//! Verificación de tipos.
//!
//! Cada expresión se evalúa a un [`Type`]. Toda falla se reporta y
//! produce el centinela [`Type::Error`], el cual se propaga en silencio
//! hacia las expresiones que lo contienen. Los nombres no resueltos ya
//! fueron reportados por la verificación de referencias y aquí solo
//! producen `Type::Error`.

use tracing::{debug_span, info};

use super::{resolve_callee, ScopeId, ScopeMap, SymbolTable, Type, TypeError};
use crate::{
    ast::{Ast, BinOp, Block, Call, Expr, Identifier, Item, NodeId, Statement},
    error::Diagnostics,
    source::{Located, Location},
};

/// Destino de los errores de tipos.
trait Sink {
    fn report(&mut self, error: Located<TypeError>);
}

impl Sink for Diagnostics {
    fn report(&mut self, error: Located<TypeError>) {
        self.push(error);
    }
}

/// Descarta errores, útil para solo inferir tipos.
struct Silent;

impl Sink for Silent {
    fn report(&mut self, _error: Located<TypeError>) {}
}

pub fn check(ast: &Ast, table: &SymbolTable, scopes: &ScopeMap) -> Diagnostics {
    let _span = debug_span!("types").entered();

    let mut errors = Diagnostics::default().kind("Type error");
    let mut checker = Checker {
        table,
        scopes,
        sink: &mut errors,
    };

    for item in &ast.program().items {
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

    info!(errors = errors.len(), "type check finished");
    errors
}

/// Infiere el tipo de una expresión sin reportar errores.
pub(crate) fn type_of(table: &SymbolTable, scopes: &ScopeMap, scope: ScopeId, expr: &Located<Expr>) -> Type {
    let mut checker = Checker {
        table,
        scopes,
        sink: &mut Silent,
    };

    checker.expr(scope, expr)
}

/// Un valor de tipo `found` es asignable a un destino de tipo `declared`.
///
/// `new T[n]` tiene tipo `T`, por lo cual únicamente es asignable a
/// un destino de tipo arreglo de `T`.
fn assignable(declared: Type, value: &Located<Expr>, found: Type) -> bool {
    match value.as_ref() {
        Expr::NewArray { .. } => declared.is_array() && declared.element() == Some(found),
        _ => declared == found,
    }
}

/// Tipo a mostrar en diagnósticos para un valor asignado.
fn shown(value: &Located<Expr>, found: Type) -> Type {
    match value.as_ref() {
        Expr::NewArray { .. } => found.array_of().unwrap_or(found),
        _ => found,
    }
}

struct Checker<'a, S: Sink> {
    table: &'a SymbolTable,
    scopes: &'a ScopeMap,
    sink: &'a mut S,
}

impl<S: Sink> Checker<'_, S> {
    fn report(&mut self, error: TypeError, location: &Location) -> Type {
        self.sink.report(Located::at(error, location.clone()));
        Type::Error
    }

    fn expect(&mut self, expected: Type, found: Type, location: &Location) -> Type {
        if found == Type::Error || found == expected {
            found
        } else {
            self.report(TypeError::ExpectedType { expected, found }, location)
        }
    }

    fn block(&mut self, block: &Block) {
        let scope = self.scopes.scope_of(block.id);
        for statement in &block.statements {
            self.statement(scope, statement);
        }
    }

    fn statement(&mut self, scope: ScopeId, statement: &Statement) {
        match statement {
            Statement::Declaration { of, name, value } => {
                if let Some(value) = value {
                    let found = self.expr(scope, value);

                    // Los tipos desconocidos ya fueron reportados como errores de declaración
                    if let Ok(declared) = of.as_ref().parse() {
                        self.assign(name.as_ref(), declared, value, found);
                    }
                }
            }

            Statement::Assignment {
                target,
                index: None,
                value,
            } => {
                let found = self.expr(scope, value);
                if let Some(declared) = self.variable(scope, target.as_ref()) {
                    self.assign(target.as_ref(), declared, value, found);
                }
            }

            Statement::Assignment {
                target,
                index: Some(index),
                value,
            } => {
                let index_type = self.expr(scope, index);
                let found = self.expr(scope, value);

                let declared = match self.variable(scope, target.as_ref()) {
                    Some(declared) => declared,
                    None => return,
                };

                self.expect(Type::Int, index_type, index.location());

                match declared {
                    Type::String => {
                        let error = TypeError::ImmutableString(target.as_ref().clone());
                        self.report(error, target.location());
                    }

                    _ if declared.is_array() => {
                        if let Some(element) = declared.element() {
                            self.expect(element, found, value.location());
                        }
                    }

                    _ => {
                        self.report(TypeError::NotIndexable(declared), target.location());
                    }
                }
            }

            Statement::If {
                condition,
                then,
                otherwise,
            } => {
                self.condition(scope, "if", condition);
                self.block(then);

                if let Some(otherwise) = otherwise {
                    self.block(otherwise);
                }
            }

            Statement::While { condition, body } => {
                self.condition(scope, "while", condition);
                self.block(body);
            }

            Statement::Return {
                id,
                location,
                value,
            } => self.ret(scope, *id, location, value.as_ref()),

            Statement::Print { value, .. } => {
                if let Some(value) = value {
                    let typ = self.expr(scope, value);
                    if typ == Type::Void || typ == Type::Args || typ.is_array() {
                        self.report(TypeError::NotPrintable(typ), value.location());
                    }
                }
            }

            Statement::Call(call) => {
                self.call(scope, call);
            }
        }
    }

    fn assign(&mut self, name: &Identifier, declared: Type, value: &Located<Expr>, found: Type) {
        if found == Type::Error {
            return;
        } else if found == Type::Void {
            self.report(TypeError::VoidAssignment(name.clone()), value.location());
        } else if !assignable(declared, value, found) {
            let (expected, found) = (declared, shown(value, found));
            self.report(TypeError::ExpectedType { expected, found }, value.location());
        }
    }

    fn condition(&mut self, scope: ScopeId, statement: &'static str, condition: &Located<Expr>) {
        let typ = self.expr(scope, condition);
        if typ != Type::Bool && typ != Type::Error {
            self.report(TypeError::Condition(statement, typ), condition.location());
        }
    }

    fn ret(
        &mut self,
        scope: ScopeId,
        id: NodeId,
        location: &Location,
        value: Option<&Located<Expr>>,
    ) {
        let found = value.map(|value| (value, self.expr(scope, value)));

        // Sin función asociada el error ya es de referencia
        let table = self.table;
        let function = match table.function_of(self.scopes.scope_of(id)) {
            Some((_, function)) => function,
            None => return,
        };

        let name = &function.name;
        match (function.returns, found) {
            (Type::Void, None) => (),

            (Type::Void, Some((value, _))) => {
                self.report(TypeError::VoidReturnValue(name.clone()), value.location());
            }

            (_, None) => {
                self.report(TypeError::MissingReturnValue(name.clone()), location);
            }

            (expected, Some((value, found))) => {
                if found != Type::Error && !assignable(expected, value, found) {
                    let error = TypeError::ReturnMismatch {
                        function: name.clone(),
                        expected,
                        found: shown(value, found),
                    };

                    self.report(error, value.location());
                }
            }
        }
    }

    fn variable(&self, scope: ScopeId, name: &Identifier) -> Option<Type> {
        let symbol = self.table.symbol(self.table.resolve(scope, name)?);
        if symbol.is_function() {
            None
        } else {
            Some(symbol.typ())
        }
    }

    fn expr(&mut self, scope: ScopeId, expr: &Located<Expr>) -> Type {
        self.eval(scope, expr, false)
    }

    /// `in_length` indica si el padre inmediato es `length(...)`.
    fn eval(&mut self, scope: ScopeId, expr: &Located<Expr>, in_length: bool) -> Type {
        match expr.as_ref() {
            Expr::Int(_) => Type::Int,
            Expr::Float(_) => Type::Float,
            Expr::Bool(_) => Type::Bool,
            Expr::Char(_) => Type::Char,
            Expr::Str(_) => Type::String,

            Expr::Read(name) => self.variable(scope, name.as_ref()).unwrap_or(Type::Error),
            Expr::Call(call) => self.call(scope, call),

            Expr::Index { array, index } => {
                let base = self.variable(scope, array.as_ref()).unwrap_or(Type::Error);
                let index_type = self.expr(scope, index);

                if base == Type::Error {
                    return Type::Error;
                }

                let element = match base.element() {
                    Some(element) => element,
                    None => return self.report(TypeError::NotIndexable(base), array.location()),
                };

                match self.expect(Type::Int, index_type, index.location()) {
                    Type::Int => element,
                    _ => Type::Error,
                }
            }

            Expr::Length(inner) => match self.eval(scope, inner, true) {
                Type::Error => Type::Error,
                Type::String => Type::Int,
                typ if typ.is_array() => Type::Int,
                typ => self.report(TypeError::NoLength(typ), inner.location()),
            },

            Expr::Paren(inner) => self.expr(scope, inner),

            Expr::Negate(inner) => match self.expr(scope, inner) {
                Type::Error => Type::Error,
                typ if typ.is_numeric() => typ,
                typ => self.report(TypeError::NotNumeric(typ), inner.location()),
            },

            Expr::Binary(lhs, op, rhs) => {
                let (lhs, rhs) = (self.expr(scope, lhs), self.expr(scope, rhs));
                self.binary(expr.location(), lhs, *op, rhs, in_length)
            }

            Expr::ArrayLiteral(elements) => {
                let types: Vec<_> = elements
                    .iter()
                    .map(|element| self.expr(scope, element))
                    .collect();

                let first = match types.first() {
                    Some(&first) => first,
                    None => return self.report(TypeError::EmptyArray, expr.location()),
                };

                if types.contains(&Type::Error) {
                    Type::Error
                } else if types.iter().any(|&typ| typ != first) {
                    self.report(TypeError::MixedArray, expr.location())
                } else {
                    match first.array_of() {
                        Some(array) => array,
                        None => self.report(TypeError::InvalidElement(first), expr.location()),
                    }
                }
            }

            Expr::NewArray { of, size } => {
                let size_type = self.expr(scope, size);

                let element = match of.as_ref().parse::<Type>() {
                    Ok(element) if element.is_scalar() => element,
                    Ok(element) => return self.report(TypeError::InvalidElement(element), of.location()),
                    Err(_) => {
                        let error = TypeError::UnknownType(of.as_ref().clone());
                        return self.report(error, of.location());
                    }
                };

                match self.expect(Type::Int, size_type, size.location()) {
                    Type::Int => element,
                    _ => Type::Error,
                }
            }
        }
    }

    fn binary(&mut self, location: &Location, lhs: Type, op: BinOp, rhs: Type, in_length: bool) -> Type {
        if lhs == Type::Error || rhs == Type::Error {
            return Type::Error;
        } else if lhs == Type::Void || rhs == Type::Void {
            return self.report(TypeError::VoidOperand(op), location);
        }

        if op.is_arithmetic() {
            return if lhs != rhs {
                self.report(TypeError::OperandMismatch(op, lhs, rhs), location)
            } else if !lhs.is_numeric() {
                self.report(TypeError::InvalidOperands(op, lhs), location)
            } else {
                lhs
            };
        }

        if lhs != rhs && !in_length {
            return self.report(TypeError::OperandMismatch(op, lhs, rhs), location);
        }

        let comparable = |typ: Type| typ.is_scalar() || (typ == Type::String && !op.is_relational());
        match [lhs, rhs].into_iter().find(|&typ| !comparable(typ)) {
            Some(typ) => self.report(TypeError::InvalidOperands(op, typ), location),
            None => Type::Bool,
        }
    }

    fn call(&mut self, scope: ScopeId, call: &Call) -> Type {
        let table = self.table;
        let name = call.function.as_ref();

        let function = resolve_callee(table, scope, name).and_then(|id| table.symbol(id).as_function());
        let function = match function {
            Some(function) if function.parameters.len() == call.arguments.len() => function,

            // Nombre no resuelto o aridad incorrecta, ya reportados
            _ => {
                for argument in &call.arguments {
                    self.expr(scope, argument);
                }

                return Type::Error;
            }
        };

        let mut failed = false;
        for (position, (argument, &parameter)) in call.arguments.iter().zip(&function.parameters).enumerate() {
            let expected = table.symbol(parameter).typ();
            match self.expr(scope, argument) {
                Type::Error => failed = true,

                Type::Void => {
                    self.report(TypeError::VoidArgument(name.clone()), argument.location());
                    failed = true;
                }

                found if found != expected => {
                    let error = TypeError::ArgumentMismatch {
                        function: name.clone(),
                        position: position + 1,
                        expected,
                        found,
                    };

                    self.report(error, argument.location());
                    failed = true;
                }

                _ => (),
            }
        }

        if failed {
            Type::Error
        } else {
            function.returns
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{self, BinOp};

    fn type_errors(build: impl FnOnce(&mut ast::Builder) -> Vec<ast::Item>) -> Vec<String> {
        let mut b = ast::Builder::new();
        let items = build(&mut b);
        let analysis = b.finish(items).analyze();

        assert!(analysis.declaration_errors().is_empty());
        assert!(analysis.reference_errors().is_empty());
        analysis.type_errors().messages()
    }

    #[test]
    fn float_into_int() {
        let errors = type_errors(|b| {
            let decl = b.declare("int", "x", Some(b.float(1.0)));
            vec![b.main(vec![decl])]
        });

        assert_eq!(errors, ["Type mismatch: expected `int`, found `float`"]);
    }

    #[test]
    fn int_into_float() {
        let errors = type_errors(|b| {
            let decl = b.declare("float", "x", Some(b.int(1)));
            vec![b.main(vec![decl])]
        });

        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn array_literals() {
        let errors = type_errors(|b| {
            let good = b.declare("int[]", "a", Some(b.array(vec![b.int(1), b.int(2), b.int(3)])));
            let bad = b.declare("int[]", "b", Some(b.array(vec![b.int(1), b.int(2), b.float(3.0)])));
            vec![b.main(vec![good, bad])]
        });

        assert_eq!(errors, ["Array elements must share a type"]);
    }

    #[test]
    fn new_array_needs_array_target() {
        let errors = type_errors(|b| {
            let good = b.declare("float[]", "a", Some(b.new_array("float", b.int(4))));
            let bad = b.declare("float", "b", Some(b.new_array("float", b.int(4))));
            let size = b.declare("char[]", "c", Some(b.new_array("char", b.boolean(true))));
            vec![b.main(vec![good, bad, size])]
        });

        assert_eq!(
            errors,
            [
                "Type mismatch: expected `float`, found `float[]`",
                "Type mismatch: expected `int`, found `bool`",
            ]
        );
    }

    #[test]
    fn comparisons() {
        let errors = type_errors(|b| {
            let strings = b.println(Some(b.binary(b.string("a"), BinOp::Equal, b.string("b"))));
            let ordered = b.println(Some(b.binary(b.string("a"), BinOp::Less, b.string("b"))));
            let mixed = b.println(Some(b.binary(b.int(1), BinOp::Greater, b.float(1.0))));
            let chars = b.println(Some(b.binary(b.character('a'), BinOp::NotEqual, b.character('b'))));
            vec![b.main(vec![strings, ordered, mixed, chars])]
        });

        assert_eq!(
            errors,
            [
                "Operator `<` is not defined for `string`",
                "Operands of `>` must share a type, found `int` and `float`",
            ]
        );
    }

    #[test]
    fn comparison_inside_length() {
        let errors = type_errors(|b| {
            let compare = b.binary(b.int(1), BinOp::Equal, b.float(1.0));
            let print = b.println(Some(b.length(compare)));
            vec![b.main(vec![print])]
        });

        assert_eq!(errors, ["`length` applies to strings and arrays, found `bool`"]);
    }

    #[test]
    fn errors_do_not_cascade() {
        let errors = type_errors(|b| {
            let sum = b.binary(b.int(1), BinOp::Add, b.boolean(true));
            let nested = b.binary(b.paren(sum), BinOp::Mul, b.int(2));
            let decl = b.declare("int", "x", Some(b.negate(nested)));
            vec![b.main(vec![decl])]
        });

        assert_eq!(errors, ["Operands of `+` must share a type, found `int` and `bool`"]);
    }

    #[test]
    fn calls_and_returns() {
        let errors = type_errors(|b| {
            let ret = b.ret(Some(b.read("x")));
            let half = b.function("float", "half", &[("int", "x")], vec![ret]);

            let bare = b.ret(None);
            let greet = b.function("void", "greet", &[], vec![bare]);

            let value = b.ret(Some(b.int(1)));
            let noisy = b.function("void", "noisy", &[], vec![value]);

            let arg = b.println(Some(b.call("half", vec![b.float(2.0)])));
            let void = b.println(Some(b.call("greet", vec![])));
            let void_arg = b.call_statement("half", vec![b.call("greet", vec![])]);
            let main = b.main(vec![arg, void, void_arg]);

            vec![half, greet, noisy, main]
        });

        assert_eq!(
            errors,
            [
                "Return type mismatch in `half`: expected `float`, found `int`",
                "Cannot return a value from void function `noisy`",
                "Argument 1 of `half` expects `int`, found `float`",
                "Values of type `void` cannot be printed",
                "Cannot pass a void value as an argument to `half`",
            ]
        );
    }

    #[test]
    fn indexing_and_conditions() {
        let errors = type_errors(|b| {
            let s = b.declare("string", "s", Some(b.string("hola")));
            let a = b.declare("int[]", "a", Some(b.array(vec![b.int(1)])));
            let c = b.declare("char", "c", Some(b.index("s", b.int(0))));
            let write = b.assign_index("s", b.int(0), b.character('x'));
            let store = b.assign_index("a", b.int(0), b.float(1.0));
            let cond = b.binary(b.index("a", b.int(0)), BinOp::Less, b.length(b.read("a")));
            let ok = b.while_loop(cond, vec![]);
            let bad = b.if_else(b.int(1), vec![], None);
            vec![b.main(vec![s, a, c, write, store, ok, bad])]
        });

        assert_eq!(
            errors,
            [
                "Elements of string `s` cannot be assigned",
                "Type mismatch: expected `int`, found `float`",
                "Condition of `if` must be `bool`, found `int`",
            ]
        );
    }

    #[test]
    fn missing_return_value() {
        let errors = type_errors(|b| {
            let ret = b.ret(None);
            let f = b.function("int", "f", &[], vec![ret]);
            vec![f, b.main(vec![])]
        });

        assert_eq!(errors, ["Function `f` requires a return value"]);
    }

    #[test]
    fn negate_bool() {
        let errors = type_errors(|b| {
            let print = b.println(Some(b.negate(b.boolean(true))));
            vec![b.main(vec![print])]
        });

        assert_eq!(errors, ["Unary minus applies to `int` or `float`, found `bool`"]);
    }

    #[test]
    fn length_of_int() {
        let errors = type_errors(|b| {
            let print = b.println(Some(b.length(b.int(3))));
            vec![b.main(vec![print])]
        });

        assert_eq!(errors, ["`length` applies to strings and arrays, found `int`"]);
    }

    #[test]
    fn bool_arrays_are_rejected() {
        let errors = type_errors(|b| {
            let decl = b.declare("int[]", "a", Some(b.new_array("bool", b.int(2))));
            vec![b.main(vec![decl])]
        });

        assert_eq!(errors, ["Arrays of `bool` are not supported"]);
    }

    #[test]
    fn while_needs_bool() {
        let errors = type_errors(|b| {
            let each = b.while_loop(b.int(1), vec![]);
            vec![b.main(vec![each])]
        });

        assert_eq!(errors, ["Condition of `while` must be `bool`, found `int`"]);
    }
}
