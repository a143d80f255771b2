use std::fmt::{self, Write};

use tracing::{debug_span, info};

use crate::{
    ast::{Ast, BinOp, Block, Call, EntryPoint, Expr, Function, Item, Statement},
    semantic::{type_of, Analysis, ScopeId, ScopeMap, SymbolTable, Type},
    source::Located,
};

/// Identificadores de Python que no pueden usarse como nombres.
const RESERVED: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield", "ArithmeticError", "AssertionError", "AttributeError",
    "BaseException", "BlockingIOError", "BrokenPipeError", "BufferError", "BytesWarning",
    "ChildProcessError", "ConnectionAbortedError", "ConnectionError", "ConnectionRefusedError",
    "ConnectionResetError", "DeprecationWarning", "EOFError", "Ellipsis", "EnvironmentError",
    "Exception", "FileExistsError", "FileNotFoundError", "FloatingPointError", "FutureWarning",
    "GeneratorExit", "IOError", "ImportError", "ImportWarning", "IndentationError",
    "IndexError", "InterruptedError", "IsADirectoryError", "KeyError", "KeyboardInterrupt",
    "LookupError", "MemoryError", "NameError", "NotADirectoryError", "NotImplemented",
    "NotImplementedError", "OSError", "OverflowError", "PendingDeprecationWarning",
    "PermissionError", "ProcessLookupError", "RecursionError", "ReferenceError",
    "ResourceWarning", "RuntimeError", "RuntimeWarning", "StopAsyncIteration", "StopIteration",
    "SyntaxError", "SyntaxWarning", "SystemError", "SystemExit", "TabError", "TimeoutError",
    "TypeError", "UnboundLocalError", "UnicodeDecodeError", "UnicodeEncodeError",
    "UnicodeError", "UnicodeTranslateError", "UnicodeWarning", "UserWarning", "ValueError",
    "Warning", "ZeroDivisionError", "__build_class__", "__debug__", "__doc__", "__import__",
    "__loader__", "__name__", "__package__", "__spec__", "abs", "all", "any", "ascii", "bin",
    "bool", "bytearray", "bytes", "callable", "chr", "classmethod", "compile", "complex",
    "copyright", "credits", "delattr", "dict", "dir", "divmod", "enumerate", "eval", "exec",
    "exit", "filter", "float", "format", "frozenset", "getattr", "globals", "hasattr", "hash",
    "help", "hex", "id", "input", "int", "isinstance", "issubclass", "iter", "len", "license",
    "list", "locals", "map", "max", "memoryview", "min", "next", "object", "oct", "open", "ord",
    "pow", "print", "property", "quit", "range", "repr", "reversed", "round", "set", "setattr",
    "slice", "sorted", "staticmethod", "str", "sum", "super", "tuple", "type", "vars", "zip",
];

const INDENT: usize = 4;

pub fn transpile<W: Write>(ast: &Ast, analysis: &Analysis, output: &mut W) -> fmt::Result {
    let _span = debug_span!("python").entered();

    let mut transpiler = Transpiler {
        output,
        depth: 0,
        table: analysis.table(),
        scopes: analysis.scopes(),
    };

    // Las definiciones de funciones preceden al código de nivel superior
    let items = &ast.program().items;
    for item in items {
        if let Item::Function(function) = item {
            transpiler.function(function)?;
        }
    }

    for item in items {
        if let Item::Main(entry) = item {
            transpiler.entry_point(entry)?;
        }
    }

    info!("python emitted");
    Ok(())
}

/// Nombre seguro para Python.
///
/// Los nombres prefijados pueden coincidir con un nombre del programa que
/// ya empiece con `ofp_`; esos se dejan intactos.
fn safe(name: &str) -> String {
    if RESERVED.contains(&name) {
        format!("ofp_{}", name)
    } else {
        String::from(name)
    }
}

fn quote<I: IntoIterator<Item = char>>(text: I) -> String {
    let mut quoted = String::from("'");
    for c in text {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            '\r' => quoted.push_str("\\r"),
            _ => quoted.push(c),
        }
    }

    quoted.push('\'');
    quoted
}

struct Transpiler<'a, W> {
    output: &'a mut W,
    depth: usize,
    table: &'a SymbolTable,
    scopes: &'a ScopeMap,
}

impl<W: Write> Transpiler<'_, W> {
    fn output(&mut self) -> &mut W {
        &mut *self.output
    }

    fn indent(&mut self) -> fmt::Result {
        write!(self.output, "{:1$}", "", self.depth * INDENT)
    }

    fn function(&mut self, function: &Function) -> fmt::Result {
        let table = self.table;
        let body = function.body.as_ref();
        let symbol = self.scopes.get(function.id).and_then(|scope| table.function_of(scope));

        let (body, (_, symbol)) = match (body, symbol) {
            (Some(body), Some(symbol)) => (body, symbol),
            _ => return Ok(()),
        };

        let parameters: Vec<_> = symbol
            .parameters
            .iter()
            .map(|&parameter| safe(table.symbol(parameter).name().as_ref()))
            .collect();

        emit!(self, "def {}({}):", safe(symbol.name.as_ref()), parameters.join(", "))?;
        self.block(body)?;
        emit!(self)
    }

    fn entry_point(&mut self, entry: &EntryPoint) -> fmt::Result {
        if self.scopes.get(entry.id).is_some() {
            self.statements(&entry.body)?;
        }

        Ok(())
    }

    /// Bloque indentado un nivel más que su encabezado.
    fn block(&mut self, block: &Block) -> fmt::Result {
        self.depth += 1;
        let result = self.statements(block);
        self.depth -= 1;

        result
    }

    fn statements(&mut self, block: &Block) -> fmt::Result {
        if block.statements.is_empty() {
            return emit!(self, "pass");
        }

        let scope = self.scopes.scope_of(block.id);
        for statement in &block.statements {
            self.statement(scope, statement)?;
        }

        Ok(())
    }

    fn statement(&mut self, scope: ScopeId, statement: &Statement) -> fmt::Result {
        match statement {
            Statement::Declaration { name, value, .. } => {
                let value = match value {
                    Some(value) => self.expr(scope, value),
                    None => String::from("None"),
                };

                emit!(self, "{} = {}", safe(name.as_ref().as_ref()), value)
            }

            Statement::Assignment {
                target,
                index,
                value,
            } => {
                let target = safe(target.as_ref().as_ref());
                let value = self.expr(scope, value);

                match index {
                    Some(index) => {
                        let index = self.expr(scope, index);
                        emit!(self, "{}[{}] = {}", target, index, value)
                    }

                    None => emit!(self, "{} = {}", target, value),
                }
            }

            Statement::If {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.expr(scope, condition);
                emit!(self, "if {}:", condition)?;
                self.block(then)?;

                // Un `else` cuyo único contenido es otro `if` se reduce a `elif`
                let mut otherwise = otherwise.as_ref();
                while let Some(block) = otherwise {
                    match block.statements.as_slice() {
                        [Statement::If {
                            condition,
                            then,
                            otherwise: next,
                        }] => {
                            let scope = self.scopes.scope_of(block.id);
                            let condition = self.expr(scope, condition);

                            emit!(self, "elif {}:", condition)?;
                            self.block(then)?;
                            otherwise = next.as_ref();
                        }

                        _ => {
                            emit!(self, "else:")?;
                            self.block(block)?;
                            break;
                        }
                    }
                }

                Ok(())
            }

            Statement::While { condition, body } => {
                let condition = self.expr(scope, condition);
                emit!(self, "while {}:", condition)?;
                self.block(body)
            }

            Statement::Return { value: None, .. } => emit!(self, "return"),

            Statement::Return {
                value: Some(value), ..
            } => {
                let value = self.expr(scope, value);
                emit!(self, "return {}", value)
            }

            Statement::Print { newline, value } => {
                let value = value.as_ref().map(|value| self.expr(scope, value));
                match (value, *newline) {
                    (Some(value), true) => emit!(self, "print({})", value),
                    (Some(value), false) => emit!(self, "print({}, end='')", value),
                    (None, true) => emit!(self, "print()"),
                    (None, false) => emit!(self, "print(end='')"),
                }
            }

            Statement::Call(call) => {
                let call = self.call(scope, call);
                emit!(self, "{}", call)
            }
        }
    }

    fn call(&self, scope: ScopeId, call: &Call) -> String {
        let arguments: Vec<_> = call
            .arguments
            .iter()
            .map(|argument| self.expr(scope, argument))
            .collect();

        format!("{}({})", safe(call.function.as_ref().as_ref()), arguments.join(", "))
    }

    fn expr(&self, scope: ScopeId, expr: &Located<Expr>) -> String {
        match expr.as_ref() {
            Expr::Int(value) => value.to_string(),
            Expr::Float(value) => format!("{:?}", value),
            Expr::Bool(true) => String::from("True"),
            Expr::Bool(false) => String::from("False"),
            Expr::Char(value) => quote(Some(*value)),
            Expr::Str(value) => quote(value.chars()),
            Expr::Read(name) => safe(name.as_ref().as_ref()),
            Expr::Call(call) => self.call(scope, call),

            Expr::Index { array, index } => {
                format!("{}[{}]", safe(array.as_ref().as_ref()), self.expr(scope, index))
            }

            Expr::Length(inner) => format!("len({})", self.expr(scope, inner)),
            Expr::Paren(inner) => format!("({})", self.expr(scope, inner)),
            Expr::Negate(inner) => format!("-{}", self.expr(scope, inner)),

            Expr::Binary(lhs, op, rhs) => {
                let (left, right) = (self.expr(scope, lhs), self.expr(scope, rhs));

                // La división entera trunca igual que en bytecode
                if *op == BinOp::Div && type_of(self.table, self.scopes, scope, lhs) == Type::Int {
                    format!("int({} / {})", left, right)
                } else {
                    format!("{} {} {}", left, op, right)
                }
            }

            Expr::ArrayLiteral(elements) => {
                let elements: Vec<_> = elements
                    .iter()
                    .map(|element| self.expr(scope, element))
                    .collect();

                format!("[{}]", elements.join(", "))
            }

            Expr::NewArray { of, size } => {
                let zero = match of.as_ref().parse::<Type>() {
                    Ok(Type::Float) => "0.0",
                    _ => "0",
                };

                format!("[{}] * {}", zero, self.expr(scope, size))
            }
        }
    }
}
