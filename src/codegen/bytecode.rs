use std::{collections::HashMap, rc::Rc};

use tracing::{debug, debug_span, info};

use crate::{
    ast::{self, Ast, Block, Call, EntryPoint, Expr, Identifier, Item, Statement},
    ir::{
        AccessFlags, Arithmetic, Condition, Constant, Element, Function, Instruction, Kind, Label,
        Local, Signature, Unit,
    },
    semantic::{resolve_callee, type_of, Analysis, ScopeId, ScopeMap, SymbolId, SymbolTable, Type},
    source::Located,
};

pub fn assemble(ast: &Ast, analysis: &Analysis, name: &str) -> Unit {
    let _span = debug_span!("bytecode", unit = name).entered();
    let (table, scopes) = (analysis.table(), analysis.scopes());

    let functions: Vec<_> = ast
        .program()
        .items
        .iter()
        .filter_map(|item| match item {
            Item::Function(function) => user_function(table, scopes, function),
            Item::Main(entry) => entry_point(table, scopes, entry),
        })
        .collect();

    info!(functions = functions.len(), "unit assembled");

    Unit {
        name: String::from(name),
        functions,
    }
}

fn user_function(table: &SymbolTable, scopes: &ScopeMap, function: &ast::Function) -> Option<Function> {
    let body = function.body.as_ref()?;
    let (_, symbol) = table.function_of(scopes.get(function.id)?)?;

    let parameters: Vec<_> = symbol
        .parameters
        .iter()
        .map(|&parameter| table.symbol(parameter).typ())
        .collect();

    let arguments = symbol
        .parameters
        .iter()
        .enumerate()
        .map(|(index, &parameter)| (parameter, index as u16))
        .collect();

    // Los locales se ubican después del área de argumentos
    let first_local = parameters.iter().map(|&typ| Kind::of(typ).width()).sum();

    let mut emitter = Emitter::new(table, scopes, arguments, first_local);
    emitter.block(body);

    if symbol.returns == Type::Void {
        emitter.push(Instruction::Return(None));
    }

    let signature = Signature {
        parameters,
        returns: symbol.returns,
    };

    debug!(function = %symbol.name, %signature, "function emitted");
    Some(emitter.finish(Rc::from(symbol.name.as_ref()), AccessFlags::PRIVATE | AccessFlags::STATIC, signature))
}

fn entry_point(table: &SymbolTable, scopes: &ScopeMap, entry: &EntryPoint) -> Option<Function> {
    scopes.get(entry.id)?;

    // El slot 0 corresponde a los argumentos de línea de comandos
    let mut emitter = Emitter::new(table, scopes, HashMap::new(), 1);
    emitter.block(&entry.body);
    emitter.push(Instruction::Return(None));

    let signature = Signature {
        parameters: vec![Type::Args],
        returns: Type::Void,
    };

    Some(emitter.finish(Rc::from("main"), AccessFlags::PUBLIC | AccessFlags::STATIC, signature))
}

#[derive(Copy, Clone)]
enum Slot {
    Argument(u16),
    Local(Local),
}

struct Emitter<'a> {
    table: &'a SymbolTable,
    scopes: &'a ScopeMap,
    arguments: HashMap<SymbolId, u16>,
    locals: HashMap<SymbolId, Local>,
    next_local: u16,
    next_label: u32,
    body: Vec<Instruction>,
}

impl<'a> Emitter<'a> {
    fn new(
        table: &'a SymbolTable,
        scopes: &'a ScopeMap,
        arguments: HashMap<SymbolId, u16>,
        first_local: u16,
    ) -> Self {
        Emitter {
            table,
            scopes,
            arguments,
            locals: HashMap::new(),
            next_local: first_local,
            next_label: 0,
            body: Vec::new(),
        }
    }

    fn finish(self, name: Rc<str>, access: AccessFlags, signature: Signature) -> Function {
        Function {
            name,
            access,
            signature,
            max_locals: self.next_local,
            body: self.body,
        }
    }

    fn push(&mut self, instruction: Instruction) {
        self.body.push(instruction);
    }

    fn label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    /// Slot de un símbolo, asignado la primera vez que se encuentra.
    fn local(&mut self, symbol: SymbolId, typ: Type) -> Local {
        let next = &mut self.next_local;
        *self.locals.entry(symbol).or_insert_with(|| {
            let local = Local(*next);
            *next += Kind::of(typ).width();
            local
        })
    }

    fn slot(&mut self, scope: ScopeId, name: &Identifier) -> Option<(Slot, Type)> {
        let symbol = self.table.resolve(scope, name)?;
        let typ = self.table.symbol(symbol).typ();

        let slot = match self.arguments.get(&symbol) {
            Some(&index) => Slot::Argument(index),
            None => Slot::Local(self.local(symbol, typ)),
        };

        Some((slot, typ))
    }

    fn load(&mut self, scope: ScopeId, name: &Identifier) -> Type {
        match self.slot(scope, name) {
            Some((Slot::Argument(index), typ)) => {
                self.push(Instruction::LoadArgument(Kind::of(typ), index));
                typ
            }

            Some((Slot::Local(local), typ)) => {
                self.push(Instruction::Load(Kind::of(typ), local));
                typ
            }

            None => Type::Error,
        }
    }

    fn store(&mut self, scope: ScopeId, name: &Identifier) {
        match self.slot(scope, name) {
            Some((Slot::Argument(index), typ)) => {
                self.push(Instruction::StoreArgument(Kind::of(typ), index))
            }

            Some((Slot::Local(local), typ)) => self.push(Instruction::Store(Kind::of(typ), local)),
            None => (),
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
            Statement::Declaration { name, value, .. } => {
                let symbol = match self.table.local_resolve(scope, name.as_ref()) {
                    Some(symbol) => symbol,
                    None => return,
                };

                let typ = self.table.symbol(symbol).typ();
                let local = self.local(symbol, typ);

                if let Some(value) = value {
                    self.expr(scope, value);
                    self.push(Instruction::Store(Kind::of(typ), local));
                }
            }

            Statement::Assignment {
                target,
                index: None,
                value,
            } => {
                self.expr(scope, value);
                self.store(scope, target.as_ref());
            }

            Statement::Assignment {
                target,
                index: Some(index),
                value,
            } => {
                let array = self.load(scope, target.as_ref());
                self.expr(scope, index);
                self.expr(scope, value);

                if let Some(element) = array.element().and_then(Element::of) {
                    self.push(Instruction::ArrayStore(element));
                }
            }

            Statement::If {
                condition,
                then,
                otherwise,
            } => {
                let skip = self.label();

                self.expr(scope, condition);
                self.push(Instruction::JumpIfFalse(skip));
                self.block(then);

                match otherwise {
                    None => self.push(Instruction::SetLabel(skip)),

                    Some(otherwise) => {
                        let end = self.label();
                        self.push(Instruction::Jump(end));
                        self.push(Instruction::SetLabel(skip));
                        self.block(otherwise);
                        self.push(Instruction::SetLabel(end));
                    }
                }
            }

            Statement::While { condition, body } => {
                let (top, end) = (self.label(), self.label());

                self.push(Instruction::SetLabel(top));
                self.expr(scope, condition);
                self.push(Instruction::JumpIfFalse(end));
                self.block(body);
                self.push(Instruction::Jump(top));
                self.push(Instruction::SetLabel(end));
            }

            Statement::Return { value, .. } => {
                let kind = value.as_ref().map(|value| Kind::of(self.expr(scope, value)));
                self.push(Instruction::Return(kind));
            }

            Statement::Print { newline, value } => {
                let value = value.as_ref().map(|value| self.expr(scope, value));
                self.push(Instruction::Print {
                    value,
                    newline: *newline,
                });
            }

            Statement::Call(call) => {
                // El resultado de una llamada como sentencia se descarta
                let returns = self.call(scope, call);
                if returns != Type::Void {
                    self.push(Instruction::Pop(Kind::of(returns)));
                }
            }
        }
    }

    fn expr(&mut self, scope: ScopeId, expr: &Located<Expr>) -> Type {
        match expr.as_ref() {
            Expr::Int(value) => {
                self.push(Instruction::Push(Constant::Int(*value)));
                Type::Int
            }

            Expr::Float(value) => {
                self.push(Instruction::Push(Constant::Float(*value)));
                Type::Float
            }

            Expr::Bool(value) => {
                self.push(Instruction::Push(Constant::Int(*value as i32)));
                Type::Bool
            }

            Expr::Char(value) => {
                self.push(Instruction::Push(Constant::Char(*value)));
                Type::Char
            }

            Expr::Str(value) => {
                self.push(Instruction::Push(Constant::Str(Rc::from(value.as_str()))));
                Type::String
            }

            Expr::Read(name) => self.load(scope, name.as_ref()),
            Expr::Call(call) => self.call(scope, call),

            Expr::Index { array, index } => {
                let base = self.load(scope, array.as_ref());
                self.expr(scope, index);

                if base == Type::String {
                    self.push(Instruction::CharAt);
                    return Type::Char;
                }

                let element = base.element().unwrap_or(Type::Error);
                if let Some(element) = Element::of(element) {
                    self.push(Instruction::ArrayLoad(element));
                }

                element
            }

            Expr::Length(inner) => {
                let instruction = match self.expr(scope, inner) {
                    Type::String => Instruction::StringLength,
                    _ => Instruction::ArrayLength,
                };

                self.push(instruction);
                Type::Int
            }

            Expr::Paren(inner) => self.expr(scope, inner),

            Expr::Negate(inner) => {
                let typ = self.expr(scope, inner);
                self.push(Instruction::Negate(Kind::of(typ)));
                typ
            }

            Expr::Binary(lhs, op, rhs) => {
                let typ = self.expr(scope, lhs);
                self.expr(scope, rhs);

                let kind = Kind::of(typ);
                let arithmetic = match op {
                    ast::BinOp::Add => Arithmetic::Add,
                    ast::BinOp::Sub => Arithmetic::Sub,
                    ast::BinOp::Mul => Arithmetic::Mul,
                    ast::BinOp::Div => Arithmetic::Div,
                    ast::BinOp::Less => return self.compare(kind, Condition::Less),
                    ast::BinOp::Greater => return self.compare(kind, Condition::Greater),
                    ast::BinOp::Equal => return self.compare(kind, Condition::Equal),
                    ast::BinOp::NotEqual => return self.compare(kind, Condition::NotEqual),
                };

                self.push(Instruction::Arithmetic(kind, arithmetic));
                typ
            }

            Expr::ArrayLiteral(elements) => {
                let element = match elements.first() {
                    Some(first) => type_of(self.table, self.scopes, scope, first),
                    None => return Type::Error,
                };

                let stored = match Element::of(element) {
                    Some(stored) => stored,
                    None => return Type::Error,
                };

                self.push(Instruction::Push(Constant::Int(elements.len() as i32)));
                self.push(Instruction::NewArray(stored));

                for (index, value) in elements.iter().enumerate() {
                    self.push(Instruction::Dup);
                    self.push(Instruction::Push(Constant::Int(index as i32)));
                    self.expr(scope, value);
                    self.push(Instruction::ArrayStore(stored));
                }

                element.array_of().unwrap_or(Type::Error)
            }

            Expr::NewArray { of, size } => {
                self.expr(scope, size);

                let element = of.as_ref().parse::<Type>().unwrap_or(Type::Error);
                if let Some(stored) = Element::of(element) {
                    self.push(Instruction::NewArray(stored));
                }

                element.array_of().unwrap_or(Type::Error)
            }
        }
    }

    /// Consume dos operandos y deja `1` si la condición se cumple, `0` si no.
    fn compare(&mut self, kind: Kind, condition: Condition) -> Type {
        let (yes, done) = (self.label(), self.label());

        self.push(Instruction::IfCompare(kind, condition, yes));
        self.push(Instruction::Push(Constant::Int(0)));
        self.push(Instruction::Jump(done));
        self.push(Instruction::SetLabel(yes));
        self.push(Instruction::Push(Constant::Int(1)));
        self.push(Instruction::SetLabel(done));

        Type::Bool
    }

    fn call(&mut self, scope: ScopeId, call: &Call) -> Type {
        for argument in &call.arguments {
            self.expr(scope, argument);
        }

        let table = self.table;
        let name = call.function.as_ref();

        let function = resolve_callee(table, scope, name)
            .and_then(|id| table.symbol(id).as_function())
            .filter(|function| function.parameters.len() == call.arguments.len());

        let function = match function {
            Some(function) => function,
            None => return Type::Error,
        };

        let signature = Signature {
            parameters: function
                .parameters
                .iter()
                .map(|&parameter| table.symbol(parameter).typ())
                .collect(),
            returns: function.returns,
        };

        self.push(Instruction::Call {
            target: Rc::from(name.as_ref()),
            signature,
        });

        function.returns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinOp;

    #[test]
    fn locals_follow_arguments() {
        let mut b = ast::Builder::new();
        let x = b.declare("float", "x", Some(b.float(0.5)));
        let y = b.declare("int", "y", Some(b.read("a")));
        let ret = b.ret(Some(b.read("y")));
        let f = b.function("int", "f", &[("float", "d"), ("int", "a")], vec![x, y, ret]);
        let main = b.main(vec![]);

        let tree = b.finish(vec![f, main]);
        let unit = tree.analyze().assemble(&tree, "Test").unwrap();

        let f = unit.function("f").unwrap();
        assert_eq!(f.access, AccessFlags::PRIVATE | AccessFlags::STATIC);
        assert_eq!(f.max_locals, 6);
        assert_eq!(
            f.body,
            [
                Instruction::Push(Constant::Float(0.5)),
                Instruction::Store(Kind::Float, Local(3)),
                Instruction::LoadArgument(Kind::Int, 1),
                Instruction::Store(Kind::Int, Local(5)),
                Instruction::Load(Kind::Int, Local(5)),
                Instruction::Return(Some(Kind::Int)),
            ]
        );

        let main = unit.function("main").unwrap();
        assert_eq!(main.access, AccessFlags::PUBLIC | AccessFlags::STATIC);
        assert_eq!(main.signature.parameters, [Type::Args]);
        assert_eq!(main.max_locals, 1);
        assert_eq!(main.body, [Instruction::Return(None)]);
    }

    #[test]
    fn while_loop_with_comparison() {
        let mut b = ast::Builder::new();
        let i = b.declare("int", "i", Some(b.int(0)));
        let step = b.assign("i", b.binary(b.read("i"), BinOp::Add, b.int(1)));
        let cond = b.binary(b.read("i"), BinOp::Less, b.int(3));
        let each = b.while_loop(cond, vec![step]);
        let main = b.main(vec![i, each]);

        let tree = b.finish(vec![main]);
        let unit = tree.analyze().assemble(&tree, "Loop").unwrap();

        use Instruction::*;
        assert_eq!(
            unit.function("main").unwrap().body,
            [
                Push(Constant::Int(0)),
                Store(Kind::Int, Local(1)),
                SetLabel(Label(0)),
                Load(Kind::Int, Local(1)),
                Push(Constant::Int(3)),
                IfCompare(Kind::Int, Condition::Less, Label(2)),
                Push(Constant::Int(0)),
                Jump(Label(3)),
                SetLabel(Label(2)),
                Push(Constant::Int(1)),
                SetLabel(Label(3)),
                JumpIfFalse(Label(1)),
                Load(Kind::Int, Local(1)),
                Push(Constant::Int(1)),
                Arithmetic(Kind::Int, crate::ir::Arithmetic::Add),
                Store(Kind::Int, Local(1)),
                Jump(Label(0)),
                SetLabel(Label(1)),
                Return(None),
            ]
        );
    }

    #[test]
    fn if_else_layout() {
        let mut b = ast::Builder::new();
        let yes = b.println(Some(b.int(1)));
        let no = b.println(Some(b.int(2)));
        let branch = b.if_else(b.boolean(true), vec![yes], Some(vec![no]));
        let main = b.main(vec![branch]);

        let tree = b.finish(vec![main]);
        let unit = tree.analyze().assemble(&tree, "Branch").unwrap();

        use Instruction::*;
        let print = Print {
            value: Some(Type::Int),
            newline: true,
        };

        assert_eq!(
            unit.function("main").unwrap().body,
            [
                Push(Constant::Int(1)),
                JumpIfFalse(Label(0)),
                Push(Constant::Int(1)),
                print.clone(),
                Jump(Label(1)),
                SetLabel(Label(0)),
                Push(Constant::Int(2)),
                print,
                SetLabel(Label(1)),
                Return(None),
            ]
        );
    }

    #[test]
    fn if_without_else() {
        let mut b = ast::Builder::new();
        let yes = b.println(Some(b.int(1)));
        let branch = b.if_else(b.boolean(false), vec![yes], None);
        let main = b.main(vec![branch]);

        let tree = b.finish(vec![main]);
        let unit = tree.analyze().assemble(&tree, "Branch").unwrap();

        use Instruction::*;
        assert_eq!(
            unit.function("main").unwrap().body,
            [
                Push(Constant::Int(0)),
                JumpIfFalse(Label(0)),
                Push(Constant::Int(1)),
                Print {
                    value: Some(Type::Int),
                    newline: true,
                },
                SetLabel(Label(0)),
                Return(None),
            ]
        );
    }

    #[test]
    fn arrays_and_discarded_results() {
        let mut b = ast::Builder::new();
        let ret = b.ret(Some(b.int(7)));
        let seven = b.function("int", "seven", &[], vec![ret]);

        let a = b.declare("char[]", "a", Some(b.array(vec![b.character('o'), b.character('k')])));
        let call = b.call_statement("seven", vec![]);
        let print = b.println(Some(b.length(b.read("a"))));
        let main = b.main(vec![a, call, print]);

        let tree = b.finish(vec![seven, main]);
        let unit = tree.analyze().assemble(&tree, "Arrays").unwrap();

        use Instruction::*;
        let signature = Signature {
            parameters: vec![],
            returns: Type::Int,
        };

        assert_eq!(
            unit.function("main").unwrap().body,
            [
                Push(Constant::Int(2)),
                NewArray(Element::Char),
                Dup,
                Push(Constant::Int(0)),
                Push(Constant::Char('o')),
                ArrayStore(Element::Char),
                Dup,
                Push(Constant::Int(1)),
                Push(Constant::Char('k')),
                ArrayStore(Element::Char),
                Store(Kind::Ref, Local(1)),
                Call {
                    target: Rc::from("seven"),
                    signature,
                },
                Pop(Kind::Int),
                Load(Kind::Ref, Local(1)),
                ArrayLength,
                Print {
                    value: Some(Type::Int),
                    newline: true,
                },
                Return(None),
            ]
        );
    }
}
