//! Árbol sintáctico.
//!
//! El parser externo entrega un árbol cerrado compuesto por los tipos de
//! este módulo. Los nodos que abren o consultan un ámbito (el programa,
//! los puntos de entrada, las funciones, los bloques y los `return`)
//! llevan un [`NodeId`] estable asignado durante el parsing, el cual
//! indexa al [`crate::semantic::ScopeMap`].
//!
//! [`Builder`] es la interfaz de construcción: asigna identificadores
//! de nodo consecutivos y ubicaciones a medida que el parser avanza.

use std::{
    fmt::{self, Display},
    rc::Rc,
};

use crate::source::{Located, Location};

/// Identificador estable de un nodo.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Un identificador del lenguaje fuente.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(Rc<str>);

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier(Rc::from(name))
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

/// Nombre de tipo tal como aparece en el código, por ejemplo `int[]`.
pub type TypeName = Located<String>;

/// Árbol completo de una unidad de compilación.
#[derive(Debug)]
pub struct Ast {
    program: Program,
    nodes: u32,
}

impl Ast {
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Cantidad de identificadores de nodo asignados.
    pub fn node_count(&self) -> usize {
        self.nodes as usize
    }
}

#[derive(Debug)]
pub struct Program {
    pub id: NodeId,
    pub items: Vec<Item>,
}

#[derive(Debug)]
pub enum Item {
    Function(Function),
    Main(EntryPoint),
}

#[derive(Debug)]
pub struct Function {
    pub id: NodeId,
    pub name: Located<Identifier>,
    pub returns: TypeName,
    pub parameters: Vec<Parameter>,

    /// `None` si el parser no encontró un cuerpo delimitado por llaves.
    pub body: Option<Block>,
}

#[derive(Debug)]
pub struct Parameter {
    pub name: Located<Identifier>,
    pub of: TypeName,
}

impl Parameter {
    /// Empareja los tokens de tipo y de nombre de un encabezado de función.
    ///
    /// En el encabezado se intercalan tokens de tipo y de nombre. Si la
    /// función retorna `void`, todos los tokens de tipo pertenecen a
    /// parámetros; en otro caso el primero es el tipo de retorno y se omite.
    pub fn pair(returns: &str, types: Vec<TypeName>, names: Vec<Located<Identifier>>) -> Vec<Self> {
        let skip = if returns == "void" { 0 } else { 1 };

        types
            .into_iter()
            .skip(skip)
            .zip(names)
            .map(|(of, name)| Parameter { name, of })
            .collect()
    }
}

/// La rutina principal implícita del programa.
#[derive(Debug)]
pub struct EntryPoint {
    pub id: NodeId,
    pub location: Location,
    pub body: Block,
}

#[derive(Debug)]
pub struct Block {
    pub id: NodeId,
    pub statements: Vec<Statement>,
}

#[derive(Debug)]
pub enum Statement {
    Declaration {
        of: TypeName,
        name: Located<Identifier>,
        value: Option<Located<Expr>>,
    },

    /// Asignación simple, o a un elemento si `index` está presente.
    Assignment {
        target: Located<Identifier>,
        index: Option<Located<Expr>>,
        value: Located<Expr>,
    },

    If {
        condition: Located<Expr>,
        then: Block,
        otherwise: Option<Block>,
    },

    While {
        condition: Located<Expr>,
        body: Block,
    },

    Return {
        id: NodeId,
        location: Location,
        value: Option<Located<Expr>>,
    },

    /// `print` o `println`.
    Print {
        newline: bool,
        value: Option<Located<Expr>>,
    },

    Call(Call),
}

#[derive(Debug)]
pub struct Call {
    pub function: Located<Identifier>,
    pub arguments: Vec<Located<Expr>>,
}

#[derive(Debug)]
pub enum Expr {
    Int(i32),
    Float(f64),
    Bool(bool),
    Char(char),
    Str(String),
    Read(Located<Identifier>),
    Call(Call),
    Index {
        array: Located<Identifier>,
        index: Box<Located<Expr>>,
    },
    Length(Box<Located<Expr>>),
    Paren(Box<Located<Expr>>),
    Negate(Box<Located<Expr>>),
    Binary(Box<Located<Expr>>, BinOp, Box<Located<Expr>>),
    ArrayLiteral(Vec<Located<Expr>>),
    NewArray {
        of: TypeName,
        size: Box<Located<Expr>>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Less,
    Greater,
    Equal,
    NotEqual,
}

impl BinOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div)
    }

    pub fn is_relational(self) -> bool {
        matches!(self, BinOp::Less | BinOp::Greater)
    }
}

impl Display for BinOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Less => "<",
            BinOp::Greater => ">",
            BinOp::Equal => "==",
            BinOp::NotEqual => "!=",
        };

        fmt.write_str(string)
    }
}

/// Construcción incremental de un [`Ast`].
///
/// Cada nodo creado toma la ubicación actual del builder, la cual el
/// parser actualiza con [`Builder::at()`] antes de construir cada nodo.
pub struct Builder {
    next: u32,
    location: Location,
}

impl Default for Builder {
    fn default() -> Self {
        Builder {
            next: 0,
            location: Location::default(),
        }
    }
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fija la ubicación de los siguientes nodos.
    pub fn at(&mut self, location: Location) -> &mut Self {
        self.location = location;
        self
    }

    /// Asigna un nuevo identificador de nodo.
    pub fn id(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }

    pub fn finish(mut self, items: Vec<Item>) -> Ast {
        let id = self.id();
        Ast {
            program: Program { id, items },
            nodes: self.next,
        }
    }

    fn located<T>(&self, value: T) -> Located<T> {
        Located::at(value, self.location.clone())
    }

    pub fn name(&self, name: &str) -> Located<Identifier> {
        self.located(Identifier::from(name))
    }

    pub fn type_name(&self, name: &str) -> TypeName {
        self.located(String::from(name))
    }

    /// Declaración de función. `parameters` se compone de pares `(tipo, nombre)`.
    pub fn function(
        &mut self,
        returns: &str,
        name: &str,
        parameters: &[(&str, &str)],
        body: Vec<Statement>,
    ) -> Item {
        let id = self.id();
        let parameters = parameters
            .iter()
            .map(|(of, name)| Parameter {
                name: self.name(name),
                of: self.type_name(of),
            })
            .collect();

        let body = Some(self.block(body));
        Item::Function(Function {
            id,
            name: self.name(name),
            returns: self.type_name(returns),
            parameters,
            body,
        })
    }

    pub fn main(&mut self, body: Vec<Statement>) -> Item {
        let id = self.id();
        Item::Main(EntryPoint {
            id,
            location: self.location.clone(),
            body: self.block(body),
        })
    }

    pub fn block(&mut self, statements: Vec<Statement>) -> Block {
        Block {
            id: self.id(),
            statements,
        }
    }

    pub fn declare(&mut self, of: &str, name: &str, value: Option<Located<Expr>>) -> Statement {
        Statement::Declaration {
            of: self.type_name(of),
            name: self.name(name),
            value,
        }
    }

    pub fn assign(&mut self, target: &str, value: Located<Expr>) -> Statement {
        Statement::Assignment {
            target: self.name(target),
            index: None,
            value,
        }
    }

    pub fn assign_index(&mut self, target: &str, index: Located<Expr>, value: Located<Expr>) -> Statement {
        Statement::Assignment {
            target: self.name(target),
            index: Some(index),
            value,
        }
    }

    pub fn if_else(
        &mut self,
        condition: Located<Expr>,
        then: Vec<Statement>,
        otherwise: Option<Vec<Statement>>,
    ) -> Statement {
        let then = self.block(then);
        let otherwise = otherwise.map(|statements| self.block(statements));

        Statement::If {
            condition,
            then,
            otherwise,
        }
    }

    pub fn while_loop(&mut self, condition: Located<Expr>, body: Vec<Statement>) -> Statement {
        Statement::While {
            condition,
            body: self.block(body),
        }
    }

    pub fn ret(&mut self, value: Option<Located<Expr>>) -> Statement {
        Statement::Return {
            id: self.id(),
            location: self.location.clone(),
            value,
        }
    }

    pub fn print(&mut self, value: Option<Located<Expr>>) -> Statement {
        Statement::Print {
            newline: false,
            value,
        }
    }

    pub fn println(&mut self, value: Option<Located<Expr>>) -> Statement {
        Statement::Print {
            newline: true,
            value,
        }
    }

    pub fn call_statement(&mut self, function: &str, arguments: Vec<Located<Expr>>) -> Statement {
        Statement::Call(Call {
            function: self.name(function),
            arguments,
        })
    }

    pub fn int(&self, value: i32) -> Located<Expr> {
        self.located(Expr::Int(value))
    }

    pub fn float(&self, value: f64) -> Located<Expr> {
        self.located(Expr::Float(value))
    }

    pub fn boolean(&self, value: bool) -> Located<Expr> {
        self.located(Expr::Bool(value))
    }

    pub fn character(&self, value: char) -> Located<Expr> {
        self.located(Expr::Char(value))
    }

    pub fn string(&self, value: &str) -> Located<Expr> {
        self.located(Expr::Str(String::from(value)))
    }

    pub fn read(&self, name: &str) -> Located<Expr> {
        self.located(Expr::Read(self.name(name)))
    }

    pub fn call(&self, function: &str, arguments: Vec<Located<Expr>>) -> Located<Expr> {
        self.located(Expr::Call(Call {
            function: self.name(function),
            arguments,
        }))
    }

    pub fn index(&self, array: &str, index: Located<Expr>) -> Located<Expr> {
        self.located(Expr::Index {
            array: self.name(array),
            index: Box::new(index),
        })
    }

    pub fn length(&self, of: Located<Expr>) -> Located<Expr> {
        self.located(Expr::Length(Box::new(of)))
    }

    pub fn paren(&self, inner: Located<Expr>) -> Located<Expr> {
        self.located(Expr::Paren(Box::new(inner)))
    }

    pub fn negate(&self, operand: Located<Expr>) -> Located<Expr> {
        self.located(Expr::Negate(Box::new(operand)))
    }

    /// La ubicación de una operación binaria cubre ambos operandos.
    pub fn binary(&self, lhs: Located<Expr>, op: BinOp, rhs: Located<Expr>) -> Located<Expr> {
        let location = Location::span(lhs.location().clone(), rhs.location());
        Located::at(Expr::Binary(Box::new(lhs), op, Box::new(rhs)), location)
    }

    pub fn array(&self, elements: Vec<Located<Expr>>) -> Located<Expr> {
        self.located(Expr::ArrayLiteral(elements))
    }

    pub fn new_array(&self, of: &str, size: Located<Expr>) -> Located<Expr> {
        self.located(Expr::NewArray {
            of: self.type_name(of),
            size: Box::new(size),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Position, Source};

    #[test]
    fn node_ids_are_dense() {
        let mut builder = Builder::new();
        let ret = builder.ret(None);
        let main = builder.main(vec![ret]);
        let ast = builder.finish(vec![main]);

        assert_eq!(ast.node_count(), 4);
        assert_eq!(ast.program().id.index(), 3);
    }

    #[test]
    fn header_pairing_skips_return_type() {
        let builder = Builder::new();
        let types = vec![builder.type_name("int"), builder.type_name("int"), builder.type_name("float")];
        let names = vec![builder.name("a"), builder.name("b")];

        let parameters = Parameter::pair("int", types, names);
        let pairs: Vec<_> = parameters
            .iter()
            .map(|p| (p.of.as_ref().as_str(), p.name.as_ref().as_ref()))
            .collect();

        assert_eq!(pairs, [("int", "a"), ("float", "b")]);
    }

    #[test]
    fn binary_spans_operands() {
        let source = Source::new("span.ofp", "x = a + bc;\n");
        let mut builder = Builder::new();

        builder.at(Location::at(source.clone(), 1, 5));
        let lhs = builder.read("a");
        builder.at(Location::new(source, Position::new(1, 9), Position::new(1, 11)));
        let rhs = builder.read("bc");

        let sum = builder.binary(lhs, BinOp::Add, rhs);
        assert_eq!(sum.location().to_string(), "span.ofp:[1:5-1:10]");
    }

    #[test]
    fn header_pairing_void() {
        let builder = Builder::new();
        let types = vec![builder.type_name("char")];
        let names = vec![builder.name("c")];

        assert_eq!(Parameter::pair("void", types, names).len(), 1);
    }
}
