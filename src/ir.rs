//! Representación en bytecode de máquina de pila.
//!
//! Una [`Unit`] contiene todo lo necesario para construir un
//! contenedor ejecutable: nombres, banderas de acceso, firmas,
//! cantidad de locales y el listado de instrucciones de cada función.
//! La serialización del contenedor en sí no forma parte del compilador.

use std::{
    fmt::{self, Display},
    rc::Rc,
};

use bitflags::bitflags;

use crate::semantic::Type;

bitflags! {
    /// Banderas de acceso de una función emitida.
    pub struct AccessFlags: u16 {
        /// Visible desde fuera de la unidad.
        const PUBLIC = 0x0001;

        /// Visible únicamente dentro de la unidad.
        const PRIVATE = 0x0002;

        /// No requiere instancia.
        const STATIC = 0x0008;
    }
}

pub struct Unit {
    pub name: String,
    pub functions: Vec<Function>,
}

impl Unit {
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|function| &*function.name == name)
    }
}

pub struct Function {
    pub name: Rc<str>,
    pub access: AccessFlags,
    pub signature: Signature,

    /// Tamaño del área de locales, incluyendo argumentos.
    pub max_locals: u16,
    pub body: Vec<Instruction>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub parameters: Vec<Type>,
    pub returns: Type,
}

impl Display for Signature {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str("(")?;
        for (i, parameter) in self.parameters.iter().enumerate() {
            if i > 0 {
                fmt.write_str(", ")?;
            }

            write!(fmt, "{}", parameter)?;
        }

        write!(fmt, ") -> {}", self.returns)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Label(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Local(pub u16);

/// Categoría de almacenamiento de un valor en pila o en locales.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    /// Enteros, booleanos y caracteres.
    Int,
    Float,

    /// Cadenas y arreglos.
    Ref,
}

impl Kind {
    pub fn of(typ: Type) -> Kind {
        match typ {
            Type::Float => Kind::Float,
            Type::Int | Type::Bool | Type::Char => Kind::Int,
            _ => Kind::Ref,
        }
    }

    /// Cantidad de slots de local que ocupa.
    pub fn width(self) -> u16 {
        match self {
            Kind::Float => 2,
            Kind::Int | Kind::Ref => 1,
        }
    }
}

/// Tipo de elemento de un arreglo.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Element {
    Int,
    Float,
    Char,
}

impl Element {
    pub fn of(typ: Type) -> Option<Element> {
        match typ {
            Type::Int => Some(Element::Int),
            Type::Float => Some(Element::Float),
            Type::Char => Some(Element::Char),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Int(i32),
    Float(f64),
    Char(char),
    Str(Rc<str>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Arithmetic {
    Add,
    Sub,
    Mul,
    Div,
}

/// Condición de salto. Sobre [`Kind::Ref`] compara por valor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    Less,
    Greater,
    Equal,
    NotEqual,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    SetLabel(Label),
    Jump(Label),

    /// Consume un entero y salta si es cero.
    JumpIfFalse(Label),

    /// Consume dos operandos y salta si la condición se cumple.
    IfCompare(Kind, Condition, Label),

    Push(Constant),
    Pop(Kind),
    Dup,
    Load(Kind, Local),
    Store(Kind, Local),
    LoadArgument(Kind, u16),
    StoreArgument(Kind, u16),
    NewArray(Element),
    ArrayLoad(Element),
    ArrayStore(Element),
    ArrayLength,
    StringLength,
    CharAt,
    Arithmetic(Kind, Arithmetic),
    Negate(Kind),
    Call {
        target: Rc<str>,
        signature: Signature,
    },

    /// `value` es `None` para imprimir solo el fin de línea.
    Print {
        value: Option<Type>,
        newline: bool,
    },

    Return(Option<Kind>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_display() {
        let signature = Signature {
            parameters: vec![Type::Int, Type::FloatArray],
            returns: Type::Void,
        };

        assert_eq!(signature.to_string(), "(int, float[]) -> void");
    }

    #[test]
    fn slot_widths() {
        assert_eq!(Kind::of(Type::Float).width(), 2);
        assert_eq!(Kind::of(Type::Char), Kind::Int);
        assert_eq!(Kind::of(Type::CharArray), Kind::Ref);
    }
}
