use std::{
    fmt::{self, Display},
    str::FromStr,
};

/// Tipos estáticos del lenguaje.
///
/// Dos tipos son compatibles únicamente si son la misma variante, no
/// existen conversiones implícitas. `Error` es el centinela que produce
/// toda expresión mal tipada, mientras que `Args` solo aparece en la
/// firma de la rutina principal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Float,
    Bool,
    Char,
    String,
    IntArray,
    FloatArray,
    CharArray,
    Void,
    Error,
    Args,
}

impl Type {
    /// Tipo de los elementos de un arreglo o de una cadena.
    pub fn element(self) -> Option<Type> {
        match self {
            Type::IntArray => Some(Type::Int),
            Type::FloatArray => Some(Type::Float),
            Type::CharArray | Type::String => Some(Type::Char),
            Type::Args => Some(Type::String),
            _ => None,
        }
    }

    /// Tipo de arreglo cuyos elementos son de este tipo.
    pub fn array_of(self) -> Option<Type> {
        match self {
            Type::Int => Some(Type::IntArray),
            Type::Float => Some(Type::FloatArray),
            Type::Char => Some(Type::CharArray),
            _ => None,
        }
    }

    pub fn is_array(self) -> bool {
        matches!(self, Type::IntArray | Type::FloatArray | Type::CharArray)
    }

    /// Tipos admitidos como elementos de un arreglo.
    pub fn is_scalar(self) -> bool {
        matches!(self, Type::Int | Type::Float | Type::Char)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }
}

/// Un nombre de tipo que no pertenece al lenguaje.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownType;

impl FromStr for Type {
    type Err = UnknownType;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let typ = match name {
            "int" => Type::Int,
            "float" => Type::Float,
            "bool" => Type::Bool,
            "char" => Type::Char,
            "string" => Type::String,
            "int[]" => Type::IntArray,
            "float[]" => Type::FloatArray,
            "char[]" => Type::CharArray,
            "void" => Type::Void,
            _ => return Err(UnknownType),
        };

        Ok(typ)
    }
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Int => "int",
            Type::Float => "float",
            Type::Bool => "bool",
            Type::Char => "char",
            Type::String => "string",
            Type::IntArray => "int[]",
            Type::FloatArray => "float[]",
            Type::CharArray => "char[]",
            Type::Void => "void",
            Type::Error => "error",
            Type::Args => "string[]",
        };

        fmt.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for name in ["int", "float", "bool", "char", "string", "int[]", "float[]", "char[]", "void"] {
            let typ: Type = name.parse().unwrap();
            assert_eq!(typ.to_string(), name);
        }
    }

    #[test]
    fn internal_types_are_not_nameable() {
        assert_eq!("error".parse::<Type>(), Err(UnknownType));
        assert_eq!("string[]".parse::<Type>(), Err(UnknownType));
        assert_eq!("Int".parse::<Type>(), Err(UnknownType));
    }

    #[test]
    fn element_types() {
        assert_eq!(Type::String.element(), Some(Type::Char));
        assert_eq!(Type::FloatArray.element(), Some(Type::Float));
        assert_eq!(Type::Bool.array_of(), None);
        assert_eq!(Type::Char.array_of(), Some(Type::CharArray));
    }
}
