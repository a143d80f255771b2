//! Análisis semántico.
//!
//! El análisis consta de tres pasadas completas e independientes sobre
//! el árbol. La primera construye la tabla de símbolos y el mapa de
//! ámbitos, la segunda verifica referencias a variables y funciones y
//! la tercera calcula y valida el tipo de cada expresión. Cada pasada
//! acumula sus errores en una colección [`Diagnostics`] propia y
//! nunca aborta ante un error individual.

use thiserror::Error;

use crate::{
    ast::{Ast, BinOp, Identifier},
    error::Diagnostics,
};

mod builder;
mod refs;
mod scope;
mod typeck;
mod types;

pub use scope::{FunctionSymbol, Scope, ScopeId, ScopeMap, Symbol, SymbolId, SymbolTable};
pub use types::{Type, UnknownType};

pub(crate) use refs::resolve_callee;
pub(crate) use typeck::type_of;

/// Errores de declaración.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DeclarationError {
    #[error("Function `main` is already defined")]
    DuplicateMain,

    #[error("Function `{0}` is already defined")]
    DuplicateFunction(Identifier),

    #[error("Function `{0}` has no body")]
    MissingBody(Identifier),

    #[error("Parameter `{0}` is declared more than once")]
    DuplicateParameter(Identifier),

    #[error("Variable `{0}` is already declared in this scope")]
    DuplicateVariable(Identifier),

    #[error("Unknown type `{0}`")]
    UnknownType(String),
}

/// Errores de referencia.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("Function `{0}` is not declared")]
    UndefinedFunction(Identifier),

    #[error("Function `{function}` expects {expected} arguments, but {found} were provided")]
    Arity {
        function: Identifier,
        expected: usize,
        found: usize,
    },

    #[error("Variable `{0}` is not declared in this scope")]
    UndefinedVariable(Identifier),

    #[error("Expected variable, found function `{0}`")]
    ExpectedVar(Identifier),

    #[error("Assignment to `{0}` is not allowed in the global scope")]
    GlobalAssignment(Identifier),

    #[error("`return` used outside of a function")]
    ReturnOutsideFunction,
}

/// Errores de tipos.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TypeError {
    #[error("Type mismatch: expected `{expected}`, found `{found}`")]
    ExpectedType { expected: Type, found: Type },

    #[error("Cannot pass a void value as an argument to `{0}`")]
    VoidArgument(Identifier),

    #[error("Argument {position} of `{function}` expects `{expected}`, found `{found}`")]
    ArgumentMismatch {
        function: Identifier,
        position: usize,
        expected: Type,
        found: Type,
    },

    #[error("Cannot return a value from void function `{0}`")]
    VoidReturnValue(Identifier),

    #[error("Function `{0}` requires a return value")]
    MissingReturnValue(Identifier),

    #[error("Return type mismatch in `{function}`: expected `{expected}`, found `{found}`")]
    ReturnMismatch {
        function: Identifier,
        expected: Type,
        found: Type,
    },

    #[error("Cannot assign a void value to `{0}`")]
    VoidAssignment(Identifier),

    #[error("Elements of string `{0}` cannot be assigned")]
    ImmutableString(Identifier),

    #[error("Type `{0}` cannot be indexed")]
    NotIndexable(Type),

    #[error("`length` applies to strings and arrays, found `{0}`")]
    NoLength(Type),

    #[error("Unary minus applies to `int` or `float`, found `{0}`")]
    NotNumeric(Type),

    #[error("Cannot use a void value as an operand of `{0}`")]
    VoidOperand(BinOp),

    #[error("Operands of `{0}` must share a type, found `{1}` and `{2}`")]
    OperandMismatch(BinOp, Type, Type),

    #[error("Operator `{0}` is not defined for `{1}`")]
    InvalidOperands(BinOp, Type),

    #[error("Array elements must share a type")]
    MixedArray,

    #[error("Array literals must have at least one element")]
    EmptyArray,

    #[error("Arrays of `{0}` are not supported")]
    InvalidElement(Type),

    #[error("Unknown type `{0}`")]
    UnknownType(String),

    #[error("Condition of `{0}` must be `bool`, found `{1}`")]
    Condition(&'static str, Type),

    #[error("Values of type `{0}` cannot be printed")]
    NotPrintable(Type),
}

/// Resultado de las tres pasadas de análisis.
pub struct Analysis {
    table: SymbolTable,
    scopes: ScopeMap,
    declarations: Diagnostics,
    references: Diagnostics,
    types: Diagnostics,
}

impl Analysis {
    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub fn scopes(&self) -> &ScopeMap {
        &self.scopes
    }

    pub fn declaration_errors(&self) -> &Diagnostics {
        &self.declarations
    }

    pub fn reference_errors(&self) -> &Diagnostics {
        &self.references
    }

    pub fn type_errors(&self) -> &Diagnostics {
        &self.types
    }

    /// Colecciones de diagnósticos en orden de pasada.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostics> {
        [&self.declarations, &self.references, &self.types].into_iter()
    }

    /// Total de errores entre todas las pasadas.
    pub fn error_count(&self) -> usize {
        self.diagnostics().map(Diagnostics::len).sum()
    }
}

impl Ast {
    /// Ejecuta el análisis semántico completo.
    pub fn analyze(&self) -> Analysis {
        let (table, scopes, declarations) = builder::build(self);
        let references = refs::check(self, &table, &scopes);
        let types = typeck::check(self, &table, &scopes);

        Analysis {
            table,
            scopes,
            declarations,
            references,
            types,
        }
    }
}
