//! Núcleo semántico y generación de código para el lenguaje OFP.
//!
//! # Front end
//! El análisis léxico y sintáctico es externo a este crate. Un parser
//! construye el árbol descrito en [`ast`] por medio de [`ast::Builder`],
//! el cual asigna identificadores de nodo y ubicaciones en el código
//! fuente de [`source`]. El árbol es procesado por análisis semántico en
//! [`semantic`]: construcción de la tabla de símbolos, verificación de
//! referencias y verificación de tipos. Los errores de cada pasada se
//! acumulan en colecciones de [`error::Diagnostics`].
//!
//! # Back end
//! Un programa sin errores de análisis puede traducirse a Python con
//! [`semantic::Analysis::transpile()`] o a una unidad de bytecode de
//! máquina de pila, descrita en [`ir`], con
//! [`semantic::Analysis::assemble()`]. La serialización de esta unidad
//! a un contenedor ejecutable queda fuera del compilador.

#[macro_use]
mod macros;

pub mod ast;
pub mod error;
pub mod ir;
pub mod semantic;
pub mod source;

mod codegen;

pub use codegen::CodegenError;
