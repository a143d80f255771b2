//! Generación de código.
//!
//! Existen dos back ends pares que consumen el árbol y el resultado
//! del análisis semántico: [`Analysis::transpile()`] produce un
//! programa en Python y [`Analysis::assemble()`] produce una unidad
//! de bytecode descrita en [`crate::ir`]. Ninguno de los dos acepta
//! un programa con errores de análisis.

use std::fmt;

use thiserror::Error;

use crate::{ast::Ast, ir, semantic::Analysis};

mod bytecode;
mod python;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CodegenError {
    /// El análisis semántico reportó errores.
    #[error("Code generation refused, analysis reported {0} error(s)")]
    Rejected(usize),

    #[error("Formatting error")]
    Fmt(#[from] fmt::Error),
}

impl Analysis {
    /// Traduce el programa a código fuente Python.
    pub fn transpile(&self, ast: &Ast) -> Result<String, CodegenError> {
        self.accept()?;

        let mut output = String::new();
        python::transpile(ast, self, &mut output)?;

        Ok(output)
    }

    /// Emite una unidad de bytecode con el nombre indicado.
    pub fn assemble(&self, ast: &Ast, name: &str) -> Result<ir::Unit, CodegenError> {
        self.accept()?;
        Ok(bytecode::assemble(ast, self, name))
    }

    fn accept(&self) -> Result<(), CodegenError> {
        match self.error_count() {
            0 => Ok(()),
            count => Err(CodegenError::Rejected(count)),
        }
    }
}
