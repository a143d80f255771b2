//! Acumulación y presentación de diagnósticos.
//!
//! Cada pasada de análisis produce una colección [`Diagnostics`]
//! etiquetada con la categoría de sus errores. Ninguna pasada aborta
//! ante un error individual, por lo cual una misma ejecución puede
//! reportar tantos errores como sea posible.

use crate::source::{Located, Location};
use std::{
    error::Error,
    fmt::{self, Display},
};

mod sealed {
    pub trait Sealed {}
}

pub trait LocatedError: sealed::Sealed {
    fn source(&self) -> &dyn Error;
    fn location(&self) -> &Location;
}

pub struct Diagnostics {
    kind: &'static str,
    errors: Vec<Box<dyn 'static + LocatedError>>,
}

impl Diagnostics {
    pub fn kind(self, kind: &'static str) -> Self {
        Diagnostics { kind, ..self }
    }

    /// Registra un error más.
    pub fn push<E: 'static + Error>(&mut self, error: Located<E>) {
        tracing::debug!(kind = self.kind, location = %error.location(), "{}", error.as_ref());
        self.errors.push(Box::new(error));
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn LocatedError> {
        self.errors.iter().map(|error| error.as_ref())
    }

    /// Mensajes de error sin ubicación, en orden de reporte.
    pub fn messages(&self) -> Vec<String> {
        self.iter().map(|error| error.source().to_string()).collect()
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics {
            kind: "error",
            errors: Default::default(),
        }
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Diagnostics { kind, errors } = self;

        if errors.is_empty() {
            return writeln!(fmt, "No errors were reported");
        }

        for error in errors {
            writeln!(fmt, "{}: {}", kind, error.source())?;

            let location = error.location();
            writeln!(fmt, " --> {}", location)?;

            let digits = location.end().line().to_string().chars().count();
            writeln!(fmt, "{:digits$} |", "", digits = digits)?;

            for line_number in location.start().line()..=location.end().line() {
                if let Some(line) = location.source().line(line_number) {
                    writeln!(fmt, "{:>digits$} | {}", line_number, line, digits = digits)?;
                }
            }

            let (from, to) = (location.start().column(), location.end().column().saturating_sub(1));
            let min = from.min(to).max(1);
            let max = from.max(to).max(1);

            let skip = (min - 1) as usize;
            let highlight = (max - min + 1) as usize;

            writeln!(
                fmt,
                "{:digits$} | {:skip$}{:^<highlight$}",
                "",
                "",
                "",
                digits = digits,
                skip = skip,
                highlight = highlight
            )?;

            writeln!(fmt)?;
        }

        let error_or_errors = if errors.len() == 1 { "error" } else { "errors" };
        writeln!(
            fmt,
            "Build failed with {} {}",
            errors.len(),
            error_or_errors
        )
    }
}

impl<E: Error> sealed::Sealed for Located<E> {}

impl<E: Error> LocatedError for Located<E> {
    fn source(&self) -> &dyn Error {
        self.as_ref()
    }

    fn location(&self) -> &Location {
        Located::location(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Position, Source};
    use thiserror::Error;

    #[derive(Error, Debug)]
    #[error("Symbol `{0}` is undefined")]
    struct Undefined(&'static str);

    #[test]
    fn renders_excerpt_and_summary() {
        let source = Source::new("t.ofp", "    x = 5;\n");
        let mut diagnostics = Diagnostics::default().kind("Reference error");
        diagnostics.push(Located::at(Undefined("x"), Location::at(source, 1, 5)));

        let rendered = diagnostics.to_string();
        assert!(rendered.starts_with("Reference error: Symbol `x` is undefined\n --> t.ofp:1:5\n"));
        assert!(rendered.contains("1 |     x = 5;\n"));
        assert!(rendered.contains("  |     ^\n"));
        assert!(rendered.ends_with("Build failed with 1 error\n"));
    }

    #[test]
    fn zero_width_column_does_not_underflow() {
        let source = Source::new("z.ofp", "x;\n");
        let origin = Position::new(1, 0);

        let mut diagnostics = Diagnostics::default();
        diagnostics.push(Located::at(Undefined("x"), Location::new(source, origin, origin)));

        let rendered = diagnostics.to_string();
        assert!(rendered.contains("  | ^\n"));
        assert!(rendered.ends_with("Build failed with 1 error\n"));
    }

    #[test]
    fn empty_collection() {
        let diagnostics = Diagnostics::default();
        assert!(diagnostics.is_empty());
        assert_eq!(diagnostics.to_string(), "No errors were reported\n");
    }
}
