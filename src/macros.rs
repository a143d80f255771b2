macro_rules! emit {
    ($context:expr) => {
        writeln!($context.output())
    };

    ($context:expr, $($format:tt)*) => {{
        $context.indent()?;
        writeln!($context.output(), $($format)*)
    }};
}
