use ofpc::{
    ast::{BinOp, Builder, Identifier},
    ir::{AccessFlags, Instruction},
    semantic::Type,
    source::{Location, Source},
    CodegenError,
};

#[test]
fn add_function_end_to_end() {
    let mut b = Builder::new();
    let ret = b.ret(Some(b.binary(b.read("a"), BinOp::Add, b.read("b"))));
    let add = b.function("int", "add", &[("int", "a"), ("int", "b")], vec![ret]);
    let print = b.println(Some(b.call("add", vec![b.int(3), b.int(4)])));
    let main = b.main(vec![print]);

    let tree = b.finish(vec![add, main]);
    let analysis = tree.analyze();

    assert_eq!(analysis.reference_errors().len(), 0);
    assert_eq!(analysis.type_errors().len(), 0);
    assert_eq!(analysis.error_count(), 0);

    let python = analysis.transpile(&tree).unwrap();
    assert!(python.contains("def add(a, b):"));
    assert!(python.contains("return a + b"));
    assert!(python.contains("print(add(3, 4))"));

    let unit = analysis.assemble(&tree, "Add").unwrap();
    assert_eq!(unit.name, "Add");
    assert_eq!(unit.functions.len(), 2);

    let add = unit.function("add").unwrap();
    assert_eq!(add.signature.to_string(), "(int, int) -> int");
    assert_eq!(add.access, AccessFlags::PRIVATE | AccessFlags::STATIC);
    assert_eq!(add.max_locals, 2);

    let main = unit.function("main").unwrap();
    assert!(main.body.iter().any(|instruction| matches!(
        instruction,
        Instruction::Call { target, .. } if &**target == "add"
    )));
}

#[test]
fn mismatched_initializer_is_one_type_error() {
    for (declared, value) in [("int", Some(1.0)), ("float", None)] {
        let mut b = Builder::new();
        let value = match value {
            Some(float) => b.float(float),
            None => b.int(1),
        };

        let decl = b.declare(declared, "x", Some(value));
        let main = b.main(vec![decl]);
        let analysis = b.finish(vec![main]).analyze();

        assert_eq!(analysis.type_errors().len(), 1);
        assert_eq!(analysis.error_count(), 1);
    }
}

#[test]
fn undeclared_assignment() {
    let mut b = Builder::new();
    let assign = b.assign("x", b.int(5));
    let main = b.main(vec![assign]);
    let analysis = b.finish(vec![main]).analyze();

    assert_eq!(analysis.reference_errors().len(), 1);
    assert_eq!(analysis.declaration_errors().len(), 0);
}

#[test]
fn return_outside_function() {
    let mut b = Builder::new();
    let ret = b.ret(Some(b.int(1)));
    let main = b.main(vec![ret]);
    let analysis = b.finish(vec![main]).analyze();

    assert_eq!(analysis.reference_errors().len(), 1);
}

#[test]
fn array_literal_element_types() {
    let mut b = Builder::new();
    let bad = b.println(Some(b.length(b.array(vec![b.int(1), b.int(2), b.float(3.0)]))));
    let main = b.main(vec![bad]);
    let analysis = b.finish(vec![main]).analyze();
    assert_eq!(analysis.type_errors().len(), 1);

    let mut b = Builder::new();
    let good = b.declare("int[]", "a", Some(b.array(vec![b.int(1), b.int(2), b.int(3)])));
    let main = b.main(vec![good]);
    let tree = b.finish(vec![main]);
    let analysis = tree.analyze();
    assert_eq!(analysis.error_count(), 0);

    let table = analysis.table();
    let main_scope = table.scope(table.global()).children()[0];
    let block = table.scope(main_scope).children()[0];
    let a = table.resolve(block, &Identifier::from("a")).unwrap();
    assert_eq!(table.symbol(a).typ(), Type::IntArray);
}

#[test]
fn code_generation_requires_clean_analysis() {
    let mut b = Builder::new();
    let assign = b.assign("x", b.int(5));
    let main = b.main(vec![assign]);
    let tree = b.finish(vec![main]);
    let analysis = tree.analyze();

    assert!(matches!(analysis.transpile(&tree), Err(CodegenError::Rejected(1))));
    assert!(matches!(analysis.assemble(&tree, "X"), Err(CodegenError::Rejected(1))));
}

#[test]
fn diagnostics_point_at_source() {
    let source = Source::new("undefined.ofp", "void main() {\n    y = 2;\n}\n");

    let mut b = Builder::new();
    b.at(Location::at(source.clone(), 2, 5));
    let assign = b.assign("y", b.int(2));
    b.at(Location::at(source, 1, 1));
    let main = b.main(vec![assign]);
    let analysis = b.finish(vec![main]).analyze();

    let rendered = analysis.reference_errors().to_string();
    assert!(rendered.starts_with("Reference error: Variable `y` is not declared in this scope\n"));
    assert!(rendered.contains(" --> undefined.ofp:2:5\n"));
    assert!(rendered.contains("2 |     y = 2;\n"));
    assert!(rendered.ends_with("Build failed with 1 error\n"));
}
