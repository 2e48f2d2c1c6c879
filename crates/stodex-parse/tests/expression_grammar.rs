use stodex_parse::types::ExprNode;
use stodex_parse::{Tokenizer, parse};

#[test]
fn tokenizer_spans_cover_the_source() {
    let src = "3.5*x + Exp(-2*x)";
    let tokens = Tokenizer::new(src).tokenize().unwrap();
    for t in &tokens {
        assert_eq!(&src[t.start..t.end], t.value);
    }
}

#[test]
fn canonical_equality_is_insensitive_to_spacing() {
    let a = parse("1+2*x").unwrap().simplify();
    let b = parse("  1 + 2 * x ").unwrap().simplify();
    assert_eq!(a, b);
}

#[test]
fn simplified_displays_stay_stable() {
    let ast = parse("(x + 0)*(1*y) - 0").unwrap().simplify();
    assert_eq!(ast.to_string(), "x*y");
}

#[test]
fn error_positions_point_into_the_source() {
    let err = parse("2 * * 3").unwrap_err();
    assert_eq!(err.position, Some(4));
}

#[test]
fn nested_exponentials_parse() {
    let ast = parse("Exp(-(1 + 1)*x)").unwrap().simplify();
    let ExprNode::Exp(arg) = ast else {
        panic!("expected Exp")
    };
    assert_eq!(arg.to_string(), "-2*x");
}
