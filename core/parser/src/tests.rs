//! FILENAME: core/parser/src/tests.rs
//! PURPOSE: Consolidated unit tests for the parser crate.

use crate::ast::{BinaryOperator, BuiltinFunction, Expression, UnaryOperator, MAX_DEPTH};
use crate::grammar::{check_formula, is_valid_formula, GrammarError, TokenKind};
use crate::lexer::Lexer;
use crate::parser::parse;
use crate::token::Token;

fn ident(name: &str) -> Expression {
    Expression::Identifier(name.to_string())
}

fn num(n: f64) -> Expression {
    Expression::Number(n)
}

fn binary(left: Expression, op: BinaryOperator, right: Expression) -> Expression {
    Expression::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

// ========================================
// LEXER TESTS
// ========================================

#[test]
fn lexer_tokenizes_simple_math() {
    let mut lexer = Lexer::new("1 + 2");

    assert_eq!(lexer.next_token(), Token::Number(1.0));
    assert_eq!(lexer.next_token(), Token::Plus);
    assert_eq!(lexer.next_token(), Token::Number(2.0));
    assert_eq!(lexer.next_token(), Token::EOF);
}

#[test]
fn lexer_tokenizes_double_char_operators() {
    let tokens = Lexer::new("** // <= >= == * / < >").tokenize();
    assert_eq!(
        tokens,
        vec![
            Token::DoubleAsterisk,
            Token::DoubleSlash,
            Token::LessEqual,
            Token::GreaterEqual,
            Token::EqualEqual,
            Token::Asterisk,
            Token::Slash,
            Token::LessThan,
            Token::GreaterThan,
        ]
    );
}

#[test]
fn lexer_keeps_identifier_case() {
    let tokens = Lexer::new("architecture_Pascal").tokenize();
    assert_eq!(tokens, vec![Token::Identifier("architecture_Pascal".to_string())]);
}

#[test]
fn lexer_reads_booleans_case_insensitively() {
    let tokens = Lexer::new("true True FALSE").tokenize();
    assert_eq!(
        tokens,
        vec![Token::Boolean(true), Token::Boolean(true), Token::Boolean(false)]
    );
}

#[test]
fn lexer_reads_exponent_numbers() {
    let tokens = Lexer::new("1.5e3 2E-2 .5").tokenize();
    assert_eq!(
        tokens,
        vec![Token::Number(1500.0), Token::Number(0.02), Token::Number(0.5)]
    );
}

#[test]
fn lexer_does_not_swallow_dangling_exponent() {
    let tokens = Lexer::new("2e").tokenize();
    assert_eq!(tokens, vec![Token::Number(2.0), Token::Identifier("e".to_string())]);
}

#[test]
fn lexer_flags_single_equals_as_illegal() {
    let tokens = Lexer::new("x = 1").tokenize();
    assert_eq!(tokens[1], Token::Illegal('='));
}

// ========================================
// GRAMMAR VALIDATOR TESTS
// ========================================

#[test]
fn grammar_accepts_function_formula() {
    assert!(is_valid_formula("2*x + sin(y)"));
}

#[test]
fn grammar_rejects_consecutive_operators() {
    assert!(!is_valid_formula("2*x +*"));
}

#[test]
fn grammar_rejects_unknown_function() {
    assert_eq!(
        check_formula("foo(x)"),
        Err(GrammarError::UnknownFunction("foo".to_string()))
    );
}

#[test]
fn grammar_accepts_piecewise_with_flags() {
    assert!(is_valid_formula(
        "piecewise((1000, architecture_Pascal), (100, true))"
    ));
    assert!(is_valid_formula(
        "Piecewise((1000, architecture_Pascal), (100, True))"
    ));
}

#[test]
fn grammar_accepts_prefix_signs() {
    assert!(is_valid_formula("-5"));
    assert!(is_valid_formula("x-1"));
    assert!(is_valid_formula("x -1"));
    assert!(is_valid_formula("2*-3"));
    assert!(is_valid_formula("(-x)"));
    assert!(is_valid_formula("max(-1, x) ** -2"));
}

#[test]
fn grammar_accepts_all_operators() {
    assert!(is_valid_formula("a + b - c * d / e // f % g ** h"));
    assert!(is_valid_formula("(a <= b) + (a >= b) + (a < b) + (a > b) + (a == b)"));
}

#[test]
fn grammar_rejects_adjacent_operands() {
    assert!(matches!(
        check_formula("1 2"),
        Err(GrammarError::UnexpectedToken {
            after: TokenKind::Number,
            ..
        })
    ));
    assert!(!is_valid_formula("x y"));
    assert!(!is_valid_formula("2(x)"));
}

#[test]
fn grammar_rejects_unbalanced_parentheses() {
    assert_eq!(check_formula("(x + 1"), Err(GrammarError::UnbalancedParentheses));
    assert_eq!(check_formula("x)("), Err(GrammarError::UnbalancedParentheses));
}

#[test]
fn grammar_rejects_unknown_characters() {
    assert_eq!(
        check_formula("x = 1"),
        Err(GrammarError::UnexpectedCharacter {
            position: 2,
            found: '='
        })
    );
    assert!(!is_valid_formula("x & y"));
}

#[test]
fn grammar_rejects_empty_and_trailing_operator() {
    assert_eq!(check_formula(""), Err(GrammarError::Empty));
    assert_eq!(check_formula("   "), Err(GrammarError::Empty));
    assert_eq!(
        check_formula("x +"),
        Err(GrammarError::UnexpectedEnd {
            last: TokenKind::Operator
        })
    );
}

#[test]
fn grammar_ignores_whitespace() {
    assert!(is_valid_formula("  x\t*\n 2  "));
}

#[test]
fn grammar_rejects_deep_nesting() {
    let parens = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
    assert_eq!(
        check_formula(&parens),
        Err(GrammarError::TooDeep {
            position: MAX_DEPTH
        })
    );

    let signs = format!("{}1", "-".repeat(10_000));
    assert_eq!(
        check_formula(&signs),
        Err(GrammarError::TooDeep {
            position: MAX_DEPTH
        })
    );

    // Alternating binary and prefix signs never build a long run
    let alternating = format!("1{}", " - -1".repeat(1_000));
    assert!(is_valid_formula(&alternating));
}

#[test]
fn grammar_accepts_nesting_up_to_the_limit() {
    let parens = format!("{}x{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
    assert!(is_valid_formula(&parens));
    assert!(is_valid_formula(&format!("{}x", "-".repeat(MAX_DEPTH))));
}

// ========================================
// PARSER TESTS - LITERALS AND REFERENCES
// ========================================

#[test]
fn parser_parses_number_literal() {
    assert_eq!(parse("42").unwrap(), num(42.0));
}

#[test]
fn parser_parses_named_constants() {
    assert_eq!(parse("pi").unwrap(), num(std::f64::consts::PI));
    assert_eq!(parse("E").unwrap(), num(std::f64::consts::E));
    assert_eq!(parse("True").unwrap(), Expression::Boolean(true));
}

#[test]
fn parser_parses_identifier() {
    assert_eq!(parse("cuda_core").unwrap(), ident("cuda_core"));
}

// ========================================
// PARSER TESTS - OPERATORS AND PRECEDENCE
// ========================================

#[test]
fn parser_respects_multiplicative_precedence() {
    let result = parse("1 + 2 * x").unwrap();
    assert_eq!(
        result,
        binary(
            num(1.0),
            BinaryOperator::Add,
            binary(num(2.0), BinaryOperator::Multiply, ident("x"))
        )
    );
}

#[test]
fn parser_power_is_right_associative() {
    let result = parse("2 ** 3 ** 2").unwrap();
    assert_eq!(
        result,
        binary(
            num(2.0),
            BinaryOperator::Power,
            binary(num(3.0), BinaryOperator::Power, num(2.0))
        )
    );
}

#[test]
fn parser_negation_applies_after_power() {
    // -2 ** 2 is -(2 ** 2)
    let result = parse("-2 ** 2").unwrap();
    assert_eq!(
        result,
        Expression::UnaryOp {
            op: UnaryOperator::Negate,
            operand: Box::new(binary(num(2.0), BinaryOperator::Power, num(2.0))),
        }
    );
}

#[test]
fn parser_parses_floor_division_and_modulo() {
    let result = parse("a // b % c").unwrap();
    assert_eq!(
        result,
        binary(
            binary(ident("a"), BinaryOperator::FloorDivide, ident("b")),
            BinaryOperator::Modulo,
            ident("c")
        )
    );
}

#[test]
fn parser_comparison_is_lowest_precedence() {
    let result = parse("x + 1 >= 2").unwrap();
    assert_eq!(
        result,
        binary(
            binary(ident("x"), BinaryOperator::Add, num(1.0)),
            BinaryOperator::GreaterEqual,
            num(2.0)
        )
    );
}

// ========================================
// PARSER TESTS - FUNCTIONS
// ========================================

#[test]
fn parser_resolves_builtin_functions() {
    let result = parse("Max(a, 2)").unwrap();
    assert_eq!(
        result,
        Expression::FunctionCall {
            func: BuiltinFunction::Max,
            args: vec![ident("a"), num(2.0)],
        }
    );
}

#[test]
fn parser_rejects_unknown_function() {
    assert!(parse("foo(1)").is_err());
}

#[test]
fn parser_checks_arity() {
    assert!(parse("sqrt(1, 2)").is_err());
    assert!(parse("atan2(1)").is_err());
    assert!(parse("log(8, 2)").is_ok());
}

#[test]
fn parser_parses_piecewise_branches() {
    let result = parse("piecewise((1000, architecture_Pascal), (100, true))").unwrap();
    assert_eq!(
        result,
        Expression::FunctionCall {
            func: BuiltinFunction::Piecewise,
            args: vec![
                Expression::Tuple(vec![num(1000.0), ident("architecture_Pascal")]),
                Expression::Tuple(vec![num(100.0), Expression::Boolean(true)]),
            ],
        }
    );
}

#[test]
fn parser_accepts_bare_piecewise_fallback() {
    assert!(parse("piecewise((1, x > 0), 0)").is_ok());
    assert!(parse("piecewise(0, (1, x > 0))").is_err());
}

#[test]
fn parser_rejects_stray_tuples() {
    assert!(parse("(1, 2) + 3").is_err());
    assert!(parse("max((1, 2))").is_err());
    assert!(parse("piecewise((1, 2, 3))").is_err());
}

#[test]
fn parser_reports_trailing_tokens() {
    let err = parse("1 + 2)").unwrap_err();
    assert!(err.message.contains("Unexpected token"));
}

#[test]
fn free_symbols_skip_literals_and_functions() {
    let expr = parse("piecewise((sqrt(x) * pi, flag_a), (y, true))").unwrap();
    let symbols: Vec<String> = expr.free_symbols().into_iter().collect();
    assert_eq!(symbols, vec!["flag_a", "x", "y"]);
}

#[test]
fn builtin_names_round_trip() {
    for func in BuiltinFunction::ALL {
        assert_eq!(BuiltinFunction::from_name(func.name()), Some(func));
    }
    assert_eq!(BuiltinFunction::from_name("ceiling"), Some(BuiltinFunction::Ceil));
}

// ========================================
// PARSER TESTS - NESTING LIMITS
// ========================================

#[test]
fn parser_rejects_deep_nesting() {
    let parens = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
    let err = parse(&parens).unwrap_err();
    assert!(err.message.contains("nested deeper"));

    let signs = format!("{}1", "-".repeat(10_000));
    assert!(parse(&signs).is_err());

    let calls = format!("{}x{}", "abs(".repeat(10_000), ")".repeat(10_000));
    assert!(parse(&calls).is_err());

    let exponents = vec!["2"; 10_000].join(" ** ");
    assert!(parse(&exponents).is_err());
}

#[test]
fn parser_rejects_tall_operator_chains() {
    let chain = vec!["x"; 10_000].join(" + ");
    let err = parse(&chain).unwrap_err();
    assert!(err.message.contains("nested deeper"));
}

#[test]
fn parser_accepts_moderate_nesting() {
    let parens = format!("{}x{}", "(".repeat(100), ")".repeat(100));
    assert_eq!(parse(&parens).unwrap(), ident("x"));

    let chain = vec!["x"; 100].join(" + ");
    assert!(parse(&chain).is_ok());

    let signs = format!("{}1", "-".repeat(100));
    assert!(parse(&signs).is_ok());
}
