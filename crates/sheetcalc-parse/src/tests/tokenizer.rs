use crate::tokenizer::{TokenSubType, TokenType, Tokenizer};

fn kinds(formula: &str) -> Vec<(TokenType, TokenSubType, String)> {
    Tokenizer::new(formula)
        .unwrap()
        .into_tokens()
        .into_iter()
        .map(|t| (t.token_type, t.subtype, t.value))
        .collect()
}

#[test]
fn test_function_call_tokens() {
    let toks = kinds("=SUM(A1:B2, 3)");
    assert_eq!(
        toks,
        vec![
            (TokenType::Func, TokenSubType::Open, "SUM(".to_string()),
            (TokenType::Operand, TokenSubType::Range, "A1:B2".to_string()),
            (TokenType::Sep, TokenSubType::Arg, ",".to_string()),
            (TokenType::Operand, TokenSubType::Number, "3".to_string()),
            (TokenType::Func, TokenSubType::Close, ")".to_string()),
        ]
    );
}

#[test]
fn test_prefix_and_infix_minus() {
    let toks = kinds("=-A1-(-2)");
    let types: Vec<TokenType> = toks.iter().map(|t| t.0).collect();
    assert_eq!(
        types,
        vec![
            TokenType::OpPrefix,
            TokenType::Operand,
            TokenType::OpInfix,
            TokenType::Paren,
            TokenType::OpPrefix,
            TokenType::Operand,
            TokenType::Paren,
        ]
    );
}

#[test]
fn test_scientific_notation_is_one_operand() {
    let toks = kinds("=1.5E-3+2");
    assert_eq!(toks[0].2, "1.5E-3");
    assert_eq!(toks[0].1, TokenSubType::Number);
    assert_eq!(toks[1].0, TokenType::OpInfix);
}

#[test]
fn test_two_char_comparisons() {
    let toks = kinds("=A1<>B1");
    assert_eq!(toks[1].2, "<>");
    let toks = kinds("=A1>=B1");
    assert_eq!(toks[1].2, ">=");
}

#[test]
fn test_strings_and_quoted_sheets() {
    let toks = kinds("=\"say \"\"hi\"\"\"&'My Sheet'!A1");
    assert_eq!(toks[0].1, TokenSubType::Text);
    assert_eq!(toks[0].2, "\"say \"\"hi\"\"\"");
    assert_eq!(toks[2].2, "'My Sheet'!A1");
    assert_eq!(toks[2].1, TokenSubType::Range);
}

#[test]
fn test_error_literals() {
    let toks = kinds("=#DIV/0!+#n/a");
    assert_eq!(toks[0].1, TokenSubType::Error);
    assert_eq!(toks[0].2, "#DIV/0!");
    assert_eq!(toks[2].2, "#n/a");
    assert!(Tokenizer::new("=#BOGUS").is_err());
}

#[test]
fn test_spans_point_into_source() {
    let formula = "= A1 + 22";
    let tokenizer = Tokenizer::new(formula).unwrap();
    for token in &tokenizer.items {
        assert_eq!(&formula[token.start..token.end], token.value);
    }
    assert_eq!(tokenizer.render(), "=A1+22");
}

#[test]
fn test_unbalanced_parentheses() {
    let err = Tokenizer::new("=SUM(A1").err().unwrap();
    assert_eq!(err.pos, 1);
    let err = Tokenizer::new("=A1)").err().unwrap();
    assert_eq!(err.pos, 3);
}

#[test]
fn test_unsupported_characters() {
    assert!(Tokenizer::new("={1,2}").is_err());
    assert!(Tokenizer::new("=A1%").is_err());
    assert!(Tokenizer::new("=1,2").is_err());
}
