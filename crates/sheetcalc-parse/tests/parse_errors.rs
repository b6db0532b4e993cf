use sheetcalc_parse::{ASTNodeType, ParseError, parse};

#[test]
fn integration_errors_render_with_position() {
    let err: ParseError = parse("=SUM(1,,2)").unwrap_err();
    assert_eq!(err.to_string(), format!("ParseError at position 7: {}", err.message));
    assert!(err.message.contains("Empty function argument"));
}

#[test]
fn integration_scenario_formulas_parse() {
    for formula in [
        "=A1+A2",
        "=(B1*B2)+(B3^2)",
        "=Sheet2!A1*2",
        "=SUM(D1:D5*2)",
        "=E2",
        "=SUM(A1:A5) * AVERAGE(B1:B3)",
    ] {
        let ast = parse(formula).unwrap_or_else(|e| panic!("{formula}: {e}"));
        assert!(!matches!(ast.node_type, ASTNodeType::Literal(_)));
    }
}

#[test]
fn integration_parse_is_independent_of_sheet_existence() {
    // Binding happens later, so unknown sheets still parse.
    assert!(parse("=NoSuchSheet!A1+1").is_ok());
}

#[test]
fn integration_garbage_never_panics() {
    let alphabet = [
        '=', '(', ')', '!', '#', '+', '-', '*', '/', '^', '&', '<', '>', ',', ':', '.', '$', 'A',
        '1', '0', 'Z', '\'', '"', ' ', 'e',
    ];
    let mut state = 0x5EED_CAFE_u64;
    for _ in 0..512 {
        let mut formula = String::from("=");
        for _ in 0..12 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            formula.push(alphabet[(state % alphabet.len() as u64) as usize]);
        }
        if let Err(err) = parse(&formula) {
            assert!(err.position <= formula.len(), "{formula}: {err}");
        }
    }
}
