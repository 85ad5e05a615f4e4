use super::*;

fn tokens(src: &str) -> Vec<Tok> {
    let mut lexer = Lexer::new(src);
    let mut out = Vec::new();
    loop {
        let token = lexer.next_token().unwrap();
        if token.tok == Tok::Eof {
            return out;
        }
        out.push(token.tok);
    }
}

#[test]
fn longest_punctuator_wins() {
    assert_eq!(
        tokens("a ?? b === c ... d"),
        vec![
            Tok::Ident("a".into()),
            Tok::Punct("??"),
            Tok::Ident("b".into()),
            Tok::Punct("==="),
            Tok::Ident("c".into()),
            Tok::Punct("..."),
            Tok::Ident("d".into()),
        ]
    );
}

#[test]
fn optional_chain_before_digit_is_conditional() {
    assert_eq!(
        tokens("a?.5:b"),
        vec![Tok::Ident("a".into()), Tok::Punct("?"), Tok::Num(0.5), Tok::Punct(":"), Tok::Ident("b".into())]
    );
}

#[test]
fn numbers_cover_hex_exponent_and_separators() {
    assert_eq!(tokens("0xff 1e3 1_000 .25"), vec![Tok::Num(255.0), Tok::Num(1000.0), Tok::Num(1000.0), Tok::Num(0.25)]);
}

#[test]
fn identifier_glued_to_number_is_rejected() {
    let err = Lexer::new("3px").next_token().unwrap_err();
    assert_eq!(err.message, "Identifier directly after number");
}

#[test]
fn string_escapes_are_decoded() {
    assert_eq!(tokens(r#"'a\nb' "A\u{1F600}\x41""#), vec![Tok::Str("a\nb".into()), Tok::Str("A😀A".into())]);
}

#[test]
fn unterminated_string_reports_its_start() {
    let mut lexer = Lexer::new("x = 'abc\n");
    lexer.next_token().unwrap();
    lexer.next_token().unwrap();
    let err = lexer.next_token().unwrap_err();
    assert_eq!(err.message, "Unterminated string constant");
    assert_eq!((err.line, err.column), (1, 4));
}

#[test]
fn template_keeps_expression_ranges() {
    let src = "`a${x + `b${y}`}c`";
    let toks = tokens(src);
    let [Tok::Template(pieces)] = toks.as_slice() else { panic!("expected one template token, got {toks:?}") };
    assert_eq!(pieces.len(), 3);
    assert_eq!(pieces[0], TemplatePiece::Text("a".into()));
    let TemplatePiece::Expr { start, end } = pieces[1] else { panic!("expected expression piece") };
    assert_eq!(&src[start..end], "x + `b${y}`");
    assert_eq!(pieces[2], TemplatePiece::Text("c".into()));
}

#[test]
fn comments_are_trivia_and_track_newlines() {
    let mut lexer = Lexer::new("a // one\n/* two\n */ b");
    assert!(!lexer.next_token().unwrap().newline_before);
    let b = lexer.next_token().unwrap();
    assert!(b.is_ident("b"));
    assert!(b.newline_before);
}

#[test]
fn unterminated_comment_is_an_error() {
    let err = Lexer::new("/* open").next_token().unwrap_err();
    assert_eq!(err.message, "Unterminated comment");
}

#[test]
fn jsx_names_allow_dashes() {
    let mut lexer = Lexer::new("  data-id=");
    assert_eq!(lexer.read_jsx_name().unwrap(), ("data-id".to_owned(), 2));
    assert_eq!(lexer.peek_raw(), Some('='));
}

#[test]
fn jsx_text_stops_at_tag_or_brace() {
    let mut lexer = Lexer::new("Hello, world{name}");
    assert_eq!(lexer.read_jsx_text(), ("Hello, world".to_owned(), 0));
    assert_eq!(lexer.peek_raw(), Some('{'));
}

#[test]
fn stray_character_is_rejected() {
    let err = Lexer::new("#").next_token().unwrap_err();
    assert_eq!(err.message, "Unexpected character '#'");
}

#[test]
fn regex_literal_is_read_from_the_slash() {
    let src = r"x.replace(/[/\]]+\//gi, '')";
    let mut lexer = Lexer::new(src);
    let slash = loop {
        let token = lexer.next_token().unwrap();
        if token.is_punct("/") {
            break token;
        }
    };
    let (pattern, flags) = lexer.read_regex(slash.start).unwrap();
    assert_eq!(pattern, r"[/\]]+\/");
    assert_eq!(flags, "gi");
    assert_eq!(lexer.next_token().unwrap().tok, Tok::Punct(","));
}

#[test]
fn regex_literal_errors() {
    let err = Lexer::new("/abc\n/").read_regex(0).unwrap_err();
    assert_eq!(err.message, "Unterminated regular expression");

    let err = Lexer::new("/a/gg").read_regex(0).unwrap_err();
    assert_eq!((err.message.as_str(), err.column), ("Invalid regular expression flag", 4));
}

#[test]
fn deeply_nested_templates_are_rejected() {
    let src = format!("{}x{}", "`${".repeat(100), "}`".repeat(100));
    let err = Lexer::new(&src).next_token().unwrap_err();
    assert_eq!(err.message, "Template literal is nested too deeply");
}
