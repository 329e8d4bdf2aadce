// ABOUTME: Tokenizer — turns source text into the Token stream the parser consumes

use crate::diagnostics::Diagnostic;
use crate::token::{Literal, NumBase, NumberLit, Span, Token, TokenKind};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char as nom_char, digit1, one_of},
    combinator::{opt, recognize},
    multi::many0,
    sequence::pair,
    IResult,
};
use std::rc::Rc;

/// Tokenizes one source file. Never fails outright: unrecognized bytes
/// become `Invalid` tokens (with a diagnostic) and lexing skips forward one
/// character at a time, always making progress. Always ends with a
/// trailing `EndOfFile` token.
pub fn tokenize(source: &str, file: Rc<str>) -> (Vec<Token>, Vec<Diagnostic>) {
    let mut lexer = Lexer { file, line: 1, col: 1, diagnostics: Vec::new() };
    let mut tokens = Vec::new();
    let mut rest = source;
    loop {
        rest = lexer.skip_trivia(rest);
        if rest.is_empty() {
            break;
        }
        let (next_rest, tok) = lexer.next_token(rest);
        lexer.advance_position(&rest[..rest.len() - next_rest.len()]);
        tokens.push(tok);
        rest = next_rest;
    }
    tokens.push(Token::new(TokenKind::EndOfFile, "", lexer.point()));
    (tokens, lexer.diagnostics)
}

struct Lexer {
    file: Rc<str>,
    line: u32,
    col: u32,
    diagnostics: Vec<Diagnostic>,
}

impl Lexer {
    fn point(&self) -> Span {
        Span::point(self.file.clone(), self.line, self.col)
    }

    fn span_from(&self, start_line: u32, start_col: u32) -> Span {
        Span::new(self.file.clone(), start_line, start_col, self.line, self.col.saturating_sub(1).max(start_col))
    }

    fn advance_position(&mut self, consumed: &str) {
        for ch in consumed.chars() {
            if ch == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
    }

    /// Skips whitespace and the four comment forms: `//...`, `/* ... */`,
    /// `#...`, `#| ... |#`.
    fn skip_trivia<'a>(&mut self, mut input: &'a str) -> &'a str {
        loop {
            let before = input;
            let ws_len = input.len() - input.trim_start_matches([' ', '\t', '\r', '\n']).len();
            if ws_len > 0 {
                self.advance_position(&input[..ws_len]);
                input = &input[ws_len..];
            }
            if let Some(rest) = input.strip_prefix("//") {
                let nl = rest.find('\n').unwrap_or(rest.len());
                self.advance_position(&input[..2 + nl]);
                input = &rest[nl..];
            } else if let Some(rest) = input.strip_prefix("/*") {
                if let Some(end) = rest.find("*/") {
                    self.advance_position(&input[..2 + end + 2]);
                    input = &rest[end + 2..];
                } else {
                    self.advance_position(input);
                    input = "";
                }
            } else if let Some(rest) = input.strip_prefix("#|") {
                if let Some(end) = rest.find("|#") {
                    self.advance_position(&input[..2 + end + 2]);
                    input = &rest[end + 2..];
                } else {
                    self.advance_position(input);
                    input = "";
                }
            } else if input.starts_with('#') {
                let nl = input.find('\n').unwrap_or(input.len());
                self.advance_position(&input[..nl]);
                input = &input[nl..];
            }
            if input.len() == before.len() {
                break;
            }
        }
        input
    }

    fn next_token<'a>(&mut self, input: &'a str) -> (&'a str, Token) {
        let start_line = self.line;
        let start_col = self.col;

        if let Ok((rest, tok)) = lex_number(input) {
            let span = self.span_from_consumed(input, rest, start_line, start_col);
            return (rest, self.number_token(tok, span));
        }
        if let Ok((rest, s)) = lex_string(input) {
            let span = self.span_from_consumed(input, rest, start_line, start_col);
            return (rest, Token::with_value(TokenKind::String, &input[..input.len() - rest.len()], Literal::Str(s), span));
        }
        if let Ok((rest, c)) = lex_char(input) {
            let span = self.span_from_consumed(input, rest, start_line, start_col);
            return (rest, Token::with_value(TokenKind::Char, &input[..input.len() - rest.len()], Literal::Char(c), span));
        }
        if let Ok((rest, ident)) = lex_ident(input) {
            let span = self.span_from_consumed(input, rest, start_line, start_col);
            let kind = TokenKind::keyword(ident).unwrap_or(TokenKind::Ident);
            return (rest, Token::new(kind, ident, span));
        }
        if let Some((rest, kind, lexeme)) = lex_punct(input) {
            let span = self.span_from_consumed(input, rest, start_line, start_col);
            return (rest, Token::new(kind, lexeme, span));
        }

        // Unrecognized byte: emit Invalid and skip exactly one character.
        let ch_len = input.chars().next().map(|c| c.len_utf8()).unwrap_or(1);
        let lexeme = &input[..ch_len];
        let rest = &input[ch_len..];
        let span = self.span_from_consumed(input, rest, start_line, start_col);
        self.diagnostics.push(Diagnostic::lexical(format!("unrecognized character `{}`", lexeme), span.clone()));
        (rest, Token::new(TokenKind::Invalid, lexeme, span))
    }

    fn span_from_consumed(&mut self, input: &str, rest: &str, start_line: u32, start_col: u32) -> Span {
        let consumed = &input[..input.len() - rest.len()];
        self.advance_position(consumed);
        self.span_from(start_line, start_col)
    }

    fn number_token(&mut self, lit: RawNumber, span: Span) -> Token {
        let lexeme = lit.lexeme.clone();
        let num = NumberLit { digits: lit.digits, base: lit.base, is_float: lit.is_float, suffix: lit.suffix };
        Token::with_value(TokenKind::Number, lexeme, Literal::Number(num), span)
    }
}

struct RawNumber {
    lexeme: String,
    digits: String,
    base: NumBase,
    is_float: bool,
    suffix: Option<String>,
}

const INT_SUFFIXES: &[&str] = &["i8", "i16", "i32", "i64", "u8", "u16", "u32", "u64"];
const FLOAT_SUFFIXES: &[&str] = &["f16", "f32", "f64"];

fn lex_number(input: &str) -> IResult<&str, RawNumber> {
    let (rest, (prefix, digits)) = alt((
        |i| prefixed_digits(i, "0b", NumBase::Bin, |c| c == '0' || c == '1'),
        |i| prefixed_digits(i, "0o", NumBase::Oct, |c| ('0'..='7').contains(&c)),
        |i| prefixed_digits(i, "0x", NumBase::Hex, |c| c.is_ascii_hexdigit()),
        |i: &str| {
            let (rest, d) = digit1(i)?;
            Ok((rest, (NumBase::Dec, d)))
        },
    ))(input)?;

    let mut is_float = false;
    let mut rest = rest;
    let mut digits = digits.to_string();

    if prefix == NumBase::Dec {
        if let Ok((r2, frac)) = recognize(pair(nom_char::<_, nom::error::Error<&str>>('.'), digit1))(rest) {
            // Guard against consuming a leading `.` that belongs to `..`/`..=`
            // range syntax (e.g. `0..5`): only treat it as a fraction when
            // followed by a digit, which `recognize(pair(.., digit1))`
            // already requires.
            digits.push_str(frac);
            is_float = true;
            rest = r2;
        }
        if let Ok((r2, exp)) = recognize(|i| {
            let (i, _) = one_of::<_, _, nom::error::Error<&str>>("eE")(i)?;
            let (i, sign) = opt(one_of("+-"))(i)?;
            let (i, d) = digit1(i)?;
            let _ = sign;
            Ok((i, d))
        })(rest)
        {
            digits.push_str(exp);
            is_float = true;
            rest = r2;
        }
    }

    let all_suffixes: Vec<&&str> = INT_SUFFIXES.iter().chain(FLOAT_SUFFIXES.iter()).collect();
    let mut suffix = None;
    for s in all_suffixes {
        if let Some(r2) = rest.strip_prefix(*s) {
            // Only consume as a suffix when not immediately followed by more
            // identifier characters (so `i8x` isn't split into `i8` + `x`).
            if !r2.starts_with(|c: char| c.is_alphanumeric() || c == '_') {
                suffix = Some((*s).to_string());
                if FLOAT_SUFFIXES.contains(s) {
                    is_float = true;
                }
                rest = r2;
                break;
            }
        }
    }

    let consumed_len = input.len() - rest.len();
    let lexeme = input[..consumed_len].to_string();
    Ok((rest, RawNumber { lexeme, digits, base: prefix, is_float, suffix }))
}

fn prefixed_digits<'a>(
    input: &'a str,
    prefix: &str,
    base: NumBase,
    digit_ok: impl Fn(char) -> bool,
) -> IResult<&'a str, (NumBase, &'a str)> {
    let (rest, _) = tag(prefix)(input)?;
    let (rest, digits) = take_while1(|c: char| digit_ok(c) || c == '_')(rest)?;
    Ok((rest, (base, digits)))
}

fn lex_ident(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)
}

fn decode_escape(rest: &str) -> Option<(char, &str)> {
    let mut chars = rest.chars();
    let c = chars.next()?;
    let tail = chars.as_str();
    Some(match c {
        'n' => ('\n', tail),
        't' => ('\t', tail),
        'r' => ('\r', tail),
        '\\' => ('\\', tail),
        '"' => ('"', tail),
        '\'' => ('\'', tail),
        '0' => ('\0', tail),
        'x' => {
            let hex = &tail[..2.min(tail.len())];
            let code = u8::from_str_radix(hex, 16)?;
            (code as char, &tail[hex.len()..])
        }
        'u' => {
            let tail = tail.strip_prefix('{')?;
            let end = tail.find('}')?;
            let code = u32::from_str_radix(&tail[..end], 16).ok()?;
            (char::from_u32(code)?, &tail[end + 1..])
        }
        _ => return None,
    })
}

fn lex_string(input: &str) -> IResult<&str, String> {
    let Some(mut rest) = input.strip_prefix('"') else {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    };
    let mut out = String::new();
    loop {
        match rest.chars().next() {
            None => return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Eof))),
            Some('"') => {
                rest = &rest[1..];
                break;
            }
            Some('\\') => {
                let after_bs = &rest[1..];
                match decode_escape(after_bs) {
                    Some((c, tail)) => {
                        out.push(c);
                        rest = tail;
                    }
                    None => return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Escaped))),
                }
            }
            Some(c) => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
    Ok((rest, out))
}

fn lex_char(input: &str) -> IResult<&str, char> {
    let Some(rest) = input.strip_prefix('\'') else {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    };
    let (value, rest) = if let Some(after_bs) = rest.strip_prefix('\\') {
        match decode_escape(after_bs) {
            Some(pair) => pair,
            None => return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Escaped))),
        }
    } else {
        let mut chars = rest.chars();
        let c = chars.next().ok_or_else(|| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Eof)))?;
        (c, chars.as_str())
    };
    let rest = rest.strip_prefix('\'').ok_or_else(|| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)))?;
    Ok((rest, value))
}

/// Longest-match punctuator/operator scan. Order matters: longer forms are
/// tried before their single-character prefixes.
fn lex_punct(input: &str) -> Option<(&str, TokenKind, &'static str)> {
    use TokenKind::*;
    const TABLE: &[(&str, TokenKind)] = &[
        ("..=", DotDotEq),
        ("::", ColonColon),
        ("==", EqEq),
        ("!=", BangEq),
        ("<=", LtEq),
        (">=", GtEq),
        ("&&", AndAnd),
        ("||", OrOr),
        ("..", DotDot),
        ("+=", PlusEq),
        ("-=", MinusEq),
        ("*=", StarEq),
        ("/=", SlashEq),
        ("%=", PercentEq),
        ("<<", Shl),
        (">>", Shr),
        ("++", PlusPlus),
        ("--", MinusMinus),
        ("->", Arrow),
        ("(", LParen),
        (")", RParen),
        ("{", LBrace),
        ("}", RBrace),
        ("[", LBracket),
        ("]", RBracket),
        (",", Comma),
        (".", Dot),
        (":", Colon),
        (";", Semi),
        ("?", Question),
        ("=", Eq),
        ("|", Pipe),
        ("^", Caret),
        ("&", Amp),
        ("<", Lt),
        (">", Gt),
        ("+", Plus),
        ("-", Minus),
        ("*", Star),
        ("/", Slash),
        ("%", Percent),
        ("!", Bang),
        ("~", Tilde),
    ];
    for (text, kind) in TABLE {
        if let Some(rest) = input.strip_prefix(text) {
            return Some((rest, *kind, text));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let (tokens, diags) = tokenize(src, Rc::from("t.ell"));
        assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_and_identifiers_are_distinguished() {
        assert_eq!(kinds("func foo"), vec![TokenKind::Func, TokenKind::Ident, TokenKind::EndOfFile]);
    }

    #[test]
    fn float_type_names_lex_as_plain_identifiers() {
        assert_eq!(kinds("f32"), vec![TokenKind::Ident, TokenKind::EndOfFile]);
    }

    #[test]
    fn multi_char_operators_prefer_the_longest_match() {
        assert_eq!(kinds("a <= b"), vec![TokenKind::Ident, TokenKind::LtEq, TokenKind::Ident, TokenKind::EndOfFile]);
        assert_eq!(kinds("1..=5"), vec![TokenKind::Number, TokenKind::DotDotEq, TokenKind::Number, TokenKind::EndOfFile]);
    }

    #[test]
    fn line_and_block_comments_are_skipped() {
        assert_eq!(kinds("// hi\n1"), vec![TokenKind::Number, TokenKind::EndOfFile]);
        assert_eq!(kinds("/* hi */ 1"), vec![TokenKind::Number, TokenKind::EndOfFile]);
        assert_eq!(kinds("# hi\n1"), vec![TokenKind::Number, TokenKind::EndOfFile]);
        assert_eq!(kinds("#| hi |# 1"), vec![TokenKind::Number, TokenKind::EndOfFile]);
    }

    #[test]
    fn number_literal_captures_base_and_suffix() {
        let (tokens, _) = tokenize("0xFF_u8", Rc::from("t.ell"));
        match &tokens[0].value {
            Some(Literal::Number(n)) => {
                assert_eq!(n.base, NumBase::Hex);
                assert_eq!(n.suffix, Some("u8".to_string()));
                assert!(!n.is_float);
            }
            other => panic!("unexpected literal value: {:?}", other),
        }
    }

    #[test]
    fn float_literal_with_exponent() {
        let (tokens, _) = tokenize("1.5e10", Rc::from("t.ell"));
        match &tokens[0].value {
            Some(Literal::Number(n)) => assert!(n.is_float),
            other => panic!("unexpected literal value: {:?}", other),
        }
    }

    #[test]
    fn string_literal_decodes_escapes() {
        let (tokens, diags) = tokenize(r#""a\nb\"c""#, Rc::from("t.ell"));
        assert!(diags.is_empty());
        match &tokens[0].value {
            Some(Literal::Str(s)) => assert_eq!(s, "a\nb\"c"),
            other => panic!("unexpected literal value: {:?}", other),
        }
    }

    #[test]
    fn char_literal_decodes_escape() {
        let (tokens, diags) = tokenize(r"'\n'", Rc::from("t.ell"));
        assert!(diags.is_empty());
        match &tokens[0].value {
            Some(Literal::Char(c)) => assert_eq!(*c, '\n'),
            other => panic!("unexpected literal value: {:?}", other),
        }
    }

    #[test]
    fn unrecognized_byte_produces_invalid_token_and_diagnostic() {
        let (tokens, diags) = tokenize("@", Rc::from("t.ell"));
        assert_eq!(tokens[0].kind, TokenKind::Invalid);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn spans_track_line_and_column() {
        let (tokens, _) = tokenize("foo\nbar", Rc::from("t.ell"));
        assert_eq!(tokens[0].span.start_line, 1);
        assert_eq!(tokens[1].span.start_line, 2);
        assert_eq!(tokens[1].span.start_col, 1);
    }
}
