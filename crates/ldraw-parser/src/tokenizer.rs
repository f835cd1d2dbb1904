// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! LDraw token parsing using nom combinators
//!
//! Lines are split on whitespace with empty tokens discarded. Numbers are
//! parsed locale-independently; a token is only accepted when it is a
//! number in its entirety, so malformed input never yields NaN.

use ldraw_model::{ColorId, Vec3};
use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while, take_while_m_n},
    character::complete::{char, digit1},
    combinator::{all_consuming, map_res, opt, recognize},
    sequence::preceded,
    IResult, Parser,
};

/// Color token of a type 1-5 line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorToken {
    /// Indexed color code
    Code(ColorId),
    /// Direct `0x2RRGGBB` color
    Direct(u32),
}

/// Split a line into tokens
pub fn tokenize(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

// ============================================================================
// Parsing Primitives
// ============================================================================

/// Recognize a decimal number with optional sign, fraction and exponent
fn number(input: &str) -> IResult<&str, &str> {
    recognize((
        opt(alt((char('-'), char('+')))),
        alt((
            recognize((digit1, opt((char('.'), take_while(|c: char| c.is_ascii_digit()))))),
            recognize((char('.'), digit1)),
        )),
        opt((
            alt((char('e'), char('E'))),
            opt(alt((char('+'), char('-')))),
            digit1,
        )),
    ))
    .parse(input)
}

/// Recognize an optionally signed integer
fn integer(input: &str) -> IResult<&str, &str> {
    recognize((opt(alt((char('-'), char('+')))), digit1)).parse(input)
}

/// Parse a direct color `0x2RRGGBB`
fn direct_color(input: &str) -> IResult<&str, u32> {
    map_res(
        preceded(
            tag_no_case("0x2"),
            take_while_m_n(6, 6, |c: char| c.is_ascii_hexdigit()),
        ),
        |hex: &str| u32::from_str_radix(hex, 16),
    )
    .parse(input)
}

// ============================================================================
// Token Parsers
// ============================================================================

/// Parse a float token
pub fn parse_float(token: &str) -> Option<f64> {
    let (_, num_str) = all_consuming(number).parse(token).ok()?;
    // lexical-core does not accept a leading '+'.
    let num_str = num_str.strip_prefix('+').unwrap_or(num_str);
    let value: f64 = lexical_core::parse(num_str.as_bytes()).ok()?;
    value.is_finite().then_some(value)
}

/// Parse an integer token
pub fn parse_int(token: &str) -> Option<i64> {
    let (_, num_str) = all_consuming(integer).parse(token).ok()?;
    let num_str = num_str.strip_prefix('+').unwrap_or(num_str);
    lexical_core::parse(num_str.as_bytes()).ok()
}

/// Parse `N` consecutive float tokens
pub fn parse_floats<const N: usize>(tokens: &[&str]) -> Option<[f64; N]> {
    if tokens.len() < N {
        return None;
    }
    let mut ret = [0.0; N];
    for (slot, token) in ret.iter_mut().zip(tokens) {
        *slot = parse_float(token)?;
    }
    Some(ret)
}

/// Parse `3 * N` float tokens as `N` points
pub fn parse_points<const N: usize>(tokens: &[&str]) -> Option<[Vec3; N]> {
    if tokens.len() < 3 * N {
        return None;
    }
    let mut ret = [Vec3::zeros(); N];
    for (i, point) in ret.iter_mut().enumerate() {
        let [x, y, z] = parse_floats::<3>(&tokens[3 * i..])?;
        *point = Vec3::new(x, y, z);
    }
    Some(ret)
}

/// Parse the line type token. Only 0 to 5 are LDraw line types.
pub fn parse_line_type(token: &str) -> Option<u8> {
    parse_int(token)
        .and_then(|t| u8::try_from(t).ok())
        .filter(|t| *t <= 5)
}

/// Parse a color token
pub fn parse_color(token: &str) -> Option<ColorToken> {
    if let Ok((_, rgb)) = all_consuming(direct_color).parse(token) {
        return Some(ColorToken::Direct(rgb));
    }
    parse_int(token)
        .and_then(|c| ColorId::try_from(c).ok())
        .map(ColorToken::Code)
}

/// Normalize a file reference: lowercase with forward slashes
pub fn normalize_id(name: &str) -> String {
    name.to_lowercase().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float("42"), Some(42.0));
        assert_eq!(parse_float("-0.5"), Some(-0.5));
        assert_eq!(parse_float("+3"), Some(3.0));
        assert_relative_eq!(parse_float("1.5E-3").unwrap(), 0.0015);
    }

    #[test]
    fn test_malformed_float() {
        assert_eq!(parse_float("abc"), None);
        assert_eq!(parse_float("1.2.3"), None);
        assert_eq!(parse_float("1,5"), None);
        assert_eq!(parse_float("NaN"), None);
        assert_eq!(parse_float("-"), None);
    }

    #[test]
    fn test_parse_points() {
        let tokens = tokenize("0 0 0  1 0 0\t0 1 0");
        let [a, b, c] = parse_points::<3>(&tokens).unwrap();
        assert_eq!(a, Vec3::zeros());
        assert_eq!(b, Vec3::x());
        assert_eq!(c, Vec3::y());
        assert!(parse_points::<3>(&tokens[1..]).is_none());
    }

    #[test]
    fn test_line_type() {
        assert_eq!(parse_line_type("0"), Some(0));
        assert_eq!(parse_line_type("5"), Some(5));
        assert_eq!(parse_line_type("6"), None);
        assert_eq!(parse_line_type("-1"), None);
        assert_eq!(parse_line_type("x"), None);
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("4"), Some(ColorToken::Code(4)));
        assert_eq!(parse_color("0x2FF8000"), Some(ColorToken::Direct(0xFF8000)));
        assert_eq!(parse_color("0x2ff8000"), Some(ColorToken::Direct(0xFF8000)));
        assert_eq!(parse_color("0x2FF80"), None);
        assert_eq!(parse_color("red"), None);
    }

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id("S\\3001S01.DAT"), "s/3001s01.dat");
    }
}
