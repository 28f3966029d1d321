//! Operand values and the nom parsers that read them from operand tokens.

use std::fmt;
use std::fmt::Debug;

use nom::branch::alt;
use nom::bytes::complete::{escaped, tag, take_until, take_while1};
use nom::character::complete::{char, digit1, none_of, one_of, space0};
use nom::combinator::{opt, recognize};
use nom::multi::separated_list0;
use nom::sequence::{delimited, pair, preceded, separated_pair};
use nom::IResult;

use crate::descriptor::{parse_method_descriptor, parse_value_descriptor};
use crate::register::{parse_register, Register};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label(pub String);

/// `:cond_0`, `:pswitch_data_0`, `:try_start_1$inner`
pub(crate) fn parse_label(input: &str) -> IResult<&str, Label> {
    let (input, _) = char(':')(input)?;
    let (input, name) = take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '$')(input)?;
    Ok((input, Label(name.to_string())))
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.0)
    }
}

/// An integer literal. The text is kept as written so rendering is exact,
/// `value` is what it denotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    pub text: String,
    pub value: i64,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

fn digit_error(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
}

/// Decimal or `0x` hex integer with optional sign and `L`/`t`/`s` suffix.
pub(crate) fn parse_literal_int<T>(input: &str) -> IResult<&str, T>
where
    T: num_traits::Num + std::ops::Neg<Output = T> + std::str::FromStr + TryFrom<i64>,
    <T as TryFrom<i64>>::Error: Debug,
{
    let (input, sign) = opt(char('-'))(input)?;

    let (input, magnitude) = if input.starts_with("0x") || input.starts_with("0X") {
        let (input, _) = alt((tag("0x"), tag("0X")))(input)?;
        let (input, hex_digits) = take_while1(|c: char| c.is_ascii_hexdigit())(input)?;
        let value = u64::from_str_radix(hex_digits, 16).map_err(|_| digit_error(input))?;
        (input, value)
    } else {
        let (input, num_str) = digit1(input)?;
        let value = num_str.parse::<u64>().map_err(|_| digit_error(input))?;
        (input, value)
    };
    let (input, _) = opt(one_of("Lts"))(input)?;

    let value_i64 = match (sign.is_some(), magnitude) {
        (true, 0x8000_0000_0000_0000) => i64::MIN,
        (true, m) if m <= i64::MAX as u64 => -(m as i64),
        (false, m) if m <= i64::MAX as u64 => m as i64,
        _ => return Err(digit_error(input)),
    };
    let value = T::try_from(value_i64).map_err(|_| digit_error(input))?;
    Ok((input, value))
}

pub(crate) fn parse_literal(input: &str) -> IResult<&str, Literal> {
    let start = input;
    let (input, value) = parse_literal_int::<i64>(input)?;
    let text = &start[..start.len() - input.len()];
    Ok((input, Literal { text: text.to_string(), value }))
}

/// The body of a quoted string literal, escapes left as written.
pub(crate) fn parse_string_literal(input: &str) -> IResult<&str, String> {
    let esc = escaped(none_of("\\\""), '\\', one_of("'\"tbnrfu0123456789abcdefABCDEF\\"));
    let esc_or_empty = alt((esc, tag("")));
    let (input, s) = delimited(char('"'), esc_or_empty, char('"'))(input)?;
    Ok((input, s.to_string()))
}

/// Inclusive register range as used by the `/range` forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterRange {
    pub start: Register,
    pub end: Register,
}

impl RegisterRange {
    /// Every register from `start` to `end`.
    pub fn expand(&self) -> Vec<Register> {
        (self.start.number..=self.end.number)
            .map(|n| Register { kind: self.start.kind, number: n })
            .collect()
    }
}

impl fmt::Display for RegisterRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{} .. {}}}", self.start, self.end)
    }
}

/// `{v0 .. v6}`. Endpoints are not checked against each other here.
pub(crate) fn parse_register_range(input: &str) -> IResult<&str, RegisterRange> {
    let (input, (start, end)) = delimited(
        pair(char('{'), space0),
        separated_pair(parse_register, delimited(space0, tag(".."), space0), parse_register),
        pair(space0, char('}')),
    )(input)?;
    Ok((input, RegisterRange { start, end }))
}

/// `{v0, v1, p2}`, possibly empty.
pub(crate) fn parse_register_list(input: &str) -> IResult<&str, Vec<Register>> {
    delimited(
        char('{'),
        delimited(
            space0,
            separated_list0(delimited(space0, char(','), space0), parse_register),
            space0,
        ),
        char('}'),
    )(input)
}

pub(crate) struct RegisterList<'a>(pub &'a [Register]);

impl fmt::Display for RegisterList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, r) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{r}")?;
        }
        write!(f, "}}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRef {
    pub class: String,
    pub name: String,
    pub descriptor: String,
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}{}", self.class, self.name, self.descriptor)
    }
}

/// `Lpkg/Class;->name(args)ret`
pub(crate) fn parse_method_ref(input: &str) -> IResult<&str, MethodRef> {
    let (input, (class, name)) =
        separated_pair(parse_value_descriptor, tag("->"), take_until("("))(input)?;
    let (input, descriptor) = recognize(parse_method_descriptor)(input)?;

    Ok((input, MethodRef {
        class: class.to_string(),
        name: name.trim().to_string(),
        descriptor: descriptor.to_string(),
    }))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub class: String,
    pub name: String,
    pub descriptor: String,
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}:{}", self.class, self.name, self.descriptor)
    }
}

/// `Lpkg/Class;->name:Type`
pub(crate) fn parse_field_ref(input: &str) -> IResult<&str, FieldRef> {
    let (input, (class, name)) =
        separated_pair(parse_value_descriptor, tag("->"), take_until(":"))(input)?;
    let (input, descriptor) = preceded(char(':'), parse_value_descriptor)(input)?;

    Ok((input, FieldRef {
        class: class.to_string(),
        name: name.trim().to_string(),
        descriptor: descriptor.to_string(),
    }))
}

/// A method prototype operand as used by `invoke-polymorphic`, `(I)V`.
pub(crate) fn parse_proto(input: &str) -> IResult<&str, &str> {
    recognize(parse_method_descriptor)(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::{p, v};

    #[test]
    fn integer_literals() {
        assert_eq!(parse_literal_int::<i64>("0x800053"), Ok(("", 0x800053)));
        assert_eq!(parse_literal_int::<i64>("-0x8000000000000000L"), Ok(("", i64::MIN)));
        assert_eq!(parse_literal_int::<i64>("0x100000000L"), Ok(("", 0x1_0000_0000)));
        assert_eq!(parse_literal_int::<i64>("-5"), Ok(("", -5)));
        assert_eq!(parse_literal_int::<i32>("0x7fffffff"), Ok(("", i32::MAX)));
        assert!(parse_literal_int::<i8>("0x100").is_err());
        assert!(parse_literal_int::<i64>("0xffffffffffffffffL").is_err());
    }

    #[test]
    fn literal_keeps_text() {
        let (rest, lit) = parse_literal("-0x1L").unwrap();
        assert!(rest.is_empty());
        assert_eq!(lit.text, "-0x1L");
        assert_eq!(lit.value, -1);
    }

    #[test]
    fn method_refs() {
        let input = "Landroid/widget/TextView;->setText(Ljava/lang/CharSequence;Landroid/widget/TextView$BufferType;)V";
        let (rest, mr) = parse_method_ref(input).unwrap();
        assert!(rest.is_empty());
        assert_eq!(mr.name, "setText");
        assert_eq!(mr.to_string(), input);

        let (_, init) = parse_method_ref("Ljava/lang/Object;-><init>()V").unwrap();
        assert_eq!(init.name, "<init>");
        assert_eq!(init.descriptor, "()V");
    }

    #[test]
    fn field_refs() {
        let input = "Landroid/HypotheticalClass;->MyDouble:D";
        let (rest, fr) = parse_field_ref(input).unwrap();
        assert!(rest.is_empty());
        assert_eq!(fr.class, "Landroid/HypotheticalClass;");
        assert_eq!(fr.name, "MyDouble");
        assert_eq!(fr.descriptor, "D");
        assert_eq!(fr.to_string(), input);
        assert!(parse_field_ref("Lfoo;->bar:V").is_err());
    }

    #[test]
    fn registers_lists_and_ranges() {
        assert_eq!(parse_register_list("{v0, v1, p2}"), Ok(("", vec![v(0), v(1), p(2)])));
        assert_eq!(parse_register_list("{}"), Ok(("", vec![])));
        let (_, range) = parse_register_range("{v10 .. v16}").unwrap();
        assert_eq!(range.expand().len(), 7);
        assert_eq!(range.to_string(), "{v10 .. v16}");
        assert_eq!(RegisterList(&[v(12), v(13)]).to_string(), "{v12, v13}");
    }

    #[test]
    fn strings_and_labels() {
        assert_eq!(parse_string_literal(r#""""#), Ok(("", String::new())));
        assert_eq!(parse_string_literal(r#""a \"b\"\n""#), Ok(("", r#"a \"b\"\n"#.to_string())));
        assert_eq!(parse_label(":cond_6"), Ok(("", Label("cond_6".to_string()))));
    }
}
