//! Type and method descriptors as they appear in smali text, e.g.
//! `[Ljava/lang/String;` or `(IJLandroid/view/View;)V`.

use nom::branch::alt;
use nom::bytes::complete::take_while1;
use nom::character::complete::{char, one_of};
use nom::combinator::recognize;
use nom::multi::{many0, many1};
use nom::sequence::{delimited, pair, tuple};
use nom::IResult;

fn is_class_name_char(c: char) -> bool {
    c != ';' && c != '(' && c != ')' && c != ',' && !c.is_whitespace()
}

fn parse_primitive(input: &str) -> IResult<&str, &str> {
    recognize(one_of("ZBCSIJFD"))(input)
}

/// `Lpackage/Class;`
fn parse_object(input: &str) -> IResult<&str, &str> {
    recognize(tuple((char('L'), take_while1(is_class_name_char), char(';'))))(input)
}

/// One or more `[` followed by a primitive or object element type.
fn parse_array(input: &str) -> IResult<&str, &str> {
    recognize(pair(many1(char('[')), alt((parse_primitive, parse_object))))(input)
}

/// Any descriptor a register can hold, so never `V`.
pub(crate) fn parse_value_descriptor(input: &str) -> IResult<&str, &str> {
    alt((parse_object, parse_array, parse_primitive))(input)
}

/// Like [`parse_value_descriptor`] but also accepts `V`, for return types.
pub(crate) fn parse_return_descriptor(input: &str) -> IResult<&str, &str> {
    alt((parse_value_descriptor, recognize(char('V'))))(input)
}

/// `(args)ret`, returning the argument descriptors and the return descriptor.
pub(crate) fn parse_method_descriptor(input: &str) -> IResult<&str, (Vec<&str>, &str)> {
    let (input, args) = delimited(char('('), many0(parse_value_descriptor), char(')'))(input)?;
    let (input, ret) = parse_return_descriptor(input)?;
    Ok((input, (args, ret)))
}

/// Element type of an array descriptor, `[[I` gives `[I`.
pub(crate) fn element_descriptor(array: &str) -> Option<&str> {
    array.strip_prefix('[').filter(|e| !e.is_empty())
}

/// Number of register slots a value of this descriptor occupies.
pub(crate) fn slot_count(descriptor: &str) -> u32 {
    match descriptor {
        "J" | "D" => 2,
        _ => 1,
    }
}
