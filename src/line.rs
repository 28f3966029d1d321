//! Line level helpers for method bodies: classifying lines, splitting an
//! instruction line into tokens, and an owned line buffer that the rewriter
//! splices generated blocks into.

use nom::branch::alt;
use nom::bytes::complete::{take_till, take_till1, take_while1};
use nom::character::complete::{char, space0, space1};
use nom::combinator::{all_consuming, opt, recognize, rest};
use nom::multi::separated_list1;
use nom::sequence::{delimited, preceded, tuple};
use nom::IResult;

use crate::error::DecodeError;
use crate::instruction::operands::{parse_register_list, parse_register_range, parse_string_literal};
use crate::instruction::Opcode;
use crate::register::{parse_register, Register};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    Comment,
    Label,
    Directive,
    /// Payload rows of `.array-data` and `.sparse-switch` blocks.
    Data,
    Instruction,
}

pub fn classify(line: &str) -> LineKind {
    let trimmed = line.trim();
    match trimmed.chars().next() {
        None => LineKind::Blank,
        Some('#') => LineKind::Comment,
        Some(':') => LineKind::Label,
        Some('.') => LineKind::Directive,
        Some(c) if c.is_ascii_lowercase() => LineKind::Instruction,
        Some(_) => LineKind::Data,
    }
}

/// Directives that open a nested block, with the directive that closes it.
const BLOCKS: &[(&str, &str)] = &[
    (".annotation", ".end annotation"),
    (".subannotation", ".end subannotation"),
    (".array-data", ".end array-data"),
    (".packed-switch", ".end packed-switch"),
    (".sparse-switch", ".end sparse-switch"),
];

/// Classifies the lines of a method body in order. Unlike [`classify`] it
/// knows about annotation and payload blocks, whose contents are `Data`
/// even when they read like an instruction (`value = {`).
///
/// `.param` needs no entry of its own: it is a single line unless it
/// carries annotations, and those are annotation blocks.
#[derive(Debug, Default)]
pub struct LineScanner {
    open: Vec<&'static str>,
}

impl LineScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kind of the next line. Lines have to be fed in body order.
    pub fn next_kind(&mut self, line: &str) -> LineKind {
        let kind = classify(line);
        let first = line.split_whitespace().next().unwrap_or_default();
        if kind == LineKind::Directive {
            if let Some(end) = self.open.last() {
                if line.trim_start().starts_with(end) {
                    self.open.pop();
                    return kind;
                }
            }
            if let Some((_, end)) = BLOCKS.iter().find(|(start, _)| *start == first) {
                self.open.push(end);
                return kind;
            }
        }
        match kind {
            LineKind::Blank | LineKind::Comment => kind,
            _ if !self.open.is_empty() => LineKind::Data,
            _ => kind,
        }
    }

    /// Kinds of a whole body.
    pub fn scan<S: AsRef<str>>(lines: &[S]) -> Vec<LineKind> {
        let mut scanner = LineScanner::new();
        lines.iter().map(|l| scanner.next_kind(l.as_ref())).collect()
    }
}

/// True when the line is an instruction whose opcode is in the catalog.
pub fn is_decodable_instruction(line: &str) -> bool {
    classify(line) == LineKind::Instruction
        && tokenize(line).is_ok_and(|(opcode, _)| Opcode::from_name(&opcode).is_some())
}

fn opcode_token(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '/')(input)
}

fn quoted_token(input: &str) -> IResult<&str, &str> {
    recognize(parse_string_literal)(input)
}

fn braced_token(input: &str) -> IResult<&str, &str> {
    recognize(delimited(char('{'), take_till(|c: char| c == '}'), char('}')))(input)
}

fn bare_token(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c == ',' || c == '#' || c.is_whitespace())(input)
}

fn operand_token(input: &str) -> IResult<&str, &str> {
    alt((quoted_token, braced_token, bare_token))(input)
}

fn instruction_tokens(input: &str) -> IResult<&str, (&str, Option<Vec<&str>>)> {
    let (input, (_, opcode, operands, _, _)) = all_consuming(tuple((
        space0,
        opcode_token,
        opt(preceded(space1, separated_list1(delimited(space0, char(','), space0), operand_token))),
        space0,
        opt(preceded(char('#'), rest)),
    )))(input)?;
    Ok((input, (opcode, operands)))
}

/// Split an instruction line into its mnemonic and operand tokens. Quoted
/// strings and brace lists stay whole, a trailing comment is dropped.
pub fn tokenize(line: &str) -> Result<(String, Vec<String>), DecodeError> {
    let (_, (opcode, operands)) = instruction_tokens(line).map_err(|_| {
        let first = line.split_whitespace().next().unwrap_or_default();
        DecodeError::malformed(first, format!("cannot tokenize `{}`", line.trim()))
    })?;
    let operands = operands.unwrap_or_default().into_iter().map(str::to_string).collect();
    Ok((opcode.to_string(), operands))
}

fn registers_in_token(token: &str) -> Vec<Register> {
    if let Ok((_, r)) = all_consuming(parse_register)(token) {
        return vec![r];
    }
    if let Ok((_, l)) = all_consuming(parse_register_list)(token) {
        return l;
    }
    if let Ok((_, r)) = all_consuming(parse_register_range)(token) {
        return vec![r.start, r.end];
    }
    vec![]
}

/// Register names as written on an instruction line, in order. Ranges give
/// their two endpoints. Lines that are not instructions have none.
pub fn extract_register_tokens(line: &str) -> Vec<String> {
    if classify(line) != LineKind::Instruction {
        return vec![];
    }
    match tokenize(line) {
        Ok((_, operands)) => operands
            .iter()
            .flat_map(|t| registers_in_token(t))
            .map(|r| r.to_string())
            .collect(),
        Err(_) => vec![],
    }
}

/// The lines of one method body, owned exclusively by whoever is rewriting it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineBuffer {
    lines: Vec<String>,
}

impl LineBuffer {
    pub fn new(lines: Vec<String>) -> Self {
        LineBuffer { lines }
    }

    pub fn from_text(text: &str) -> Self {
        LineBuffer { lines: text.lines().map(str::to_string).collect() }
    }

    pub fn to_text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn set(&mut self, index: usize, line: String) {
        if let Some(slot) = self.lines.get_mut(index) {
            *slot = line;
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    /// Replace `start..end` with `new_lines` and return the index just past
    /// the inserted lines, which is where a forward scan continues.
    ///
    /// # Panics
    /// If `start > end` or `end > self.len()`.
    pub fn replace_range(&mut self, start: usize, end: usize, new_lines: Vec<String>) -> usize {
        let inserted = new_lines.len();
        self.lines.splice(start..end, new_lines);
        start + inserted
    }
}

impl From<Vec<String>> for LineBuffer {
    fn from(lines: Vec<String>) -> Self {
        LineBuffer::new(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_lines() {
        assert_eq!(classify(""), LineKind::Blank);
        assert_eq!(classify("    "), LineKind::Blank);
        assert_eq!(classify("    # a comment"), LineKind::Comment);
        assert_eq!(classify("    :cond_0"), LineKind::Label);
        assert_eq!(classify("    .locals 3"), LineKind::Directive);
        assert_eq!(classify("        0x1t"), LineKind::Data);
        assert_eq!(classify("        -0x1 -> :sswitch_0"), LineKind::Data);
        assert_eq!(classify("    move v0, v1"), LineKind::Instruction);
    }

    #[test]
    fn annotation_and_payload_contents_are_data() {
        let body = LineBuffer::from_text(
            "\
    .locals 2
    .annotation system Ldalvik/annotation/Throws;
        value = {
            Ljava/io/IOException;
        }
    .end annotation
    .param p1, \"name\"    # Ljava/lang/String;
    .param p2
        .annotation build Landroidx/annotation/Nullable;
        .end annotation
    .end param
    move v0, p1
    :array_0
    .array-data 4
        0x1
    .end array-data
    return-void",
        );
        use LineKind::*;
        assert_eq!(
            LineScanner::scan(body.lines()),
            vec![
                Directive, Directive, Data, Data, Data, Directive, Directive, Directive, Directive,
                Directive, Directive, Instruction, Label, Directive, Data, Directive, Instruction,
            ]
        );
        assert_eq!(classify("        value = {"), LineKind::Instruction);
    }

    #[test]
    fn decodable_instructions() {
        assert!(is_decodable_instruction("    const/4 v0, 0x1"));
        assert!(is_decodable_instruction("    return-void"));
        assert!(!is_decodable_instruction("    .locals 3"));
        assert!(!is_decodable_instruction("    frobnicate v0"));
        assert!(!is_decodable_instruction(""));
    }

    #[test]
    fn tokenize_lines() {
        let (op, args) = tokenize("    const-string v0, \"a, \\\"b\\\"\"   # comment").unwrap();
        assert_eq!(op, "const-string");
        assert_eq!(args, vec!["v0".to_string(), "\"a, \\\"b\\\"\"".to_string()]);

        let line = "invoke-virtual {v0, v1}, Ljava/lang/Object;->equals(Ljava/lang/Object;)Z";
        let (op, args) = tokenize(line).unwrap();
        assert_eq!(op, "invoke-virtual");
        assert_eq!(args[0], "{v0, v1}");

        let (op, args) = tokenize("    return-void").unwrap();
        assert_eq!(op, "return-void");
        assert!(args.is_empty());

        let (_, args) = tokenize("const/high16 v0, 0x3f800000    # 1.0f").unwrap();
        assert_eq!(args, vec!["v0".to_string(), "0x3f800000".to_string()]);

        assert!(tokenize("move v0,, v1").is_err());
    }

    #[test]
    fn register_tokens() {
        assert_eq!(extract_register_tokens("    add-int v0, v0, p1"), vec!["v0", "v0", "p1"]);
        assert_eq!(
            extract_register_tokens("    filled-new-array {v0, v1, p2}, [I"),
            vec!["v0", "v1", "p2"]
        );
        assert_eq!(
            extract_register_tokens("    invoke-static/range {v19 .. v21}, Lfoo;->bar(III)V"),
            vec!["v19", "v21"]
        );
        assert_eq!(extract_register_tokens("    const-string v3, \"v9 p2\""), vec!["v3"]);
        assert!(extract_register_tokens("    .param p1, \"x\"").is_empty());
    }

    #[test]
    fn replace_range_returns_resume_index() {
        let mut buf = LineBuffer::from_text("a\nb\nc\nd");
        let next = buf.replace_range(1, 2, vec!["x".into(), "y".into(), "z".into()]);
        assert_eq!(next, 4);
        assert_eq!(buf.to_text(), "a\nx\ny\nz\nc\nd");
        assert_eq!(buf.get(next), Some("c"));

        let next = buf.replace_range(0, 0, vec!["first".into()]);
        assert_eq!(next, 1);
        assert_eq!(buf.len(), 7);

        let next = buf.replace_range(5, 7, vec![]);
        assert_eq!(next, 5);
        assert_eq!(buf.lines().last().map(String::as_str), Some("z"));
    }
}
