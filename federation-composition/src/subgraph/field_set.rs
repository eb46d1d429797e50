//! The small selection-set grammar of `@key`, `@requires` and `@provides` field sets.
use std::fmt;

use apollo_compiler::Name;
use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::alpha1;
use nom::character::complete::alphanumeric1;
use nom::character::complete::char;
use nom::combinator::map;
use nom::combinator::map_res;
use nom::combinator::opt;
use nom::combinator::recognize;
use nom::multi::many0_count;
use nom::multi::many1;
use nom::sequence::delimited;
use nom::sequence::pair;
use nom::sequence::preceded;
use nom::sequence::terminated;
use nom::sequence::tuple;

/// A parsed field set.
///
/// The original text is kept for display, so diagnostics and routing metadata show the field set
/// exactly as the subgraph wrote it. Equality is structural.
#[derive(Debug, Clone)]
pub struct FieldSet {
    source: String,
    pub selections: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Field(FieldSelection),
    InlineFragment(InlineFragment),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelection {
    pub name: Name,
    pub selections: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineFragment {
    pub type_condition: Name,
    pub selections: Vec<Selection>,
}

impl FieldSet {
    pub fn parse(source: &str) -> Result<FieldSet, String> {
        match terminated(selections, spaces_or_comments)(source) {
            Ok(("", selections)) => Ok(FieldSet {
                source: source.to_string(),
                selections,
            }),
            Ok((rest, _)) => Err(syntax_error(source, rest)),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                Err(syntax_error(source, e.input))
            }
            Err(nom::Err::Incomplete(_)) => Err("Syntax error: unexpected end of input".to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Names of the fields selected at the top level, ignoring inline fragments.
    pub fn top_level_fields(&self) -> impl Iterator<Item = &Name> {
        self.selections.iter().filter_map(|selection| match selection {
            Selection::Field(field) => Some(&field.name),
            Selection::InlineFragment(_) => None,
        })
    }
}

fn syntax_error(source: &str, rest: &str) -> String {
    let offset = source.len() - rest.len();
    match rest.chars().next() {
        Some(c) => format!("Syntax error: unexpected \"{c}\" at offset {offset}"),
        None => "Syntax error: expected a selection".to_string(),
    }
}

impl PartialEq for FieldSet {
    fn eq(&self, other: &Self) -> bool {
        self.selections == other.selections
    }
}

impl Eq for FieldSet {}

impl fmt::Display for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (head, selections) = match self {
            Selection::Field(field) => (field.name.to_string(), &field.selections),
            Selection::InlineFragment(fragment) => {
                (format!("... on {}", fragment.type_condition), &fragment.selections)
            }
        };
        f.write_str(&head)?;
        if !selections.is_empty() {
            f.write_str(" { ")?;
            for (i, selection) in selections.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                selection.fmt(f)?;
            }
            f.write_str(" }")?;
        }
        Ok(())
    }
}

// Whitespace, commas and comments are all insignificant in a field set.
fn spaces_or_comments(input: &str) -> IResult<&str, &str> {
    let mut suffix = input;
    loop {
        suffix = suffix.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        let mut chars = suffix.chars();
        if let Some('#') = chars.next() {
            for c in chars.by_ref() {
                if c == '\n' {
                    break;
                }
            }
            suffix = chars.as_str();
        } else {
            return Ok((suffix, &input[0..input.len() - suffix.len()]));
        }
    }
}

fn name(input: &str) -> IResult<&str, Name> {
    map_res(
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0_count(alt((alphanumeric1, tag("_")))),
        )),
        Name::new,
    )(input)
}

fn selections(input: &str) -> IResult<&str, Vec<Selection>> {
    many1(preceded(spaces_or_comments, selection))(input)
}

fn sub_selections(input: &str) -> IResult<&str, Vec<Selection>> {
    delimited(
        tuple((spaces_or_comments, char('{'))),
        selections,
        tuple((spaces_or_comments, char('}'))),
    )(input)
}

fn selection(input: &str) -> IResult<&str, Selection> {
    alt((
        map(inline_fragment, Selection::InlineFragment),
        map(field, Selection::Field),
    ))(input)
}

fn field(input: &str) -> IResult<&str, FieldSelection> {
    map(pair(name, opt(sub_selections)), |(name, selections)| {
        FieldSelection {
            name,
            selections: selections.unwrap_or_default(),
        }
    })(input)
}

fn inline_fragment(input: &str) -> IResult<&str, InlineFragment> {
    map(
        tuple((
            tag("..."),
            spaces_or_comments,
            tag("on"),
            spaces_or_comments,
            name,
            sub_selections,
        )),
        |(_, _, _, _, type_condition, selections)| InlineFragment {
            type_condition,
            selections,
        },
    )(input)
}
