/// parse task document with structure like " title1 key1: value1, value2 key2: value2 title2 key3:value3, value4" which has titles and
/// pairs key-vector of values. The document describes one benchmark experiment: where the data lives, which noise magnitudes
/// are swept, how the discovery engines are configured and where the log goes.
///
/// Example
/// ```
/// use RustedEqBench::Utils::task_parser::TaskDocument;
/// let task = TaskDocument::parse(
///     "experiment kind: lotka_volterra
///      noise magnitudes: 0, 0.01, 0.025 seed: 42
///      reference u: \"20.0 * u{power: 1.0} + 0.0 = du/dx1{power: 1.0}\"",
/// )
/// .unwrap();
/// assert_eq!(task.get_str("experiment", "kind").unwrap(), "lotka_volterra");
/// assert_eq!(task.get_f64_list("noise", "magnitudes").unwrap(), vec![0.0, 0.01, 0.025]);
/// ```
/*
 keys may start with a digit (factor codes like 0_11 are keys of the correspondence section), values are integers, floats,
 booleans, bare words or double-quoted strings; quoted strings may contain spaces, colons, commas and braces.
 Lines starting with //, # or % are comments.
*/
use crate::errors::{BenchError, Result};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{alpha1, alphanumeric1, char, multispace0, space0},
    combinator::{map, map_res, recognize},
    multi::{many0, many1, separated_list0},
    sequence::{delimited, pair, separated_pair, terminated},
};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

pub type SectionMap = BTreeMap<String, Vec<Value>>;
pub type DocumentMap = BTreeMap<String, SectionMap>;

/// enum to represent different value types:
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Float(f64),
    Integer(i64),
    Boolean(bool),
}

impl Value {
    pub fn as_string(&self) -> Option<&String> {
        if let Value::String(s) = self {
            Some(s)
        } else {
            None
        }
    }
    /// integers are accepted where floats are expected
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        if let Value::Integer(i) = self {
            Some(*i)
        } else {
            None
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        if let Value::Boolean(b) = self {
            Some(*b)
        } else {
            None
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Float(val) => write!(f, "{}", val),
            Value::Integer(val) => write!(f, "{}", val),
            Value::Boolean(val) => write!(f, "{}", val),
        }
    }
}

/// Parses a title (word characters without spaces, starting with a letter or underscore)
pub(crate) fn parse_title(input: &str) -> IResult<&str, String> {
    let parser = recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ));
    let mut parser = map(parser, String::from);
    let (input, result) = parser.parse(input)?;
    Ok((input.trim_start(), result))
}

/// Parses a key; unlike titles keys may start with a digit and contain '^'
pub(crate) fn parse_key(input: &str) -> IResult<&str, String> {
    let parser = recognize(many1(alt((alphanumeric1, tag("_"), tag("^")))));
    let mut parser = map(parser, String::from);
    parser.parse(input)
}

fn parse_quoted(input: &str) -> IResult<&str, Value> {
    let mut parser = map(
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
        |s: &str| Value::String(s.to_string()),
    );
    parser.parse(input)
}

fn parse_bare(input: &str) -> IResult<&str, Value> {
    let value_parser = take_while1(|c: char| !matches!(c, ',' | ' ' | '\t' | '\n' | '\r' | ';' | '"'));
    let mut value_parser = map_res(value_parser, |s: &str| -> std::result::Result<Value, String> {
        if let Ok(val) = s.parse::<i64>() {
            Ok(Value::Integer(val))
        } else if let Ok(val) = s.parse::<f64>() {
            Ok(Value::Float(val))
        } else if let Ok(val) = s.parse::<bool>() {
            Ok(Value::Boolean(val))
        } else {
            Ok(Value::String(s.to_string()))
        }
    });
    value_parser.parse(input)
}

pub(crate) fn parse_value(input: &str) -> IResult<&str, Value> {
    alt((parse_quoted, parse_bare)).parse(input)
}

/// comma separated values on the same line as the key (an empty list is allowed)
pub(crate) fn parse_value_list(input: &str) -> IResult<&str, Vec<Value>> {
    let (input, _) = space0(input)?;
    let separator_coma = delimited(space0, tag(","), multispace0);
    let mut value_parser = separated_list0(separator_coma, parse_value);
    value_parser.parse(input)
}

pub(crate) fn parse_key_value_pair(input: &str) -> IResult<&str, (String, Vec<Value>)> {
    let colon_separator = delimited(space0, tag(":"), space0);
    let mut parser = separated_pair(parse_key, colon_separator, parse_value_list);
    parser.parse(input)
}

pub(crate) fn parse_section(input: &str) -> IResult<&str, (String, SectionMap)> {
    let (input, _) = multispace0(input)?;
    let (input, title) = parse_title(input)?;
    let (input, _) = multispace0(input)?;
    let mut parser = many1(terminated(parse_key_value_pair, multispace0));
    let (input, pairs) = parser.parse(input)?;

    let section_map: SectionMap = pairs.into_iter().collect();
    Ok((input, (title, section_map)))
}

/// Filters out comment lines (starting with //, # or %)
pub(crate) fn filter_comments(input: &str) -> String {
    input
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.starts_with("//")
                && !trimmed.starts_with('#')
                && !trimmed.starts_with('%')
                && !trimmed.is_empty()
        })
        .collect::<Vec<&str>>()
        .join("\n")
}

/// Parses the entire document; sections with the same title are merged, later keys win
pub fn parse_document(input: &str) -> IResult<&str, DocumentMap> {
    let mut parser = many1(delimited(multispace0, parse_section, multispace0));
    let (input, sections) = parser.parse(input)?;
    let mut result: DocumentMap = BTreeMap::new();
    for (title, section_map) in sections {
        result.entry(title).or_default().extend(section_map);
    }
    Ok((input, result))
}

/// parsed task plus the directory relative paths are resolved against
#[derive(Debug, Clone)]
pub struct TaskDocument {
    pub sections: DocumentMap,
    pub base_dir: PathBuf,
}

impl TaskDocument {
    pub fn parse(input: &str) -> Result<TaskDocument> {
        let filtered = filter_comments(input);
        match parse_document(&filtered) {
            Ok((remaining, sections)) => {
                if !remaining.trim().is_empty() {
                    return Err(BenchError::TaskParse(format!(
                        "Failed to parse entire document. Remaining: '{}'",
                        remaining
                    )));
                }
                Ok(TaskDocument {
                    sections,
                    base_dir: PathBuf::from("."),
                })
            }
            Err(e) => Err(BenchError::TaskParse(format!("Parsing error: {:?}", e))),
        }
    }

    /// read the task file; relative paths inside it are resolved against its directory
    pub fn from_file(path: &Path) -> Result<TaskDocument> {
        if !path.exists() {
            return Err(BenchError::DataFileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        let mut task = TaskDocument::parse(&content)?;
        task.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(task)
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    pub fn section(&self, section: &str) -> Option<&SectionMap> {
        self.sections.get(section)
    }

    fn missing(section: &str, key: &str) -> BenchError {
        BenchError::MissingTaskField {
            section: section.to_string(),
            key: key.to_string(),
        }
    }

    fn invalid(section: &str, key: &str, value: &[Value]) -> BenchError {
        BenchError::InvalidTaskValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    pub fn values(&self, section: &str, key: &str) -> Result<&[Value]> {
        self.sections
            .get(section)
            .and_then(|s| s.get(key))
            .map(|v| v.as_slice())
            .ok_or_else(|| Self::missing(section, key))
    }

    fn single(&self, section: &str, key: &str) -> Result<&Value> {
        let values = self.values(section, key)?;
        match values {
            [value] => Ok(value),
            _ => Err(Self::invalid(section, key, values)),
        }
    }

    pub fn get_str(&self, section: &str, key: &str) -> Result<String> {
        Ok(self.single(section, key)?.to_string())
    }

    pub fn get_f64(&self, section: &str, key: &str) -> Result<f64> {
        let value = self.single(section, key)?;
        value
            .as_float()
            .ok_or_else(|| Self::invalid(section, key, std::slice::from_ref(value)))
    }

    pub fn get_usize(&self, section: &str, key: &str) -> Result<usize> {
        let value = self.single(section, key)?;
        value
            .as_integer()
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| Self::invalid(section, key, std::slice::from_ref(value)))
    }

    pub fn get_u64(&self, section: &str, key: &str) -> Result<u64> {
        let value = self.single(section, key)?;
        value
            .as_integer()
            .and_then(|i| u64::try_from(i).ok())
            .ok_or_else(|| Self::invalid(section, key, std::slice::from_ref(value)))
    }

    pub fn get_bool(&self, section: &str, key: &str) -> Result<bool> {
        let value = self.single(section, key)?;
        value
            .as_boolean()
            .ok_or_else(|| Self::invalid(section, key, std::slice::from_ref(value)))
    }

    pub fn get_f64_list(&self, section: &str, key: &str) -> Result<Vec<f64>> {
        let values = self.values(section, key)?;
        values
            .iter()
            .map(|v| v.as_float())
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| Self::invalid(section, key, values))
    }

    pub fn get_str_list(&self, section: &str, key: &str) -> Result<Vec<String>> {
        Ok(self
            .values(section, key)?
            .iter()
            .map(|v| v.to_string())
            .collect())
    }

    fn has_key(&self, section: &str, key: &str) -> bool {
        self.sections
            .get(section)
            .is_some_and(|s| s.contains_key(key))
    }

    pub fn opt_str(&self, section: &str, key: &str) -> Result<Option<String>> {
        if self.has_key(section, key) {
            self.get_str(section, key).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn opt_f64(&self, section: &str, key: &str) -> Result<Option<f64>> {
        if self.has_key(section, key) {
            self.get_f64(section, key).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn opt_usize(&self, section: &str, key: &str) -> Result<Option<usize>> {
        if self.has_key(section, key) {
            self.get_usize(section, key).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn opt_u64(&self, section: &str, key: &str) -> Result<Option<u64>> {
        if self.has_key(section, key) {
            self.get_u64(section, key).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn opt_bool(&self, section: &str, key: &str) -> Result<Option<bool>> {
        if self.has_key(section, key) {
            self.get_bool(section, key).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn opt_f64_list(&self, section: &str, key: &str) -> Result<Option<Vec<f64>>> {
        if self.has_key(section, key) {
            self.get_f64_list(section, key).map(Some)
        } else {
            Ok(None)
        }
    }

    /// path value resolved once against the task directory
    pub fn get_path(&self, section: &str, key: &str) -> Result<PathBuf> {
        let raw = PathBuf::from(self.get_str(section, key)?);
        if raw.is_absolute() {
            Ok(raw)
        } else {
            Ok(self.base_dir.join(raw))
        }
    }

    pub fn opt_path(&self, section: &str, key: &str) -> Result<Option<PathBuf>> {
        if self.has_key(section, key) {
            self.get_path(section, key).map(Some)
        } else {
            Ok(None)
        }
    }
}
