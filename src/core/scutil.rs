//! Parser for `scutil` dynamic store dumps
//!
//! `scutil` prints values read with `show <key>` as nested blocks:
//!
//! ```text
//! <dictionary> {
//!   DomainNameDns : example.com
//!   SearchNodes : <array> {
//!     0 : /Local/Default
//!   }
//! }
//! ```
//!
//! A key that does not exist prints `No such key`.

use std::collections::BTreeMap;

const DICTIONARY_OPEN: &str = "<dictionary> {";
const ARRAY_OPEN: &str = "<array> {";
const BLOCK_CLOSE: &str = "}";
const NO_SUCH_KEY: &str = "No such key";

/// A value read from the dynamic store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreValue {
    Scalar(String),
    Array(Vec<StoreValue>),
    Dictionary(BTreeMap<String, StoreValue>),
}

impl StoreValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StoreValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&StoreValue> {
        match self {
            StoreValue::Dictionary(entries) => entries.get(key),
            _ => None,
        }
    }

    /// Scalar members of an array, in order
    pub fn strings(&self) -> Option<Vec<String>> {
        match self {
            StoreValue::Array(items) => Some(
                items
                    .iter()
                    .filter_map(StoreValue::as_str)
                    .map(str::to_string)
                    .collect(),
            ),
            _ => None,
        }
    }
}

/// Parse the output of `show <key>`
///
/// Returns `Ok(None)` when the key does not exist.
pub fn parse(output: &str) -> Result<Option<StoreValue>, String> {
    let mut lines = output.lines().map(str::trim).filter(|line| !line.is_empty());

    let first = match lines.next() {
        Some(line) => line,
        None => return Ok(None),
    };
    if first.eq_ignore_ascii_case(NO_SUCH_KEY) {
        return Ok(None);
    }

    let value = parse_value(first, &mut lines)?;
    if let Some(extra) = lines.next() {
        return Err(format!("trailing line '{}'", extra));
    }
    Ok(Some(value))
}

fn parse_value<'a, I>(head: &'a str, lines: &mut I) -> Result<StoreValue, String>
where
    I: Iterator<Item = &'a str>,
{
    match head {
        DICTIONARY_OPEN => {
            let mut entries = BTreeMap::new();
            for (key, value) in parse_block(lines)? {
                entries.insert(key.to_string(), value);
            }
            Ok(StoreValue::Dictionary(entries))
        }
        ARRAY_OPEN => {
            let mut items = Vec::new();
            for (index, value) in parse_block(lines)? {
                if index.parse::<usize>().is_err() {
                    return Err(format!("array index '{}' is not a number", index));
                }
                items.push(value);
            }
            Ok(StoreValue::Array(items))
        }
        scalar => Ok(StoreValue::Scalar(scalar.to_string())),
    }
}

/// Read `key : value` entries up to the closing brace
fn parse_block<'a, I>(lines: &mut I) -> Result<Vec<(&'a str, StoreValue)>, String>
where
    I: Iterator<Item = &'a str>,
{
    let mut entries = Vec::new();
    loop {
        let line = lines
            .next()
            .ok_or_else(|| "unterminated block".to_string())?;
        if line == BLOCK_CLOSE {
            return Ok(entries);
        }

        let (key, head) = line
            .split_once(" : ")
            .or_else(|| line.strip_suffix(" :").map(|key| (key, "")))
            .ok_or_else(|| format!("unexpected line '{}'", line))?;

        let value = parse_value(head, lines)?;
        entries.push((key.trim(), value));
    }
}
