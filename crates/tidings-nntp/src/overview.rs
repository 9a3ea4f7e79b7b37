//! Overview format descriptors and overview record parsing
//! ([RFC 3977 §8.3–8.4](https://datatracker.ietf.org/doc/html/rfc3977#section-8.3),
//! [RFC 2980 §2.8](https://datatracker.ietf.org/doc/html/rfc2980#section-2.8)).

use serde::ser::{Serialize, SerializeMap, Serializer};

pub const NUMBER_FIELD: &str = "number";

const FULL_SUFFIX: &str = ":full";

/// Ordered description of the tab-separated fields of an overview line.
///
/// The first field is always the synthetic article `number`; the rest come
/// from `LIST OVERVIEW.FMT` in server order. A field marked *full* is sent
/// with its header name (`Xref: host 1:2`) and has that prefix removed when
/// parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverviewFormat {
    fields: Vec<(String, bool)>,
}

impl OverviewFormat {
    /// Build a descriptor from `(name, full)` pairs; `number` is prepended.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        let mut all = vec![(NUMBER_FIELD.to_string(), false)];
        for (name, full) in fields {
            let name = name.into().to_ascii_lowercase();
            if name.is_empty() || name == NUMBER_FIELD {
                continue;
            }
            all.push((name, full));
        }
        Self { fields: all }
    }

    /// Parse the body of a `LIST OVERVIEW.FMT` response.
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        Self::new(lines.iter().filter_map(|line| parse_format_line(line.as_ref())))
    }

    pub fn fields(&self) -> &[(String, bool)] {
        &self.fields
    }

    pub fn is_full(&self, name: &str) -> bool {
        self.fields
            .iter()
            .any(|(field, full)| *full && field.eq_ignore_ascii_case(name))
    }
}

/// The format every server must support when it has no `LIST OVERVIEW.FMT`.
impl Default for OverviewFormat {
    fn default() -> Self {
        Self::new([
            ("subject", false),
            ("from", false),
            ("date", false),
            ("message-id", false),
            ("references", false),
            ("bytes", false),
            ("lines", false),
            ("xref", true),
        ])
    }
}

fn parse_format_line(line: &str) -> Option<(String, bool)> {
    let line = line.trim();
    let (name, full) = match line.len().checked_sub(FULL_SUFFIX.len()) {
        Some(split)
            if line.is_char_boundary(split)
                && line[split..].eq_ignore_ascii_case(FULL_SUFFIX) =>
        {
            (&line[..split], true)
        }
        _ => (line, false),
    };
    let name = name.strip_suffix(':').unwrap_or(name);
    let name = name.strip_prefix(':').unwrap_or(name);
    if name.is_empty() {
        return None;
    }
    Some((name.to_ascii_lowercase(), full))
}

/// One parsed overview line: field values in descriptor order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Overview {
    fields: Vec<(String, String)>,
}

impl Overview {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn number(&self) -> Option<u64> {
        self.get(NUMBER_FIELD)?.parse().ok()
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Overview {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Split each line on tabs and assign the segments to `format`'s fields.
///
/// Full fields are looked up by header name: the positional segment is used
/// when it carries the `Name:` prefix, otherwise the first segment that does.
/// Servers are inconsistent about where optional headers land, so a missing
/// prefix falls back to the positional segment as-is.
pub fn parse_overview<S: AsRef<str>>(lines: &[S], format: &OverviewFormat) -> Vec<Overview> {
    lines
        .iter()
        .map(|line| parse_overview_line(line.as_ref(), format))
        .collect()
}

fn parse_overview_line(line: &str, format: &OverviewFormat) -> Overview {
    let segments: Vec<&str> = line.split('\t').collect();
    let fields = format
        .fields()
        .iter()
        .enumerate()
        .map(|(idx, (name, full))| {
            let positional = segments.get(idx).copied();
            let value = if *full {
                full_value(name, positional, &segments)
            } else {
                positional.unwrap_or_default().to_string()
            };
            (name.clone(), value)
        })
        .collect();
    Overview { fields }
}

/// Value of a full field: everything after the first `:` of the matching
/// segment, with surrounding whitespace trimmed. `Xref: a:1`, `Xref:a:1` and
/// `Xref:  a:1 ` all yield `a:1`; only the header name and its colon are ever
/// removed, never a colon inside the value.
fn full_value(name: &str, positional: Option<&str>, segments: &[&str]) -> String {
    let segment = positional
        .filter(|s| has_header_prefix(s, name))
        .or_else(|| segments.iter().copied().find(|s| has_header_prefix(s, name)));
    match segment {
        Some(s) => match s.split_once(':') {
            Some((_, value)) => value.trim().to_string(),
            None => s.to_string(),
        },
        None => positional.unwrap_or_default().to_string(),
    }
}

fn has_header_prefix(segment: &str, name: &str) -> bool {
    segment
        .split_once(':')
        .is_some_and(|(header, _)| header.trim().eq_ignore_ascii_case(name))
}
