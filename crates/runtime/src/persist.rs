//! On-disk snapshots of the methodology and agency
//!
//! Two text files in the persistence directory, line-oriented and
//! version-prefixed:
//!
//! ```text
//! methodology.agerun              agency.agerun
//! ------------------             -------------------
//! AGERUN_METHODOLOGY 1           AGERUN_AGENCY 1
//! <method_count>                 <next_agent_id>
//! <name> <maj> <min> <pat> <n>   <agent_count>
//! <n body lines>                 <id> <method> <maj> <min> <pat>
//! ...                            <memory serialization>
//! ```
//!
//! Memory maps use a recursive grammar: `int <i>`, `double <f>`,
//! `string <escaped>`, `map <count>` followed by `<key> <value>` lines,
//! `list <count>` followed by value lines. Strings escape `\n` and `\\`
//! so every value stays on one line.
//!
//! A missing file or an unknown header leaves the corresponding registry
//! empty (logged); a recognized header carrying an unsupported format
//! version is refused with [`PersistError::UnsupportedVersion`]. Files are
//! never partially loaded, and the caller treats every load failure as
//! non-fatal.

use crate::agency::Agency;
use crate::method::Method;
use crate::methodology::Methodology;
use agerun_core::{ListValue, Log, MapValue, Value, Version};
use agerun_lang::InstructionParser;
use std::fmt;
use std::fs;
use std::path::Path;

pub const METHODOLOGY_FILE: &str = "methodology.agerun";
pub const AGENCY_FILE: &str = "agency.agerun";

const METHODOLOGY_HEADER: &str = "AGERUN_METHODOLOGY";
const AGENCY_HEADER: &str = "AGERUN_AGENCY";
const FORMAT_VERSION: u32 = 1;

/// Persistence failure: I/O, a malformed line, or a snapshot written by an
/// unsupported format version.
#[derive(Debug)]
pub enum PersistError {
    Io(std::io::Error),
    Format { line: usize, message: String },
    UnsupportedVersion { header: String, found: u32 },
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistError::Io(e) => write!(f, "i/o error: {}", e),
            PersistError::Format { line, message } => {
                write!(f, "format error at line {}: {}", line, message)
            }
            PersistError::UnsupportedVersion { header, found } => {
                write!(
                    f,
                    "{} snapshot has format version {}, expected {}",
                    header, found, FORMAT_VERSION
                )
            }
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistError::Io(e) => Some(e),
            PersistError::Format { .. } | PersistError::UnsupportedVersion { .. } => None,
        }
    }
}

impl From<std::io::Error> for PersistError {
    fn from(e: std::io::Error) -> Self {
        PersistError::Io(e)
    }
}

/// Write `methodology.agerun` under `dir`.
pub fn save_methodology(dir: &Path, methodology: &Methodology) -> Result<(), PersistError> {
    let mut out = String::new();
    out.push_str(&format!("{} {}\n", METHODOLOGY_HEADER, FORMAT_VERSION));
    out.push_str(&format!("{}\n", methodology.method_count()));
    for method in methodology.iter() {
        let version = method.version();
        let body_lines: Vec<&str> = method.source().lines().collect();
        out.push_str(&format!(
            "{} {} {} {} {}\n",
            method.name(),
            version.major,
            version.minor,
            version.patch,
            body_lines.len()
        ));
        for line in body_lines {
            out.push_str(line);
            out.push('\n');
        }
    }
    fs::write(dir.join(METHODOLOGY_FILE), out)?;
    Ok(())
}

/// Read `methodology.agerun` from `dir`, recompiling each method body.
/// A missing file or unknown header yields an empty registry; an
/// unsupported format version is refused.
pub fn load_methodology(
    dir: &Path,
    parser: &InstructionParser,
    log: &Log,
) -> Result<Methodology, PersistError> {
    let path = dir.join(METHODOLOGY_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Methodology::new()),
        Err(e) => return Err(e.into()),
    };
    let mut lines = LineReader::new(&content);

    if !check_header(&mut lines, METHODOLOGY_HEADER, log)? {
        return Ok(Methodology::new());
    }

    let mut methodology = Methodology::new();
    let count: usize = lines.parse_next("method count")?;
    for _ in 0..count {
        let header = lines.next_line("method header")?;
        let mut fields = header.split_whitespace();
        let name = fields
            .next()
            .ok_or_else(|| lines.format_error("missing method name"))?
            .to_string();
        let version = Version::new(
            lines.parse_field(fields.next(), "major")?,
            lines.parse_field(fields.next(), "minor")?,
            lines.parse_field(fields.next(), "patch")?,
        );
        let body_line_count: usize = lines.parse_field(fields.next(), "body line count")?;
        let mut body = String::new();
        for i in 0..body_line_count {
            if i > 0 {
                body.push('\n');
            }
            body.push_str(lines.next_line("method body line")?);
        }
        match Method::compile(parser, name.clone(), version, body) {
            Ok(method) => {
                if methodology.register(method).is_err() {
                    log.error(format!(
                        "skipping duplicate persisted method '{}' {}",
                        name, version
                    ));
                }
            }
            Err(error) => {
                log.error(format!(
                    "skipping persisted method '{}' {}: {}",
                    name, version, error
                ));
            }
        }
    }
    Ok(methodology)
}

/// Write `agency.agerun` under `dir`.
pub fn save_agency(dir: &Path, agency: &Agency) -> Result<(), PersistError> {
    let mut out = String::new();
    out.push_str(&format!("{} {}\n", AGENCY_HEADER, FORMAT_VERSION));
    out.push_str(&format!("{}\n", agency.next_id()));
    out.push_str(&format!("{}\n", agency.count_agents()));
    for agent in agency.iter() {
        let version = agent.method().version();
        out.push_str(&format!(
            "{} {} {} {} {}\n",
            agent.id(),
            agent.method().name(),
            version.major,
            version.minor,
            version.patch
        ));
        write_map(&mut out, agent.memory());
    }
    fs::write(dir.join(AGENCY_FILE), out)?;
    Ok(())
}

/// Read `agency.agerun` from `dir`. Agents whose method is not registered
/// are skipped with a log record.
pub fn load_agency(
    dir: &Path,
    methodology: &Methodology,
    log: &Log,
) -> Result<Agency, PersistError> {
    let path = dir.join(AGENCY_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Agency::new()),
        Err(e) => return Err(e.into()),
    };
    let mut lines = LineReader::new(&content);

    if !check_header(&mut lines, AGENCY_HEADER, log)? {
        return Ok(Agency::new());
    }

    let mut agency = Agency::new();
    let next_id: i64 = lines.parse_next("next agent id")?;
    let count: usize = lines.parse_next("agent count")?;
    for _ in 0..count {
        let header = lines.next_line("agent header")?;
        let mut fields = header.split_whitespace();
        let id: i64 = lines.parse_field(fields.next(), "agent id")?;
        let name = fields
            .next()
            .ok_or_else(|| lines.format_error("missing method name"))?
            .to_string();
        let version = Version::new(
            lines.parse_field(fields.next(), "major")?,
            lines.parse_field(fields.next(), "minor")?,
            lines.parse_field(fields.next(), "patch")?,
        );
        let memory = match read_value(&mut lines)? {
            Value::Map(map) => map,
            _ => return Err(lines.format_error("agent memory must be a map")),
        };
        match methodology.get(&name, version) {
            Some(method) => {
                if !agency.restore_agent(id, method, memory) {
                    log.error(format!("skipping persisted agent {}: id not restorable", id));
                }
            }
            None => {
                log.error(format!(
                    "skipping persisted agent {}: method '{}' {} not registered",
                    id, name, version
                ));
            }
        }
    }
    agency.set_next_id(next_id);
    Ok(agency)
}

/// Validate `<HEADER> <version>` on the first line. `Ok(false)` means the
/// file is not one of ours and should be ignored; a recognized header
/// carrying any other format version is refused with
/// [`PersistError::UnsupportedVersion`] rather than half-loaded.
fn check_header(
    lines: &mut LineReader<'_>,
    expected: &str,
    log: &Log,
) -> Result<bool, PersistError> {
    let Ok(header) = lines.next_line("header") else {
        log.error(format!("{}: empty snapshot file ignored", expected));
        return Ok(false);
    };
    let mut fields = header.split_whitespace();
    let tag = fields.next().unwrap_or("");
    if tag != expected {
        log.error(format!(
            "unrecognized snapshot header '{}': file ignored",
            header
        ));
        return Ok(false);
    }
    let found: u32 = lines.parse_field(fields.next(), "format version")?;
    if found != FORMAT_VERSION {
        return Err(PersistError::UnsupportedVersion {
            header: expected.to_string(),
            found,
        });
    }
    Ok(true)
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn write_map(out: &mut String, map: &MapValue) {
    out.push_str(&format!("map {}\n", map.len()));
    for (key, value) in map.iter() {
        if key.is_empty() || key.chars().any(char::is_whitespace) {
            // Keys carry no escaping in this format; such a key cannot be
            // round-tripped.
            tracing::warn!(key, "skipping unserializable map key");
            continue;
        }
        out.push_str(key);
        out.push(' ');
        write_value_body(out, value);
    }
}

fn write_value_body(out: &mut String, value: &Value) {
    match value {
        Value::Integer(n) => out.push_str(&format!("int {}\n", n)),
        Value::Double(d) => out.push_str(&format!("double {}\n", d)),
        Value::String(s) => out.push_str(&format!("string {}\n", escape(s))),
        Value::Map(map) => write_map(out, map),
        Value::List(list) => {
            out.push_str(&format!("list {}\n", list.count()));
            for item in list.iter() {
                write_value_body(out, item);
            }
        }
    }
}

fn read_value(lines: &mut LineReader<'_>) -> Result<Value, PersistError> {
    let line = lines.next_line("value")?;
    read_value_head(line.to_string(), lines)
}

/// Decode one value whose head line (type token + inline payload) has
/// already been read; containers consume the following lines.
fn read_value_head(head: String, lines: &mut LineReader<'_>) -> Result<Value, PersistError> {
    let (tag, payload) = match head.split_once(' ') {
        Some((tag, payload)) => (tag, payload),
        None => (head.as_str(), ""),
    };
    match tag {
        "int" => payload
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| lines.format_error("invalid integer value")),
        "double" => payload
            .trim()
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| lines.format_error("invalid double value")),
        "string" => Ok(Value::String(unescape(payload))),
        "map" => {
            let count: usize = payload
                .trim()
                .parse()
                .map_err(|_| lines.format_error("invalid map entry count"))?;
            let mut map = MapValue::new();
            for _ in 0..count {
                let entry = lines.next_line("map entry")?;
                let (key, value_head) = entry
                    .split_once(' ')
                    .ok_or_else(|| lines.format_error("map entry missing value"))?;
                let key = key.to_string();
                let value = read_value_head(value_head.to_string(), lines)?;
                map.insert(key, value);
            }
            Ok(Value::Map(map))
        }
        "list" => {
            let count: usize = payload
                .trim()
                .parse()
                .map_err(|_| lines.format_error("invalid list item count"))?;
            let mut list = ListValue::new();
            for _ in 0..count {
                list.add_last(read_value(lines)?);
            }
            Ok(Value::List(list))
        }
        other => Err(lines.format_error(format!("unknown value type '{}'", other))),
    }
}

/// Line cursor that tracks the current line number for error reports.
struct LineReader<'a> {
    lines: std::str::Lines<'a>,
    line_no: usize,
}

impl<'a> LineReader<'a> {
    fn new(content: &'a str) -> Self {
        LineReader {
            lines: content.lines(),
            line_no: 0,
        }
    }

    fn next_line(&mut self, what: &str) -> Result<&'a str, PersistError> {
        match self.lines.next() {
            Some(line) => {
                self.line_no += 1;
                Ok(line)
            }
            None => Err(PersistError::Format {
                line: self.line_no + 1,
                message: format!("unexpected end of file, expected {}", what),
            }),
        }
    }

    fn parse_next<T: std::str::FromStr>(&mut self, what: &str) -> Result<T, PersistError> {
        let line = self.next_line(what)?;
        line.trim()
            .parse()
            .map_err(|_| self.format_error(format!("invalid {}", what)))
    }

    fn parse_field<T: std::str::FromStr>(
        &self,
        field: Option<&str>,
        what: &str,
    ) -> Result<T, PersistError> {
        field
            .and_then(|f| f.parse().ok())
            .ok_or_else(|| self.format_error(format!("invalid {}", what)))
    }

    fn format_error(&self, message: impl Into<String>) -> PersistError {
        PersistError::Format {
            line: self.line_no,
            message: message.into(),
        }
    }
}
