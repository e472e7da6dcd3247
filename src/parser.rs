use indexmap::IndexMap;

use crate::error::{ConvertError, Result};
use crate::model::ChangeSet;
use crate::target::format_key;

/// One top level entry of a changelog file, before includes are expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    ChangeSet(ChangeSet),
    Include { file: String, relative: bool },
    IncludeAll { path: String, relative: bool },
}

/// A single changelog file as read by a parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawChangelog {
    pub logical_file_path: Option<String>,
    pub entries: Vec<Entry>,
}

/// Reads one changelog file. `path` is recorded on changesets that carry
/// no `logicalFilePath` of their own.
pub trait ChangelogParser {
    fn parse(&self, path: &str, content: &str) -> Result<RawChangelog>;
}

pub struct XmlParser;

impl ChangelogParser for XmlParser {
    fn parse(&self, path: &str, content: &str) -> Result<RawChangelog> {
        crate::xml::parse_changelog(path, content)
    }
}

pub struct YamlParser;

impl ChangelogParser for YamlParser {
    fn parse(&self, path: &str, content: &str) -> Result<RawChangelog> {
        let doc: serde_json::Value = serde_yaml::from_str(content)
            .map_err(|e| ConvertError::parse(format!("{path}: {e}")))?;
        crate::tree::parse_document(path, &doc)
    }
}

pub struct JsonParser;

impl ChangelogParser for JsonParser {
    fn parse(&self, path: &str, content: &str) -> Result<RawChangelog> {
        let doc: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| ConvertError::parse(format!("{path}: {e}")))?;
        crate::tree::parse_document(path, &doc)
    }
}

pub struct FormattedSqlParser;

impl ChangelogParser for FormattedSqlParser {
    fn parse(&self, path: &str, content: &str) -> Result<RawChangelog> {
        crate::sql::parse_changelog(path, content)
    }
}

pub type ParserCtor = fn() -> Box<dyn ChangelogParser>;

/// Maps a file extension to the parser for that format.
pub struct ParserRegistry {
    entries: IndexMap<String, ParserCtor>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("xml", xml);
        registry.register("yaml", yaml);
        registry.register("yml", yaml);
        registry.register("json", json);
        registry.register("sql", formatted_sql);
        registry
    }
}

fn xml() -> Box<dyn ChangelogParser> {
    Box::new(XmlParser)
}

fn yaml() -> Box<dyn ChangelogParser> {
    Box::new(YamlParser)
}

fn json() -> Box<dyn ChangelogParser> {
    Box::new(JsonParser)
}

fn formatted_sql() -> Box<dyn ChangelogParser> {
    Box::new(FormattedSqlParser)
}

impl ParserRegistry {
    pub fn empty() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    pub fn register(&mut self, key: &str, ctor: ParserCtor) {
        self.entries.insert(key.to_lowercase(), ctor);
    }

    pub fn supports(&self, path: &str) -> bool {
        format_key(path).is_some_and(|key| self.entries.contains_key(&key))
    }

    /// Parser for `path`, chosen by its extension.
    pub fn lookup(&self, path: &str) -> Result<Box<dyn ChangelogParser>> {
        let key = format_key(path)
            .ok_or_else(|| ConvertError::parse(format!("{path}: no file extension")))?;
        let ctor = self
            .entries
            .get(&key)
            .ok_or_else(|| ConvertError::parse(format!("{path}: no parser for '.{key}' files")))?;
        Ok(ctor())
    }
}

/// Path a changeset records: its own `logicalFilePath`, else the file's,
/// else where it was read from.
pub(crate) fn recorded_path(own: Option<String>, file_logical: Option<&str>, physical: &str) -> String {
    own.or_else(|| file_logical.map(str::to_string))
        .unwrap_or_else(|| physical.to_string())
}

/// `relativeToChangelogFile` and friends: XML attributes are strings, YAML
/// may hold a real bool.
pub(crate) fn is_true(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}
