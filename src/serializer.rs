use indexmap::IndexMap;
use std::io::Write;
use std::path::Path;

use crate::dialect::{self, Dialect};
use crate::error::{ConvertError, Result};
use crate::model::ChangeSet;
use crate::target::format_key;

/// Writes changesets in one output format.
pub trait ChangelogSerializer {
    fn write(&self, change_sets: &[ChangeSet], out: &mut dyn Write) -> Result<()>;
}

pub struct XmlSerializer;

impl ChangelogSerializer for XmlSerializer {
    fn write(&self, change_sets: &[ChangeSet], out: &mut dyn Write) -> Result<()> {
        crate::xml::write_changelog(change_sets, out)?;
        Ok(())
    }
}

pub struct YamlSerializer;

impl ChangelogSerializer for YamlSerializer {
    fn write(&self, change_sets: &[ChangeSet], out: &mut dyn Write) -> Result<()> {
        let doc = crate::tree::build_document(change_sets);
        serde_yaml::to_writer(out, &doc).map_err(ConvertError::serialization)
    }
}

pub struct JsonSerializer;

impl ChangelogSerializer for JsonSerializer {
    fn write(&self, change_sets: &[ChangeSet], out: &mut dyn Write) -> Result<()> {
        let doc = crate::tree::build_document(change_sets);
        serde_json::to_writer_pretty(&mut *out, &doc).map_err(ConvertError::serialization)?;
        writeln!(out)?;
        Ok(())
    }
}

pub struct FormattedSqlSerializer {
    dialect: &'static Dialect,
}

impl FormattedSqlSerializer {
    /// The dialect is named by the filename: `changelog.<database>.sql`.
    pub fn for_filename(filename: &str) -> Result<Self> {
        let database = Path::new(filename)
            .file_stem()
            .map(Path::new)
            .and_then(Path::extension)
            .map(|db| db.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dialect = dialect::lookup(&database)
            .ok_or(ConvertError::UnsupportedDatabase { database })?;
        Ok(Self { dialect })
    }
}

impl ChangelogSerializer for FormattedSqlSerializer {
    fn write(&self, change_sets: &[ChangeSet], out: &mut dyn Write) -> Result<()> {
        crate::sql::write_changelog(self.dialect, change_sets, out)
    }
}

pub type SerializerCtor = fn(&str) -> Result<Box<dyn ChangelogSerializer>>;

/// Maps an output extension to the serializer that writes it.
pub struct SerializerRegistry {
    entries: IndexMap<String, SerializerCtor>,
}

impl Default for SerializerRegistry {
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

fn xml(_: &str) -> Result<Box<dyn ChangelogSerializer>> {
    Ok(Box::new(XmlSerializer))
}

fn yaml(_: &str) -> Result<Box<dyn ChangelogSerializer>> {
    Ok(Box::new(YamlSerializer))
}

fn json(_: &str) -> Result<Box<dyn ChangelogSerializer>> {
    Ok(Box::new(JsonSerializer))
}

fn formatted_sql(filename: &str) -> Result<Box<dyn ChangelogSerializer>> {
    Ok(Box::new(FormattedSqlSerializer::for_filename(filename)?))
}

impl SerializerRegistry {
    pub fn empty() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    pub fn register(&mut self, key: &str, ctor: SerializerCtor) {
        self.entries.insert(key.to_lowercase(), ctor);
    }

    /// Serializer for `target_filename`, chosen by its extension.
    pub fn lookup(&self, target_filename: &str) -> Result<Box<dyn ChangelogSerializer>> {
        let key = format_key(target_filename).unwrap_or_default();
        let ctor = self
            .entries
            .get(&key)
            .ok_or(ConvertError::UnsupportedDatabase { database: key })?;
        ctor(target_filename)
    }
}
