//! Liquibase "formatted SQL" changelogs:
//!
//! ```sql
//! --liquibase formatted sql
//!
//! --changeset alice:1 dbms:mysql
//! --comment: create person
//! create table person (id int);
//! --rollback drop table person;
//! ```

use lazy_static::lazy_static;
use regex::Regex;
use std::io::Write;

use crate::dialect::Dialect;
use crate::error::{ConvertError, Result};
use crate::model::{ChangeNode, ChangeSet, parse_dbms};
use crate::parser::{Entry, RawChangelog, recorded_path};

lazy_static! {
    static ref HEADER: Regex = Regex::new(r"(?i)^\s*--\s*liquibase\s+formatted\s+sql\b").unwrap();
    static ref CHANGESET: Regex =
        Regex::new(r#"(?i)^\s*--\s*changeset\s+("[^"]+"|[^:\s]+):("[^"]+"|\S+)(.*)$"#).unwrap();
    static ref ROLLBACK: Regex = Regex::new(r"(?i)^\s*--\s*rollback\b\s?(.*)$").unwrap();
    static ref COMMENT: Regex = Regex::new(r"(?i)^\s*--\s*comment:\s*(.*)$").unwrap();
    static ref IGNORED: Regex = Regex::new(r"(?i)^\s*--\s*(precondition|property|validCheckSum|ignoreLines)").unwrap();
    static ref ATTRIBUTE: Regex = Regex::new(r#"(\w+):("[^"]*"|\S+)"#).unwrap();
}

/// Changeset-line attributes that belong to the generated `sql` change.
const SQL_CHANGE_ATTRIBUTES: &[&str] = &["splitStatements", "endDelimiter", "stripComments"];

pub fn parse_changelog(path: &str, content: &str) -> Result<RawChangelog> {
    let mut lines = content.lines();
    let first = lines.by_ref().find(|l| !l.trim().is_empty()).unwrap_or_default();
    if !HEADER.is_match(first) {
        return Err(ConvertError::parse(format!(
            "{path}: missing '--liquibase formatted sql' header"
        )));
    }

    let mut entries = Vec::new();
    let mut current: Option<Pending> = None;

    for line in lines {
        if let Some(caps) = CHANGESET.captures(line) {
            if let Some(pending) = current.take() {
                entries.push(Entry::ChangeSet(pending.finish()));
            }
            current = Some(Pending::start(path, &caps[1], &caps[2], &caps[3]));
            continue;
        }
        let Some(pending) = current.as_mut() else {
            continue;
        };
        if let Some(caps) = ROLLBACK.captures(line) {
            pending.rollback.push_str(&caps[1]);
            pending.rollback.push('\n');
        } else if let Some(caps) = COMMENT.captures(line) {
            pending.change_set.comment = Some(caps[1].trim().to_string());
        } else if IGNORED.is_match(line) {
            tracing::debug!(path, line, "ignoring formatted sql directive");
        } else {
            pending.body.push_str(line);
            pending.body.push('\n');
        }
    }
    if let Some(pending) = current {
        entries.push(Entry::ChangeSet(pending.finish()));
    }

    Ok(RawChangelog {
        logical_file_path: None,
        entries,
    })
}

struct Pending {
    change_set: ChangeSet,
    sql_attributes: Vec<(String, String)>,
    body: String,
    rollback: String,
}

impl Pending {
    fn start(path: &str, author: &str, id: &str, rest: &str) -> Self {
        let mut change_set = ChangeSet::new(unquote(id), unquote(author), "");
        let mut sql_attributes = Vec::new();
        let mut own_logical = None;

        for caps in ATTRIBUTE.captures_iter(rest) {
            let key = &caps[1];
            let value = unquote(&caps[2]);
            match key {
                "dbms" => change_set.dbms = Some(parse_dbms(&value)),
                "logicalFilePath" => own_logical = Some(value),
                _ if SQL_CHANGE_ATTRIBUTES.contains(&key) => {
                    sql_attributes.push((key.to_string(), value));
                }
                _ => {
                    change_set.attributes.insert(key.to_string(), value);
                }
            }
        }
        change_set.file_path = recorded_path(own_logical, None, path);

        Self {
            change_set,
            sql_attributes,
            body: String::new(),
            rollback: String::new(),
        }
    }

    fn finish(mut self) -> ChangeSet {
        let body = self.body.trim();
        if !body.is_empty() {
            let mut sql = ChangeNode::new("sql").with_text(body);
            sql.attributes.extend(self.sql_attributes);
            self.change_set.changes.push(sql);
        }
        let rollback = self.rollback.trim();
        if !rollback.is_empty() {
            self.change_set
                .rollback
                .push(ChangeNode::new("sql").with_text(rollback));
        }
        self.change_set
    }
}

fn unquote(value: &str) -> String {
    value.trim_matches('"').to_string()
}

fn quoted(value: &str) -> String {
    if value.is_empty() || value.chars().any(|c| c.is_whitespace() || c == ':') {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}

/// Writes formatted SQL for one dialect.
pub fn write_changelog(
    dialect: &Dialect,
    change_sets: &[ChangeSet],
    out: &mut dyn Write,
) -> Result<()> {
    writeln!(out, "-- liquibase formatted sql")?;

    for cs in change_sets {
        let mut header = format!("-- changeset {}:{}", quoted(&cs.author), quoted(&cs.id));
        if let Some(dbms) = cs.dbms_list() {
            header.push_str(&format!(" dbms:{dbms}"));
        }
        header.push_str(&format!(" logicalFilePath:{}", quoted(&cs.file_path)));
        for (key, value) in &cs.attributes {
            header.push_str(&format!(" {key}:{}", quoted(value)));
        }
        for key in SQL_CHANGE_ATTRIBUTES {
            if let Some(value) = cs.changes.iter().find_map(|c| c.attr(key)) {
                header.push_str(&format!(" {key}:{}", quoted(value)));
            }
        }

        writeln!(out)?;
        writeln!(out, "{header}")?;
        if let Some(comment) = &cs.comment {
            writeln!(out, "-- comment: {}", comment.split_whitespace().collect::<Vec<_>>().join(" "))?;
        }
        if cs.preconditions.is_some() {
            tracing::warn!(id = %cs.id, "preconditions cannot be expressed in formatted sql, dropping them");
        }
        let delimiter = cs
            .changes
            .iter()
            .find_map(|c| c.attr("endDelimiter"))
            .unwrap_or(";");
        for block in blocks(dialect, cs, &cs.changes, delimiter)? {
            writeln!(out, "{block}")?;
        }
        for block in blocks(dialect, cs, &cs.rollback, delimiter)? {
            for line in block.lines() {
                writeln!(out, "-- rollback {line}")?;
            }
        }
    }
    Ok(())
}

/// Statement text for `nodes`. Raw `sql` changes are copied as written;
/// generated statements end with `delimiter`. A raw block that does not
/// end with the delimiter is closed before the next one starts.
fn blocks(dialect: &Dialect, cs: &ChangeSet, nodes: &[ChangeNode], delimiter: &str) -> Result<Vec<String>> {
    let mut blocks: Vec<String> = Vec::new();
    for node in nodes {
        if let Some(last) = blocks.last_mut() {
            if !last.trim_end().ends_with(delimiter) {
                last.push_str(&terminator(delimiter));
            }
        }
        if node.name == "sql" {
            let text = node.text.as_deref().unwrap_or_default().trim();
            if !text.is_empty() {
                blocks.push(text.to_string());
            }
            continue;
        }
        let statements = dialect
            .generate(node)
            .map_err(|e| ConvertError::serialization(format!("changeSet {}::{}: {e}", cs.id, cs.author)))?;
        blocks.extend(statements.into_iter().map(|stmt| format!("{stmt}{}", terminator(delimiter))));
    }
    Ok(blocks)
}

/// `;` closes a statement on its own line; other delimiters (`/`, `GO`)
/// go on the next line.
fn terminator(delimiter: &str) -> String {
    if delimiter == ";" {
        ";".to_string()
    } else {
        format!("\n{delimiter}")
    }
}
