//! YAML and JSON changelogs share one document shape, read and written
//! through `serde_json::Value`:
//!
//! ```yaml
//! databaseChangeLog:
//!   - changeSet:
//!       id: "1"
//!       author: alice
//!       dbms: mysql
//!       changes:
//!         - createTable:
//!             tableName: person
//!             columns:
//!               - column:
//!                   name: id
//!                   type: int
//! ```

use serde_json::{Map, Value};

use crate::error::{ConvertError, Result};
use crate::model::{ChangeNode, ChangeSet, parse_dbms};
use crate::parser::{Entry, RawChangelog, is_true, recorded_path};

pub const ROOT_KEY: &str = "databaseChangeLog";

/// Nodes whose bodies are lists of single key maps rather than one map.
const LIST_BODIED: &[&str] = &["preConditions", "and", "or", "not"];

pub fn parse_document(path: &str, doc: &Value) -> Result<RawChangelog> {
    let err = |msg: String| ConvertError::parse(format!("{path}: {msg}"));

    let items: &[Value] = match doc.get(ROOT_KEY) {
        Some(Value::Array(items)) => items.as_slice(),
        Some(Value::Null) => &[],
        Some(_) => return Err(err(format!("'{ROOT_KEY}' must be a list"))),
        None => return Err(err(format!("missing '{ROOT_KEY}'"))),
    };

    let logical_file_path = items
        .iter()
        .find_map(|item| item.get("logicalFilePath"))
        .and_then(scalar);

    let mut entries = Vec::new();
    for item in items {
        let (key, body) = single_entry(item).map_err(&err)?;
        match key {
            "changeSet" => {
                let cs = change_set(path, logical_file_path.as_deref(), body).map_err(&err)?;
                entries.push(Entry::ChangeSet(cs));
            }
            "include" => {
                let file = body
                    .get("file")
                    .and_then(scalar)
                    .ok_or_else(|| err("include without 'file'".into()))?;
                let relative = is_true(body.get("relativeToChangelogFile").and_then(scalar).as_deref());
                entries.push(Entry::Include { file, relative });
            }
            "includeAll" => {
                let dir = body
                    .get("path")
                    .and_then(scalar)
                    .ok_or_else(|| err("includeAll without 'path'".into()))?;
                let relative = is_true(body.get("relativeToChangelogFile").and_then(scalar).as_deref());
                entries.push(Entry::IncludeAll { path: dir, relative });
            }
            "logicalFilePath" => {}
            other => tracing::debug!(path, entry = other, "ignoring changelog entry"),
        }
    }

    Ok(RawChangelog {
        logical_file_path,
        entries,
    })
}

fn single_entry(item: &Value) -> std::result::Result<(&str, &Value), String> {
    match item {
        Value::Object(map) if map.len() == 1 => {
            let (key, value) = map.iter().next().ok_or("empty entry")?;
            Ok((key.as_str(), value))
        }
        _ => Err(format!("expected a single key map, found {item}")),
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn change_set(path: &str, file_logical: Option<&str>, body: &Value) -> std::result::Result<ChangeSet, String> {
    let map = body.as_object().ok_or("changeSet must be a map")?;
    let id = map
        .get("id")
        .and_then(scalar)
        .ok_or("changeSet without 'id'")?;
    let mut cs = ChangeSet {
        id,
        ..ChangeSet::default()
    };
    let mut own_logical = None;

    for (key, value) in map {
        match key.as_str() {
            "id" => {}
            "author" => cs.author = scalar(value).unwrap_or_default(),
            "dbms" => {
                cs.dbms = match value {
                    Value::Array(list) => Some(list.iter().filter_map(scalar).collect()),
                    Value::Null => None,
                    other => scalar(other).map(|s| parse_dbms(&s)),
                }
            }
            "logicalFilePath" => own_logical = scalar(value),
            "comment" => cs.comment = scalar(value),
            "changes" => {
                for change in value.as_array().map(Vec::as_slice).unwrap_or_default() {
                    let (name, body) = single_entry(change)?;
                    cs.changes.push(node(name, body));
                }
            }
            "rollback" => cs.rollback = rollback(value)?,
            "preConditions" => cs.preconditions = Some(node(key, value)),
            _ => match scalar(value) {
                Some(v) => {
                    cs.attributes.insert(key.clone(), v);
                }
                None => tracing::debug!(id = %cs.id, key = %key, "ignoring changeSet entry"),
            },
        }
    }

    cs.file_path = recorded_path(own_logical, file_logical, path);
    Ok(cs)
}

fn rollback(value: &Value) -> std::result::Result<Vec<ChangeNode>, String> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(sql) => Ok(vec![ChangeNode::new("sql").with_text(sql.trim())]),
        Value::Array(items) => items
            .iter()
            .map(|item| single_entry(item).map(|(name, body)| node(name, body)))
            .collect(),
        Value::Object(map) => Ok(map.iter().map(|(name, body)| node(name, body)).collect()),
        other => Err(format!("unsupported rollback: {other}")),
    }
}

fn node(name: &str, body: &Value) -> ChangeNode {
    let mut node = ChangeNode::new(name);
    match body {
        Value::Object(map) => {
            for (key, value) in map {
                match value {
                    Value::Null => {}
                    Value::String(text) if key == name => node.text = Some(text.clone()),
                    Value::Array(items) => {
                        let mut scalars = Vec::new();
                        for item in items {
                            match single_entry(item) {
                                Ok((child, body)) => {
                                    let mut child = self::node(child, body);
                                    child.group = Some(key.clone());
                                    node.children.push(child);
                                }
                                Err(_) => scalars.extend(scalar(item)),
                            }
                        }
                        if !scalars.is_empty() {
                            node.attributes.insert(key.clone(), scalars.join(","));
                        }
                    }
                    Value::Object(_) => node.children.push(self::node(key, value)),
                    other => {
                        if let Some(v) = scalar(other) {
                            node.attributes.insert(key.clone(), v);
                        }
                    }
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                let Ok((key, value)) = single_entry(item) else {
                    continue;
                };
                match scalar(value) {
                    Some(v) => {
                        node.attributes.insert(key.to_string(), v);
                    }
                    None => node.children.push(self::node(key, value)),
                }
            }
        }
        other => node.text = scalar(other),
    }
    node
}

/// Collection key a child element is listed under when it came from a
/// format without one. `None` means a plain nested map.
pub fn default_group(node: &ChangeNode) -> Option<String> {
    if node.is_text_only() || node.name.ends_with('s') {
        None
    } else {
        Some(format!("{}s", node.name))
    }
}

pub fn build_document(change_sets: &[ChangeSet]) -> Value {
    let items = change_sets
        .iter()
        .map(|cs| single("changeSet", change_set_value(cs)))
        .collect();
    single(ROOT_KEY, Value::Array(items))
}

fn single(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

fn scalar_value(s: &str) -> Value {
    match s {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(s.to_string()),
    }
}

fn change_set_value(cs: &ChangeSet) -> Value {
    let mut map = Map::new();
    map.insert("id".into(), Value::String(cs.id.clone()));
    map.insert("author".into(), Value::String(cs.author.clone()));
    if let Some(dbms) = cs.dbms_list() {
        map.insert("dbms".into(), Value::String(dbms));
    }
    map.insert("logicalFilePath".into(), Value::String(cs.file_path.clone()));
    for (key, value) in &cs.attributes {
        map.insert(key.clone(), scalar_value(value));
    }
    if let Some(comment) = &cs.comment {
        map.insert("comment".into(), Value::String(comment.clone()));
    }
    if let Some(pre) = &cs.preconditions {
        map.insert("preConditions".into(), node_body(pre));
    }
    map.insert("changes".into(), changes_value(&cs.changes));
    if !cs.rollback.is_empty() {
        map.insert("rollback".into(), changes_value(&cs.rollback));
    }
    Value::Object(map)
}

fn changes_value(nodes: &[ChangeNode]) -> Value {
    Value::Array(nodes.iter().map(|n| single(&n.name, node_body(n))).collect())
}

fn node_body(node: &ChangeNode) -> Value {
    if LIST_BODIED.contains(&node.name.as_str()) {
        let mut items: Vec<Value> = node
            .attributes
            .iter()
            .map(|(k, v)| single(k, scalar_value(v)))
            .collect();
        items.extend(node.children.iter().map(|c| single(&c.name, node_body(c))));
        return Value::Array(items);
    }

    let mut map = Map::new();
    for (key, value) in &node.attributes {
        map.insert(key.clone(), scalar_value(value));
    }
    if let Some(text) = &node.text {
        map.insert(node.name.clone(), Value::String(text.clone()));
    }
    for child in &node.children {
        match &child.group {
            Some(group) => {
                let slot = map
                    .entry(group.clone())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if !slot.is_array() {
                    *slot = Value::Array(Vec::new());
                }
                if let Value::Array(list) = slot {
                    list.push(single(&child.name, node_body(child)));
                }
            }
            None if child.is_text_only() => {
                map.insert(child.name.clone(), Value::String(child.text.clone().unwrap_or_default()));
            }
            None => {
                map.insert(child.name.clone(), node_body(child));
            }
        }
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse(doc: Value) -> RawChangelog {
        parse_document("db/changelog.json", &doc).unwrap()
    }

    fn first_change_set(raw: &RawChangelog) -> &ChangeSet {
        match &raw.entries[0] {
            Entry::ChangeSet(cs) => cs,
            other => panic!("expected changeSet, got {other:?}"),
        }
    }

    #[test]
    fn test_change_set_fields() {
        let raw = parse(json!({
            "databaseChangeLog": [
                { "changeSet": {
                    "id": 7,
                    "author": "alice",
                    "dbms": "mysql, h2",
                    "runAlways": true,
                    "comment": "people",
                    "changes": [
                        { "createTable": {
                            "tableName": "person",
                            "columns": [
                                { "column": { "name": "id", "type": "int",
                                    "constraints": { "primaryKey": true } } }
                            ]
                        } }
                    ],
                    "rollback": "drop table person"
                } }
            ]
        }));
        let cs = first_change_set(&raw);
        assert_eq!(cs.id, "7");
        assert_eq!(cs.author, "alice");
        assert_eq!(cs.dbms_list().as_deref(), Some("mysql,h2"));
        assert_eq!(cs.attributes.get("runAlways").map(String::as_str), Some("true"));
        assert_eq!(cs.comment.as_deref(), Some("people"));
        assert_eq!(cs.file_path, "db/changelog.json");

        let table = &cs.changes[0];
        assert_eq!(table.name, "createTable");
        let column = &table.children[0];
        assert_eq!(column.name, "column");
        assert_eq!(column.group.as_deref(), Some("columns"));
        assert_eq!(column.child("constraints").and_then(|c| c.attr("primaryKey")), Some("true"));

        assert_eq!(cs.rollback, vec![ChangeNode::new("sql").with_text("drop table person")]);
    }

    #[test]
    fn test_logical_file_path_entry_applies_to_all() {
        let raw = parse(json!({
            "databaseChangeLog": [
                { "changeSet": { "id": "1", "author": "a" } },
                { "logicalFilePath": "logical/path.yaml" },
                { "changeSet": { "id": "2", "author": "a", "logicalFilePath": "own.yaml" } }
            ]
        }));
        let paths: Vec<_> = raw
            .entries
            .iter()
            .map(|e| match e {
                Entry::ChangeSet(cs) => cs.file_path.clone(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(paths, vec!["logical/path.yaml", "own.yaml"]);
    }

    #[test]
    fn test_missing_root_is_error() {
        assert!(parse_document("x.yaml", &json!({ "changeSets": [] })).is_err());
        assert!(parse_document("x.yaml", &json!({ "databaseChangeLog": [ { "changeSet": { "author": "a" } } ] })).is_err());
    }

    #[test]
    fn test_text_node_and_sql() {
        let raw = parse(json!({
            "databaseChangeLog": [
                { "changeSet": { "id": "1", "author": "a", "changes": [
                    { "sql": { "sql": "insert into t values (1)", "splitStatements": false } }
                ] } }
            ]
        }));
        let sql = &first_change_set(&raw).changes[0];
        assert_eq!(sql.text.as_deref(), Some("insert into t values (1)"));
        assert_eq!(sql.attr("splitStatements"), Some("false"));
    }

    #[test]
    fn test_build_document_shape() {
        let mut cs = ChangeSet::new("1", "alice", "out.mysql.yaml");
        cs.dbms = Some(parse_dbms("mysql"));
        let mut column = ChangeNode::new("column")
            .with_attribute("name", "id")
            .with_child(ChangeNode::new("constraints").with_attribute("nullable", "false"));
        column.group = default_group(&column);
        cs.changes.push(
            ChangeNode::new("createTable")
                .with_attribute("tableName", "person")
                .with_child(column),
        );

        assert_eq!(
            build_document(&[cs]),
            json!({
                "databaseChangeLog": [
                    { "changeSet": {
                        "id": "1",
                        "author": "alice",
                        "dbms": "mysql",
                        "logicalFilePath": "out.mysql.yaml",
                        "changes": [
                            { "createTable": {
                                "tableName": "person",
                                "columns": [
                                    { "column": { "name": "id", "constraints": { "nullable": false } } }
                                ]
                            } }
                        ]
                    } }
                ]
            })
        );
    }

    #[test]
    fn test_preconditions_are_list_bodied() {
        let pre = ChangeNode::new("preConditions")
            .with_attribute("onFail", "MARK_RAN")
            .with_child(ChangeNode::new("tableExists").with_attribute("tableName", "person"));
        assert_eq!(
            node_body(&pre),
            json!([
                { "onFail": "MARK_RAN" },
                { "tableExists": { "tableName": "person" } }
            ])
        );
        assert_eq!(node("preConditions", &node_body(&pre)), pre);
    }

    #[test]
    fn test_default_group() {
        assert_eq!(default_group(&ChangeNode::new("column")).as_deref(), Some("columns"));
        assert_eq!(default_group(&ChangeNode::new("constraints")), None);
        assert_eq!(default_group(&ChangeNode::new("where").with_text("id = 1")), None);
    }
}
