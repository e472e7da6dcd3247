use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Write;

use crate::error::{ConvertError, Result};
use crate::model::{ChangeNode, ChangeSet, parse_dbms};
use crate::parser::{Entry, RawChangelog, is_true, recorded_path};
use crate::tree::{ROOT_KEY, default_group};

const NAMESPACE: &str = "http://www.liquibase.org/xml/ns/dbchangelog";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str = "http://www.liquibase.org/xml/ns/dbchangelog http://www.liquibase.org/xml/ns/dbchangelog/dbchangelog-latest.xsd";
const INDENT_SIZE: usize = 4;

pub fn parse_changelog(path: &str, content: &str) -> Result<RawChangelog> {
    let err = |msg: String| ConvertError::parse(format!("{path}: {msg}"));

    let root = read_tree(content).map_err(&err)?;
    if root.name != ROOT_KEY {
        return Err(err(format!("expected <{ROOT_KEY}>, found <{}>", root.name)));
    }
    let logical = root.attr("logicalFilePath").map(str::to_string);

    let mut entries = Vec::new();
    for child in root.children {
        match child.name.as_str() {
            "changeSet" => {
                let cs = change_set(path, logical.as_deref(), child).map_err(&err)?;
                entries.push(Entry::ChangeSet(cs));
            }
            "include" => {
                let file = child
                    .attr("file")
                    .ok_or_else(|| err("<include> without file".into()))?;
                entries.push(Entry::Include {
                    file: file.to_string(),
                    relative: is_true(child.attr("relativeToChangelogFile")),
                });
            }
            "includeAll" => {
                let dir = child
                    .attr("path")
                    .ok_or_else(|| err("<includeAll> without path".into()))?;
                entries.push(Entry::IncludeAll {
                    path: dir.to_string(),
                    relative: is_true(child.attr("relativeToChangelogFile")),
                });
            }
            other => tracing::debug!(path, element = other, "ignoring changelog element"),
        }
    }

    Ok(RawChangelog {
        logical_file_path: logical,
        entries,
    })
}

/// Whole document as nested nodes. Namespace declarations and `xsi:`
/// attributes are dropped, prefixes stripped.
fn read_tree(content: &str) -> std::result::Result<ChangeNode, String> {
    let mut reader = Reader::from_str(content);
    let mut stack: Vec<ChangeNode> = Vec::new();
    let mut root = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("XML error at byte {}: {e}", reader.buffer_position()))?;
        match event {
            Event::Start(start) => stack.push(element(&start)?),
            Event::Empty(start) => {
                let node = element(&start)?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::End(_) => {
                let mut node = stack.pop().ok_or("unbalanced closing tag")?;
                node.text = node
                    .text
                    .take()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty());
                attach(&mut stack, &mut root, node)?;
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    let text = text.unescape().map_err(|e| e.to_string())?;
                    top.text.get_or_insert_with(String::new).push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    top.text.get_or_insert_with(String::new).push_str(&text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err("unexpected end of document".into());
    }
    root.ok_or_else(|| "document has no root element".into())
}

fn element(start: &BytesStart) -> std::result::Result<ChangeNode, String> {
    let mut node = ChangeNode::new(String::from_utf8_lossy(start.local_name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let qualified = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if qualified == "xmlns" || qualified.starts_with("xmlns:") || qualified.starts_with("xsi:") {
            continue;
        }
        let local = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| e.to_string())?;
        node.attributes.insert(local, value.into_owned());
    }
    Ok(node)
}

fn attach(
    stack: &mut [ChangeNode],
    root: &mut Option<ChangeNode>,
    node: ChangeNode,
) -> std::result::Result<(), String> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => *root = Some(node),
        None => return Err("more than one root element".into()),
    }
    Ok(())
}

fn change_set(path: &str, file_logical: Option<&str>, mut node: ChangeNode) -> std::result::Result<ChangeSet, String> {
    let id = node
        .attributes
        .shift_remove("id")
        .ok_or("<changeSet> without id")?;
    let author = node.attributes.shift_remove("author").unwrap_or_default();
    let dbms = node.attributes.shift_remove("dbms").map(|d| parse_dbms(&d));
    let own_logical = node.attributes.shift_remove("logicalFilePath");

    let mut cs = ChangeSet {
        id,
        author,
        dbms,
        file_path: recorded_path(own_logical, file_logical, path),
        attributes: std::mem::take(&mut node.attributes),
        ..ChangeSet::default()
    };

    for child in node.children {
        match child.name.as_str() {
            "comment" => cs.comment = child.text,
            "preConditions" => cs.preconditions = Some(child),
            "validCheckSum" => {}
            "rollback" => {
                if child.children.is_empty() {
                    if let Some(sql) = child.text {
                        cs.rollback.push(ChangeNode::new("sql").with_text(sql));
                    }
                } else {
                    cs.rollback.extend(child.children.into_iter().map(grouped));
                }
            }
            _ => cs.changes.push(grouped(child)),
        }
    }
    Ok(cs)
}

/// Give every descendant of a change the collection key YAML and JSON
/// list it under.
fn grouped(mut change: ChangeNode) -> ChangeNode {
    change.children = change
        .children
        .into_iter()
        .map(|child| {
            let mut child = grouped(child);
            child.group = default_group(&child);
            child
        })
        .collect();
    change
}

pub fn write_changelog(change_sets: &[ChangeSet], out: &mut dyn Write) -> Result<()> {
    let mut writer = Writer::new_with_indent(out, b' ', INDENT_SIZE);
    write_document(&mut writer, change_sets)
        .map_err(|e| ConvertError::serialization(format!("XML output: {e}")))?;
    writer.into_inner().write_all(b"\n")?;
    Ok(())
}

fn write_document<W: Write>(writer: &mut Writer<W>, change_sets: &[ChangeSet]) -> quick_xml::Result<()> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    let root = BytesStart::new(ROOT_KEY).with_attributes([
        ("xmlns", NAMESPACE),
        ("xmlns:xsi", XSI_NAMESPACE),
        ("xsi:schemaLocation", SCHEMA_LOCATION),
    ]);
    writer.write_event(Event::Start(root))?;

    for cs in change_sets {
        let dbms = cs.dbms_list();
        let mut start = BytesStart::new("changeSet");
        start.push_attribute(("id", cs.id.as_str()));
        start.push_attribute(("author", cs.author.as_str()));
        if let Some(dbms) = &dbms {
            start.push_attribute(("dbms", dbms.as_str()));
        }
        start.push_attribute(("logicalFilePath", cs.file_path.as_str()));
        for (key, value) in &cs.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        writer.write_event(Event::Start(start))?;

        if let Some(pre) = &cs.preconditions {
            write_node(writer, pre)?;
        }
        if let Some(comment) = &cs.comment {
            write_node(writer, &ChangeNode::new("comment").with_text(comment.as_str()))?;
        }
        for change in &cs.changes {
            write_node(writer, change)?;
        }
        if !cs.rollback.is_empty() {
            writer.write_event(Event::Start(BytesStart::new("rollback")))?;
            for change in &cs.rollback {
                write_node(writer, change)?;
            }
            writer.write_event(Event::End(BytesEnd::new("rollback")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("changeSet")))?;
    }

    writer.write_event(Event::End(BytesEnd::new(ROOT_KEY)))
}

/// Text is written as one event, line breaks and all, so it reads back
/// exactly as it was parsed.
fn write_node<W: Write>(writer: &mut Writer<W>, node: &ChangeNode) -> quick_xml::Result<()> {
    let start = BytesStart::new(node.name.as_str())
        .with_attributes(node.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    if node.text.is_none() && node.children.is_empty() {
        return writer.write_event(Event::Empty(start));
    }

    writer.write_event(Event::Start(start))?;
    if let Some(text) = &node.text {
        writer.write_event(Event::Text(BytesText::from_escaped(partial_escape(text))))?;
    }
    for child in &node.children {
        write_node(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(node.name.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<databaseChangeLog
        xmlns="http://www.liquibase.org/xml/ns/dbchangelog"
        xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
        xsi:schemaLocation="http://www.liquibase.org/xml/ns/dbchangelog dbchangelog-latest.xsd">
    <property name="now" value="now()"/>
    <changeSet id="1" author="alice" dbms="mysql" context="dev">
        <comment>create person</comment>
        <createTable tableName="person">
            <column name="id" type="int" autoIncrement="true">
                <constraints primaryKey="true" nullable="false"/>
            </column>
            <column name="name" type="varchar(50)"/>
        </createTable>
        <rollback>
            <dropTable tableName="person"/>
        </rollback>
    </changeSet>
    <changeSet id="2" author="bob">
        <sql><![CDATA[insert into person (name) values ('a & b')]]></sql>
        <rollback>delete from person</rollback>
    </changeSet>
</databaseChangeLog>
"#;

    fn change_sets(raw: RawChangelog) -> Vec<ChangeSet> {
        raw.entries
            .into_iter()
            .filter_map(|e| match e {
                Entry::ChangeSet(cs) => Some(cs),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_parse_change_sets() {
        let sets = change_sets(parse_changelog("db/changelog.xml", SOURCE).unwrap());
        assert_eq!(sets.len(), 2);

        let first = &sets[0];
        assert_eq!(first.id, "1");
        assert_eq!(first.dbms_list().as_deref(), Some("mysql"));
        assert_eq!(first.attributes.get("context").map(String::as_str), Some("dev"));
        assert_eq!(first.comment.as_deref(), Some("create person"));
        assert_eq!(first.file_path, "db/changelog.xml");

        let table = &first.changes[0];
        assert_eq!(table.attr("tableName"), Some("person"));
        assert_eq!(table.children.len(), 2);
        assert_eq!(table.children[0].group.as_deref(), Some("columns"));
        let constraints = table.children[0].child("constraints").unwrap();
        assert_eq!(constraints.group, None);
        assert_eq!(constraints.attr("nullable"), Some("false"));
        assert_eq!(first.rollback[0].name, "dropTable");

        let second = &sets[1];
        assert_eq!(second.dbms, None);
        assert_eq!(
            second.changes[0].text.as_deref(),
            Some("insert into person (name) values ('a & b')")
        );
        assert_eq!(second.rollback, vec![ChangeNode::new("sql").with_text("delete from person")]);
    }

    #[test]
    fn test_wrong_root_is_parse_error() {
        let err = parse_changelog("x.xml", "<changelog/>").unwrap_err();
        assert!(matches!(err, ConvertError::Parse(_)));
    }

    #[test]
    fn test_malformed_is_parse_error() {
        assert!(parse_changelog("x.xml", "<databaseChangeLog><changeSet id=\"1\">").is_err());
        assert!(parse_changelog("x.xml", "<databaseChangeLog></changeSet>").is_err());
        assert!(parse_changelog("x.xml", "").is_err());
    }

    #[test]
    fn test_missing_id_is_parse_error() {
        assert!(parse_changelog("x.xml", "<databaseChangeLog><changeSet author=\"a\"/></databaseChangeLog>").is_err());
    }

    #[test]
    fn test_include_entries() {
        let raw = parse_changelog(
            "db/master.xml",
            r#"<databaseChangeLog logicalFilePath="master">
                <include file="a.xml" relativeToChangelogFile="true"/>
                <includeAll path="changes/"/>
            </databaseChangeLog>"#,
        )
        .unwrap();
        assert_eq!(raw.logical_file_path.as_deref(), Some("master"));
        assert_eq!(
            raw.entries,
            vec![
                Entry::Include { file: "a.xml".into(), relative: true },
                Entry::IncludeAll { path: "changes/".into(), relative: false },
            ]
        );
    }

    #[test]
    fn test_written_output_parses_back() {
        let mut sets = change_sets(parse_changelog("db/changelog.xml", SOURCE).unwrap());
        for cs in &mut sets {
            cs.file_path = "db/changelog.mysql.xml".into();
        }
        let mut out = Vec::new();
        write_changelog(&sets, &mut out).unwrap();
        let written = String::from_utf8(out).unwrap();
        assert!(written.contains(r#"<changeSet id="1" author="alice" dbms="mysql" logicalFilePath="db/changelog.mysql.xml" context="dev">"#));
        assert!(written.contains("a &amp; b"));

        let reparsed = change_sets(parse_changelog("elsewhere.xml", &written).unwrap());
        assert_eq!(reparsed, sets);
    }

    #[test]
    fn test_multiline_text_is_written_as_is() {
        let source = "<databaseChangeLog>
    <changeSet id=\"1\" author=\"alice\">
        <sql>insert into t values ('a
b');
insert into t values ('c  &lt;d&gt;')</sql>
        <rollback>
            <sql>delete from t where v = 'a
b'</sql>
        </rollback>
    </changeSet>
</databaseChangeLog>";
        let sets = change_sets(parse_changelog("a.xml", source).unwrap());
        assert_eq!(
            sets[0].changes[0].text.as_deref(),
            Some("insert into t values ('a\nb');\ninsert into t values ('c  <d>')")
        );

        let mut out = Vec::new();
        write_changelog(&sets, &mut out).unwrap();
        let once = String::from_utf8(out).unwrap();
        assert!(once.contains("<sql>insert into t values ('a\nb');\ninsert into t values ('c  &lt;d&gt;')</sql>"));

        let reparsed = change_sets(parse_changelog("a.xml", &once).unwrap());
        assert_eq!(reparsed, sets);

        let mut out = Vec::new();
        write_changelog(&reparsed, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), once);
    }

    #[test]
    fn test_written_layout() {
        let mut cs = ChangeSet::new("1", "alice", "out.h2.xml");
        cs.changes.push(
            ChangeNode::new("createTable")
                .with_attribute("tableName", "person")
                .with_child(ChangeNode::new("column").with_attribute("name", "id").with_attribute("type", "int")),
        );
        let mut out = Vec::new();
        write_changelog(&[cs], &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<databaseChangeLog xmlns="{NAMESPACE}" xmlns:xsi="{XSI_NAMESPACE}" xsi:schemaLocation="{SCHEMA_LOCATION}">
    <changeSet id="1" author="alice" logicalFilePath="out.h2.xml">
        <createTable tableName="person">
            <column name="id" type="int"/>
        </createTable>
    </changeSet>
</databaseChangeLog>
"#
            )
        );
    }
}
