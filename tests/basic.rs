use anyhow::Result;
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::tempdir;

use liquify::arguments::ConversionArguments;
use liquify::engine::Converter;
use liquify::reporter::Reporter;
use liquify::resource::FileSystemResourceAccessor;

const MASTER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<databaseChangeLog xmlns="http://www.liquibase.org/xml/ns/dbchangelog">
    <changeSet id="create-person" author="alice">
        <createTable tableName="person">
            <column name="id" type="int" autoIncrement="true">
                <constraints primaryKey="true" nullable="false"/>
            </column>
            <column name="name" type="varchar(255)"/>
        </createTable>
    </changeSet>
    <include file="mysql-only.yaml" relativeToChangelogFile="true"/>
    <changeSet id="pg-extension" author="bob" dbms="postgresql">
        <sql>create extension if not exists pgcrypto</sql>
    </changeSet>
</databaseChangeLog>
"#;

const MYSQL_ONLY: &str = r#"databaseChangeLog:
  - changeSet:
      id: mysql-engine
      author: carol
      dbms: mysql, mariadb
      changes:
        - sql:
            sql: alter table person engine=InnoDB
"#;

fn yaml_of(path: &std::path::Path) -> Result<serde_json::Value> {
    Ok(serde_yaml::from_str(&fs::read_to_string(path)?)?)
}

#[test]
fn test_includes_are_expanded_and_filtered() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("master.xml");
    fs::write(&source, MASTER)?;
    fs::write(dir.path().join("mysql-only.yaml"), MYSQL_ONLY)?;

    let accessor = FileSystemResourceAccessor::new(dir.path());
    let args = ConversionArguments::new(Some(source), Some("mysql".into()), None);
    let summary = Converter::new(&accessor).convert(&args, &mut Reporter::new(false))?;

    let target = dir.path().join("master.mysql.yaml");
    assert_eq!(summary.target, target);
    assert_eq!(summary.parsed, 3);
    assert_eq!(summary.written, 2);

    let doc = yaml_of(&target)?;
    let sets = doc["databaseChangeLog"].as_array().unwrap();
    let ids: Vec<&str> = sets
        .iter()
        .map(|cs| cs["changeSet"]["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["create-person", "mysql-engine"]);
    for cs in sets {
        assert_eq!(
            cs["changeSet"]["logicalFilePath"].as_str().unwrap(),
            target.to_str().unwrap()
        );
    }
    Ok(())
}

#[test]
fn test_database_match_is_exact() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("master.xml");
    fs::write(&source, MASTER)?;
    fs::write(dir.path().join("mysql-only.yaml"), MYSQL_ONLY)?;

    let accessor = FileSystemResourceAccessor::new(dir.path());
    let args = ConversionArguments::new(Some(source), Some("MySQL".into()), Some("json".into()));
    let summary = Converter::new(&accessor).convert(&args, &mut Reporter::new(false))?;
    assert_eq!(summary.written, 1);

    let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(&summary.target)?)?;
    assert_eq!(doc["databaseChangeLog"][0]["changeSet"]["id"], "create-person");
    Ok(())
}

#[test]
fn test_yaml_to_xml_keeps_change_structure() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("changelog.yaml");
    fs::write(
        &source,
        r#"databaseChangeLog:
  - changeSet:
      id: "1"
      author: dave
      changes:
        - addColumn:
            tableName: person
            columns:
              - column:
                  name: email
                  type: varchar(320)
"#,
    )?;

    let accessor = FileSystemResourceAccessor::new(dir.path());
    let args = ConversionArguments::new(Some(source), Some("h2".into()), Some("xml".into()));
    let summary = Converter::new(&accessor).convert(&args, &mut Reporter::new(false))?;

    let xml = fs::read_to_string(&summary.target)?;
    assert!(xml.starts_with("<?xml"));
    assert!(xml.contains(r#"<addColumn tableName="person">"#));
    assert!(xml.contains(r#"<column name="email" type="varchar(320)"/>"#));

    // The written XML reads back to the same single changeset.
    let again = liquify::loader::load_changelog(
        summary.target.to_str().unwrap(),
        &accessor,
        &liquify::parser::ParserRegistry::default(),
    )?;
    assert_eq!(again.change_sets.len(), 1);
    assert_eq!(again.change_sets[0].changes[0].name, "addColumn");
    Ok(())
}

#[test]
fn test_formatted_sql_uses_target_dialect() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("master.xml");
    fs::write(&source, MASTER)?;
    fs::write(dir.path().join("mysql-only.yaml"), MYSQL_ONLY)?;

    let accessor = FileSystemResourceAccessor::new(dir.path());
    let args = ConversionArguments::new(Some(source), Some("postgresql".into()), Some("sql".into()));
    let summary = Converter::new(&accessor).convert(&args, &mut Reporter::new(false))?;

    assert_eq!(summary.target, dir.path().join("master.postgresql.sql"));
    let sql = fs::read_to_string(&summary.target)?;
    assert!(sql.starts_with("-- liquibase formatted sql\n"));
    assert!(sql.contains("-- changeset alice:create-person"));
    assert!(sql.contains("GENERATED BY DEFAULT AS IDENTITY"));
    assert!(sql.contains("\ncreate extension if not exists pgcrypto\n"));
    assert!(!sql.contains("InnoDB"));
    Ok(())
}

#[test]
fn test_schema_generation() {
    let schema = liquify::events::generate_schema();
    assert!(schema.contains("$schema"));
    assert!(schema.contains("conversion_started"));
}
