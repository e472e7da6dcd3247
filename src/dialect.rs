use crate::model::ChangeNode;

/// How a dialect spells an auto-incrementing column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AutoIncrement {
    /// `AUTO_INCREMENT` after the type.
    Suffix(&'static str),
    /// `GENERATED BY DEFAULT AS IDENTITY` after the type.
    Identity,
    /// Handled by the type itself (`INTEGER PRIMARY KEY` rowid tables).
    Implicit,
}

/// SQL generation rules for one database platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub name: &'static str,
    auto_increment: AutoIncrement,
    boolean_literals: (&'static str, &'static str),
    rename_column: RenameColumn,
    drop_index_on_table: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenameColumn {
    Standard,
    SpRename,
    MySqlChange,
}

const DIALECTS: &[Dialect] = &[
    Dialect {
        name: "mysql",
        auto_increment: AutoIncrement::Suffix("AUTO_INCREMENT"),
        boolean_literals: ("1", "0"),
        rename_column: RenameColumn::MySqlChange,
        drop_index_on_table: true,
    },
    Dialect {
        name: "mariadb",
        auto_increment: AutoIncrement::Suffix("AUTO_INCREMENT"),
        boolean_literals: ("1", "0"),
        rename_column: RenameColumn::MySqlChange,
        drop_index_on_table: true,
    },
    Dialect {
        name: "postgresql",
        auto_increment: AutoIncrement::Identity,
        boolean_literals: ("TRUE", "FALSE"),
        rename_column: RenameColumn::Standard,
        drop_index_on_table: false,
    },
    Dialect {
        name: "oracle",
        auto_increment: AutoIncrement::Identity,
        boolean_literals: ("1", "0"),
        rename_column: RenameColumn::Standard,
        drop_index_on_table: false,
    },
    Dialect {
        name: "mssql",
        auto_increment: AutoIncrement::Suffix("IDENTITY (1, 1)"),
        boolean_literals: ("1", "0"),
        rename_column: RenameColumn::SpRename,
        drop_index_on_table: true,
    },
    Dialect {
        name: "h2",
        auto_increment: AutoIncrement::Identity,
        boolean_literals: ("TRUE", "FALSE"),
        rename_column: RenameColumn::Standard,
        drop_index_on_table: false,
    },
    Dialect {
        name: "hsqldb",
        auto_increment: AutoIncrement::Identity,
        boolean_literals: ("TRUE", "FALSE"),
        rename_column: RenameColumn::Standard,
        drop_index_on_table: false,
    },
    Dialect {
        name: "sqlite",
        auto_increment: AutoIncrement::Implicit,
        boolean_literals: ("1", "0"),
        rename_column: RenameColumn::Standard,
        drop_index_on_table: false,
    },
    Dialect {
        name: "db2",
        auto_increment: AutoIncrement::Identity,
        boolean_literals: ("1", "0"),
        rename_column: RenameColumn::Standard,
        drop_index_on_table: false,
    },
    Dialect {
        name: "derby",
        auto_increment: AutoIncrement::Identity,
        boolean_literals: ("TRUE", "FALSE"),
        rename_column: RenameColumn::Standard,
        drop_index_on_table: false,
    },
];

/// Dialect registered under `name`, exact match.
pub fn lookup(name: &str) -> Option<&'static Dialect> {
    DIALECTS.iter().find(|d| d.name == name)
}

impl Dialect {
    /// Statements for one change, each without its terminating `;`.
    pub fn generate(&self, change: &ChangeNode) -> Result<Vec<String>, String> {
        let stmt = match change.name.as_str() {
            "createTable" => self.create_table(change)?,
            "dropTable" => {
                let mut sql = format!("DROP TABLE {}", table(change)?);
                if change.attr("cascadeConstraints") == Some("true") {
                    sql.push_str(" CASCADE");
                }
                sql
            }
            "addColumn" => {
                let table = table(change)?;
                return change
                    .children_named("column")
                    .map(|c| Ok(format!("ALTER TABLE {table} ADD {}", self.column_definition(c)?)))
                    .collect();
            }
            "dropColumn" => {
                let table = table(change)?;
                let mut names: Vec<&str> = change.attr("columnName").into_iter().collect();
                names.extend(change.children_named("column").filter_map(|c| c.attr("name")));
                if names.is_empty() {
                    return Err("dropColumn without columnName".into());
                }
                return Ok(names
                    .into_iter()
                    .map(|n| format!("ALTER TABLE {table} DROP COLUMN {n}"))
                    .collect());
            }
            "renameTable" => {
                let old = qualified(change, required(change, "oldTableName")?);
                let new = required(change, "newTableName")?;
                match self.rename_column {
                    RenameColumn::SpRename => format!("EXEC sp_rename '{old}', '{new}'"),
                    _ => format!("ALTER TABLE {old} RENAME TO {new}"),
                }
            }
            "renameColumn" => {
                let table = table(change)?;
                let old = required(change, "oldColumnName")?;
                let new = required(change, "newColumnName")?;
                match self.rename_column {
                    RenameColumn::Standard => format!("ALTER TABLE {table} RENAME COLUMN {old} TO {new}"),
                    RenameColumn::SpRename => format!("EXEC sp_rename '{table}.{old}', '{new}', 'COLUMN'"),
                    RenameColumn::MySqlChange => {
                        let data_type = required(change, "columnDataType")?;
                        format!("ALTER TABLE {table} CHANGE {old} {new} {data_type}")
                    }
                }
            }
            "createIndex" => {
                let columns = column_names(change);
                if columns.is_empty() {
                    return Err("createIndex without columns".into());
                }
                let unique = if change.attr("unique") == Some("true") { "UNIQUE " } else { "" };
                format!(
                    "CREATE {unique}INDEX {} ON {} ({})",
                    required(change, "indexName")?,
                    table(change)?,
                    columns.join(", ")
                )
            }
            "dropIndex" => {
                let index = required(change, "indexName")?;
                if self.drop_index_on_table {
                    format!("DROP INDEX {index} ON {}", table(change)?)
                } else {
                    format!("DROP INDEX {index}")
                }
            }
            "insert" => {
                let mut names = Vec::new();
                let mut values = Vec::new();
                for column in change.children_named("column") {
                    names.push(required(column, "name")?);
                    values.push(self.value(column));
                }
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    table(change)?,
                    names.join(", "),
                    values.join(", ")
                )
            }
            "update" => {
                let mut sets = Vec::new();
                for column in change.children_named("column") {
                    sets.push(format!("{} = {}", required(column, "name")?, self.value(column)));
                }
                if sets.is_empty() {
                    return Err("update without columns".into());
                }
                let mut sql = format!("UPDATE {} SET {}", table(change)?, sets.join(", "));
                push_where(&mut sql, change);
                sql
            }
            "delete" => {
                let mut sql = format!("DELETE FROM {}", table(change)?);
                push_where(&mut sql, change);
                sql
            }
            "addPrimaryKey" => {
                let constraint = change
                    .attr("constraintName")
                    .map(|n| format!("CONSTRAINT {n} "))
                    .unwrap_or_default();
                format!(
                    "ALTER TABLE {} ADD {constraint}PRIMARY KEY ({})",
                    table(change)?,
                    list(required(change, "columnNames")?)
                )
            }
            "addForeignKeyConstraint" => {
                let base = qualified_with(change, "baseTableSchemaName", required(change, "baseTableName")?);
                let referenced = qualified_with(
                    change,
                    "referencedTableSchemaName",
                    required(change, "referencedTableName")?,
                );
                let mut sql = format!(
                    "ALTER TABLE {base} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {referenced} ({})",
                    required(change, "constraintName")?,
                    list(required(change, "baseColumnNames")?),
                    list(required(change, "referencedColumnNames")?)
                );
                if let Some(action) = change.attr("onDelete") {
                    sql.push_str(&format!(" ON DELETE {action}"));
                }
                if let Some(action) = change.attr("onUpdate") {
                    sql.push_str(&format!(" ON UPDATE {action}"));
                }
                sql
            }
            other => return Err(format!("no SQL generator for change '{other}' on {}", self.name)),
        };
        Ok(vec![stmt])
    }

    fn create_table(&self, change: &ChangeNode) -> Result<String, String> {
        let mut lines = Vec::new();
        let mut primary_keys = Vec::new();
        for column in change.children_named("column") {
            lines.push(self.column_definition(column)?);
            if constraint(column, "primaryKey") == Some("true") {
                primary_keys.push(required(column, "name")?);
            }
        }
        if lines.is_empty() {
            return Err("createTable without columns".into());
        }
        // Composite keys go in a table constraint; a single key stays inline.
        if primary_keys.len() > 1 {
            lines = lines
                .into_iter()
                .map(|l| l.replace(" PRIMARY KEY", ""))
                .collect();
            lines.push(format!("PRIMARY KEY ({})", primary_keys.join(", ")));
        }
        Ok(format!("CREATE TABLE {} ({})", table(change)?, lines.join(", ")))
    }

    fn column_definition(&self, column: &ChangeNode) -> Result<String, String> {
        let name = required(column, "name")?;
        let data_type = required(column, "type")?;
        let mut def = format!("{name} {data_type}");

        if column.attr("autoIncrement") == Some("true") {
            match self.auto_increment {
                AutoIncrement::Suffix(keyword) => {
                    def.push(' ');
                    def.push_str(keyword);
                }
                AutoIncrement::Identity => def.push_str(" GENERATED BY DEFAULT AS IDENTITY"),
                AutoIncrement::Implicit => {}
            }
        }
        if let Some(default) = self.default_value(column) {
            def.push_str(" DEFAULT ");
            def.push_str(&default);
        }
        if constraint(column, "nullable") == Some("false") {
            def.push_str(" NOT NULL");
        }
        if constraint(column, "primaryKey") == Some("true") {
            def.push_str(" PRIMARY KEY");
        }
        if constraint(column, "unique") == Some("true") {
            def.push_str(" UNIQUE");
        }
        Ok(def)
    }

    fn default_value(&self, column: &ChangeNode) -> Option<String> {
        if let Some(v) = column.attr("defaultValue") {
            return Some(quote(v));
        }
        if let Some(v) = column.attr("defaultValueNumeric").or(column.attr("defaultValueComputed")) {
            return Some(v.to_string());
        }
        column.attr("defaultValueBoolean").map(|v| self.boolean(v).to_string())
    }

    fn value(&self, column: &ChangeNode) -> String {
        if let Some(v) = column.attr("value").or(column.attr("valueDate")) {
            return quote(v);
        }
        if let Some(v) = column.attr("valueNumeric").or(column.attr("valueComputed")) {
            return v.to_string();
        }
        match column.attr("valueBoolean") {
            Some(v) => self.boolean(v).to_string(),
            None => "NULL".to_string(),
        }
    }

    fn boolean(&self, value: &str) -> &'static str {
        if value.eq_ignore_ascii_case("true") {
            self.boolean_literals.0
        } else {
            self.boolean_literals.1
        }
    }
}

fn required<'a>(node: &'a ChangeNode, key: &str) -> Result<&'a str, String> {
    node.attr(key)
        .ok_or_else(|| format!("{} without {key}", node.name))
}

fn constraint<'a>(column: &'a ChangeNode, key: &str) -> Option<&'a str> {
    column.child("constraints").and_then(|c| c.attr(key))
}

fn table(change: &ChangeNode) -> Result<String, String> {
    Ok(qualified(change, required(change, "tableName")?))
}

fn qualified(change: &ChangeNode, name: &str) -> String {
    qualified_with(change, "schemaName", name)
}

fn qualified_with(change: &ChangeNode, schema_key: &str, name: &str) -> String {
    match change.attr(schema_key) {
        Some(schema) => format!("{schema}.{name}"),
        None => name.to_string(),
    }
}

fn column_names(change: &ChangeNode) -> Vec<&str> {
    change
        .children_named("column")
        .filter_map(|c| c.attr("name"))
        .collect()
}

fn list(names: &str) -> String {
    names
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn push_where(sql: &mut String, change: &ChangeNode) {
    let clause = change
        .attr("where")
        .or_else(|| change.child("where").and_then(|w| w.text.as_deref()));
    if let Some(clause) = clause {
        sql.push_str(" WHERE ");
        sql.push_str(clause.trim());
    }
}
