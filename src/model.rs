use indexmap::{IndexMap, IndexSet};

/// A parsed changelog: every changeset of the source document, includes
/// expanded in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changelog {
    /// Path the changelog was read from, as given to the loader.
    pub physical_path: String,
    /// Ordered changesets.
    pub change_sets: Vec<ChangeSet>,
}

/// One migration unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub id: String,
    pub author: String,
    /// Databases this changeset applies to. `None` or empty means all of them.
    pub dbms: Option<IndexSet<String>>,
    /// Recorded changelog path. Written back out as `logicalFilePath`.
    pub file_path: String,
    /// Remaining changeset attributes (`runAlways`, `context`, ...), in source order.
    pub attributes: IndexMap<String, String>,
    pub comment: Option<String>,
    pub preconditions: Option<ChangeNode>,
    pub changes: Vec<ChangeNode>,
    pub rollback: Vec<ChangeNode>,
}

impl ChangeSet {
    pub fn new(id: impl Into<String>, author: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            author: author.into(),
            file_path: file_path.into(),
            ..Self::default()
        }
    }

    /// Whether this changeset should run against `database`.
    pub fn applies_to(&self, database: &str) -> bool {
        match &self.dbms {
            None => true,
            Some(set) => set.is_empty() || set.contains(database),
        }
    }

    /// `dbms` as the comma separated list used by every on-disk format.
    pub fn dbms_list(&self) -> Option<String> {
        self.dbms
            .as_ref()
            .filter(|set| !set.is_empty())
            .map(|set| set.iter().map(String::as_str).collect::<Vec<_>>().join(","))
    }
}

/// Parse a comma separated `dbms` value. Blank entries are dropped.
pub fn parse_dbms(value: &str) -> IndexSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Format-neutral element of a change body: `createTable`, `column`,
/// `constraints`, `sql`, ...
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeNode {
    pub name: String,
    pub attributes: IndexMap<String, String>,
    pub text: Option<String>,
    pub children: Vec<ChangeNode>,
    /// Collection key this node was listed under in YAML/JSON (`columns`).
    /// `None` for nodes that were a plain nested map or came from XML.
    pub group: Option<String>,
}

impl ChangeNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: ChangeNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ChangeNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&ChangeNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// A node carrying nothing but text, e.g. `<where>id = 1</where>`.
    pub fn is_text_only(&self) -> bool {
        self.attributes.is_empty() && self.children.is_empty() && self.text.is_some()
    }
}
