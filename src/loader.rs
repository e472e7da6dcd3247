use crate::error::{ConvertError, Result};
use crate::model::{ChangeSet, Changelog};
use crate::parser::{Entry, ParserRegistry};
use crate::resource::{ResourceAccessor, join_resource_path, parent_of};

/// Parse `path` and every file it includes into one ordered changelog.
pub fn load_changelog(
    path: &str,
    accessor: &dyn ResourceAccessor,
    parsers: &ParserRegistry,
) -> Result<Changelog> {
    let mut loader = Loader {
        accessor,
        parsers,
        stack: Vec::new(),
        change_sets: Vec::new(),
    };
    loader.load(path)?;
    Ok(Changelog {
        physical_path: path.to_string(),
        change_sets: loader.change_sets,
    })
}

struct Loader<'a> {
    accessor: &'a dyn ResourceAccessor,
    parsers: &'a ParserRegistry,
    stack: Vec<String>,
    change_sets: Vec<ChangeSet>,
}

impl Loader<'_> {
    fn load(&mut self, path: &str) -> Result<()> {
        let identity = self.accessor.identity(path);
        if self.stack.contains(&identity) {
            return Err(ConvertError::parse(format!(
                "include cycle: {} -> {path}",
                self.stack.join(" -> ")
            )));
        }

        let parser = self.parsers.lookup(path)?;
        let content = self
            .accessor
            .read_to_string(path)
            .map_err(|e| ConvertError::parse(format!("{e:#}")))?;
        let raw = parser.parse(path, &content)?;
        tracing::debug!(path, entries = raw.entries.len(), "parsed changelog file");

        self.stack.push(identity);
        for entry in raw.entries {
            match entry {
                Entry::ChangeSet(cs) => self.change_sets.push(cs),
                Entry::Include { file, relative } => {
                    let target = self.locate(path, &file, relative);
                    self.load(&target)?;
                }
                Entry::IncludeAll { path: dir, relative } => {
                    let dir = self.locate(path, &dir, relative);
                    let files: Vec<String> = self
                        .accessor
                        .list(&dir)
                        .map_err(|e| ConvertError::parse(format!("{e:#}")))?
                        .into_iter()
                        .filter(|f| self.parsers.supports(f))
                        .collect();
                    for file in &files {
                        self.load(file)?;
                    }
                }
            }
        }
        self.stack.pop();
        Ok(())
    }

    fn locate(&self, including: &str, file: &str, relative: bool) -> String {
        if relative {
            join_resource_path(&parent_of(including), file)
        } else {
            file.to_string()
        }
    }
}
