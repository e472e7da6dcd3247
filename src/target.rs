use std::path::Path;

use crate::arguments::ConversionArguments;

/// Output path for a conversion: `<dir>/<stem>.<database>.<format>` next
/// to the source.
///
/// The database segment is what the formatted SQL serializer reads back
/// to pick a dialect, and it keeps the output from ever overwriting the
/// source.
pub fn build_filename(args: &ConversionArguments) -> String {
    let source = args.source();
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = format!("{}.{}.{}", stem, args.database(), args.target_format());

    match source.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            parent.join(file_name).to_string_lossy().into_owned()
        }
        _ => file_name,
    }
}

/// Lowercase extension of a filename, used as the registry key.
pub fn format_key(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(source: &str, db: &str, format: Option<&str>) -> ConversionArguments {
        ConversionArguments::new(
            Some(PathBuf::from(source)),
            Some(db.to_string()),
            format.map(str::to_string),
        )
    }

    #[test]
    fn test_defaults_to_yaml() {
        assert_eq!(build_filename(&args("changelog.xml", "mysql", None)), "changelog.mysql.yaml");
    }

    #[test]
    fn test_keeps_directory() {
        let name = build_filename(&args("db/changelog/master.xml", "postgresql", Some("sql")));
        assert_eq!(
            PathBuf::from(name),
            PathBuf::from("db/changelog").join("master.postgresql.sql")
        );
    }

    #[test]
    fn test_same_format_does_not_collide_with_source() {
        let name = build_filename(&args("changelog.xml", "h2", Some("xml")));
        assert_eq!(name, "changelog.h2.xml");
    }

    #[test]
    fn test_deterministic() {
        let a = args("x.yaml", "oracle", Some("json"));
        assert_eq!(build_filename(&a), build_filename(&a));
    }

    #[test]
    fn test_format_key() {
        assert_eq!(format_key("a/b.MySQL.SQL").as_deref(), Some("sql"));
        assert_eq!(format_key("noext"), None);
    }
}
