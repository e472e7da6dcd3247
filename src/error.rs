use thiserror::Error;

/// Failures of a single conversion run.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The source (or an included file) could not be read or understood.
    #[error("failed to parse changelog: {0}")]
    Parse(String),

    /// Writing the target file failed, or a change has no representation
    /// in the target format.
    #[error("failed to serialize changelog: {0}")]
    Serialization(String),

    /// No serializer or SQL generator exists for the requested target.
    #[error("no database generator for '{database}'")]
    UnsupportedDatabase { database: String },
}

impl ConvertError {
    pub fn parse(msg: impl std::fmt::Display) -> Self {
        Self::Parse(msg.to_string())
    }

    pub fn serialization(msg: impl std::fmt::Display) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// The single line shown to the user. `database` is the identifier the
    /// user asked for, which is what the generator message names.
    pub fn user_message(&self, database: &str) -> String {
        match self {
            Self::Parse(_) => "There was a problem parsing the source file.".to_string(),
            Self::Serialization(_) => "There was a problem serializing the source file.".to_string(),
            Self::UnsupportedDatabase { .. } => {
                format!("Database generator for type '{database}' was not found.")
            }
        }
    }
}

impl From<std::io::Error> for ConvertError {
    fn from(err: std::io::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T, E = ConvertError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        assert_eq!(
            ConvertError::parse("bad").user_message("mysql"),
            "There was a problem parsing the source file."
        );
        assert_eq!(
            ConvertError::serialization("disk full").user_message("mysql"),
            "There was a problem serializing the source file."
        );
        let err = ConvertError::UnsupportedDatabase {
            database: "foo".into(),
        };
        assert_eq!(
            err.user_message("foo"),
            "Database generator for type 'foo' was not found."
        );
    }
}
