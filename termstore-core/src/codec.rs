//! TOML codec for section-based entity files.
//!
//! Converts between text and an ordered mapping of dotted section name to
//! fields. A table holding scalar values, or no entries at all, is a
//! section; a table that only groups sub-tables is not. Section and key
//! order survive a round-trip, which keeps diffs small when the files are
//! tracked in version control.
//!
//! ```text
//! [8ABB7E35241445A096E60C67977EEA52]
//! name = "Uncategorized"
//! slug = "uncategorized"
//!
//! [8ABB7E35241445A096E60C67977EEA52.taxonomies.B915DEDDA9634BE38367AD6A65D8CA8B]
//! taxonomy = "category"
//! parent = 0
//! ```

use indexmap::IndexMap;
use thiserror::Error;
use toml::{Table, Value as TomlValue};

use crate::value::{Fields, Value};

/// Flat section name -> fields mapping, in file order.
pub type Sections = IndexMap<String, Fields>;

#[derive(Error, Debug)]
pub enum CodecError {
    /// The text is not valid TOML. The message carries line and column.
    #[error("invalid TOML: {0}")]
    Syntax(#[from] toml::de::Error),

    /// Valid TOML that does not map onto sections of scalar fields.
    #[error("section `{section}`: {reason}")]
    Shape { section: String, reason: String },

    #[error("failed to write TOML: {0}")]
    Write(#[from] toml::ser::Error),
}

impl CodecError {
    fn shape(section: &str, reason: impl Into<String>) -> Self {
        Self::Shape {
            section: section.to_string(),
            reason: reason.into(),
        }
    }
}

/// Parses TOML text into sections.
///
/// Each section directly precedes the sections nested below it.
pub fn deserialize(input: &str) -> Result<Sections, CodecError> {
    let root: Table = toml::from_str(input)?;
    let mut sections = Sections::new();

    for (key, value) in root {
        match value {
            TomlValue::Table(table) => collect(key, table, &mut sections)?,
            _ => {
                return Err(CodecError::shape(
                    "",
                    format!("key `{}` outside of any section", key),
                ))
            }
        }
    }

    Ok(sections)
}

fn collect(path: String, table: Table, sections: &mut Sections) -> Result<(), CodecError> {
    let mut fields = Fields::new();
    let mut children = Vec::new();

    for (key, value) in table {
        let value = match value {
            TomlValue::Table(child) => {
                children.push((key, child));
                continue;
            }
            TomlValue::String(s) => Value::String(s),
            TomlValue::Integer(i) => Value::Integer(i),
            TomlValue::Boolean(b) => Value::Bool(b),
            TomlValue::Float(f) if f.is_finite() => Value::Float(f),
            TomlValue::Float(f) => {
                return Err(CodecError::shape(
                    &path,
                    format!("`{}` is not a finite number ({})", key, f),
                ))
            }
            other => {
                return Err(CodecError::shape(
                    &path,
                    format!("`{}` has unsupported {} value", key, other.type_str()),
                ))
            }
        };
        fields.insert(key, value);
    }

    if !fields.is_empty() || children.is_empty() {
        sections.insert(path.clone(), fields);
    }
    for (key, child) in children {
        collect(format!("{}.{}", path, key), child, sections)?;
    }

    Ok(())
}

/// Serializes sections to TOML text.
///
/// Fails when a section would have to nest below a scalar field, or when a
/// float is not finite.
pub fn serialize(sections: &Sections) -> Result<String, CodecError> {
    let mut root = Table::new();

    for (name, fields) in sections {
        let table = table_at(&mut root, name)?;
        for (key, value) in fields {
            if table.contains_key(key) {
                return Err(CodecError::shape(
                    name,
                    format!("`{}` is also the name of a nested section", key),
                ));
            }
            table.insert(key.clone(), to_toml(name, key, value)?);
        }
    }

    Ok(toml::to_string(&root)?)
}

fn table_at<'a>(root: &'a mut Table, name: &str) -> Result<&'a mut Table, CodecError> {
    let mut table = root;
    for segment in name.split('.') {
        if !table.contains_key(segment) {
            table.insert(segment.to_string(), TomlValue::Table(Table::new()));
        }
        table = match table.get_mut(segment) {
            Some(TomlValue::Table(child)) => child,
            _ => {
                return Err(CodecError::shape(
                    name,
                    format!("`{}` is already a field", segment),
                ))
            }
        };
    }
    Ok(table)
}

fn to_toml(section: &str, key: &str, value: &Value) -> Result<TomlValue, CodecError> {
    Ok(match value {
        Value::Bool(b) => TomlValue::Boolean(*b),
        Value::Integer(i) => TomlValue::Integer(*i),
        Value::Float(f) if f.is_finite() => TomlValue::Float(*f),
        Value::Float(f) => {
            return Err(CodecError::shape(
                section,
                format!("`{}` is not a finite number ({})", key, f),
            ))
        }
        Value::String(s) => TomlValue::String(s.clone()),
    })
}
