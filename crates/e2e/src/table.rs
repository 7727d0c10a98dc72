//! Scenario tables
//!
//! A table is one axis of input variation against one page: a set of
//! default inputs plus rows that override, omit or extend them, each with an
//! expected outcome. Tables live in YAML so adding a row never touches code.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::assertion::ExpectedOutcome;
use crate::error::{E2eError, E2eResult};
use crate::hooks::SetupAction;

/// Field name to value, in the order the fields are filled
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldInputs(Vec<(String, String)>);

impl FieldInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, keeping the field's original position if already present
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Remove a field, returning whether it was present
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|(n, _)| n != name);
        self.0.len() != before
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn as_slice(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for FieldInputs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct InputsVisitor;

        impl<'de> Visitor<'de> for InputsVisitor {
            type Value = FieldInputs;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of field name to value")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FieldInputs, A::Error> {
                let mut inputs = FieldInputs::new();
                while let Some((name, value)) = map.next_entry::<String, Scalar>()? {
                    let value = value.into_string();
                    if inputs.get(&name).is_some() {
                        return Err(serde::de::Error::custom(format!(
                            "field '{}' given twice",
                            name
                        )));
                    }
                    inputs.0.push((name, value));
                }
                Ok(inputs)
            }
        }

        deserializer.deserialize_map(InputsVisitor)
    }
}

/// Input value. Unquoted integers and booleans such as `Zip Code: 91234`
/// are taken as text; unquoted decimals are rejected because YAML has
/// already dropped their formatting (`1.50` reads as `1.5`).
struct Scalar(String);

impl Scalar {
    fn into_string(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScalarVisitor;

        impl<'de> Visitor<'de> for ScalarVisitor {
            type Value = Scalar;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a text value")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Scalar, E> {
                Ok(Scalar(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Scalar, E> {
                Ok(Scalar(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Scalar, E> {
                Ok(Scalar(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Scalar, E> {
                Ok(Scalar(v.to_string()))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Scalar, E> {
                Ok(Scalar(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Scalar, E> {
                Err(E::custom(format!(
                    "unquoted decimal {} loses its formatting; quote the value",
                    v
                )))
            }
        }

        deserializer.deserialize_any(ScalarVisitor)
    }
}

fn yes() -> bool {
    true
}

/// One row of a table
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioRow {
    pub name: String,

    /// Start from the table defaults
    #[serde(default = "yes")]
    pub inherit_defaults: bool,

    /// Default fields left empty for this row
    #[serde(default)]
    pub omit: Vec<String>,

    /// Values overriding or extending the defaults
    #[serde(default)]
    pub inputs: FieldInputs,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub setup: Vec<SetupAction>,

    pub expect: ExpectedOutcome,
}

/// A table as written in YAML
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioTable {
    pub name: String,

    /// Name of the page definition the rows run against
    pub page: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub defaults: FieldInputs,

    /// Setup shared by every row
    #[serde(default)]
    pub setup: Vec<SetupAction>,

    pub rows: Vec<ScenarioRow>,

    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// One runnable scenario, produced from a table row. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioCase {
    pub name: String,
    pub table: String,
    pub page: String,
    pub tags: Vec<String>,
    pub inputs: FieldInputs,
    pub setup: Vec<SetupAction>,
    pub expect: ExpectedOutcome,
}

impl ScenarioCase {
    /// `table/row`, unique across a suite
    pub fn id(&self) -> String {
        format!("{}/{}", self.table, self.name)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Touches state shared by every session, so must run alone
    pub fn is_exclusive(&self) -> bool {
        self.setup.iter().any(SetupAction::is_global)
    }
}

impl ScenarioTable {
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let table: Self = serde_yaml::from_str(yaml)?;
        table.validate()?;
        Ok(table)
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut table = Self::from_yaml(&content)
            .map_err(|e| E2eError::TableParse(format!("{}: {}", path.display(), e)))?;
        table.source = Some(path.to_path_buf());
        Ok(table)
    }

    /// Load every `*.yaml` / `*.yml` table under `dir`, in path order
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        if !dir.is_dir() {
            return Err(E2eError::TableParse(format!(
                "not a directory: {}",
                dir.display()
            )));
        }

        let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        let tables = paths
            .iter()
            .map(|p| Self::from_file(p))
            .collect::<E2eResult<Vec<_>>>()?;

        let mut names = HashSet::new();
        for table in &tables {
            if !names.insert(table.name.as_str()) {
                return Err(E2eError::TableParse(format!(
                    "table name '{}' used by more than one file",
                    table.name
                )));
            }
        }
        Ok(tables)
    }

    fn validate(&self) -> E2eResult<()> {
        if self.rows.is_empty() {
            return Err(E2eError::TableParse(format!("table '{}' has no rows", self.name)));
        }
        let mut seen = HashSet::new();
        for row in &self.rows {
            if !seen.insert(row.name.as_str()) {
                return Err(E2eError::TableParse(format!(
                    "table '{}' has two rows named '{}'",
                    self.name, row.name
                )));
            }
            for field in &row.omit {
                if row.inherit_defaults && self.defaults.get(field).is_none() {
                    return Err(E2eError::TableParse(format!(
                        "row '{}' omits '{}', which is not a default",
                        row.name, field
                    )));
                }
            }
        }
        Ok(())
    }

    /// Expand rows into cases
    pub fn cases(&self) -> Vec<ScenarioCase> {
        self.rows.iter().map(|row| self.expand(row)).collect()
    }

    fn expand(&self, row: &ScenarioRow) -> ScenarioCase {
        let mut inputs = if row.inherit_defaults {
            self.defaults.clone()
        } else {
            FieldInputs::new()
        };
        for field in &row.omit {
            inputs.remove(field);
        }
        for (name, value) in row.inputs.iter() {
            inputs.set(name, value);
        }

        let mut tags = self.tags.clone();
        for tag in &row.tags {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }

        ScenarioCase {
            name: row.name.clone(),
            table: self.name.clone(),
            page: self.page.clone(),
            tags,
            inputs,
            setup: self.setup.iter().chain(&row.setup).cloned().collect(),
            expect: row.expect.clone(),
        }
    }
}

/// Expand every table into its cases, in table order
pub fn expand_all(tables: &[ScenarioTable]) -> Vec<ScenarioCase> {
    tables.iter().flat_map(ScenarioTable::cases).collect()
}

/// Cases carrying `tag`
pub fn filter_by_tag<'a>(cases: &'a [ScenarioCase], tag: &str) -> Vec<&'a ScenarioCase> {
    cases.iter().filter(|c| c.has_tag(tag)).collect()
}
