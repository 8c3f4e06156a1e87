//! Schema metadata types for models, columns, and relations.
//!
//! These types are the parsed form of the declarative schema document that
//! every input database shares. The merge engine consumes them as-is; it
//! never inspects the databases' native catalogs to discover structure
//! (the catalog is only replayed verbatim to create the destination, see
//! the orchestrator).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::order;
use crate::error::{MergeError, Result};

/// A foreign-key relation carried by a model-typed column.
///
/// `fields` names the local scalar columns holding the key; `references`
/// names the corresponding columns on the target model. The target model
/// itself is named by the carrying column's type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub fields: Vec<String>,
    pub references: Vec<String>,
}

/// Column type: a scalar type name or another model's name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnType {
    pub name: String,

    /// List types are virtual (the inverse side of a relation) and never
    /// materialize as database columns.
    #[serde(default)]
    pub collection: bool,

    #[serde(default)]
    pub nullable: bool,
}

/// A single column of a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,

    #[serde(rename = "type")]
    pub ty: ColumnType,

    #[serde(default)]
    pub relation: Option<Relation>,

    #[serde(default)]
    pub unique: bool,

    #[serde(default)]
    pub primary_key: bool,
}

impl Column {
    /// Whether this column carries a relation annotation.
    pub fn has_relation(&self) -> bool {
        self.relation.is_some()
    }

    /// Find the column on `model` whose relation lists this column as a
    /// foreign-key field.
    ///
    /// The returned column is the virtual relation carrier (its type names
    /// the target model), not a real database column.
    pub fn related_column<'a>(&self, model: &'a Model) -> Option<&'a Column> {
        model.columns.iter().find(|column| {
            column
                .relation
                .as_ref()
                .is_some_and(|relation| relation.fields.contains(&self.name))
        })
    }

    /// SQLite expression selecting this column pre-quoted as a SQL literal.
    pub fn quoted(&self, model_name: &str) -> String {
        format!("quote(\"{}\".\"{}\")", model_name, self.name)
    }

    /// A column is regular iff it is not the primary key, not a collection,
    /// has no relation, and its type does not name another model. Regular
    /// columns are copied wholesale; everything else is either the key,
    /// translated through a map table, or virtual.
    pub fn is_regular(&self, schema: &Schema) -> bool {
        !self.primary_key
            && !self.ty.collection
            && !self.has_relation()
            && !schema.models.contains_key(&self.ty.name)
    }
}

/// A model's single unique constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unique {
    pub column_names: Vec<String>,
}

/// A logical table: named columns, one primary key, optional unique
/// constraint.
#[derive(Debug, Clone, Serialize)]
pub struct Model {
    pub name: String,
    pub columns: Vec<Column>,
    pub unique: Option<Unique>,
    pub primary_key_index: Option<usize>,
}

impl Model {
    /// Create a model, locating the primary-key column.
    pub fn new(name: impl Into<String>, columns: Vec<Column>, unique: Option<Unique>) -> Self {
        let primary_key_index = columns.iter().position(|column| column.primary_key);

        Model {
            name: name.into(),
            columns,
            unique,
            primary_key_index,
        }
    }

    /// The primary-key column, if the model declares one.
    pub fn primary_key(&self) -> Option<&Column> {
        self.primary_key_index.map(|idx| &self.columns[idx])
    }

    /// Return the column with the given name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// The columns copied without translation, in declaration order.
    pub fn regular_columns<'a>(&'a self, schema: &Schema) -> Vec<&'a Column> {
        self.columns
            .iter()
            .filter(|column| column.is_regular(schema))
            .collect()
    }
}

/// The shared schema: an ordered mapping from model name to model.
///
/// Insertion order is meaningful: it breaks ties in the merge order and
/// fixes the iteration order of verification and cleanup.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Schema {
    pub models: IndexMap<String, Model>,
}

/// On-disk shape of the schema document.
#[derive(Debug, Deserialize)]
struct SchemaDoc {
    models: IndexMap<String, ModelDoc>,
}

#[derive(Debug, Deserialize)]
struct ModelDoc {
    columns: Vec<Column>,

    #[serde(default)]
    unique_fields: Option<Vec<String>>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Schema {
            models: IndexMap::new(),
        }
    }

    /// Load a schema document from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Parse a schema document from a JSON string.
    ///
    /// A model's unique constraint is its declared `unique_fields` list or,
    /// if absent, the first column marked `unique`. The parsed schema is
    /// validated before being returned.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: SchemaDoc = serde_json::from_str(json)
            .map_err(|e| MergeError::schema(format!("Failed to parse schema document: {}", e)))?;

        let mut schema = Schema::new();

        for (name, model) in doc.models {
            let unique = model
                .unique_fields
                .map(|column_names| Unique { column_names })
                .or_else(|| {
                    model.columns.iter().find(|c| c.unique).map(|c| Unique {
                        column_names: vec![c.name.clone()],
                    })
                });

            schema
                .models
                .insert(name.clone(), Model::new(name, model.columns, unique));
        }

        schema.validate()?;
        Ok(schema)
    }

    /// Check the invariants the merge engine relies on.
    ///
    /// Every model must have exactly one primary-key column, and every
    /// declared unique member must exist on its model. Violations are
    /// reported before any merging begins.
    pub fn validate(&self) -> Result<()> {
        for model in self.models.values() {
            let pk_count = model.columns.iter().filter(|c| c.primary_key).count();

            if pk_count == 0 {
                return Err(MergeError::schema(format!(
                    "Model {} has no primary key",
                    model.name
                )));
            }

            if pk_count > 1 {
                return Err(MergeError::schema(format!(
                    "Model {} has {} primary key columns, expected exactly one",
                    model.name, pk_count
                )));
            }

            if let Some(unique) = &model.unique {
                for name in &unique.column_names {
                    if model.column(name).is_none() {
                        return Err(MergeError::schema(format!(
                            "Unique column {} is not a column of model {}",
                            name, model.name
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Models ordered so that referenced models come before referencing
    /// ones. See [`crate::core::order`].
    pub fn sorted(&self) -> Vec<&Model> {
        order::sorted(self)
    }
}
