//! Unique-index existence probe.
//!
//! When a model declares a unique constraint, rows copied from secondary
//! sources are checked against the destination before insertion. The probe
//! is compiled once per model: regular members compare directly, while
//! foreign-key members join through the target model's identity-map table
//! (the destination stores translated keys, so the source value must be
//! matched against `old_id` and aligned with `new_id`).
//!
//! Placeholders are filled by textual substitution rather than parameter
//! binding: the values arrive already quoted by the source database's
//! `quote()`, and binding would escape them a second time.

use rusqlite::{Connection, OptionalExtension};

use crate::core::schema::{Column, Model};
use crate::error::{MergeError, Result};

/// Compiled existence probe for one model's unique constraint.
#[derive(Debug, Clone)]
pub struct UniqueProbe {
    template: String,
    /// For each unique member, its position in the streamed regular values.
    members: Vec<usize>,
}

impl UniqueProbe {
    /// Compile the probe, or `None` when the model has no unique
    /// constraint.
    ///
    /// Every unique member must be one of the model's regular columns
    /// (a plain value or a scalar foreign key); anything else is a schema
    /// violation.
    pub fn compile(model: &Model, regulars: &[&Column]) -> Result<Option<Self>> {
        let Some(unique) = &model.unique else {
            return Ok(None);
        };

        let primary_key = model
            .primary_key()
            .ok_or_else(|| MergeError::schema(format!("Model {} has no primary key", model.name)))?;

        let mut joins: Vec<String> = Vec::new();
        let mut wheres: Vec<String> = Vec::new();
        let mut members: Vec<usize> = Vec::new();

        for (idx, name) in unique.column_names.iter().enumerate() {
            let column = model.column(name).ok_or_else(|| {
                MergeError::schema(format!(
                    "Unique column {} is not a column of model {}",
                    name, model.name
                ))
            })?;

            let position = regulars
                .iter()
                .position(|c| c.name == *name)
                .ok_or_else(|| {
                    MergeError::schema(format!(
                        "Unique column {} of model {} is not a regular column",
                        name, model.name
                    ))
                })?;
            members.push(position);

            if let Some(related) = column.related_column(model) {
                joins.push(format!(
                    "JOIN {target}_id_map ON \"{model}\".\"{column}\" = {target}_id_map.new_id",
                    target = related.ty.name,
                    model = model.name,
                    column = column.name
                ));

                wheres.push(format!(
                    "{target}_id_map.old_id = ?{idx}",
                    target = related.ty.name,
                    idx = idx + 1
                ));
            } else {
                wheres.push(format!("{column} = ?{idx}", column = name, idx = idx + 1));
            }
        }

        let template = format!(
            r#"
                SELECT quote("{pk}") AS "{pk}" FROM "{table}"
                {joins}
                WHERE {wheres}
                LIMIT 1;
            "#,
            pk = primary_key.name,
            table = model.name,
            joins = joins.join("\n"),
            wheres = wheres.join(" AND ")
        );

        Ok(Some(UniqueProbe { template, members }))
    }

    /// Render the probe for one source row by placeholder substitution.
    ///
    /// Higher indices are substituted first so ?1 cannot clobber ?10.
    pub fn render(&self, values: &[String]) -> String {
        let mut sql = self.template.clone();

        for (idx, position) in self.members.iter().enumerate().rev() {
            sql = sql.replace(&format!("?{}", idx + 1), &values[*position]);
        }

        sql
    }

    /// Look up a destination row matching the source row's unique tuple.
    ///
    /// Returns the existing row's primary key as a quoted SQL literal, or
    /// `None` when no such row exists.
    pub fn lookup(&self, destination: &Connection, values: &[String]) -> Result<Option<String>> {
        let sql = self.render(values);

        let existing = destination
            .query_row(&sql, [], |row| row.get::<_, String>(0))
            .optional()?;

        Ok(existing)
    }
}
