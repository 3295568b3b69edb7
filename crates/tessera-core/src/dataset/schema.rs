//! The `schema.json` meta item: column definitions, primary key and geometry
//! columns.

use super::feature::{Feature, PrimaryKey};
use crate::errors::{Result, TesseraError};
use serde::Deserialize;
use serde_json::Value;

pub const GEOMETRY_TYPE: &str = "geometry";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub primary_key_index: Option<u32>,
    #[serde(default)]
    pub geometry_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    columns: Vec<Column>,
    pk_index: usize,
}

impl Schema {
    /// Parse the `schema.json` value of `dataset`
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` unless the value is an array of columns with
    /// exactly one primary key column.
    pub fn from_value(dataset: &str, value: &Value) -> Result<Self> {
        let invalid = |reason: String| TesseraError::InvalidSchema {
            dataset: dataset.to_string(),
            reason,
        };
        let columns: Vec<Column> =
            serde_json::from_value(value.clone()).map_err(|e| invalid(e.to_string()))?;

        let pk_columns: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key_index.is_some())
            .map(|(i, _)| i)
            .collect();
        match pk_columns.as_slice() {
            [index] => Ok(Self {
                columns,
                pk_index: *index,
            }),
            [] => Err(invalid("no primary key column".to_string())),
            _ => Err(invalid("composite primary keys are not supported".to_string())),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn pk_column(&self) -> &str {
        &self.columns[self.pk_index].name
    }

    pub fn geometry_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(|c| c.data_type == GEOMETRY_TYPE)
    }

    /// Extract the primary key of `feature`
    ///
    /// # Errors
    ///
    /// Returns `InvalidPrimaryKey` if the key column is missing or holds
    /// something other than an integer or string.
    pub fn primary_key_of(&self, dataset: &str, feature: &Feature) -> Result<PrimaryKey> {
        let column = self.pk_column();
        let value = feature
            .get(column)
            .ok_or_else(|| TesseraError::InvalidPrimaryKey {
                dataset: dataset.to_string(),
                reason: format!("feature has no '{}' value", column),
            })?;
        PrimaryKey::from_value(value).ok_or_else(|| TesseraError::InvalidPrimaryKey {
            dataset: dataset.to_string(),
            reason: format!("'{}' must be an integer or string, got {}", column, value),
        })
    }

    /// Check that every geometry value is null or a hex string
    ///
    /// # Errors
    ///
    /// Returns `InvalidGeometry` naming the offending column.
    pub fn validate_feature(&self, dataset: &str, feature: &Feature) -> Result<()> {
        for column in self.geometry_columns() {
            let valid = match feature.get(&column.name) {
                None | Some(Value::Null) => true,
                Some(Value::String(hexwkb)) => hex::decode(hexwkb).is_ok(),
                Some(_) => false,
            };
            if !valid {
                return Err(TesseraError::InvalidGeometry {
                    dataset: dataset.to_string(),
                    column: column.name.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::from_value(
            "ds",
            &json!([
                {"name": "fid", "dataType": "integer", "primaryKeyIndex": 0},
                {"name": "geom", "dataType": "geometry", "geometryType": "POINT"},
                {"name": "name", "dataType": "text"}
            ]),
        )
        .unwrap()
    }

    fn feature(value: Value) -> Feature {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_primary_key_extraction() {
        let s = schema();
        assert_eq!(s.pk_column(), "fid");
        let pk = s
            .primary_key_of("ds", &feature(json!({"fid": 3, "name": "x"})))
            .unwrap();
        assert_eq!(pk, PrimaryKey::Int(3));
        assert!(s.primary_key_of("ds", &feature(json!({"name": "x"}))).is_err());
        assert!(s.primary_key_of("ds", &feature(json!({"fid": [1]}))).is_err());
    }

    #[test]
    fn test_geometry_validation() {
        let s = schema();
        assert!(s
            .validate_feature("ds", &feature(json!({"fid": 1, "geom": "0101000000"})))
            .is_ok());
        assert!(s
            .validate_feature("ds", &feature(json!({"fid": 1, "geom": null})))
            .is_ok());
        let err = s
            .validate_feature("ds", &feature(json!({"fid": 1, "geom": "POINT(1 2)"})))
            .unwrap_err();
        assert!(matches!(err, TesseraError::InvalidGeometry { column, .. } if column == "geom"));
    }

    #[test]
    fn test_schema_requires_single_primary_key() {
        assert!(Schema::from_value("ds", &json!([{"name": "a", "dataType": "text"}])).is_err());
        assert!(Schema::from_value(
            "ds",
            &json!([
                {"name": "a", "dataType": "integer", "primaryKeyIndex": 0},
                {"name": "b", "dataType": "integer", "primaryKeyIndex": 1}
            ])
        )
        .is_err());
        assert!(Schema::from_value("ds", &json!({"not": "an array"})).is_err());
    }
}
