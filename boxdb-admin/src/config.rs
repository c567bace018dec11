// Object space configuration, loaded at startup: per-table cardinality and
// persistence flags, and per-index field declarations. This crate does
// not pick a file format - callers deserialize a `Config` from whatever
// document format they like via `serde`; only the shape is fixed here.

use serde::Deserialize;

use boxdb_base::{kind_err, Kind, Result};
use boxdb_index::IndexConf as RuntimeIndexConf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum FieldType {
    Num,
    Num64,
    Str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexConf {
    pub fields: Vec<u32>,
    pub field_types: Vec<FieldType>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub partial: bool,
}

impl IndexConf {
    pub fn validate(&self) -> Result<()> {
        if self.fields.len() != self.field_types.len() {
            return Err(kind_err(
                Kind::MalformedTuple,
                format!(
                    "index declares {} fields but {} field types",
                    self.fields.len(),
                    self.field_types.len()
                ),
            ));
        }
        if self.fields.is_empty() {
            return Err(kind_err(Kind::MalformedTuple, "index must declare at least one field"));
        }
        Ok(())
    }

    pub fn into_runtime(self) -> RuntimeIndexConf {
        RuntimeIndexConf { fields: self.fields, unique: self.unique, partial: self.partial }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableConf {
    pub id: u32,
    #[serde(default)]
    pub cardinality: Option<u32>,
    #[serde(default = "default_true")]
    pub snap: bool,
    #[serde(default = "default_true")]
    pub wal: bool,
    #[serde(default)]
    pub ignored: bool,
    pub indices: Vec<IndexConf>,
}

fn default_true() -> bool {
    true
}

impl TableConf {
    pub fn validate(&self) -> Result<()> {
        if self.indices.is_empty() {
            return Err(kind_err(Kind::MalformedTuple, format!("table {} declares no indices", self.id)));
        }
        for idx in &self.indices {
            idx.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub tables: Vec<TableConf>,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::BTreeSet::new();
        for table in &self.tables {
            if !seen.insert(table.id) {
                return Err(kind_err(Kind::Other, format!("table id {} declared twice", table.id)));
            }
            table.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> Config {
        Config {
            tables: vec![TableConf {
                id: 0,
                cardinality: None,
                snap: true,
                wal: true,
                ignored: false,
                indices: vec![IndexConf { fields: vec![0], field_types: vec![FieldType::Num], unique: true, partial: false }],
            }],
        }
    }

    #[test]
    fn valid_config_passes() {
        sample().validate().unwrap();
    }

    #[test]
    fn duplicate_table_id_rejected() {
        let mut cfg = sample();
        cfg.tables.push(cfg.tables[0].clone());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn mismatched_field_types_rejected() {
        let mut cfg = sample();
        cfg.tables[0].indices[0].field_types.push(FieldType::Str);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn into_runtime_drops_field_types() {
        let conf = IndexConf { fields: vec![0, 1], field_types: vec![FieldType::Num, FieldType::Str], unique: true, partial: false };
        let runtime = conf.into_runtime();
        assert_eq!(runtime.fields, vec![0, 1]);
        assert!(runtime.unique);
    }
}
