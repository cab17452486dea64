//! End-to-end orchestration.
//!
//! The pipeline sequences the stages without adding logic of its own: build
//! or load the shapes document, fetch the entity list, fetch property values
//! window by window, assemble the data graph, run the constraint engine and
//! aggregate the violations. Every stage's artifact is persisted before the
//! next stage starts, so a late failure never forces a re-fetch.

use crate::assemble::assemble_graph;
use crate::endpoint::QueryService;
use crate::engine::{ConstraintEngine, MinCountEngine};
use crate::error::{CompletenessError, Result};
use crate::fetch::{WindowedFetcher, DEFAULT_WINDOW_SIZE};
use crate::report::{aggregate, CompletenessMatrix};
use crate::results::{BindingValue, ResultTable, LANG_NOT_SPECIFIED};
use crate::shapes::ShapeDocument;
use crate::tabular;
use crate::types::EntityRef;
use log::info;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DATA_CSV: &str = "data.csv";
pub const DATA_PROP_CSV: &str = "data_prop.csv";
pub const SHAPES_TTL: &str = "shapes.ttl";
pub const REPORT_CSV: &str = "validation_report.csv";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory the checkpoint files are written into.
    pub output_dir: PathBuf,
    pub window_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            output_dir: PathBuf::from("."),
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }
}

pub struct Pipeline<'a, S: QueryService> {
    service: &'a S,
    config: PipelineConfig,
}

impl<'a, S: QueryService> Pipeline<'a, S> {
    pub fn new(service: &'a S, config: PipelineConfig) -> Self {
        Pipeline { service, config }
    }

    /// Runs the full pipeline with the built-in minimum-occurrence engine.
    pub fn run(
        &self,
        shape: &ShapeDocument,
        instance_query: &str,
    ) -> Result<CompletenessMatrix> {
        self.run_with_engine(&MinCountEngine::new(), shape, instance_query)
    }

    pub fn run_with_engine(
        &self,
        engine: &dyn ConstraintEngine,
        shape: &ShapeDocument,
        instance_query: &str,
    ) -> Result<CompletenessMatrix> {
        fs::create_dir_all(&self.config.output_dir)?;

        println!("writing shapes document");
        fs::write(
            self.config.output_dir.join(SHAPES_TTL),
            shape.to_turtle(),
        )?;

        println!("retrieving entity list");
        let fetcher = WindowedFetcher::new(self.service).with_window_size(self.config.window_size);
        let (entities, _) = fetcher.fetch_entities(instance_query)?;
        write_entities_csv(&self.config.output_dir.join(DATA_CSV), &entities)?;

        println!("retrieving property values for {} entities", entities.len());
        let properties = shape.property_list();
        let rows = fetcher.fetch_property_values(&entities, &properties)?;
        write_property_rows_csv(&self.config.output_dir.join(DATA_PROP_CSV), &rows)?;

        println!("validating");
        let matrix = validate_offline(engine, shape, &entities, &rows)?;

        println!("writing completeness report");
        fs::write(self.config.output_dir.join(REPORT_CSV), matrix.to_csv())?;
        info!(
            "pipeline finished: {} entities, {} properties, overall completeness {:.3}",
            matrix.rows.len(),
            matrix.properties.len(),
            matrix.overall()
        );
        Ok(matrix)
    }
}

/// The validation tail of the pipeline, runnable from checkpoint files
/// without touching the endpoint.
pub fn validate_offline(
    engine: &dyn ConstraintEngine,
    shape: &ShapeDocument,
    entities: &[EntityRef],
    rows: &ResultTable,
) -> Result<CompletenessMatrix> {
    let class = EntityRef::new(shape.target_uri()?).to_named_node()?;
    let graph = assemble_graph(entities, rows, &class)?;
    let outcome = engine.validate(shape, &graph)?;
    info!(
        "conforms: {} ({} violations)",
        outcome.conforms,
        outcome.violations.len()
    );
    Ok(aggregate(
        entities,
        &shape.property_list(),
        &outcome.violations,
    ))
}

/// Writes the entity checkpoint: URI plus its `<uri>` rendering per row.
pub fn write_entities_csv(path: &Path, entities: &[EntityRef]) -> Result<()> {
    let mut out = String::new();
    tabular::write_row(&mut out, &["entity", "bracketed"]);
    for entity in entities {
        tabular::write_row(&mut out, &[entity.as_str(), &entity.bracketed()]);
    }
    fs::write(path, out)?;
    Ok(())
}

pub fn read_entities_csv(path: &Path) -> Result<Vec<EntityRef>> {
    let text = fs::read_to_string(path)?;
    let rows = tabular::read(&text)?;
    let mut entities = Vec::new();
    for row in rows.iter().skip(1) {
        let uri = row.first().ok_or_else(|| {
            CompletenessError::Tabular("entity checkpoint row is empty".into())
        })?;
        entities.push(EntityRef::new(uri.clone()));
    }
    Ok(entities)
}

/// Writes the raw property rows: subject, predicate, object value plus the
/// object's wire type, datatype and language. Absent language is persisted
/// as the `"not specified"` sentinel, absent datatype as an empty field.
pub fn write_property_rows_csv(path: &Path, table: &ResultTable) -> Result<()> {
    let mut out = String::new();
    tabular::write_row(&mut out, &["s", "p", "o", "type", "datatype", "lang"]);
    for row in &table.rows {
        let binding = |var: &str| -> Result<&BindingValue> {
            row.get(var).ok_or_else(|| {
                CompletenessError::MalformedRow(format!("property row missing ?{} binding", var))
            })
        };
        let s = binding("s")?;
        let p = binding("p")?;
        let o = binding("o")?;
        tabular::write_row(
            &mut out,
            &[
                s.value(),
                p.value(),
                o.value(),
                o.type_tag(),
                o.datatype().unwrap_or(""),
                o.lang_or_sentinel(),
            ],
        );
    }
    fs::write(path, out)?;
    Ok(())
}

pub fn read_property_rows_csv(path: &Path) -> Result<ResultTable> {
    let text = fs::read_to_string(path)?;
    let rows = tabular::read(&text)?;
    let mut table = ResultTable {
        vars: vec!["s".into(), "p".into(), "o".into()],
        rows: Vec::new(),
    };
    for (index, row) in rows.iter().enumerate().skip(1) {
        if row.len() < 6 {
            return Err(CompletenessError::Tabular(format!(
                "property checkpoint row {} has {} fields, expected 6",
                index + 1,
                row.len()
            )));
        }
        let object = binding_from_columns(&row[2], &row[3], &row[4], &row[5]).map_err(|e| {
            CompletenessError::Tabular(format!("property checkpoint row {}: {}", index + 1, e))
        })?;
        let mut bindings = HashMap::new();
        bindings.insert(
            "s".to_string(),
            BindingValue::Uri {
                value: row[0].clone(),
            },
        );
        bindings.insert(
            "p".to_string(),
            BindingValue::Uri {
                value: row[1].clone(),
            },
        );
        bindings.insert("o".to_string(), object);
        table.rows.push(bindings);
    }
    Ok(table)
}

fn binding_from_columns(
    value: &str,
    type_tag: &str,
    datatype: &str,
    lang: &str,
) -> std::result::Result<BindingValue, String> {
    let lang = if lang == LANG_NOT_SPECIFIED || lang.is_empty() {
        None
    } else {
        Some(lang.to_string())
    };
    let datatype = if datatype.is_empty() {
        None
    } else {
        Some(datatype.to_string())
    };
    match type_tag {
        "uri" => Ok(BindingValue::Uri {
            value: value.to_string(),
        }),
        "literal" => Ok(BindingValue::Literal {
            value: value.to_string(),
            datatype,
            lang,
        }),
        "typed-literal" => Ok(BindingValue::TypedLiteral {
            value: value.to_string(),
            datatype: datatype.ok_or("typed-literal without a datatype")?,
            lang,
        }),
        "bnode" => Ok(BindingValue::Bnode {
            value: value.to_string(),
        }),
        other => Err(format!("unknown binding type {:?}", other)),
    }
}
