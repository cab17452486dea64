//! Property-derivation strategies.
//!
//! Three ways to decide which properties a class's entities are expected to
//! carry: the ontology's `rdfs:domain` declarations, usage statistics over
//! the class instances, or a curated spreadsheet of per-entity shapes.

use crate::endpoint::QueryService;
use crate::error::{CompletenessError, Result};
use crate::shapes::{build_shape, ShapeDocument, ShapeTarget};
use crate::tabular;
use crate::types::{Prefixes, PropertyConstraint, PropertyRef};
use log::{debug, info, warn};

/// Number of properties kept by the statistics strategy.
pub const STATISTICS_TOP_N: usize = 10;

/// Namespace candidate properties are restricted to.
const ONTOLOGY_NAMESPACE: &str = "http://dbpedia.org/ontology/";

/// Properties declared with the class as their `rdfs:domain`, each expected
/// at least once.
pub fn properties_by_ontology<S: QueryService>(
    service: &S,
    class_uri: &str,
) -> Result<Vec<PropertyConstraint>> {
    let query = format!(
        "PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>\n\
         SELECT DISTINCT ?property\n\
         WHERE {{\n    ?property rdfs:domain <{}> .\n}}",
        class_uri
    );
    let table = service.query(&query)?;
    let properties = table.entity_column("property")?;
    info!(
        "ontology declares {} properties with domain <{}>",
        properties.len(),
        class_uri
    );
    Ok(properties
        .into_iter()
        .map(|p| PropertyConstraint::new(PropertyRef::new(p.as_str())))
        .collect())
}

/// A candidate property with the share of class instances carrying it.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyFrequency {
    pub property: PropertyRef,
    pub frequency: f64,
}

/// Ranks the ontology-namespace properties used by class instances, by the
/// fraction of distinct instances carrying each, descending. Ties break on
/// property URI so the ranking is deterministic.
pub fn ranked_properties<S: QueryService>(
    service: &S,
    class_uri: &str,
) -> Result<Vec<PropertyFrequency>> {
    let count_query = format!(
        "PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>\n\
         SELECT (COUNT(DISTINCT ?s) AS ?numOfEntities)\n\
         WHERE {{\n    ?s rdf:type <{}> .\n}}",
        class_uri
    );
    let total = service.query(&count_query)?.scalar_u64()?;
    if total == 0 {
        warn!("class <{}> has no instances, nothing to rank", class_uri);
        return Ok(Vec::new());
    }

    let candidates_query = format!(
        "PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>\n\
         SELECT DISTINCT ?property\n\
         WHERE {{\n    ?s rdf:type <{}> .\n    ?s ?property ?o .\n    \
         FILTER(STRSTARTS(STR(?property), \"{}\"))\n}}",
        class_uri, ONTOLOGY_NAMESPACE
    );
    let candidates = service.query(&candidates_query)?.entity_column("property")?;
    info!(
        "ranking {} candidate properties over {} instances of <{}>",
        candidates.len(),
        total,
        class_uri
    );

    let mut ranked = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let usage_query = format!(
            "PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>\n\
             SELECT (COUNT(DISTINCT ?s) AS ?numOfEntities)\n\
             WHERE {{\n    ?s rdf:type <{}> .\n    ?s {} ?o .\n}}",
            class_uri,
            candidate.bracketed()
        );
        let used = service.query(&usage_query)?.scalar_u64()?;
        let frequency = used as f64 / total as f64;
        debug!("{}: {}/{} instances", candidate, used, total);
        ranked.push(PropertyFrequency {
            property: PropertyRef::new(candidate.as_str()),
            frequency,
        });
    }

    ranked.sort_by(|a, b| {
        b.frequency
            .partial_cmp(&a.frequency)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.property.as_str().cmp(b.property.as_str()))
    });
    Ok(ranked)
}

/// The statistics strategy: the top-ranked properties, each expected at
/// least once.
pub fn properties_by_statistics<S: QueryService>(
    service: &S,
    class_uri: &str,
) -> Result<Vec<PropertyConstraint>> {
    let ranked = ranked_properties(service, class_uri)?;
    Ok(ranked
        .into_iter()
        .take(STATISTICS_TOP_N)
        .map(|pf| PropertyConstraint::new(pf.property))
        .collect())
}

/// Column positions in a shape spreadsheet. The first row is a header and is
/// skipped.
#[derive(Debug, Clone)]
pub struct SpreadsheetColumns {
    pub name: usize,
    pub target: usize,
    pub min_count: usize,
}

impl Default for SpreadsheetColumns {
    fn default() -> Self {
        SpreadsheetColumns {
            name: 0,
            target: 1,
            min_count: 2,
        }
    }
}

/// Builds one node-target shape per spreadsheet row, all constraining the
/// same fixed property.
pub fn shapes_from_spreadsheet(
    csv_text: &str,
    columns: &SpreadsheetColumns,
    property: &PropertyRef,
    prefixes: &Prefixes,
) -> Result<Vec<ShapeDocument>> {
    let rows = tabular::read(csv_text)?;
    let mut shapes = Vec::new();
    for (index, row) in rows.iter().enumerate().skip(1) {
        let name = cell(row, index, columns.name, "shape name")?;
        let target = cell(row, index, columns.target, "target node")?;
        let min_count = cell(row, index, columns.min_count, "cardinality")?;
        let min_count = min_count.trim().parse::<u64>().map_err(|e| {
            CompletenessError::Tabular(format!(
                "row {}: cardinality {:?} is not an integer: {}",
                index + 1,
                min_count,
                e
            ))
        })?;
        shapes.push(build_shape(
            name.trim(),
            ShapeTarget::Node(target.trim().to_string()),
            &[PropertyConstraint::with_min_count(
                property.clone(),
                min_count,
            )],
            prefixes,
        ));
    }
    info!("built {} shapes from spreadsheet", shapes.len());
    Ok(shapes)
}

fn cell<'a>(row: &'a [String], index: usize, col: usize, what: &str) -> Result<&'a str> {
    row.get(col).map(String::as_str).ok_or_else(|| {
        CompletenessError::Tabular(format!(
            "row {} has no {} column (index {})",
            index + 1,
            what,
            col
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{BindingValue, ResultTable};
    use std::collections::HashMap;

    struct FnService<F: Fn(&str) -> Result<ResultTable>>(F);

    impl<F: Fn(&str) -> Result<ResultTable>> QueryService for FnService<F> {
        fn query(&self, query: &str) -> Result<ResultTable> {
            (self.0)(query)
        }
    }

    fn uri_table(var: &str, uris: &[&str]) -> ResultTable {
        ResultTable {
            vars: vec![var.to_string()],
            rows: uris
                .iter()
                .map(|u| {
                    let mut row = HashMap::new();
                    row.insert(
                        var.to_string(),
                        BindingValue::Uri {
                            value: u.to_string(),
                        },
                    );
                    row
                })
                .collect(),
        }
    }

    fn count_table(n: u64) -> ResultTable {
        ResultTable {
            vars: vec!["numOfEntities".to_string()],
            rows: vec![{
                let mut row = HashMap::new();
                row.insert(
                    "numOfEntities".to_string(),
                    BindingValue::TypedLiteral {
                        value: n.to_string(),
                        datatype: "http://www.w3.org/2001/XMLSchema#integer".to_string(),
                        lang: None,
                    },
                );
                row
            }],
        }
    }

    #[test]
    fn ontology_strategy_lists_domain_properties() {
        let service = FnService(|query: &str| {
            assert!(query.contains("rdfs:domain <http://dbpedia.org/ontology/Hotel>"));
            Ok(uri_table(
                "property",
                &[
                    "http://dbpedia.org/ontology/location",
                    "http://dbpedia.org/ontology/numberOfRooms",
                ],
            ))
        });
        let constraints =
            properties_by_ontology(&service, "http://dbpedia.org/ontology/Hotel").unwrap();
        assert_eq!(constraints.len(), 2);
        assert!(constraints.iter().all(|c| c.min_count == 1));
        assert_eq!(
            constraints[0].property,
            PropertyRef::new("http://dbpedia.org/ontology/location")
        );
    }

    #[test]
    fn statistics_strategy_ranks_by_relative_frequency() {
        let service = FnService(|query: &str| {
            if query.contains("?property") {
                Ok(uri_table(
                    "property",
                    &[
                        "http://dbpedia.org/ontology/rare",
                        "http://dbpedia.org/ontology/common",
                        "http://dbpedia.org/ontology/half",
                    ],
                ))
            } else if query.contains("<http://dbpedia.org/ontology/common>") {
                Ok(count_table(4))
            } else if query.contains("<http://dbpedia.org/ontology/half>") {
                Ok(count_table(2))
            } else if query.contains("<http://dbpedia.org/ontology/rare>") {
                Ok(count_table(1))
            } else {
                // The instance count.
                Ok(count_table(4))
            }
        });

        let ranked = ranked_properties(&service, "http://dbpedia.org/ontology/Hotel").unwrap();
        let uris: Vec<&str> = ranked.iter().map(|p| p.property.as_str()).collect();
        assert_eq!(
            uris,
            vec![
                "http://dbpedia.org/ontology/common",
                "http://dbpedia.org/ontology/half",
                "http://dbpedia.org/ontology/rare",
            ]
        );
        assert_eq!(ranked[0].frequency, 1.0);
        assert_eq!(ranked[1].frequency, 0.5);
        assert_eq!(ranked[2].frequency, 0.25);
    }

    #[test]
    fn statistics_strategy_keeps_top_ten() {
        let candidates: Vec<String> = (0..15)
            .map(|i| format!("http://dbpedia.org/ontology/p{:02}", i))
            .collect();
        let service = FnService(move |query: &str| {
            if query.contains("?property") {
                let refs: Vec<&str> = candidates.iter().map(String::as_str).collect();
                Ok(uri_table("property", &refs))
            } else if let Some(pos) = query.find("/p") {
                // p00 is carried by 15 entities, p14 by 1.
                let n: u64 = query[pos + 2..pos + 4].parse().unwrap();
                Ok(count_table(15 - n))
            } else {
                Ok(count_table(15))
            }
        });

        let constraints =
            properties_by_statistics(&service, "http://dbpedia.org/ontology/Hotel").unwrap();
        assert_eq!(constraints.len(), STATISTICS_TOP_N);
        assert_eq!(
            constraints[0].property,
            PropertyRef::new("http://dbpedia.org/ontology/p00")
        );
        assert_eq!(
            constraints[9].property,
            PropertyRef::new("http://dbpedia.org/ontology/p09")
        );
    }

    #[test]
    fn statistics_strategy_handles_empty_class() {
        let service = FnService(|_query: &str| Ok(count_table(0)));
        let constraints =
            properties_by_statistics(&service, "http://dbpedia.org/ontology/Hotel").unwrap();
        assert!(constraints.is_empty());
    }

    #[test]
    fn spreadsheet_builds_one_node_shape_per_row() {
        let csv = "shape,entity,cardinality\n\
                   RitzShape,http://dbpedia.org/resource/The_Ritz_Hotel,1\n\
                   SavoyShape,http://dbpedia.org/resource/Savoy_Hotel,2\n";
        let prefixes = Prefixes::default();
        let property = PropertyRef::new("http://dbpedia.org/ontology/location");
        let shapes = shapes_from_spreadsheet(
            csv,
            &SpreadsheetColumns::default(),
            &property,
            &prefixes,
        )
        .unwrap();

        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[0].name, "RitzShape");
        assert_eq!(
            shapes[0].target,
            crate::shapes::ShapeTarget::Node("http://dbpedia.org/resource/The_Ritz_Hotel".into())
        );
        assert_eq!(shapes[1].constraints[0].min_count, 2);
        assert_eq!(shapes[1].constraints[0].property, property);
    }

    #[test]
    fn spreadsheet_rejects_non_numeric_cardinality() {
        let csv = "shape,entity,cardinality\nBad,http://example.org/e,many\n";
        let prefixes = Prefixes::default();
        let property = PropertyRef::new("http://dbpedia.org/ontology/location");
        assert!(matches!(
            shapes_from_spreadsheet(csv, &SpreadsheetColumns::default(), &property, &prefixes),
            Err(CompletenessError::Tabular(_))
        ));
    }
}
