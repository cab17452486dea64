//! Assembly of the in-memory data graph from tabular query results.

use crate::error::{CompletenessError, Result};
use crate::results::{BindingValue, ResultTable};
use crate::types::EntityRef;
use log::debug;
use oxigraph::model::vocab::rdf;
use oxigraph::model::{BlankNode, Graph, NamedNode, Subject, Triple};

/// Builds the data graph: one `rdf:type` triple per entity plus one triple
/// per property-value row.
///
/// The type triples exist so a class-targeted shape can select the entities;
/// they are added unconditionally even when the shapes target fixed nodes.
pub fn assemble_graph(
    entities: &[EntityRef],
    property_rows: &ResultTable,
    entity_class: &NamedNode,
) -> Result<Graph> {
    let mut graph = Graph::new();

    for entity in entities {
        let subject = entity.to_named_node()?;
        graph.insert(&Triple::new(subject, rdf::TYPE, entity_class.clone()));
    }

    for row in &property_rows.rows {
        let subject = row_subject(row.get("s"))?;
        let predicate = match row.get("p") {
            Some(BindingValue::Uri { value }) => {
                NamedNode::new(value).map_err(|e| CompletenessError::InvalidIri {
                    iri: value.clone(),
                    message: e.to_string(),
                })?
            }
            Some(other) => {
                return Err(CompletenessError::MalformedRow(format!(
                    "predicate binding is a {}, expected a resource",
                    other.type_tag()
                )))
            }
            None => {
                return Err(CompletenessError::MalformedRow(
                    "property row missing ?p binding".into(),
                ))
            }
        };
        let object = row
            .get("o")
            .ok_or_else(|| CompletenessError::MalformedRow("property row missing ?o binding".into()))?
            .to_term()?;
        graph.insert(&Triple::new(subject, predicate, object));
    }

    debug!(
        "assembled data graph: {} entities, {} property rows",
        entities.len(),
        property_rows.len()
    );
    Ok(graph)
}

fn row_subject(binding: Option<&BindingValue>) -> Result<Subject> {
    match binding {
        Some(BindingValue::Uri { value }) => {
            let node = NamedNode::new(value).map_err(|e| CompletenessError::InvalidIri {
                iri: value.clone(),
                message: e.to_string(),
            })?;
            Ok(Subject::NamedNode(node))
        }
        Some(BindingValue::Bnode { value }) => {
            let bn = BlankNode::new(value).map_err(|e| {
                CompletenessError::MalformedRow(format!("invalid blank node id: {}", e))
            })?;
            Ok(Subject::BlankNode(bn))
        }
        Some(other) => Err(CompletenessError::MalformedRow(format!(
            "subject binding is a {}, expected a resource",
            other.type_tag()
        ))),
        None => Err(CompletenessError::MalformedRow(
            "property row missing ?s binding".into(),
        )),
    }
}
