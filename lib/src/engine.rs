//! The constraint-evaluation seam.
//!
//! The pipeline only depends on the `ConstraintEngine` trait: given a shapes
//! document and a data graph, report conformance plus one (focus node,
//! violated path) pair per failed check. The built-in engine implements
//! exactly the minimum-occurrence semantics this crate needs; richer SHACL
//! evaluation is deliberately out of scope and can be plugged in behind the
//! same trait.

use crate::error::Result;
use crate::shapes::{ShapeDocument, ShapeTarget};
use crate::types::{ConstraintViolation, EntityRef};
use log::debug;
use oxigraph::model::vocab::rdf;
use oxigraph::model::{Graph, NamedNode, Subject, Term};

/// Machine-readable outcome of one validation run.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub conforms: bool,
    pub violations: Vec<ConstraintViolation>,
}

pub trait ConstraintEngine {
    fn validate(&self, shapes: &ShapeDocument, data: &Graph) -> Result<ValidationOutcome>;
}

/// Minimum-occurrence checker over the in-memory data graph.
#[derive(Debug, Default)]
pub struct MinCountEngine;

impl MinCountEngine {
    pub fn new() -> Self {
        MinCountEngine
    }

    /// Focus nodes selected by the shape's target, in graph iteration order
    /// for class targets.
    fn focus_nodes(&self, shapes: &ShapeDocument, data: &Graph) -> Result<Vec<NamedNode>> {
        match &shapes.target {
            ShapeTarget::Node(term) => {
                let uri = shapes.prefixes().expand(term)?;
                Ok(vec![EntityRef::new(uri).to_named_node()?])
            }
            ShapeTarget::Class(term) => {
                let class = EntityRef::new(shapes.prefixes().expand(term)?).to_named_node()?;
                let class_term = Term::NamedNode(class);
                let mut nodes = Vec::new();
                for triple in data.iter() {
                    if triple.predicate == rdf::TYPE && triple.object == class_term.as_ref() {
                        if let Subject::NamedNode(n) = triple.subject.into_owned() {
                            nodes.push(n);
                        }
                    }
                }
                Ok(nodes)
            }
        }
    }
}

impl ConstraintEngine for MinCountEngine {
    fn validate(&self, shapes: &ShapeDocument, data: &Graph) -> Result<ValidationOutcome> {
        let focus_nodes = self.focus_nodes(shapes, data)?;
        debug!(
            "validating {} focus nodes against {} property shapes",
            focus_nodes.len(),
            shapes.constraints.len()
        );

        let mut violations = Vec::new();
        for focus in &focus_nodes {
            for constraint in &shapes.constraints {
                // Paths may be CURIEs when the document was built from user
                // input rather than parsed from Turtle.
                let path = EntityRef::new(shapes.prefixes().expand(constraint.property.as_str())?)
                    .to_named_node()?;
                let count = data
                    .objects_for_subject_predicate(focus, &path)
                    .count() as u64;
                if count < constraint.min_count {
                    violations.push(ConstraintViolation {
                        focus_node: EntityRef::new(focus.as_str()),
                        path: constraint.property.clone(),
                    });
                }
            }
        }

        Ok(ValidationOutcome {
            conforms: violations.is_empty(),
            violations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::build_shape;
    use crate::types::{Prefixes, PropertyConstraint, PropertyRef};
    use oxigraph::model::{Literal, Triple};

    const HOTEL: &str = "http://dbpedia.org/ontology/Hotel";
    const LOCATION: &str = "http://dbpedia.org/ontology/location";
    const ROOMS: &str = "http://dbpedia.org/ontology/numberOfRooms";

    fn data_graph(entities: &[(&str, &[(&str, &str)])]) -> Graph {
        let class = NamedNode::new(HOTEL).unwrap();
        let mut graph = Graph::new();
        for (entity, values) in entities {
            let subject = NamedNode::new(*entity).unwrap();
            graph.insert(&Triple::new(subject.clone(), rdf::TYPE, class.clone()));
            for (prop, value) in *values {
                graph.insert(&Triple::new(
                    subject.clone(),
                    NamedNode::new(*prop).unwrap(),
                    Literal::new_simple_literal(*value),
                ));
            }
        }
        graph
    }

    fn hotel_shape(constraints: &[PropertyConstraint]) -> ShapeDocument {
        build_shape(
            "HotelSchemaShapes",
            crate::shapes::ShapeTarget::Class(HOTEL.into()),
            constraints,
            &Prefixes::default(),
        )
    }

    #[test]
    fn reports_missing_property_per_focus_node() {
        let graph = data_graph(&[
            ("http://example.org/e1", &[(LOCATION, "Paris")]),
            ("http://example.org/e2", &[(LOCATION, "Rome"), (ROOMS, "80")]),
        ]);
        let shape = hotel_shape(&[
            PropertyConstraint::new(PropertyRef::new(LOCATION)),
            PropertyConstraint::new(PropertyRef::new(ROOMS)),
        ]);

        let outcome = MinCountEngine::new().validate(&shape, &graph).unwrap();
        assert!(!outcome.conforms);
        assert_eq!(
            outcome.violations,
            vec![ConstraintViolation {
                focus_node: EntityRef::new("http://example.org/e1"),
                path: PropertyRef::new(ROOMS),
            }]
        );
    }

    #[test]
    fn conforms_when_all_counts_met() {
        let graph = data_graph(&[(
            "http://example.org/e1",
            &[(LOCATION, "Paris"), (ROOMS, "80")],
        )]);
        let shape = hotel_shape(&[
            PropertyConstraint::new(PropertyRef::new(LOCATION)),
            PropertyConstraint::new(PropertyRef::new(ROOMS)),
        ]);
        let outcome = MinCountEngine::new().validate(&shape, &graph).unwrap();
        assert!(outcome.conforms);
        assert!(outcome.violations.is_empty());
    }

    #[test]
    fn min_count_above_one_requires_multiple_values() {
        let mut graph = data_graph(&[("http://example.org/e1", &[(LOCATION, "Paris")])]);
        // Second distinct value satisfies minCount 2.
        graph.insert(&Triple::new(
            NamedNode::new("http://example.org/e1").unwrap(),
            NamedNode::new(LOCATION).unwrap(),
            Literal::new_simple_literal("France"),
        ));
        let shape = hotel_shape(&[PropertyConstraint::with_min_count(
            PropertyRef::new(LOCATION),
            2,
        )]);
        assert!(MinCountEngine::new()
            .validate(&shape, &graph)
            .unwrap()
            .conforms);

        let shape = hotel_shape(&[PropertyConstraint::with_min_count(
            PropertyRef::new(ROOMS),
            2,
        )]);
        assert!(!MinCountEngine::new()
            .validate(&shape, &graph)
            .unwrap()
            .conforms);
    }

    #[test]
    fn node_target_checks_only_that_node() {
        let graph = data_graph(&[
            ("http://example.org/e1", &[]),
            ("http://example.org/e2", &[(LOCATION, "Rome")]),
        ]);
        let shape = build_shape(
            "OneHotel",
            crate::shapes::ShapeTarget::Node("http://example.org/e1".into()),
            &[PropertyConstraint::new(PropertyRef::new(LOCATION))],
            &Prefixes::default(),
        );
        let outcome = MinCountEngine::new().validate(&shape, &graph).unwrap();
        assert_eq!(outcome.violations.len(), 1);
        assert_eq!(
            outcome.violations[0].focus_node,
            EntityRef::new("http://example.org/e1")
        );
    }

    #[test]
    fn curie_path_matches_full_uri_triples() {
        let graph = data_graph(&[("http://example.org/e1", &[(LOCATION, "Paris")])]);
        let shape = hotel_shape(&[PropertyConstraint::new(PropertyRef::new("dbo:location"))]);
        let outcome = MinCountEngine::new().validate(&shape, &graph).unwrap();
        assert!(outcome.conforms);
    }

    #[test]
    fn degenerate_shape_always_conforms() {
        let graph = data_graph(&[("http://example.org/e1", &[])]);
        let shape = hotel_shape(&[]);
        assert!(MinCountEngine::new()
            .validate(&shape, &graph)
            .unwrap()
            .conforms);
    }
}
