//! Windowed retrieval of entity and property-value tables.
//!
//! The remote service enforces per-client rate limits, so entities are
//! submitted in fixed-size batches and queries are issued strictly one at a
//! time. Windows advance by `window_size` with no gaps or overlaps: each
//! entity appears in exactly one window per property.

use crate::endpoint::QueryService;
use crate::error::Result;
use crate::results::ResultTable;
use crate::types::{EntityRef, PropertyRef};
use log::{debug, info};

pub const DEFAULT_WINDOW_SIZE: usize = 50;

/// Fetches per-entity property values one (property, window) pair at a time.
pub struct WindowedFetcher<'a, S: QueryService> {
    service: &'a S,
    window_size: usize,
}

impl<'a, S: QueryService> WindowedFetcher<'a, S> {
    pub fn new(service: &'a S) -> Self {
        WindowedFetcher {
            service,
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        assert!(window_size > 0, "window size must be positive");
        self.window_size = window_size;
        self
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Runs the instance query and extracts the entity list from its
    /// `?entity` column, preserving row order.
    pub fn fetch_entities(&self, instance_query: &str) -> Result<(Vec<EntityRef>, ResultTable)> {
        let table = self.service.query(instance_query)?;
        let entities = table.entity_column("entity")?;
        info!("retrieved {} entities", entities.len());
        Ok((entities, table))
    }

    /// Retrieves the values of each property for every entity, one query per
    /// (property, window) pair, concatenating all result rows.
    pub fn fetch_property_values(
        &self,
        entities: &[EntityRef],
        properties: &[PropertyRef],
    ) -> Result<ResultTable> {
        let mut out = ResultTable::default();
        let window_count = entities.len().div_ceil(self.window_size);

        for property in properties {
            info!(
                "collecting values of {} over {} windows",
                property, window_count
            );
            // chunks() yields disjoint, exhaustive windows; each window is
            // fetched independently of the others' progress.
            for (index, window) in entities.chunks(self.window_size).enumerate() {
                let query = property_window_query(property, window);
                let table = self.service.query(&query)?;
                debug!(
                    "window {}/{} for {}: {} rows",
                    index + 1,
                    window_count,
                    property,
                    table.len()
                );
                out.extend(table);
            }
        }
        Ok(out)
    }
}

/// The per-window query: the window's entities as a fixed value-set, filtered
/// to a single target property.
pub fn property_window_query(property: &PropertyRef, window: &[EntityRef]) -> String {
    let values = window
        .iter()
        .map(EntityRef::bracketed)
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "SELECT ?s ?p ?o\nWHERE {{\n    VALUES ?s {{ {} }}\n    BIND({} AS ?p)\n    ?s ?p ?o .\n}}",
        values,
        property.bracketed()
    )
}
