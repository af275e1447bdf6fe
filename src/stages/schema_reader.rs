//! Reads the table info every later prompt embeds.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::db::DatabaseClient;
use crate::error::Result;
use crate::pipeline::{PipelineState, Stage};

pub struct SchemaReader {
    db: Arc<dyn DatabaseClient>,
}

impl SchemaReader {
    pub fn new(db: Arc<dyn DatabaseClient>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Stage for SchemaReader {
    fn name(&self) -> &'static str {
        "schema_reader"
    }

    async fn run(&self, mut state: PipelineState) -> Result<PipelineState> {
        let schema = self.db.introspect_schema().await?;
        info!(stage = self.name(), "Read {} tables", schema.tables.len());

        state.set_schema(schema.format_table_info())?;
        Ok(state)
    }
}
