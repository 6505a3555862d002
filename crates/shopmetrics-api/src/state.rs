use std::path::PathBuf;

use shopmetrics_core::dialect::SqlDialect;
use shopmetrics_core::executor::QueryExecutor;
use shopmetrics_core::loader::BatchLoader;
use shopmetrics_core::record::CsvDirectory;
use sqlx::AnyPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: AnyPool,
    pub dialect: SqlDialect,
    pub data_dir: PathBuf,
    pub query_dir: PathBuf,
}

impl AppState {
    pub fn executor(&self) -> QueryExecutor {
        QueryExecutor::new(self.pool.clone(), self.query_dir.clone(), self.dialect)
    }

    pub fn loader(&self) -> BatchLoader<CsvDirectory> {
        BatchLoader::new(
            self.pool.clone(),
            CsvDirectory::new(self.data_dir.clone()),
            self.query_dir.clone(),
            self.dialect,
        )
    }
}
