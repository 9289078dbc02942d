pub mod assessment;
pub mod database;
pub mod exchange_sync;
pub mod indicator_store;
pub mod ingest;
pub mod position_store;
pub mod retention;
pub mod signal_log;
pub mod signals;
pub mod summary;

pub use assessment::{AssessmentLog, AssessmentService};
pub use database::{Database, StoreError};
pub use exchange_sync::{ExchangeManager, ExchangeStatus, SyncReport};
pub use indicator_store::IndicatorStore;
pub use ingest::{IngestError, IngestOutcome, IngestService};
pub use position_store::PositionStore;
pub use retention::{PurgeReport, RetentionService};
pub use signal_log::SignalLog;
pub use signals::{IndicatorSnapshot, SignalDetector};
pub use summary::SummaryService;
