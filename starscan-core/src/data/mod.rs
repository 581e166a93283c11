//! Data layer: remote providers, kline field naming, series parsing, the
//! incremental merge engine and the CSV store.

pub mod eastmoney;
pub mod fields;
pub mod merge;
pub mod parser;
pub mod provider;
pub mod store;

pub use eastmoney::{EastmoneyConfig, EastmoneyProvider};
pub use fields::{KlineSchema, LogicalField};
pub use merge::{
    recency_floor, FetchRequest, MergeEngine, MergeOutcome, PersistedState, SkipReason, WriteMode,
    WritePlan,
};
pub use parser::{RecordSet, SeriesError, SeriesParser};
pub use provider::{DataError, DataProvider, KlinePayload, UniverseProvider};
pub use store::SeriesStore;
