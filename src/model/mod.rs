pub mod record;
pub mod series;
pub mod window;

pub use record::{distinct_pairs, group_by_pair, ConsumptionRecord, PairKey};
pub use series::{build_series, parse_date, DemandPoint, DemandSeries};
pub use window::{sample_std_dev, RollingWindow};
