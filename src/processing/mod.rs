pub mod compare;
pub mod top;
pub mod windows;

pub use compare::{compare_queries, compare_series, compare_values, percent_change};
pub use top::{GrowthBasis, Ranking, TopPerformers};
pub use windows::{ReportWindows, report_week};
