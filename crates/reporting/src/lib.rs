//! Reporting module: profitability aggregation over confirmed sales orders
//! and its spreadsheet export.

pub mod profitability;
pub mod xlsx;

pub use profitability::{
    build_report, ProfitabilityQuery, ProfitabilityReport, ProfitabilityRow, ProfitabilityTotals,
};
pub use xlsx::{render_xlsx, REPORT_FILE_NAME};
