pub mod accounts;
pub mod api;
pub mod config;
pub mod customizer;
pub mod macros;
pub mod parser;
pub mod path;
pub mod report;
pub mod row;
pub mod writer;

pub use accounts::{get_customer_ids, AccountRecord, QUERY_CUSTOMER_IDS};
pub use api::{AdsRestClient, SearchService, SearchStreamBatch};
pub use config::AdsConfig;
pub use customizer::{Customizer, CustomizerTable, RowError};
pub use macros::QueryMacros;
pub use parser::{NoopParser, Parser, RowParser};
pub use report::{accounts_for_script, fetch_report, Report, ReportSpec};
pub use row::{fields_getter, parse_ads_row};
