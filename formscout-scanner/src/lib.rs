//! Form-centric attack-surface discovery: a depth-first crawler that renders pages
//! through a [`BrowserDriver`], then reports every deduplicated form with its inputs
//! classified as fixed or fuzzable.

pub mod config;
pub mod crawler;
pub mod dedup;
pub mod driver;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod page;
pub mod scope;
pub mod session;

pub use config::{CrawlConfig, InputTypes};
pub use crawler::{Crawler, LoginBootstrap, ProgressCallback};
pub use dedup::{FormDeduplicator, FormSignature};
pub use driver::{BrowserDriver, HttpDriver, Navigation};
pub use error::{NavigationError, ScanError};
pub use extract::FormExtractor;
pub use normalize::normalize;
pub use page::{Form, InputValue, Method, Page};
pub use scope::{ScopeDecision, ScopeGuard};
pub use session::CrawlSession;
