pub mod catalog;
pub mod fulfillment;
pub mod metrics;
pub mod pricing;
pub mod providers;
pub mod receipt;
pub mod reconciliation;
pub mod repository;

pub use catalog::CatalogClient;
pub use metrics::{get_metrics, init_metrics};
pub use repository::PaymentRepository;
