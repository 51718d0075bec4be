pub mod metrics;
pub mod repository;

pub use metrics::{get_metrics, init_metrics};
pub use repository::CatalogRepository;
