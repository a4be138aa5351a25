pub mod crawl;
pub mod transform;

pub use crawl::{
    crawl_target, keyword_targets, run_job, split_keywords, supervise_job, CrawlJob,
    CrawlOverrides, TargetOutput,
};
pub use transform::transform_file;
