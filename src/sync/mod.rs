pub mod pager;
pub mod reconciler;
pub mod staleness;

pub use pager::{BillSource, PageConfig, Pager};
pub use reconciler::{Reconciler, SyncReport, UpsertStrategy};
