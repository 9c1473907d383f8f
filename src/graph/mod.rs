mod entity;
mod ingest;
mod merge;
mod model;
mod store;

pub use entity::{Entity, EntityModel};
pub use ingest::{BatchFeed, FeedMessage, IncomingBatch};
pub use model::{EdgeRecord, NodeRecord, Snapshot};
pub use store::{ChangeSet, GraphStore, NodeEdit, load_snapshot, save_snapshot};
