pub mod accumulator;
pub mod backend;
pub mod directory;
pub mod error;
pub mod label;
pub mod refresh;
pub mod resolver;
pub mod runtime;
pub mod time;

pub use accumulator::{MessageAccumulator, StreamUpdate};
pub use backend::SessionBackend;
pub use directory::{
    DirectoryHandle, DirectoryOptions, DirectorySnapshot, ThreadDirectory, ThreadEntry,
};
pub use error::CoreError;
pub use label::{ThreadLabel, ThreadLabeler, thread_title};
pub use refresh::{RefreshHandle, spawn_refresher};
pub use resolver::{CreationTimeCache, CreationTimeResolver, ResolvedTime, TimeSource};
pub use runtime::ConversationRuntime;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
