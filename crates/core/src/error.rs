#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A consumer handle outlived the directory that issued it. This is a
    /// wiring defect, not a runtime condition.
    #[error("thread directory handle used after its directory was dropped")]
    DirectoryDetached,
}

pub type Result<T> = std::result::Result<T, CoreError>;
