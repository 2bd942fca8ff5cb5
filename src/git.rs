//! Git operations and repository management.

pub mod commit;
pub mod diff_split;
pub mod repository;

pub use diff_split::{split_diff, DiffUnit};
pub use repository::GitRepository;
