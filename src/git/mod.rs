mod content;
mod repo;
mod status;

pub use content::{ContentResolver, ContentSource};
pub use repo::{GitChangeLister, RepoCache};
pub use status::{detect_base_branch_in, get_repo_root_in, FileChange, FileStatus};
