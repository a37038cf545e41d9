pub mod bucket;
pub mod database;
pub mod file;
pub mod project;
pub mod refresh_token;
pub mod team;
pub mod user;
pub mod user_role;

pub use bucket::Bucket;
pub use database::Database;
pub use file::File;
pub use project::{Project, ProjectDetail};
pub use refresh_token::RefreshToken;
pub use team::{Team, TeamMember};
pub use user::User;
pub use user_role::UserRole;
