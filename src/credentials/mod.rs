pub mod codec;
pub mod error;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod schema;
pub mod wire;

pub use error::RepoError;
pub use repo::CredentialsRepository;
pub use repo_types::{CredentialsDocument, CredentialsId};
