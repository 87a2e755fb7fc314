pub mod filters;
pub mod id;
pub mod movie;
pub mod permission;
pub mod token;
pub mod user;
pub mod validator;

pub use filters::{Filters, Metadata};
pub use id::Id;
pub use movie::{Movie, MovieInput, MovieQuery, Runtime};
pub use permission::Permissions;
pub use token::{Token, TokenScope};
pub use user::{Identity, User};
pub use validator::{ValidationErrors, Validator};
