pub mod prelude;

pub mod movies;
pub mod permissions;
pub mod tokens;
pub mod users;
pub mod users_permissions;
