pub mod background;
pub use background::BackgroundTasks;

pub mod mailer;
pub use mailer::{LogMailer, Mailer, MailerError, RetryingMailer, SmtpMailer, Templates};

pub mod password;

pub mod token_service;
pub mod token_service_impl;
pub use token_service::{TokenError, TokenService};
pub use token_service_impl::SeaOrmTokenService;

pub mod user_service;
pub mod user_service_impl;
pub use user_service::{UserError, UserService};
pub use user_service_impl::SeaOrmUserService;

pub mod movie_service;
pub mod movie_service_impl;
pub use movie_service::{MovieError, MovieService};
pub use movie_service_impl::SeaOrmMovieService;
