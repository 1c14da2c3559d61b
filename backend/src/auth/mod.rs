mod current_user;
pub mod password;
pub mod token;

pub use current_user::CurrentUser;
pub use token::TokenSigner;
