pub mod db;
pub mod password;
pub mod token;

pub use db::DbAdapter;
pub use password::BcryptHasher;
pub use token::JwtSigner;
