pub mod jwt;

pub use jwt::{user_id_from_claims, verify_jwt, Claims};
