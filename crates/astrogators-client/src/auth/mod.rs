/*
[INPUT]:  Tokens issued by the auth endpoints
[OUTPUT]: Token storage backends and claim inspection
[POS]:    Auth layer - credential state shared by client and session
[UPDATE]: When token storage or inspection changes
*/

pub mod jwt;
pub mod token_store;

pub use jwt::TokenClaims;
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
