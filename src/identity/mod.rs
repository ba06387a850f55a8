//! Identity: principals, credential verification, token sessions and the
//! authenticator that ties them together. Keep the public surface thin and
//! split implementation across sub-modules.

mod principal;
mod store;
mod secret;
mod session;
mod authenticator;

pub use principal::{Principal, Role};
pub use store::{PrincipalStore, FilePrincipalStore, StaticPrincipalStore};
pub use secret::{hash_password, verify_password};
pub use session::{AuthContext, TokenCache, MokaTokenCache, mint_token};
pub use authenticator::{Authenticator, Authenticated, Credential, AuthFailure};
