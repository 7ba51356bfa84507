pub mod authorizer;
pub mod error;
pub mod iap;
pub mod login;
pub mod memory;
pub mod sessions;
pub mod store;
pub mod synchroniser;
pub mod token;
pub mod tokens;

pub use authorizer::{authorize, Scope};
pub use error::{AccessDenied, AuthError, ServiceError, SessionError, StoreError, SyncError, TokenError};
pub use iap::{
    IapValidator, KeySource, RemoteKeySource, StaticKeySource, DEFAULT_IAP_HEADER,
    DEFAULT_IAP_JWKS_URL, IAP_ISSUER,
};
pub use login::ExternalLogin;
pub use memory::MemoryStore;
pub use sessions::{
    session_removal_cookie, IssuedSession, SessionManager, SessionStrategy, SweepReport,
};
pub use store::{
    AgentTokenStore, MembershipStore, RegistrySessionStore, SessionStore, TeamStore, UserSpec,
    UserStore, UserTokenStore,
};
pub use synchroniser::{ExternalIdentity, ExternalTeam, SyncReport, Synchroniser};
pub use token::{Claims, Kind, Token, TokenCodec, REDACTED};
pub use tokens::{IssuedCredential, TokenService};
