pub mod authenticate;

pub use authenticate::{
    authenticate, Authentication, Authenticator, AuthenticatorSettings, CurrentSubject, Rejection,
    FLASH_COOKIE, RETURN_URL_COOKIE,
};
