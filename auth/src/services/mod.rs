pub mod flash;
pub mod guard;
pub mod identity;
pub mod oauth;
pub mod openid;
pub mod password;

pub use flash::*;
pub use guard::*;
pub use identity::*;

pub use oauth::OAuthService;
pub use openid::OpenIdRelay;
pub use password::CredentialHasher;
