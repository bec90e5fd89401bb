//! Client identity: validated identifiers, redacted secrets, credential modes, and the
//! signed-assertion builder used for certificate credentials.

pub mod assertion;
pub mod credentials;
pub mod id;
pub mod secret;

pub use assertion::*;
pub use credentials::*;
pub use id::*;
pub use secret::*;
