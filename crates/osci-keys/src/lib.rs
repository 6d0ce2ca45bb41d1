#![forbid(unsafe_code)]

pub mod cert;
pub mod loader;
pub mod role;

pub use cert::OsciCertificate;
pub use role::{Decrypter, Role, RoleKind, Signer};
