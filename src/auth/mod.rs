pub mod credentials;
pub mod pkce;
pub mod store;

pub use credentials::{AccessToken, Callback, CredentialManager, split_callback_url};
pub use store::{MemoryStore, SessionStore, VERIFIER_KEY};
