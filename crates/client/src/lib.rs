pub mod credentials;
pub mod http_client;

pub use credentials::CredentialStore;
pub use http_client::HttpSchedulerApi;
