//! HTTP client for the destination relay endpoint.
//!
//! Posts decoded deposits to the destination-side relay service, which would mint or
//! release funds on the destination chain.
//!
//! ## Example
//!
//! ```no_run
//! use bridge_relay_client::RelayClient;
//! # use bridge_relay_client::types::RelayPayload;
//!
//! # async fn example(payload: RelayPayload) -> Result<(), bridge_relay_client::Error> {
//! let client = RelayClient::new("https://relay.example/api/relay", "api-key")?;
//!
//! match client.relay(&payload).await {
//!     Ok(body) => println!("relayed: {body}"),
//!     Err(e) if e.is_transient() => println!("retry later: {e}"),
//!     Err(e) => println!("rejected: {e}"),
//! }
//! # Ok(())
//! # }
//! ```

pub use bridge_relay_types as types;
pub use client::{API_KEY_HEADER, DEFAULT_TIMEOUT, RelayClient};
pub use error::Error;

mod client;
mod error;
