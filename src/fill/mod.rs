//! Trade decoding from exchange event logs.
//!
//! [`FillDecoder`] queries the chain for `OrderFilled` logs emitted by the
//! configured exchange contracts and decodes each into a normalized
//! [`DecodedFill`]: side, price, size and traded token id derived from which
//! leg of the fill carries the collateral asset.
//!
//! The per-log decoding itself is pure ([`decode_fill`]); only log retrieval
//! and the timestamp/head pass-throughs touch the chain client.

mod decoder;
mod types;

pub use decoder::{FillDecoder, decode_fill};
pub use types::DecodedFill;
