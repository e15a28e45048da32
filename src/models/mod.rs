//! Data models for saved vase favorites.
//!
//! A favorite is an open-ended JSON document describing vase parameters,
//! persisted as `favorite_<token>.json` and optionally paired with a PNG
//! preview under the store's `previews/` subdirectory.

pub mod favorite;
