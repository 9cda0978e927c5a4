//! Event payload dispatch
//!
//! Maps the stable `event_type` tag of a stored event to a decoder that
//! produces a caller-defined payload enum. Dispatch happens on the string tag
//! at decode time; unknown tags are decode errors.
//!
//! ```
//! use bitempo_core::EventRegistry;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Opened { owner: String }
//!
//! enum AccountEvent { Opened(Opened), Closed }
//!
//! let mut registry = EventRegistry::new();
//! registry.register_json("opened", AccountEvent::Opened);
//! registry.register("closed", |_| Ok(AccountEvent::Closed));
//! assert!(registry.contains("opened"));
//! ```

use crate::error::{BitempoError, BitempoResult};
use crate::event::PersistenceEvent;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

type Decoder<E> = Box<dyn Fn(&serde_json::Value) -> BitempoResult<E> + Send + Sync>;

/// Registry of payload decoders keyed by event type
pub struct EventRegistry<E> {
    decoders: HashMap<String, Decoder<E>>,
}

impl<E> EventRegistry<E> {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register a raw decoder, replacing any previous one for the tag
    pub fn register<F>(&mut self, event_type: impl Into<String>, decoder: F) -> &mut Self
    where
        F: Fn(&serde_json::Value) -> BitempoResult<E> + Send + Sync + 'static,
    {
        self.decoders.insert(event_type.into(), Box::new(decoder));
        self
    }

    /// Register a tag whose payload deserializes into `P`, then wraps into `E`
    pub fn register_json<P, W>(&mut self, event_type: impl Into<String>, wrap: W) -> &mut Self
    where
        P: DeserializeOwned,
        W: Fn(P) -> E + Send + Sync + 'static,
    {
        let event_type = event_type.into();
        let tag = event_type.clone();
        self.register(event_type, move |data| {
            serde_json::from_value::<P>(data.clone())
                .map(&wrap)
                .map_err(|e| BitempoError::Decode {
                    event_type: tag.clone(),
                    message: e.to_string(),
                })
        })
    }

    /// True if the tag has a decoder
    pub fn contains(&self, event_type: &str) -> bool {
        self.decoders.contains_key(event_type)
    }

    /// Registered tags, sorted
    pub fn event_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Decode one event
    pub fn decode(&self, event: &PersistenceEvent) -> BitempoResult<E> {
        let decoder = self
            .decoders
            .get(&event.event_type)
            .ok_or_else(|| BitempoError::Decode {
                event_type: event.event_type.clone(),
                message: "no decoder registered".to_string(),
            })?;
        decoder(&event.data)
    }

    /// Decode a loaded stream in order, stopping at the first failure
    pub fn decode_stream(&self, events: &[PersistenceEvent]) -> BitempoResult<Vec<E>> {
        events.iter().map(|e| self.decode(e)).collect()
    }
}

impl<E> Default for EventRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for EventRegistry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("event_types", &self.event_types())
            .finish()
    }
}
