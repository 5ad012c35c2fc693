//! Audio frame handling for the conversation relay.

pub mod framer;

pub use framer::{
    DEFAULT_SAMPLE_RATE_HZ, decode_pcm, decode_to_samples, pcm_to_samples, pcm_to_wav,
    wrap_as_container,
};
