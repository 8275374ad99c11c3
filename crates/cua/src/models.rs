//! These models represent the objects passed around by the sampling loop
//!
//! There are two formats we need to interact with:
//! - the conversation kept by the loop and handed back to the caller
//! - anthropic messages/tools, sent from the loop to the endpoint
//!
//! We always immediately convert the wire format into these internal structs using the
//! helpers in `providers::utils`. The internal models stay close to the messages API so
//! that thinking blocks and tool results survive a round trip unchanged.
pub mod content;
pub mod message;
pub mod role;
pub mod tool;
