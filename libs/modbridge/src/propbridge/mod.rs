//! The Property Bridge: the two-directional rewrite pass between the
//! host's rich, tagged `PropertyValue` trees and the plain JSON the
//! external module runtime understands. Outbound (`encode`) hoists secrets
//! into synthesized locals and stands unknowns in for a proxy resource
//! reference; inbound (`decode`) restores both from the runtime's own
//! sensitivity/unknown marks.

mod decode;
mod encode;
mod wire;

pub use decode::{decode_value, AttributeMarks};
pub use encode::{encode_inputs, EncodedInputs};
pub use wire::{from_wire_json, to_wire_json};
