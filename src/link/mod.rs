//! Link layer: everything between raw attribute traffic and the
//! configuration processor.
//!
//! | Module         | Direction | Job                                   |
//! |----------------|-----------|---------------------------------------|
//! | `framer`       | inbound   | fragment reassembly, staleness, bound |
//! | `completeness` | inbound   | brace-balance message detection       |
//! | `chunked`      | outbound  | MTU-sized, paced notifications        |
//! | `advertising`  | outbound  | AD payload + fallback ladder          |

pub mod advertising;
pub mod chunked;
pub mod completeness;
pub mod framer;
