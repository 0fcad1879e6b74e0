/*
[INPUT]:  Backend API schema and serde requirements
[OUTPUT]: Typed Rust structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

pub mod ally_code;
pub mod api;
pub mod timestamp;
pub mod user;

pub use ally_code::*;
pub use api::*;
pub use timestamp::parse_timestamp;
pub use user::*;
