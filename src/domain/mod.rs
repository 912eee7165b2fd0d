// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits that describe the captioning
// problem: which images carry which captions, what a generated
// caption looks like, which mode a session runs in, and the
// errors callers are expected to match on.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O beyond the trait signatures
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §6 (Enums), §10 (Traits)

// Image → captions mappings and generated captions
pub mod caption;

// The training / inference-only switch
pub mod mode;

// Typed failures surfaced to the operator
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
