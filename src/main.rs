//! # Voxel Streaming Entry Point
//!
//! Runs the headless streaming walk from the library's `run()`.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release
//! ```

fn main() {
    voxel_streaming::run();
}
