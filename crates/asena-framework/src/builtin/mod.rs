//! Commands shipped with the framework.
//!
//! | Command | Owner-only | Description |
//! |---------|-----------|-------------|
//! | `pause` | yes | Stops dispatch in the current chat |
//! | `resume` | yes | Resumes dispatch in the current chat |

pub mod pause;

pub use pause::pause_commands;
