//! Small Rust-specific helpers shared across the workspace,
//! with no Minecraft-specific functionality.

// Exports a small macro
mod declare_and_pub_use;
mod lock_or_panic;
mod u64_equals_usize;


pub use self::{
    lock_or_panic::{LockOrPanic, RwLockOrPanic},
    u64_equals_usize::u64_equals_usize,
};
