//! Opaque handle types for kernel-owned entities.
//!
//! Handles are `Copy` indices into the kernel's arenas. Copying a handle
//! aliases the same underlying record, which is exactly the reference
//! semantics named events and other shared objects need.

use kairos_common::arena::ArenaId;
use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Wraps a raw index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Unwraps the raw index.
            pub fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl ArenaId for $name {
            fn from_raw(index: u32) -> Self {
                Self(index)
            }

            fn as_raw(self) -> u32 {
                self.0
            }
        }
    };
}

define_id!(
    /// Handle to a declared signal.
    SignalId
);

define_id!(
    /// Handle to a registered process.
    ProcessId
);

define_id!(
    /// Handle to a semaphore.
    SemaphoreId
);

define_id!(
    /// Handle to a mailbox.
    MailboxId
);

define_id!(
    /// Handle to a named event. Assigning one handle variable to another
    /// copies the reference, not the event record.
    EventId
);
