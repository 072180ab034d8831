//! Representative per-domain command/event wrappers.
//!
//! The full protocol has hundreds of these, one per domain method — out of
//! scope per §1 ("only their calling convention is specified"). The modules
//! here exist to demonstrate that calling convention end to end (typed
//! `Command`/`Event` impls dispatched through [`crate::command::CommandSurface`])
//! and to give [`crate::intercept`] something real to issue its Fetch.*
//! calls against.

pub mod dom;
pub mod fetch;
pub mod network;
pub mod page;
pub mod runtime;
pub mod target;
