//! Sandboxed code execution
//!
//! Runs an arbitrary code fragment in a fresh interpreter child process and
//! reports what it did, without ever returning an error to the caller.
//!
//! # Architecture
//!
//! ```text
//! run(code, timeout)
//!      │
//!      ▼
//! [optional semaphore permit]
//!      │
//!      ▼
//! spawn `python3 -` in its own process group
//!      │  code ──► stdin (no shell, no quoting)
//!      ▼
//! wait ≤ timeout while draining stdout/stderr
//!      │
//!      ├── exited   → returncode = exit status
//!      ├── timeout  → SIGKILL process group, returncode = -1
//!      └── fault    → returncode = 1
//!      │
//!      ▼
//! SIGKILL process group (reap stragglers)
//! ```
//!
//! Isolation is a single child process. There is no filesystem, network or
//! memory confinement beyond what the host OS user already has.

pub mod runner;

pub use runner::{SandboxExecutionResult, SandboxedCodeRunner, FAULT_RETURNCODE, TIMEOUT_RETURNCODE};
