//! zgate - CI gate for Zephyr firmware workspaces
//!
//! Library crate backing the `zg`/`zgate` binary. Policy checks live in
//! [`checks`], git change discovery in [`git`], the policy file model in
//! [`core::rules`], and the CMake/ctest orchestration in [`runner`].

pub mod checks;
pub mod cli;
pub mod core;
pub mod git;
pub mod runner;
pub mod util;
