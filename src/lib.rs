//! Commit and push uncommitted changes in a git working tree, once or on an
//! interval.

pub mod pusher;
