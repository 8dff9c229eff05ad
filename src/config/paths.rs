//! Filesystem locations used by configuration

pub mod xdg_root;
