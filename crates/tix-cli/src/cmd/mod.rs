pub mod assign;
pub mod backlog;
pub mod completions;
pub mod create;
pub mod cycles;
pub mod events;
pub mod init;
pub mod list;
pub mod serve;
pub mod show;
pub mod stats;
pub mod transition;
pub mod verify;
